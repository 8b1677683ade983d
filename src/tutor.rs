//! Tutoring sessions
//!
//! A [`Tutor`] owns one conversation forest and drives each exchange through
//! `sent → fulfilled | failed`. Questions either start a new root thread or,
//! while an expansion is pending, go under the node whose text was
//! highlighted. The reply, or an error node on failure, lands next to the
//! question it answers.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::api::{Client, ClientError, DocumentQuery};
use crate::models::{Conversation, Message, NodeId, Role};
use crate::render::{LeafRenderer, MathMarkdown};

/// Shown in place of an answer when the service could not be reached
pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again.";

/// Shown when the service answered without any text
pub const EMPTY_ANSWER_MESSAGE: &str = "The service returned no answer.";

/// Shown when a question was abandoned before its answer arrived
pub const ABANDONED_MESSAGE: &str = "Request cancelled before an answer arrived.";

/// Which backend a tutor asks, and how follow-ups are phrased for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorMode {
    /// General questions, answered with worked explanations
    General,
    /// Questions answered from the uploaded document
    Document { context_chunks: u32 },
}

/// A follow-up waiting for the user's question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExpansion {
    /// Node the follow-up thread hangs under
    pub parent_id: NodeId,
    /// The highlighted part of that node's text
    pub source_text: String,
}

/// Where an exchange attaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The top level of the forest
    Root,
    /// The children of a node
    Under(NodeId),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Root => f.write_str("the top level"),
            Slot::Under(id) => write!(f, "node {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Sent,
    Fulfilled,
    Failed,
}

/// One question and, once settled, its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub slot: Slot,
    pub question: NodeId,
    pub reply: Option<NodeId>,
    pub state: ExchangeState,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TutorError {
    #[error("Question is empty")]
    EmptyInput,

    #[error("Node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("Node {0} is a question; only answers can be expanded")]
    NotExpandable(NodeId),

    #[error("Selected text is empty")]
    EmptySelection,

    #[error("A request for {0} is still in flight")]
    Busy(Slot),
}

#[derive(Default)]
struct SessionState {
    conversation: Conversation,
    pending: Option<PendingExpansion>,
    in_flight: HashSet<Slot>,
    exchanges: Vec<Exchange>,
}

impl SessionState {
    fn insert(&mut self, slot: Slot, message: Message) -> Result<NodeId, TutorError> {
        match slot {
            Slot::Root => Ok(self.conversation.append_root(message)),
            Slot::Under(parent) => self
                .conversation
                .attach(parent, [message])
                .and_then(|ids| ids.first().copied())
                .ok_or(TutorError::UnknownNode(parent)),
        }
    }

    /// Attaches the reply for exchange `index`, frees its slot and drops the
    /// pending expansion
    fn settle(&mut self, index: usize, message: Message, outcome: ExchangeState) -> Exchange {
        let slot = self.exchanges[index].slot;
        let reply = self.insert(slot, message).ok();
        self.in_flight.remove(&slot);
        self.pending = None;

        let exchange = &mut self.exchanges[index];
        exchange.reply = reply;
        exchange.state = outcome;
        exchange.clone()
    }
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Holds a slot while its request is out
///
/// Dropped unsettled (the `send` future was cancelled), it records the
/// exchange as failed so the slot opens again and the question gets a reply.
struct SlotGuard {
    state: Arc<Mutex<SessionState>>,
    slot: Slot,
    index: usize,
    settled: bool,
}

impl SlotGuard {
    fn settle(mut self, message: Message, outcome: ExchangeState) -> Exchange {
        self.settled = true;
        let exchange = lock_state(&self.state).settle(self.index, message, outcome);
        exchange
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(slot = %self.slot, "question abandoned before a reply arrived");
        lock_state(&self.state).settle(
            self.index,
            Message::error(ABANDONED_MESSAGE),
            ExchangeState::Failed,
        );
    }
}

/// A tutoring session shared between the view and in-flight requests
#[derive(Clone)]
pub struct Tutor {
    client: Arc<dyn Client>,
    mode: TutorMode,
    renderer: Arc<dyn LeafRenderer>,
    state: Arc<Mutex<SessionState>>,
}

impl Tutor {
    /// Creates a session that renders answers as markdown with math
    pub fn new(client: Arc<dyn Client>, mode: TutorMode) -> Self {
        Self {
            client,
            mode,
            renderer: Arc::new(MathMarkdown),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Replaces the renderer used for answers
    pub fn with_renderer(mut self, renderer: Arc<dyn LeafRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn mode(&self) -> TutorMode {
        self.mode
    }

    pub fn renderer(&self) -> &dyn LeafRenderer {
        self.renderer.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    /// Returns a copy of the conversation as it is now
    pub fn snapshot(&self) -> Conversation {
        self.lock().conversation.clone()
    }

    /// Runs `f` against the current conversation without copying it
    pub fn with_conversation<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Conversation) -> R,
    {
        f(&self.lock().conversation)
    }

    pub fn pending_expansion(&self) -> Option<PendingExpansion> {
        self.lock().pending.clone()
    }

    /// Starts a follow-up on `parent_id` about `source_text`.
    ///
    /// Replaces any expansion that was pending. Only answers (assistant or
    /// error nodes) can be expanded.
    pub fn begin_expansion(
        &self,
        parent_id: NodeId,
        source_text: impl Into<String>,
    ) -> Result<(), TutorError> {
        let source_text = source_text.into().trim().to_string();
        if source_text.is_empty() {
            return Err(TutorError::EmptySelection);
        }

        let mut state = self.lock();
        let node = state
            .conversation
            .find(parent_id)
            .ok_or(TutorError::UnknownNode(parent_id))?;
        if node.role() == Role::User {
            return Err(TutorError::NotExpandable(parent_id));
        }

        state.pending = Some(PendingExpansion {
            parent_id,
            source_text,
        });
        Ok(())
    }

    /// Drops the pending expansion, returning it
    pub fn cancel_expansion(&self) -> Option<PendingExpansion> {
        self.lock().pending.take()
    }

    /// All exchanges issued by this session, in issue order
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.lock().exchanges.clone()
    }

    /// Sends a question and waits for the reply.
    ///
    /// The question node is inserted before the request goes out. Failures
    /// of the service are recorded as an error node in the reply's place and
    /// still return `Ok`; `Err` means nothing was sent. Dropping the future
    /// before it completes also settles the exchange with an error node.
    /// The pending expansion is cleared once the exchange settles.
    pub async fn send(&self, input: &str) -> Result<Exchange, TutorError> {
        let question = input.trim();
        if question.is_empty() {
            return Err(TutorError::EmptyInput);
        }

        let (guard, prompt) = {
            let mut state = self.lock();
            let slot = match &state.pending {
                Some(pending) => Slot::Under(pending.parent_id),
                None => Slot::Root,
            };
            if state.in_flight.contains(&slot) {
                return Err(TutorError::Busy(slot));
            }

            let prompt = match &state.pending {
                Some(pending) => self.follow_up_prompt(&state.conversation, pending, question),
                None => question.to_string(),
            };
            let question_id = state.insert(slot, Message::user(question))?;

            state.in_flight.insert(slot);
            state.exchanges.push(Exchange {
                slot,
                question: question_id,
                reply: None,
                state: ExchangeState::Sent,
            });
            let guard = SlotGuard {
                state: Arc::clone(&self.state),
                slot,
                index: state.exchanges.len() - 1,
                settled: false,
            };
            (guard, prompt)
        };

        info!(slot = %guard.slot, "sending question");
        let (message, outcome) = match self.request(prompt).await {
            Ok(answer) => (Message::assistant(answer), ExchangeState::Fulfilled),
            Err(err) => {
                warn!(slot = %guard.slot, error = %err, "question failed");
                (Message::error(failure_message(&err)), ExchangeState::Failed)
            }
        };

        Ok(guard.settle(message, outcome))
    }

    fn follow_up_prompt(
        &self,
        conversation: &Conversation,
        pending: &PendingExpansion,
        question: &str,
    ) -> String {
        match self.mode {
            TutorMode::General => {
                let parent_text = conversation
                    .find(pending.parent_id)
                    .map(|node| node.content())
                    .unwrap_or_default();
                format!(
                    "Context:\n{}\n\nSelected text:\n{}\n\nAdditional Query:\n{}",
                    parent_text, pending.source_text, question
                )
            }
            TutorMode::Document { .. } => format!(
                "Context from previous answer: {}\n\nFollow-up question: {}",
                pending.source_text, question
            ),
        }
    }

    async fn request(&self, prompt: String) -> Result<String, ClientError> {
        match self.mode {
            TutorMode::General => self.client.ask(prompt).await,
            TutorMode::Document { context_chunks } => {
                self.client
                    .query_document(DocumentQuery::new(prompt, context_chunks))
                    .await
            }
        }
    }
}

/// Text of the error node that replaces a failed answer
fn failure_message(err: &ClientError) -> String {
    match err {
        ClientError::Api(detail) => detail.clone(),
        ClientError::MissingData => EMPTY_ANSWER_MESSAGE.to_string(),
        ClientError::Http(_) | ClientError::Decode(_) => SERVER_ERROR_MESSAGE.to_string(),
    }
}
