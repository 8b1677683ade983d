//! Core models for the studymate library
//!
//! This module contains the branching conversation forest: an arena of
//! question/answer nodes where any answer can grow nested follow-up threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a node in a [`Conversation`]
///
/// Ids are handed out by the conversation in creation order, so a larger id
/// was always created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the raw value of the id.
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<usize>().map(NodeId)
    }
}

/// Who produced a node's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Error => "error",
        };
        f.write_str(label)
    }
}

/// Content for a node that has not been inserted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Error, content)
    }
}

/// A single node of the conversation forest
///
/// Content is fixed at insertion; only the child list grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationNode {
    id: NodeId,
    role: Role,
    content: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ConversationNode {
    /// Gets the id of this node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Gets the role of this node
    pub fn role(&self) -> Role {
        self.role
    }

    /// Gets the raw content of this node
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Gets the parent id, `None` for roots
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Gets the child ids in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// The branching conversation: a forest of nodes stored in an arena
///
/// Nodes are never removed, so a node's id doubles as its arena slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    nodes: Vec<ConversationNode>,
    roots: Vec<NodeId>,
}

impl Conversation {
    /// Creates an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new root-level node and returns its id
    pub fn append_root(&mut self, message: Message) -> NodeId {
        let id = self.insert(message, None);
        self.roots.push(id);
        id
    }

    /// Appends `messages` to the children of `target`, in order.
    ///
    /// Returns the ids of the new nodes, or `None` when `target` is not in the
    /// forest, in which case nothing is changed.
    pub fn attach<I>(&mut self, target: NodeId, messages: I) -> Option<Vec<NodeId>>
    where
        I: IntoIterator<Item = Message>,
    {
        if !self.contains(target) {
            return None;
        }

        let ids: Vec<NodeId> = messages
            .into_iter()
            .map(|message| self.insert(message, Some(target)))
            .collect();
        self.nodes[target.0].children.extend(ids.iter().copied());

        Some(ids)
    }

    /// Finds the node with the given id
    pub fn find(&self, id: NodeId) -> Option<&ConversationNode> {
        self.nodes.get(id.0)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Returns the root nodes in insertion order
    pub fn roots(&self) -> impl Iterator<Item = &ConversationNode> {
        self.roots.iter().map(move |id| &self.nodes[id.0])
    }

    /// Returns the children of `id` in insertion order; empty for unknown ids
    pub fn children(&self, id: NodeId) -> Vec<&ConversationNode> {
        self.find(id)
            .map(|node| node.children.iter().map(|c| &self.nodes[c.0]).collect())
            .unwrap_or_default()
    }

    /// Returns the chain of nodes from the root down to `id` (inclusive)
    pub fn ancestry(&self, id: NodeId) -> Vec<&ConversationNode> {
        let mut chain = Vec::new();
        let mut cursor = self.find(id);
        while let Some(node) = cursor {
            chain.push(node);
            cursor = node.parent.and_then(|p| self.find(p));
        }
        chain.reverse();
        chain
    }

    /// Depth of a node, 0 for roots
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        self.find(id).map(|_| self.ancestry(id).len() - 1)
    }

    /// Total number of nodes in the forest
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first, pre-order traversal with children in insertion order.
    ///
    /// This is also the rendering order: a parent is immediately followed by
    /// its whole subtree, before its next sibling.
    pub fn iter(&self) -> Traversal<'_> {
        let stack = self.roots.iter().rev().map(|id| (0, *id)).collect();
        Traversal {
            conversation: self,
            stack,
        }
    }

    /// Builds a nested, serializable view of the whole forest
    pub fn to_threads(&self) -> Vec<ThreadNode> {
        self.roots.iter().map(|id| self.build_thread(*id)).collect()
    }

    fn build_thread(&self, id: NodeId) -> ThreadNode {
        let node = &self.nodes[id.0];
        ThreadNode {
            id: node.id,
            role: node.role,
            content: node.content.clone(),
            children: node
                .children
                .iter()
                .map(|child| self.build_thread(*child))
                .collect(),
        }
    }

    fn insert(&mut self, message: Message, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ConversationNode {
            id,
            role: message.role,
            content: message.content,
            parent,
            children: Vec::new(),
        });
        id
    }
}

/// Pre-order iterator over a [`Conversation`], yielding `(depth, node)`
pub struct Traversal<'a> {
    conversation: &'a Conversation,
    stack: Vec<(usize, NodeId)>,
}

impl<'a> Iterator for Traversal<'a> {
    type Item = (usize, &'a ConversationNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, id) = self.stack.pop()?;
        let node = &self.conversation.nodes[id.0];
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, *child)));
        Some((depth, node))
    }
}

/// A node in the nested thread view of a conversation
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ThreadNode {
    /// The id of the node
    pub id: NodeId,
    /// Who produced the content
    pub role: Role,
    /// The raw content
    pub content: String,
    /// Follow-up threads, in insertion order
    pub children: Vec<ThreadNode>,
}
