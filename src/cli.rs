//! CLI module
//!
//! This module provides the command-line interface for the studymate tool.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{
        client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS},
        types::{DEFAULT_CONTEXT_CHUNKS, DEFAULT_ITEM_COUNT},
        Client, ClientConfig, Difficulty, FlashcardRequest, HttpClientImpl, QuizRequest,
    },
    guide::{get_guide_string, GuideMode},
    models::{NodeId, Role, ThreadNode},
    parser::{extract_flashcards, extract_quiz, Choice, ExtractionError, Flashcard, QuizRecord},
    render::{LeafRenderer, MathMarkdown},
    storage::{LocalStore, RecordId, Score},
    tutor::{Exchange, Tutor, TutorMode},
};

/// Shown when generated text held nothing usable
const UNUSABLE_CONTENT_MESSAGE: &str = "could not generate usable content, try again or rephrase";

/// Width of a node preview in the tree view
const PREVIEW_CHARS: usize = 72;

type StdinLines = Lines<BufReader<Stdin>>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Answer-generation service URL
    #[arg(long, global = true, env = "STUDYMATE_SERVER", default_value = DEFAULT_BASE_URL)]
    server: String,

    /// Directory for saved notes, decks and quizzes
    #[arg(long, global = true, env = "STUDYMATE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "STUDYMATE_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,
    },

    /// Start a branching chat session
    Chat {
        /// Answer from the uploaded document instead of general knowledge
        #[arg(long)]
        document: bool,

        /// Document chunks used as context (document mode only)
        #[arg(long, default_value_t = DEFAULT_CONTEXT_CHUNKS)]
        context_chunks: u32,
    },

    /// Generate and take a multiple-choice quiz
    Quiz {
        /// What the quiz is about
        #[arg(short, long)]
        topic: String,

        #[arg(short, long, value_enum, default_value_t = Difficulty::Medium)]
        difficulty: Difficulty,

        /// Number of questions (1 to 10)
        #[arg(short = 'n', long, default_value_t = DEFAULT_ITEM_COUNT)]
        count: u32,

        /// Show the answers instead of asking for them
        #[arg(long)]
        reveal: bool,

        /// Save the quiz and score
        #[arg(long)]
        save: bool,
    },

    /// Generate a set of flashcards
    Flashcards {
        /// What the cards are about
        #[arg(short, long)]
        subject: String,

        /// Number of cards
        #[arg(short = 'n', long, default_value_t = DEFAULT_ITEM_COUNT)]
        count: u32,

        /// Save the cards as a deck
        #[arg(long)]
        save: bool,
    },

    /// Saved notes
    Notes {
        #[command(subcommand)]
        command: NoteCommands,
    },

    /// Saved flashcard decks
    Decks {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Saved quizzes
    Quizzes {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// The document held by the service
    Document {
        #[command(subcommand)]
        command: DocumentCommands,
    },

    /// Show how to use this tool
    Guide,

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// List saved notes
    List,

    /// Save a note
    Add {
        /// Note text
        content: String,
    },

    /// Delete a note by id
    Delete { id: RecordId },
}

#[derive(Subcommand)]
enum RecordCommands {
    /// List saved records
    List,

    /// Show one record
    Show { id: RecordId },

    /// Delete a record by id
    Delete { id: RecordId },
}

#[derive(Subcommand)]
enum DocumentCommands {
    /// Show whether a document is loaded
    Status,

    /// Drop the uploaded document
    Clear,

    /// Ask a question about the document
    Ask {
        question: String,

        #[arg(long, default_value_t = DEFAULT_CONTEXT_CHUNKS)]
        context_chunks: u32,
    },
}

/// Run the CLI application
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match &cli.command {
        Commands::Ask { question } => {
            let tutor = Tutor::new(create_client(&cli)?, TutorMode::General);
            let exchange = tutor.send(question).await?;
            print_reply(&tutor, &exchange);
            Ok(())
        }

        Commands::Chat {
            document,
            context_chunks,
        } => {
            let mode = if *document {
                TutorMode::Document {
                    context_chunks: *context_chunks,
                }
            } else {
                TutorMode::General
            };
            let tutor = Tutor::new(create_client(&cli)?, mode);
            chat(&tutor, &create_store(&cli)).await
        }

        Commands::Quiz {
            topic,
            difficulty,
            count,
            reveal,
            save,
        } => {
            let client = create_client(&cli)?;
            let text = client
                .generate_quiz(QuizRequest::new(topic.clone(), *difficulty, *count))
                .await?;
            let questions = match extract_quiz(&text) {
                Ok(questions) => questions,
                Err(err) => return unusable(err),
            };

            let answers = if *reveal {
                reveal_quiz(&questions);
                BTreeMap::new()
            } else {
                let answers = take_quiz(&questions).await?;
                let score = Score::calculate(&questions, &answers);
                println!(
                    "\nScore: {}/{} ({}%)",
                    score.correct, score.total, score.percentage
                );
                answers
            };

            if *save {
                let saved = create_store(&cli).save_quiz(topic.clone(), *difficulty, questions, answers)?;
                println!("Saved quiz with ID: {}", saved.id);
            }
            Ok(())
        }

        Commands::Flashcards {
            subject,
            count,
            save,
        } => {
            let client = create_client(&cli)?;
            let text = client
                .generate_flashcards(FlashcardRequest::new(subject.clone(), *count))
                .await?;
            let cards = match extract_flashcards(&text) {
                Ok(cards) => cards,
                Err(err) => return unusable(err),
            };

            print_cards(&cards);

            if *save {
                let saved = create_store(&cli).save_flashcard_set(subject.clone(), cards)?;
                println!("\nSaved deck with ID: {}", saved.id);
            }
            Ok(())
        }

        Commands::Notes { command } => {
            let store = create_store(&cli);
            match command {
                NoteCommands::List => {
                    let notes = store.notes()?;
                    if notes.is_empty() {
                        println!("No saved notes.");
                    }
                    for note in notes {
                        println!(
                            "[{}] {}  {}",
                            note.id,
                            note.created_at.format("%Y-%m-%d %H:%M"),
                            note.content
                        );
                    }
                }
                NoteCommands::Add { content } => {
                    let note = store.save_note(content.trim())?;
                    println!("Saved note with ID: {}", note.id);
                }
                NoteCommands::Delete { id } => report_delete("note", *id, store.delete_note(*id)?),
            }
            Ok(())
        }

        Commands::Decks { command } => {
            let store = create_store(&cli);
            match command {
                RecordCommands::List => {
                    let decks = store.flashcard_sets()?;
                    if decks.is_empty() {
                        println!("No saved decks.");
                    }
                    for deck in decks {
                        println!(
                            "[{}] {} ({} cards, {})",
                            deck.id,
                            deck.subject,
                            deck.cards.len(),
                            deck.created_at.format("%Y-%m-%d")
                        );
                    }
                }
                RecordCommands::Show { id } => match store.flashcard_set(*id)? {
                    Some(deck) => {
                        println!("{}\n", deck.subject.bold());
                        print_cards(&deck.cards);
                    }
                    None => return Err(format!("No deck with ID {}", id).into()),
                },
                RecordCommands::Delete { id } => {
                    report_delete("deck", *id, store.delete_flashcard_set(*id)?)
                }
            }
            Ok(())
        }

        Commands::Quizzes { command } => {
            let store = create_store(&cli);
            match command {
                RecordCommands::List => {
                    let quizzes = store.quizzes()?;
                    if quizzes.is_empty() {
                        println!("No saved quizzes.");
                    }
                    for quiz in quizzes {
                        println!(
                            "[{}] {} ({}) {}/{} ({}%)",
                            quiz.id,
                            quiz.topic,
                            quiz.difficulty,
                            quiz.score.correct,
                            quiz.score.total,
                            quiz.score.percentage
                        );
                    }
                }
                RecordCommands::Show { id } => match store.quiz(*id)? {
                    Some(quiz) => {
                        println!(
                            "{} ({}), scored {}%\n",
                            quiz.topic.bold(),
                            quiz.difficulty,
                            quiz.score.percentage
                        );
                        for (idx, question) in quiz.questions.iter().enumerate() {
                            print_question(idx, question);
                            let given = quiz
                                .user_answers
                                .get(&idx)
                                .map(|c| c.to_string())
                                .unwrap_or_else(|| "-".to_string());
                            print_answer(question);
                            println!("  Your answer: {}\n", given);
                        }
                    }
                    None => return Err(format!("No quiz with ID {}", id).into()),
                },
                RecordCommands::Delete { id } => {
                    report_delete("quiz", *id, store.delete_quiz(*id)?)
                }
            }
            Ok(())
        }

        Commands::Document { command } => {
            let client = create_client(&cli)?;
            match command {
                DocumentCommands::Status => {
                    let status = client.document_status().await?;
                    if status.pdf_loaded {
                        println!(
                            "Document loaded ({} chunks available)",
                            status.chunks_available
                        );
                    } else {
                        println!("No document loaded.");
                    }
                }
                DocumentCommands::Clear => {
                    let response = client.clear_document().await?;
                    println!("{}", response.message);
                }
                DocumentCommands::Ask {
                    question,
                    context_chunks,
                } => {
                    let tutor = Tutor::new(
                        client,
                        TutorMode::Document {
                            context_chunks: *context_chunks,
                        },
                    );
                    let exchange = tutor.send(question).await?;
                    print_reply(&tutor, &exchange);
                }
            }
            Ok(())
        }

        Commands::Guide => {
            println!("{}", get_guide_string(GuideMode::Cli));
            Ok(())
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn create_client(cli: &Cli) -> Result<Arc<dyn Client>, Box<dyn std::error::Error>> {
    let config = ClientConfig {
        base_url: cli.server.clone(),
        timeout: Duration::from_secs(cli.timeout),
    };

    Ok(Arc::new(HttpClientImpl::with_config(config)?))
}

fn create_store(cli: &Cli) -> LocalStore {
    LocalStore::new(cli.data_dir.clone().unwrap_or_else(LocalStore::default_root))
}

fn unusable(err: ExtractionError) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!(error = %err, "generated text had no usable records");
    Err(UNUSABLE_CONTENT_MESSAGE.into())
}

fn report_delete(kind: &str, id: RecordId, removed: bool) {
    if removed {
        println!("Deleted {} {}", kind, id);
    } else {
        println!("No {} with ID {}", kind, id);
    }
}

/// A line typed in a chat session
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatCommand {
    Ask(String),
    Expand(NodeId, String),
    Cancel,
    Tree,
    Note(String),
    Export(PathBuf),
    Help,
    Quit,
    Nothing,
}

fn parse_chat_line(line: &str) -> Result<ChatCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ChatCommand::Nothing);
    }
    let Some(command) = line.strip_prefix(':') else {
        return Ok(ChatCommand::Ask(line.to_string()));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "expand" => {
            let (id, text) = rest
                .split_once(char::is_whitespace)
                .ok_or("usage: :expand <id> <text>")?;
            let id = id.parse::<NodeId>().map_err(|_| format!("not a node id: {}", id))?;
            Ok(ChatCommand::Expand(id, text.trim().to_string()))
        }
        "cancel" => Ok(ChatCommand::Cancel),
        "tree" => Ok(ChatCommand::Tree),
        "note" if !rest.is_empty() => Ok(ChatCommand::Note(rest.to_string())),
        "note" => Err("usage: :note <text>".to_string()),
        "export" if !rest.is_empty() => Ok(ChatCommand::Export(PathBuf::from(rest))),
        "export" => Err("usage: :export <path>".to_string()),
        "help" => Ok(ChatCommand::Help),
        "quit" | "q" => Ok(ChatCommand::Quit),
        other => Err(format!("unknown command :{} (try :help)", other)),
    }
}

async fn chat(tutor: &Tutor, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type a question, or :help for commands.");

    loop {
        let prompt = match tutor.pending_expansion() {
            Some(pending) => format!("[follow-up on {}] > ", pending.parent_id),
            None => "> ".to_string(),
        };
        let Some(line) = read_line(&mut lines, &prompt).await? else {
            break;
        };

        let command = match parse_chat_line(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message.yellow());
                continue;
            }
        };

        match command {
            ChatCommand::Nothing => {}
            ChatCommand::Ask(question) => match tutor.send(&question).await {
                Ok(exchange) => print_reply(tutor, &exchange),
                Err(err) => println!("{}", err.to_string().yellow()),
            },
            ChatCommand::Expand(id, text) => match tutor.begin_expansion(id, text) {
                Ok(()) => println!("Ask your follow-up on node {}.", id),
                Err(err) => println!("{}", err.to_string().yellow()),
            },
            ChatCommand::Cancel => match tutor.cancel_expansion() {
                Some(pending) => println!("Dropped the follow-up on node {}.", pending.parent_id),
                None => println!("No follow-up pending."),
            },
            ChatCommand::Tree => {
                let threads = tutor.with_conversation(|conversation| conversation.to_threads());
                if threads.is_empty() {
                    println!("Nothing asked yet.");
                }
                print_thread_tree(&threads, 0);
            }
            ChatCommand::Note(text) => {
                let note = store.save_note(text)?;
                println!("Saved note with ID: {}", note.id);
            }
            ChatCommand::Export(path) => {
                let threads = tutor.with_conversation(|conversation| conversation.to_threads());
                std::fs::write(&path, serde_json::to_string_pretty(&threads)?)?;
                println!("Wrote {} threads to {}", threads.len(), path.display());
            }
            ChatCommand::Help => println!("{}", get_guide_string(GuideMode::Chat)),
            ChatCommand::Quit => break,
        }
    }

    Ok(())
}

async fn read_line(lines: &mut StdinLines, prompt: &str) -> io::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    lines.next_line().await
}

/// Prints the question and reply of a settled exchange
fn print_reply(tutor: &Tutor, exchange: &Exchange) {
    let renderer = tutor.renderer();
    tutor.with_conversation(|conversation| {
        let Some(reply) = exchange.reply.and_then(|id| conversation.find(id)) else {
            return;
        };
        let label = format!("[{}]", reply.id());
        let body = renderer.render_node(reply);
        match reply.role() {
            Role::Assistant => println!("{} {}", label.green(), body),
            Role::Error => println!("{} {}", label.red(), body.red()),
            Role::User => println!("{} {}", label.cyan(), body),
        }
    });
}

fn print_thread_tree(nodes: &[ThreadNode], indent: usize) {
    for node in nodes {
        let indent_str = "  ".repeat(indent);
        let label = format!("[{}]", node.id);
        let label = match node.role {
            Role::User => label.cyan(),
            Role::Assistant => label.green(),
            Role::Error => label.red(),
        };

        println!("{}{} {}: {}", indent_str, label, node.role, preview(&node.content));

        if !node.children.is_empty() {
            print_thread_tree(&node.children, indent + 1);
        }
    }
}

/// First line of `content`, cut to the preview width
fn preview(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or("");
    let mut out: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if out.len() < content.len() {
        out.push('…');
    }
    out
}

fn print_question(idx: usize, question: &QuizRecord) {
    let renderer = MathMarkdown;
    println!("Q{}. {}", idx + 1, renderer.render(&question.question).bold());
    for choice in Choice::ALL {
        println!("  {}. {}", choice, renderer.render(question.option(choice)));
    }
}

fn print_answer(question: &QuizRecord) {
    if let Some(correct) = question.correct_answer {
        println!("  Correct answer: {}", correct.to_string().green());
    }
    if !question.explanation.is_empty() {
        println!("  {}", MathMarkdown.render(&question.explanation));
    }
}

fn reveal_quiz(questions: &[QuizRecord]) {
    for (idx, question) in questions.iter().enumerate() {
        print_question(idx, question);
        print_answer(question);
        println!();
    }
}

async fn take_quiz(questions: &[QuizRecord]) -> io::Result<BTreeMap<usize, Choice>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut answers = BTreeMap::new();

    for (idx, question) in questions.iter().enumerate() {
        print_question(idx, question);
        let choice = loop {
            let Some(line) = read_line(&mut lines, "Your answer (A-D, blank to skip): ").await?
            else {
                return Ok(answers);
            };
            let line = line.trim();
            if line.is_empty() {
                break None;
            }
            match line.parse::<Choice>() {
                Ok(choice) => break Some(choice),
                Err(message) => println!("{}", message.yellow()),
            }
        };

        match choice {
            Some(choice) => {
                answers.insert(idx, choice);
                if question.correct_answer == Some(choice) {
                    println!("{}", "Correct!".green());
                } else {
                    println!("{}", "Incorrect.".red());
                }
            }
            None => println!("Skipped."),
        }
        print_answer(question);
        println!();
    }

    Ok(answers)
}

fn print_cards(cards: &[Flashcard]) {
    let renderer = MathMarkdown;
    for (idx, card) in cards.iter().enumerate() {
        println!("{}. {}", idx + 1, renderer.render(&card.question).bold());
        println!("   {}", renderer.render(&card.answer));
    }
}
