//! Guide module for generating usage help
//!
//! The same material is shown by `studymate guide` and by `:help` inside a
//! chat session; each mode picks the sections that make sense there.

/// Mode for guide generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideMode {
    /// The full command-line guide
    Cli,
    /// The short help shown inside a chat session
    Chat,
}

/// Generate the guide string for the specified mode
pub fn get_guide_string(mode: GuideMode) -> String {
    let config = match mode {
        GuideMode::Cli => GuideConfig::cli(),
        GuideMode::Chat => GuideConfig::chat(),
    };

    let mut sections = vec![format!("=== {} ===", config.title)];
    if config.include_overview {
        sections.push(get_overview_section().to_string());
    }
    sections.push(get_threads_section().to_string());
    sections.push(config.command_reference);
    if let Some(tips) = config.tips {
        sections.push(tips);
    }

    sections.join("\n\n")
}

struct GuideConfig {
    title: &'static str,
    include_overview: bool,
    command_reference: String,
    tips: Option<String>,
}

impl GuideConfig {
    fn cli() -> Self {
        Self {
            title: "STUDYMATE GUIDE",
            include_overview: true,
            command_reference: r#"== COMMAND REFERENCE ==

GLOBAL FLAGS:
  --server <url>        Generation service URL (env STUDYMATE_SERVER, default http://127.0.0.1:8000)
  --data-dir <path>     Where notes, decks and quizzes are kept (env STUDYMATE_DATA_DIR)
  --timeout <secs>      Request timeout (env STUDYMATE_TIMEOUT, default 60)

TUTORING:
  $ studymate ask "<question>"                     Ask one question and print the answer
  $ studymate chat                                 Start a branching chat session
  $ studymate chat --document [--context-chunks N] Chat about the uploaded document

PRACTICE:
  $ studymate quiz --topic <T> [--difficulty easy|medium|hard] [--count N] [--reveal] [--save]
  $ studymate flashcards --subject <S> [--count N] [--save]

SAVED MATERIAL:
  $ studymate notes list | add "<text>" | delete <id>
  $ studymate decks list | show <id> | delete <id>
  $ studymate quizzes list | show <id> | delete <id>

DOCUMENT:
  $ studymate document status                      Is a document loaded, and how many chunks
  $ studymate document clear                       Drop the uploaded document
  $ studymate document ask "<question>" [--context-chunks N]

HELP & UTILITIES:
  $ studymate guide                                Show this guide
  $ studymate completions <SHELL>                  Generate shell completions"#
                .to_string(),
            tips: Some(get_tips_section().to_string()),
        }
    }

    fn chat() -> Self {
        Self {
            title: "CHAT HELP",
            include_overview: false,
            command_reference: format!(
                r#"== CHAT COMMANDS ==

  <text>                 Ask a question (or answer the pending follow-up)
  {expand:<22} Follow up on part of answer <id>
  :cancel                Drop the pending follow-up
  :tree                  Show the conversation with node ids
  :note <text>           Save a note
  :export <path>         Write the conversation threads as JSON
  :help                  Show this help
  :quit                  Leave the session"#,
                expand = ":expand <id> <text>"
            ),
            tips: None,
        }
    }
}

fn get_overview_section() -> &'static str {
    r#"== OVERVIEW ==

Studymate is a study companion on top of an answer-generation service. It
keeps a branching conversation with a tutor, generates multiple-choice
quizzes and flashcards, and saves notes, decks and quiz results locally."#
}

fn get_threads_section() -> &'static str {
    r#"== FOLLOW-UP THREADS ==

Every question and answer in a chat gets a node id. To dig into part of an
answer, expand it with the passage you care about:

  :expand 3 tangent line
  why is it the limit of secant lines?

The follow-up and its answer are nested under node 3. Other threads are left
untouched, so one session can branch as far as you like."#
}

fn get_tips_section() -> &'static str {
    r#"== TIPS ==

  • Quizzes and flashcards are generated text. When nothing usable comes
    back, try again or rephrase the topic.
  • Set RUST_LOG=studymate=debug to see requests and dropped records."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_guide_has_all_sections() {
        let guide = get_guide_string(GuideMode::Cli);
        assert!(guide.starts_with("=== STUDYMATE GUIDE ==="));
        assert!(guide.contains("== OVERVIEW =="));
        assert!(guide.contains("== COMMAND REFERENCE =="));
        assert!(guide.contains("== TIPS =="));
    }

    #[test]
    fn test_chat_help_lists_repl_commands() {
        let help = get_guide_string(GuideMode::Chat);
        assert!(!help.contains("== OVERVIEW =="));
        for command in [":expand <id> <text>", ":cancel", ":tree", ":note", ":export", ":quit"] {
            assert!(help.contains(command), "missing {}", command);
        }
    }
}
