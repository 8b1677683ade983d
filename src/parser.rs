//! Structured response parsing
//!
//! The generation service returns free text with no guaranteed schema. These
//! functions pull quiz questions and flashcards out of that text, keep what
//! matches the expected shape and silently drop the rest.
//!
//! | Function | Input shape | Filtering |
//! |----------|-------------|-----------|
//! | [`parse_quiz`] | `Q1.` blocks with `A.`–`D.`, `Correct Answer:`, `Explanation:` | none |
//! | [`extract_quiz`] | same | invalid records dropped, empty result is an error |
//! | [`parse_flashcards`] | repeated `Q:` … `A:` pairs | none |
//! | [`extract_flashcards`] | same | cards without an answer dropped, empty result is an error |

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

lazy_static! {
    static ref QUESTION_MARKER: Regex = Regex::new(r"Q\d+\.").expect("question marker pattern");
    static ref CORRECT_ANSWER: Regex =
        Regex::new(r"^Correct Answer:\s*([A-D])\b").expect("correct answer pattern");
}

const CORRECT_ANSWER_PREFIX: &str = "Correct Answer:";
const EXPLANATION_PREFIX: &str = "Explanation:";
const FLASHCARD_QUESTION: &str = "Q:";
const FLASHCARD_ANSWER: &str = "A:";

/// Errors reported when generated text yields nothing usable
///
/// These are distinct from transport or service failures: the call worked,
/// the text just did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("no valid questions could be extracted from the generated text")]
    NoValidQuestions,

    #[error("no usable flashcards could be extracted from the generated text")]
    NoUsableFlashcards,
}

/// A multiple-choice label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

impl Choice {
    pub const ALL: [Choice; 4] = [Choice::A, Choice::B, Choice::C, Choice::D];

    /// Gets the single-letter label
    pub fn label(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
            Choice::D => "D",
        }
    }

    /// Splits an option line such as `B. Paris` into its label and text
    fn strip_option_prefix(line: &str) -> Option<(Choice, &str)> {
        Choice::ALL.into_iter().find_map(|choice| {
            line.strip_prefix(choice.label())
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|text| (choice, text))
        })
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Choice {
    type Err = String;

    /// Accepts a single letter, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Choice::A),
            "B" => Ok(Choice::B),
            "C" => Ok(Choice::C),
            "D" => Ok(Choice::D),
            other => Err(format!("'{}' is not one of A, B, C or D", other)),
        }
    }
}

/// One quiz question recovered from generated text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRecord {
    pub question: String,
    pub options: BTreeMap<Choice, String>,
    pub correct_answer: Option<Choice>,
    pub explanation: String,
}

impl QuizRecord {
    /// Gets the text of one option, empty when missing
    pub fn option(&self, choice: Choice) -> &str {
        self.options.get(&choice).map(String::as_str).unwrap_or("")
    }

    /// True when the question, all four options and the answer are present
    pub fn is_valid(&self) -> bool {
        !self.question.is_empty()
            && Choice::ALL.iter().all(|c| !self.option(*c).is_empty())
            && self.correct_answer.is_some()
    }
}

/// Parses every `Q<n>.` block in `text`, valid or not, in source order.
///
/// Anything before the first marker is discarded.
pub fn parse_quiz(text: &str) -> Vec<QuizRecord> {
    QUESTION_MARKER
        .split(text)
        .skip(1)
        .map(parse_quiz_block)
        .collect()
}

/// Parses `text` and keeps only valid records.
///
/// Returns [`ExtractionError::NoValidQuestions`] when nothing survives.
pub fn extract_quiz(text: &str) -> Result<Vec<QuizRecord>, ExtractionError> {
    let parsed = parse_quiz(text);
    let total = parsed.len();
    let valid: Vec<QuizRecord> = parsed.into_iter().filter(QuizRecord::is_valid).collect();

    if valid.len() < total {
        debug!(
            dropped = total - valid.len(),
            kept = valid.len(),
            "dropped malformed quiz records"
        );
    }

    if valid.is_empty() {
        Err(ExtractionError::NoValidQuestions)
    } else {
        Ok(valid)
    }
}

fn parse_quiz_block(block: &str) -> QuizRecord {
    let mut lines = block.lines().map(str::trim).skip_while(|line| line.is_empty());
    let mut record = QuizRecord {
        question: lines.next().unwrap_or_default().to_string(),
        ..QuizRecord::default()
    };
    let rest: Vec<&str> = lines.collect();

    let mut i = 0;
    while i < rest.len() {
        let line = rest[i];

        if let Some((choice, text)) = Choice::strip_option_prefix(line) {
            record.options.insert(choice, text.trim().to_string());
        } else if line.starts_with(CORRECT_ANSWER_PREFIX) {
            record.correct_answer = CORRECT_ANSWER
                .captures(line)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok());
        } else if let Some(first) = line.strip_prefix(EXPLANATION_PREFIX) {
            let mut parts = vec![first.trim()];
            // explanation runs until the next option or answer line
            while i + 1 < rest.len() && !ends_explanation(rest[i + 1]) {
                i += 1;
                parts.push(rest[i]);
            }
            record.explanation = parts
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }

        i += 1;
    }

    record
}

fn ends_explanation(line: &str) -> bool {
    Choice::strip_option_prefix(line).is_some() || line.starts_with(CORRECT_ANSWER_PREFIX)
}

/// A question/answer pair recovered from generated text
///
/// The answer is `None` when a segment had no `A:` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardRecord {
    pub question: String,
    pub answer: Option<String>,
}

/// A flashcard with both sides present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// Splits `text` into `Q:`/`A:` pairs, positionally.
///
/// The preamble before the first `Q:` is discarded. Each segment is split
/// once on `A:`; segments without one keep a `None` answer.
pub fn parse_flashcards(text: &str) -> Vec<FlashcardRecord> {
    text.split(FLASHCARD_QUESTION)
        .skip(1)
        .map(|segment| match segment.split_once(FLASHCARD_ANSWER) {
            Some((question, answer)) => FlashcardRecord {
                question: question.trim().to_string(),
                answer: Some(answer.trim().to_string()),
            },
            None => FlashcardRecord {
                question: segment.trim().to_string(),
                answer: None,
            },
        })
        .collect()
}

/// Parses `text` and keeps only cards with a question and a non-empty answer.
///
/// Returns [`ExtractionError::NoUsableFlashcards`] when nothing survives.
pub fn extract_flashcards(text: &str) -> Result<Vec<Flashcard>, ExtractionError> {
    let parsed = parse_flashcards(text);
    let total = parsed.len();
    let cards: Vec<Flashcard> = parsed
        .into_iter()
        .filter_map(|record| match record.answer {
            Some(answer) if !answer.is_empty() && !record.question.is_empty() => Some(Flashcard {
                question: record.question,
                answer,
            }),
            _ => None,
        })
        .collect();

    if cards.len() < total {
        debug!(
            dropped = total - cards.len(),
            kept = cards.len(),
            "dropped incomplete flashcards"
        );
    }

    if cards.is_empty() {
        Err(ExtractionError::NoUsableFlashcards)
    } else {
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const THREE_QUESTIONS: &str = "Here is your quiz!

Q1. What is 2 + 2?
A. 3
B. 4
C. 5
D. 22
Correct Answer: B
Explanation: Basic addition.

Q2. Which planet is largest?
A. Mars
B. Venus
C. Jupiter
D. Earth
Correct Answer: C
Explanation: Jupiter is a gas giant.

Q3. What is H2O?
A. Water
B. Salt
C. Sugar
D. Iron
Correct Answer: A
Explanation: Two hydrogens, one oxygen.
";

    #[test]
    fn test_three_well_formed_blocks() {
        let records = extract_quiz(THREE_QUESTIONS).unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(QuizRecord::is_valid));
        assert_eq!(records[0].question, "What is 2 + 2?");
        assert_eq!(records[1].question, "Which planet is largest?");
        assert_eq!(records[2].question, "What is H2O?");
        assert_eq!(records[0].option(Choice::B), "4");
        assert_eq!(records[1].correct_answer, Some(Choice::C));
        assert_eq!(records[2].explanation, "Two hydrogens, one oxygen.");
    }

    #[test]
    fn test_preamble_is_discarded() {
        let records = parse_quiz(THREE_QUESTIONS);
        assert_eq!(records.len(), 3);
        assert!(!records.iter().any(|r| r.question.contains("Here is your quiz")));
    }

    #[test]
    fn test_block_missing_option_is_dropped() {
        let text = "Q1. Pick one
A. a
B. b
C. c
Correct Answer: A

Q2. Pick another
A. a
B. b
C. c
D. d
Correct Answer: D";
        let records = extract_quiz(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "Pick another");
    }

    #[test]
    fn test_only_block_missing_option_yields_no_valid_questions() {
        let text = "Q1. Pick one\nA. a\nB. b\nC. c\nCorrect Answer: A";
        assert_eq!(parse_quiz(text).len(), 1);
        assert_eq!(extract_quiz(text), Err(ExtractionError::NoValidQuestions));
    }

    #[test]
    fn test_correct_answer_letter_extraction() {
        let valid = parse_quiz("Q1. q\nA. a\nB. b\nC. c\nD. d\nCorrect Answer: B");
        assert_eq!(valid[0].correct_answer, Some(Choice::B));

        let invalid_text = "Q1. q\nA. a\nB. b\nC. c\nD. d\nCorrect Answer: Z";
        let invalid = parse_quiz(invalid_text);
        assert_eq!(invalid[0].correct_answer, None);
        assert!(!invalid[0].is_valid());
        assert_eq!(
            extract_quiz(invalid_text),
            Err(ExtractionError::NoValidQuestions)
        );
    }

    #[test]
    fn test_correct_answer_without_space_and_with_trailing_text() {
        let records = parse_quiz("Q1. q\nA. a\nB. b\nC. c\nD. d\nCorrect Answer:D) because");
        assert_eq!(records[0].correct_answer, Some(Choice::D));

        let records = parse_quiz("Q1. q\nA. a\nB. b\nC. c\nD. d\nCorrect Answer: Bob");
        assert_eq!(records[0].correct_answer, None);
    }

    #[test]
    fn test_multiline_explanation_is_joined_with_spaces() {
        let text = "Q1. Why is the sky blue?
A. Paint
B. Rayleigh scattering
C. Oceans
D. Magic
Correct Answer: B
Explanation: Shorter wavelengths
scatter more strongly in air.
Q2. Next question";
        let records = parse_quiz(text);
        assert_eq!(
            records[0].explanation,
            "Shorter wavelengths scatter more strongly in air."
        );
        assert_eq!(records[1].question, "Next question");
    }

    #[test]
    fn test_explanation_stops_at_option_or_answer_line() {
        let text = "Q1. q
Explanation: early
still explaining
A. a
B. b
C. c
D. d
Correct Answer: A";
        let records = parse_quiz(text);
        assert_eq!(records[0].explanation, "early still explaining");
        assert!(records[0].is_valid());
    }

    #[test]
    fn test_question_is_first_non_empty_line() {
        let records = parse_quiz("Q1.\n\n   Leading blank lines?\nA. a");
        assert_eq!(records[0].question, "Leading blank lines?");
        assert_eq!(records[0].option(Choice::A), "a");
        assert_eq!(records[0].option(Choice::B), "");
    }

    #[test]
    fn test_no_markers() {
        assert!(parse_quiz("nothing useful here").is_empty());
        assert_eq!(
            extract_quiz("nothing useful here"),
            Err(ExtractionError::NoValidQuestions)
        );
    }

    #[test]
    fn test_flashcards_inline_pairs() {
        let cards = parse_flashcards("Q: 2+2? A: 4 Q: 3+3? A: 6");
        assert_eq!(
            cards,
            vec![
                FlashcardRecord {
                    question: "2+2?".to_string(),
                    answer: Some("4".to_string()),
                },
                FlashcardRecord {
                    question: "3+3?".to_string(),
                    answer: Some("6".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_flashcard_without_answer_marker() {
        let cards = parse_flashcards("Intro\nQ: orphan question\nQ: real? A: yes");
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].question, "orphan question");
        assert_eq!(cards[0].answer, None);

        let usable = extract_flashcards("Intro\nQ: orphan question\nQ: real? A: yes").unwrap();
        assert_eq!(
            usable,
            vec![Flashcard {
                question: "real?".to_string(),
                answer: "yes".to_string(),
            }]
        );
    }

    #[test]
    fn test_flashcard_answer_keeps_text_after_second_marker() {
        let cards = parse_flashcards("Q: Vitamin? A: A: retinol");
        assert_eq!(cards[0].answer.as_deref(), Some("A: retinol"));
    }

    #[test]
    fn test_no_usable_flashcards() {
        assert_eq!(
            extract_flashcards("Q: only questions\nQ: here"),
            Err(ExtractionError::NoUsableFlashcards)
        );
        assert_eq!(
            extract_flashcards("no markers at all"),
            Err(ExtractionError::NoUsableFlashcards)
        );
    }

    #[test]
    fn test_choice_from_str() {
        assert_eq!("b".parse::<Choice>(), Ok(Choice::B));
        assert_eq!(" D ".parse::<Choice>(), Ok(Choice::D));
        assert!("E".parse::<Choice>().is_err());
    }
}
