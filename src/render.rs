//! Leaf content rendering
//!
//! A conversation stores raw text. How an answer is shown is a capability
//! chosen by the call site: verbatim, or normalised for markdown with inline
//! math.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::models::{ConversationNode, Role};

lazy_static! {
    static ref PADDED_BOLD: Regex = Regex::new(r"\*\*\s*([^*]+?)\s*\*\*").expect("bold pattern");
    // leftmost alternative wins, so a \frac or \int swallows the terms inside it
    static ref BARE_MATH: Regex = Regex::new(concat!(
        r"\\frac\{[^{}]+\}\{[^{}]+\}",
        r"|\\int[^$]+?dx",
        r"|[a-zA-Z]\^[0-9a-zA-Z]+",
        r"|\b[a-zA-Z]\([a-zA-Z]\)",
        r"|\\(?:neq|leq|geq|alpha|beta|sum|prod)\b",
    ))
    .expect("bare math pattern");
}

/// How to turn a node's raw content into displayable text
pub trait LeafRenderer: Send + Sync {
    fn render(&self, content: &str) -> String;

    /// Renders a node; user text is always shown verbatim
    fn render_node(&self, node: &ConversationNode) -> String {
        match node.role() {
            Role::Assistant => self.render(node.content()),
            Role::User | Role::Error => node.content().to_string(),
        }
    }
}

/// Shows content exactly as generated
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl LeafRenderer for PlainText {
    fn render(&self, content: &str) -> String {
        content.to_string()
    }
}

/// Normalises generated text for markdown with `$…$` math
///
/// Outside existing math spans, bare expressions (`x^2`, `f(x)`,
/// `\frac{a}{b}`, `\int … dx`, a few symbol commands) are wrapped in `$…$`.
/// A math span left open at the end is closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathMarkdown;

impl LeafRenderer for MathMarkdown {
    fn render(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len() + 8);

        for segment in split_math(content) {
            match segment {
                Segment::Prose(text) => {
                    let bold = PADDED_BOLD.replace_all(text, "**$1**");
                    let wrapped =
                        BARE_MATH.replace_all(&bold, |caps: &Captures| format!("${}$", &caps[0]));
                    out.push_str(&wrapped);
                }
                Segment::Math(text) => out.push_str(text),
                Segment::Unclosed { text, delimiter } => {
                    out.push_str(text);
                    out.push_str(delimiter);
                }
            }
        }

        out
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Prose(&'a str),
    /// A math span including its delimiters
    Math(&'a str),
    /// A math span that runs to the end of the text without closing
    Unclosed {
        text: &'a str,
        delimiter: &'static str,
    },
}

fn split_math(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find('$') {
        if start > 0 {
            segments.push(Segment::Prose(&rest[..start]));
        }
        let delimiter = if rest[start..].starts_with("$$") {
            "$$"
        } else {
            "$"
        };
        let body = start + delimiter.len();

        match rest[body..].find(delimiter) {
            Some(offset) => {
                let end = body + offset + delimiter.len();
                segments.push(Segment::Math(&rest[start..end]));
                rest = &rest[end..];
            }
            None => {
                segments.push(Segment::Unclosed {
                    text: &rest[start..],
                    delimiter,
                });
                return segments;
            }
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Prose(rest));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conversation, Message};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_verbatim() {
        assert_eq!(PlainText.render("x^2 **bold **"), "x^2 **bold **");
    }

    #[test]
    fn test_wraps_superscripts_and_function_application() {
        assert_eq!(
            MathMarkdown.render("The derivative of x^2 is f(x) scaled"),
            "The derivative of $x^2$ is $f(x)$ scaled"
        );
    }

    #[test]
    fn test_leaves_existing_math_alone() {
        let text = "Already $x^2 + y^2$ and $$\\frac{a}{b}$$ done";
        assert_eq!(MathMarkdown.render(text), text);
    }

    #[test]
    fn test_fraction_is_wrapped_whole() {
        assert_eq!(
            MathMarkdown.render("so \\frac{x^2}{2} follows"),
            "so $\\frac{x^2}{2}$ follows"
        );
    }

    #[test]
    fn test_integral_and_commands() {
        assert_eq!(
            MathMarkdown.render("compute \\int 3t dx where a \\neq b"),
            "compute $\\int 3t dx$ where a $\\neq$ b"
        );
    }

    #[test]
    fn test_word_calls_are_not_wrapped() {
        assert_eq!(MathMarkdown.render("use sin(x) here"), "use sin(x) here");
    }

    #[test]
    fn test_collapses_padded_bold() {
        assert_eq!(MathMarkdown.render("** Key idea **"), "**Key idea**");
    }

    #[test]
    fn test_closes_unbalanced_math() {
        assert_eq!(MathMarkdown.render("open $x + 1"), "open $x + 1$");
        assert_eq!(MathMarkdown.render("block $$y"), "block $$y$$");
    }

    #[test]
    fn test_render_node_keeps_user_text_verbatim() {
        let mut conversation = Conversation::new();
        let user = conversation.append_root(Message::user("what is x^2?"));
        let answer = conversation.append_root(Message::assistant("x^2 is a square"));

        let renderer = MathMarkdown;
        assert_eq!(
            renderer.render_node(conversation.find(user).unwrap()),
            "what is x^2?"
        );
        assert_eq!(
            renderer.render_node(conversation.find(answer).unwrap()),
            "$x^2$ is a square"
        );
    }
}
