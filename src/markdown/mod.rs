//! Markdown rendering and simulated streaming.
//!
//! The backend returns a finished markdown response in one piece; the UI
//! reveals it incrementally. This module owns the content side of that
//! illusion: stripping hidden `<think>` sections, chunking the text by
//! paragraph or sentence, and rendering each chunk as GitHub-flavored HTML.
//! The paced reveal lives in [`stream`]; it yields exactly the chunks
//! produced here, so the content is deterministic and only the timing is
//! animation-dependent.

pub mod stream;

pub use stream::{DEFAULT_CHUNK_DELAY, DEV_CHUNK_DELAY, reveal};

use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, html};
use regex::Regex;

/// Matches `<think>...</think>` sections, case-insensitively, across lines.
static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").unwrap());

/// Splits paragraphs on runs of blank lines.
static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());

/// Grabs one sentence including its trailing `.`/`!`/`?` punctuation.
static SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\r\n.!?]+[.!?]*").unwrap());

/// Remove `<think>...</think>` sections from a response.
///
/// Models that expose reasoning traces wrap them in `<think>` tags; the UI
/// never shows them. Unclosed tags are left alone.
#[must_use]
pub fn strip_think(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").into_owned()
}

/// Split a finished response into reveal chunks.
///
/// Texts with more than one blank-line-separated paragraph chunk by
/// paragraph; everything else chunks by sentence, keeping trailing
/// punctuation. A text with no sentence boundary at all is a single chunk.
#[must_use]
pub fn chunk_text(text: &str) -> Vec<String> {
    let paragraphs: Vec<String> = PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();

    if paragraphs.len() > 1 {
        return paragraphs;
    }

    let sentences: Vec<String> = SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        }
    } else {
        sentences
    }
}

/// Render markdown to HTML.
///
/// GitHub-flavored: tables, strikethrough, and task lists are enabled, and
/// soft line breaks render as hard breaks. `<think>` sections are stripped
/// first. If rendering produces only whitespace the cleaned raw text is
/// returned verbatim, so the function never loses content and never fails.
#[must_use]
pub fn parse_markdown(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let cleaned = strip_think(content);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(&cleaned, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut rendered = String::with_capacity(cleaned.len() * 2);
    html::push_html(&mut rendered, parser);

    if rendered.trim().is_empty() {
        cleaned
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_think_basic() {
        let text = "Before <think>hidden reasoning</think> after";
        assert_eq!(strip_think(text), "Before  after");
    }

    #[test]
    fn test_strip_think_case_insensitive() {
        let text = "a<THINK>secret</THINK>b<Think>more</tHiNk>c";
        assert_eq!(strip_think(text), "abc");
    }

    #[test]
    fn test_strip_think_multiline() {
        let text = "intro\n<think>\nline one\nline two\n</think>\noutro";
        assert_eq!(strip_think(text), "intro\n\noutro");
    }

    #[test]
    fn test_strip_think_leaves_unclosed_tag() {
        let text = "hello <think>dangling";
        assert_eq!(strip_think(text), text);
    }

    #[test]
    fn test_chunk_by_paragraph() {
        let text = "First paragraph.\n\nSecond paragraph.\n\n\nThird.";
        let chunks = chunk_text(text);
        assert_eq!(
            chunks,
            vec!["First paragraph.", "Second paragraph.", "Third."]
        );
    }

    #[test]
    fn test_chunk_by_sentence_when_single_paragraph() {
        let text = "One sentence. Another one! A question? Trailing";
        let chunks = chunk_text(text);
        assert_eq!(
            chunks,
            vec!["One sentence.", "Another one!", "A question?", "Trailing"]
        );
    }

    #[test]
    fn test_chunk_text_without_boundaries() {
        assert_eq!(chunk_text("no terminal punctuation"), vec![
            "no terminal punctuation"
        ]);
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("").is_empty());
        assert!(chunk_text("   \n  ").is_empty());
    }

    #[test]
    fn test_parse_markdown_renders_gfm() {
        let html = parse_markdown("**bold** and ~~gone~~");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_parse_markdown_soft_breaks_become_hard_breaks() {
        let html = parse_markdown("line one\nline two");
        assert!(html.contains("<br"));
    }

    #[test]
    fn test_parse_markdown_strips_think() {
        let html = parse_markdown("visible <think>internal\nnotes</think> text");
        assert!(!html.contains("internal"));
        assert!(html.contains("visible"));
        assert!(html.contains("text"));
    }

    #[test]
    fn test_parse_markdown_empty_input() {
        assert_eq!(parse_markdown(""), "");
    }

    #[test]
    fn test_parse_markdown_idempotent_on_plain_text() {
        let once = parse_markdown("just a plain sentence.");
        let twice = parse_markdown(&once);
        // HTML wrapper tags differ, the visible text does not.
        assert!(once.contains("just a plain sentence."));
        assert!(twice.contains("just a plain sentence."));
    }

    #[test]
    fn test_parse_markdown_think_only_input_yields_empty_chunks() {
        let html = parse_markdown("<think>everything is hidden</think>");
        assert!(!html.contains("hidden"));
    }
}
