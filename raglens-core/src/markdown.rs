//! Markdown to plain text.
//!
//! The RAG service answers in markdown. Judge prompts and the refusal check
//! want only the visible text, so this strips block markers (headings, list
//! bullets, quotes, fences, rules) line by line and inline markup (emphasis,
//! code spans, links, images, HTML tags, entities) within each line.

use regex::Regex;
use std::sync::LazyLock;

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid image regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid link regex"));
static AUTOLINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<((?:https?|mailto):[^>\s]+)>").expect("valid autolink regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid tag regex"));
static STRONG_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(\S(?:.*?\S)?)\*\*").expect("valid strong regex"));
static STRONG_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__(\S(?:.*?\S)?)__").expect("valid strong regex"));
static EMPHASIS_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(\S(?:[^*]*?\S)?)\*").expect("valid emphasis regex"));
static EMPHASIS_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w])_(\S(?:[^_]*?\S)?)_($|[^\w])").expect("valid emphasis regex")
});
static STRIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~(\S(?:.*?\S)?)~~").expect("valid strike regex"));
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,9}[.)]\s+").expect("valid list regex"));

/// Convert markdown to its visible text, trimmed.
pub fn to_plain_text(markdown: &str) -> String {
    let mut in_fence = false;
    let mut lines = Vec::new();

    for line in markdown.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            lines.push(line.to_string());
            continue;
        }
        if is_rule(trimmed) {
            lines.push(String::new());
            continue;
        }

        let body = strip_block_markers(trimmed);
        lines.push(decode_entities(&strip_inline(body)));
    }

    collapse_blank_lines(&lines).trim().to_string()
}

/// Horizontal rules and setext heading underlines.
fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_', '=']
            .iter()
            .any(|marker| compact.chars().all(|c| c == *marker))
}

fn strip_block_markers(mut line: &str) -> &str {
    // Nested quotes: "> > text"
    while let Some(rest) = line.strip_prefix('>') {
        line = rest.trim_start();
    }

    if let Some(rest) = parse_heading(line) {
        return rest;
    }

    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            let rest = rest.trim_start();
            return rest
                .strip_prefix("[ ] ")
                .or_else(|| rest.strip_prefix("[x] "))
                .or_else(|| rest.strip_prefix("[X] "))
                .unwrap_or(rest);
        }
    }

    if let Some(m) = ORDERED_ITEM.find(line) {
        return &line[m.end()..];
    }

    line
}

/// Parse an ATX heading (# through ######), returning the heading text.
fn parse_heading(line: &str) -> Option<&str> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some(rest.trim().trim_end_matches('#').trim_end())
}

/// Strip inline markup, leaving code span contents untouched.
fn strip_inline(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('`') {
        let ticks = rest[open..].chars().take_while(|c| *c == '`').count();
        let fence = &rest[open..open + ticks];
        let after = &rest[open + ticks..];
        match after.find(fence) {
            Some(close) => {
                output.push_str(&strip_prose(&rest[..open]));
                output.push_str(after[..close].trim());
                rest = &after[close + ticks..];
            }
            None => break,
        }
    }

    output.push_str(&strip_prose(rest));
    output
}

fn strip_prose(text: &str) -> String {
    let text = IMAGE.replace_all(text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = AUTOLINK.replace_all(&text, "$1");
    let text = HTML_TAG.replace_all(&text, "");
    let text = STRONG_STAR.replace_all(&text, "$1");
    let text = STRONG_UNDERSCORE.replace_all(&text, "$1");
    let text = EMPHASIS_STAR.replace_all(&text, "$1");
    let text = EMPHASIS_UNDERSCORE.replace_all(&text, "$1$2$3");
    STRIKE.replace_all(&text, "$1").into_owned()
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Join lines, keeping at most one blank line between blocks.
fn collapse_blank_lines(lines: &[String]) -> String {
    let mut output = String::new();
    let mut blank_run = 0;
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        output.push_str(line);
        output.push('\n');
    }
    output
}
