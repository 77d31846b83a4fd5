//! Helpers for picking apart free-form model output.

/// Removes a surrounding Markdown code fence. An info string after the opening fence
/// (`json`, `text`, ...) is dropped with it.
pub fn strip_code_blocks(s: &str) -> String {
    let trimmed = s.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = match body.split_once('\n') {
        Some((info, rest)) if !info.trim().contains(' ') => rest,
        _ => body,
    };
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

/// A line read as `label: rest`.
#[derive(Debug, PartialEq)]
pub struct Labeled<'a> {
    /// Lowercased label with Markdown emphasis, heading marks and numbering removed.
    pub label: String,
    pub rest: &'a str,
}

const MAX_LABEL_LEN: usize = 32;

fn is_markup(c: char) -> bool {
    matches!(c, '#' | '*' | '_' | '>') || c.is_whitespace()
}

/// Reads `line` as a section label such as `**Dialogue:**` or `2. Positive prompt: ...`.
///
/// The label must be closed by a colon, so a bare heading like `## Dialogue` is not one.
/// Returns `None` when nothing label-shaped is left.
pub fn split_label(line: &str) -> Option<Labeled<'_>> {
    let line = line
        .trim()
        .trim_start_matches(|c: char| is_markup(c) || c.is_ascii_digit() || c == '.' || c == ')');

    let (head, rest) = line.split_once(':')?;
    let rest = rest.trim_start_matches(is_markup).trim_end();

    let label = head.trim_matches(is_markup);
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return None;
    }

    Some(Labeled {
        label: label.to_lowercase(),
        rest,
    })
}

/// Returns the text after the label when `line` carries one of `labels`.
pub fn match_label<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    split_label(line).and_then(|l| labels.contains(&l.label.as_str()).then_some(l.rest))
}

pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
