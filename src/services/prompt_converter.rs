use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;

use crate::core::error::NodeError;
use crate::services::llm::LlmClient;
use crate::services::script::{match_label, strip_code_blocks, truncate_words};

/// Tags that keep the portrait to a single, clean subject. Always leads the negative prompt.
pub const BASE_NEGATIVE_PROMPT: &str = "multiple people, group shot, two people, twins, duplicate character, \
    mirror image, split image, deformed, bad anatomy, blurry, low quality, \
    text, second person, multiple views, extra person";

const POSITIVE_PREFIX: &str = "solo portrait";
const MAX_POSITIVE_WORDS: usize = 60;
const MAX_NEGATIVE_WORDS: usize = 30;

const POSITIVE_LABELS: &[&str] = &["positive", "positive prompt"];
const NEGATIVE_LABELS: &[&str] = &["negative", "negative prompt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtStyle {
    Realistic,
    Fantasy,
    Anime,
    Painterly,
}

impl ArtStyle {
    pub const CHOICES: [&'static str; 4] = ["realistic", "fantasy", "anime", "painterly"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtStyle::Realistic => "realistic",
            ArtStyle::Fantasy => "fantasy",
            ArtStyle::Anime => "anime",
            ArtStyle::Painterly => "painterly",
        }
    }
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtStyle {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "realistic" => Ok(ArtStyle::Realistic),
            "fantasy" => Ok(ArtStyle::Fantasy),
            "anime" => Ok(ArtStyle::Anime),
            "painterly" => Ok(ArtStyle::Painterly),
            _ => Err(NodeError::validation(format!(
                "art_style must be one of {:?}, got {:?}",
                ArtStyle::CHOICES,
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptConversionRequest {
    pub backstory: String,
    pub art_style: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PromptConversionResult {
    pub positive_prompt: String,
    pub negative_prompt: String,
}

pub fn build_prompt(backstory: &str, art_style: ArtStyle) -> String {
    format!(
        "Given this character backstory:\n\
        {backstory}\n\
        \n\
        Generate two BRIEF prompts for Stable Diffusion to create a SINGLE character portrait.\n\
        Write both as comma-separated tags, not sentences.\n\
        1. A positive prompt (maximum 30 words) that MUST begin with 'solo portrait, upper body only' and include:\n\
           - Specific viewing angle (e.g., '3/4 view facing camera')\n\
           - Physical appearance details\n\
           - Clothing description\n\
           - Expression and pose\n\
        2. A negative prompt (maximum 3-4 words) of specific traits to avoid.\n\
           Focus only on character-specific traits to avoid, as general terms like 'multiple people' are handled separately.\n\
        \n\
        The portrait should be in {art_style} style.\n\
        Ensure the description maintains focus on a single character in a clear pose.\n\
        \n\
        Return ONLY the prompts in this format:\n\
        POSITIVE: <prompt>\n\
        NEGATIVE: <prompt>\n",
        backstory = backstory.trim(),
        art_style = art_style,
    )
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Positive,
    Negative,
}

#[derive(Default)]
struct Sections<'a> {
    positive: Option<Vec<&'a str>>,
    negative: Option<Vec<&'a str>>,
}

impl<'a> Sections<'a> {
    fn slot(&mut self, field: Field) -> &mut Option<Vec<&'a str>> {
        match field {
            Field::Positive => &mut self.positive,
            Field::Negative => &mut self.negative,
        }
    }
}

fn push_piece<'a>(pieces: &mut Vec<&'a str>, text: &'a str) {
    let piece = text
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '•') || c.is_whitespace())
        .trim_end_matches(|c: char| c == ',' || c.is_whitespace());
    if !piece.is_empty() {
        pieces.push(piece);
    }
}

/// Picks the `POSITIVE:` and `NEGATIVE:` values out of `text`, returning an empty string for
/// a missing label.
///
/// A value may continue on the following lines; a blank line or the other label ends it.
/// Only the first occurrence of each label counts.
pub fn split_prompts(text: &str) -> PromptConversionResult {
    let mut sections = Sections::default();
    let mut current: Option<Field> = None;

    for line in text.lines() {
        let labeled = match_label(line, POSITIVE_LABELS)
            .map(|rest| (Field::Positive, rest))
            .or_else(|| match_label(line, NEGATIVE_LABELS).map(|rest| (Field::Negative, rest)));

        match (labeled, current) {
            (Some((field, rest)), _) => {
                let slot = sections.slot(field);
                if slot.is_some() {
                    current = None;
                    continue;
                }
                let mut pieces = Vec::new();
                push_piece(&mut pieces, rest);
                *slot = Some(pieces);
                current = Some(field);
            }
            (None, _) if line.trim().is_empty() => current = None,
            (None, Some(field)) => {
                if let Some(pieces) = sections.slot(field).as_mut() {
                    push_piece(pieces, line);
                }
            }
            (None, None) => {}
        }
    }

    let join = |pieces: Option<Vec<&str>>| pieces.map(|p| p.join(", ")).unwrap_or_default();
    PromptConversionResult {
        positive_prompt: join(sections.positive),
        negative_prompt: join(sections.negative),
    }
}

fn finish_positive(positive: &str) -> String {
    if positive.is_empty() {
        return String::new();
    }
    let prefixed = if positive.to_lowercase().starts_with(POSITIVE_PREFIX) {
        positive.to_string()
    } else {
        format!("{}, {}", POSITIVE_PREFIX, positive)
    };
    truncate_words(&prefixed, MAX_POSITIVE_WORDS)
}

fn finish_negative(negative: &str) -> String {
    if negative.is_empty() {
        return String::new();
    }
    truncate_words(
        &format!("{}, {}", BASE_NEGATIVE_PROMPT, negative),
        MAX_NEGATIVE_WORDS,
    )
}

pub fn parse_response(text: &str) -> PromptConversionResult {
    let raw = split_prompts(&strip_code_blocks(text));
    if raw.positive_prompt.is_empty() || raw.negative_prompt.is_empty() {
        warn!(
            "Response is missing a {} prompt",
            if raw.positive_prompt.is_empty() { "positive" } else { "negative" }
        );
    }

    PromptConversionResult {
        positive_prompt: finish_positive(&raw.positive_prompt),
        negative_prompt: finish_negative(&raw.negative_prompt),
    }
}

pub async fn convert(
    request: &PromptConversionRequest,
    llm: &dyn LlmClient,
) -> Result<PromptConversionResult, NodeError> {
    if request.backstory.trim().is_empty() {
        return Err(NodeError::validation("backstory must not be empty"));
    }
    let art_style: ArtStyle = request.art_style.parse()?;

    let prompt = build_prompt(&request.backstory, art_style);
    info!("Converting backstory to {} image prompts", art_style);
    debug!("Conversion prompt: {} chars", prompt.len());

    let response = llm.generate(&prompt).await.map_err(NodeError::api)?;
    let result = parse_response(&response);
    info!(
        "Using prompts:\nPositive: {}\nNegative: {}",
        result.positive_prompt, result.negative_prompt
    );
    Ok(result)
}
