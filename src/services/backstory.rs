use log::{debug, info, warn};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::core::config::{clamp_depth, EffectiveConfig};
use crate::core::error::NodeError;
use crate::services::llm::LlmClient;
use crate::services::script::{match_label, strip_code_blocks};

const DIALOGUE_LABELS: &[&str] = &[
    "dialogue",
    "dialogues",
    "dialogue lines",
    "dialogue_lines",
    "sample dialogue",
    "sample dialogue lines",
];
const BACKSTORY_LABELS: &[&str] = &["backstory", "character backstory"];
/// Markers that still split a line when they trail backstory prose.
const INLINE_DIALOGUE_MARKERS: &[&str] = &["dialogue lines:", "dialogue_lines:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    Male,
    #[default]
    Female,
}

impl Gender {
    pub const CHOICES: [&'static str; 2] = ["male", "female"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(NodeError::validation(format!(
                "character_gender must be one of {:?}, got {:?}",
                Gender::CHOICES,
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackstoryRequest {
    pub gender: Gender,
    pub role: String,
    pub traits: Vec<String>,
    pub environment: String,
    /// Falls back to the effective config when absent.
    pub narrative_depth: Option<i64>,
    pub dialogue_style: Option<String>,
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct BackstoryResult {
    pub backstory: String,
    pub dialogue_lines: Vec<String>,
}

/// Splits a comma-separated trait list, dropping blanks.
pub fn split_traits(traits: &str) -> Vec<String> {
    traits
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn paragraph_hint(depth: i64) -> &'static str {
    match depth {
        1 => "one short paragraph",
        2 => "1-2 paragraphs",
        3 => "2-3 paragraphs",
        4 => "3-4 paragraphs",
        _ => "4-5 detailed paragraphs",
    }
}

/// Builds the prompt text. A non-blank `custom_prompt` replaces the built-in template; its
/// `{gender}`, `{role}`, `{traits}`, `{environment}`, `{depth}` and `{style}` placeholders
/// are filled in.
pub fn build_prompt(request: &BackstoryRequest, depth: i64, style: &str) -> String {
    let traits = request.traits.join(", ");

    if let Some(template) = request.custom_prompt.as_deref().filter(|t| !t.trim().is_empty()) {
        return template
            .replace("{gender}", request.gender.as_str())
            .replace("{role}", &request.role)
            .replace("{traits}", &traits)
            .replace("{environment}", &request.environment)
            .replace("{depth}", &depth.to_string())
            .replace("{style}", style);
    }

    format!(
        "Create a detailed character profile with the following specification:\n\
        Gender: {gender}\n\
        Role: {role}\n\
        Personality Traits: {traits}\n\
        Environment: {environment}\n\
        Narrative Depth: {depth} (on a scale of 1 to 5)\n\
        Dialogue Style: {style}\n\
        \n\
        Please provide:\n\
        1. A rich backstory ({paragraphs})\n\
        2. A set of 5-10 characteristic dialogue lines in a {style} style that reflect their personality\n\
        \n\
        Format the output exactly like this, with no other headings:\n\
        Backstory: <the backstory>\n\
        Dialogue:\n\
        - <first dialogue line>\n\
        - <second dialogue line>\n",
        gender = request.gender,
        role = request.role,
        traits = traits,
        environment = request.environment,
        depth = depth,
        style = style,
        paragraphs = paragraph_hint(depth),
    )
}

fn clean_dialogue_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(&['[', ']', '{', '}'][..]) {
        return None;
    }

    let cleaned = line
        .trim_start_matches(|c: char| {
            c.is_ascii_digit()
                || c.is_whitespace()
                || matches!(c, '.' | ')' | '-' | '*' | '•' | '"' | '\'' | '“' | '‘')
        })
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '"' | '\'' | '”' | '’'));

    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Finds an inline dialogue marker, returning the text before and after it.
fn split_inline_marker(line: &str) -> Option<(&str, &str)> {
    // ASCII lowercasing keeps byte offsets valid for `line`.
    let lowered = line.to_ascii_lowercase();
    INLINE_DIALOGUE_MARKERS
        .iter()
        .filter_map(|marker| lowered.find(marker).map(|at| (at, marker.len())))
        .min_by_key(|&(at, _)| at)
        .map(|(at, len)| (&line[..at], &line[at + len..]))
}

#[derive(Clone, Copy)]
enum Section {
    Backstory,
    Dialogue,
}

fn split_sections(text: &str) -> Option<BackstoryResult> {
    let mut section = Section::Backstory;
    let mut backstory: Vec<&str> = Vec::new();
    let mut dialogue_lines = Vec::new();

    for line in text.lines() {
        match section {
            Section::Backstory => {
                if let Some(rest) = match_label(line, DIALOGUE_LABELS) {
                    section = Section::Dialogue;
                    dialogue_lines.extend(clean_dialogue_line(rest));
                } else if let Some((before, after)) = split_inline_marker(line) {
                    section = Section::Dialogue;
                    backstory.push(before);
                    dialogue_lines.extend(clean_dialogue_line(after));
                } else {
                    backstory.push(line);
                }
            }
            Section::Dialogue => dialogue_lines.extend(clean_dialogue_line(line)),
        }
    }

    if let Section::Backstory = section {
        return None;
    }

    if let Some(first) = backstory.iter_mut().find(|l| !l.trim().is_empty()) {
        let line: &str = *first;
        if let Some(rest) = match_label(line, BACKSTORY_LABELS) {
            *first = rest;
        }
    }

    Some(BackstoryResult {
        backstory: backstory.join("\n").trim().to_string(),
        dialogue_lines,
    })
}

/// Splits raw model output into backstory and dialogue.
///
/// A JSON object with `backstory` and `dialogue_lines` keys is taken as-is, with lines only
/// trimmed and blanks dropped. Otherwise the
/// text is scanned for a dialogue heading. Without one the whole response becomes the
/// backstory and no dialogue lines are returned.
pub fn parse_response(text: &str) -> BackstoryResult {
    let cleaned = strip_code_blocks(text);

    if let Ok(parsed) = serde_json::from_str::<BackstoryResult>(&cleaned) {
        return BackstoryResult {
            backstory: parsed.backstory.trim().to_string(),
            dialogue_lines: parsed
                .dialogue_lines
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        };
    }

    split_sections(&cleaned).unwrap_or_else(|| {
        warn!("No dialogue marker in response; returning it all as backstory");
        BackstoryResult {
            backstory: text.trim().to_string(),
            dialogue_lines: Vec::new(),
        }
    })
}

pub async fn generate(
    request: &BackstoryRequest,
    config: &EffectiveConfig,
    llm: &dyn LlmClient,
) -> Result<BackstoryResult, NodeError> {
    if request.role.trim().is_empty() {
        return Err(NodeError::validation("character_role must not be empty"));
    }
    if request.environment.trim().is_empty() {
        return Err(NodeError::validation("environment must not be empty"));
    }

    let depth = clamp_depth(request.narrative_depth.unwrap_or(config.narrative_depth));
    let style = request
        .dialogue_style
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&config.dialogue_style);

    let prompt = build_prompt(request, depth, style);
    info!(
        "Generating backstory for {} {} (depth {})",
        request.gender, request.role, depth
    );
    debug!("Backstory prompt: {} chars", prompt.len());

    let response = llm.generate(&prompt).await.map_err(NodeError::api)?;
    let result = parse_response(&response);
    debug!(
        "Parsed backstory: {} chars, {} dialogue lines",
        result.backstory.len(),
        result.dialogue_lines.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{effective_config, MockLlmClient};

    fn merchant() -> BackstoryRequest {
        BackstoryRequest {
            gender: Gender::Female,
            role: "merchant".to_string(),
            traits: split_traits("cunning,charismatic"),
            environment: "bustling marketplace".to_string(),
            narrative_depth: Some(3),
            dialogue_style: Some("casual".to_string()),
            custom_prompt: None,
        }
    }

    #[test]
    fn test_split_traits() {
        assert_eq!(split_traits(" friendly, honest ,,"), vec!["friendly", "honest"]);
        assert!(split_traits("").is_empty());
    }

    #[test]
    fn test_gender_parsing() {
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(" female ".parse::<Gender>().unwrap(), Gender::Female);
        assert!(matches!("other".parse::<Gender>(), Err(NodeError::Validation(_))));
    }

    #[tokio::test]
    async fn test_merchant_scenario() {
        let llm = MockLlmClient::replying("Backstory: X\nDialogue:\n- line1\n- line2");

        let result = generate(&merchant(), &effective_config(), &llm).await.unwrap();

        let prompt = llm.last_prompt().unwrap();
        for value in ["merchant", "cunning", "charismatic", "bustling marketplace", "3", "casual"] {
            assert!(prompt.contains(value), "prompt should contain {:?}", value);
        }
        assert_eq!(
            result,
            BackstoryResult {
                backstory: "X".to_string(),
                dialogue_lines: vec!["line1".to_string(), "line2".to_string()],
            }
        );
    }

    #[test]
    fn test_three_dialogue_lines_in_order() {
        let text = "She grew up on the docks.\n\nDIALOGUE LINES:\nFirst thing\n\n  Second thing  \nThird thing\n";
        let result = parse_response(text);
        assert_eq!(result.backstory, "She grew up on the docks.");
        assert_eq!(result.dialogue_lines, vec!["First thing", "Second thing", "Third thing"]);
    }

    #[test]
    fn test_no_marker_returns_everything_as_backstory() {
        let text = "A quiet smith who never speaks of the war.\nShe keeps a locked chest.";
        let result = parse_response(text);
        assert_eq!(result.backstory, text);
        assert!(result.dialogue_lines.is_empty());
    }

    #[test]
    fn test_markdown_headings_and_numbering() {
        let text = "**Backstory:**\nBorn to a family of tanners.\n\n**Dialogue:**\n1. \"Fine leather, friend!\"\n2. 'Mind the dye vats.'\n* Off with you.";
        let result = parse_response(text);
        assert_eq!(result.backstory, "Born to a family of tanners.");
        assert_eq!(
            result.dialogue_lines,
            vec!["Fine leather, friend!", "Mind the dye vats.", "Off with you."]
        );
    }

    #[test]
    fn test_dialogue_on_marker_line() {
        let result = parse_response("Backstory: A scout.\nDialogue: \"Stay low.\"\n- Move.");
        assert_eq!(result.backstory, "A scout.");
        assert_eq!(result.dialogue_lines, vec!["Stay low.", "Move."]);
    }

    #[test]
    fn test_colon_in_backstory_is_not_a_marker() {
        let text = "Backstory: Her motto: dialogue is cheaper than war.\nDialogue:\n- Talk first.";
        let result = parse_response(text);
        assert_eq!(result.backstory, "Her motto: dialogue is cheaper than war.");
        assert_eq!(result.dialogue_lines, vec!["Talk first."]);
    }

    #[test]
    fn test_json_response() {
        let text = "```json\n{\n  \"backstory\": \"  Raised by wolves. \",\n  \"dialogue_lines\": [\"Awoo.\", \"\", \"Hello.\"]\n}\n```";
        let result = parse_response(text);
        assert_eq!(result.backstory, "Raised by wolves.");
        assert_eq!(result.dialogue_lines, vec!["Awoo.", "Hello."]);
    }

    #[test]
    fn test_json_dialogue_is_kept_verbatim() {
        let text = r#"{"backstory":"B","dialogue_lines":["100 gold, final offer.","...I see."," 'Tis a fine day ",""]}"#;
        let result = parse_response(text);
        assert_eq!(
            result.dialogue_lines,
            vec!["100 gold, final offer.", "...I see.", "'Tis a fine day"]
        );
    }

    #[test]
    fn test_marker_trailing_backstory_prose() {
        let text = "He was born in a port town. Dialogue lines:\n- Ahoy.\n- Cast off.";
        let result = parse_response(text);
        assert_eq!(result.backstory, "He was born in a port town.");
        assert_eq!(result.dialogue_lines, vec!["Ahoy.", "Cast off."]);

        let result = parse_response("A tinker. DIALOGUE_LINES: \"Spare a bolt?\"");
        assert_eq!(result.backstory, "A tinker.");
        assert_eq!(result.dialogue_lines, vec!["Spare a bolt?"]);
    }

    #[test]
    fn test_bare_heading_is_not_a_marker() {
        let text = "## Dialogue\nShe rarely speaks.";
        let result = parse_response(text);
        assert_eq!(result.backstory, text);
        assert!(result.dialogue_lines.is_empty());
    }

    #[test]
    fn test_custom_prompt_placeholders() {
        let request = BackstoryRequest {
            custom_prompt: Some("Write about a {gender} {role} in {environment} ({traits}), depth {depth}, {style}. Keep {unknown}.".to_string()),
            ..merchant()
        };
        let prompt = build_prompt(&request, 2, "formal");
        assert_eq!(
            prompt,
            "Write about a female merchant in bustling marketplace (cunning, charismatic), depth 2, formal. Keep {unknown}."
        );
    }

    #[test]
    fn test_blank_custom_prompt_uses_template() {
        let request = BackstoryRequest {
            custom_prompt: Some("   ".to_string()),
            ..merchant()
        };
        assert!(build_prompt(&request, 3, "casual").starts_with("Create a detailed character profile"));
    }

    #[tokio::test]
    async fn test_depth_is_clamped_before_prompting() {
        let llm = MockLlmClient::replying("Backstory: B\nDialogue:\n- d");
        let request = BackstoryRequest {
            narrative_depth: Some(42),
            ..merchant()
        };
        generate(&request, &effective_config(), &llm).await.unwrap();
        assert!(llm.last_prompt().unwrap().contains("Narrative Depth: 5"));
    }

    #[tokio::test]
    async fn test_config_defaults_fill_missing_fields() {
        let llm = MockLlmClient::replying("text");
        let mut config = effective_config();
        config.narrative_depth = 1;
        config.dialogue_style = "pirate".to_string();
        let request = BackstoryRequest {
            narrative_depth: None,
            dialogue_style: None,
            ..merchant()
        };

        generate(&request, &config, &llm).await.unwrap();
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("Narrative Depth: 1"));
        assert!(prompt.contains("Dialogue Style: pirate"));
    }

    #[tokio::test]
    async fn test_empty_role_or_environment_rejected_without_call() {
        let llm = MockLlmClient::replying("unused");

        let no_role = BackstoryRequest {
            role: "  ".to_string(),
            ..merchant()
        };
        let no_env = BackstoryRequest {
            environment: String::new(),
            ..merchant()
        };

        for request in [no_role, no_env] {
            let err = generate(&request, &effective_config(), &llm).await.unwrap_err();
            assert!(matches!(err, NodeError::Validation(_)));
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced() {
        let llm = MockLlmClient::failing("quota exceeded");
        let err = generate(&merchant(), &effective_config(), &llm).await.unwrap_err();
        match err {
            NodeError::Api(msg) => assert!(msg.contains("quota exceeded")),
            other => panic!("expected Api error, got {:?}", other),
        }
        assert_eq!(llm.call_count(), 1);
    }
}
