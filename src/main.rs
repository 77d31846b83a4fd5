use anyhow::{Context, Result};
use clap::Parser;
use inquire::{Confirm, CustomType, Password, Select, Text};
use serde_json::Value;

use character_pipeline::core::config::{default_config_path, GenerationConfig};
use character_pipeline::nodes::{
    BackstoryToPromptNode, GeminiBackstoryNode, InputKind, InputSpec, NodeDescriptor, NodeInputs,
    NodeOutputs, NodeRegistry, OutputValue,
};
use character_pipeline::services::llm::GeminiConnector;

/// Interactive runner for the character generation nodes.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Print the node descriptors as JSON and exit
    #[arg(long)]
    describe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::init();

    let registry = NodeRegistry::builtin();

    // Hosts call this once at load time to learn what the nodes accept and return.
    if cli.describe {
        println!("{}", serde_json::to_string_pretty(&registry.descriptors())?);
        return Ok(());
    }

    let config = GenerationConfig::load_or_default(default_config_path());
    let connector = GeminiConnector;

    let descriptors = registry.descriptors();
    let labels: Vec<&str> = descriptors.iter().map(|d| d.display_name).collect();
    let picked = Select::new("Select node:", labels).prompt()?;
    let descriptor = descriptors
        .iter()
        .find(|d| d.display_name == picked)
        .context("selected node vanished")?;

    let inputs = prompt_inputs(descriptor, &NodeInputs::new())?;
    let outputs = registry
        .invoke(descriptor.name, &inputs, &config, &connector)
        .await?;
    print_outputs(&outputs);

    // Manual wiring: feed the backstory into the prompt converter.
    if descriptor.name == GeminiBackstoryNode::NAME {
        let backstory = outputs.text("backstory").unwrap_or_default().to_string();
        let lines = outputs.list("dialogue_lines").map_or(0, <[String]>::len);
        let help = format!("{} dialogue lines generated", lines);
        let convert = Confirm::new("Convert this backstory to image prompts?")
            .with_default(true)
            .with_help_message(&help)
            .prompt()?;

        if convert && !backstory.trim().is_empty() {
            let converter = registry
                .get(BackstoryToPromptNode::NAME)
                .context("prompt converter not registered")?
                .descriptor();

            let mut wired = NodeInputs::new();
            wired.insert("backstory".to_string(), Value::String(backstory));
            let key_input = converter.input("gemini_api_key");
            if let (Some(key), Some(spec)) = (inputs.get("api_key"), key_input) {
                wired.insert(spec.name.to_string(), key.clone());
            }

            let inputs = prompt_inputs(&converter, &wired)?;
            let outputs = registry
                .invoke(converter.name, &inputs, &config, &connector)
                .await?;
            print_outputs(&outputs);
        }
    }

    Ok(())
}

/// Asks for every declared input not already present in `wired`. Blank optional strings
/// are left out so config defaults apply.
fn prompt_inputs(descriptor: &NodeDescriptor, wired: &NodeInputs) -> Result<NodeInputs> {
    let mut inputs = wired.clone();

    for spec in &descriptor.inputs {
        if wired.contains_key(spec.name) {
            continue;
        }
        if let Some(value) = prompt_input(spec)? {
            inputs.insert(spec.name.to_string(), value);
        }
    }

    Ok(inputs)
}

fn prompt_input(spec: &InputSpec) -> Result<Option<Value>> {
    let value = match &spec.kind {
        InputKind::String { .. } if spec.name.ends_with("api_key") => {
            let key = Password::new(&format!("{} (leave blank to use config.json):", spec.name))
                .without_confirmation()
                .with_help_message(spec.description)
                .prompt()?;
            Value::String(key)
        }
        InputKind::String { default, .. } => {
            let mut prompt = Text::new(spec.name).with_help_message(spec.description);
            if !default.is_empty() {
                prompt = prompt.with_default(default);
            }
            Value::String(prompt.prompt()?)
        }
        InputKind::Int { default, min, max } => {
            let help = format!("{} ({}-{})", spec.description, min, max);
            let n = CustomType::<i64>::new(spec.name)
                .with_default(*default)
                .with_help_message(&help)
                .prompt()?;
            Value::from(n)
        }
        InputKind::Enum { choices, default } => {
            let cursor = choices.iter().position(|c| c == default).unwrap_or(0);
            let choice = Select::new(spec.name, choices.clone())
                .with_starting_cursor(cursor)
                .with_help_message(spec.description)
                .prompt()?;
            Value::String(choice.to_string())
        }
    };

    let blank = matches!(&value, Value::String(s) if s.trim().is_empty());
    if blank && !spec.required {
        return Ok(None);
    }
    Ok(Some(value))
}

fn print_outputs(outputs: &NodeOutputs) {
    for output in &outputs.0 {
        println!("\n== {} ==", output.name);
        match &output.value {
            OutputValue::Text(text) => println!("{}", text),
            OutputValue::List(lines) => {
                for line in lines {
                    println!("- {}", line);
                }
            }
        }
    }
}
