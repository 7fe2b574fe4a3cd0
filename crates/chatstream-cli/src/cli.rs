//! Command-line arguments

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use chatstream_core::{ChatMessage, ChatRequest, StopSequences};

/// Environment variable holding the API key when `--api-key` is absent
const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "chatstream", version, about = "Stream a chat completion to stdout")]
pub struct Cli {
    /// Prompt text; read from stdin when omitted
    pub prompt: Option<String>,

    /// System message sent before the prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Model identifier (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub top_p: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Stop sequence (repeatable)
    #[arg(long = "stop")]
    pub stop: Vec<String>,

    /// API key (defaults to $OPENROUTER_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Config file (defaults to <config dir>/chatstream/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the whole answer once it completes
    #[arg(long)]
    pub aggregate: bool,

    /// Remove a wrapping ``` fence from the answer
    #[arg(long, requires = "aggregate")]
    pub strip_fence: bool,
}

impl Cli {
    pub fn build_request(&self) -> Result<ChatRequest> {
        let prompt = match &self.prompt {
            Some(prompt) => prompt.clone(),
            None => read_stdin_prompt()?,
        };

        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default();

        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt));

        let mut request = ChatRequest::new(messages, api_key);
        request.model = self.model.clone();
        request.temperature = self.temperature;
        request.top_p = self.top_p;
        request.max_tokens = self.max_tokens;
        request.stop = match self.stop.as_slice() {
            [] => None,
            [one] => Some(StopSequences::One(one.clone())),
            many => Some(StopSequences::Many(many.to_vec())),
        };

        Ok(request)
    }
}

fn read_stdin_prompt() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!("No prompt given (pass it as an argument or pipe it on stdin)");
    }
    let mut prompt = String::new();
    stdin
        .read_to_string(&mut prompt)
        .context("Failed to read prompt from stdin")?;
    if prompt.trim().is_empty() {
        bail!("Prompt on stdin was empty");
    }
    Ok(prompt)
}
