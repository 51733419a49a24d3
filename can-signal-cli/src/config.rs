//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use can_signal_codec::{Message, SignalDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub output: OutputConfig,
    pub messages: Vec<MessageConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Also print the unscaled channel value
    #[serde(default)]
    pub include_raw: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageConfig {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_size")]
    pub size: usize,
    pub sender: Option<String>,
    #[serde(default)]
    pub signals: Vec<SignalDefinition>,
}

fn default_size() -> usize {
    8
}

impl AppConfig {
    /// Build live messages keyed by CAN ID
    pub fn build_messages(&self) -> Result<HashMap<u32, Message>> {
        let mut messages = HashMap::new();
        for config in &self.messages {
            let mut message = Message::new(config.id, config.name.clone(), config.size);
            if let Some(sender) = &config.sender {
                message = message.with_sender(sender.clone());
            }
            for signal in &config.signals {
                message
                    .add_signal(signal.clone())
                    .with_context(|| format!("Invalid signal in message '{}'", config.name))?;
            }
            if messages.insert(config.id, message).is_some() {
                bail!("Duplicate message ID 0x{:X}", config.id);
            }
        }
        Ok(messages)
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
