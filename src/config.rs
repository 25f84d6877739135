//! Externally supplied configuration: folder maps, thresholds, and the model
//! snapshot location, loaded from a YAML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub imap: ImapConfig,

    /// label -> source folder containing labeled training examples.
    pub training_folders: BTreeMap<String, String>,

    /// label -> destination folder for routed mail. An empty string means
    /// "classification confirmed, leave the message where it is".
    pub output_folders: BTreeMap<String, String>,

    /// Model snapshot path. A leading `~` is expanded to the home directory.
    pub model_path: String,

    /// Minimum winning-share confidence required to act on a classification.
    pub min_confidence: f64,

    /// At most this many messages are sampled per training folder, keeping
    /// training latency independent of folder size.
    pub training_sample_cap: usize,

    /// Body snippet length used for training samples.
    pub training_snippet_chars: usize,

    /// Body snippet length used when routing. Larger than the training
    /// snippet because routing precision matters more than speed here.
    pub routing_snippet_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    /// key=value env file holding MAILSORT_IMAP_USER / MAILSORT_IMAP_PASSWORD.
    pub credentials_file: String,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1143,
            credentials_file: "~/.config/mailsort/bridge.env".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            imap: ImapConfig::default(),
            training_folders: BTreeMap::new(),
            output_folders: BTreeMap::new(),
            model_path: "~/.mailsort/model.json".to_string(),
            min_confidence: 0.6,
            training_sample_cap: 50,
            training_snippet_chars: 1000,
            routing_snippet_chars: 2000,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(expand_home(path))
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Invalid config in {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            anyhow::bail!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            );
        }
        if self.training_sample_cap == 0 {
            anyhow::bail!("training_sample_cap must be at least 1");
        }
        for (label, folder) in &self.training_folders {
            if folder.trim().is_empty() {
                anyhow::bail!("training folder for label '{label}' is empty");
            }
        }
        Ok(())
    }

    pub fn model_path(&self) -> PathBuf {
        expand_home(&self.model_path)
    }

    /// YAML skeleton written by `--generate-config`.
    pub fn example_yaml() -> String {
        let mut config = Config::default();
        config
            .training_folders
            .insert("rejected".to_string(), "Folders/Jobs/rejected".to_string());
        config.training_folders.insert(
            "app_confirmed".to_string(),
            "Folders/Jobs/confirmed".to_string(),
        );
        config
            .output_folders
            .insert("rejected".to_string(), "Folders/Sorted/rejected".to_string());
        // Empty destination: confirmed classification, message stays put.
        config
            .output_folders
            .insert("app_confirmed".to_string(), String::new());
        serde_yaml::to_string(&config).expect("default config serializes")
    }
}

impl ImapConfig {
    /// Read credentials from the configured env file.
    pub fn load_credentials(&self) -> Result<(String, String)> {
        let path = expand_home(&self.credentials_file);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;

        let mut user = None;
        let mut password = None;
        for line in content.lines() {
            if let Some(value) = line.strip_prefix("MAILSORT_IMAP_USER=") {
                user = Some(value.trim().trim_matches('"').to_string());
            } else if let Some(value) = line.strip_prefix("MAILSORT_IMAP_PASSWORD=") {
                password = Some(value.trim().trim_matches('"').to_string());
            }
        }

        match (user, password) {
            (Some(user), Some(password)) => Ok((user, password)),
            _ => anyhow::bail!(
                "credentials file {} must set MAILSORT_IMAP_USER and MAILSORT_IMAP_PASSWORD",
                path.display()
            ),
        }
    }
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
