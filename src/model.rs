//! Persisted classifier model: one term-frequency profile per label.
//!
//! The snapshot on disk is a versioned JSON document. Saves go through a
//! temporary file in the destination directory followed by a rename, so a
//! failed training pass can never leave a half-written snapshot behind.

use crate::features::FeatureMap;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Accumulated term counts for one label. `BTreeMap` keeps label and term
/// iteration deterministic, which the classifier's tie-break relies on.
pub type Profile = BTreeMap<String, u64>;

const SNAPSHOT_VERSION: u32 = 1;

/// In-memory classifier state. Owned exclusively by the trainer while
/// training and borrowed read-only by the classifier while routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub profiles: BTreeMap<String, Profile>,
    pub total_emails: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Additively merge extracted features into the label's profile,
    /// creating the profile on first sight of the label.
    pub fn merge_features(&mut self, label: &str, features: &FeatureMap) {
        let profile = self.profiles.entry(label.to_string()).or_default();
        for (term, count) in features {
            *profile.entry(term.clone()).or_insert(0) += u64::from(*count);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(flatten)]
    model: Model,
}

/// Loads and saves model snapshots at a fixed path.
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot. A missing file yields a fresh empty
    /// model; an unreadable or unrecognized snapshot is logged and likewise
    /// replaced by an empty model rather than failing the run.
    pub fn load(&self) -> Model {
        if !self.path.exists() {
            log::info!("No existing model at {}, starting empty", self.path.display());
            return Model::default();
        }

        let model = fs::read_to_string(&self.path)
            .map_err(anyhow::Error::from)
            .and_then(|content| {
                let snapshot: Snapshot = serde_json::from_str(&content)?;
                if snapshot.version != SNAPSHOT_VERSION {
                    anyhow::bail!("unsupported snapshot version {}", snapshot.version);
                }
                Ok(snapshot.model)
            });

        match model {
            Ok(model) => {
                log::info!(
                    "Loaded model from {} ({} labels, trained on {} emails, updated {})",
                    self.path.display(),
                    model.profiles.len(),
                    model.total_emails,
                    model
                        .updated_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string())
                );
                model
            }
            Err(e) => {
                log::warn!(
                    "Could not load model from {}: {e}; starting empty",
                    self.path.display()
                );
                Model::default()
            }
        }
    }

    /// Persist the full snapshot atomically, creating the parent directory
    /// if needed and replacing any previous snapshot.
    pub fn save(&self, model: &Model) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create model directory {}", parent.display())
            })?;
        }

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            model: model.clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .context("Failed to serialize model snapshot")?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        log::info!("Saved model to {}", self.path.display());
        Ok(())
    }
}
