//! Profile accumulation from labeled source folders.
//!
//! Every failure below a training pass is isolated: a folder that cannot be
//! selected is skipped, a message that cannot be fetched or parsed is
//! skipped, and the pass carries on. Only a failed snapshot save aborts the
//! pass, since silently dropping freshly learned profiles would be worse
//! than stopping.

use crate::config::Config;
use crate::features;
use crate::message;
use crate::model::{Model, ModelStore};
use crate::session::{MailSession, Projection, SearchCriteria};
use anyhow::{Context, Result};
use chrono::Utc;

pub struct Trainer<'a> {
    config: &'a Config,
    model: &'a mut Model,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a Config, model: &'a mut Model) -> Self {
        Self { config, model }
    }

    /// Accumulate features from one labeled folder into the label's profile.
    /// Returns the number of successfully processed messages; any folder- or
    /// message-level failure is logged and skipped.
    pub fn train_folder(
        &mut self,
        session: &mut dyn MailSession,
        folder: &str,
        label: &str,
    ) -> usize {
        log::info!("Training label '{label}' from folder '{folder}'");

        let exists = match session.select(folder) {
            Ok(exists) => exists,
            Err(e) => {
                log::warn!("Could not select folder '{folder}': {e}");
                return 0;
            }
        };
        if exists == 0 {
            log::info!("Folder '{folder}' is empty");
            return 0;
        }

        let ids = match session.search(SearchCriteria::All) {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("Could not search folder '{folder}': {e}");
                return 0;
            }
        };

        // Bounded sample so training latency stays independent of folder size.
        let mut processed = 0;
        for id in ids.iter().take(self.config.training_sample_cap) {
            let raw = match session.fetch(*id, Projection::SubjectAndText) {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("Error fetching message {id} in '{folder}': {e}");
                    continue;
                }
            };
            let record = match message::parse(&raw, self.config.training_snippet_chars) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Error parsing message {id} in '{folder}': {e}");
                    continue;
                }
            };

            let features = features::extract(&record.subject, Some(&record.body));
            self.model.merge_features(label, &features);
            processed += 1;
        }

        log::info!("Processed {processed} messages for label '{label}'");
        processed
    }

    /// Train from every configured (label, folder) pair, then persist the
    /// model, but only if anything was actually processed, so an all-empty
    /// pass leaves the previous snapshot untouched.
    pub fn train_all(&mut self, session: &mut dyn MailSession, store: &ModelStore) -> Result<usize> {
        let config = self.config;
        let mut total = 0;
        for (label, folder) in &config.training_folders {
            total += self.train_folder(session, folder, label);
        }

        self.model.total_emails = total as u64;
        self.model.updated_at = Some(Utc::now());

        if total > 0 {
            store
                .save(self.model)
                .context("Failed to persist model after training")?;
            log::info!("Training complete: {total} messages processed");
        } else {
            log::warn!("No training data collected; previous snapshot left untouched");
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockSession;
    use tempfile::tempdir;

    fn test_config() -> Config {
        let mut config = Config::default();
        config
            .training_folders
            .insert("rejected".to_string(), "Train/rejected".to_string());
        config
            .training_folders
            .insert("confirmed".to_string(), "Train/confirmed".to_string());
        config
    }

    fn rejection(n: u32) -> Vec<u8> {
        format!("Subject: Application update {n}\r\n\r\nWe regret to inform you.").into_bytes()
    }

    #[test]
    fn test_train_folder_accumulates_profile() {
        let mut session = MockSession::new();
        session.add_message("Train/rejected", 1, &rejection(1));
        session.add_message("Train/rejected", 2, &rejection(2));

        let config = test_config();
        let mut model = Model::default();
        let processed =
            Trainer::new(&config, &mut model).train_folder(&mut session, "Train/rejected", "rejected");

        assert_eq!(processed, 2);
        let profile = &model.profiles["rejected"];
        assert_eq!(profile["regret"], 2);
        assert_eq!(profile["application"], 2);
        // Stopword filtered at extraction time.
        assert!(!profile.contains_key("you"));
    }

    #[test]
    fn test_train_folder_empty_folder_returns_zero() {
        let mut session = MockSession::new();
        session.add_empty_folder("Train/rejected");

        let config = test_config();
        let mut model = Model::default();
        model.merge_features("rejected", &[("regret".to_string(), 3)].into_iter().collect());

        let processed =
            Trainer::new(&config, &mut model).train_folder(&mut session, "Train/rejected", "rejected");

        assert_eq!(processed, 0);
        // The existing profile survives an empty pass.
        assert_eq!(model.profiles["rejected"]["regret"], 3);
    }

    #[test]
    fn test_train_folder_select_failure_is_skipped() {
        let mut session = MockSession::new();
        session.add_message("Train/rejected", 1, &rejection(1));
        session.fail_select("Train/rejected");

        let config = test_config();
        let mut model = Model::default();
        let processed =
            Trainer::new(&config, &mut model).train_folder(&mut session, "Train/rejected", "rejected");

        assert_eq!(processed, 0);
        assert!(model.is_empty());
    }

    #[test]
    fn test_train_folder_isolates_single_message_failure() {
        let mut session = MockSession::new();
        session.add_message("Train/rejected", 1, &rejection(1));
        session.add_message("Train/rejected", 2, &rejection(2));
        session.add_message("Train/rejected", 3, &rejection(3));
        session.fail_fetch(2);

        let config = test_config();
        let mut model = Model::default();
        let processed =
            Trainer::new(&config, &mut model).train_folder(&mut session, "Train/rejected", "rejected");

        assert_eq!(processed, 2);
        assert_eq!(model.profiles["rejected"]["regret"], 2);
    }

    #[test]
    fn test_train_folder_respects_sample_cap() {
        let mut session = MockSession::new();
        for n in 1..=10 {
            session.add_message("Train/rejected", n, &rejection(n));
        }

        let mut config = test_config();
        config.training_sample_cap = 4;
        let mut model = Model::default();
        let processed =
            Trainer::new(&config, &mut model).train_folder(&mut session, "Train/rejected", "rejected");

        assert_eq!(processed, 4);
        assert_eq!(model.profiles["rejected"]["regret"], 4);
    }

    #[test]
    fn test_train_all_sets_totals_and_saves() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));

        let mut session = MockSession::new();
        session.add_message("Train/rejected", 1, &rejection(1));
        session.add_message(
            "Train/confirmed",
            2,
            b"Subject: Application received\r\n\r\nWe received your application.",
        );

        let config = test_config();
        let mut model = Model::default();
        let total = Trainer::new(&config, &mut model)
            .train_all(&mut session, &store)
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(model.total_emails, 2);
        assert!(model.updated_at.is_some());

        let reloaded = store.load();
        assert_eq!(reloaded, model);
    }

    #[test]
    fn test_train_all_empty_pass_does_not_overwrite_snapshot() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));

        // Persist a good snapshot first.
        let mut good = Model::default();
        good.merge_features("rejected", &[("regret".to_string(), 7)].into_iter().collect());
        good.total_emails = 7;
        store.save(&good).unwrap();

        // Both training folders exist but are empty.
        let mut session = MockSession::new();
        session.add_empty_folder("Train/rejected");
        session.add_empty_folder("Train/confirmed");

        let config = test_config();
        let mut model = store.load();
        let total = Trainer::new(&config, &mut model)
            .train_all(&mut session, &store)
            .unwrap();

        assert_eq!(total, 0);
        let reloaded = store.load();
        assert_eq!(reloaded.profiles, good.profiles);
        assert_eq!(reloaded.total_emails, 7);
    }

    #[test]
    fn test_train_all_skips_bad_folder_and_continues() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));

        let mut session = MockSession::new();
        session.fail_select("Train/confirmed");
        session.add_message("Train/rejected", 1, &rejection(1));
        session.add_empty_folder("Train/confirmed");

        let config = test_config();
        let mut model = Model::default();
        let total = Trainer::new(&config, &mut model)
            .train_all(&mut session, &store)
            .unwrap();

        assert_eq!(total, 1);
        assert!(model.profiles.contains_key("rejected"));
        assert!(!model.profiles.contains_key("confirmed"));
    }
}
