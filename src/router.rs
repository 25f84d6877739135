//! Per-message routing decisions over the unseen INBOX batch.
//!
//! Each message moves through fetch -> parse -> classify -> decide
//! independently. A failure at any step produces a `Skipped` outcome for
//! that message only; the rest of the batch still runs.

use crate::classifier::{Classifier, Label};
use crate::config::Config;
use crate::message;
use crate::model::Model;
use crate::session::{MailSession, MessageId, Projection, SearchCriteria};

const INBOX: &str = "INBOX";

/// Terminal state of one message within a batch. All three count as
/// processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Copied into the destination folder and flagged seen.
    Routed { dest: String },
    /// Low confidence, unknown label, or a leave-in-place destination.
    LeftInPlace,
    /// A step failed for this message; the batch continued without it.
    Skipped { reason: String },
}

pub struct Router<'a> {
    config: &'a Config,
    classifier: Classifier<'a>,
}

impl<'a> Router<'a> {
    pub fn new(config: &'a Config, model: &'a Model) -> Self {
        Self {
            config,
            classifier: Classifier::new(model, config.min_confidence),
        }
    }

    /// Classify and route every unseen message in INBOX. Returns the number
    /// of messages that reached a terminal outcome, whatever that outcome
    /// was.
    pub fn process_unseen(&self, session: &mut dyn MailSession) -> usize {
        if let Err(e) = session.select(INBOX) {
            log::error!("Could not select {INBOX}: {e}");
            return 0;
        }

        let unseen = match session.search(SearchCriteria::Unseen) {
            Ok(ids) => ids,
            Err(e) => {
                log::error!("Could not search {INBOX} for unseen messages: {e}");
                return 0;
            }
        };
        if unseen.is_empty() {
            log::info!("No unseen messages");
            return 0;
        }
        log::info!("Found {} unseen messages", unseen.len());

        let mut processed = 0;
        for id in unseen {
            let outcome = self.process_message(session, id);
            match &outcome {
                Outcome::Routed { dest } => log::info!("Message {id}: routed to '{dest}'"),
                Outcome::LeftInPlace => log::info!("Message {id}: left in place"),
                Outcome::Skipped { reason } => log::warn!("Message {id}: skipped ({reason})"),
            }
            processed += 1;
        }

        log::info!("Processed {processed} messages");
        processed
    }

    /// Drive one message to a terminal outcome. No error escapes this
    /// boundary.
    fn process_message(&self, session: &mut dyn MailSession, id: MessageId) -> Outcome {
        let raw = match session.fetch(id, Projection::Full) {
            Ok(raw) => raw,
            Err(e) => {
                return Outcome::Skipped {
                    reason: format!("fetch failed: {e}"),
                }
            }
        };

        let record = match message::parse(&raw, self.config.routing_snippet_chars) {
            Ok(record) => record,
            Err(e) => {
                return Outcome::Skipped {
                    reason: format!("parse failed: {e}"),
                }
            }
        };
        log::debug!(
            "Message {id}: from '{}', subject '{}'",
            record.sender,
            record.subject
        );

        let result = self.classifier.classify(&record.subject, Some(&record.body));
        log::info!(
            "Message {id}: classified as '{}' (confidence {:.2})",
            result.label,
            result.confidence
        );

        let label = match result.label {
            Label::Folder(label) if result.confidence >= self.config.min_confidence => label,
            _ => return Outcome::LeftInPlace,
        };

        let dest = match self.config.output_folders.get(&label) {
            // Empty destination: classification confirmed, message stays put.
            Some(dest) if !dest.is_empty() => dest.clone(),
            _ => return Outcome::LeftInPlace,
        };

        if let Err(e) = session.copy(id, &dest) {
            return Outcome::Skipped {
                reason: format!("copy to '{dest}' failed: {e}"),
            };
        }

        // Mark the original seen so a re-run does not duplicate the copy. A
        // failure here is logged but the message still counts as routed.
        if let Err(e) = session.mark_seen(id) {
            log::warn!("Message {id}: copied but could not mark seen: {e}");
        }

        Outcome::Routed { dest }
    }
}
