//! The mail-store collaborator seam.
//!
//! Everything the trainer and router need from the store is the small command
//! subset below. The production implementation lives in [`crate::imap`]; the
//! tests drive a recording mock. The session is stateful (selected folder),
//! so callers must issue commands strictly sequentially.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server returned NO: {0}")]
    No(String),
    #[error("server returned BAD: {0}")]
    Bad(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Per-session message sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCriteria {
    All,
    Unseen,
}

/// How much of a message to fetch. Training reads only the subject header
/// plus body text; routing fetches the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    SubjectAndText,
    Full,
}

/// The command subset consumed from the mail store. Implementations are
/// assumed already authenticated; folder paths are literal strings.
pub trait MailSession {
    /// Select a folder, returning the number of messages it contains.
    fn select(&mut self, folder: &str) -> Result<u32, SessionError>;

    /// Search the selected folder.
    fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<MessageId>, SessionError>;

    /// Fetch raw message bytes under the given projection.
    fn fetch(&mut self, id: MessageId, projection: Projection) -> Result<Vec<u8>, SessionError>;

    /// Copy a message from the selected folder into another folder.
    fn copy(&mut self, id: MessageId, dest_folder: &str) -> Result<(), SessionError>;

    /// Flag a message in the selected folder as seen.
    fn mark_seen(&mut self, id: MessageId) -> Result<(), SessionError>;

    /// List all folder names visible on the store.
    fn list_folders(&mut self) -> Result<Vec<String>, SessionError>;
}

#[cfg(test)]
pub mod mock {
    //! Recording mock session for trainer/router tests.

    use super::*;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    pub struct MockSession {
        /// folder -> message bytes, keyed by sequence number order.
        folders: HashMap<String, Vec<(MessageId, Vec<u8>)>>,
        unseen: HashMap<String, Vec<MessageId>>,
        selected: Option<String>,
        fail_select: HashSet<String>,
        fail_fetch: HashSet<MessageId>,
        fail_copy: HashSet<MessageId>,
        pub copies: Vec<(MessageId, String)>,
        pub seen: Vec<MessageId>,
    }

    impl MockSession {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_message(&mut self, folder: &str, id: u32, raw: &[u8]) {
            self.folders
                .entry(folder.to_string())
                .or_default()
                .push((MessageId(id), raw.to_vec()));
        }

        pub fn add_unseen(&mut self, folder: &str, id: u32, raw: &[u8]) {
            self.add_message(folder, id, raw);
            self.unseen
                .entry(folder.to_string())
                .or_default()
                .push(MessageId(id));
        }

        pub fn add_empty_folder(&mut self, folder: &str) {
            self.folders.entry(folder.to_string()).or_default();
        }

        pub fn fail_select(&mut self, folder: &str) {
            self.fail_select.insert(folder.to_string());
        }

        pub fn fail_fetch(&mut self, id: u32) {
            self.fail_fetch.insert(MessageId(id));
        }

        pub fn fail_copy(&mut self, id: u32) {
            self.fail_copy.insert(MessageId(id));
        }

        fn selected(&self) -> Result<&str, SessionError> {
            self.selected
                .as_deref()
                .ok_or_else(|| SessionError::Bad("no folder selected".to_string()))
        }
    }

    impl MailSession for MockSession {
        fn select(&mut self, folder: &str) -> Result<u32, SessionError> {
            if self.fail_select.contains(folder) {
                return Err(SessionError::No(format!("cannot select {folder}")));
            }
            let count = self
                .folders
                .get(folder)
                .map(|msgs| msgs.len() as u32)
                .ok_or_else(|| SessionError::No(format!("no such folder {folder}")))?;
            self.selected = Some(folder.to_string());
            Ok(count)
        }

        fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<MessageId>, SessionError> {
            let folder = self.selected()?.to_string();
            match criteria {
                SearchCriteria::All => Ok(self.folders[&folder]
                    .iter()
                    .map(|(id, _)| *id)
                    .collect()),
                SearchCriteria::Unseen => {
                    Ok(self.unseen.get(&folder).cloned().unwrap_or_default())
                }
            }
        }

        fn fetch(
            &mut self,
            id: MessageId,
            _projection: Projection,
        ) -> Result<Vec<u8>, SessionError> {
            if self.fail_fetch.contains(&id) {
                return Err(SessionError::No(format!("fetch {id} failed")));
            }
            let folder = self.selected()?.to_string();
            self.folders[&folder]
                .iter()
                .find(|(mid, _)| *mid == id)
                .map(|(_, raw)| raw.clone())
                .ok_or_else(|| SessionError::No(format!("no message {id}")))
        }

        fn copy(&mut self, id: MessageId, dest_folder: &str) -> Result<(), SessionError> {
            if self.fail_copy.contains(&id) {
                return Err(SessionError::No(format!("copy {id} failed")));
            }
            self.copies.push((id, dest_folder.to_string()));
            Ok(())
        }

        fn mark_seen(&mut self, id: MessageId) -> Result<(), SessionError> {
            self.seen.push(id);
            Ok(())
        }

        fn list_folders(&mut self) -> Result<Vec<String>, SessionError> {
            let mut names: Vec<String> = self.folders.keys().cloned().collect();
            names.sort();
            Ok(names)
        }
    }
}
