pub mod classifier;
pub mod config;
pub mod features;
pub mod imap;
pub mod message;
pub mod model;
pub mod router;
pub mod session;
pub mod trainer;

pub use classifier::{Classification, Classifier, Label};
pub use config::Config;
pub use imap::ImapClient;
pub use model::{Model, ModelStore};
pub use router::{Outcome, Router};
pub use session::{MailSession, MessageId, SessionError};
pub use trainer::Trainer;
