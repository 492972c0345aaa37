//! KMIndex Core Library
//!
//! Knowledge-module data model, error taxonomy, configuration and the
//! collaborator interfaces (module store, review notifier) shared by the
//! embedding index and the version tracker.

pub mod config;
pub mod error;
pub mod module;
pub mod notifier;
pub mod source;

pub use config::{EmbedderKind, IndexConfig};
pub use error::{KmError, KmResult};
pub use module::model::{KnowledgeModule, Language};
pub use notifier::{LogNotifier, ReviewNotifier, WebhookNotifier};
pub use source::{ModuleSource, ProcessedModuleDir};
