//! Version and change-log records.

use chrono::{DateTime, Utc};
use kmindex_core::KnowledgeModule;
use serde::{Deserialize, Serialize};

use crate::checksum::checksum;

/// The change-relevant fields of a module.
///
/// Field order here is the canonical serialization order fed to the checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleContent {
    pub title: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub workflow_steps: Vec<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
}

impl From<&KnowledgeModule> for ModuleContent {
    fn from(module: &KnowledgeModule) -> Self {
        Self {
            title: module.title.clone(),
            body_text: module.body_text.clone(),
            workflow_steps: module.workflow_steps.clone(),
            required_documents: module.required_documents.clone(),
        }
    }
}

/// One stored version of a module, keyed by `(module_id, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub module_id: String,
    pub version: String,
    pub content: ModuleContent,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub needs_review: bool,
}

impl VersionRecord {
    pub fn new(module_id: impl Into<String>, version: impl Into<String>, content: ModuleContent) -> Self {
        let checksum = checksum(&content);
        Self {
            module_id: module_id.into(),
            version: version.into(),
            content,
            checksum,
            created_at: Utc::now(),
            needs_review: false,
        }
    }

    pub fn from_module(module: &KnowledgeModule) -> Self {
        Self::new(&module.id, &module.version, ModuleContent::from(module))
    }
}

/// Kind of change recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Updated,
    MajorUpdate,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::MajorUpdate => "major_update",
        }
    }
}

/// Append-only change-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub change_type: ChangeType,
    pub module_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChangeLogEntry {
    pub fn new(change_type: ChangeType, module_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            change_type,
            module_id: module_id.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
