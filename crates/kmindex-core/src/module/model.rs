//! Knowledge module domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KmError;

/// Language variant of a piece of module content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Amharic.
    Am,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Am => "am",
        }
    }

    /// The other language of the bilingual pair.
    pub fn counterpart(&self) -> Self {
        match self {
            Self::En => Self::Am,
            Self::Am => Self::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = KmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "am" | "amharic" => Ok(Self::Am),
            other => Err(KmError::invalid_input(format!(
                "Unknown language '{}'. Use: en, am",
                other
            ))),
        }
    }
}

/// A structured record describing one government-service procedure.
///
/// Only `title`, `body_text`, `workflow_steps` and `required_documents` are
/// change-relevant; everything else (URL, timestamps, translation) may vary
/// between scrapes without registering as a content change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeModule {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub workflow_steps: Vec<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl KnowledgeModule {
    /// Create a module with the change-relevant fields set and everything else defaulted.
    pub fn new(id: impl Into<String>, version: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            title: title.into(),
            body_text: String::new(),
            workflow_steps: Vec::new(),
            required_documents: Vec::new(),
            source_url: String::new(),
            language: Language::default(),
            translated_text: None,
            category: None,
            scraped_at: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body_text = body.into();
        self
    }

    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.workflow_steps = steps;
        self
    }

    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.required_documents = documents;
        self
    }

    pub fn with_translation(mut self, text: impl Into<String>) -> Self {
        self.translated_text = Some(text.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }
}
