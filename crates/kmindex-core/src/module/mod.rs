//! Knowledge modules: the unit of content ingested per scrape cycle.

pub mod model;

use crate::error::{KmError, KmResult};
use model::{KnowledgeModule, Language};

/// Check that a module carries the fields every downstream step relies on.
pub fn validate(module: &KnowledgeModule) -> KmResult<()> {
    if module.id.trim().is_empty() {
        return Err(KmError::MissingField {
            module_id: String::new(),
            field: "id".to_string(),
        });
    }
    if module.title.trim().is_empty() {
        return Err(KmError::MissingField {
            module_id: module.id.clone(),
            field: "title".to_string(),
        });
    }
    Ok(())
}

/// File-system safe form of an id or version tag.
///
/// Alphanumerics, `-` and `.` are kept; every other byte, `_` and `%`
/// included, becomes `%XX`. Distinct inputs never share a key, and a key
/// never contains `_`, so it can be joined to others with `_` separators.
pub fn storage_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_alphanumeric() || matches!(ch, '-' | '.') {
            key.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                key.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    key
}

/// Text embedded for the module's original language.
pub fn original_text(module: &KnowledgeModule) -> String {
    let mut text = module.title.clone();
    if !module.body_text.is_empty() {
        text.push_str("\n\n");
        text.push_str(&module.body_text);
    }
    if !module.workflow_steps.is_empty() {
        text.push_str("\n\n");
        text.push_str(&module.workflow_steps.join("\n"));
    }
    if !module.required_documents.is_empty() {
        text.push_str("\n\n");
        text.push_str(&module.required_documents.join(", "));
    }
    text
}

/// Language/text pairs to embed for a module: the original, plus the translation when present.
pub fn language_variants(module: &KnowledgeModule) -> Vec<(Language, String)> {
    let mut variants = vec![(module.language, original_text(module))];
    if let Some(translated) = module.translated_text.as_deref() {
        if !translated.trim().is_empty() {
            variants.push((module.language.counterpart(), translated.to_string()));
        }
    }
    variants
}
