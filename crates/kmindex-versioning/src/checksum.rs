//! Content checksums.

use crate::record::ModuleContent;

/// MD5 hex digest of the canonical JSON serialization of `content`.
///
/// Only the change-relevant fields take part, so URL or timestamp churn
/// between scrapes never registers as a change.
pub fn checksum(content: &ModuleContent) -> String {
    // Serializing a plain struct of strings cannot fail.
    let canonical = serde_json::to_vec(content).unwrap_or_default();
    format!("{:x}", md5::compute(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(body: &str) -> ModuleContent {
        ModuleContent {
            title: "Business licence".to_string(),
            body_text: body.to_string(),
            workflow_steps: vec!["Register".to_string(), "Pay".to_string()],
            required_documents: vec!["ID card".to_string()],
        }
    }

    #[test]
    fn test_stable() {
        assert_eq!(checksum(&content("Apply online")), checksum(&content("Apply online")));
        assert_eq!(checksum(&content("Apply online")).len(), 32);
    }

    #[test]
    fn test_single_character_change() {
        assert_ne!(checksum(&content("Apply online")), checksum(&content("Apply onlinE")));
    }

    #[test]
    fn test_step_order_matters() {
        let mut reordered = content("x");
        reordered.workflow_steps.reverse();
        assert_ne!(checksum(&content("x")), checksum(&reordered));
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let mut a = content("");
        a.workflow_steps = vec!["ab".to_string()];
        let mut b = content("");
        b.workflow_steps = vec!["a".to_string(), "b".to_string()];
        assert_ne!(checksum(&a), checksum(&b));
    }
}
