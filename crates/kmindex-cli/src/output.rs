//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use kmindex_embedding::SimilarityHit;
use kmindex_versioning::{ChangeLogEntry, ChangeReport, ChangeType, VersionRecord};
use unicode_width::UnicodeWidthStr;

/// Print the counts from a change-detection run.
pub fn print_change_report(report: &ChangeReport) {
    println!(
        "{} {} added | {} updated | {} removed",
        "Changes:".bold(),
        report.added.to_string().green(),
        report.updated.to_string().yellow(),
        report.removed
    );
}

/// Print search hits as a table.
pub fn print_hits_table(hits: &[SimilarityHit]) {
    println!(
        "{} {} {} {}",
        pad_visual("ID", 32),
        pad_visual("Score", 8),
        pad_visual("Lang", 5),
        "Version"
    );
    println!("{}", "─".repeat(60));

    for hit in hits {
        println!(
            "{} {} {} {}",
            pad_visual(&truncate_visual(&hit.id, 32), 32),
            pad_visual(&format!("{:.4}", hit.similarity), 8),
            pad_visual(hit.metadata.language.as_str(), 5),
            hit.metadata.version.dimmed()
        );
    }
}

/// Print version records, newest first.
pub fn print_history(history: &[VersionRecord]) {
    for record in history {
        let review = if record.needs_review {
            " needs review".red()
        } else {
            "".normal()
        };
        println!(
            "  v{} {} {}{}",
            pad_visual(&record.version, 8).cyan(),
            record.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            &record.checksum[..8.min(record.checksum.len())],
            review
        );
        println!(
            "    {} | {} chars | {} steps | {} documents",
            truncate_visual(&record.content.title, 40),
            record.content.body_text.chars().count(),
            record.content.workflow_steps.len(),
            record.content.required_documents.len()
        );
    }
}

fn change_label(change_type: ChangeType) -> ColoredString {
    let label = pad_visual(change_type.as_str(), 12);
    match change_type {
        ChangeType::Added => label.green(),
        ChangeType::Updated => label.yellow(),
        ChangeType::MajorUpdate => label.red().bold(),
    }
}

/// Print change-log entries.
pub fn print_changes(entries: &[ChangeLogEntry]) {
    for entry in entries {
        println!(
            "{} {} {} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            change_label(entry.change_type),
            entry.module_id.cyan(),
            entry.message
        );
    }
}

/// Pad to a visual column width (wide scripts occupy two columns per glyph).
fn pad_visual(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string to a maximum visual width, appending "..".
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_visual() {
        assert_eq!(truncate_visual("short", 10), "short");
        assert_eq!(truncate_visual("passport-renewal-en", 10), "passport..");
        assert_eq!(truncate_visual("abcdef", 3), "...");
    }

    #[test]
    fn test_pad_visual() {
        assert_eq!(pad_visual("ab", 4), "ab  ");
        assert_eq!(pad_visual("abcdef", 4), "abcdef");
    }
}
