//! Change detection across scrape cycles.

use std::path::Path;
use std::sync::Arc;

use kmindex_core::module::validate;
use kmindex_core::{KnowledgeModule, LogNotifier, ModuleSource, ProcessedModuleDir, ReviewNotifier};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::changelog::ChangeLog;
use crate::record::{ChangeLogEntry, ChangeType, ModuleContent, VersionRecord};
use crate::store::VersionStore;

/// Relative body-length change above which an update is major.
pub const MAJOR_CHANGE_RATIO: f64 = 0.15;

/// Counts produced by one detection run.
///
/// `removed` is always 0: modules missing from a batch are not tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Whether the change from `old` to `new` is structurally significant.
///
/// True when both bodies are non-empty and their length (in characters)
/// differs by more than 15% of the old length, or when the number of
/// workflow steps differs at all.
pub fn is_major_change(old: &ModuleContent, new: &ModuleContent) -> bool {
    let old_len = old.body_text.chars().count();
    let new_len = new.body_text.chars().count();

    if old_len > 0 && new_len > 0 {
        let ratio = old_len.abs_diff(new_len) as f64 / old_len as f64;
        if ratio > MAJOR_CHANGE_RATIO {
            return true;
        }
    }

    old.workflow_steps.len() != new.workflow_steps.len()
}

fn describe_major_change(old: &ModuleContent, new: &ModuleContent) -> String {
    let old_steps = old.workflow_steps.len();
    let new_steps = new.workflow_steps.len();
    if old_steps != new_steps {
        format!("Workflow steps changed from {} to {}", old_steps, new_steps)
    } else {
        format!(
            "Body length changed from {} to {} characters",
            old.body_text.chars().count(),
            new.body_text.chars().count()
        )
    }
}

/// Versions module content and classifies changes.
///
/// Runs one batch at a time; callers serialize detection runs.
pub struct VersionTracker {
    store: VersionStore,
    changelog: ChangeLog,
    notifier: Arc<dyn ReviewNotifier>,
}

impl VersionTracker {
    pub fn new(store: VersionStore, changelog: ChangeLog, notifier: Arc<dyn ReviewNotifier>) -> Self {
        Self {
            store,
            changelog,
            notifier,
        }
    }

    /// Tracker that only logs review requests.
    pub fn with_log_notifier(store: VersionStore, changelog: ChangeLog) -> Self {
        Self::new(store, changelog, Arc::new(LogNotifier))
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn changelog(&self) -> &ChangeLog {
        &self.changelog
    }

    async fn log_change(&self, entry: ChangeLogEntry) {
        debug!(module_id = %entry.module_id, change = entry.change_type.as_str(), "Change recorded");
        if let Err(e) = self.changelog.append(&entry).await {
            warn!(module_id = %entry.module_id, error = %e, "Failed to append change-log entry");
        }
    }

    /// Classify each module of a scrape batch against its stored version.
    ///
    /// Modules without an id or title, and modules whose stored version file
    /// is unreadable or holds another module's record, are skipped with a warning.
    pub async fn detect_changes(&self, modules: &[KnowledgeModule]) -> ChangeReport {
        let mut report = ChangeReport::default();

        for module in modules {
            if let Err(e) = validate(module) {
                warn!(module_id = %module.id, error = %e, "Skipping module");
                continue;
            }

            let mut current = VersionRecord::from_module(module);

            let existing = match self.store.get(&module.id, &module.version).await {
                Ok(existing) => existing,
                Err(e) => {
                    warn!(module_id = %module.id, version = %module.version, error = %e, "Skipping module with unusable version file");
                    continue;
                }
            };

            match existing {
                None => {
                    if let Err(e) = self.store.save(&current).await {
                        warn!(module_id = %module.id, error = %e, "Failed to save new version record");
                        continue;
                    }
                    self.log_change(ChangeLogEntry::new(
                        ChangeType::Added,
                        &module.id,
                        format!("New module added: {} (v{})", module.title, module.version),
                    ))
                    .await;
                    report.added += 1;
                }
                Some(previous) if previous.checksum == current.checksum => {
                    debug!(module_id = %module.id, "Module unchanged");
                }
                Some(previous) => {
                    self.store.archive_previous(&module.id, &module.version).await;

                    let major = is_major_change(&previous.content, &current.content);
                    current.needs_review = major;
                    if let Err(e) = self.store.save(&current).await {
                        warn!(module_id = %module.id, error = %e, "Failed to save updated version record");
                        continue;
                    }

                    if major {
                        let reason = describe_major_change(&previous.content, &current.content);
                        self.notifier.mark_for_review(&module.id, &reason);
                        self.log_change(ChangeLogEntry::new(
                            ChangeType::MajorUpdate,
                            &module.id,
                            format!("Major update to {}: {}", module.title, reason),
                        ))
                        .await;
                    } else {
                        self.log_change(ChangeLogEntry::new(
                            ChangeType::Updated,
                            &module.id,
                            format!("Module updated: {} (v{})", module.title, module.version),
                        ))
                        .await;
                    }
                    report.updated += 1;
                }
            }
        }

        info!(
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            "Change detection complete"
        );
        report
    }

    /// Run detection over the processed-module directory.
    ///
    /// A missing or unreadable directory yields an all-zero report.
    pub async fn detect_changes_in_dir(&self, dir: &Path) -> ChangeReport {
        let source = ProcessedModuleDir::new(dir);
        match source.list().await {
            Ok(modules) => self.detect_changes(&modules).await,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read processed modules");
                ChangeReport::default()
            }
        }
    }

    /// Stored versions of a module, newest first. Failures yield an empty history.
    pub async fn module_history(&self, module_id: &str) -> Vec<VersionRecord> {
        match self.store.history(module_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(module_id = %module_id, error = %e, "Failed to read module history");
                Vec::new()
            }
        }
    }
}
