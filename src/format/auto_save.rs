//! Debounce bookkeeping for background saves.
//!
//! Edits are collected per annotation. A batch becomes due once the
//! debounce delay has passed since the newest edit and the minimum interval
//! has passed since the previous save.

use std::collections::BTreeSet;
use std::time::Duration;

use web_time::Instant;

use crate::config::AutoSaveSettings;
use crate::model::AnnotationId;

/// Tracks which annotations need saving and when.
#[derive(Debug)]
pub struct AutoSaveManager {
    /// Minimum interval between saves.
    save_interval: Duration,

    /// Wait this long after the last change before saving.
    debounce_delay: Duration,

    /// Time the last batch was handed off.
    last_save: Option<Instant>,

    /// Time of the newest unsaved change.
    last_change: Option<Instant>,

    enabled: bool,

    /// Annotations with unsaved changes.
    pending: BTreeSet<AnnotationId>,
}

impl AutoSaveManager {
    pub fn new(debounce_delay: Duration, save_interval: Duration) -> Self {
        Self {
            save_interval,
            debounce_delay,
            last_save: None,
            last_change: None,
            enabled: true,
            pending: BTreeSet::new(),
        }
    }

    pub fn from_settings(settings: &AutoSaveSettings) -> Self {
        let mut manager = Self::new(
            Duration::from_millis(settings.debounce_ms),
            Duration::from_millis(settings.min_interval_ms),
        );
        manager.enabled = settings.enabled;
        manager
    }

    /// Record that `id` changed.
    pub fn mark_dirty(&mut self, id: AnnotationId) {
        self.pending.insert(id);
        self.last_change = Some(Instant::now());
        log::trace!("Auto-save: annotation {} marked dirty", id);
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = AnnotationId> + '_ {
        self.pending.iter().copied()
    }

    /// Check if the pending batch should be written now.
    pub fn should_save(&self) -> bool {
        if !self.enabled || self.pending.is_empty() {
            return false;
        }

        let Some(last_change) = self.last_change else {
            return false;
        };
        if last_change.elapsed() < self.debounce_delay {
            return false;
        }

        match self.last_save {
            Some(last_save) => last_save.elapsed() >= self.save_interval,
            None => true,
        }
    }

    /// Take the pending batch regardless of timing and mark it saved.
    pub fn take_pending(&mut self) -> Vec<AnnotationId> {
        self.last_save = Some(Instant::now());
        self.last_change = None;
        let batch: Vec<AnnotationId> = std::mem::take(&mut self.pending).into_iter().collect();
        log::trace!("Auto-save: took {} pending annotations", batch.len());
        batch
    }

    /// Take the pending batch if it is due.
    pub fn take_due(&mut self) -> Option<Vec<AnnotationId>> {
        if self.should_save() {
            Some(self.take_pending())
        } else {
            None
        }
    }

    /// Put annotations whose save failed back into the batch.
    ///
    /// The retry waits for the minimum interval like any other save.
    pub fn mark_save_failed(&mut self, ids: impl IntoIterator<Item = AnnotationId>) {
        self.last_save = Some(Instant::now());
        self.pending.extend(ids);
        if self.last_change.is_none() {
            self.last_change = Some(Instant::now());
        }
        log::trace!("Auto-save: save failed, {} pending", self.pending.len());
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        log::debug!("Auto-save: enabled = {}", enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn time_since_last_save(&self) -> Option<Duration> {
        self.last_save.map(|t| t.elapsed())
    }
}

impl Default for AutoSaveManager {
    fn default() -> Self {
        Self::from_settings(&AutoSaveSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let manager = AutoSaveManager::default();
        assert!(!manager.is_dirty());
        assert!(!manager.should_save());
        assert!(manager.is_enabled());
    }

    #[test]
    fn test_mark_dirty_collects_ids() {
        let mut manager = AutoSaveManager::new(Duration::ZERO, Duration::ZERO);
        manager.mark_dirty(3);
        manager.mark_dirty(1);
        manager.mark_dirty(3);
        assert_eq!(manager.take_due(), Some(vec![1, 3]));
        assert!(!manager.is_dirty());
        assert_eq!(manager.take_due(), None);
    }

    #[test]
    fn test_disabled() {
        let mut manager = AutoSaveManager::new(Duration::ZERO, Duration::ZERO);
        manager.set_enabled(false);
        manager.mark_dirty(1);
        assert!(!manager.should_save());
        assert_eq!(manager.take_pending(), vec![1]);
    }

    #[test]
    fn test_debounce_prevents_immediate_save() {
        let mut manager = AutoSaveManager::new(Duration::from_secs(10), Duration::ZERO);
        manager.mark_dirty(1);
        assert!(!manager.should_save());
    }

    #[test]
    fn test_min_interval_between_saves() {
        let mut manager = AutoSaveManager::new(Duration::ZERO, Duration::from_secs(60));
        manager.mark_dirty(1);
        assert!(manager.take_due().is_some());
        manager.mark_dirty(2);
        assert!(!manager.should_save());
    }

    #[test]
    fn test_failed_ids_return_to_batch() {
        let mut manager = AutoSaveManager::new(Duration::ZERO, Duration::ZERO);
        manager.mark_dirty(1);
        let batch = manager.take_pending();
        manager.mark_save_failed(batch);
        assert!(manager.is_dirty());
        assert_eq!(manager.take_due(), Some(vec![1]));
    }
}
