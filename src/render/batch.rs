// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Cached instance data for one draw family.

use crate::scene::{EpochKind, EpochStamp, Epochs};

/// Instances of one batch plus the epochs they were built at
#[derive(Debug)]
pub struct BatchSlot<T> {
    data: Vec<T>,
    stamp: EpochStamp,
    /// Overlay revision the data was built at, for batches that depend
    /// on hover and highlight state
    overlay: Option<u64>,
    dirty_upload: bool,
    rebuilds: usize,
}

impl<T> Default for BatchSlot<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            stamp: EpochStamp::new(),
            overlay: None,
            dirty_upload: true,
            rebuilds: 0,
        }
    }
}

impl<T> BatchSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cached data is stale for `deps` or the overlay state
    pub fn needs_rebuild(&self, epochs: &Epochs, deps: &[EpochKind], overlay: Option<u64>) -> bool {
        !self.stamp.is_current(epochs, deps) || self.overlay != overlay
    }

    /// Replace the cached data
    pub fn store(&mut self, data: Vec<T>, epochs: &Epochs, overlay: Option<u64>) {
        self.data = data;
        self.stamp.mark(epochs);
        self.overlay = overlay;
        self.dirty_upload = true;
        self.rebuilds += 1;
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Whether the backend copy is behind the cached data
    pub fn needs_upload(&self) -> bool {
        self.dirty_upload
    }

    pub fn mark_uploaded(&mut self) {
        self.dirty_upload = false;
    }

    /// Force a rebuild on the next frame
    pub fn invalidate(&mut self) {
        self.stamp.invalidate();
    }

    /// How many times the data has been rebuilt
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPS: [EpochKind; 2] = [EpochKind::View, EpochKind::Position];

    #[test]
    fn test_fresh_slot_needs_rebuild() {
        let slot: BatchSlot<u32> = BatchSlot::new();
        assert!(slot.needs_rebuild(&Epochs::new(), &DEPS, None));
        assert!(slot.needs_upload());
    }

    #[test]
    fn test_rebuild_follows_dependencies() {
        let mut epochs = Epochs::new();
        let mut slot = BatchSlot::new();
        slot.store(vec![1u32, 2], &epochs, None);
        assert!(!slot.needs_rebuild(&epochs, &DEPS, None));
        epochs.bump(EpochKind::Text);
        assert!(!slot.needs_rebuild(&epochs, &DEPS, None));
        epochs.bump(EpochKind::View);
        assert!(slot.needs_rebuild(&epochs, &DEPS, None));
    }

    #[test]
    fn test_overlay_revision_is_a_dependency() {
        let epochs = Epochs::new();
        let mut slot = BatchSlot::new();
        slot.store(vec![0u32], &epochs, Some(1));
        assert!(!slot.needs_rebuild(&epochs, &DEPS, Some(1)));
        assert!(slot.needs_rebuild(&epochs, &DEPS, Some(2)));
    }

    #[test]
    fn test_upload_flag() {
        let epochs = Epochs::new();
        let mut slot = BatchSlot::new();
        slot.store(vec![0u32], &epochs, None);
        slot.mark_uploaded();
        assert!(!slot.needs_upload());
        // A rebuild makes the backend copy stale again
        slot.store(vec![1u32], &epochs, Some(1));
        assert!(slot.needs_upload());
        assert_eq!(slot.rebuilds(), 2);
    }
}
