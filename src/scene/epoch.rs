// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Epoch counters gating derived-buffer rebuilds.
//!
//! Each counter marks the generation of one category of derived state.
//! Counters only grow and are bumped once per logical event. A consumer
//! keeps an [`EpochStamp`] next to its derived buffer and rebuilds only
//! when the stamp disagrees with the current counters it depends on.

/// Category of change tracked by an epoch counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpochKind {
    /// Camera, viewport or zoom changed
    View,
    /// Some instance moved or was resized
    Position,
    /// Instances were added, removed or reordered
    Topology,
    /// Derived label content changed
    Text,
}

impl EpochKind {
    pub const ALL: [EpochKind; 4] = [
        EpochKind::View,
        EpochKind::Position,
        EpochKind::Topology,
        EpochKind::Text,
    ];

    fn slot(self) -> usize {
        match self {
            EpochKind::View => 0,
            EpochKind::Position => 1,
            EpochKind::Topology => 2,
            EpochKind::Text => 3,
        }
    }
}

/// The four epoch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Epochs {
    counters: [u64; 4],
}

impl Epochs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one counter
    pub fn get(&self, kind: EpochKind) -> u64 {
        self.counters[kind.slot()]
    }

    /// Advance one counter and return its new value
    pub fn bump(&mut self, kind: EpochKind) -> u64 {
        let slot = &mut self.counters[kind.slot()];
        *slot += 1;
        tracing::trace!("epoch {:?} -> {}", kind, *slot);
        *slot
    }

    pub fn view(&self) -> u64 {
        self.get(EpochKind::View)
    }

    pub fn position(&self) -> u64 {
        self.get(EpochKind::Position)
    }

    pub fn topology(&self) -> u64 {
        self.get(EpochKind::Topology)
    }

    pub fn text(&self) -> u64 {
        self.get(EpochKind::Text)
    }
}

/// Epochs observed when a derived buffer was last built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochStamp {
    seen: Option<[u64; 4]>,
}

impl EpochStamp {
    /// A stamp that matches nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the buffer is still valid for every counter in `deps`
    pub fn is_current(&self, epochs: &Epochs, deps: &[EpochKind]) -> bool {
        match &self.seen {
            Some(seen) => deps
                .iter()
                .all(|kind| seen[kind.slot()] == epochs.get(*kind)),
            None => false,
        }
    }

    /// Record the current counters after a rebuild
    pub fn mark(&mut self, epochs: &Epochs) {
        self.seen = Some(epochs.counters);
    }

    /// Force the next check to fail
    pub fn invalidate(&mut self) {
        self.seen = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero_and_grow() {
        let mut epochs = Epochs::new();
        assert_eq!(epochs.position(), 0);
        assert_eq!(epochs.bump(EpochKind::Position), 1);
        assert_eq!(epochs.bump(EpochKind::Position), 2);
        assert_eq!(epochs.view(), 0);
    }

    #[test]
    fn test_fresh_stamp_is_stale() {
        let epochs = Epochs::new();
        let stamp = EpochStamp::new();
        assert!(!stamp.is_current(&epochs, &[EpochKind::Position]));
    }

    #[test]
    fn test_stamp_tracks_only_its_dependencies() {
        let mut epochs = Epochs::new();
        let mut stamp = EpochStamp::new();
        stamp.mark(&epochs);
        let deps = [EpochKind::Position, EpochKind::Topology];
        assert!(stamp.is_current(&epochs, &deps));

        epochs.bump(EpochKind::Text);
        assert!(stamp.is_current(&epochs, &deps));

        epochs.bump(EpochKind::Position);
        assert!(!stamp.is_current(&epochs, &deps));

        stamp.mark(&epochs);
        assert!(stamp.is_current(&epochs, &deps));
    }

    #[test]
    fn test_invalidate() {
        let epochs = Epochs::new();
        let mut stamp = EpochStamp::new();
        stamp.mark(&epochs);
        stamp.invalidate();
        assert!(!stamp.is_current(&epochs, &EpochKind::ALL));
    }
}
