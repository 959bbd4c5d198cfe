// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Backend resource arena.
//!
//! Resources are owned here, keyed by logical name, and handed to the
//! pipeline by key each frame rather than held as long-lived handles.
//! Capacity grows to the next power of two. When the backend refuses an
//! allocation the slot falls back to a one-instance placeholder and is
//! marked degraded; degraded slots are retried after the next viewport
//! change.

use super::backend::{RasterBackend, RasterError, ResourceHandle, ResourceKey};
use std::collections::BTreeMap;

/// Bytes of the placeholder used for the glyph atlas (1×1 RGBA)
const ATLAS_PLACEHOLDER_BYTES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    handle: ResourceHandle,
    capacity: usize,
    degraded: bool,
}

/// Live resources by logical key
#[derive(Debug, Default)]
pub struct ResourceArena {
    slots: BTreeMap<ResourceKey, Slot>,
}

impl ResourceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `key` has room for `bytes` and return its handle with
    /// the usable capacity in bytes.
    ///
    /// Never fails outright: on allocation failure the slot holds a
    /// placeholder of `min_bytes` (one record) and the caller must clip
    /// its upload to the returned capacity. `None` only when even the
    /// placeholder could not be created.
    pub fn ensure(
        &mut self,
        backend: &mut dyn RasterBackend,
        key: ResourceKey,
        bytes: usize,
        min_bytes: usize,
    ) -> Option<(ResourceHandle, usize)> {
        if let Some(slot) = self.slots.get(&key) {
            if slot.degraded || slot.capacity >= bytes {
                return Some((slot.handle, slot.capacity));
            }
        }

        if let Some(old) = self.slots.remove(&key) {
            backend.release(old.handle);
        }

        let wanted = bytes.max(min_bytes).next_power_of_two();
        match backend.allocate(key, wanted) {
            Ok(handle) => {
                tracing::debug!("Allocated {} bytes for {:?}", wanted, key);
                self.slots.insert(
                    key,
                    Slot {
                        handle,
                        capacity: wanted,
                        degraded: false,
                    },
                );
                Some((handle, wanted))
            }
            Err(err) => self.fall_back(backend, key, min_bytes, &err),
        }
    }

    fn fall_back(
        &mut self,
        backend: &mut dyn RasterBackend,
        key: ResourceKey,
        min_bytes: usize,
        err: &RasterError,
    ) -> Option<(ResourceHandle, usize)> {
        tracing::warn!("{err}; using a placeholder for {:?}", key);
        let bytes = match key {
            ResourceKey::GlyphAtlas => ATLAS_PLACEHOLDER_BYTES,
            ResourceKey::Batch(_) => min_bytes,
        };
        match backend.allocate(key, bytes) {
            Ok(handle) => {
                self.slots.insert(
                    key,
                    Slot {
                        handle,
                        capacity: bytes,
                        degraded: true,
                    },
                );
                Some((handle, bytes))
            }
            Err(err) => {
                tracing::warn!("Placeholder for {:?} failed too: {err}", key);
                None
            }
        }
    }

    /// Handle currently held for a key
    pub fn handle(&self, key: ResourceKey) -> Option<ResourceHandle> {
        self.slots.get(&key).map(|slot| slot.handle)
    }

    pub fn is_degraded(&self, key: ResourceKey) -> bool {
        self.slots.get(&key).is_some_and(|slot| slot.degraded)
    }

    pub fn any_degraded(&self) -> bool {
        self.slots.values().any(|slot| slot.degraded)
    }

    /// Drop placeholders so the next `ensure` retries a full allocation
    pub fn retry_degraded(&mut self, backend: &mut dyn RasterBackend) {
        let degraded: Vec<ResourceKey> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.degraded)
            .map(|(key, _)| *key)
            .collect();
        for key in degraded {
            if let Some(slot) = self.slots.remove(&key) {
                tracing::debug!("Retrying allocation for {:?}", key);
                backend.release(slot.handle);
            }
        }
    }

    /// Release everything
    pub fn release_all(&mut self, backend: &mut dyn RasterBackend) {
        for (_, slot) in std::mem::take(&mut self.slots) {
            backend.release(slot.handle);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{BatchKind, RecordingBackend};

    const BODIES: ResourceKey = ResourceKey::Batch(BatchKind::Bodies);

    #[test]
    fn test_grows_to_power_of_two_and_reuses() {
        let mut backend = RecordingBackend::new();
        let mut arena = ResourceArena::new();
        let (first, capacity) = arena.ensure(&mut backend, BODIES, 100, 48).unwrap();
        assert_eq!(capacity, 128);
        let (again, _) = arena.ensure(&mut backend, BODIES, 120, 48).unwrap();
        assert_eq!(first, again);
        let (grown, capacity) = arena.ensure(&mut backend, BODIES, 200, 48).unwrap();
        assert_ne!(first, grown);
        assert_eq!(capacity, 256);
        assert_eq!(backend.live_resources(), 1);
    }

    #[test]
    fn test_failure_falls_back_to_placeholder() {
        let mut backend = RecordingBackend::with_allocation_limit(64);
        let mut arena = ResourceArena::new();
        let (_, capacity) = arena.ensure(&mut backend, BODIES, 4096, 48).unwrap();
        assert_eq!(capacity, 48);
        assert!(arena.is_degraded(BODIES));
        // Stays on the placeholder until a retry is requested
        let (_, capacity) = arena.ensure(&mut backend, BODIES, 4096, 48).unwrap();
        assert_eq!(capacity, 48);
    }

    #[test]
    fn test_retry_after_viewport_change() {
        let mut backend = RecordingBackend::with_allocation_limit(64);
        let mut arena = ResourceArena::new();
        arena.ensure(&mut backend, BODIES, 4096, 48);
        backend.max_allocation = None;
        arena.retry_degraded(&mut backend);
        let (_, capacity) = arena.ensure(&mut backend, BODIES, 4096, 48).unwrap();
        assert_eq!(capacity, 4096);
        assert!(!arena.any_degraded());
    }

    #[test]
    fn test_release_all() {
        let mut backend = RecordingBackend::new();
        let mut arena = ResourceArena::new();
        arena.ensure(&mut backend, BODIES, 10, 48);
        arena.ensure(&mut backend, ResourceKey::GlyphAtlas, 10, 4);
        arena.release_all(&mut backend);
        assert!(arena.is_empty());
        assert_eq!(backend.live_resources(), 0);
    }
}
