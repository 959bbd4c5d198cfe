// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Live re-parent target for a note being moved.
//!
//! A dragged note would attach to whichever time anchor sits closest
//! before its new start: a note start, a note end, a measure bar or the
//! origin. The anchor itself and everything that moves with it are not
//! candidates.

use crate::model::NoteId;
use crate::scene::{NoteKind, SceneCache};
use std::collections::BTreeSet;

/// Tolerance when comparing a candidate time to the new start
const TIME_EPSILON: f64 = 1e-9;

/// Note that would become the parent if the anchor were dropped at
/// `new_start`
pub fn attach_target(
    scene: &SceneCache,
    anchor: NoteId,
    moving: &BTreeSet<NoteId>,
    new_start: f64,
) -> Option<NoteId> {
    let excluded = |id: NoteId| id == anchor || moving.contains(&id);
    let mut best: Option<(f64, NoteId)> = None;
    let mut consider = |time: f64, id: NoteId| {
        if time > new_start + TIME_EPSILON {
            return;
        }
        match best {
            Some((t, _)) if t >= time => {}
            _ => best = Some((time, id)),
        }
    };

    if let Some(origin) = scene.origin() {
        consider(origin.start, origin.id);
    }
    for marker in scene.measures() {
        if !excluded(marker.id) {
            consider(marker.start, marker.id);
        }
    }
    for inst in scene.instances() {
        if excluded(inst.id) {
            continue;
        }
        if let NoteKind::Playable { start, duration, .. } = inst.kind {
            consider(start, inst.id);
            consider(start + duration, inst.id);
        }
    }
    best.map(|(_, id)| id)
}
