// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Pointer interaction: one drag, resize, octave shift or measure drag
//! at a time.
//!
//! The machine is a plain value ([`Session`]) advanced by
//! [`machine::transition`], which returns the next session plus a list of
//! [`Effect`]s. Applying the effects (scene previews, selection, commit
//! emission, re-sync) is left to the engine.

pub mod attach;
pub mod commit;
pub mod machine;
pub mod snap;

pub use commit::{CommitEvent, OctaveDirection};
pub use machine::{TransitionContext, transition};

use crate::model::NoteId;
use crate::picking::Hit;
use kurbo::Point;
use std::collections::{BTreeMap, BTreeSet};

/// Pointer input in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Press, with the topmost hit under the pointer
    PointerDown { position: Point, hit: Option<Hit> },
    PointerMove { position: Point },
    PointerUp { position: Point },
    PointerCancel,
}

/// Gesture an active session performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Move,
    Resize,
    OctaveShift(OctaveDirection),
    MeasureDrag,
}

/// Start and duration of one entity when the session began
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub start: f64,
    pub duration: Option<f64>,
}

/// State of the gesture in progress
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub kind: SessionKind,
    pub anchor: NoteId,
    /// Snapshot of the anchor and every closure member at session start
    pub baseline: BTreeMap<NoteId, Baseline>,
    /// World-x distance from the pointer to the dragged edge at press
    pub pointer_offset: f64,
    /// Screen position of the press
    pub press: Point,
    /// Latest previewed value: a start for moves, a duration for resizes
    pub value: f64,
    /// Lower bound for `value`
    pub floor: f64,
    /// Notes moving with the anchor in the latest preview
    pub closure: BTreeSet<NoteId>,
    /// Live re-parent target
    pub attach: Option<NoteId>,
}

impl ActiveSession {
    /// Baseline value of the quantity this session edits
    pub fn baseline_value(&self) -> f64 {
        let Some(base) = self.baseline.get(&self.anchor) else {
            return self.value;
        };
        match self.kind {
            SessionKind::Resize => base.duration.unwrap_or(0.0),
            _ => base.start,
        }
    }

    /// Net change of the edited quantity against its baseline
    pub fn delta(&self) -> f64 {
        self.value - self.baseline_value()
    }
}

/// Interaction state
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Session {
    #[default]
    Idle,
    Active(ActiveSession),
}

impl Session {
    pub fn is_active(&self) -> bool {
        matches!(self, Session::Active(_))
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            Session::Active(active) => Some(active),
            Session::Idle => None,
        }
    }
}

/// A previewed position for one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewUpdate {
    pub id: NoteId,
    pub start: f64,
    /// New duration, for the anchor of a resize
    pub duration: Option<f64>,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Change the selection (and therefore draw order)
    Select(Option<NoteId>),
    /// Move entities in the scene cache without re-syncing
    Preview(Vec<PreviewUpdate>),
    /// Dependency rings and re-parent ring; empty clears them
    Highlight {
        dependents: BTreeSet<NoteId>,
        attach: Option<NoteId>,
    },
    /// Emit a commit to the application
    Commit(CommitEvent),
    /// Rebuild the scene from the model, discarding previews
    Resync,
}
