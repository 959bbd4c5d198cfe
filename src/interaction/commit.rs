// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Commit events emitted to the surrounding application

use crate::model::NoteId;
use std::fmt;

/// Direction of an octave shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OctaveDirection {
    Up,
    Down,
}

impl OctaveDirection {
    /// Frequency ratio applied by the shift
    pub fn ratio(self) -> f64 {
        match self {
            OctaveDirection::Up => 2.0,
            OctaveDirection::Down => 0.5,
        }
    }
}

/// A completed, non-trivial interaction.
///
/// These four shapes are the only way the canvas core changes the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommitEvent {
    NoteMove { id: NoteId, new_start: f64 },
    NoteResize { id: NoteId, new_duration: f64 },
    OctaveChange { id: NoteId, direction: OctaveDirection },
    MeasureResize { id: NoteId, new_start: f64 },
}

impl CommitEvent {
    /// The note the commit applies to
    pub fn id(&self) -> NoteId {
        match *self {
            CommitEvent::NoteMove { id, .. }
            | CommitEvent::NoteResize { id, .. }
            | CommitEvent::OctaveChange { id, .. }
            | CommitEvent::MeasureResize { id, .. } => id,
        }
    }
}

impl fmt::Display for CommitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitEvent::NoteMove { id, new_start } => {
                write!(f, "moved {id} to {new_start:.3}s")
            }
            CommitEvent::NoteResize { id, new_duration } => {
                write!(f, "resized {id} to {new_duration:.3}s")
            }
            CommitEvent::OctaveChange { id, direction } => {
                write!(f, "shifted {id} an octave {direction:?}")
            }
            CommitEvent::MeasureResize { id, new_start } => {
                write!(f, "moved measure {id} to {new_start:.3}s")
            }
        }
    }
}
