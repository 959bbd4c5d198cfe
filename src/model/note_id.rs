// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Stable note identifiers.
//!
//! Ids are assigned by the external model and never reused while a note
//! exists. Id 0 is reserved for the origin (base) note that every other
//! position is ultimately expressed against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a note in the external model
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NoteId(u32);

impl NoteId {
    /// The origin note
    pub const ORIGIN: NoteId = NoteId(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn is_origin(self) -> bool {
        self == Self::ORIGIN
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::str::FromStr for NoteId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(NoteId)
    }
}
