// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Beat-grid snapping for drags and resizes

/// Rounds times and lengths to a fraction of the beat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapper {
    step: f64,
    origin: f64,
}

impl Snapper {
    /// Grid of `beat_length / divisions`, anchored at `origin`
    pub fn new(beat_length: f64, divisions: f64, origin: f64) -> Self {
        let step = if beat_length > 0.0 && divisions > 0.0 {
            beat_length / divisions
        } else {
            0.0
        };
        Self { step, origin }
    }

    /// Grid spacing in seconds
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Nearest grid time
    pub fn snap_time(&self, time: f64) -> f64 {
        if self.step <= 0.0 {
            return time;
        }
        self.origin + ((time - self.origin) / self.step).round() * self.step
    }

    /// Nearest grid length, never shorter than one step
    pub fn snap_length(&self, length: f64) -> f64 {
        if self.step <= 0.0 {
            return length.max(0.0);
        }
        ((length / self.step).round() * self.step).max(self.step)
    }
}
