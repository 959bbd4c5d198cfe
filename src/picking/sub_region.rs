// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Partition of a note body into gesture regions.
//!
//! ```text
//!  +--+-------------------------+--+
//!  |up|                         |  |
//!  |--|          body           |ta|
//!  |dn|                         |b |
//!  +--+-------------------------+--+
//! ```
//!
//! The tab (resize handle) wins over the octave zone when a note is so
//! narrow that they would overlap. Rests never report octave regions.

use crate::config::EngineConfig;
use kurbo::{Point, Rect};

/// Named part of a note's interior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubRegion {
    Body,
    /// Right-edge resize handle
    Tab,
    /// Upper half of the left-edge octave zone
    OctaveUp,
    /// Lower half of the left-edge octave zone
    OctaveDown,
}

impl SubRegion {
    pub fn is_octave(self) -> bool {
        matches!(self, SubRegion::OctaveUp | SubRegion::OctaveDown)
    }
}

/// Screen widths of the tab and octave zones for a note
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneWidths {
    pub tab: f64,
    pub octave: f64,
}

impl ZoneWidths {
    /// Zones shrink to a third of the note width each
    pub fn for_rect(rect: Rect, config: &EngineConfig) -> Self {
        let third = rect.width() / 3.0;
        Self {
            tab: config.tab_width_px.min(third).max(0.0),
            octave: config.octave_zone_px.min(third).max(0.0),
        }
    }
}

/// Classify a screen point against a note's screen rectangle
pub fn classify(rect: Rect, silent: bool, p: Point, config: &EngineConfig) -> SubRegion {
    let zones = ZoneWidths::for_rect(rect, config);
    if rect.x1 - p.x <= zones.tab {
        return SubRegion::Tab;
    }
    if !silent && p.x - rect.x0 <= zones.octave {
        let offset = p.y - rect.center().y;
        if offset.abs() < config.octave_dead_zone_px * 0.5 {
            return SubRegion::Body;
        }
        // Screen y grows downward
        return if offset < 0.0 {
            SubRegion::OctaveUp
        } else {
            SubRegion::OctaveDown
        };
    }
    SubRegion::Body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rect {
        Rect::new(100.0, 50.0, 200.0, 70.0)
    }

    #[test]
    fn test_regions() {
        let config = EngineConfig::default();
        assert_eq!(classify(rect(), false, Point::new(150.0, 60.0), &config), SubRegion::Body);
        assert_eq!(classify(rect(), false, Point::new(197.0, 60.0), &config), SubRegion::Tab);
        assert_eq!(classify(rect(), false, Point::new(103.0, 53.0), &config), SubRegion::OctaveUp);
        assert_eq!(classify(rect(), false, Point::new(103.0, 67.0), &config), SubRegion::OctaveDown);
    }

    #[test]
    fn test_dead_zone_is_body() {
        let config = EngineConfig::default();
        assert_eq!(classify(rect(), false, Point::new(103.0, 60.2), &config), SubRegion::Body);
    }

    #[test]
    fn test_rest_has_no_octave_regions() {
        let config = EngineConfig::default();
        assert_eq!(classify(rect(), true, Point::new(103.0, 53.0), &config), SubRegion::Body);
        assert_eq!(classify(rect(), true, Point::new(197.0, 60.0), &config), SubRegion::Tab);
    }

    #[test]
    fn test_narrow_note_zones_shrink() {
        let config = EngineConfig::default();
        let narrow = Rect::new(0.0, 0.0, 12.0, 20.0);
        let zones = ZoneWidths::for_rect(narrow, &config);
        assert_eq!(zones.tab, 4.0);
        assert_eq!(zones.octave, 4.0);
        assert_eq!(classify(narrow, false, Point::new(6.0, 10.0), &config), SubRegion::Body);
    }
}
