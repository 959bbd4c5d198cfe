// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Application settings and configuration constants.
//!
//! This module holds non-visual settings that stay stable across theme
//! changes. Visual styling (colors) belongs in `theme.rs`. The subset a
//! user may want to tune at runtime is mirrored by
//! [`EngineConfig`](crate::config::EngineConfig), which takes its
//! defaults from here.

// ============================================================================
// EDITOR SETTINGS
// ============================================================================
/// Minimum zoom level (2% of original size)
const MIN_ZOOM: f64 = 0.02;

/// Maximum zoom level (50x original size)
const MAX_ZOOM: f64 = 50.0;

/// Zoom factor applied per scroll-wheel line
const SCROLL_ZOOM_STEP: f64 = 1.1;

// ============================================================================
// WORLD LAYOUT
// ============================================================================
/// World units per second of time (x axis)
const TIME_SCALE: f64 = 200.0;

/// World units per octave of frequency (y axis, up is higher)
const OCTAVE_HEIGHT: f64 = 120.0;

/// Height of a note body in world units
const NOTE_HEIGHT: f64 = 20.0;

/// Frequency used for the origin when the model does not provide one
const DEFAULT_ORIGIN_FREQUENCY: f64 = 440.0;

/// Tempo used when the model does not provide one (beats per minute)
const DEFAULT_TEMPO: f64 = 60.0;

// ============================================================================
// RENDER SETTINGS (screen-space pixels, zoom independent)
// ============================================================================
/// Corner radius of note bodies
const CORNER_RADIUS_PX: f64 = 6.0;

/// Width of selection / hover / dependency rings
const RING_WIDTH_PX: f64 = 2.0;

/// Width of dashed borders around silent notes and measure bars
const BORDER_WIDTH_PX: f64 = 1.5;

/// Dash and gap lengths measured along a shape perimeter
const DASH_PX: f64 = 6.0;
const GAP_PX: f64 = 4.0;

/// Edge length of the measure marker triangles
const TRIANGLE_SIZE_PX: f64 = 14.0;

/// Radius of the origin circle
const ORIGIN_RADIUS_PX: f64 = 8.0;

/// Font size of the duration labels drawn inside notes
const LABEL_FONT_SIZE: f64 = 11.0;

/// Inset of a label from the note's left edge
const LABEL_PADDING_PX: f64 = 4.0;

/// Depth assigned to the first instance; later instances step toward zero
const BASE_DEPTH: f32 = 0.9;

/// Depth offset between consecutive instances in draw order
const DEPTH_STEP: f32 = 1.0e-5;

// ============================================================================
// PICKING SETTINGS
// ============================================================================
/// Default hit tolerance around straight edges (screen pixels)
const PICK_TOLERANCE_PX: f64 = 3.0;

/// Width of the right-edge resize tab
const TAB_WIDTH_PX: f64 = 8.0;

/// Width of the left-edge octave shift zone
const OCTAVE_ZONE_PX: f64 = 10.0;

/// Half-height of the dead-zone around the octave zone midline
const OCTAVE_DEAD_ZONE_PX: f64 = 2.0;

// ============================================================================
// SNAP / INTERACTION SETTINGS
// ============================================================================
/// Snap subdivisions per beat (4 = sixteenth notes in 4/4)
const SNAP_DIVISIONS_PER_BEAT: f64 = 4.0;

/// Net change (seconds) below which a release counts as a click
const COMMIT_EPSILON: f64 = 1.0e-6;

/// Pointer travel (screen pixels) below which an octave press is a click
const CLICK_SLOP_PX: f64 = 4.0;

// ============================================================================
// PUBLIC API - Don't edit below this line unless you know what you're doing
// ============================================================================

/// Editor settings (zoom, viewport, etc.)
pub mod editor {
    /// Minimum zoom level (2% of original size)
    pub const MIN_ZOOM: f64 = super::MIN_ZOOM;

    /// Maximum zoom level (50x original size)
    pub const MAX_ZOOM: f64 = super::MAX_ZOOM;

    /// Zoom factor per scroll line
    pub const SCROLL_ZOOM_STEP: f64 = super::SCROLL_ZOOM_STEP;
}

/// Mapping between model values and world coordinates
pub mod layout {
    pub const TIME_SCALE: f64 = super::TIME_SCALE;
    pub const OCTAVE_HEIGHT: f64 = super::OCTAVE_HEIGHT;
    pub const NOTE_HEIGHT: f64 = super::NOTE_HEIGHT;
    pub const DEFAULT_ORIGIN_FREQUENCY: f64 = super::DEFAULT_ORIGIN_FREQUENCY;
    pub const DEFAULT_TEMPO: f64 = super::DEFAULT_TEMPO;
}

/// Screen-space sizes used by the raster pipeline
pub mod render {
    pub const CORNER_RADIUS_PX: f64 = super::CORNER_RADIUS_PX;
    pub const RING_WIDTH_PX: f64 = super::RING_WIDTH_PX;
    pub const BORDER_WIDTH_PX: f64 = super::BORDER_WIDTH_PX;
    pub const DASH_PX: f64 = super::DASH_PX;
    pub const GAP_PX: f64 = super::GAP_PX;
    pub const TRIANGLE_SIZE_PX: f64 = super::TRIANGLE_SIZE_PX;
    pub const ORIGIN_RADIUS_PX: f64 = super::ORIGIN_RADIUS_PX;
    pub const LABEL_FONT_SIZE: f64 = super::LABEL_FONT_SIZE;
    pub const LABEL_PADDING_PX: f64 = super::LABEL_PADDING_PX;
    pub const BASE_DEPTH: f32 = super::BASE_DEPTH;
    pub const DEPTH_STEP: f32 = super::DEPTH_STEP;
}

/// Hit testing and sub-region partitioning
pub mod picking {
    pub const TOLERANCE_PX: f64 = super::PICK_TOLERANCE_PX;
    pub const TAB_WIDTH_PX: f64 = super::TAB_WIDTH_PX;
    pub const OCTAVE_ZONE_PX: f64 = super::OCTAVE_ZONE_PX;
    pub const OCTAVE_DEAD_ZONE_PX: f64 = super::OCTAVE_DEAD_ZONE_PX;
}

/// Snapping of dragged times
pub mod snap {
    /// Grid subdivisions per beat
    pub const DIVISIONS_PER_BEAT: f64 = super::SNAP_DIVISIONS_PER_BEAT;
}

/// Drag session thresholds
pub mod interaction {
    pub const COMMIT_EPSILON: f64 = super::COMMIT_EPSILON;
    pub const CLICK_SLOP_PX: f64 = super::CLICK_SLOP_PX;
}
