// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Theme colors
//!
//! All colors use hexadecimal format: Color::from_rgb8(0xRR, 0xGG, 0xBB)

use masonry::vello::peniko::Color;

// ============================================================================
// BASE COLORS -- Generic colors for UI, a dark to light gradient by default
// ============================================================================
const BASE_A: Color = Color::from_rgb8(0x10, 0x10, 0x10);
const BASE_B: Color = Color::from_rgb8(0x20, 0x20, 0x20);
const BASE_D: Color = Color::from_rgb8(0x40, 0x40, 0x40);
const BASE_F: Color = Color::from_rgb8(0x60, 0x60, 0x60);
const BASE_I: Color = Color::from_rgb8(0x90, 0x90, 0x90);
const BASE_L: Color = Color::from_rgb8(0xc0, 0xc0, 0xc0);
const BASE_N: Color = Color::from_rgb8(0xe0, 0xe0, 0xe0);

// ============================================================================
// GLOBAL BACKGROUNDS
// ============================================================================
const APP_BACKGROUND: Color = BASE_B;

// ============================================================================
// UI TEXT AND LABELS
// ============================================================================
const PRIMARY_UI_TEXT: Color = BASE_I;

// ============================================================================
// PANELS
// ============================================================================
const PANEL_BACKGROUND: Color = BASE_A;
const PANEL_OUTLINE: Color = BASE_F;

// ============================================================================
// NOTES
// ============================================================================
// Fallback fill when the model does not provide a color
const NOTE_FILL: Color = Color::from_rgb8(0x57, 0x9a, 0xff);
const NOTE_LABEL: Color = BASE_A;
const SILENT_FILL: Color = BASE_D;
const SILENT_BORDER: Color = BASE_L;

// ============================================================================
// MEASURES AND ORIGIN
// ============================================================================
const MEASURE_TRIANGLE: Color = Color::from_rgb8(0x6a, 0xe7, 0x56);
const MEASURE_LINE: Color = BASE_F;
const ORIGIN_FILL: Color = Color::from_rgb8(0xff, 0xaa, 0x33);

// ============================================================================
// RINGS
// ============================================================================
const SELECTION_RING: Color = Color::from_rgb8(0xff, 0xee, 0x55);
const HOVER_RING: Color = BASE_N;
const DEPENDENCY_RING: Color = Color::from_rgb8(0xcc, 0x99, 0xff);
const ATTACH_RING: Color = Color::from_rgb8(0x66, 0xcc, 0xdd);

// ============================================================================
// PUBLIC API - Don't edit below this line unless you know what you're doing
// ============================================================================

/// Colors for the note canvas
pub mod canvas {
    use super::Color;
    pub const BACKGROUND: Color = super::APP_BACKGROUND;
}

/// Colors for floating panels
pub mod panel {
    use super::Color;
    pub const BACKGROUND: Color = super::PANEL_BACKGROUND;
    pub const OUTLINE: Color = super::PANEL_OUTLINE;
}

/// Colors for UI text
pub mod text {
    use super::Color;
    pub const PRIMARY: Color = super::PRIMARY_UI_TEXT;
}

/// Colors for note bodies, borders and labels
pub mod note {
    use super::Color;
    pub const FILL: Color = super::NOTE_FILL;
    pub const LABEL: Color = super::NOTE_LABEL;
    pub const SILENT_FILL: Color = super::SILENT_FILL;
    pub const SILENT_BORDER: Color = super::SILENT_BORDER;
}

/// Colors for measure markers and the origin circle
pub mod marker {
    use super::Color;
    pub const MEASURE_TRIANGLE: Color = super::MEASURE_TRIANGLE;
    pub const MEASURE_LINE: Color = super::MEASURE_LINE;
    pub const ORIGIN: Color = super::ORIGIN_FILL;
}

/// Colors for overlay rings
pub mod ring {
    use super::Color;
    pub const SELECTION: Color = super::SELECTION_RING;
    pub const HOVER: Color = super::HOVER_RING;
    pub const DEPENDENCY: Color = super::DEPENDENCY_RING;
    pub const ATTACH: Color = super::ATTACH_RING;
}
