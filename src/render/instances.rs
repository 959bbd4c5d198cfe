// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-instance records uploaded to the raster backend.
//!
//! All records are `#[repr(C)]` plain data of 4-byte fields so they can
//! be viewed as bytes with `bytemuck`. Geometry is in logical screen
//! pixels; the backend maps it to device coordinates with
//! [`FrameUniforms`](super::backend::FrameUniforms).

use bytemuck::{Pod, Zeroable};

/// Filled rounded rectangle: a note body
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BodyInstance {
    /// `x0, y0, x1, y1`
    pub rect: [f32; 4],
    pub color: [f32; 4],
    /// Corner radius, clamped to the rect
    pub radius: f32,
    pub depth: f32,
    pub flags: u32,
    pub _pad: u32,
}

/// Dashed rounded outline: the border of a rest
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BorderInstance {
    pub rect: [f32; 4],
    pub color: [f32; 4],
    pub radius: f32,
    pub width: f32,
    /// Dash period along the perimeter, fitted to a whole count
    pub period: f32,
    /// Dash length within one period
    pub on: f32,
    pub depth: f32,
    pub _pad: [f32; 3],
}

/// Solid rounded outline: selection, hover, dependency and attach rings
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RingInstance {
    pub rect: [f32; 4],
    pub color: [f32; 4],
    pub radius: f32,
    pub width: f32,
    pub depth: f32,
    pub _pad: f32,
}

/// Measure marker: a triangle pinned to the top of the viewport and a
/// dashed vertical bar below it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeasureInstance {
    /// Three vertices, `x, y` each
    pub triangle: [f32; 6],
    pub line_x: f32,
    pub line_top: f32,
    pub line_bottom: f32,
    pub line_width: f32,
    pub dash: f32,
    pub gap: f32,
    pub triangle_color: [f32; 4],
    pub line_color: [f32; 4],
    pub depth: f32,
    pub _pad: [f32; 3],
}

/// Filled circle: the origin
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CircleInstance {
    pub center: [f32; 2],
    pub radius: f32,
    pub depth: f32,
    pub color: [f32; 4],
}

/// One positioned glyph of a label run
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlyphInstance {
    /// Pen position on the run baseline
    pub origin: [f32; 2],
    /// Ink box, relative to the pen position
    pub ink: [f32; 4],
    pub color: [f32; 4],
    /// Unicode scalar value
    pub ch: u32,
    pub font_size: f32,
    pub depth: f32,
    pub _pad: u32,
}

impl GlyphInstance {
    pub fn char(&self) -> Option<char> {
        char::from_u32(self.ch)
    }
}
