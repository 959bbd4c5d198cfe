// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Label text: glyph metrics and run layout.
//!
//! Metrics are measured once per (character, size) and cached. A run is
//! laid out left to right on a single baseline; each glyph keeps its own
//! ink box so that centering a run uses what is actually drawn.

use kurbo::{Point, Rect};
use masonry::core::{BrushIndex, StyleProperty};
use parley::{FontContext, FontFamily, FontStack, GenericFamily, Layout, LayoutContext};
use std::collections::HashMap;

thread_local! {
    static FONT_CX: std::cell::RefCell<FontContext> =
        std::cell::RefCell::new(FontContext::default());
    static LAYOUT_CX: std::cell::RefCell<
        LayoutContext<BrushIndex>,
    > = std::cell::RefCell::new(LayoutContext::new());
}

/// Metrics of one glyph, relative to its pen position on the baseline.
/// Negative y is above the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphMetrics {
    pub advance: f64,
    pub ink: Rect,
}

/// Source of glyph metrics
pub trait GlyphMeasurer {
    fn measure(&mut self, ch: char, size: f32) -> GlyphMetrics;
}

/// Build a single-line layout for `text` and hand it to `f`
pub fn with_layout<R>(text: &str, size: f32, f: impl FnOnce(&Layout<BrushIndex>) -> R) -> R {
    FONT_CX.with(|font_cell| {
        LAYOUT_CX.with(|layout_cell| {
            let mut font_cx = font_cell.borrow_mut();
            let mut layout_cx = layout_cell.borrow_mut();

            let mut builder = layout_cx.ranged_builder(&mut font_cx, text, 1.0, false);
            builder.push_default(StyleProperty::FontSize(size));
            builder.push_default(StyleProperty::FontStack(FontStack::Single(
                FontFamily::Generic(GenericFamily::SansSerif),
            )));
            builder.push_default(StyleProperty::Brush(BrushIndex(0)));
            let mut layout = builder.build(text);
            layout.break_all_lines(None);
            f(&layout)
        })
    })
}

/// Measures glyphs with the system sans-serif font through parley.
///
/// The ink box is the line box: full advance wide, ascent above and
/// descent below the baseline.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParleyMeasurer;

impl GlyphMeasurer for ParleyMeasurer {
    fn measure(&mut self, ch: char, size: f32) -> GlyphMetrics {
        let mut buf = [0u8; 4];
        let text = ch.encode_utf8(&mut buf);
        with_layout(text, size, |layout| {
            let advance = layout.width() as f64;
            let (ascent, descent) = layout
                .lines()
                .next()
                .map(|line| {
                    let metrics = line.metrics();
                    (metrics.ascent as f64, metrics.descent as f64)
                })
                .unwrap_or((size as f64 * 0.8, size as f64 * 0.2));
            GlyphMetrics {
                advance,
                ink: Rect::new(0.0, -ascent, advance, descent),
            }
        })
    }
}

/// Fixed-advance measurer with per-class ink boxes, for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct MonospaceMeasurer;

impl GlyphMeasurer for MonospaceMeasurer {
    fn measure(&mut self, ch: char, size: f32) -> GlyphMetrics {
        let size = size as f64;
        let advance = size * 0.6;
        let ink = match ch {
            '0'..='9' => Rect::new(0.05 * size, -0.72 * size, 0.55 * size, 0.0),
            '/' => Rect::new(0.0, -0.8 * size, 0.5 * size, 0.12 * size),
            '?' => Rect::new(0.08 * size, -0.74 * size, 0.5 * size, 0.0),
            _ => Rect::new(0.0, -0.5 * size, advance, 0.0),
        };
        GlyphMetrics { advance, ink }
    }
}

/// One glyph of a laid-out run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    /// Pen offset from the run origin along the baseline
    pub pen_x: f64,
    /// Ink box relative to this glyph's pen position
    pub ink: Rect,
}

/// A run laid out on a common baseline at y = 0
#[derive(Debug, Clone, PartialEq)]
pub struct RunLayout {
    pub glyphs: Vec<PlacedGlyph>,
    /// Total advance
    pub width: f64,
    /// Union of glyph ink boxes, relative to the run origin
    pub ink: Rect,
}

impl RunLayout {
    /// Run origin that puts the ink box's left edge at `left` and its
    /// vertical center on `center_y`
    pub fn origin_left_at(&self, left: f64, center_y: f64) -> Point {
        Point::new(left - self.ink.x0, center_y - self.ink.center().y)
    }
}

/// Cache of glyph metrics keyed by character and size
pub struct GlyphCache {
    measurer: Box<dyn GlyphMeasurer>,
    entries: HashMap<(char, u32), GlyphMetrics>,
    misses: usize,
}

impl std::fmt::Debug for GlyphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphCache")
            .field("entries", &self.entries.len())
            .field("misses", &self.misses)
            .finish()
    }
}

impl GlyphCache {
    pub fn new(measurer: impl GlyphMeasurer + 'static) -> Self {
        Self {
            measurer: Box::new(measurer),
            entries: HashMap::new(),
            misses: 0,
        }
    }

    pub fn metrics(&mut self, ch: char, size: f32) -> GlyphMetrics {
        let key = (ch, size.to_bits());
        if let Some(metrics) = self.entries.get(&key) {
            return *metrics;
        }
        self.misses += 1;
        let metrics = self.measurer.measure(ch, size);
        self.entries.insert(key, metrics);
        metrics
    }

    /// Lay out `text` left to right on one baseline
    pub fn layout_run(&mut self, text: &str, size: f32) -> RunLayout {
        let mut glyphs = Vec::with_capacity(text.len());
        let mut pen_x = 0.0;
        let mut ink: Option<Rect> = None;
        for ch in text.chars() {
            let metrics = self.metrics(ch, size);
            let placed = metrics.ink + kurbo::Vec2::new(pen_x, 0.0);
            ink = Some(match ink {
                Some(ink) => ink.union(placed),
                None => placed,
            });
            glyphs.push(PlacedGlyph {
                ch,
                pen_x,
                ink: metrics.ink,
            });
            pen_x += metrics.advance;
        }
        RunLayout {
            glyphs,
            width: pen_x,
            ink: ink.unwrap_or(Rect::ZERO),
        }
    }

    /// Number of measurements taken so far
    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measures_each_glyph_once() {
        let mut cache = GlyphCache::new(MonospaceMeasurer);
        cache.layout_run("3/4", 11.0);
        cache.layout_run("3/4", 11.0);
        cache.layout_run("4", 11.0);
        assert_eq!(cache.misses(), 3);
        // A new size is a new entry
        cache.layout_run("4", 12.0);
        assert_eq!(cache.misses(), 4);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_run_advances_left_to_right() {
        let mut cache = GlyphCache::new(MonospaceMeasurer);
        let run = cache.layout_run("5/2", 10.0);
        let pens: Vec<f64> = run.glyphs.iter().map(|g| g.pen_x).collect();
        assert_eq!(pens.len(), 3);
        assert!(pens.windows(2).all(|w| w[1] > w[0]));
        assert!((run.width - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_ink_union_spans_mixed_glyphs() {
        let mut cache = GlyphCache::new(MonospaceMeasurer);
        let run = cache.layout_run("3/4", 10.0);
        // The slash reaches highest and lowest
        assert!((run.ink.y0 + 8.0).abs() < 1e-9);
        assert!((run.ink.y1 - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_left_alignment_keeps_a_single_baseline() {
        let mut cache = GlyphCache::new(MonospaceMeasurer);
        let run = cache.layout_run("3/4", 10.0);
        let origin = run.origin_left_at(100.0, 50.0);
        let placed = run.ink + origin.to_vec2();
        assert!((placed.x0 - 100.0).abs() < 1e-9);
        assert!((placed.center().y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_run() {
        let mut cache = GlyphCache::new(MonospaceMeasurer);
        let run = cache.layout_run("", 10.0);
        assert!(run.glyphs.is_empty());
        assert_eq!(run.ink, Rect::ZERO);
        assert!(cache.is_empty());
    }
}
