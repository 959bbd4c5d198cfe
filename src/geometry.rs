// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Shape math shared by the raster pipeline and the picking engine.
//!
//! Both sides call into this module so that what is hit-tested is exactly
//! what is drawn: rounded-rect signed distances, the perimeter
//! parametrization used for dash phase, measure triangles, and the
//! world → screen → normalized-device mapping.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use std::f64::consts::{FRAC_PI_2, PI};

/// Camera basis plus viewport, in logical (device independent) pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// World → screen affine
    pub basis: Affine,
    /// Viewport size in the same logical units as the basis output
    pub viewport: Size,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            basis: Affine::IDENTITY,
            viewport: Size::new(1.0, 1.0),
        }
    }
}

impl ViewState {
    pub fn new(basis: Affine, viewport: Size) -> Self {
        Self { basis, viewport }
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        self.basis * world
    }

    /// Inverse mapping; identity when the basis is degenerate
    pub fn screen_to_world(&self, screen: Point) -> Point {
        if self.basis.determinant().abs() < f64::EPSILON {
            return screen;
        }
        self.basis.inverse() * screen
    }

    /// Screen pixels per world unit along each axis
    pub fn scale(&self) -> Vec2 {
        let [a, b, c, d, _, _] = self.basis.as_coeffs();
        Vec2::new(a.hypot(b), c.hypot(d))
    }

    /// Axis-aligned screen footprint of a world rectangle
    pub fn screen_rect(&self, world: Rect) -> Rect {
        let corners = [
            self.basis * Point::new(world.x0, world.y0),
            self.basis * Point::new(world.x1, world.y0),
            self.basis * Point::new(world.x0, world.y1),
            self.basis * Point::new(world.x1, world.y1),
        ];
        let mut rect = Rect::from_points(corners[0], corners[1]);
        for corner in &corners[2..] {
            rect = rect.union_pt(*corner);
        }
        rect
    }

    /// Map a screen point to normalized device coordinates (y up)
    pub fn to_ndc(&self, screen: Point) -> [f32; 2] {
        let w = self.viewport.width.max(1.0);
        let h = self.viewport.height.max(1.0);
        [
            (2.0 * screen.x / w - 1.0) as f32,
            (1.0 - 2.0 * screen.y / h) as f32,
        ]
    }
}

/// Spacing between consecutive depths for `count` instances.
///
/// `step` is used until `count` instances no longer fit between `base`
/// and zero; past that the spacing shrinks so every instance keeps a
/// distinct positive depth. f32 resolution near `base` bounds this at
/// roughly 2^23 instances.
pub fn depth_step(count: usize, base: f32, step: f32) -> f32 {
    step.min(base / (count as f32 + 1.0))
}

/// Depth of the instance at `index` out of `count` in draw order; later
/// is nearer
pub fn depth_for(index: usize, count: usize, base: f32, step: f32) -> f32 {
    base - index as f32 * depth_step(count, base, step)
}

/// Corner radius clamped to what fits in `rect`
pub fn clamped_radius(rect: Rect, radius: f64) -> f64 {
    radius.min(rect.width() * 0.5).min(rect.height() * 0.5).max(0.0)
}

/// Signed distance from `p` to a rounded rectangle (negative inside)
pub fn rounded_rect_sdf(p: Point, rect: Rect, radius: f64) -> f64 {
    let r = clamped_radius(rect, radius);
    let center = rect.center();
    let half = Vec2::new(rect.width() * 0.5, rect.height() * 0.5);
    let qx = (p.x - center.x).abs() - (half.x - r);
    let qy = (p.y - center.y).abs() - (half.y - r);
    let outside = Vec2::new(qx.max(0.0), qy.max(0.0)).hypot();
    let inside = qx.max(qy).min(0.0);
    outside + inside - r
}

/// Whether `p` lies in one of the four corner squares where the rounded
/// arc replaces the straight edges
pub fn in_corner_region(p: Point, rect: Rect, radius: f64) -> bool {
    let r = clamped_radius(rect, radius);
    if r <= 0.0 {
        return false;
    }
    let center = rect.center();
    let dx = (p.x - center.x).abs();
    let dy = (p.y - center.y).abs();
    dx > rect.width() * 0.5 - r && dy > rect.height() * 0.5 - r
}

/// Arc-length parametrization of a rounded rectangle's outline.
///
/// The seam sits at the left end of the top edge and the parameter runs
/// clockwise on screen (y down): top edge, top-right arc, right edge,
/// bottom-right arc, bottom edge, bottom-left arc, left edge, top-left arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedRectPerimeter {
    rect: Rect,
    radius: f64,
}

impl RoundedRectPerimeter {
    pub fn new(rect: Rect, radius: f64) -> Self {
        Self {
            rect,
            radius: clamped_radius(rect, radius),
        }
    }

    fn straight_x(&self) -> f64 {
        (self.rect.width() - 2.0 * self.radius).max(0.0)
    }

    fn straight_y(&self) -> f64 {
        (self.rect.height() - 2.0 * self.radius).max(0.0)
    }

    fn arc(&self) -> f64 {
        FRAC_PI_2 * self.radius
    }

    /// Total outline length
    pub fn length(&self) -> f64 {
        2.0 * self.straight_x() + 2.0 * self.straight_y() + 2.0 * PI * self.radius
    }

    /// Lengths of the eight pieces in parameter order
    fn pieces(&self) -> [f64; 8] {
        let (sx, sy, a) = (self.straight_x(), self.straight_y(), self.arc());
        [sx, a, sy, a, sx, a, sy, a]
    }

    /// Point on the outline at arc length `s` (wrapped into range)
    pub fn point_at(&self, s: f64) -> Point {
        let len = self.length();
        if len <= 0.0 {
            return self.rect.origin();
        }
        let mut s = s.rem_euclid(len);
        let r = self.radius;
        let Rect { x0, y0, x1, y1 } = self.rect;
        let pieces = self.pieces();
        for (i, piece) in pieces.iter().enumerate() {
            if s <= *piece || i == pieces.len() - 1 {
                let t = if *piece > 0.0 { (s / piece).min(1.0) } else { 0.0 };
                return match i {
                    0 => Point::new(x0 + r + t * piece, y0),
                    1 => arc_point(Point::new(x1 - r, y0 + r), r, -FRAC_PI_2 + t * FRAC_PI_2),
                    2 => Point::new(x1, y0 + r + t * piece),
                    3 => arc_point(Point::new(x1 - r, y1 - r), r, t * FRAC_PI_2),
                    4 => Point::new(x1 - r - t * piece, y1),
                    5 => arc_point(Point::new(x0 + r, y1 - r), r, FRAC_PI_2 + t * FRAC_PI_2),
                    6 => Point::new(x0, y1 - r - t * piece),
                    _ => arc_point(Point::new(x0 + r, y0 + r), r, PI + t * FRAC_PI_2),
                };
            }
            s -= piece;
        }
        self.rect.origin()
    }

    /// Arc length of the outline point nearest to `p`
    pub fn arc_length_of(&self, p: Point) -> f64 {
        let r = self.radius;
        let Rect { x0, y0, x1, y1 } = self.rect;
        let (sx, sy, a) = (self.straight_x(), self.straight_y(), self.arc());
        let center = self.rect.center();
        let half_x = self.rect.width() * 0.5;
        let half_y = self.rect.height() * 0.5;
        let dx = p.x - center.x;
        let dy = p.y - center.y;

        if in_corner_region(p, self.rect, r) {
            let (corner, start, base) = match (dx >= 0.0, dy >= 0.0) {
                (true, false) => (Point::new(x1 - r, y0 + r), -FRAC_PI_2, sx),
                (true, true) => (Point::new(x1 - r, y1 - r), 0.0, sx + a + sy),
                (false, true) => (Point::new(x0 + r, y1 - r), FRAC_PI_2, 2.0 * sx + 2.0 * a + sy),
                (false, false) => (Point::new(x0 + r, y0 + r), PI, 2.0 * sx + 3.0 * a + 2.0 * sy),
            };
            let angle = (p.y - corner.y).atan2(p.x - corner.x);
            let sweep = (angle - start).rem_euclid(2.0 * PI).min(FRAC_PI_2);
            return base + sweep * r;
        }

        // Nearest straight edge
        let to_horizontal = half_y - dy.abs();
        let to_vertical = half_x - dx.abs();
        if to_horizontal <= to_vertical {
            if dy < 0.0 {
                (p.x - (x0 + r)).clamp(0.0, sx)
            } else {
                sx + 2.0 * a + sy + ((x1 - r) - p.x).clamp(0.0, sx)
            }
        } else if dx >= 0.0 {
            sx + a + (p.y - (y0 + r)).clamp(0.0, sy)
        } else {
            2.0 * sx + 3.0 * a + sy + ((y1 - r) - p.y).clamp(0.0, sy)
        }
    }
}

fn arc_point(center: Point, radius: f64, angle: f64) -> Point {
    Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
}

/// Dash pattern fitted to a closed outline so that a whole number of
/// periods covers it and the seam is invisible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashPattern {
    pub period: f64,
    pub on: f64,
}

impl DashPattern {
    pub fn fit(length: f64, dash: f64, gap: f64) -> Self {
        let nominal = (dash + gap).max(f64::EPSILON);
        if length <= 0.0 {
            return Self {
                period: nominal,
                on: dash,
            };
        }
        let count = (length / nominal).round().max(1.0);
        let period = length / count;
        Self {
            period,
            on: period * dash / nominal,
        }
    }

    /// Whether arc length `s` falls inside a dash
    pub fn is_on(&self, s: f64) -> bool {
        s.rem_euclid(self.period) < self.on
    }

    /// Dash intervals `[start, end)` covering `0..length`
    pub fn intervals(&self, length: f64) -> Vec<(f64, f64)> {
        if length <= 0.0 {
            return Vec::new();
        }
        let count = (length / self.period).round().max(1.0) as usize;
        (0..count)
            .map(|i| {
                let s = i as f64 * self.period;
                (s, (s + self.on).min(length))
            })
            .collect()
    }
}

/// Vertices of a measure marker: pinned to the top of the viewport at
/// screen x, pointing down
pub fn measure_triangle(screen_x: f64, size: f64) -> [Point; 3] {
    let height = size * 3f64.sqrt() * 0.5;
    [
        Point::new(screen_x - size * 0.5, 0.0),
        Point::new(screen_x + size * 0.5, 0.0),
        Point::new(screen_x, height),
    ]
}

/// Barycentric point-in-triangle test (boundary inclusive)
pub fn point_in_triangle(p: Point, tri: &[Point; 3]) -> bool {
    let [a, b, c] = *tri;
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;
    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);
    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < f64::EPSILON {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;
    u >= 0.0 && v >= 0.0 && u + v <= 1.0
}
