// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Camera: the world → screen affine basis.

use crate::settings;
use kurbo::{Affine, Point, Size, Vec2};

/// Source of the world → screen basis
pub trait Camera {
    /// World → screen affine
    fn basis(&self) -> Affine;

    /// Inverse mapping; identity for a degenerate basis
    fn screen_to_world(&self, screen: Point) -> Point {
        let basis = self.basis();
        if basis.determinant().abs() < f64::EPSILON {
            return screen;
        }
        basis.inverse() * screen
    }
}

/// Pan and independent x/y zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanZoomCamera {
    /// Screen position of the world origin
    pub offset: Vec2,
    /// Screen pixels per world unit on each axis
    pub zoom: Vec2,
}

impl Default for PanZoomCamera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: Vec2::new(1.0, 1.0),
        }
    }
}

impl PanZoomCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place the world origin a little in from the left edge, vertically
    /// centered
    pub fn center_origin(&mut self, viewport: Size) {
        self.offset = Vec2::new(viewport.width * 0.1, viewport.height * 0.5);
    }

    /// Move the view by a screen-space delta
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Scale both axes by `factor`, keeping the world point under
    /// `anchor` fixed. Returns false when the zoom was already clamped.
    pub fn zoom_about(&mut self, anchor: Point, factor: f64) -> bool {
        self.zoom_axes_about(anchor, Vec2::new(factor, factor))
    }

    /// Scale each axis independently about a screen point
    pub fn zoom_axes_about(&mut self, anchor: Point, factor: Vec2) -> bool {
        let world = self.screen_to_world(anchor);
        let clamp = |z: f64| z.clamp(settings::editor::MIN_ZOOM, settings::editor::MAX_ZOOM);
        let zoom = Vec2::new(clamp(self.zoom.x * factor.x), clamp(self.zoom.y * factor.y));
        if zoom == self.zoom {
            return false;
        }
        self.zoom = zoom;
        // Solve offset so that basis * world == anchor
        self.offset = Vec2::new(anchor.x - world.x * zoom.x, anchor.y - world.y * zoom.y);
        true
    }
}

impl Camera for PanZoomCamera {
    fn basis(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale_non_uniform(self.zoom.x, self.zoom.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        let camera = PanZoomCamera::new();
        assert_eq!(camera.basis(), Affine::IDENTITY);
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let mut camera = PanZoomCamera::new();
        camera.pan(Vec2::new(30.0, 40.0));
        let anchor = Point::new(200.0, 100.0);
        let world = camera.screen_to_world(anchor);
        assert!(camera.zoom_about(anchor, 2.0));
        let back = camera.basis() * world;
        assert!((back - anchor).hypot() < 1e-9);
        assert_eq!(camera.zoom, Vec2::new(2.0, 2.0));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = PanZoomCamera::new();
        camera.zoom = Vec2::new(settings::editor::MAX_ZOOM, settings::editor::MAX_ZOOM);
        assert!(!camera.zoom_about(Point::ZERO, 2.0));
    }

    #[test]
    fn test_independent_axes() {
        let mut camera = PanZoomCamera::new();
        camera.zoom_axes_about(Point::ZERO, Vec2::new(2.0, 1.0));
        assert_eq!(camera.basis() * Point::new(1.0, 1.0), Point::new(2.0, 1.0));
    }
}
