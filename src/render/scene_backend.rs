// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Raster backend that paints into a vello [`Scene`].
//!
//! Vello has no depth buffer, so instances are painted back to front by
//! depth. Ties keep pass order, then instance order, which gives the
//! same result as a depth test against bodies that write depth.

use super::backend::{
    DrawPass, FrameUniforms, InstanceBuffer, InstanceData, RasterBackend, RasterError,
    ResourceHandle, ResourceKey,
};
use super::instances::{
    BodyInstance, BorderInstance, CircleInstance, GlyphInstance, MeasureInstance, RingInstance,
};
use super::text;
use crate::geometry::{DashPattern, RoundedRectPerimeter};
use kurbo::{Affine, BezPath, Circle, Line, Point, Rect, RoundedRect, Stroke};
use masonry::core::render_text;
use masonry::vello::Scene;
use masonry::vello::peniko::{Brush, Color, Fill};
use std::collections::HashMap;

/// Spacing of the polyline that follows a rounded outline
const OUTLINE_STEP_PX: f64 = 2.0;

fn color(rgba: [f32; 4]) -> Color {
    Color::new(rgba)
}

fn rect(r: [f32; 4]) -> Rect {
    Rect::new(r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64)
}

/// Paints uploaded batches with kurbo shapes and parley glyphs
#[derive(Default)]
pub struct SceneBackend {
    scene: Scene,
    buffers: HashMap<ResourceHandle, InstanceBuffer>,
    capacities: HashMap<ResourceHandle, usize>,
    next_handle: u32,
}

impl std::fmt::Debug for SceneBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneBackend")
            .field("resources", &self.capacities.len())
            .finish()
    }
}

impl SceneBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently drawn frame
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    fn paint(&mut self, uniforms: &FrameUniforms, passes: &[DrawPass]) {
        let scene = &mut self.scene;
        scene.reset();

        let viewport = Rect::new(
            0.0,
            0.0,
            uniforms.viewport[0] as f64,
            uniforms.viewport[1] as f64,
        );
        let background = Brush::Solid(color(uniforms.clear_color));
        scene.fill(Fill::NonZero, Affine::IDENTITY, &background, None, &viewport);

        for (pass, index) in paint_order(passes, &self.buffers) {
            let Some(buffer) = self.buffers.get(&passes[pass].handle) else {
                continue;
            };
            match buffer {
                InstanceBuffer::Bodies(d) => paint_body(scene, &d[index]),
                InstanceBuffer::Borders(d) => paint_border(scene, &d[index]),
                InstanceBuffer::Circles(d) => paint_circle(scene, &d[index]),
                InstanceBuffer::Measures(d) => paint_measure(scene, &d[index]),
                InstanceBuffer::Rings(d) => paint_ring(scene, &d[index]),
                InstanceBuffer::Glyphs(d) => paint_glyph(scene, &d[index]),
            }
        }
    }
}

/// `(pass, instance)` pairs, farthest first
fn paint_order(
    passes: &[DrawPass],
    buffers: &HashMap<ResourceHandle, InstanceBuffer>,
) -> Vec<(usize, usize)> {
    let mut items = Vec::new();
    for (p, pass) in passes.iter().enumerate() {
        let Some(buffer) = buffers.get(&pass.handle) else {
            continue;
        };
        let count = pass.instances.min(buffer.len());
        items.extend((0..count).map(|i| (buffer.depth(i), p, i)));
    }
    // Stable: equal depths keep pass then instance order
    items.sort_by(|a, b| b.0.total_cmp(&a.0));
    items.into_iter().map(|(_, p, i)| (p, i)).collect()
}

impl InstanceBuffer {
    fn depth(&self, index: usize) -> f32 {
        match self {
            InstanceBuffer::Bodies(d) => d[index].depth,
            InstanceBuffer::Borders(d) => d[index].depth,
            InstanceBuffer::Circles(d) => d[index].depth,
            InstanceBuffer::Measures(d) => d[index].depth,
            InstanceBuffer::Rings(d) => d[index].depth,
            InstanceBuffer::Glyphs(d) => d[index].depth,
        }
    }
}

fn paint_body(scene: &mut Scene, body: &BodyInstance) {
    let shape = RoundedRect::from_rect(rect(body.rect), body.radius as f64);
    let brush = Brush::Solid(color(body.color));
    scene.fill(Fill::NonZero, Affine::IDENTITY, &brush, None, &shape);
}

fn paint_border(scene: &mut Scene, border: &BorderInstance) {
    let perimeter = RoundedRectPerimeter::new(rect(border.rect), border.radius as f64);
    let pattern = DashPattern {
        period: border.period as f64,
        on: border.on as f64,
    };
    let stroke = Stroke::new(border.width as f64);
    let brush = Brush::Solid(color(border.color));
    for (start, end) in pattern.intervals(perimeter.length()) {
        let mut dash = BezPath::new();
        dash.move_to(perimeter.point_at(start));
        let steps = ((end - start) / OUTLINE_STEP_PX).ceil().max(1.0) as usize;
        for step in 1..=steps {
            let s = start + (end - start) * step as f64 / steps as f64;
            dash.line_to(perimeter.point_at(s));
        }
        scene.stroke(&stroke, Affine::IDENTITY, &brush, None, &dash);
    }
}

fn paint_circle(scene: &mut Scene, circle: &CircleInstance) {
    let shape = Circle::new(
        (circle.center[0] as f64, circle.center[1] as f64),
        circle.radius as f64,
    );
    let brush = Brush::Solid(color(circle.color));
    scene.fill(Fill::NonZero, Affine::IDENTITY, &brush, None, &shape);
}

fn paint_measure(scene: &mut Scene, measure: &MeasureInstance) {
    let t = measure.triangle;
    let mut triangle = BezPath::new();
    triangle.move_to((t[0] as f64, t[1] as f64));
    triangle.line_to((t[2] as f64, t[3] as f64));
    triangle.line_to((t[4] as f64, t[5] as f64));
    triangle.close_path();
    let brush = Brush::Solid(color(measure.triangle_color));
    scene.fill(Fill::NonZero, Affine::IDENTITY, &brush, None, &triangle);

    let x = measure.line_x as f64;
    let top = measure.line_top as f64;
    let length = (measure.line_bottom as f64 - top).max(0.0);
    let dash = measure.dash as f64;
    let period = (dash + measure.gap as f64).max(f64::EPSILON);
    let stroke = Stroke::new(measure.line_width as f64);
    let brush = Brush::Solid(color(measure.line_color));
    let mut y = 0.0;
    while y < length {
        let segment = Line::new(Point::new(x, top + y), Point::new(x, top + (y + dash).min(length)));
        scene.stroke(&stroke, Affine::IDENTITY, &brush, None, &segment);
        y += period;
    }
}

fn paint_ring(scene: &mut Scene, ring: &RingInstance) {
    let shape = RoundedRect::from_rect(rect(ring.rect), ring.radius as f64);
    let stroke = Stroke::new(ring.width as f64);
    let brush = Brush::Solid(color(ring.color));
    scene.stroke(&stroke, Affine::IDENTITY, &brush, None, &shape);
}

fn paint_glyph(scene: &mut Scene, glyph: &GlyphInstance) {
    let Some(ch) = glyph.char() else {
        return;
    };
    let mut buf = [0u8; 4];
    let brushes = vec![Brush::Solid(color(glyph.color))];
    text::with_layout(ch.encode_utf8(&mut buf), glyph.font_size, |layout| {
        // Layouts are positioned by their top; the glyph origin is on
        // the baseline
        let ascent = layout
            .lines()
            .next()
            .map(|line| line.metrics().ascent as f64)
            .unwrap_or(0.0);
        render_text(
            scene,
            Affine::translate((glyph.origin[0] as f64, glyph.origin[1] as f64 - ascent)),
            layout,
            &brushes,
            false,
        );
    });
}

impl RasterBackend for SceneBackend {
    fn allocate(&mut self, key: ResourceKey, bytes: usize) -> Result<ResourceHandle, RasterError> {
        let handle = ResourceHandle(self.next_handle);
        self.next_handle = self
            .next_handle
            .checked_add(1)
            .ok_or(RasterError::Allocation { key, bytes })?;
        self.capacities.insert(handle, bytes);
        Ok(handle)
    }

    fn release(&mut self, handle: ResourceHandle) {
        self.capacities.remove(&handle);
        self.buffers.remove(&handle);
    }

    fn upload(&mut self, handle: ResourceHandle, data: InstanceData<'_>) -> Result<(), RasterError> {
        let capacity = self
            .capacities
            .get(&handle)
            .copied()
            .ok_or(RasterError::UnknownHandle(handle))?;
        let bytes = data.as_bytes().len();
        if bytes > capacity {
            return Err(RasterError::Overflow {
                handle,
                bytes,
                capacity,
            });
        }
        self.buffers.insert(handle, data.to_buffer());
        Ok(())
    }

    fn draw(&mut self, uniforms: &FrameUniforms, passes: &[DrawPass]) -> Result<(), RasterError> {
        if let Some(pass) = passes.iter().find(|p| !self.capacities.contains_key(&p.handle)) {
            return Err(RasterError::UnknownHandle(pass.handle));
        }
        self.paint(uniforms, passes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::BatchKind;
    use bytemuck::Zeroable;

    fn body(depth: f32) -> BodyInstance {
        BodyInstance {
            depth,
            ..Zeroable::zeroed()
        }
    }

    fn ring(depth: f32) -> RingInstance {
        RingInstance {
            depth,
            ..Zeroable::zeroed()
        }
    }

    fn pass(kind: BatchKind, handle: u32, instances: usize) -> DrawPass {
        DrawPass {
            kind,
            handle: ResourceHandle(handle),
            instances,
            depth_test: true,
            depth_write: kind.writes_depth(),
        }
    }

    #[test]
    fn test_overlay_paints_between_its_note_and_the_next() {
        let mut buffers = HashMap::new();
        buffers.insert(ResourceHandle(0), InstanceBuffer::Bodies(vec![body(0.9), body(0.8)]));
        buffers.insert(ResourceHandle(1), InstanceBuffer::Rings(vec![ring(0.85)]));
        let passes = [pass(BatchKind::Bodies, 0, 2), pass(BatchKind::Rings, 1, 1)];
        let order = paint_order(&passes, &buffers);
        assert_eq!(order, vec![(0, 0), (1, 0), (0, 1)]);
    }

    #[test]
    fn test_ties_keep_pass_order() {
        let mut buffers = HashMap::new();
        buffers.insert(ResourceHandle(0), InstanceBuffer::Rings(vec![ring(0.0)]));
        buffers.insert(ResourceHandle(1), InstanceBuffer::Bodies(vec![body(0.0)]));
        let passes = [pass(BatchKind::Rings, 0, 1), pass(BatchKind::Bodies, 1, 1)];
        assert_eq!(paint_order(&passes, &buffers), vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn test_pass_count_limits_instances() {
        let mut buffers = HashMap::new();
        buffers.insert(ResourceHandle(0), InstanceBuffer::Bodies(vec![body(0.9), body(0.8)]));
        let passes = [pass(BatchKind::Bodies, 0, 1)];
        assert_eq!(paint_order(&passes, &buffers).len(), 1);
    }

    #[test]
    fn test_upload_respects_capacity() {
        let mut backend = SceneBackend::new();
        let handle = backend
            .allocate(ResourceKey::Batch(BatchKind::Bodies), BatchKind::Bodies.stride())
            .unwrap();
        let bodies = [body(0.5), body(0.4)];
        assert!(backend.upload(handle, InstanceData::Bodies(&bodies)).is_err());
        assert!(backend.upload(handle, InstanceData::Bodies(&bodies[..1])).is_ok());
        backend.release(handle);
        assert!(matches!(
            backend.draw(
                &FrameUniforms::zeroed(),
                &[pass(BatchKind::Bodies, handle.0, 1)]
            ),
            Err(RasterError::UnknownHandle(_))
        ));
    }
}
