// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Raster pipeline: one instanced batch per primitive family.
//!
//! Each batch is rebuilt from the scene cache only when an epoch it
//! depends on moved (rings also follow the overlay revision), uploaded
//! into a resource owned by the [`ResourceArena`], and drawn in
//! [`BatchKind::ALL`] order. Bodies write depth; every overlay tests
//! against it without writing. Instance depth decreases with draw index
//! so the selection, drawn last, is nearest.
//!
//! All sizes that should look the same at every zoom (corner radius,
//! ring and border widths, dash lengths, label size) are in screen
//! pixels. Geometry comes from [`crate::geometry`], which the picker
//! uses as well.

pub mod arena;
pub mod backend;
pub mod batch;
pub mod instances;
pub mod scene_backend;
pub mod text;

pub use arena::ResourceArena;
pub use backend::{
    BatchKind, DrawPass, FrameUniforms, InstanceData, RasterBackend, RasterError, RecordingBackend,
    ResourceHandle, ResourceKey,
};
pub use scene_backend::SceneBackend;

use crate::config::EngineConfig;
use crate::geometry::{
    DashPattern, RoundedRectPerimeter, ViewState, clamped_radius, depth_for, depth_step,
    measure_triangle,
};
use crate::model::NoteId;
use crate::scene::{EpochKind, SceneCache};
use crate::settings;
use crate::theme;
use batch::BatchSlot;
use instances::{
    BodyInstance, BorderInstance, CircleInstance, GlyphInstance, MeasureInstance, RingInstance,
};
use kurbo::{Point, Rect};
use masonry::vello::peniko::Color;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use text::{GlyphCache, GlyphMeasurer};

const GEOMETRY_DEPS: [EpochKind; 3] = [EpochKind::View, EpochKind::Position, EpochKind::Topology];
const TEXT_DEPS: [EpochKind; 4] = [
    EpochKind::View,
    EpochKind::Position,
    EpochKind::Topology,
    EpochKind::Text,
];

/// Bytes reserved in the glyph atlas per cached glyph
const ATLAS_BYTES_PER_GLYPH: usize = 32 * 32 * 4;

/// Depth of markers that sit above every note
const MARKER_DEPTH: f32 = 0.0;

pub(crate) fn rgba(color: Color) -> [f32; 4] {
    color.components
}

fn rect_array(rect: Rect) -> [f32; 4] {
    [rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32]
}

/// Hover and highlight state drawn as rings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayState {
    hover: Option<NoteId>,
    dependents: BTreeSet<NoteId>,
    attach: Option<NoteId>,
    revision: u64,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hover(&self) -> Option<NoteId> {
        self.hover
    }

    pub fn dependents(&self) -> &BTreeSet<NoteId> {
        &self.dependents
    }

    pub fn attach(&self) -> Option<NoteId> {
        self.attach
    }

    /// Bumped whenever anything drawn changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true if the hovered note changed
    pub fn set_hover(&mut self, hover: Option<NoteId>) -> bool {
        if self.hover == hover {
            return false;
        }
        self.hover = hover;
        self.revision += 1;
        true
    }

    /// Returns true if the highlight changed
    pub fn set_highlight(&mut self, dependents: BTreeSet<NoteId>, attach: Option<NoteId>) -> bool {
        if self.dependents == dependents && self.attach == attach {
            return false;
        }
        self.dependents = dependents;
        self.attach = attach;
        self.revision += 1;
        true
    }
}

/// Everything a frame is built from
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub scene: &'a SceneCache,
    pub view: &'a ViewState,
    pub overlay: &'a OverlayState,
    pub config: &'a EngineConfig,
}

/// What one call to [`RasterPipeline::frame`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Batches whose instance data was rebuilt
    pub rebuilt: Vec<BatchKind>,
    pub uploads: usize,
    pub passes: usize,
    /// False when the backend rejected the draw
    pub drawn: bool,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rebuilt {:?}, {} uploads, {} passes, {}",
            self.rebuilt,
            self.uploads,
            self.passes,
            if self.drawn { "drawn" } else { "draw rejected" }
        )
    }
}

/// The six cached batches
#[derive(Debug, Default)]
struct Batches {
    bodies: BatchSlot<BodyInstance>,
    borders: BatchSlot<BorderInstance>,
    origin: BatchSlot<CircleInstance>,
    measures: BatchSlot<MeasureInstance>,
    rings: BatchSlot<RingInstance>,
    glyphs: BatchSlot<GlyphInstance>,
}

impl Batches {
    fn data(&self, kind: BatchKind) -> InstanceData<'_> {
        match kind {
            BatchKind::Bodies => InstanceData::Bodies(self.bodies.data()),
            BatchKind::SilentBorders => InstanceData::Borders(self.borders.data()),
            BatchKind::Origin => InstanceData::Circles(self.origin.data()),
            BatchKind::Measures => InstanceData::Measures(self.measures.data()),
            BatchKind::Rings => InstanceData::Rings(self.rings.data()),
            BatchKind::Glyphs => InstanceData::Glyphs(self.glyphs.data()),
        }
    }

    fn needs_upload(&self, kind: BatchKind) -> bool {
        match kind {
            BatchKind::Bodies => self.bodies.needs_upload(),
            BatchKind::SilentBorders => self.borders.needs_upload(),
            BatchKind::Origin => self.origin.needs_upload(),
            BatchKind::Measures => self.measures.needs_upload(),
            BatchKind::Rings => self.rings.needs_upload(),
            BatchKind::Glyphs => self.glyphs.needs_upload(),
        }
    }

    fn mark_uploaded(&mut self, kind: BatchKind) {
        match kind {
            BatchKind::Bodies => self.bodies.mark_uploaded(),
            BatchKind::SilentBorders => self.borders.mark_uploaded(),
            BatchKind::Origin => self.origin.mark_uploaded(),
            BatchKind::Measures => self.measures.mark_uploaded(),
            BatchKind::Rings => self.rings.mark_uploaded(),
            BatchKind::Glyphs => self.glyphs.mark_uploaded(),
        }
    }

    fn rebuilds(&self, kind: BatchKind) -> usize {
        match kind {
            BatchKind::Bodies => self.bodies.rebuilds(),
            BatchKind::SilentBorders => self.borders.rebuilds(),
            BatchKind::Origin => self.origin.rebuilds(),
            BatchKind::Measures => self.measures.rebuilds(),
            BatchKind::Rings => self.rings.rebuilds(),
            BatchKind::Glyphs => self.glyphs.rebuilds(),
        }
    }

    fn invalidate(&mut self) {
        self.bodies.invalidate();
        self.borders.invalidate();
        self.origin.invalidate();
        self.measures.invalidate();
        self.rings.invalidate();
        self.glyphs.invalidate();
    }
}

/// Builds, uploads and draws the instanced batches
pub struct RasterPipeline {
    batches: Batches,
    glyph_cache: GlyphCache,
    arena: ResourceArena,
    /// Handle and instance count last uploaded per batch
    resident: HashMap<BatchKind, (ResourceHandle, usize)>,
    retry_pending: bool,
    scale_factor: f64,
}

impl std::fmt::Debug for RasterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterPipeline")
            .field("batches", &self.batches)
            .field("glyph_cache", &self.glyph_cache)
            .field("arena", &self.arena)
            .finish()
    }
}

impl RasterPipeline {
    pub fn new(measurer: impl GlyphMeasurer + 'static) -> Self {
        Self {
            batches: Batches::default(),
            glyph_cache: GlyphCache::new(measurer),
            arena: ResourceArena::new(),
            resident: HashMap::new(),
            retry_pending: false,
            scale_factor: 1.0,
        }
    }

    /// Note a viewport change: degraded resources are retried next frame
    pub fn viewport_changed(&mut self) {
        if self.arena.any_degraded() {
            self.retry_pending = true;
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    pub fn arena(&self) -> &ResourceArena {
        &self.arena
    }

    pub fn glyph_cache(&self) -> &GlyphCache {
        &self.glyph_cache
    }

    /// Instances currently cached for a batch
    pub fn batch_len(&self, kind: BatchKind) -> usize {
        self.batches.data(kind).len()
    }

    /// Number of rebuilds a batch has gone through
    pub fn rebuilds(&self, kind: BatchKind) -> usize {
        self.batches.rebuilds(kind)
    }

    /// Force every batch to rebuild on the next frame
    pub fn invalidate(&mut self) {
        self.batches.invalidate();
    }

    /// Free every backend resource
    pub fn release(&mut self, backend: &mut dyn RasterBackend) {
        self.arena.release_all(backend);
        self.resident.clear();
    }

    /// Rebuild stale batches, upload what changed and draw
    pub fn frame(&mut self, backend: &mut dyn RasterBackend, input: &FrameInput<'_>) -> FrameStats {
        if self.retry_pending {
            self.arena.retry_degraded(backend);
            self.resident.clear();
            self.retry_pending = false;
        }

        let mut stats = FrameStats {
            rebuilt: self.rebuild(input),
            ..FrameStats::default()
        };

        let mut passes = Vec::with_capacity(BatchKind::ALL.len());
        for kind in BatchKind::ALL {
            if kind == BatchKind::Glyphs && !self.ensure_atlas(backend) {
                continue;
            }
            let submitted = submit(
                backend,
                &mut self.arena,
                &mut self.resident,
                kind,
                self.batches.data(kind),
                self.batches.needs_upload(kind),
            );
            if let Some((pass, uploaded)) = submitted {
                if uploaded {
                    self.batches.mark_uploaded(kind);
                    stats.uploads += 1;
                }
                passes.push(pass);
            }
        }
        stats.passes = passes.len();

        let uniforms = FrameUniforms {
            viewport: [
                input.view.viewport.width as f32,
                input.view.viewport.height as f32,
            ],
            scale_factor: self.scale_factor as f32,
            _pad: 0.0,
            clear_color: rgba(theme::canvas::BACKGROUND),
        };
        match backend.draw(&uniforms, &passes) {
            Ok(()) => stats.drawn = true,
            Err(err) => tracing::warn!("Frame dropped: {err}"),
        }
        stats
    }

    /// Glyphs are drawn only with a real atlas; a placeholder atlas
    /// means labels are missing this frame
    fn ensure_atlas(&mut self, backend: &mut dyn RasterBackend) -> bool {
        if self.batches.glyphs.data().is_empty() {
            return false;
        }
        let bytes = self.glyph_cache.len().max(1) * ATLAS_BYTES_PER_GLYPH;
        match self
            .arena
            .ensure(backend, ResourceKey::GlyphAtlas, bytes, ATLAS_BYTES_PER_GLYPH)
        {
            Some(_) => !self.arena.is_degraded(ResourceKey::GlyphAtlas),
            None => false,
        }
    }

    /// Rebuild every stale batch and report which ones changed
    fn rebuild(&mut self, input: &FrameInput<'_>) -> Vec<BatchKind> {
        let epochs = &input.scene.epochs;
        let mut rebuilt = Vec::new();

        if self.batches.bodies.needs_rebuild(epochs, &GEOMETRY_DEPS, None) {
            self.batches.bodies.store(build_bodies(input), epochs, None);
            rebuilt.push(BatchKind::Bodies);
        }
        if self.batches.borders.needs_rebuild(epochs, &GEOMETRY_DEPS, None) {
            self.batches.borders.store(build_borders(input), epochs, None);
            rebuilt.push(BatchKind::SilentBorders);
        }
        if self.batches.origin.needs_rebuild(epochs, &GEOMETRY_DEPS, None) {
            self.batches.origin.store(build_origin(input), epochs, None);
            rebuilt.push(BatchKind::Origin);
        }
        if self.batches.measures.needs_rebuild(epochs, &GEOMETRY_DEPS, None) {
            self.batches.measures.store(build_measures(input), epochs, None);
            rebuilt.push(BatchKind::Measures);
        }
        let overlay = Some(input.overlay.revision());
        if self.batches.rings.needs_rebuild(epochs, &GEOMETRY_DEPS, overlay) {
            self.batches.rings.store(build_rings(input), epochs, overlay);
            rebuilt.push(BatchKind::Rings);
        }
        if self.batches.glyphs.needs_rebuild(epochs, &TEXT_DEPS, None) {
            let glyphs = build_glyphs(input, &mut self.glyph_cache);
            self.batches.glyphs.store(glyphs, epochs, None);
            rebuilt.push(BatchKind::Glyphs);
        }

        if !rebuilt.is_empty() {
            tracing::debug!("Rebuilt batches: {:?}", rebuilt);
        }
        rebuilt
    }
}

/// Make sure a batch is resident and return its pass, plus whether an
/// upload happened. Uploads are clipped to the resource capacity.
fn submit(
    backend: &mut dyn RasterBackend,
    arena: &mut ResourceArena,
    resident: &mut HashMap<BatchKind, (ResourceHandle, usize)>,
    kind: BatchKind,
    data: InstanceData<'_>,
    dirty: bool,
) -> Option<(DrawPass, bool)> {
    if data.is_empty() {
        return None;
    }
    let stride = kind.stride();
    let (handle, capacity) =
        arena.ensure(backend, ResourceKey::Batch(kind), data.len() * stride, stride)?;

    let previous = resident.get(&kind).copied();
    let stale = dirty || previous.map(|(h, _)| h) != Some(handle);
    let (count, uploaded) = match previous {
        Some((_, count)) if !stale => (count, false),
        _ => {
            let count = data.len().min(capacity / stride);
            if count < data.len() {
                tracing::debug!("{:?} clipped to {} of {} instances", kind, count, data.len());
            }
            if let Err(err) = backend.upload(handle, data.prefix(count)) {
                tracing::warn!("Upload of {:?} failed: {err}", kind);
                resident.remove(&kind);
                return None;
            }
            resident.insert(kind, (handle, count));
            (count, true)
        }
    };

    Some((
        DrawPass {
            kind,
            handle,
            instances: count,
            depth_test: true,
            depth_write: kind.writes_depth(),
        },
        uploaded,
    ))
}

/// Depth of the note drawn at `index` out of `count`
fn note_depth(index: usize, count: usize) -> f32 {
    depth_for(
        index,
        count,
        settings::render::BASE_DEPTH,
        settings::render::DEPTH_STEP,
    )
}

/// Depth for overlays of the note at `index`: in front of that note,
/// behind every note drawn after it
fn overlay_depth(index: usize, count: usize) -> f32 {
    let step = depth_step(count, settings::render::BASE_DEPTH, settings::render::DEPTH_STEP);
    note_depth(index, count) - step * 0.5
}

fn build_bodies(input: &FrameInput<'_>) -> Vec<BodyInstance> {
    input
        .scene
        .instances()
        .iter()
        .enumerate()
        .map(|(i, inst)| {
            let rect = input.view.screen_rect(inst.world_rect());
            BodyInstance {
                rect: rect_array(rect),
                color: rgba(inst.color),
                radius: clamped_radius(rect, input.config.corner_radius_px) as f32,
                depth: note_depth(i, input.scene.instances().len()),
                flags: inst.flags.bits(),
                _pad: 0,
            }
        })
        .collect()
}

fn build_borders(input: &FrameInput<'_>) -> Vec<BorderInstance> {
    let config = input.config;
    input
        .scene
        .instances()
        .iter()
        .enumerate()
        .filter(|(_, inst)| inst.is_silent())
        .map(|(i, inst)| {
            let rect = input.view.screen_rect(inst.world_rect());
            let radius = clamped_radius(rect, config.corner_radius_px);
            let perimeter = RoundedRectPerimeter::new(rect, radius);
            let dash = DashPattern::fit(perimeter.length(), config.dash_px, config.gap_px);
            BorderInstance {
                rect: rect_array(rect),
                color: rgba(theme::note::SILENT_BORDER),
                radius: radius as f32,
                width: config.border_width_px as f32,
                period: dash.period as f32,
                on: dash.on as f32,
                depth: overlay_depth(i, input.scene.instances().len()),
                _pad: [0.0; 3],
            }
        })
        .collect()
}

fn build_origin(input: &FrameInput<'_>) -> Vec<CircleInstance> {
    input
        .scene
        .origin()
        .map(|origin| {
            let center = input.view.world_to_screen(origin.center);
            CircleInstance {
                center: [center.x as f32, center.y as f32],
                radius: input.config.origin_radius_px as f32,
                depth: MARKER_DEPTH,
                color: rgba(theme::marker::ORIGIN),
            }
        })
        .into_iter()
        .collect()
}

fn build_measures(input: &FrameInput<'_>) -> Vec<MeasureInstance> {
    let config = input.config;
    let bottom = input.view.viewport.height as f32;
    input
        .scene
        .measures()
        .iter()
        .map(|marker| {
            let x = input.view.world_to_screen(Point::new(marker.world_x, 0.0)).x;
            let tri = measure_triangle(x, config.triangle_size_px);
            MeasureInstance {
                triangle: [
                    tri[0].x as f32,
                    tri[0].y as f32,
                    tri[1].x as f32,
                    tri[1].y as f32,
                    tri[2].x as f32,
                    tri[2].y as f32,
                ],
                line_x: x as f32,
                line_top: tri[2].y as f32,
                line_bottom: bottom,
                line_width: config.border_width_px as f32,
                dash: config.dash_px as f32,
                gap: config.gap_px as f32,
                triangle_color: rgba(theme::marker::MEASURE_TRIANGLE),
                line_color: rgba(theme::marker::MEASURE_LINE),
                depth: MARKER_DEPTH,
                _pad: [0.0; 3],
            }
        })
        .collect()
}

fn ring(rect: Rect, radius: f64, color: Color, width: f64, depth: f32) -> RingInstance {
    let grow = width * 0.5;
    let rect = rect.inflate(grow, grow);
    RingInstance {
        rect: rect_array(rect),
        color: rgba(color),
        radius: (radius + grow) as f32,
        width: width as f32,
        depth,
        _pad: 0.0,
    }
}

fn build_rings(input: &FrameInput<'_>) -> Vec<RingInstance> {
    let config = input.config;
    let overlay = input.overlay;
    let width = config.ring_width_px;
    let mut rings = Vec::new();
    let count = input.scene.instances().len();

    for (i, inst) in input.scene.instances().iter().enumerate() {
        let rect = input.view.screen_rect(inst.world_rect());
        let radius = clamped_radius(rect, config.corner_radius_px);
        let depth = overlay_depth(i, count);
        if overlay.dependents.contains(&inst.id) {
            rings.push(ring(rect, radius, theme::ring::DEPENDENCY, width, depth));
        }
        if overlay.attach == Some(inst.id) {
            rings.push(ring(rect, radius, theme::ring::ATTACH, width, depth));
        }
        if inst.is_selected() {
            rings.push(ring(rect, radius, theme::ring::SELECTION, width, depth));
        } else if overlay.hover == Some(inst.id) {
            rings.push(ring(rect, radius, theme::ring::HOVER, width, depth));
        }
    }

    // The attach target may also be a measure bar or the origin
    if let Some(target) = overlay.attach {
        if let Some(marker) = input.scene.measure(target) {
            let x = input.view.world_to_screen(Point::new(marker.world_x, 0.0)).x;
            let tri = measure_triangle(x, config.triangle_size_px);
            let bounds = Rect::from_points(tri[0], tri[1]).union_pt(tri[2]);
            rings.push(ring(bounds, 0.0, theme::ring::ATTACH, width, MARKER_DEPTH));
        } else if let Some(origin) = input.scene.origin().filter(|o| o.id == target) {
            let center = input.view.world_to_screen(origin.center);
            let r = config.origin_radius_px;
            let bounds = Rect::new(center.x - r, center.y - r, center.x + r, center.y + r);
            rings.push(ring(bounds, r, theme::ring::ATTACH, width, MARKER_DEPTH));
        }
    }
    rings
}

fn build_glyphs(input: &FrameInput<'_>, cache: &mut GlyphCache) -> Vec<GlyphInstance> {
    let size = input.config.label_font_size as f32;
    let padding = settings::render::LABEL_PADDING_PX;
    let color = rgba(theme::note::LABEL);
    let mut glyphs = Vec::new();
    let count = input.scene.instances().len();

    for (i, inst) in input.scene.instances().iter().enumerate() {
        if inst.label.is_empty() {
            continue;
        }
        let rect = input.view.screen_rect(inst.world_rect());
        let run = cache.layout_run(&inst.label, size);
        // Labels that do not fit are left out
        if run.ink.width() + 2.0 * padding > rect.width() || run.ink.height() > rect.height() {
            continue;
        }
        let origin = run.origin_left_at(rect.x0 + padding, rect.center().y);
        let depth = overlay_depth(i, count);
        glyphs.extend(run.glyphs.iter().map(|g| GlyphInstance {
            origin: [(origin.x + g.pen_x) as f32, origin.y as f32],
            ink: rect_array(g.ink),
            color,
            ch: g.ch as u32,
            font_size: size,
            depth,
            _pad: 0,
        }));
    }
    glyphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ViewState;
    use crate::model::MemoryModel;
    use crate::model::memory::{FrequencyExpr, StoredNote, TimeExpr};
    use crate::render::backend::InstanceBuffer;
    use crate::render::text::MonospaceMeasurer;
    use kurbo::{Affine, Size};

    fn id(raw: u32) -> NoteId {
        NoteId::new(raw)
    }

    /// Tempo 60: one beat per second, 200 px per second at unit zoom
    fn model() -> MemoryModel {
        let mut model = MemoryModel::new(60.0, 4.0, 440.0);
        let unison = FrequencyExpr {
            base: None,
            ratio: 1.0,
        };
        model.insert(StoredNote::measure(id(1), TimeExpr::offset_from(NoteId::ORIGIN, 4.0)));
        model.insert(StoredNote::playable(
            id(2),
            TimeExpr::offset_from(NoteId::ORIGIN, 0.0),
            0.75,
            unison.clone(),
        ));
        model.insert(StoredNote::playable(id(3), TimeExpr::after(id(2)), 1.0, unison));
        model.insert(StoredNote::silent(id(4), TimeExpr::after(id(3)), 1.0));
        model
    }

    struct Harness {
        scene: SceneCache,
        view: ViewState,
        overlay: OverlayState,
        config: EngineConfig,
        pipeline: RasterPipeline,
    }

    impl Harness {
        fn new(selection: Option<NoteId>) -> Self {
            let config = EngineConfig::default();
            let mut scene = SceneCache::new();
            scene.sync(&model(), selection, &config);
            Self {
                scene,
                view: ViewState::new(Affine::translate((50.0, 300.0)), Size::new(1200.0, 600.0)),
                overlay: OverlayState::new(),
                config,
                pipeline: RasterPipeline::new(MonospaceMeasurer),
            }
        }

        fn frame(&mut self, backend: &mut dyn RasterBackend) -> FrameStats {
            let input = FrameInput {
                scene: &self.scene,
                view: &self.view,
                overlay: &self.overlay,
                config: &self.config,
            };
            self.pipeline.frame(backend, &input)
        }
    }

    #[test]
    fn test_first_frame_builds_every_batch() {
        let mut harness = Harness::new(Some(id(2)));
        let mut backend = RecordingBackend::new();
        let stats = harness.frame(&mut backend);
        assert!(stats.drawn);
        assert_eq!(stats.rebuilt, BatchKind::ALL.to_vec());
        let kinds: Vec<BatchKind> = backend.last_passes().unwrap().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, BatchKind::ALL.to_vec());
    }

    #[test]
    fn test_depth_flags_per_pass() {
        let mut harness = Harness::new(None);
        let mut backend = RecordingBackend::new();
        harness.frame(&mut backend);
        for pass in backend.last_passes().unwrap() {
            assert!(pass.depth_test);
            assert_eq!(pass.depth_write, pass.kind == BatchKind::Bodies);
        }
    }

    #[test]
    fn test_unchanged_epochs_skip_rebuild_and_upload() {
        let mut harness = Harness::new(None);
        let mut backend = RecordingBackend::new();
        harness.frame(&mut backend);
        let uploads = backend.uploads();
        let stats = harness.frame(&mut backend);
        assert!(stats.rebuilt.is_empty());
        assert_eq!(stats.uploads, 0);
        assert_eq!(backend.uploads(), uploads);
        assert_eq!(backend.frames, 2);
    }

    #[test]
    fn test_preview_rebuilds_position_batches() {
        let mut harness = Harness::new(None);
        let mut backend = RecordingBackend::new();
        harness.frame(&mut backend);
        assert!(harness.scene.preview_position(id(3), 1.25, None));
        let stats = harness.frame(&mut backend);
        assert!(stats.rebuilt.contains(&BatchKind::Bodies));
        assert!(stats.rebuilt.contains(&BatchKind::Glyphs));
        assert_eq!(harness.pipeline.rebuilds(BatchKind::Bodies), 2);
        let Some(InstanceBuffer::Bodies(bodies)) = backend.drawn(BatchKind::Bodies) else {
            panic!("bodies not drawn");
        };
        let index = harness.scene.index_of(id(3)).unwrap();
        assert!((bodies[index].rect[0] - (50.0 + 1.25 * 200.0)).abs() < 1e-3);
    }

    #[test]
    fn test_overlay_change_rebuilds_rings_only() {
        let mut harness = Harness::new(None);
        let mut backend = RecordingBackend::new();
        harness.frame(&mut backend);
        assert!(harness.overlay.set_hover(Some(id(3))));
        let stats = harness.frame(&mut backend);
        assert_eq!(stats.rebuilt, vec![BatchKind::Rings]);
        let Some(InstanceBuffer::Rings(rings)) = backend.drawn(BatchKind::Rings) else {
            panic!("rings not drawn");
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].color, rgba(theme::ring::HOVER));
    }

    #[test]
    fn test_selection_is_nearest() {
        let mut harness = Harness::new(Some(id(2)));
        let mut backend = RecordingBackend::new();
        harness.frame(&mut backend);
        let Some(InstanceBuffer::Bodies(bodies)) = backend.drawn(BatchKind::Bodies) else {
            panic!("bodies not drawn");
        };
        let last = bodies.last().unwrap();
        assert!(bodies.iter().all(|b| b.depth >= last.depth));
        assert!(bodies.windows(2).all(|w| w[0].depth > w[1].depth));
    }

    #[test]
    fn test_frame_stats_summary() {
        let stats = FrameStats {
            rebuilt: vec![BatchKind::Bodies],
            uploads: 1,
            passes: 6,
            drawn: false,
        };
        assert_eq!(stats.to_string(), "rebuilt [Bodies], 1 uploads, 6 passes, draw rejected");
    }

    #[test]
    fn test_overlays_sit_between_their_note_and_the_next() {
        for count in [5, 250_000] {
            for i in [0, 1, 2, count - 2] {
                assert!(overlay_depth(i, count) < note_depth(i, count));
                assert!(overlay_depth(i, count) > note_depth(i + 1, count));
            }
            assert!(overlay_depth(count - 1, count) > 0.0);
        }
    }

    #[test]
    fn test_rest_border_has_whole_dash_count() {
        let mut harness = Harness::new(None);
        let mut backend = RecordingBackend::new();
        harness.frame(&mut backend);
        let Some(InstanceBuffer::Borders(borders)) = backend.drawn(BatchKind::SilentBorders) else {
            panic!("borders not drawn");
        };
        assert_eq!(borders.len(), 1);
        let border = borders[0];
        let rect = Rect::new(
            border.rect[0] as f64,
            border.rect[1] as f64,
            border.rect[2] as f64,
            border.rect[3] as f64,
        );
        let length = RoundedRectPerimeter::new(rect, border.radius as f64).length();
        let count = length / border.period as f64;
        assert!((count - count.round()).abs() < 1e-3);
    }

    #[test]
    fn test_labels_share_a_baseline() {
        let mut harness = Harness::new(None);
        let mut backend = RecordingBackend::new();
        harness.frame(&mut backend);
        let Some(InstanceBuffer::Glyphs(glyphs)) = backend.drawn(BatchKind::Glyphs) else {
            panic!("glyphs not drawn");
        };
        // "3/4" on note 2
        let run: Vec<&GlyphInstance> = glyphs.iter().take(3).collect();
        let chars: String = run.iter().filter_map(|g| g.char()).collect();
        assert_eq!(chars, "3/4");
        assert!(run.iter().all(|g| g.origin[1] == run[0].origin[1]));
        assert!(run.windows(2).all(|w| w[1].origin[0] > w[0].origin[0]));
    }

    #[test]
    fn test_allocation_failure_uses_placeholder_then_retries() {
        let mut harness = Harness::new(None);
        // Room for one instance of any batch, not for the atlas
        let mut backend = RecordingBackend::with_allocation_limit(128);
        let stats = harness.frame(&mut backend);
        assert!(stats.drawn);
        assert!(harness.pipeline.arena().any_degraded());
        let bodies = backend.last_passes().unwrap().iter().find(|p| p.kind == BatchKind::Bodies).copied();
        assert_eq!(bodies.map(|p| p.instances), Some(1));
        // Missing glyphs rather than a failed frame
        assert!(backend.drawn(BatchKind::Glyphs).is_none());

        backend.max_allocation = None;
        harness.pipeline.viewport_changed();
        harness.frame(&mut backend);
        assert!(!harness.pipeline.arena().any_degraded());
        let bodies = backend.last_passes().unwrap().iter().find(|p| p.kind == BatchKind::Bodies).copied();
        assert_eq!(bodies.map(|p| p.instances), Some(3));
        assert!(backend.drawn(BatchKind::Glyphs).is_some());
    }
}
