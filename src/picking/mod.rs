// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! CPU hit testing against the shapes the raster pipeline draws.
//!
//! Every footprint is derived through [`crate::geometry`] from the same
//! scene data and camera the pipeline uses, so a point inside a drawn
//! shape picks that shape. Candidates are visited topmost first:
//! measure triangles, then the origin circle, then note bodies in
//! reverse draw order.
//!
//! Screen footprints are cached and rebuilt only when the view, position
//! or topology epoch moved. The camera is pan and zoom only, so a world
//! bounding box is a valid cheap reject for its screen footprint.

pub mod sub_region;

pub use sub_region::SubRegion;

use crate::config::EngineConfig;
use crate::geometry::{
    ViewState, in_corner_region, measure_triangle, point_in_triangle, rounded_rect_sdf,
};
use crate::model::NoteId;
use crate::scene::{EpochKind, EpochStamp, SceneCache};
use kurbo::{Point, Rect};

/// What a hit landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitKind {
    Note,
    Measure,
    Origin,
}

/// A typed pick result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub kind: HitKind,
    pub id: NoteId,
    /// Only set for note hits
    pub sub_region: Option<SubRegion>,
}

#[derive(Debug, Clone)]
struct NoteFootprint {
    id: NoteId,
    world: Rect,
    screen: Rect,
    radius: f64,
    silent: bool,
}

#[derive(Debug, Clone)]
struct TriangleFootprint {
    id: NoteId,
    vertices: [Point; 3],
}

#[derive(Debug, Clone, Copy)]
struct CircleFootprint {
    id: NoteId,
    center: Point,
    radius: f64,
}

#[derive(Debug, Clone, Default)]
struct PickIndex {
    notes: Vec<NoteFootprint>,
    triangles: Vec<TriangleFootprint>,
    origin: Option<CircleFootprint>,
}

const INDEX_DEPS: [EpochKind; 3] = [EpochKind::View, EpochKind::Position, EpochKind::Topology];

/// Hit tester with a cached footprint index
#[derive(Debug, Clone, Default)]
pub struct Picker {
    index: PickIndex,
    stamp: EpochStamp,
    view: ViewState,
}

impl Picker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the footprint index if the scene or view moved
    pub fn refresh(&mut self, scene: &SceneCache, view: &ViewState, config: &EngineConfig) {
        if self.stamp.is_current(&scene.epochs, &INDEX_DEPS) {
            return;
        }
        self.index = build_index(scene, view, config);
        self.view = *view;
        self.stamp.mark(&scene.epochs);
        tracing::trace!(
            "pick index rebuilt: {} notes, {} measures",
            self.index.notes.len(),
            self.index.triangles.len()
        );
    }

    /// Topmost shape under a screen point.
    ///
    /// A shape the point is exactly inside beats one it only reaches
    /// through edge tolerance, so a press just inside a note's edge never
    /// lands on the abutting neighbor.
    pub fn pick_topmost(
        &mut self,
        scene: &SceneCache,
        view: &ViewState,
        config: &EngineConfig,
        screen: Point,
        tolerance_px: f64,
    ) -> Option<Hit> {
        self.refresh(scene, view, config);
        self.hits(screen, 0.0, config)
            .next()
            .or_else(|| self.hits(screen, tolerance_px, config).next())
    }

    /// Every shape under a screen point, topmost first
    pub fn pick_stack(
        &mut self,
        scene: &SceneCache,
        view: &ViewState,
        config: &EngineConfig,
        screen: Point,
        tolerance_px: f64,
    ) -> Vec<Hit> {
        self.refresh(scene, view, config);
        self.hits(screen, tolerance_px, config).collect()
    }

    /// Gesture region of a note under a screen point.
    ///
    /// Uses the cached index; call after a pick in the same frame.
    pub fn sub_region_of(&self, id: NoteId, screen: Point, config: &EngineConfig) -> Option<SubRegion> {
        let note = self.index.notes.iter().find(|n| n.id == id)?;
        Some(sub_region::classify(note.screen, note.silent, screen, config))
    }

    fn hits<'a>(
        &'a self,
        screen: Point,
        tolerance_px: f64,
        config: &'a EngineConfig,
    ) -> impl Iterator<Item = Hit> + 'a {
        let tolerance = tolerance_px.max(0.0);
        let world = self.view.screen_to_world(screen);
        let scale = self.view.scale();
        let pad_x = tolerance / scale.x.max(f64::EPSILON);
        let pad_y = tolerance / scale.y.max(f64::EPSILON);

        let triangles = self
            .index
            .triangles
            .iter()
            .rev()
            .filter(move |t| point_in_triangle(screen, &t.vertices))
            .map(|t| Hit {
                kind: HitKind::Measure,
                id: t.id,
                sub_region: None,
            });

        let origin = self
            .index
            .origin
            .filter(move |c| {
                let reach = c.radius + tolerance;
                (screen - c.center).hypot2() <= reach * reach
            })
            .map(|c| Hit {
                kind: HitKind::Origin,
                id: c.id,
                sub_region: None,
            });

        let notes = self
            .index
            .notes
            .iter()
            .rev()
            .filter(move |n| contains_inclusive(n.world, world, pad_x, pad_y))
            .filter(move |n| note_contains(n, screen, tolerance))
            .map(move |n| Hit {
                kind: HitKind::Note,
                id: n.id,
                sub_region: Some(sub_region::classify(n.screen, n.silent, screen, config)),
            });

        triangles.chain(origin).chain(notes)
    }
}

/// Exact test: inside the rounded shape, or within tolerance of a
/// straight edge. Corner arcs get no tolerance.
fn note_contains(note: &NoteFootprint, p: Point, tolerance: f64) -> bool {
    let d = rounded_rect_sdf(p, note.screen, note.radius);
    d <= 0.0 || (d <= tolerance && !in_corner_region(p, note.screen, note.radius))
}

fn contains_inclusive(rect: Rect, p: Point, pad_x: f64, pad_y: f64) -> bool {
    p.x >= rect.x0 - pad_x && p.x <= rect.x1 + pad_x && p.y >= rect.y0 - pad_y && p.y <= rect.y1 + pad_y
}

fn build_index(scene: &SceneCache, view: &ViewState, config: &EngineConfig) -> PickIndex {
    let notes = scene
        .instances()
        .iter()
        .map(|inst| {
            let world = inst.world_rect();
            NoteFootprint {
                id: inst.id,
                world,
                screen: view.screen_rect(world),
                radius: config.corner_radius_px,
                silent: inst.is_silent(),
            }
        })
        .collect();

    let triangles = scene
        .measures()
        .iter()
        .map(|m| TriangleFootprint {
            id: m.id,
            vertices: measure_triangle(
                view.world_to_screen(Point::new(m.world_x, 0.0)).x,
                config.triangle_size_px,
            ),
        })
        .collect();

    let origin = scene.origin().map(|o| CircleFootprint {
        id: o.id,
        center: view.world_to_screen(o.center),
        radius: config.origin_radius_px,
    });

    PickIndex {
        notes,
        triangles,
        origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_screen_rect(scene: &SceneCache, view: &ViewState, id: NoteId) -> Option<Rect> {
        scene.instance(id).map(|inst| view.screen_rect(inst.world_rect()))
    }

    fn drawn_radius(rect: Rect, config: &EngineConfig) -> f64 {
        crate::geometry::clamped_radius(rect, config.corner_radius_px)
    }
    use crate::model::memory::{FrequencyExpr, StoredNote, TimeExpr};
    use crate::model::MemoryModel;
    use kurbo::{Affine, Size};

    fn id(raw: u32) -> NoteId {
        NoteId::new(raw)
    }

    fn freq(ratio: f64) -> FrequencyExpr {
        FrequencyExpr { base: None, ratio }
    }

    /// Two overlapping notes in the same lane plus a measure and a far note
    fn overlapping_model() -> MemoryModel {
        // tempo 60 => beat = 1s
        let mut model = MemoryModel::new(60.0, 4.0, 440.0);
        model.insert(StoredNote::measure(id(1), TimeExpr::offset_from(NoteId::ORIGIN, 4.0)));
        model.insert(StoredNote::playable(id(2), TimeExpr::offset_from(NoteId::ORIGIN, 1.0), 2.0, freq(1.0)));
        model.insert(StoredNote::playable(id(3), TimeExpr::offset_from(NoteId::ORIGIN, 2.0), 2.0, freq(1.0)));
        model.insert(StoredNote::playable(id(4), TimeExpr::offset_from(NoteId::ORIGIN, 1.0), 1.0, freq(2.0)));
        model
    }

    fn setup(selection: Option<NoteId>) -> (SceneCache, ViewState, EngineConfig) {
        let config = EngineConfig::default();
        let mut scene = SceneCache::new();
        scene.sync(&overlapping_model(), selection, &config);
        // Unit scale: one world unit is one pixel, world origin at (50, 300)
        let view = ViewState::new(Affine::translate((50.0, 300.0)), Size::new(2000.0, 600.0));
        (scene, view, config)
    }

    #[test]
    fn test_topmost_is_last_drawn() {
        let (scene, view, config) = setup(None);
        let mut picker = Picker::new();
        // Screen x 50 + 2.5 * 200 lies inside both notes 2 and 3
        let p = Point::new(50.0 + 2.5 * 200.0, 300.0);
        let hit = picker.pick_topmost(&scene, &view, &config, p, 0.0).unwrap();
        assert_eq!(hit.id, id(3));
        let stack = picker.pick_stack(&scene, &view, &config, p, 0.0);
        let ids: Vec<_> = stack.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![id(3), id(2)]);
    }

    #[test]
    fn test_selection_changes_topmost() {
        let (scene, view, config) = setup(Some(id(2)));
        let mut picker = Picker::new();
        let p = Point::new(50.0 + 2.5 * 200.0, 300.0);
        let hit = picker.pick_topmost(&scene, &view, &config, p, 0.0).unwrap();
        assert_eq!(hit.id, id(2));
    }

    #[test]
    fn test_pick_agrees_with_drawn_footprint() {
        let (scene, view, config) = setup(None);
        let mut picker = Picker::new();
        for inst in scene.instances() {
            let rect = view.screen_rect(inst.world_rect());
            let radius = drawn_radius(rect, &config);
            // Sample a grid over and around the footprint
            for i in 0..=40 {
                for j in 0..=20 {
                    let p = Point::new(
                        rect.x0 - 5.0 + (rect.width() + 10.0) * i as f64 / 40.0,
                        rect.y0 - 5.0 + (rect.height() + 10.0) * j as f64 / 20.0,
                    );
                    let d = rounded_rect_sdf(p, rect, radius);
                    let stack = picker.pick_stack(&scene, &view, &config, p, 0.0);
                    let picked = stack.iter().any(|h| h.id == inst.id);
                    if d < -1e-9 {
                        assert!(picked, "{} missed at {:?}", inst.id, p);
                    } else if d > 1e-9 {
                        assert!(!picked, "{} picked outside at {:?}", inst.id, p);
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_space_is_no_hit() {
        let (scene, view, config) = setup(None);
        let mut picker = Picker::new();
        assert!(picker
            .pick_topmost(&scene, &view, &config, Point::new(1900.0, 550.0), 3.0)
            .is_none());
    }

    #[test]
    fn test_empty_scene_is_no_hit() {
        let scene = SceneCache::new();
        let mut picker = Picker::new();
        let hit = picker.pick_topmost(&scene, &ViewState::default(), &EngineConfig::default(), Point::ZERO, 3.0);
        assert!(hit.is_none());
    }

    #[test]
    fn test_tolerance_on_edges_but_not_corners() {
        let (scene, view, config) = setup(None);
        let mut picker = Picker::new();
        let rect = note_screen_rect(&scene, &view, id(4)).unwrap();
        // Two pixels above the middle of the top edge
        let edge = Point::new(rect.center().x, rect.y0 - 2.0);
        assert!(picker.pick_stack(&scene, &view, &config, edge, 3.0).iter().any(|h| h.id == id(4)));
        assert!(!picker.pick_stack(&scene, &view, &config, edge, 0.0).iter().any(|h| h.id == id(4)));
        // Just outside the rounded corner
        let corner = Point::new(rect.x0 + 0.5, rect.y0 + 0.5);
        assert!(!picker.pick_stack(&scene, &view, &config, corner, 3.0).iter().any(|h| h.id == id(4)));
    }

    #[test]
    fn test_triangle_before_notes_and_origin() {
        let (scene, view, config) = setup(None);
        let mut picker = Picker::new();
        let x = view.world_to_screen(Point::new(4.0 * 200.0, 0.0)).x;
        let hit = picker.pick_topmost(&scene, &view, &config, Point::new(x, 2.0), 0.0).unwrap();
        assert_eq!(hit.kind, HitKind::Measure);
        assert_eq!(hit.id, id(1));
        assert_eq!(hit.sub_region, None);

        let origin = view.world_to_screen(Point::ZERO);
        let hit = picker.pick_topmost(&scene, &view, &config, origin, 0.0).unwrap();
        assert_eq!(hit.kind, HitKind::Origin);
    }

    #[test]
    fn test_hit_reports_sub_region() {
        let (scene, view, config) = setup(None);
        let mut picker = Picker::new();
        let rect = note_screen_rect(&scene, &view, id(4)).unwrap();
        let tab = Point::new(rect.x1 - 2.0, rect.center().y);
        let hit = picker.pick_topmost(&scene, &view, &config, tab, 0.0).unwrap();
        assert_eq!(hit.sub_region, Some(SubRegion::Tab));
        let up = Point::new(rect.x0 + 3.0, rect.y0 + 4.0);
        assert_eq!(picker.sub_region_of(id(4), up, &config), Some(SubRegion::OctaveUp));
    }

    #[test]
    fn test_index_follows_preview() {
        let (mut scene, view, config) = setup(None);
        let mut picker = Picker::new();
        let rect = note_screen_rect(&scene, &view, id(4)).unwrap();
        let p = rect.center();
        assert!(picker.pick_stack(&scene, &view, &config, p, 0.0).iter().any(|h| h.id == id(4)));
        scene.preview_position(id(4), 8.0, None);
        assert!(!picker.pick_stack(&scene, &view, &config, p, 0.0).iter().any(|h| h.id == id(4)));
    }
}
