// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! The canvas engine: scene cache, camera, picker, interaction session
//! and raster pipeline behind one owner.
//!
//! Everything runs on the caller's thread. Pointer input goes through
//! [`EngineState::pointer_down`] and friends, which run the interaction
//! machine and apply its effects to the scene before returning. Drawing
//! happens in [`EngineState::frame`], and only when something changed.

use crate::camera::{Camera, PanZoomCamera};
use crate::config::EngineConfig;
use crate::geometry::ViewState;
use crate::interaction::{
    CommitEvent, Effect, InputEvent, Session, TransitionContext, transition,
};
use crate::model::{NoteId, NoteModel};
use crate::picking::{Hit, HitKind, Picker};
use crate::render::text::GlyphMeasurer;
use crate::render::{FrameInput, FrameStats, OverlayState, RasterBackend, RasterPipeline};
use crate::scene::{EpochKind, SceneCache, SyncReport};
use kurbo::{Point, Size, Vec2};

/// Owner of all canvas state
#[derive(Debug)]
pub struct EngineState {
    config: EngineConfig,
    scene: SceneCache,
    camera: PanZoomCamera,
    view: ViewState,
    picker: Picker,
    pipeline: RasterPipeline,
    session: Session,
    overlay: OverlayState,
    selection: Option<NoteId>,
    needs_redraw: bool,
    camera_placed: bool,
}

impl EngineState {
    pub fn new(config: EngineConfig, measurer: impl GlyphMeasurer + 'static) -> Self {
        Self {
            config,
            scene: SceneCache::new(),
            camera: PanZoomCamera::new(),
            view: ViewState::default(),
            picker: Picker::new(),
            pipeline: RasterPipeline::new(measurer),
            session: Session::Idle,
            overlay: OverlayState::new(),
            selection: None,
            needs_redraw: true,
            camera_placed: false,
        }
    }

    // ============================================================================
    // ACCESSORS
    // ============================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneCache {
        &self.scene
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn camera(&self) -> &PanZoomCamera {
        &self.camera
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn pipeline(&self) -> &RasterPipeline {
        &self.pipeline
    }

    pub fn selection(&self) -> Option<NoteId> {
        self.selection
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    // ============================================================================
    // MODEL AND VIEW
    // ============================================================================

    /// Rebuild the scene from the model.
    ///
    /// A selection that no longer exists is dropped.
    pub fn sync(&mut self, model: &dyn NoteModel) -> SyncReport {
        if self.selection.is_some_and(|id| !model.has_note(id)) {
            self.selection = None;
        }
        let report = self.scene.sync(model, self.selection, &self.config);
        self.needs_redraw = true;
        report
    }

    /// Replace the configuration and rebuild everything derived from it
    pub fn set_config(&mut self, model: &dyn NoteModel, config: EngineConfig) {
        self.config = config;
        self.pipeline.invalidate();
        self.sync(model);
    }

    /// Set the viewport size in logical pixels
    pub fn set_viewport(&mut self, size: Size) {
        if size == self.view.viewport {
            return;
        }
        if !self.camera_placed {
            self.camera.center_origin(size);
            self.camera_placed = true;
        }
        self.view.viewport = size;
        self.pipeline.viewport_changed();
        self.update_view();
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.pipeline.set_scale_factor(scale_factor);
        self.needs_redraw = true;
    }

    /// Move the view by a screen-space delta
    pub fn pan(&mut self, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        self.camera.pan(delta);
        self.update_view();
    }

    /// Zoom both axes about a screen point
    pub fn zoom_about(&mut self, anchor: Point, factor: f64) -> bool {
        let changed = self.camera.zoom_about(anchor, factor);
        if changed {
            self.update_view();
        }
        changed
    }

    /// Zoom the time axis only
    pub fn zoom_time_about(&mut self, anchor: Point, factor: f64) -> bool {
        let changed = self.camera.zoom_axes_about(anchor, Vec2::new(factor, 1.0));
        if changed {
            self.update_view();
        }
        changed
    }

    fn update_view(&mut self) {
        self.view.basis = self.camera.basis();
        self.scene.epochs.bump(EpochKind::View);
        self.needs_redraw = true;
    }

    // ============================================================================
    // PICKING
    // ============================================================================

    /// Topmost shape under a screen point, with the configured tolerance
    pub fn pick(&mut self, screen: Point) -> Option<Hit> {
        self.picker.pick_topmost(
            &self.scene,
            &self.view,
            &self.config,
            screen,
            self.config.pick_tolerance_px,
        )
    }

    /// Every shape under a screen point, topmost first
    pub fn pick_stack(&mut self, screen: Point) -> Vec<Hit> {
        self.picker.pick_stack(
            &self.scene,
            &self.view,
            &self.config,
            screen,
            self.config.pick_tolerance_px,
        )
    }

    // ============================================================================
    // POINTER INPUT
    // ============================================================================

    /// Press at a screen point. Returns commits to apply to the model.
    pub fn pointer_down(&mut self, model: &dyn NoteModel, position: Point) -> Vec<CommitEvent> {
        let hit = if self.session.is_active() {
            None
        } else {
            self.pick(position)
        };
        if self.overlay.set_hover(None) {
            self.needs_redraw = true;
        }
        self.dispatch(model, InputEvent::PointerDown { position, hit })
    }

    /// Pointer motion. While idle this only updates the hover ring.
    pub fn pointer_move(&mut self, model: &dyn NoteModel, position: Point) -> Vec<CommitEvent> {
        if !self.session.is_active() {
            let hover = self
                .pick(position)
                .filter(|hit| hit.kind == HitKind::Note)
                .map(|hit| hit.id);
            if self.overlay.set_hover(hover) {
                self.needs_redraw = true;
            }
            return Vec::new();
        }
        self.dispatch(model, InputEvent::PointerMove { position })
    }

    pub fn pointer_up(&mut self, model: &dyn NoteModel, position: Point) -> Vec<CommitEvent> {
        self.dispatch(model, InputEvent::PointerUp { position })
    }

    pub fn pointer_cancel(&mut self, model: &dyn NoteModel) -> Vec<CommitEvent> {
        self.dispatch(model, InputEvent::PointerCancel)
    }

    /// Pointer left the canvas
    pub fn pointer_leave(&mut self) {
        if !self.session.is_active() && self.overlay.set_hover(None) {
            self.needs_redraw = true;
        }
    }

    fn dispatch(&mut self, model: &dyn NoteModel, event: InputEvent) -> Vec<CommitEvent> {
        let ctx = TransitionContext {
            model,
            scene: &self.scene,
            view: &self.view,
            config: &self.config,
        };
        let session = std::mem::take(&mut self.session);
        let (next, effects) = transition(session, &event, &ctx);
        self.session = next;
        self.apply(model, effects)
    }

    fn apply(&mut self, model: &dyn NoteModel, effects: Vec<Effect>) -> Vec<CommitEvent> {
        let mut commits = Vec::new();
        for effect in effects {
            match effect {
                Effect::Select(selection) => {
                    if selection != self.selection {
                        tracing::debug!("Selection {:?} -> {:?}", self.selection, selection);
                        self.selection = selection;
                        self.scene.sync(model, selection, &self.config);
                        self.needs_redraw = true;
                    }
                }
                Effect::Preview(updates) => {
                    for update in updates {
                        if !self.scene.preview_position(update.id, update.start, update.duration) {
                            tracing::debug!("Preview for unknown id {}", update.id);
                        }
                    }
                    self.needs_redraw = true;
                }
                Effect::Highlight { dependents, attach } => {
                    if self.overlay.set_highlight(dependents, attach) {
                        self.needs_redraw = true;
                    }
                }
                Effect::Commit(event) => commits.push(event),
                Effect::Resync => {
                    self.sync(model);
                }
            }
        }
        commits
    }

    // ============================================================================
    // DRAWING
    // ============================================================================

    /// Draw if anything changed since the last frame
    pub fn frame(&mut self, backend: &mut dyn RasterBackend) -> Option<FrameStats> {
        if !self.needs_redraw {
            return None;
        }
        let input = FrameInput {
            scene: &self.scene,
            view: &self.view,
            overlay: &self.overlay,
            config: &self.config,
        };
        let stats = self.pipeline.frame(backend, &input);
        self.needs_redraw = false;
        Some(stats)
    }

    /// Free backend resources
    pub fn release(&mut self, backend: &mut dyn RasterBackend) {
        self.pipeline.release(backend);
    }
}
