// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Note canvas widget: hosts the engine inside the Masonry widget tree

mod pointer;
mod view;

pub use view::note_canvas_view;

use crate::config::EngineConfig;
use crate::engine::EngineState;
use crate::interaction::CommitEvent;
use crate::model::MemoryModel;
use crate::render::SceneBackend;
use crate::render::text::ParleyMeasurer;
use kurbo::Point;
use masonry::accesskit::{Node, Role};
use masonry::core::{
    AccessCtx, BoxConstraints, ChildrenIds, EventCtx, LayoutCtx, PaintCtx, PointerButton,
    PointerButtonEvent, PointerEvent, PointerScrollEvent, PointerUpdate, PropertiesMut,
    PropertiesRef, RegisterCtx, TextEvent, Update, UpdateCtx, Widget,
};
use masonry::kurbo::Size;
use masonry::vello::Scene;
use std::sync::Arc;

/// The interactive note canvas
pub struct NoteCanvasWidget {
    /// Local copy of the model. Commits are applied here right away so
    /// the canvas never shows a stale frame while the app catches up.
    pub(super) model: Arc<MemoryModel>,

    pub(super) engine: EngineState,

    pub(super) backend: SceneBackend,

    /// Last screen position of a secondary-button pan drag
    pub(super) pan_anchor: Option<Point>,

    pub(super) size: Size,
}

impl NoteCanvasWidget {
    pub fn new(model: Arc<MemoryModel>, config: EngineConfig) -> Self {
        let mut engine = EngineState::new(config, ParleyMeasurer);
        let report = engine.sync(&*model);
        tracing::info!(
            "Note canvas created: {} notes, {} skipped",
            report.instances,
            report.skipped
        );
        Self {
            model,
            engine,
            backend: SceneBackend::new(),
            pan_anchor: None,
            size: Size::new(800.0, 600.0),
        }
    }

    /// Replace the model, e.g. after the app applied a commit
    pub(super) fn set_model(&mut self, model: Arc<MemoryModel>) {
        if *model == *self.model {
            // Same content, only keep the new Arc so later rebuilds
            // compare cheaply
            self.model = model;
            return;
        }
        self.model = model;
        self.engine.sync(&*self.model);
    }

    pub(super) fn set_config(&mut self, config: EngineConfig) {
        if &config != self.engine.config() {
            self.engine.set_config(&*self.model, config);
        }
    }

    /// Apply commits locally and hand them to the view as an action
    pub(super) fn emit_commits(&mut self, ctx: &mut EventCtx<'_>, commits: Vec<CommitEvent>) {
        if commits.is_empty() {
            return;
        }
        let model = Arc::make_mut(&mut self.model);
        for commit in &commits {
            if !model.apply_commit(commit) {
                tracing::warn!("Commit for unknown note: {commit}");
            }
        }
        self.engine.sync(&*self.model);
        ctx.submit_action::<CanvasCommit>(CanvasCommit { commits });
    }

    /// Drop every backend resource the engine holds
    pub(super) fn release_resources(&mut self) {
        self.engine.release(&mut self.backend);
        tracing::debug!("Canvas resources released");
    }

    pub(super) fn paint_background(&self, scene: &mut Scene, canvas_size: Size) {
        let rect = canvas_size.to_rect();
        masonry::util::fill_color(scene, &rect, crate::theme::canvas::BACKGROUND);
    }
}

/// Action emitted by the canvas when an interaction completed
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasCommit {
    pub commits: Vec<CommitEvent>,
}

impl Widget for NoteCanvasWidget {
    type Action = CanvasCommit;

    fn accepts_focus(&self) -> bool {
        true
    }

    fn register_children(&mut self, _ctx: &mut RegisterCtx<'_>) {}

    fn update(
        &mut self,
        _ctx: &mut UpdateCtx<'_>,
        _props: &mut PropertiesMut<'_>,
        _event: &Update,
    ) {
    }

    fn layout(
        &mut self,
        _ctx: &mut LayoutCtx<'_>,
        _props: &mut PropertiesMut<'_>,
        bc: &BoxConstraints,
    ) -> Size {
        let size = bc.max();
        self.size = size;
        self.engine.set_viewport(size);
        size
    }

    fn paint(&mut self, ctx: &mut PaintCtx<'_>, _props: &PropertiesRef<'_>, scene: &mut Scene) {
        let canvas_size = ctx.size();
        self.paint_background(scene, canvas_size);
        self.engine.set_viewport(canvas_size);

        if let Some(stats) = self.engine.frame(&mut self.backend) {
            tracing::trace!("Frame: {}", stats);
        }
        scene.append(self.backend.scene(), None);
    }

    fn on_pointer_event(
        &mut self,
        ctx: &mut EventCtx<'_>,
        _props: &mut PropertiesMut<'_>,
        event: &PointerEvent,
    ) {
        ctx.request_focus();

        match event {
            PointerEvent::Down(PointerButtonEvent {
                button: Some(PointerButton::Primary),
                state,
                ..
            }) => {
                self.handle_pointer_down(ctx, state);
            }

            PointerEvent::Down(PointerButtonEvent {
                button: Some(PointerButton::Secondary),
                state,
                ..
            }) => {
                self.handle_pan_start(ctx, state);
            }

            PointerEvent::Move(PointerUpdate { current, .. }) => {
                self.handle_pointer_move(ctx, current);
            }

            PointerEvent::Up(PointerButtonEvent {
                button: Some(PointerButton::Primary),
                state,
                ..
            }) => {
                self.handle_pointer_up(ctx, state);
            }

            PointerEvent::Up(PointerButtonEvent {
                button: Some(PointerButton::Secondary),
                ..
            }) => {
                self.handle_pan_end(ctx);
            }

            PointerEvent::Cancel(_) => {
                self.handle_pointer_cancel(ctx);
            }

            PointerEvent::Leave(_) => {
                self.engine.pointer_leave();
                self.maybe_request_render(ctx);
            }

            PointerEvent::Scroll(PointerScrollEvent { delta, state, .. }) => {
                self.handle_scroll_zoom(ctx, delta, state);
            }

            _ => {}
        }
    }

    fn on_text_event(
        &mut self,
        ctx: &mut EventCtx<'_>,
        _props: &mut PropertiesMut<'_>,
        event: &TextEvent,
    ) {
        use masonry::core::keyboard::{Key, KeyState, NamedKey};

        if let TextEvent::Keyboard(key_event) = event
            && key_event.state == KeyState::Down
            && key_event.key == Key::Named(NamedKey::Escape)
            && self.engine.session().is_active()
        {
            tracing::debug!("[NoteCanvasWidget] Escape cancels the active drag");
            self.handle_pointer_cancel(ctx);
            ctx.set_handled();
        }
    }

    fn accessibility_role(&self) -> Role {
        Role::Canvas
    }

    fn accessibility(
        &mut self,
        _ctx: &mut AccessCtx<'_>,
        _props: &PropertiesRef<'_>,
        node: &mut Node,
    ) {
        node.set_label(format!("Note canvas: {} notes", self.model.note_count()));
    }

    fn children_ids(&self) -> ChildrenIds {
        ChildrenIds::new()
    }
}
