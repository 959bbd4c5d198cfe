// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Pointer event handlers for NoteCanvasWidget

use super::NoteCanvasWidget;
use crate::settings;
use masonry::core::{EventCtx, PointerState, ScrollDelta};

impl NoteCanvasWidget {
    // ============================================================================
    // POINTER EVENT HANDLERS
    // ============================================================================

    pub(super) fn handle_pointer_down(&mut self, ctx: &mut EventCtx<'_>, state: &PointerState) {
        ctx.capture_pointer();

        let local_pos = ctx.local_position(state.position);
        tracing::debug!("[NoteCanvasWidget] Down at {:?}", local_pos);

        let commits = self.engine.pointer_down(&*self.model, local_pos);
        self.emit_commits(ctx, commits);
        self.maybe_request_render(ctx);
    }

    pub(super) fn handle_pointer_move(&mut self, ctx: &mut EventCtx<'_>, current: &PointerState) {
        let local_pos = ctx.local_position(current.position);

        if let Some(anchor) = self.pan_anchor {
            self.engine.pan(local_pos - anchor);
            self.pan_anchor = Some(local_pos);
            self.maybe_request_render(ctx);
            return;
        }

        let commits = self.engine.pointer_move(&*self.model, local_pos);
        self.emit_commits(ctx, commits);
        self.maybe_request_render(ctx);
    }

    pub(super) fn handle_pointer_up(&mut self, ctx: &mut EventCtx<'_>, state: &PointerState) {
        let local_pos = ctx.local_position(state.position);

        let commits = self.engine.pointer_up(&*self.model, local_pos);
        if !commits.is_empty() {
            tracing::info!("Drag committed {} change(s)", commits.len());
        }
        self.emit_commits(ctx, commits);

        ctx.release_pointer();
        self.maybe_request_render(ctx);
    }

    pub(super) fn handle_pointer_cancel(&mut self, ctx: &mut EventCtx<'_>) {
        self.pan_anchor = None;
        let commits = self.engine.pointer_cancel(&*self.model);
        self.emit_commits(ctx, commits);
        ctx.release_pointer();
        self.maybe_request_render(ctx);
    }

    /// Start panning with the secondary button, unless a drag is active
    pub(super) fn handle_pan_start(&mut self, ctx: &mut EventCtx<'_>, state: &PointerState) {
        if self.engine.session().is_active() {
            return;
        }
        ctx.capture_pointer();
        self.pan_anchor = Some(ctx.local_position(state.position));
    }

    pub(super) fn handle_pan_end(&mut self, ctx: &mut EventCtx<'_>) {
        if self.pan_anchor.take().is_some() {
            ctx.release_pointer();
        }
    }

    /// Handle scroll wheel zoom. Shift zooms the time axis only.
    pub(super) fn handle_scroll_zoom(
        &mut self,
        ctx: &mut EventCtx<'_>,
        delta: &ScrollDelta,
        state: &PointerState,
    ) {
        let Some(zoom_factor) = scroll_zoom_factor(delta) else {
            return;
        };

        let anchor = ctx.local_position(state.position);
        let changed = if state.modifiers.shift() {
            self.engine.zoom_time_about(anchor, zoom_factor)
        } else {
            self.engine.zoom_about(anchor, zoom_factor)
        };

        if changed {
            tracing::debug!(
                "Scroll zoom: factor={:.3}, basis={:?}",
                zoom_factor,
                self.engine.view().basis
            );
            ctx.request_render();
        }
    }

    pub(super) fn maybe_request_render(&mut self, ctx: &mut EventCtx<'_>) {
        if self.engine.needs_redraw() {
            ctx.request_render();
        }
    }
}

/// Zoom factor for a scroll delta, or `None` for negligible scrolls.
///
/// Scrolling up (negative y) zooms in.
fn scroll_zoom_factor(delta: &ScrollDelta) -> Option<f64> {
    let scroll_y = match delta {
        ScrollDelta::LineDelta(_x, y) => *y,
        ScrollDelta::PixelDelta(pos) => (pos.y / 10.0) as f32,
        ScrollDelta::PageDelta(_x, y) => *y * 3.0,
    };

    if scroll_y.abs() < 0.001 {
        return None;
    }

    let step = settings::editor::SCROLL_ZOOM_STEP;
    Some(if scroll_y < 0.0 { step } else { 1.0 / step })
}
