// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Xilem View wrapper for NoteCanvasWidget

use super::{CanvasCommit, NoteCanvasWidget};
use crate::config::EngineConfig;
use crate::interaction::CommitEvent;
use crate::model::MemoryModel;
use std::marker::PhantomData;
use std::sync::Arc;
use xilem::core::{MessageContext, MessageResult, Mut, View, ViewMarker};
use xilem::{Pod, ViewCtx};

/// Create a note canvas over a model with a callback for commits.
///
/// The callback receives every commit of a finished interaction, in
/// order, and is expected to apply them to the authoritative model.
pub fn note_canvas_view<State, F>(
    model: Arc<MemoryModel>,
    config: EngineConfig,
    on_commit: F,
) -> NoteCanvasView<State, F>
where
    F: Fn(&mut State, Vec<CommitEvent>),
{
    NoteCanvasView {
        model,
        config,
        on_commit,
        phantom: PhantomData,
    }
}

/// The Xilem View for NoteCanvasWidget
#[must_use = "View values do nothing unless provided to Xilem."]
pub struct NoteCanvasView<State, F> {
    model: Arc<MemoryModel>,
    config: EngineConfig,
    on_commit: F,
    phantom: PhantomData<fn() -> State>,
}

impl<State, F> ViewMarker for NoteCanvasView<State, F> {}

impl<State: 'static, F: Fn(&mut State, Vec<CommitEvent>) + 'static> View<State, (), ViewCtx>
    for NoteCanvasView<State, F>
{
    type Element = Pod<NoteCanvasWidget>;
    type ViewState = ();

    fn build(&self, ctx: &mut ViewCtx, _app_state: &mut State) -> (Self::Element, Self::ViewState) {
        let widget = NoteCanvasWidget::new(self.model.clone(), self.config.clone());
        let pod = ctx.create_pod(widget);
        ctx.record_action(pod.new_widget.id());
        (pod, ())
    }

    fn rebuild(
        &self,
        prev: &Self,
        _view_state: &mut Self::ViewState,
        _ctx: &mut ViewCtx,
        mut element: Mut<'_, Self::Element>,
        _app_state: &mut State,
    ) {
        let model_changed = !Arc::ptr_eq(&self.model, &prev.model);
        let config_changed = self.config != prev.config;
        if !model_changed && !config_changed {
            return;
        }

        let mut widget = element.downcast::<NoteCanvasWidget>();
        if model_changed {
            tracing::debug!("[NoteCanvasView::rebuild] Model Arc changed, re-syncing");
            widget.widget.set_model(self.model.clone());
        }
        if config_changed {
            tracing::debug!("[NoteCanvasView::rebuild] Config changed");
            widget.widget.set_config(self.config.clone());
        }
        widget.ctx.request_render();
    }

    fn teardown(
        &self,
        _view_state: &mut Self::ViewState,
        _ctx: &mut ViewCtx,
        mut element: Mut<'_, Self::Element>,
    ) {
        let mut widget = element.downcast::<NoteCanvasWidget>();
        widget.widget.release_resources();
    }

    fn message(
        &self,
        _view_state: &mut Self::ViewState,
        message: &mut MessageContext,
        _element: Mut<'_, Self::Element>,
        app_state: &mut State,
    ) -> MessageResult<()> {
        match message.take_message::<CanvasCommit>() {
            Some(action) => {
                tracing::debug!(
                    "[NoteCanvasView::message] {} commit(s)",
                    action.commits.len()
                );
                (self.on_commit)(app_state, action.commits);
                MessageResult::Action(())
            }
            None => MessageResult::Stale,
        }
    }
}
