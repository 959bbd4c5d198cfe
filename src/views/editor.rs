// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Editor view - the note canvas with a floating status panel

use masonry::properties::types::UnitPoint;
use xilem::WidgetView;
use xilem::style::Style;
use xilem::view::{ChildAlignment, ZStackExt, label, sized_box, transformed, zstack};

use crate::components::note_canvas_view;
use crate::data::AppState;
use crate::theme;

/// Fixed margin between panels and the window edge
const MARGIN: f64 = 16.0;

/// Canvas filling the window, status panel in the bottom-left corner
pub fn editor(state: &mut AppState) -> impl WidgetView<AppState> + use<> {
    zstack((
        note_canvas_view(
            state.model.clone(),
            state.config.clone(),
            |state: &mut AppState, commits| {
                state.apply_commits(commits);
            },
        ),
        transformed(status_panel(state))
            .translate((MARGIN, -MARGIN))
            .alignment(ChildAlignment::SelfAligned(UnitPoint::BOTTOM_LEFT)),
    ))
}

fn status_panel(state: &AppState) -> impl WidgetView<AppState> + use<> {
    sized_box(
        label(state.status_line())
            .text_size(14.0)
            .color(theme::text::PRIMARY),
    )
    .padding(8.0)
    .background_color(theme::panel::BACKGROUND)
    .border_color(theme::panel::OUTLINE)
    .border_width(1.5)
    .corner_radius(8.0)
}
