// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! UI components for the Notegraph canvas

pub mod note_canvas;

pub use note_canvas::{NoteCanvasWidget, note_canvas_view};
