// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Top-level views

mod editor;

pub use editor::editor;
