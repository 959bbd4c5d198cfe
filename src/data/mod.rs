// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Central application state (`AppState`) that drives the Xilem reactive UI.
//!
//! `AppState` owns the authoritative note model and the engine
//! configuration. The canvas reports finished interactions as commit
//! events; they are applied here and the new model flows back down
//! through the view tree.

mod file_io;

use crate::config::EngineConfig;
use crate::interaction::CommitEvent;
use crate::model::MemoryModel;
use std::sync::Arc;
use xilem::WindowId;

/// Main application state
pub struct AppState {
    /// The note model. Replaced (not mutated in place) on every commit so
    /// views can detect changes by pointer.
    pub model: Arc<MemoryModel>,

    /// Runtime engine configuration
    pub config: EngineConfig,

    /// Error message to display, if any
    pub error_message: Option<String>,

    /// Most recent applied commit, for the status panel
    pub last_commit: Option<CommitEvent>,

    /// Whether the app should keep running
    pub running: bool,

    /// Main window ID (stable across rebuilds to prevent window
    /// recreation)
    pub main_window_id: WindowId,
}

impl AppState {
    /// Create an application state over the demo model
    pub fn new() -> Self {
        Self::with_model(MemoryModel::demo())
    }

    pub fn with_model(model: MemoryModel) -> Self {
        Self {
            model: Arc::new(model),
            config: EngineConfig::default(),
            error_message: None,
            last_commit: None,
            running: true,
            main_window_id: WindowId::next(),
        }
    }

    /// Apply commits from the canvas to the model
    pub fn apply_commits(&mut self, commits: Vec<CommitEvent>) {
        if commits.is_empty() {
            return;
        }
        let mut model = (*self.model).clone();
        for commit in &commits {
            if model.apply_commit(commit) {
                tracing::info!("Applied commit: {commit}");
                self.last_commit = Some(*commit);
            } else {
                tracing::warn!("Ignored commit for unknown note: {commit}");
            }
        }
        self.model = Arc::new(model);
    }

    /// One-line summary for the status panel
    pub fn status_line(&self) -> String {
        let notes = format!("{} notes", self.model.note_count());
        match (&self.error_message, &self.last_commit) {
            (Some(error), _) => format!("{notes} | {error}"),
            (None, Some(commit)) => format!("{notes} | {commit}"),
            (None, None) => notes,
        }
    }
}

/// Implement the Xilem AppState trait
impl xilem::AppState for AppState {
    fn keep_running(&self) -> bool {
        self.running
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::OctaveDirection;
    use crate::model::memory::{FrequencyExpr, StoredNote, TimeExpr};
    use crate::model::{NoteId, NoteModel, Variable};

    fn state() -> AppState {
        let mut model = MemoryModel::new(60.0, 4.0, 440.0);
        model.insert(StoredNote::playable(
            NoteId::new(1),
            TimeExpr::offset_from(NoteId::ORIGIN, 0.0),
            1.0,
            FrequencyExpr {
                base: None,
                ratio: 1.0,
            },
        ));
        AppState::with_model(model)
    }

    #[test]
    fn test_apply_commits_replaces_model_arc() {
        let mut state = state();
        let before = state.model.clone();
        state.apply_commits(vec![CommitEvent::NoteMove {
            id: NoteId::new(1),
            new_start: 2.0,
        }]);
        assert!(!Arc::ptr_eq(&before, &state.model));
        assert_eq!(
            state.model.variable(NoteId::new(1), Variable::StartTime).and_then(|v| v.as_number()),
            Some(2.0)
        );
        assert!(state.last_commit.is_some());
        assert!(state.status_line().starts_with("1 notes | moved #1"));
    }

    #[test]
    fn test_empty_commit_list_keeps_model() {
        let mut state = state();
        let before = state.model.clone();
        state.apply_commits(Vec::new());
        assert!(Arc::ptr_eq(&before, &state.model));
    }

    #[test]
    fn test_unknown_note_is_not_recorded() {
        let mut state = state();
        state.apply_commits(vec![CommitEvent::OctaveChange {
            id: NoteId::new(42),
            direction: OctaveDirection::Up,
        }]);
        assert_eq!(state.last_commit, None);
        assert_eq!(state.status_line(), "1 notes");
    }
}
