// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Loading models and configuration for AppState

use super::AppState;
use crate::config::EngineConfig;
use crate::model::MemoryModel;
use std::path::Path;
use std::sync::Arc;

impl AppState {
    /// Load a model document from a JSON file
    pub fn load_model(&mut self, path: &Path) {
        match MemoryModel::load(path) {
            Ok(model) => {
                tracing::info!("Loaded model: {} ({} notes)", path.display(), model.note_count());
                self.model = Arc::new(model);
                self.last_commit = None;
                self.error_message = None;
            }
            Err(e) => {
                let error = format!("Failed to load model: {}", e);
                tracing::error!("{}", error);
                self.error_message = Some(error);
            }
        }
    }

    /// Load the engine configuration from a TOML file
    pub fn load_config(&mut self, path: &Path) {
        match EngineConfig::load(path) {
            Ok(config) => {
                tracing::info!("Loaded config: {}", path.display());
                self.config = config;
            }
            Err(e) => {
                let error = format!("Failed to load config: {:#}", e);
                tracing::error!("{}", error);
                self.error_message = Some(error);
            }
        }
    }
}
