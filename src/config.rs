// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Runtime-tunable engine configuration.
//!
//! Defaults come from [`crate::settings`]. A TOML file may override any
//! subset of the fields; missing keys keep their defaults.

use crate::settings;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// How the dependency closure discovers edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureStrategy {
    /// Scan stored start expressions, falling back to the model's
    /// dependency query for notes without expression text
    #[default]
    Blended,
    /// Only use the model's dependency query
    Authoritative,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub time_scale: f64,
    pub octave_height: f64,
    pub note_height: f64,
    pub corner_radius_px: f64,
    pub ring_width_px: f64,
    pub border_width_px: f64,
    pub dash_px: f64,
    pub gap_px: f64,
    pub triangle_size_px: f64,
    pub origin_radius_px: f64,
    pub label_font_size: f64,
    pub pick_tolerance_px: f64,
    pub tab_width_px: f64,
    pub octave_zone_px: f64,
    pub octave_dead_zone_px: f64,
    pub snap_divisions_per_beat: f64,
    pub commit_epsilon: f64,
    pub click_slop_px: f64,
    pub closure_strategy: ClosureStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_scale: settings::layout::TIME_SCALE,
            octave_height: settings::layout::OCTAVE_HEIGHT,
            note_height: settings::layout::NOTE_HEIGHT,
            corner_radius_px: settings::render::CORNER_RADIUS_PX,
            ring_width_px: settings::render::RING_WIDTH_PX,
            border_width_px: settings::render::BORDER_WIDTH_PX,
            dash_px: settings::render::DASH_PX,
            gap_px: settings::render::GAP_PX,
            triangle_size_px: settings::render::TRIANGLE_SIZE_PX,
            origin_radius_px: settings::render::ORIGIN_RADIUS_PX,
            label_font_size: settings::render::LABEL_FONT_SIZE,
            pick_tolerance_px: settings::picking::TOLERANCE_PX,
            tab_width_px: settings::picking::TAB_WIDTH_PX,
            octave_zone_px: settings::picking::OCTAVE_ZONE_PX,
            octave_dead_zone_px: settings::picking::OCTAVE_DEAD_ZONE_PX,
            snap_divisions_per_beat: settings::snap::DIVISIONS_PER_BEAT,
            commit_epsilon: settings::interaction::COMMIT_EPSILON,
            click_slop_px: settings::interaction::CLICK_SLOP_PX,
            closure_strategy: ClosureStrategy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Invalid engine configuration")?;
        Ok(config.sanitized())
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text)
    }

    /// Replace non-positive scales with their defaults
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.time_scale > 0.0) {
            tracing::warn!("time_scale must be positive, using default");
            self.time_scale = defaults.time_scale;
        }
        if !(self.octave_height > 0.0) {
            tracing::warn!("octave_height must be positive, using default");
            self.octave_height = defaults.octave_height;
        }
        if !(self.snap_divisions_per_beat > 0.0) {
            tracing::warn!("snap_divisions_per_beat must be positive, using default");
            self.snap_divisions_per_beat = defaults.snap_divisions_per_beat;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml(
            "pick_tolerance_px = 6.0\nclosure_strategy = \"authoritative\"\n",
        )
        .unwrap();
        assert_eq!(config.pick_tolerance_px, 6.0);
        assert_eq!(config.closure_strategy, ClosureStrategy::Authoritative);
        assert_eq!(config.tab_width_px, settings::picking::TAB_WIDTH_PX);
    }

    #[test]
    fn test_invalid_scale_falls_back() {
        let config = EngineConfig::from_toml("time_scale = -1.0").unwrap();
        assert_eq!(config.time_scale, settings::layout::TIME_SCALE);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(EngineConfig::from_toml("time_scale = \"fast\"").is_err());
    }
}
