// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Scene cache: flat per-instance arrays derived from the note model.
//!
//! The cache is the single source of truth for both the raster pipeline
//! and the picking engine. [`SceneCache::sync`] rebuilds it wholesale from
//! the model; [`SceneCache::preview_position`] moves one entry in place
//! during an interaction without changing draw order.
//!
//! World layout: x grows with time (`start * time_scale`), y grows
//! downward with falling pitch (`-log2(f / f_origin) * octave_height`), so
//! higher notes sit higher on screen under an identity camera.

pub mod epoch;
pub mod label;

pub use epoch::{EpochKind, EpochStamp, Epochs};

use crate::config::EngineConfig;
use crate::model::{NoteId, NoteModel, Variable};
use crate::theme;
use kurbo::{Point, Rect, Size};
use masonry::vello::peniko::Color;
use std::collections::HashMap;

/// Resolved shape of a model note
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteKind {
    /// The reference entity at time and frequency zero-point
    Origin { start: f64, frequency: f64 },
    /// A measure bar; only a start time
    Measure { start: f64 },
    /// A timed note; `frequency` is `None` for a rest
    Playable {
        start: f64,
        duration: f64,
        frequency: Option<f64>,
    },
}

impl NoteKind {
    /// Resolve a note's kind from its evaluated variables.
    ///
    /// Returns `None` for notes missing the attributes their kind needs.
    pub fn resolve(model: &dyn NoteModel, id: NoteId) -> Option<Self> {
        let start = model.number(id, Variable::StartTime);
        let duration = model.number(id, Variable::Duration);
        let frequency = model.number(id, Variable::Frequency);

        if id == model.origin() {
            return Some(NoteKind::Origin {
                start: start.unwrap_or(0.0),
                frequency: frequency
                    .filter(|f| *f > 0.0)
                    .unwrap_or(crate::settings::layout::DEFAULT_ORIGIN_FREQUENCY),
            });
        }

        match (start, duration, frequency) {
            (Some(start), Some(duration), frequency) if duration > 0.0 => {
                Some(NoteKind::Playable {
                    start,
                    duration,
                    frequency: frequency.filter(|f| *f > 0.0),
                })
            }
            (Some(start), None, None) => Some(NoteKind::Measure { start }),
            _ => None,
        }
    }

    pub fn start(&self) -> f64 {
        match *self {
            NoteKind::Origin { start, .. }
            | NoteKind::Measure { start }
            | NoteKind::Playable { start, .. } => start,
        }
    }
}

/// Per-instance flag bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InstanceFlags(u32);

impl InstanceFlags {
    pub const NONE: InstanceFlags = InstanceFlags(0);
    /// The note has no frequency and is drawn in the origin lane
    pub const SILENT: InstanceFlags = InstanceFlags(1);
    /// The note is the current selection
    pub const SELECTED: InstanceFlags = InstanceFlags(1 << 1);

    pub fn contains(self, other: InstanceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: InstanceFlags) {
        self.0 |= other.0;
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

/// One drawable note
#[derive(Debug, Clone, PartialEq)]
pub struct VisualInstance {
    pub id: NoteId,
    /// Top-left corner in world units
    pub position: Point,
    /// Extent in world units
    pub size: Size,
    pub color: Color,
    pub flags: InstanceFlags,
    /// Kind as resolved at the last sync
    pub kind: NoteKind,
    /// Duration in beats as a fraction
    pub label: String,
}

impl VisualInstance {
    pub fn world_rect(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    pub fn is_silent(&self) -> bool {
        self.flags.contains(InstanceFlags::SILENT)
    }

    pub fn is_selected(&self) -> bool {
        self.flags.contains(InstanceFlags::SELECTED)
    }
}

/// A measure bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureMarker {
    pub id: NoteId,
    pub start: f64,
    /// World x of the bar
    pub world_x: f64,
}

/// The origin circle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginMarker {
    pub id: NoteId,
    pub start: f64,
    pub frequency: f64,
    /// World center of the circle
    pub center: Point,
}

/// World layout parameters taken from the engine config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLayout {
    pub time_scale: f64,
    pub octave_height: f64,
    pub note_height: f64,
}

impl SceneLayout {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            time_scale: config.time_scale,
            octave_height: config.octave_height,
            note_height: config.note_height,
        }
    }

    /// World x of a time in seconds
    pub fn world_x(&self, time: f64) -> f64 {
        time * self.time_scale
    }

    /// Time in seconds at a world x
    pub fn time_at(&self, world_x: f64) -> f64 {
        world_x / self.time_scale
    }

    /// World y of the lane center for a frequency
    pub fn world_y(&self, frequency: f64, origin_frequency: f64) -> f64 {
        -(frequency / origin_frequency).log2() * self.octave_height
    }
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Summary of one sync, for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub instances: usize,
    pub measures: usize,
    pub skipped: usize,
}

/// Flat arrays of drawable and pickable shapes, in draw order
#[derive(Debug, Clone, Default)]
pub struct SceneCache {
    pub epochs: Epochs,
    layout: SceneLayout,
    instances: Vec<VisualInstance>,
    index: HashMap<NoteId, usize>,
    measures: Vec<MeasureMarker>,
    measure_index: HashMap<NoteId, usize>,
    origin: Option<OriginMarker>,
    selection: Option<NoteId>,
    origin_frequency: f64,
}

impl SceneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild every array from the model.
    ///
    /// Bumps the position and topology epochs on every call. The text
    /// epoch is bumped only when some label string changed.
    pub fn sync(
        &mut self,
        model: &dyn NoteModel,
        selection: Option<NoteId>,
        config: &EngineConfig,
    ) -> SyncReport {
        let layout = SceneLayout::from_config(config);
        let mut report = SyncReport::default();
        let mut instances = Vec::new();
        let mut measures = Vec::new();
        let mut origin = None;

        // Origin first: every lane is placed relative to its frequency
        let origin_id = model.origin();
        let origin_frequency = match NoteKind::resolve(model, origin_id) {
            Some(NoteKind::Origin { start, frequency }) => {
                origin = Some(OriginMarker {
                    id: origin_id,
                    start,
                    frequency,
                    center: Point::new(layout.world_x(start), 0.0),
                });
                frequency
            }
            _ => crate::settings::layout::DEFAULT_ORIGIN_FREQUENCY,
        };

        for id in model.note_ids() {
            if id == origin_id {
                continue;
            }
            let Some(kind) = NoteKind::resolve(model, id) else {
                tracing::warn!("Skipping note {} with missing attributes", id);
                report.skipped += 1;
                continue;
            };

            match kind {
                NoteKind::Measure { start } => measures.push(MeasureMarker {
                    id,
                    start,
                    world_x: layout.world_x(start),
                }),
                NoteKind::Playable {
                    start,
                    duration,
                    frequency,
                } => {
                    let lane = match frequency {
                        Some(f) => layout.world_y(f, origin_frequency),
                        None => 0.0,
                    };
                    let mut flags = InstanceFlags::NONE;
                    if frequency.is_none() {
                        flags.insert(InstanceFlags::SILENT);
                    }
                    let color = if frequency.is_none() {
                        theme::note::SILENT_FILL
                    } else {
                        model
                            .variable(id, Variable::Color)
                            .and_then(|v| v.as_color())
                            .unwrap_or(theme::note::FILL)
                    };
                    let label = label::beats_label(duration / model.beat_length(id));
                    instances.push(VisualInstance {
                        id,
                        position: Point::new(
                            layout.world_x(start),
                            lane - layout.note_height * 0.5,
                        ),
                        size: Size::new(layout.world_x(duration), layout.note_height),
                        color,
                        flags,
                        kind,
                        label,
                    });
                }
                NoteKind::Origin { .. } => {}
            }
        }

        // Selection is drawn last; the sort is stable so the rest keep
        // model order
        if let Some(selected) = selection {
            instances.sort_by_key(|inst| inst.id == selected);
            if let Some(inst) = instances.last_mut().filter(|inst| inst.id == selected) {
                inst.flags.insert(InstanceFlags::SELECTED);
            }
        }
        measures.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.id.cmp(&b.id)));

        let labels_changed = self.instances.len() != instances.len()
            || self
                .instances
                .iter()
                .zip(&instances)
                .any(|(old, new)| old.id != new.id || old.label != new.label);

        report.instances = instances.len();
        report.measures = measures.len();

        self.layout = layout;
        self.origin_frequency = origin_frequency;
        self.index = instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (inst.id, i))
            .collect();
        self.measure_index = measures
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id, i))
            .collect();
        self.instances = instances;
        self.measures = measures;
        self.origin = origin;
        self.selection = selection;

        self.epochs.bump(EpochKind::Position);
        self.epochs.bump(EpochKind::Topology);
        if labels_changed {
            self.epochs.bump(EpochKind::Text);
        }

        tracing::debug!(
            "Scene sync: {} notes, {} measures, {} skipped",
            report.instances,
            report.measures,
            report.skipped
        );
        report
    }

    /// Move one note or measure in place.
    ///
    /// `duration` is ignored for measures. Draw order is unchanged and
    /// only the position epoch is bumped. Returns false for unknown ids.
    pub fn preview_position(&mut self, id: NoteId, start: f64, duration: Option<f64>) -> bool {
        let layout = self.layout;
        if let Some(&i) = self.index.get(&id) {
            let inst = &mut self.instances[i];
            inst.position.x = layout.world_x(start);
            if let Some(duration) = duration {
                inst.size.width = layout.world_x(duration);
            }
            if let NoteKind::Playable {
                start: s,
                duration: d,
                ..
            } = &mut inst.kind
            {
                *s = start;
                if let Some(duration) = duration {
                    *d = duration;
                }
            }
        } else if let Some(&i) = self.measure_index.get(&id) {
            let marker = &mut self.measures[i];
            marker.start = start;
            marker.world_x = layout.world_x(start);
        } else {
            return false;
        }
        self.epochs.bump(EpochKind::Position);
        true
    }

    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }

    /// Notes in draw order; the selection, if any, is last
    pub fn instances(&self) -> &[VisualInstance] {
        &self.instances
    }

    /// Measure bars ordered by start time
    pub fn measures(&self) -> &[MeasureMarker] {
        &self.measures
    }

    pub fn origin(&self) -> Option<&OriginMarker> {
        self.origin.as_ref()
    }

    pub fn selection(&self) -> Option<NoteId> {
        self.selection
    }

    pub fn origin_frequency(&self) -> f64 {
        self.origin_frequency
    }

    /// Draw index of a note
    pub fn index_of(&self, id: NoteId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn instance(&self, id: NoteId) -> Option<&VisualInstance> {
        self.index_of(id).map(|i| &self.instances[i])
    }

    pub fn measure(&self, id: NoteId) -> Option<&MeasureMarker> {
        self.measure_index.get(&id).map(|&i| &self.measures[i])
    }

    /// Current start of a note, measure or the origin
    pub fn start_of(&self, id: NoteId) -> Option<f64> {
        if let Some(inst) = self.instance(id) {
            return Some(inst.kind.start());
        }
        if let Some(marker) = self.measure(id) {
            return Some(marker.start);
        }
        self.origin.filter(|o| o.id == id).map(|o| o.start)
    }

    /// Current duration of a note
    pub fn duration_of(&self, id: NoteId) -> Option<f64> {
        match self.instance(id)?.kind {
            NoteKind::Playable { duration, .. } => Some(duration),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.measures.is_empty() && self.origin.is_none()
    }
}
