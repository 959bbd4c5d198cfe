// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! In-memory note model.
//!
//! Start times are stored as a sum of references to other notes' start
//! times or durations plus an offset in beats. The model renders that
//! form as expression source text, evaluates it on demand, and applies
//! the canvas commit events by rewriting offsets, durations and
//! frequency ratios. Documents load from JSON.

use super::{NoteId, NoteModel, Value, Variable};
use crate::interaction::CommitEvent;
use masonry::vello::peniko::Color;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

/// Evaluation depth after which a reference chain is treated as cyclic
const MAX_EVAL_DEPTH: usize = 256;

/// Errors raised while loading a model document
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse model document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid model document: {0}")]
    Invalid(String),
}

/// Variable a time reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeVariable {
    StartTime,
    Duration,
}

impl From<TimeVariable> for Variable {
    fn from(var: TimeVariable) -> Self {
        match var {
            TimeVariable::StartTime => Variable::StartTime,
            TimeVariable::Duration => Variable::Duration,
        }
    }
}

/// Reference to another note's start time or duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRef {
    pub note: NoteId,
    pub variable: TimeVariable,
}

impl TimeRef {
    pub fn start_of(note: NoteId) -> Self {
        Self {
            note,
            variable: TimeVariable::StartTime,
        }
    }

    pub fn duration_of(note: NoteId) -> Self {
        Self {
            note,
            variable: TimeVariable::Duration,
        }
    }
}

/// Start time as `sum(refs) + beats * beat_length`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeExpr {
    #[serde(default)]
    pub refs: Vec<TimeRef>,
    #[serde(default)]
    pub beats: f64,
}

impl TimeExpr {
    /// Start at the end of `note`
    pub fn after(note: NoteId) -> Self {
        Self {
            refs: vec![TimeRef::start_of(note), TimeRef::duration_of(note)],
            beats: 0.0,
        }
    }

    /// Start `beats` after the start of `note`
    pub fn offset_from(note: NoteId, beats: f64) -> Self {
        Self {
            refs: vec![TimeRef::start_of(note)],
            beats,
        }
    }

    /// Render as expression source text
    pub fn to_source(&self) -> String {
        let mut terms = self.refs.iter().map(|r| {
            if r.note.is_origin() {
                format!("module.baseNote.getVariable('{}')", Variable::from(r.variable).name())
            } else {
                format!(
                    "module.getNoteById({}).getVariable('{}')",
                    r.note.raw(),
                    Variable::from(r.variable).name()
                )
            }
        });

        let mut source = terms.next().unwrap_or_else(|| "new Fraction(0)".to_string());
        for term in terms {
            source = format!("{source}.add({term})");
        }
        if self.beats != 0.0 {
            source = format!("{source}.add(module.beatLength().mul(new Fraction({})))", self.beats);
        }
        source
    }
}

/// Frequency as `ratio * frequency(base)`; the origin when `base` is absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyExpr {
    #[serde(default)]
    pub base: Option<NoteId>,
    pub ratio: f64,
}

/// A note as stored in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredNote {
    pub id: NoteId,
    #[serde(default)]
    pub start: Option<TimeExpr>,
    #[serde(default)]
    pub duration_beats: Option<f64>,
    #[serde(default)]
    pub frequency: Option<FrequencyExpr>,
    /// Fill color as `#rrggbb`
    #[serde(default)]
    pub color: Option<String>,
    /// Verbatim stored source text; takes precedence over the rendered form
    #[serde(default)]
    pub source: Option<String>,
    /// When set the model withholds expression text for this note
    #[serde(default)]
    pub opaque: bool,
}

impl StoredNote {
    fn new(id: NoteId) -> Self {
        Self {
            id,
            start: None,
            duration_beats: None,
            frequency: None,
            color: None,
            source: None,
            opaque: false,
        }
    }

    /// A playable note
    pub fn playable(id: NoteId, start: TimeExpr, duration_beats: f64, frequency: FrequencyExpr) -> Self {
        Self {
            start: Some(start),
            duration_beats: Some(duration_beats),
            frequency: Some(frequency),
            ..Self::new(id)
        }
    }

    /// A rest: start and duration without a frequency
    pub fn silent(id: NoteId, start: TimeExpr, duration_beats: f64) -> Self {
        Self {
            start: Some(start),
            duration_beats: Some(duration_beats),
            ..Self::new(id)
        }
    }

    /// A measure bar: only a start time
    pub fn measure(id: NoteId, start: TimeExpr) -> Self {
        Self {
            start: Some(start),
            ..Self::new(id)
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    fn is_measure(&self) -> bool {
        self.start.is_some() && self.duration_beats.is_none() && self.frequency.is_none()
    }
}

/// Serialized model document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDocument {
    pub tempo: f64,
    pub beats_per_measure: f64,
    pub origin_frequency: f64,
    #[serde(default)]
    pub origin_start: f64,
    pub notes: Vec<StoredNote>,
}

/// In-memory [`NoteModel`]
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryModel {
    tempo: f64,
    beats_per_measure: f64,
    origin_frequency: f64,
    origin_start: f64,
    notes: BTreeMap<NoteId, StoredNote>,
}

impl MemoryModel {
    /// Create an empty model holding only the origin
    pub fn new(tempo: f64, beats_per_measure: f64, origin_frequency: f64) -> Self {
        let mut notes = BTreeMap::new();
        notes.insert(NoteId::ORIGIN, StoredNote::new(NoteId::ORIGIN));
        Self {
            tempo,
            beats_per_measure,
            origin_frequency,
            origin_start: 0.0,
            notes,
        }
    }

    /// Build a model from a document, validating ids and tempo
    pub fn from_document(doc: ModelDocument) -> Result<Self, ModelError> {
        if !(doc.tempo.is_finite() && doc.tempo > 0.0) {
            return Err(ModelError::Invalid(format!("tempo must be positive, got {}", doc.tempo)));
        }
        if !(doc.origin_frequency.is_finite() && doc.origin_frequency > 0.0) {
            return Err(ModelError::Invalid(format!(
                "origin frequency must be positive, got {}",
                doc.origin_frequency
            )));
        }

        let mut model = Self::new(doc.tempo, doc.beats_per_measure, doc.origin_frequency);
        model.origin_start = doc.origin_start;
        for note in doc.notes {
            if note.id.is_origin() {
                continue;
            }
            if model.notes.contains_key(&note.id) {
                return Err(ModelError::Invalid(format!("duplicate note id {}", note.id)));
            }
            model.notes.insert(note.id, note);
        }
        Ok(model)
    }

    /// Parse a JSON document
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let doc: ModelDocument = serde_json::from_str(text)?;
        Self::from_document(doc)
    }

    /// Load a JSON document from disk
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// A short phrase over four measures, used when no file is given
    pub fn demo() -> Self {
        let mut model = Self::new(120.0, 4.0, 261.63);
        let origin = NoteId::ORIGIN;

        // Measure bars chained one measure apart
        let mut previous = origin;
        for raw in 1..=4 {
            let id = NoteId::new(raw);
            let start = if previous.is_origin() {
                TimeExpr::offset_from(origin, 0.0)
            } else {
                TimeExpr::offset_from(previous, 4.0)
            };
            model.insert(StoredNote::measure(id, start));
            previous = id;
        }

        let root = |ratio: f64| FrequencyExpr {
            base: None,
            ratio,
        };
        let over = |base: u32, ratio: f64| FrequencyExpr {
            base: Some(NoteId::new(base)),
            ratio,
        };

        model.insert(
            StoredNote::playable(NoteId::new(10), TimeExpr::offset_from(origin, 0.0), 1.0, root(1.0))
                .with_color("#579aff"),
        );
        model.insert(
            StoredNote::playable(NoteId::new(11), TimeExpr::after(NoteId::new(10)), 1.0, over(10, 1.25))
                .with_color("#6ae756"),
        );
        model.insert(
            StoredNote::playable(NoteId::new(12), TimeExpr::after(NoteId::new(11)), 2.0, over(10, 1.5))
                .with_color("#cc99ff"),
        );
        model.insert(StoredNote::silent(NoteId::new(13), TimeExpr::after(NoteId::new(12)), 1.0));
        model.insert(
            StoredNote::playable(NoteId::new(14), TimeExpr::offset_from(NoteId::new(2), 0.0), 0.5, over(12, 2.0 / 3.0))
                .with_color("#ffaa33"),
        );
        model.insert(
            StoredNote::playable(NoteId::new(15), TimeExpr::after(NoteId::new(14)), 1.5, over(14, 0.75))
                .with_color("#66ccdd"),
        );
        model
    }

    /// Insert or replace a note
    pub fn insert(&mut self, note: StoredNote) {
        self.notes.insert(note.id, note);
    }

    /// Remove a note; the origin cannot be removed
    pub fn remove(&mut self, id: NoteId) -> Option<StoredNote> {
        if id.is_origin() {
            return None;
        }
        self.notes.remove(&id)
    }

    pub fn note(&self, id: NoteId) -> Option<&StoredNote> {
        self.notes.get(&id)
    }

    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut StoredNote> {
        self.notes.get_mut(&id)
    }

    /// Number of stored notes, including the origin
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Number of notes other than the origin
    pub fn note_count(&self) -> usize {
        self.notes.keys().filter(|id| !id.is_origin()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    fn beat(&self) -> f64 {
        60.0 / self.tempo
    }

    /// Apply a commit event; returns false when it does not apply
    pub fn apply_commit(&mut self, event: &CommitEvent) -> bool {
        match *event {
            CommitEvent::NoteMove { id, new_start } | CommitEvent::MeasureResize { id, new_start } => {
                self.move_start(id, new_start)
            }
            CommitEvent::NoteResize { id, new_duration } => {
                let beat = self.beat();
                match self.notes.get_mut(&id) {
                    Some(note) if note.duration_beats.is_some() && new_duration > 0.0 => {
                        note.duration_beats = Some(new_duration / beat);
                        true
                    }
                    _ => false,
                }
            }
            CommitEvent::OctaveChange { id, direction } => match self.notes.get_mut(&id) {
                Some(StoredNote {
                    frequency: Some(freq),
                    ..
                }) => {
                    freq.ratio *= direction.ratio();
                    true
                }
                _ => false,
            },
        }
    }

    fn move_start(&mut self, id: NoteId, new_start: f64) -> bool {
        let Some(current) = self.start_time(id) else {
            return false;
        };
        let beat = self.beat();
        match self.notes.get_mut(&id) {
            Some(StoredNote {
                start: Some(expr),
                source,
                ..
            }) => {
                expr.beats += (new_start - current) / beat;
                // Stored text no longer matches the structured form
                *source = None;
                true
            }
            _ => false,
        }
    }

    fn start_time(&self, id: NoteId) -> Option<f64> {
        self.start_time_memo(id, 0, &mut HashMap::new())
    }

    /// Start time with every intermediate result memoized for the
    /// duration of one query, so shared references are evaluated once
    fn start_time_memo(
        &self,
        id: NoteId,
        depth: usize,
        memo: &mut HashMap<NoteId, Option<f64>>,
    ) -> Option<f64> {
        if let Some(&known) = memo.get(&id) {
            return known;
        }
        if depth > MAX_EVAL_DEPTH {
            tracing::warn!("Start time of {} exceeds evaluation depth", id);
            return None;
        }
        let value = if id.is_origin() {
            Some(self.origin_start)
        } else {
            self.evaluate_start(id, depth, memo)
        };
        memo.insert(id, value);
        value
    }

    fn evaluate_start(
        &self,
        id: NoteId,
        depth: usize,
        memo: &mut HashMap<NoteId, Option<f64>>,
    ) -> Option<f64> {
        let expr = self.notes.get(&id)?.start.as_ref()?;
        let mut total = expr.beats * self.beat();
        for r in &expr.refs {
            total += match r.variable {
                TimeVariable::StartTime => self.start_time_memo(r.note, depth + 1, memo)?,
                TimeVariable::Duration => self.duration(r.note)?,
            };
        }
        Some(total)
    }

    fn duration(&self, id: NoteId) -> Option<f64> {
        self.notes
            .get(&id)?
            .duration_beats
            .map(|beats| beats * self.beat())
    }

    fn frequency(&self, id: NoteId, depth: usize) -> Option<f64> {
        if depth > MAX_EVAL_DEPTH {
            return None;
        }
        if id.is_origin() {
            return Some(self.origin_frequency);
        }
        let freq = self.notes.get(&id)?.frequency.as_ref()?;
        let base = match freq.base {
            Some(base) => self.frequency(base, depth + 1)?,
            None => self.origin_frequency,
        };
        Some(base * freq.ratio)
    }

    fn references(note: &StoredNote) -> BTreeSet<NoteId> {
        let mut refs: BTreeSet<NoteId> = note
            .start
            .iter()
            .flat_map(|expr| expr.refs.iter().map(|r| r.note))
            .collect();
        if let Some(base) = note.frequency.as_ref().and_then(|f| f.base) {
            refs.insert(base);
        }
        refs.remove(&note.id);
        refs
    }
}

impl NoteModel for MemoryModel {
    fn note_ids(&self) -> Vec<NoteId> {
        self.notes.keys().copied().collect()
    }

    fn has_note(&self, id: NoteId) -> bool {
        self.notes.contains_key(&id)
    }

    fn variable(&self, id: NoteId, variable: Variable) -> Option<Value> {
        if !self.notes.contains_key(&id) {
            return None;
        }
        match variable {
            Variable::StartTime => self.start_time(id).map(Value::Number),
            Variable::Duration => self.duration(id).map(Value::Number),
            Variable::Frequency => self.frequency(id, 0).map(Value::Number),
            Variable::Color => self
                .notes
                .get(&id)?
                .color
                .as_deref()
                .and_then(parse_hex_color)
                .map(Value::Color),
        }
    }

    fn start_expression(&self, id: NoteId) -> Option<String> {
        let note = self.notes.get(&id)?;
        if note.opaque {
            return None;
        }
        if let Some(source) = &note.source {
            return Some(source.clone());
        }
        note.start.as_ref().map(TimeExpr::to_source)
    }

    fn direct_dependencies(&self, id: NoteId) -> Vec<NoteId> {
        self.notes
            .get(&id)
            .map(|note| Self::references(note).into_iter().collect())
            .unwrap_or_default()
    }

    fn dependent_notes(&self, id: NoteId) -> Vec<NoteId> {
        self.notes
            .values()
            .filter(|note| Self::references(note).contains(&id))
            .map(|note| note.id)
            .collect()
    }

    fn measure_length(&self, id: NoteId) -> Option<f64> {
        let note = self.notes.get(&id)?;
        if note.is_measure() || id.is_origin() {
            Some(self.beats_per_measure * self.beat())
        } else {
            None
        }
    }

    fn tempo(&self, _id: NoteId) -> f64 {
        self.tempo
    }
}

/// Parse `#rrggbb` or `#rrggbbaa`
pub fn parse_hex_color(text: &str) -> Option<Color> {
    let hex = text.strip_prefix('#')?;
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some(Color::from_rgb8(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::OctaveDirection;

    fn id(raw: u32) -> NoteId {
        NoteId::new(raw)
    }

    fn chain_model() -> MemoryModel {
        // tempo 120 => beat = 0.5s
        let mut model = MemoryModel::new(120.0, 4.0, 440.0);
        let freq = FrequencyExpr {
            base: None,
            ratio: 1.0,
        };
        model.insert(StoredNote::playable(id(1), TimeExpr::offset_from(NoteId::ORIGIN, 4.0), 2.0, freq.clone()));
        model.insert(StoredNote::playable(id(2), TimeExpr::after(id(1)), 1.0, freq.clone()));
        model.insert(StoredNote::playable(
            id(3),
            TimeExpr::after(id(2)),
            1.0,
            FrequencyExpr {
                base: Some(id(2)),
                ratio: 1.5,
            },
        ));
        model
    }

    #[test]
    fn test_evaluates_chained_start_times() {
        let model = chain_model();
        assert_eq!(model.number(id(1), Variable::StartTime), Some(2.0));
        assert_eq!(model.number(id(1), Variable::Duration), Some(1.0));
        assert_eq!(model.number(id(2), Variable::StartTime), Some(3.0));
        assert_eq!(model.number(id(3), Variable::StartTime), Some(3.5));
        assert_eq!(model.number(id(3), Variable::Frequency), Some(660.0));
    }

    #[test]
    fn test_origin_variables() {
        let model = chain_model();
        assert_eq!(model.number(NoteId::ORIGIN, Variable::StartTime), Some(0.0));
        assert_eq!(model.number(NoteId::ORIGIN, Variable::Frequency), Some(440.0));
        assert_eq!(model.number(NoteId::ORIGIN, Variable::Duration), None);
    }

    #[test]
    fn test_start_expression_source() {
        let model = chain_model();
        let source = model.start_expression(id(2)).unwrap();
        assert_eq!(
            source,
            "module.getNoteById(1).getVariable('startTime')\
             .add(module.getNoteById(1).getVariable('duration'))"
        );
        let origin_source = model.start_expression(id(1)).unwrap();
        assert!(origin_source.starts_with("module.baseNote.getVariable('startTime')"));
    }

    #[test]
    fn test_opaque_note_has_no_expression() {
        let mut model = chain_model();
        model.note_mut(id(2)).unwrap().opaque = true;
        assert_eq!(model.start_expression(id(2)), None);
        assert_eq!(model.direct_dependencies(id(2)), vec![id(1)]);
    }

    #[test]
    fn test_dependency_queries() {
        let model = chain_model();
        assert_eq!(model.direct_dependencies(id(3)), vec![id(2)]);
        assert_eq!(model.dependent_notes(id(1)), vec![id(2)]);
        assert_eq!(model.dependent_notes(NoteId::ORIGIN), vec![id(1)]);
    }

    #[test]
    fn test_apply_move_shifts_dependents() {
        let mut model = chain_model();
        assert!(model.apply_commit(&CommitEvent::NoteMove {
            id: id(1),
            new_start: 2.25,
        }));
        assert_eq!(model.number(id(1), Variable::StartTime), Some(2.25));
        assert_eq!(model.number(id(3), Variable::StartTime), Some(3.75));
    }

    #[test]
    fn test_apply_resize_and_octave() {
        let mut model = chain_model();
        assert!(model.apply_commit(&CommitEvent::NoteResize {
            id: id(2),
            new_duration: 1.5,
        }));
        assert_eq!(model.number(id(2), Variable::Duration), Some(1.5));
        assert!(model.apply_commit(&CommitEvent::OctaveChange {
            id: id(3),
            direction: OctaveDirection::Down,
        }));
        assert_eq!(model.number(id(3), Variable::Frequency), Some(330.0));
    }

    #[test]
    fn test_commit_on_unknown_note_is_rejected() {
        let mut model = chain_model();
        assert!(!model.apply_commit(&CommitEvent::NoteMove {
            id: id(99),
            new_start: 1.0,
        }));
    }

    #[test]
    fn test_cycle_does_not_overflow() {
        let mut model = chain_model();
        model.insert(StoredNote::silent(id(7), TimeExpr::after(id(8)), 1.0));
        model.insert(StoredNote::silent(id(8), TimeExpr::after(id(7)), 1.0));
        assert_eq!(model.number(id(7), Variable::StartTime), None);
    }

    #[test]
    fn test_json_round_trip_document() {
        let json = r##"{
            "tempo": 90,
            "beatsPerMeasure": 3,
            "originFrequency": 220,
            "notes": [
                { "id": 1, "start": { "refs": [ { "note": 0, "variable": "startTime" } ], "beats": 1 },
                  "durationBeats": 1, "frequency": { "ratio": 2 }, "color": "#ff0000" }
            ]
        }"##;
        let model = MemoryModel::from_json(json).unwrap();
        assert_eq!(model.tempo(id(1)), 90.0);
        assert_eq!(model.number(id(1), Variable::Duration), Some(2.0 / 3.0));
        assert_eq!(model.number(id(1), Variable::Frequency), Some(440.0));
        assert_eq!(
            model.variable(id(1), Variable::Color),
            Some(Value::Color(Color::from_rgb8(0xff, 0, 0)))
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{ "tempo": 60, "beatsPerMeasure": 4, "originFrequency": 440,
            "notes": [ { "id": 1 }, { "id": 1 } ] }"#;
        assert!(matches!(MemoryModel::from_json(json), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn test_measure_length() {
        let mut model = chain_model();
        model.insert(StoredNote::measure(id(20), TimeExpr::offset_from(NoteId::ORIGIN, 0.0)));
        assert_eq!(model.measure_length(id(20)), Some(2.0));
        assert_eq!(model.measure_length(id(1)), None);
    }

    #[test]
    fn test_demo_model_is_consistent() {
        let model = MemoryModel::demo();
        for note in model.note_ids() {
            if note.is_origin() {
                continue;
            }
            assert!(model.number(note, Variable::StartTime).is_some(), "{note}");
        }
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#102030"), Some(Color::from_rgb8(0x10, 0x20, 0x30)));
        assert_eq!(parse_hex_color("102030"), None);
        assert_eq!(parse_hex_color("#12"), None);
    }

    #[test]
    fn test_shared_references_evaluate_once_per_query() {
        // Each level starts at the sum of both notes of the level below
        // plus one beat, so an unmemoized walk would visit 2^40 paths.
        const LEVELS: u32 = 40;
        let mut model = MemoryModel::new(60.0, 4.0, 440.0);
        for level in 0..LEVELS {
            let below = if level == 0 {
                vec![TimeRef::start_of(NoteId::ORIGIN)]
            } else {
                vec![
                    TimeRef::start_of(id(2 * level - 1)),
                    TimeRef::start_of(id(2 * level)),
                ]
            };
            for raw in [2 * level + 1, 2 * level + 2] {
                let start = TimeExpr {
                    refs: below.clone(),
                    beats: 1.0,
                };
                model.insert(StoredNote::silent(id(raw), start, 1.0));
            }
        }
        // s(0) = 1, s(k) = 2 s(k - 1) + 1
        let top = id(2 * LEVELS);
        let expected = 2f64.powi(LEVELS as i32) - 1.0;
        assert_eq!(model.number(top, Variable::StartTime), Some(expected));
    }

    #[test]
    fn test_note_count_excludes_origin() {
        let model = chain_model();
        assert_eq!(model.len(), 4);
        assert_eq!(model.note_count(), 3);
        assert_eq!(MemoryModel::new(60.0, 4.0, 440.0).note_count(), 0);
    }
}
