// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Read-only view of the note model.
//!
//! The evaluation model (rational arithmetic, expressions, tempo and
//! measure lookups) lives outside the canvas core. The core only talks to
//! it through [`NoteModel`]; [`MemoryModel`] is a small in-process
//! implementation used by the demo application and the tests.

pub mod memory;
pub mod note_id;

pub use memory::MemoryModel;
pub use note_id::NoteId;

use masonry::vello::peniko::Color;

/// A named, evaluated attribute of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    StartTime,
    Duration,
    Frequency,
    Color,
}

impl Variable {
    /// Name as it appears in stored expressions
    pub fn name(self) -> &'static str {
        match self {
            Variable::StartTime => "startTime",
            Variable::Duration => "duration",
            Variable::Frequency => "frequency",
            Variable::Color => "color",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "startTime" => Some(Variable::StartTime),
            "duration" => Some(Variable::Duration),
            "frequency" => Some(Variable::Frequency),
            "color" => Some(Variable::Color),
            _ => None,
        }
    }
}

/// An evaluated variable value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Color(Color),
}

impl Value {
    pub fn as_number(self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(n),
            _ => None,
        }
    }

    pub fn as_color(self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(c),
            Value::Number(_) => None,
        }
    }
}

/// Queries the canvas core needs from the note model
pub trait NoteModel {
    /// All note ids, in ascending order
    fn note_ids(&self) -> Vec<NoteId>;

    /// Whether a note with this id exists
    fn has_note(&self, id: NoteId) -> bool;

    /// Evaluated value of a note attribute, if the note defines it
    fn variable(&self, id: NoteId, variable: Variable) -> Option<Value>;

    /// Source text of the note's stored start-time expression.
    ///
    /// `None` means the model does not expose expression text for this
    /// note; callers should fall back to [`NoteModel::direct_dependencies`].
    fn start_expression(&self, id: NoteId) -> Option<String>;

    /// Notes this note's expressions reference directly
    fn direct_dependencies(&self, id: NoteId) -> Vec<NoteId>;

    /// Notes whose expressions reference this note directly
    fn dependent_notes(&self, id: NoteId) -> Vec<NoteId>;

    /// Length in seconds of the measure a measure note opens
    fn measure_length(&self, id: NoteId) -> Option<f64>;

    /// Tempo in beats per minute in effect for a note
    fn tempo(&self, id: NoteId) -> f64;

    /// The origin note
    fn origin(&self) -> NoteId {
        NoteId::ORIGIN
    }

    /// Numeric variable shortcut
    fn number(&self, id: NoteId, variable: Variable) -> Option<f64> {
        self.variable(id, variable).and_then(Value::as_number)
    }

    /// Length of one beat in seconds for a note
    fn beat_length(&self, id: NoteId) -> f64 {
        let tempo = self.tempo(id);
        if tempo.is_finite() && tempo > 0.0 {
            60.0 / tempo
        } else {
            60.0 / crate::settings::layout::DEFAULT_TEMPO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_names_round_trip() {
        for var in [
            Variable::StartTime,
            Variable::Duration,
            Variable::Frequency,
            Variable::Color,
        ] {
            assert_eq!(Variable::from_name(var.name()), Some(var));
        }
        assert_eq!(Variable::from_name("tempo"), None);
    }

    #[test]
    fn test_non_finite_number_is_none() {
        assert_eq!(Value::Number(f64::NAN).as_number(), None);
        assert_eq!(Value::Number(2.0).as_number(), Some(2.0));
    }
}
