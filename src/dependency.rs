// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Dependency closure for live preview.
//!
//! Edges are not stored anywhere. They are recovered either by scanning a
//! note's start-time expression text for `getNoteById(N).getVariable('v')`
//! and `baseNote.getVariable('v')` references, or, for notes whose text
//! the model does not expose, from the model's own dependency queries.
//!
//! The scan is syntactic and best effort: a reference written in a form
//! the pattern does not recognize is silently missed.

use crate::config::ClosureStrategy;
use crate::model::{NoteId, NoteModel, Variable};
use regex::Regex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::LazyLock;
use thiserror::Error;

static NOTE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"getNoteById\(\s*([^)\s]*)\s*\)\s*\.getVariable\(\s*['"]([A-Za-z]+)['"]\s*\)"#,
    )
    .expect("note reference regex")
});

static BASE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"baseNote\s*\.getVariable\(\s*['"]([A-Za-z]+)['"]\s*\)"#)
        .expect("base reference regex")
});

/// Why an expression could not be scanned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("unbalanced parentheses at byte {0}")]
    Unbalanced(usize),
    #[error("invalid note id `{0}`")]
    BadId(String),
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
}

/// A reference from an expression to another note's variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub note: NoteId,
    pub variable: Variable,
}

/// Which of the anchor's variables is changing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureKind {
    /// The anchor's start time moves
    StartTime,
    /// The anchor's duration changes
    Duration,
}

impl ClosureKind {
    fn variable(self) -> Variable {
        match self {
            ClosureKind::StartTime => Variable::StartTime,
            ClosureKind::Duration => Variable::Duration,
        }
    }
}

/// Find every note-variable reference in an expression.
///
/// `origin` is the id `baseNote` refers to.
pub fn scan_references(expr: &str, origin: NoteId) -> Result<Vec<Reference>, ScanError> {
    check_balanced(expr)?;

    let mut refs = Vec::new();
    for caps in NOTE_REF.captures_iter(expr) {
        let raw = &caps[1];
        let note = raw
            .parse::<NoteId>()
            .map_err(|_| ScanError::BadId(raw.to_string()))?;
        refs.push(Reference {
            note,
            variable: parse_variable(&caps[2])?,
        });
    }
    for caps in BASE_REF.captures_iter(expr) {
        refs.push(Reference {
            note: origin,
            variable: parse_variable(&caps[1])?,
        });
    }
    Ok(refs)
}

fn parse_variable(name: &str) -> Result<Variable, ScanError> {
    Variable::from_name(name).ok_or_else(|| ScanError::UnknownVariable(name.to_string()))
}

/// Parentheses outside of quoted strings must nest
fn check_balanced(expr: &str) -> Result<(), ScanError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut last_open = 0;
    for (pos, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => {
                depth += 1;
                last_open = pos;
            }
            (None, ')') => {
                depth = depth.checked_sub(1).ok_or(ScanError::Unbalanced(pos))?;
            }
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(ScanError::Unbalanced(last_open))
    }
}

/// Resolved references of every note, computed once per query
struct ReferenceTable {
    refs: HashMap<NoteId, Vec<Reference>>,
}

impl ReferenceTable {
    fn build(model: &dyn NoteModel) -> Self {
        let origin = model.origin();
        let mut refs = HashMap::new();
        for id in model.note_ids() {
            if id == origin {
                continue;
            }
            match model.start_expression(id) {
                Some(text) => match scan_references(&text, origin) {
                    Ok(found) => {
                        refs.insert(id, found);
                    }
                    Err(err) => {
                        tracing::debug!("Excluding {} from dependency scan: {}", id, err);
                    }
                },
                None => {
                    // No text to scan: trust the model, on either variable
                    let found = model
                        .direct_dependencies(id)
                        .into_iter()
                        .flat_map(|note| {
                            [Variable::StartTime, Variable::Duration]
                                .map(|variable| Reference { note, variable })
                        })
                        .collect();
                    refs.insert(id, found);
                }
            }
        }
        Self { refs }
    }

    fn references(&self, id: NoteId, target: NoteId, variable: Variable) -> bool {
        self.refs
            .get(&id)
            .is_some_and(|refs| refs.iter().any(|r| r.note == target && r.variable == variable))
    }
}

/// Transitive set of notes whose start moves when the anchor's start
/// (or duration) changes. Never contains the anchor.
pub fn closure_of(
    model: &dyn NoteModel,
    anchor: NoteId,
    kind: ClosureKind,
    strategy: ClosureStrategy,
) -> BTreeSet<NoteId> {
    let closure = match strategy {
        ClosureStrategy::Blended => scan_closure(model, anchor, kind),
        ClosureStrategy::Authoritative => query_closure(model, anchor),
    };
    tracing::trace!("closure of {} ({:?}): {} notes", anchor, kind, closure.len());
    closure
}

fn scan_closure(model: &dyn NoteModel, anchor: NoteId, kind: ClosureKind) -> BTreeSet<NoteId> {
    let table = ReferenceTable::build(model);
    let mut ids: Vec<NoteId> = table.refs.keys().copied().filter(|id| *id != anchor).collect();
    ids.sort();

    let mut closure: BTreeSet<NoteId> = ids
        .iter()
        .copied()
        .filter(|id| table.references(*id, anchor, kind.variable()))
        .collect();

    // A member's start moves, so anything anchored on a member's start
    // moves too. Each pass either grows the set or ends the loop.
    loop {
        let added: Vec<NoteId> = ids
            .iter()
            .copied()
            .filter(|id| !closure.contains(id))
            .filter(|id| {
                closure
                    .iter()
                    .any(|member| table.references(*id, *member, Variable::StartTime))
            })
            .collect();
        if added.is_empty() {
            break;
        }
        closure.extend(added);
    }
    closure
}

fn query_closure(model: &dyn NoteModel, anchor: NoteId) -> BTreeSet<NoteId> {
    let mut closure = BTreeSet::new();
    let mut queue: VecDeque<NoteId> = model.dependent_notes(anchor).into();
    while let Some(id) = queue.pop_front() {
        if id == anchor || !closure.insert(id) {
            continue;
        }
        queue.extend(model.dependent_notes(id));
    }
    closure
}

/// The note whose start a note's own start is expressed against.
///
/// The first start-time reference in the expression when there is one,
/// otherwise the first direct dependency, otherwise the origin.
pub fn parent_of(model: &dyn NoteModel, id: NoteId) -> NoteId {
    let origin = model.origin();
    if let Some(text) = model.start_expression(id) {
        if let Ok(refs) = scan_references(&text, origin) {
            if let Some(r) = refs.iter().find(|r| r.variable == Variable::StartTime) {
                return r.note;
            }
        }
    }
    model
        .direct_dependencies(id)
        .into_iter()
        .next()
        .unwrap_or(origin)
}
