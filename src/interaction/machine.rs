// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Transition function of the interaction state machine.
//!
//! `Idle -> {Move, Resize, OctaveShift, MeasureDrag} -> Idle`
//!
//! Every preview is computed as `baseline + delta` from the snapshot taken
//! at press time, never from the previous frame, so repeated moves cannot
//! drift. Ending a session always asks for a re-sync.

use super::attach::attach_target;
use super::snap::Snapper;
use super::{
    ActiveSession, Baseline, CommitEvent, Effect, InputEvent, OctaveDirection, PreviewUpdate,
    Session, SessionKind,
};
use crate::config::EngineConfig;
use crate::dependency::{ClosureKind, closure_of, parent_of};
use crate::geometry::ViewState;
use crate::model::{NoteId, NoteModel, Variable};
use crate::picking::{Hit, HitKind, SubRegion};
use crate::scene::SceneCache;
use kurbo::Point;
use std::collections::{BTreeMap, BTreeSet};

/// Read-only inputs a transition may consult
#[derive(Clone, Copy)]
pub struct TransitionContext<'a> {
    pub model: &'a dyn NoteModel,
    pub scene: &'a SceneCache,
    pub view: &'a ViewState,
    pub config: &'a EngineConfig,
}

impl TransitionContext<'_> {
    fn origin_start(&self) -> f64 {
        self.scene.origin().map(|o| o.start).unwrap_or(0.0)
    }

    fn snapper(&self, anchor: NoteId) -> Snapper {
        Snapper::new(
            self.model.beat_length(anchor),
            self.config.snap_divisions_per_beat,
            self.origin_start(),
        )
    }

    fn world_x(&self, screen: Point) -> f64 {
        self.view.screen_to_world(screen).x
    }

    fn baseline_of(&self, id: NoteId) -> Option<Baseline> {
        Some(Baseline {
            start: self.scene.start_of(id)?,
            duration: self.scene.duration_of(id),
        })
    }
}

/// Advance the machine by one input event
pub fn transition(
    session: Session,
    event: &InputEvent,
    ctx: &TransitionContext<'_>,
) -> (Session, Vec<Effect>) {
    match (session, *event) {
        (Session::Idle, InputEvent::PointerDown { position, hit }) => begin(position, hit, ctx),
        (Session::Idle, _) => (Session::Idle, Vec::new()),
        (Session::Active(active), InputEvent::PointerDown { .. }) => {
            tracing::debug!("Ignoring press while a {:?} session is active", active.kind);
            (Session::Active(active), Vec::new())
        }
        (Session::Active(active), InputEvent::PointerMove { position }) => drag(active, position, ctx),
        (Session::Active(active), InputEvent::PointerUp { position }) => finish(active, position, ctx),
        (Session::Active(active), InputEvent::PointerCancel) => {
            tracing::info!("{:?} of {} cancelled", active.kind, active.anchor);
            (Session::Idle, end_effects(None))
        }
    }
}

fn begin(position: Point, hit: Option<Hit>, ctx: &TransitionContext<'_>) -> (Session, Vec<Effect>) {
    let Some(hit) = hit else {
        return (Session::Idle, vec![Effect::Select(None)]);
    };

    let kind = match hit.kind {
        HitKind::Origin => return (Session::Idle, vec![Effect::Select(None)]),
        HitKind::Measure => SessionKind::MeasureDrag,
        HitKind::Note => match hit.sub_region.unwrap_or(SubRegion::Body) {
            SubRegion::Body => SessionKind::Move,
            SubRegion::Tab => SessionKind::Resize,
            SubRegion::OctaveUp => SessionKind::OctaveShift(OctaveDirection::Up),
            SubRegion::OctaveDown => SessionKind::OctaveShift(OctaveDirection::Down),
        },
    };

    let mut effects = Vec::new();
    if hit.kind == HitKind::Note {
        effects.push(Effect::Select(Some(hit.id)));
    }

    let anchor = hit.id;
    let Some(anchor_base) = ctx.baseline_of(anchor) else {
        tracing::warn!("Press on {} which is not in the scene", anchor);
        return (Session::Idle, effects);
    };

    let press_x = ctx.world_x(position);
    let layout = ctx.scene.layout();
    let pointer_offset = match kind {
        SessionKind::Move | SessionKind::MeasureDrag => layout.world_x(anchor_base.start) - press_x,
        SessionKind::Resize => {
            layout.world_x(anchor_base.start + anchor_base.duration.unwrap_or(0.0)) - press_x
        }
        SessionKind::OctaveShift(_) => 0.0,
    };

    let floor = match kind {
        SessionKind::Move => {
            let parent = parent_of(ctx.model, anchor);
            ctx.scene
                .start_of(parent)
                .or_else(|| ctx.model.number(parent, Variable::StartTime))
                .unwrap_or_else(|| ctx.origin_start())
        }
        SessionKind::Resize => ctx.snapper(anchor).step(),
        SessionKind::MeasureDrag => measure_floor(ctx, anchor),
        SessionKind::OctaveShift(_) => 0.0,
    };

    let mut baseline = BTreeMap::new();
    baseline.insert(anchor, anchor_base);

    let mut active = ActiveSession {
        kind,
        anchor,
        baseline,
        pointer_offset,
        press: position,
        value: 0.0,
        floor,
        closure: BTreeSet::new(),
        attach: None,
    };
    active.value = active.baseline_value();
    refresh_closure(&mut active, ctx);

    if active.kind == SessionKind::Move {
        active.attach = attach_target(ctx.scene, anchor, &active.closure, active.value);
    }
    if !matches!(kind, SessionKind::OctaveShift(_)) {
        effects.push(Effect::Highlight {
            dependents: active.closure.clone(),
            attach: active.attach,
        });
    }

    tracing::info!(
        "{:?} of {} started ({} dependents)",
        kind,
        anchor,
        active.closure.len()
    );
    (Session::Active(active), effects)
}

fn drag(mut active: ActiveSession, position: Point, ctx: &TransitionContext<'_>) -> (Session, Vec<Effect>) {
    if matches!(active.kind, SessionKind::OctaveShift(_)) {
        return (Session::Active(active), Vec::new());
    }

    let value = candidate_value(&active, position, ctx);
    let previous = active.closure.clone();
    refresh_closure(&mut active, ctx);
    if value == active.value && previous == active.closure {
        return (Session::Active(active), Vec::new());
    }
    active.value = value;

    let updates = preview_updates(&active, &previous);
    if active.kind == SessionKind::Move {
        active.attach = attach_target(ctx.scene, active.anchor, &active.closure, value);
    }
    tracing::trace!("{:?} of {} -> {:.4}", active.kind, active.anchor, value);

    let effects = vec![
        Effect::Preview(updates),
        Effect::Highlight {
            dependents: active.closure.clone(),
            attach: active.attach,
        },
    ];
    (Session::Active(active), effects)
}

fn finish(active: ActiveSession, position: Point, ctx: &TransitionContext<'_>) -> (Session, Vec<Effect>) {
    let commit = match active.kind {
        SessionKind::OctaveShift(direction) => {
            within_slop(&active, position, ctx.config).then_some(CommitEvent::OctaveChange {
                id: active.anchor,
                direction,
            })
        }
        kind => {
            let value = candidate_value(&active, position, ctx);
            let moved = (value - active.baseline_value()).abs() > ctx.config.commit_epsilon;
            moved.then(|| match kind {
                SessionKind::Resize => CommitEvent::NoteResize {
                    id: active.anchor,
                    new_duration: value,
                },
                SessionKind::MeasureDrag => CommitEvent::MeasureResize {
                    id: active.anchor,
                    new_start: value,
                },
                _ => CommitEvent::NoteMove {
                    id: active.anchor,
                    new_start: value,
                },
            })
        }
    };

    match &commit {
        Some(event) => tracing::info!("Commit: {}", event),
        None => tracing::debug!("{:?} of {} ended without change", active.kind, active.anchor),
    }
    (Session::Idle, end_effects(commit))
}

fn end_effects(commit: Option<CommitEvent>) -> Vec<Effect> {
    let mut effects: Vec<Effect> = commit.into_iter().map(Effect::Commit).collect();
    effects.push(Effect::Highlight {
        dependents: BTreeSet::new(),
        attach: None,
    });
    effects.push(Effect::Resync);
    effects
}

fn within_slop(active: &ActiveSession, position: Point, config: &EngineConfig) -> bool {
    (position - active.press).hypot() <= config.click_slop_px
}

/// Snapped and clamped value of the edited quantity for a pointer position
fn candidate_value(active: &ActiveSession, position: Point, ctx: &TransitionContext<'_>) -> f64 {
    if within_slop(active, position, ctx.config) {
        return active.baseline_value();
    }
    let snapper = ctx.snapper(active.anchor);
    let time = ctx
        .scene
        .layout()
        .time_at(ctx.world_x(position) + active.pointer_offset);
    match active.kind {
        SessionKind::Resize => {
            let start = active
                .baseline
                .get(&active.anchor)
                .map(|b| b.start)
                .unwrap_or(0.0);
            snapper.snap_length(time - start).max(active.floor)
        }
        _ => snapper.snap_time(time).max(active.floor),
    }
}

/// Recompute the closure and snapshot any member seen for the first time
fn refresh_closure(active: &mut ActiveSession, ctx: &TransitionContext<'_>) {
    let kind = match active.kind {
        SessionKind::Move | SessionKind::MeasureDrag => ClosureKind::StartTime,
        SessionKind::Resize => ClosureKind::Duration,
        SessionKind::OctaveShift(_) => return,
    };
    let closure = closure_of(ctx.model, active.anchor, kind, ctx.config.closure_strategy);
    active.closure = closure
        .into_iter()
        .filter(|id| {
            if active.baseline.contains_key(id) {
                return true;
            }
            // Not previewed yet, so the scene still holds its baseline
            match ctx.baseline_of(*id) {
                Some(base) => {
                    active.baseline.insert(*id, base);
                    true
                }
                None => false,
            }
        })
        .collect();
}

fn preview_updates(active: &ActiveSession, previous: &BTreeSet<NoteId>) -> Vec<PreviewUpdate> {
    let delta = active.delta();
    let mut updates = Vec::with_capacity(active.closure.len() + 1);

    if let Some(base) = active.baseline.get(&active.anchor) {
        updates.push(match active.kind {
            SessionKind::Resize => PreviewUpdate {
                id: active.anchor,
                start: base.start,
                duration: Some(active.value),
            },
            _ => PreviewUpdate {
                id: active.anchor,
                start: active.value,
                duration: None,
            },
        });
    }

    for id in &active.closure {
        if let Some(base) = active.baseline.get(id) {
            updates.push(PreviewUpdate {
                id: *id,
                start: base.start + delta,
                duration: None,
            });
        }
    }

    // Members that dropped out return to their baseline
    for id in previous.difference(&active.closure) {
        if let Some(base) = active.baseline.get(id) {
            updates.push(PreviewUpdate {
                id: *id,
                start: base.start,
                duration: None,
            });
        }
    }
    updates
}

/// Earliest start for a dragged measure bar.
///
/// When the bar is chained to a previous measure, that measure keeps at
/// least one grid step. Otherwise the bar may go back to the previous
/// bar in the scene, or to the origin.
fn measure_floor(ctx: &TransitionContext<'_>, anchor: NoteId) -> f64 {
    let parent = parent_of(ctx.model, anchor);
    if parent != ctx.model.origin()
        && let Some(length) = ctx.model.measure_length(parent)
        && let Some(start) = ctx
            .scene
            .start_of(parent)
            .or_else(|| ctx.model.number(parent, Variable::StartTime))
    {
        tracing::debug!(
            "Measure {} chained to {} ({:.3}s long at press)",
            anchor,
            parent,
            length
        );
        return start + ctx.snapper(anchor).step();
    }
    previous_measure_start(ctx.scene, anchor).unwrap_or_else(|| ctx.origin_start())
}

fn previous_measure_start(scene: &SceneCache, id: NoteId) -> Option<f64> {
    let measures = scene.measures();
    let index = measures.iter().position(|m| m.id == id)?;
    index.checked_sub(1).map(|i| measures[i].start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MemoryModel;
    use crate::model::memory::{FrequencyExpr, StoredNote, TimeExpr};
    use crate::picking::Picker;
    use kurbo::{Affine, Size};

    fn id(raw: u32) -> NoteId {
        NoteId::new(raw)
    }

    /// tempo 120 (beat = 0.5s); note 1 at 2.0s for 1.0s, 2 after 1,
    /// 3 after 2; measures 5 at 0s and 6 at 4s
    fn model() -> MemoryModel {
        let mut model = MemoryModel::new(120.0, 8.0, 440.0);
        let freq = FrequencyExpr {
            base: None,
            ratio: 1.0,
        };
        model.insert(StoredNote::playable(id(1), TimeExpr::offset_from(NoteId::ORIGIN, 4.0), 2.0, freq.clone()));
        model.insert(StoredNote::playable(id(2), TimeExpr::after(id(1)), 1.0, freq.clone()));
        model.insert(StoredNote::playable(id(3), TimeExpr::after(id(2)), 1.0, freq));
        model.insert(StoredNote::measure(id(5), TimeExpr::offset_from(NoteId::ORIGIN, 0.0)));
        model.insert(StoredNote::measure(id(6), TimeExpr::offset_from(id(5), 8.0)));
        model
    }

    struct Fixture {
        model: MemoryModel,
        scene: SceneCache,
        view: ViewState,
        config: EngineConfig,
        picker: Picker,
    }

    impl Fixture {
        fn new() -> Self {
            let model = model();
            let config = EngineConfig::default();
            let mut scene = SceneCache::new();
            scene.sync(&model, None, &config);
            // One world unit per pixel; lane 0 at screen y 300
            let view = ViewState::new(Affine::translate((0.0, 300.0)), Size::new(2000.0, 600.0));
            Self {
                model,
                scene,
                view,
                config,
                picker: Picker::new(),
            }
        }

        fn ctx(&self) -> TransitionContext<'_> {
            TransitionContext {
                model: &self.model,
                scene: &self.scene,
                view: &self.view,
                config: &self.config,
            }
        }

        fn press(&mut self, position: Point) -> (Session, Vec<Effect>) {
            let hit = self.picker.pick_topmost(
                &self.scene,
                &self.view,
                &self.config,
                position,
                self.config.pick_tolerance_px,
            );
            transition(Session::Idle, &InputEvent::PointerDown { position, hit }, &self.ctx())
        }

        fn step(&self, session: Session, event: InputEvent) -> (Session, Vec<Effect>) {
            transition(session, &event, &self.ctx())
        }
    }

    fn previews(effects: &[Effect]) -> Vec<PreviewUpdate> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Preview(updates) => Some(updates.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn commits(effects: &[Effect]) -> Vec<CommitEvent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Commit(event) => Some(*event),
                _ => None,
            })
            .collect()
    }

    fn preview_of(updates: &[PreviewUpdate], note: NoteId) -> Option<PreviewUpdate> {
        updates.iter().copied().find(|u| u.id == note)
    }

    // Screen x of note 1's body center: (2.0s + 0.5s) * 200
    const BODY: Point = Point::new(500.0, 300.0);

    #[test]
    fn test_press_on_body_starts_move() {
        let mut fx = Fixture::new();
        let (session, effects) = fx.press(BODY);
        let active = session.active().unwrap();
        assert_eq!(active.kind, SessionKind::Move);
        assert_eq!(active.anchor, id(1));
        assert_eq!(active.closure, BTreeSet::from([id(2), id(3)]));
        assert_eq!(active.baseline[&id(1)].start, 2.0);
        assert_eq!(effects[0], Effect::Select(Some(id(1))));
    }

    #[test]
    fn test_first_frame_has_zero_jump() {
        let mut fx = Fixture::new();
        let (session, _) = fx.press(BODY);
        let (session, effects) = fx.step(session, InputEvent::PointerMove { position: BODY });
        assert!(previews(&effects).is_empty());
        assert_eq!(session.active().unwrap().value, 2.0);
    }

    #[test]
    fn test_drag_snaps_to_quarter_beat() {
        let mut fx = Fixture::new();
        let (session, _) = fx.press(BODY);
        // 0.23s to the right
        let to = Point::new(BODY.x + 46.0, BODY.y);
        let (session, effects) = fx.step(session, InputEvent::PointerMove { position: to });
        let updates = previews(&effects);
        assert_eq!(preview_of(&updates, id(1)).unwrap().start, 2.25);
        assert_eq!(preview_of(&updates, id(2)).unwrap().start, 3.25);
        assert_eq!(preview_of(&updates, id(3)).unwrap().start, 3.75);

        let (session, effects) = fx.step(session, InputEvent::PointerUp { position: to });
        assert!(!session.is_active());
        assert_eq!(
            commits(&effects),
            vec![CommitEvent::NoteMove {
                id: id(1),
                new_start: 2.25
            }]
        );
        assert_eq!(effects.last(), Some(&Effect::Resync));
    }

    #[test]
    fn test_previews_do_not_drift() {
        let mut fx = Fixture::new();
        let (mut session, _) = fx.press(BODY);
        let mut last = Vec::new();
        for dx in [50.0, 100.0, 150.0] {
            let position = Point::new(BODY.x + dx, BODY.y);
            let (next, effects) = fx.step(session, InputEvent::PointerMove { position });
            session = next;
            last = previews(&effects);
        }
        // Baseline 2.0 plus the last delta of 0.75s, not the sum of all deltas
        assert_eq!(preview_of(&last, id(1)).unwrap().start, 2.75);
        assert_eq!(preview_of(&last, id(2)).unwrap().start, 3.75);
    }

    #[test]
    fn test_move_clamped_to_parent_start() {
        let mut fx = Fixture::new();
        // Note 2 spans 3.0..3.5s, parent note 1 starts at 2.0s
        let (session, _) = fx.press(Point::new(650.0, 300.0));
        assert_eq!(session.active().unwrap().anchor, id(2));
        let (session, effects) = fx.step(session, InputEvent::PointerMove {
            position: Point::new(100.0, 300.0),
        });
        assert_eq!(preview_of(&previews(&effects), id(2)).unwrap().start, 2.0);
        assert_eq!(session.active().unwrap().attach, Some(id(1)));
    }

    #[test]
    fn test_resize_clamps_to_minimum_duration() {
        let mut fx = Fixture::new();
        // Right edge of note 1 is at 600
        let (session, _) = fx.press(Point::new(598.0, 300.0));
        assert_eq!(session.active().unwrap().kind, SessionKind::Resize);
        assert_eq!(session.active().unwrap().closure, BTreeSet::from([id(2), id(3)]));

        let (session, effects) = fx.step(session, InputEvent::PointerMove {
            position: Point::new(405.0, 300.0),
        });
        let updates = previews(&effects);
        let anchor = preview_of(&updates, id(1)).unwrap();
        assert_eq!(anchor.start, 2.0);
        assert_eq!(anchor.duration, Some(0.125));
        // Dependents follow the end of note 1
        assert_eq!(preview_of(&updates, id(2)).unwrap().start, 2.125);

        let (_, effects) = fx.step(session, InputEvent::PointerUp {
            position: Point::new(405.0, 300.0),
        });
        assert_eq!(
            commits(&effects),
            vec![CommitEvent::NoteResize {
                id: id(1),
                new_duration: 0.125
            }]
        );
    }

    #[test]
    fn test_click_is_not_a_commit() {
        let mut fx = Fixture::new();
        let (session, _) = fx.press(BODY);
        let jitter = Point::new(BODY.x + 2.0, BODY.y + 1.0);
        let (session, _) = fx.step(session, InputEvent::PointerMove { position: jitter });
        let (session, effects) = fx.step(session, InputEvent::PointerUp { position: jitter });
        assert!(!session.is_active());
        assert!(commits(&effects).is_empty());
        assert!(effects.contains(&Effect::Resync));
    }

    #[test]
    fn test_cancel_rolls_back() {
        let mut fx = Fixture::new();
        let (session, _) = fx.press(BODY);
        let (session, _) = fx.step(session, InputEvent::PointerMove {
            position: Point::new(BODY.x + 100.0, BODY.y),
        });
        let (session, effects) = fx.step(session, InputEvent::PointerCancel);
        assert_eq!(session, Session::Idle);
        assert!(commits(&effects).is_empty());
        assert_eq!(effects.last(), Some(&Effect::Resync));
    }

    #[test]
    fn test_second_press_is_ignored() {
        let mut fx = Fixture::new();
        let (session, _) = fx.press(BODY);
        let before = session.clone();
        let (session, effects) = fx.step(session, InputEvent::PointerDown {
            position: Point::new(700.0, 300.0),
            hit: Some(Hit {
                kind: HitKind::Note,
                id: id(3),
                sub_region: Some(SubRegion::Body),
            }),
        });
        assert!(effects.is_empty());
        assert_eq!(session, before);
    }

    #[test]
    fn test_octave_click_commits() {
        let mut fx = Fixture::new();
        // Upper left corner zone of note 1 (rect y 290..310)
        let press = Point::new(403.0, 295.0);
        let (session, _) = fx.press(press);
        assert_eq!(
            session.active().unwrap().kind,
            SessionKind::OctaveShift(OctaveDirection::Up)
        );
        let (_, effects) = fx.step(session, InputEvent::PointerUp { position: press });
        assert_eq!(
            commits(&effects),
            vec![CommitEvent::OctaveChange {
                id: id(1),
                direction: OctaveDirection::Up
            }]
        );
    }

    #[test]
    fn test_octave_drag_away_cancels() {
        let mut fx = Fixture::new();
        let (session, _) = fx.press(Point::new(403.0, 305.0));
        let (_, effects) = fx.step(session, InputEvent::PointerUp {
            position: Point::new(480.0, 305.0),
        });
        assert!(commits(&effects).is_empty());
    }

    #[test]
    fn test_measure_drag() {
        let mut fx = Fixture::new();
        // Measure 6 at 4.0s: triangle pinned at the top of the viewport
        let (session, effects) = fx.press(Point::new(800.0, 2.0));
        assert_eq!(session.active().unwrap().kind, SessionKind::MeasureDrag);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Select(_))));

        let (session, effects) = fx.step(session, InputEvent::PointerMove {
            position: Point::new(700.0, 2.0),
        });
        assert_eq!(preview_of(&previews(&effects), id(6)).unwrap().start, 3.5);

        // The measure it is chained to keeps one grid step (beat 0.5s / 4)
        let (session, effects) = fx.step(session, InputEvent::PointerMove {
            position: Point::new(-500.0, 2.0),
        });
        assert_eq!(preview_of(&previews(&effects), id(6)).unwrap().start, 0.125);

        let (_, effects) = fx.step(session, InputEvent::PointerUp {
            position: Point::new(700.0, 2.0),
        });
        assert_eq!(
            commits(&effects),
            vec![CommitEvent::MeasureResize {
                id: id(6),
                new_start: 3.5
            }]
        );
    }

    #[test]
    fn test_measure_floor_follows_the_chain() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx();
        assert_eq!(measure_floor(&ctx, id(6)), 0.125);
        // Measure 5 hangs off the origin, which has no length to protect
        assert_eq!(measure_floor(&ctx, id(5)), 0.0);

        // A bar not chained to a measure falls back to the previous bar
        fx.model.insert(StoredNote::measure(id(7), TimeExpr::offset_from(id(1), 8.0)));
        fx.scene.sync(&fx.model, None, &fx.config);
        let ctx = fx.ctx();
        assert_eq!(measure_floor(&ctx, id(7)), 4.0);
    }

    #[test]
    fn test_press_on_empty_space_clears_selection() {
        let mut fx = Fixture::new();
        let (session, effects) = fx.press(Point::new(1500.0, 500.0));
        assert!(!session.is_active());
        assert_eq!(effects, vec![Effect::Select(None)]);
    }
}
