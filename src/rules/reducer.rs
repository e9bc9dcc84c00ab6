//! The reducer: the single path by which state changes.
//!
//! `reduce` is pure and total. Domain events go to the game's
//! [`Domain::reduce`]; system events are handled by small sub-reducers
//! that each own one slice of [`SystemState`]. Unrecognized events
//! return the input unchanged.
//!
//! The fold is copy-on-write: the input snapshot is never touched, so a
//! caller holding an older state (for undo or replay comparison) keeps a
//! valid value. Undo checkpoints and restores work on the whole
//! [`MatchState`] and are folded here rather than by a sub-reducer.

use super::Domain;
use crate::core::{
    Event, EventKind, FlowStatus, InteractionState, MatchState, PhaseId, PlayerId, SystemEvent,
    SystemState,
};
use crate::interaction::{Interaction, InteractionId};
use crate::response::{ResponseWindow, WindowId};
use crate::undo::{UndoRequest, UndoState};

/// Fold one event.
pub fn reduce<D: Domain>(
    domain: &D,
    state: &MatchState<D::Core>,
    event: &Event<D::Event>,
) -> MatchState<D::Core> {
    match &event.kind {
        EventKind::Domain(e) => MatchState {
            core: domain.reduce(&state.core, e),
            sys: SystemState {
                revision: state.sys.revision + 1,
                ..state.sys.clone()
            },
            history: state.history.clone(),
        },
        EventKind::System(SystemEvent::UndoCheckpoint { limit }) => checkpoint(state, *limit),
        EventKind::System(SystemEvent::UndoApplied { .. }) => restore(state),
        EventKind::System(e) => {
            let mut sys = state.sys.clone();
            SystemReducer::new(&mut sys).apply(e);
            let core = domain
                .observe_system(&state.core, e)
                .unwrap_or_else(|| state.core.clone());
            MatchState {
                core,
                sys,
                history: state.history.clone(),
            }
        }
        EventKind::Unrecognized { type_name, .. } => {
            tracing::trace!(%type_name, "skipping unrecognized event");
            state.clone()
        }
    }
}

/// Fold a sequence of events in order.
pub fn fold<'e, D: Domain>(
    domain: &D,
    initial: &MatchState<D::Core>,
    events: impl IntoIterator<Item = &'e Event<D::Event>>,
) -> MatchState<D::Core>
where
    D::Event: 'e,
{
    events
        .into_iter()
        .fold(initial.clone(), |state, event| reduce(domain, &state, event))
}

fn checkpoint<C: Clone>(state: &MatchState<C>, limit: usize) -> MatchState<C> {
    let mut history = state.history.clone();
    history.push(state.snapshot(), limit);
    let mut sys = state.sys.clone();
    sys.revision += 1;
    sys.undo.depth = history.len();
    MatchState {
        core: state.core.clone(),
        sys,
        history,
    }
}

/// Put the latest snapshot back. Revision and ids keep counting up from
/// the current state, so nothing handed out since the snapshot is reused.
fn restore<C: Clone>(state: &MatchState<C>) -> MatchState<C> {
    let mut history = state.history.clone();
    let Some(snapshot) = history.pop() else {
        let mut sys = state.sys.clone();
        sys.revision += 1;
        sys.undo.pending = None;
        return MatchState {
            core: state.core.clone(),
            sys,
            history,
        };
    };

    let mut sys = snapshot.sys;
    sys.revision = state.sys.revision + 1;
    sys.next_id = sys.next_id.max(state.sys.next_id);
    sys.undo = UndoState {
        pending: None,
        depth: history.len(),
    };
    MatchState {
        core: snapshot.core,
        sys,
        history,
    }
}

/// Structured mutable access to engine sub-state, used on a fresh clone.
pub struct SystemReducer<'a> {
    sys: &'a mut SystemState,
}

impl<'a> SystemReducer<'a> {
    pub fn new(sys: &'a mut SystemState) -> Self {
        Self { sys }
    }

    pub fn apply(&mut self, event: &SystemEvent) {
        self.sys.revision += 1;
        if let Some(id) = event.closed_interaction() {
            self.interactions().close(id);
            self.window().release(id);
            return;
        }
        match event {
            SystemEvent::PhaseAdvanceStarted { from, to } => self.flow().advancing(*from, *to),
            SystemEvent::PhaseChanged { to, .. } => self.flow().enter(*to),
            SystemEvent::FlowHalted { phase } => self.flow().halt(*phase),
            SystemEvent::InteractionRequested(interaction) => {
                self.reserve_id(interaction.id.0);
                if self.interactions().request(interaction) {
                    self.lock_window_for(interaction);
                }
            }
            SystemEvent::InteractionActivated { id } => self.interactions().activate(*id),
            // Closed above.
            SystemEvent::InteractionResolved { .. }
            | SystemEvent::InteractionCancelled { .. }
            | SystemEvent::InteractionExpired { .. } => {}
            SystemEvent::WindowOpened(window) => {
                self.reserve_id(window.id.0);
                self.sys.response_window = Some(window.clone());
            }
            SystemEvent::ResponseSubmitted { window, player, .. } => {
                if let Some(open) = self.open_window(*window) {
                    if !open.responded.contains(player) {
                        open.responded.push(*player);
                    }
                }
            }
            SystemEvent::ResponderDropped { window, player, passed } => {
                if let Some(open) = self.open_window(*window) {
                    if open.responder_queue.first() == Some(player) {
                        open.responder_queue.remove(0);
                        if *passed {
                            open.passed.push(*player);
                        }
                    }
                }
            }
            SystemEvent::WindowClosed { window, .. } => {
                if self.open_window(*window).is_some() {
                    self.sys.response_window = None;
                }
            }
            // Snapshots live outside `SystemState`; `reduce` folds these.
            SystemEvent::UndoCheckpoint { .. } | SystemEvent::UndoApplied { .. } => {}
            SystemEvent::UndoRequested { requester, required } => self.undo().request(*requester, *required),
            SystemEvent::UndoApproved { approver } => self.undo().approve(*approver),
            SystemEvent::UndoRejected { .. } | SystemEvent::UndoCancelled { .. } => self.undo().clear(),
        }
    }

    fn flow(&mut self) -> FlowReducer<'_> {
        FlowReducer { sys: self.sys }
    }

    fn interactions(&mut self) -> InteractionReducer<'_> {
        InteractionReducer {
            interaction: &mut self.sys.interaction,
        }
    }

    fn window(&mut self) -> WindowReducer<'_> {
        WindowReducer {
            window: &mut self.sys.response_window,
        }
    }

    fn undo(&mut self) -> UndoReducer<'_> {
        UndoReducer {
            undo: &mut self.sys.undo,
        }
    }

    fn open_window(&mut self, id: WindowId) -> Option<&mut ResponseWindow> {
        self.sys.response_window.as_mut().filter(|w| w.id == id)
    }

    fn reserve_id(&mut self, id: u64) {
        self.sys.next_id = self.sys.next_id.max(id + 1);
    }

    fn lock_window_for(&mut self, interaction: &Interaction) {
        if let Some(window) = self.sys.response_window.as_mut() {
            if window.pending_interaction.is_none()
                && window.current_responder() == Some(interaction.player)
            {
                window.pending_interaction = Some(interaction.id);
            }
        }
    }
}

struct FlowReducer<'a> {
    sys: &'a mut SystemState,
}

impl FlowReducer<'_> {
    fn advancing(&mut self, from: PhaseId, to: PhaseId) {
        self.sys.flow = FlowStatus::Advancing { from, to };
    }

    fn enter(&mut self, to: PhaseId) {
        self.sys.phase = to;
        self.sys.flow = FlowStatus::Idle;
    }

    fn halt(&mut self, phase: PhaseId) {
        self.sys.flow = FlowStatus::Halted { phase };
    }
}

struct InteractionReducer<'a> {
    interaction: &'a mut InteractionState,
}

impl InteractionReducer<'_> {
    /// Whether the interaction was admitted. A duplicate id is ignored.
    fn request(&mut self, interaction: &Interaction) -> bool {
        if self.interaction.is_pending(interaction.id) {
            return false;
        }
        if self.interaction.current.is_none() {
            self.interaction.current = Some(interaction.clone());
        } else {
            self.interaction.queue.push_back(interaction.clone());
        }
        true
    }

    fn activate(&mut self, id: InteractionId) {
        if self.interaction.current.is_some() {
            return;
        }
        if let Some(position) = self.interaction.queue.iter().position(|i| i.id == id) {
            self.interaction.current = Some(self.interaction.queue.remove(position));
        }
    }

    fn close(&mut self, id: InteractionId) {
        if self.interaction.current.as_ref().is_some_and(|i| i.id == id) {
            self.interaction.current = None;
        } else if let Some(position) = self.interaction.queue.iter().position(|i| i.id == id) {
            self.interaction.queue.remove(position);
        }
    }
}

struct WindowReducer<'a> {
    window: &'a mut Option<ResponseWindow>,
}

impl WindowReducer<'_> {
    fn release(&mut self, id: InteractionId) {
        if let Some(window) = self.window.as_mut() {
            if window.pending_interaction == Some(id) {
                window.pending_interaction = None;
            }
        }
    }
}

struct UndoReducer<'a> {
    undo: &'a mut UndoState,
}

impl UndoReducer<'_> {
    fn request(&mut self, requester: PlayerId, required: u32) {
        if self.undo.pending.is_none() {
            self.undo.pending = Some(UndoRequest {
                requester,
                approvals: Vec::new(),
                required,
            });
        }
    }

    fn approve(&mut self, approver: PlayerId) {
        if let Some(pending) = self.undo.pending.as_mut() {
            if pending.requester != approver && !pending.approvals.contains(&approver) {
                pending.approvals.push(approver);
            }
        }
    }

    fn clear(&mut self) {
        self.undo.pending = None;
    }
}

/// State plus the events that produced it, folded in append order.
///
/// Every component that produces events during one command appends to
/// the same transition, so later steps always see post-reduction state.
pub struct Transition<'d, D: Domain> {
    domain: &'d D,
    state: MatchState<D::Core>,
    events: Vec<Event<D::Event>>,
}

impl<'d, D: Domain> Transition<'d, D> {
    pub fn new(domain: &'d D, state: MatchState<D::Core>) -> Self {
        Self {
            domain,
            state,
            events: Vec::new(),
        }
    }

    /// Fold and record one event.
    pub fn apply(&mut self, event: Event<D::Event>) {
        self.state = reduce(self.domain, &self.state, &event);
        self.events.push(event);
    }

    pub fn apply_all(&mut self, events: impl IntoIterator<Item = Event<D::Event>>) {
        for event in events {
            self.apply(event);
        }
    }

    #[must_use]
    pub fn state(&self) -> &MatchState<D::Core> {
        &self.state
    }

    #[must_use]
    pub fn events(&self) -> &[Event<D::Event>] {
        &self.events
    }

    /// Position to pass to [`since`](Self::since) later.
    #[must_use]
    pub fn mark(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn since(&self, mark: usize) -> &[Event<D::Event>] {
        self.events.get(mark..).unwrap_or(&[])
    }

    pub fn into_parts(self) -> (MatchState<D::Core>, Vec<Event<D::Event>>) {
        (self.state, self.events)
    }
}
