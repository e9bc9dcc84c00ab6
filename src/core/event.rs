//! Events: immutable facts and the only input to the reducer.
//!
//! ## Design Philosophy
//!
//! The event log is the durable record of a match. Folding every event
//! from match start reproduces the live state exactly, so events carry
//! everything the reducer needs (rolled dice, ids, absorbed amounts) and
//! the reducer never consults a clock or an RNG.
//!
//! Engine-owned events live in [`SystemEvent`]; game-defined events are
//! carried in [`EventKind::Domain`]. Events this build does not know
//! (a newer client's log) arrive as [`EventKind::Unrecognized`] and fold
//! as no-ops.
//!
//! ## Example Usage
//!
//! ```
//! use tabletop_engine::core::{Event, EventKind, PhaseId, PlayerId, SystemEvent};
//!
//! let event: Event<()> = Event::system(
//!     SystemEvent::PhaseChanged {
//!         from: PhaseId::new(0),
//!         to: PhaseId::new(1),
//!         active_player: PlayerId::new(0),
//!     },
//!     10,
//! )
//! .with_source("ADVANCE_PHASE");
//!
//! assert_eq!(event.type_name(), "SYS_PHASE_CHANGED");
//! assert!(matches!(event.kind, EventKind::System(_)));
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use super::{PhaseId, PlayerId, Value};
use crate::interaction::{Interaction, InteractionId, Resolution};
use crate::response::{ResponseWindow, WindowId, WindowType};

/// Wire name of a game-defined event.
pub trait EventName {
    fn event_name(&self) -> &'static str;
}

impl EventName for () {
    fn event_name(&self) -> &'static str {
        "NOOP"
    }
}

/// Events owned by the engine's own subsystems.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemEvent {
    PhaseAdvanceStarted {
        from: PhaseId,
        to: PhaseId,
    },
    PhaseChanged {
        from: PhaseId,
        to: PhaseId,
        active_player: PlayerId,
    },
    /// A phase exit created a blocker; `phase` is unchanged.
    FlowHalted {
        phase: PhaseId,
    },

    InteractionRequested(Interaction),
    /// A deferred interaction moved into the active slot.
    InteractionActivated {
        id: InteractionId,
    },
    InteractionResolved {
        id: InteractionId,
        player: PlayerId,
        resolution: Resolution,
        source_id: Option<String>,
    },
    InteractionCancelled {
        id: InteractionId,
        player: PlayerId,
        source_id: Option<String>,
    },
    InteractionExpired {
        id: InteractionId,
        player: PlayerId,
        source_id: Option<String>,
        now: u64,
    },

    WindowOpened(ResponseWindow),
    /// The head responder acted; the handler's events follow.
    ResponseSubmitted {
        window: WindowId,
        player: PlayerId,
        payload: Value,
    },
    /// The head responder left the queue.
    ResponderDropped {
        window: WindowId,
        player: PlayerId,
        passed: bool,
    },
    /// No more reactive modifiers will be added for `source_id`.
    WindowClosed {
        window: WindowId,
        window_type: WindowType,
        source_id: Option<String>,
        all_passed: bool,
    },

    /// Push the state before this event onto the undo history, keeping at
    /// most `limit` snapshots.
    UndoCheckpoint {
        limit: usize,
    },
    UndoRequested {
        requester: PlayerId,
        required: u32,
    },
    UndoApproved {
        approver: PlayerId,
    },
    /// Restore the latest snapshot. `to_revision` is the snapshot's own
    /// revision, kept for clients.
    UndoApplied {
        requester: PlayerId,
        to_revision: u64,
    },
    UndoRejected {
        requester: PlayerId,
        by: PlayerId,
    },
    UndoCancelled {
        requester: PlayerId,
    },
}

impl SystemEvent {
    pub const fn type_name(&self) -> &'static str {
        match self {
            SystemEvent::PhaseAdvanceStarted { .. } => "SYS_PHASE_ADVANCE_STARTED",
            SystemEvent::PhaseChanged { .. } => "SYS_PHASE_CHANGED",
            SystemEvent::FlowHalted { .. } => "SYS_FLOW_HALTED",
            SystemEvent::InteractionRequested(_) => "SYS_INTERACTION_REQUESTED",
            SystemEvent::InteractionActivated { .. } => "SYS_INTERACTION_ACTIVATED",
            SystemEvent::InteractionResolved { .. } => "SYS_INTERACTION_RESOLVED",
            SystemEvent::InteractionCancelled { .. } => "SYS_INTERACTION_CANCELLED",
            SystemEvent::InteractionExpired { .. } => "SYS_INTERACTION_EXPIRED",
            SystemEvent::WindowOpened(_) => "RESPONSE_WINDOW_OPENED",
            SystemEvent::ResponseSubmitted { .. } => "RESPONSE_WINDOW_RESPONSE",
            SystemEvent::ResponderDropped { .. } => "RESPONSE_WINDOW_RESPONDER_CHANGED",
            SystemEvent::WindowClosed { .. } => "RESPONSE_WINDOW_CLOSED",
            SystemEvent::UndoCheckpoint { .. } => "SYS_UNDO_CHECKPOINT",
            SystemEvent::UndoRequested { .. } => "SYS_UNDO_REQUESTED",
            SystemEvent::UndoApproved { .. } => "SYS_UNDO_APPROVED",
            SystemEvent::UndoApplied { .. } => "SYS_UNDO_APPLIED",
            SystemEvent::UndoRejected { .. } => "SYS_UNDO_REJECTED",
            SystemEvent::UndoCancelled { .. } => "SYS_UNDO_CANCELLED",
        }
    }

    /// Id of the interaction this event closes, if any.
    #[must_use]
    pub fn closed_interaction(&self) -> Option<InteractionId> {
        match self {
            SystemEvent::InteractionResolved { id, .. }
            | SystemEvent::InteractionCancelled { id, .. }
            | SystemEvent::InteractionExpired { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// `type_name` given to undecodable events that carry no variant name.
pub const UNKNOWN_EVENT: &str = "UNKNOWN";

/// Payload of an event.
///
/// Decoding from JSON never fails on content: a system or domain variant
/// this build does not know, a body that no longer matches, or an
/// unknown top-level tag all decode as [`EventKind::Unrecognized`] named
/// after the variant they carried. Binary checkpoints are read by the
/// build that wrote them and decode strictly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum EventKind<E> {
    System(SystemEvent),
    Domain(E),
    /// An event this build cannot interpret.
    Unrecognized { type_name: String, payload: Value },
}

impl<E> EventKind<E> {
    fn opaque(type_name: impl Into<String>, payload: serde_json::Value) -> Self {
        let type_name = type_name.into();
        tracing::debug!(%type_name, "decoded an event this build does not know");
        EventKind::Unrecognized {
            type_name,
            payload: Value::from(payload),
        }
    }
}

/// Same shape as [`EventKind`], decoded strictly.
#[derive(Deserialize)]
#[serde(rename = "EventKind")]
enum StrictKind<E> {
    System(SystemEvent),
    Domain(E),
    Unrecognized { type_name: String, payload: Value },
}

impl<E> From<StrictKind<E>> for EventKind<E> {
    fn from(kind: StrictKind<E>) -> Self {
        match kind {
            StrictKind::System(e) => EventKind::System(e),
            StrictKind::Domain(e) => EventKind::Domain(e),
            StrictKind::Unrecognized { type_name, payload } => EventKind::Unrecognized { type_name, payload },
        }
    }
}

#[derive(Deserialize)]
struct OpaqueBody {
    type_name: String,
    payload: Value,
}

impl<'de, E: Deserialize<'de>> Deserialize<'de> for EventKind<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if !deserializer.is_human_readable() {
            return StrictKind::deserialize(deserializer).map(EventKind::from);
        }
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_json::Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
                Some((tag, body)) => decode_tagged(&tag, body),
                None => EventKind::opaque(UNKNOWN_EVENT, serde_json::Value::Null),
            },
            other => EventKind::opaque(UNKNOWN_EVENT, other),
        })
    }
}

fn decode_tagged<'de, E: Deserialize<'de>>(tag: &str, body: serde_json::Value) -> EventKind<E> {
    let decoded = match tag {
        "System" => SystemEvent::deserialize(&body).map(EventKind::System).ok(),
        "Domain" => E::deserialize(body.clone()).map(EventKind::Domain).ok(),
        "Unrecognized" => OpaqueBody::deserialize(&body)
            .map(|o| EventKind::Unrecognized {
                type_name: o.type_name,
                payload: o.payload,
            })
            .ok(),
        _ => None,
    };
    decoded.unwrap_or_else(|| {
        let type_name = match tag {
            "System" | "Domain" | "Unrecognized" => variant_name(&body).unwrap_or(tag).to_owned(),
            _ => tag.to_owned(),
        };
        EventKind::opaque(type_name, body)
    })
}

/// Name of an externally tagged variant: the single key of a map, or the
/// string of a unit variant.
fn variant_name(body: &serde_json::Value) -> Option<&str> {
    match body {
        serde_json::Value::Object(map) if map.len() == 1 => map.keys().next().map(String::as_str),
        serde_json::Value::String(name) => Some(name),
        _ => None,
    }
}

/// An immutable fact with its provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<E> {
    pub kind: EventKind<E>,
    pub timestamp: u64,
    pub source_command: Option<String>,
}

impl<E> Event<E> {
    pub fn new(kind: EventKind<E>, timestamp: u64) -> Self {
        Self {
            kind,
            timestamp,
            source_command: None,
        }
    }

    pub fn system(event: SystemEvent, timestamp: u64) -> Self {
        Self::new(EventKind::System(event), timestamp)
    }

    pub fn domain(event: E, timestamp: u64) -> Self {
        Self::new(EventKind::Domain(event), timestamp)
    }

    #[must_use]
    pub fn with_source(mut self, command_type: impl Into<String>) -> Self {
        self.source_command = Some(command_type.into());
        self
    }

    #[must_use]
    pub fn as_system(&self) -> Option<&SystemEvent> {
        match &self.kind {
            EventKind::System(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_domain(&self) -> Option<&E> {
        match &self.kind {
            EventKind::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: EventName> Event<E> {
    /// Wire type string.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            EventKind::System(e) => e.type_name(),
            EventKind::Domain(e) => e.event_name(),
            EventKind::Unrecognized { type_name, .. } => type_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_interaction() {
        let cancelled = SystemEvent::InteractionCancelled {
            id: InteractionId(3),
            player: PlayerId::new(0),
            source_id: None,
        };
        assert_eq!(cancelled.closed_interaction(), Some(InteractionId(3)));
        assert_eq!(
            SystemEvent::FlowHalted {
                phase: PhaseId::new(1)
            }
            .closed_interaction(),
            None
        );
    }

    #[test]
    fn test_unrecognized_keeps_type_name() {
        let event: Event<()> = Event::new(
            EventKind::Unrecognized {
                type_name: "FUTURE_THING".into(),
                payload: Value::from(1),
            },
            5,
        );
        assert_eq!(event.type_name(), "FUTURE_THING");
        assert!(event.as_system().is_none());
        assert!(event.as_domain().is_none());
    }

    #[test]
    fn test_json_wire_shape() {
        let event: Event<()> = Event::system(
            SystemEvent::FlowHalted {
                phase: PhaseId::new(4),
            },
            99,
        )
        .with_source("ADVANCE_PHASE");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["timestamp"], 99);
        assert_eq!(json["source_command"], "ADVANCE_PHASE");
        assert_eq!(json["kind"]["System"]["FlowHalted"]["phase"], 4);
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    enum Note {
        Said(String),
        Quiet,
    }

    impl EventName for Note {
        fn event_name(&self) -> &'static str {
            match self {
                Note::Said(_) => "Said",
                Note::Quiet => "Quiet",
            }
        }
    }

    #[test]
    fn test_unknown_variants_decode_as_unrecognized() {
        let future_system: Event<Note> =
            serde_json::from_str(r#"{"kind":{"System":{"ComboTriggered":{"hits":3}}},"timestamp":1,"source_command":null}"#)
                .unwrap();
        assert_eq!(future_system.type_name(), "ComboTriggered");
        assert_eq!(
            future_system.kind,
            EventKind::Unrecognized {
                type_name: "ComboTriggered".into(),
                payload: Value::map([("ComboTriggered", Value::map([("hits", Value::from(3))]))]),
            }
        );

        let future_domain: EventKind<Note> = serde_json::from_str(r#"{"Domain":"Shouted"}"#).unwrap();
        assert!(matches!(future_domain, EventKind::Unrecognized { ref type_name, .. } if type_name == "Shouted"));

        let future_kind: EventKind<Note> = serde_json::from_str(r#"{"Meta":{"x":1}}"#).unwrap();
        assert!(matches!(future_kind, EventKind::Unrecognized { ref type_name, .. } if type_name == "Meta"));

        let bare: EventKind<Note> = serde_json::from_str("7").unwrap();
        assert!(matches!(bare, EventKind::Unrecognized { ref type_name, .. } if type_name == UNKNOWN_EVENT));
    }

    #[test]
    fn test_known_variants_decode_normally() {
        let events = vec![
            Event::domain(Note::Said("hi".into()), 1),
            Event::domain(Note::Quiet, 2),
            Event::system(SystemEvent::UndoCancelled { requester: PlayerId::new(1) }, 3),
            Event::new(
                EventKind::Unrecognized {
                    type_name: "LATER".into(),
                    payload: Value::from(5),
                },
                4,
            ),
        ];
        let json = serde_json::to_string(&events).unwrap();
        let back: Vec<Event<Note>> = serde_json::from_str(&json).unwrap();
        assert_eq!(events, back);

        let bytes = bincode::serialize(&events).unwrap();
        let back: Vec<Event<Note>> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(events, back);
    }
}
