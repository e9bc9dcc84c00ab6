//! Handler registry.
//!
//! Interactions and response windows name their follow-up logic instead
//! of capturing it, and the `Registry` maps those names to code. A game
//! builds one registry at startup and hands it to the
//! [`Engine`](crate::engine::Engine); nothing is global, so several
//! matches (or tests) can run side by side with different registries.
//!
//! ## Example
//!
//! ```
//! use tabletop_engine::games::duel::Duel;
//! use tabletop_engine::interaction::HandlerId;
//! use tabletop_engine::registry::Registry;
//!
//! let registry: Registry<Duel> = Registry::new()
//!     .with_continuation("noop", |_args, _ctx| Ok(Vec::new()));
//!
//! assert!(registry.continuation(&HandlerId::new("noop")).is_some());
//! assert!(registry.continuation(&HandlerId::new("other")).is_none());
//! ```

use rustc_hash::FxHashMap;

use crate::core::{Event, MatchState, PlayerId, Value};
use crate::error::Result;
use crate::interaction::{HandlerId, Interaction, Resolution};
use crate::response::{ResponseWindow, WindowType};
use crate::rules::{CommandContext, Domain};

/// What a continuation sees when its interaction resolves.
///
/// `state` already has the resolution marker folded in, so the resolved
/// interaction is no longer active.
pub struct ContinuationArgs<'a, C: Clone> {
    pub state: &'a MatchState<C>,
    pub interaction: &'a Interaction,
    pub resolution: &'a Resolution,
}

impl<C: Clone> ContinuationArgs<'_, C> {
    /// Parameters stored with the continuation.
    pub fn params(&self) -> &Value {
        self.interaction
            .continuation
            .as_ref()
            .map_or(&Value::Null, |c| &c.params)
    }
}

/// What a response handler sees when the head responder acts.
pub struct ResponseArgs<'a, C: Clone> {
    pub state: &'a MatchState<C>,
    pub window: &'a ResponseWindow,
    pub player: PlayerId,
    pub payload: &'a Value,
}

/// Events produced by a response, and whether the same player keeps the
/// head of the queue.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseOutcome<E> {
    pub events: Vec<Event<E>>,
    pub keep_priority: bool,
}

impl<E> ResponseOutcome<E> {
    /// Respond once and hand over to the next responder.
    pub fn done(events: Vec<Event<E>>) -> Self {
        Self {
            events,
            keep_priority: false,
        }
    }

    /// Respond and stay at the head of the queue.
    pub fn again(events: Vec<Event<E>>) -> Self {
        Self {
            events,
            keep_priority: true,
        }
    }
}

pub type ContinuationFn<D> = dyn Fn(
        &ContinuationArgs<'_, <D as Domain>::Core>,
        &mut CommandContext,
    ) -> Result<Vec<Event<<D as Domain>::Event>>>
    + Send
    + Sync;

pub type ResponseFn<D> = dyn Fn(
        &ResponseArgs<'_, <D as Domain>::Core>,
        &mut CommandContext,
    ) -> Result<ResponseOutcome<<D as Domain>::Event>>
    + Send
    + Sync;

/// Whether a player has anything to respond with.
pub type ResponderFilterFn<D> =
    dyn Fn(&<D as Domain>::Core, PlayerId, &WindowType, Option<&str>) -> bool + Send + Sync;

/// Registry of continuation and response handlers for one game.
pub struct Registry<D: Domain> {
    continuations: FxHashMap<HandlerId, Box<ContinuationFn<D>>>,
    responses: FxHashMap<WindowType, Box<ResponseFn<D>>>,
    responder_filter: Option<Box<ResponderFilterFn<D>>>,
}

impl<D: Domain> Default for Registry<D> {
    fn default() -> Self {
        Self {
            continuations: FxHashMap::default(),
            responses: FxHashMap::default(),
            responder_filter: None,
        }
    }
}

impl<D: Domain> Registry<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a continuation handler.
    ///
    /// Panics if the name is already taken.
    #[must_use]
    pub fn with_continuation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ContinuationArgs<'_, D::Core>, &mut CommandContext) -> Result<Vec<Event<D::Event>>>
            + Send
            + Sync
            + 'static,
    {
        let id = HandlerId::new(name);
        assert!(
            !self.continuations.contains_key(&id),
            "continuation {id} already registered"
        );
        self.continuations.insert(id, Box::new(handler));
        self
    }

    /// Register the handler for acts in windows of `window_type`.
    ///
    /// Panics if the window type already has a handler.
    #[must_use]
    pub fn with_response_handler<F>(mut self, window_type: WindowType, handler: F) -> Self
    where
        F: Fn(&ResponseArgs<'_, D::Core>, &mut CommandContext) -> Result<ResponseOutcome<D::Event>>
            + Send
            + Sync
            + 'static,
    {
        assert!(
            !self.responses.contains_key(&window_type),
            "response handler for {window_type:?} already registered"
        );
        self.responses.insert(window_type, Box::new(handler));
        self
    }

    /// Set the respondable-content check applied when a window opens.
    #[must_use]
    pub fn with_responder_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&D::Core, PlayerId, &WindowType, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.responder_filter = Some(Box::new(filter));
        self
    }

    #[must_use]
    pub fn continuation(&self, id: &HandlerId) -> Option<&ContinuationFn<D>> {
        self.continuations.get(id).map(Box::as_ref)
    }

    #[must_use]
    pub fn response_handler(&self, window_type: &WindowType) -> Option<&ResponseFn<D>> {
        self.responses.get(window_type).map(Box::as_ref)
    }

    /// Whether `player` should be offered a window. Without a filter
    /// every candidate is.
    #[must_use]
    pub fn can_respond(
        &self,
        core: &D::Core,
        player: PlayerId,
        window_type: &WindowType,
        source_id: Option<&str>,
    ) -> bool {
        self.responder_filter
            .as_ref()
            .map_or(true, |filter| filter(core, player, window_type, source_id))
    }

    /// Number of registered continuations.
    #[must_use]
    pub fn continuation_count(&self) -> usize {
        self.continuations.len()
    }
}
