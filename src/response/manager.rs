//! Response window lifecycle: `Closed → Open → Closed`.
//!
//! Only the head of the responder queue may act. Passing drops the head;
//! acting runs the window type's handler, which decides whether the same
//! player keeps priority. When the head's act requests an interaction for
//! that player, the window is locked until the interaction closes, after
//! which [`settle_after_interaction`](ResponseWindowManager::settle_after_interaction)
//! moves the queue on. The window closes by itself when the queue
//! empties.

use super::priority::responder_order;
use super::window::{ResponseWindow, WindowId, WindowSpec};
use crate::core::{Event, MatchState, PlayerId, SystemEvent, SystemState, Value};
use crate::error::{EngineFault, Result, ValidationError};
use crate::registry::{Registry, ResponseArgs};
use crate::rules::{CommandContext, Domain, Transition};

/// Drives response windows for one engine.
pub struct ResponseWindowManager<'r, D: Domain> {
    registry: &'r Registry<D>,
}

impl<'r, D: Domain> ResponseWindowManager<'r, D> {
    pub fn new(registry: &'r Registry<D>) -> Self {
        Self { registry }
    }

    /// Build the event opening a window for `spec`.
    ///
    /// The responder queue is fixed here: candidates are ordered by role
    /// and turn distance, then filtered by the registry's responder check.
    /// Returns `None` when nobody is left to respond.
    pub fn open(
        &self,
        state: &MatchState<D::Core>,
        spec: WindowSpec,
        player_count: usize,
        ctx: &mut CommandContext,
    ) -> Result<Option<Event<D::Event>>> {
        if let Some(open) = &state.sys.response_window {
            return Err(ValidationError::AlreadyOpen(open.id).into());
        }

        let responder_queue: super::ResponderQueue =
            responder_order(spec.active, player_count, &spec.candidates)
                .into_iter()
                .filter(|&player| {
                    self.registry.can_respond(
                        &state.core,
                        player,
                        &spec.window_type,
                        spec.source_id.as_deref(),
                    )
                })
                .collect();

        if responder_queue.is_empty() {
            tracing::debug!(window_type = ?spec.window_type, "no eligible responders, window not opened");
            return Ok(None);
        }

        let window = ResponseWindow {
            id: WindowId(ctx.allocate_id()),
            window_type: spec.window_type,
            source_id: spec.source_id,
            responder_queue,
            passed: Vec::new(),
            responded: Vec::new(),
            pending_interaction: None,
        };
        tracing::debug!(window = %window.id, responders = window.responder_queue.len(), "response window opened");
        Ok(Some(ctx.system(SystemEvent::WindowOpened(window))))
    }

    /// The head responder declines. `on_behalf_of` lets a host pass for a
    /// disconnected player.
    pub fn pass(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        on_behalf_of: Option<PlayerId>,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        let responder = on_behalf_of.unwrap_or(player);
        let window = head_window(&tx.state().sys, responder)?;
        let id = window.id;
        tracing::debug!(window = %id, %responder, "responder passed");
        drop_head(tx, id, responder, true, ctx);
        Ok(())
    }

    /// The head responder acts.
    pub fn respond(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        payload: Value,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        let window = head_window(&tx.state().sys, player)?.clone();
        let handler = self
            .registry
            .response_handler(&window.window_type)
            .ok_or_else(|| EngineFault::MissingResponseHandler(window.window_type.clone()))?;

        tx.apply(ctx.system(SystemEvent::ResponseSubmitted {
            window: window.id,
            player,
            payload: payload.clone(),
        }));

        ctx.sync(&tx.state().sys);
        let current = tx.state().sys.response_window.clone().unwrap_or(window);
        let args = ResponseArgs {
            state: tx.state(),
            window: &current,
            player,
            payload: &payload,
        };
        let outcome = handler(&args, ctx)?;
        tx.apply_all(outcome.events);

        let locked = match &tx.state().sys.response_window {
            Some(open) if open.id == current.id => open.is_locked(),
            _ => return Ok(()),
        };
        if locked {
            tracing::debug!(window = %current.id, %player, "window waiting on responder's interaction");
        } else if !outcome.keep_priority {
            drop_head(tx, current.id, player, false, ctx);
        }
        Ok(())
    }

    /// Move the queue on once the interaction that locked the window has
    /// closed. `before` is the state at the start of the command.
    pub fn settle_after_interaction(
        &self,
        tx: &mut Transition<'_, D>,
        before: &SystemState,
        ctx: &mut CommandContext,
    ) {
        let Some((window_id, lock, head)) = before.response_window.as_ref().and_then(|w| {
            Some((w.id, w.pending_interaction?, w.current_responder()?))
        }) else {
            return;
        };

        let sys = &tx.state().sys;
        if !sys.is_closed(lock) {
            return;
        }
        let still_waiting = match &sys.response_window {
            Some(open) if open.id == window_id => {
                open.is_locked() || open.current_responder() != Some(head)
            }
            _ => true,
        };
        if !still_waiting {
            drop_head(tx, window_id, head, false, ctx);
        }
    }

    /// Close the open window. Closing when nothing is open is a no-op.
    pub fn close(&self, tx: &mut Transition<'_, D>, ctx: &mut CommandContext) {
        close_open(tx, ctx);
    }
}

fn head_window(sys: &SystemState, responder: PlayerId) -> Result<&ResponseWindow, ValidationError> {
    let window = sys
        .response_window
        .as_ref()
        .ok_or(ValidationError::NoResponseWindow)?;
    let head = window.current_responder();
    if head != Some(responder) {
        return Err(ValidationError::NotCurrentResponder {
            expected: head,
            got: responder,
        });
    }
    if let Some(lock) = window.pending_interaction {
        return Err(ValidationError::ResponseLocked(lock));
    }
    Ok(window)
}

fn drop_head<D: Domain>(
    tx: &mut Transition<'_, D>,
    window: WindowId,
    player: PlayerId,
    passed: bool,
    ctx: &mut CommandContext,
) {
    tx.apply(ctx.system(SystemEvent::ResponderDropped {
        window,
        player,
        passed,
    }));
    let exhausted = tx
        .state()
        .sys
        .response_window
        .as_ref()
        .is_some_and(|w| w.id == window && w.responder_queue.is_empty());
    if exhausted {
        close_open(tx, ctx);
    }
}

fn close_open<D: Domain>(tx: &mut Transition<'_, D>, ctx: &mut CommandContext) {
    let Some(window) = tx.state().sys.response_window.clone() else {
        tracing::debug!("close with no open window ignored");
        return;
    };
    tracing::debug!(window = %window.id, all_passed = window.all_passed(), "response window closed");
    tx.apply(ctx.system(SystemEvent::WindowClosed {
        window: window.id,
        window_type: window.window_type.clone(),
        source_id: window.source_id.clone(),
        all_passed: window.all_passed(),
    }));
}
