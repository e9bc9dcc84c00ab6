//! The interaction lifecycle: `Idle → Active → {Resolved, Cancelled,
//! Expired}`.
//!
//! The manager never mutates state. Each operation checks the command
//! against the current state, appends the canonical marker event, and
//! for resolutions runs the continuation against the post-marker state.
//! Ordering within a resolution is fixed:
//!
//! 1. `InteractionResolved`
//! 2. the continuation's events (a request here becomes active at once,
//!    which is how chains work)
//! 3. `InteractionActivated` for the next deferred interaction, if the
//!    active slot is still empty

use super::kind::{Interaction, InteractionId, InteractionRequest, Resolution};
use crate::core::{Event, InteractionState, PlayerId, SystemEvent, SystemState};
use crate::error::{EngineFault, Result, ValidationError};
use crate::registry::{ContinuationArgs, Registry};
use crate::rules::{CommandContext, Domain, Transition};

/// Drives interactions for one engine.
pub struct InteractionManager<'r, D: Domain> {
    registry: &'r Registry<D>,
}

impl<'r, D: Domain> InteractionManager<'r, D> {
    pub fn new(registry: &'r Registry<D>) -> Self {
        Self { registry }
    }

    /// Build the event requesting `request`. The interaction becomes
    /// active when folded if nothing else is; otherwise it is deferred.
    pub fn request<E>(request: InteractionRequest, ctx: &mut CommandContext) -> Event<E> {
        let id = InteractionId(ctx.allocate_id());
        let mut interaction = request.into_interaction(id);
        if interaction.deadline.is_none() {
            interaction.deadline = ctx
                .interaction_timeout()
                .map(|timeout| ctx.timestamp().saturating_add(timeout));
        }
        tracing::debug!(%id, player = %interaction.player, kind = interaction.kind.name(), "interaction requested");
        ctx.system(SystemEvent::InteractionRequested(interaction))
    }

    /// Answer the active interaction.
    pub fn resolve(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        id: InteractionId,
        resolution: Resolution,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        let interaction = active_matching(&tx.state().sys, id)?.clone();
        check_owner(&interaction, player)?;
        interaction.validate(&resolution)?;

        if resolution.is_cancel_choice() {
            return self.finish_cancel(tx, interaction, ctx);
        }

        tx.apply(ctx.system(SystemEvent::InteractionResolved {
            id,
            player,
            resolution: resolution.clone(),
            source_id: interaction.source_id.clone(),
        }));
        tracing::debug!(%id, %player, "interaction resolved");

        if let Some(continuation) = &interaction.continuation {
            let handler = self
                .registry
                .continuation(&continuation.handler)
                .ok_or_else(|| EngineFault::MissingContinuation(continuation.handler.clone()))?;
            ctx.sync(&tx.state().sys);
            let args = ContinuationArgs {
                state: tx.state(),
                interaction: &interaction,
                resolution: &resolution,
            };
            let events = handler(&args, ctx)?;
            tx.apply_all(events);
        }

        promote_next(tx, ctx);
        Ok(())
    }

    /// Withdraw the active interaction without running its continuation.
    /// Cancelling an already-closed interaction is a no-op.
    pub fn cancel(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        id: InteractionId,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        if tx.state().sys.is_closed(id) {
            tracing::debug!(%id, "cancel of closed interaction ignored");
            return Ok(());
        }
        let interaction = active_matching(&tx.state().sys, id)?.clone();
        check_owner(&interaction, player)?;
        self.finish_cancel(tx, interaction, ctx)
    }

    /// Time out the active interaction. Driven by the host's clock;
    /// expiring an already-closed interaction is a no-op.
    pub fn expire(
        &self,
        tx: &mut Transition<'_, D>,
        id: InteractionId,
        now: u64,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        if tx.state().sys.is_closed(id) {
            tracing::debug!(%id, "expiry of closed interaction ignored");
            return Ok(());
        }
        let interaction = active_matching(&tx.state().sys, id)?.clone();
        if let Some(deadline) = interaction.deadline {
            if now < deadline {
                return Err(ValidationError::NotYetExpired {
                    interaction: id,
                    deadline,
                    now,
                }
                .into());
            }
        }

        tx.apply(ctx.system(SystemEvent::InteractionExpired {
            id,
            player: interaction.player,
            source_id: interaction.source_id,
            now,
        }));
        tracing::debug!(%id, now, "interaction expired");
        promote_next(tx, ctx);
        Ok(())
    }

    fn finish_cancel(
        &self,
        tx: &mut Transition<'_, D>,
        interaction: Interaction,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        tx.apply(ctx.system(SystemEvent::InteractionCancelled {
            id: interaction.id,
            player: interaction.player,
            source_id: interaction.source_id,
        }));
        tracing::debug!(id = %interaction.id, "interaction cancelled");
        promote_next(tx, ctx);
        Ok(())
    }
}

/// Interactions `viewer` is allowed to see.
pub fn visible_to(state: &InteractionState, viewer: PlayerId) -> InteractionState {
    InteractionState {
        current: state.current.clone().filter(|i| i.player == viewer),
        queue: state
            .queue
            .iter()
            .filter(|i| i.player == viewer)
            .cloned()
            .collect(),
    }
}

fn active_matching(sys: &SystemState, id: InteractionId) -> Result<&Interaction, ValidationError> {
    match sys.active_interaction() {
        Some(active) if active.id == id => Ok(active),
        active => Err(ValidationError::StaleInteraction {
            active: active.map(|i| i.id),
            got: id,
        }),
    }
}

fn check_owner(interaction: &Interaction, player: PlayerId) -> Result<(), ValidationError> {
    if interaction.player == player {
        Ok(())
    } else {
        Err(ValidationError::NotInteractionOwner {
            interaction: interaction.id,
            player,
        })
    }
}

fn promote_next<D: Domain>(tx: &mut Transition<'_, D>, ctx: &CommandContext) {
    let sys = &tx.state().sys;
    if sys.interaction.current.is_some() {
        return;
    }
    if let Some(next) = sys.interaction.queue.front().map(|i| i.id) {
        tx.apply(ctx.system(SystemEvent::InteractionActivated { id: next }));
    }
}
