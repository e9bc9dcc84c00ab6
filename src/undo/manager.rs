//! Undo handshake: `Idle → Requested → Idle`.
//!
//! Every accepted command starts with a checkpoint event, which pushes
//! the pre-command state onto the match's bounded history. A player asks
//! to undo the latest command; other players approve or reject, and the
//! requester may cancel. Once enough approvals are in, the restore event
//! puts the latest snapshot back. The requester never counts towards the
//! approvals.

use crate::core::{PlayerId, SystemEvent, UndoConfig};
use crate::error::{Result, ValidationError};
use crate::rules::{CommandContext, Domain, Transition};

use super::UndoRequest;

/// Drives undo requests for one engine.
pub struct UndoManager<'c> {
    config: &'c UndoConfig,
    player_count: usize,
}

impl<'c> UndoManager<'c> {
    pub fn new(config: &'c UndoConfig, player_count: usize) -> Self {
        Self {
            config,
            player_count,
        }
    }

    /// Approvals a request needs. Capped by the number of other players,
    /// so a solo match undoes directly.
    #[must_use]
    pub fn required_approvals(&self) -> u32 {
        let others = u32::try_from(self.player_count.saturating_sub(1)).unwrap_or(u32::MAX);
        self.config.required_approvals.min(others)
    }

    /// Record the state before the current command.
    pub fn checkpoint<D: Domain>(&self, tx: &mut Transition<'_, D>, ctx: &CommandContext) {
        tx.apply(ctx.system(SystemEvent::UndoCheckpoint {
            limit: self.config.max_snapshots,
        }));
    }

    pub fn request<D: Domain>(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        ctx: &CommandContext,
    ) -> Result<()> {
        let state = tx.state();
        if state.history.is_empty() {
            return Err(ValidationError::NothingToUndo.into());
        }
        if let Some(pending) = &state.sys.undo.pending {
            return Err(ValidationError::UndoPending(pending.requester).into());
        }

        let required = self.required_approvals();
        tracing::debug!(requester = %player, required, depth = state.history.len(), "undo requested");
        tx.apply(ctx.system(SystemEvent::UndoRequested {
            requester: player,
            required,
        }));
        if required == 0 {
            restore(tx, player, ctx);
        }
        Ok(())
    }

    pub fn approve<D: Domain>(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        ctx: &CommandContext,
    ) -> Result<()> {
        let pending = pending_request(tx)?;
        if pending.requester == player {
            return Err(ValidationError::OwnUndoRequest(player).into());
        }
        if pending.approvals.contains(&player) {
            return Err(ValidationError::AlreadyApproved(player).into());
        }

        tx.apply(ctx.system(SystemEvent::UndoApproved { approver: player }));
        let approved = tx
            .state()
            .sys
            .undo
            .pending
            .as_ref()
            .is_some_and(UndoRequest::is_approved);
        tracing::debug!(approver = %player, requester = %pending.requester, approved, "undo approved");
        if approved {
            restore(tx, pending.requester, ctx);
        }
        Ok(())
    }

    /// Another player turns the request down.
    pub fn reject<D: Domain>(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        ctx: &CommandContext,
    ) -> Result<()> {
        let pending = pending_request(tx)?;
        if pending.requester == player {
            return Err(ValidationError::OwnUndoRequest(player).into());
        }
        tracing::debug!(requester = %pending.requester, by = %player, "undo rejected");
        tx.apply(ctx.system(SystemEvent::UndoRejected {
            requester: pending.requester,
            by: player,
        }));
        Ok(())
    }

    /// The requester withdraws.
    pub fn cancel<D: Domain>(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        ctx: &CommandContext,
    ) -> Result<()> {
        let pending = pending_request(tx)?;
        if pending.requester != player {
            return Err(ValidationError::NotUndoRequester {
                requester: pending.requester,
                got: player,
            }
            .into());
        }
        tracing::debug!(requester = %player, "undo cancelled");
        tx.apply(ctx.system(SystemEvent::UndoCancelled { requester: player }));
        Ok(())
    }
}

fn pending_request<D: Domain>(tx: &Transition<'_, D>) -> Result<UndoRequest, ValidationError> {
    tx.state()
        .sys
        .undo
        .pending
        .clone()
        .ok_or(ValidationError::NoUndoRequest)
}

fn restore<D: Domain>(tx: &mut Transition<'_, D>, requester: PlayerId, ctx: &CommandContext) {
    let to_revision = tx.state().history.latest().map_or(0, |s| s.sys.revision);
    tracing::debug!(%requester, to_revision, "undo applied");
    tx.apply(ctx.system(SystemEvent::UndoApplied {
        requester,
        to_revision,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Command, EngineConfig, Event, EventName, MatchState};
    use crate::error::EngineError;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Add(i64);

    impl EventName for Add {
        fn event_name(&self) -> &'static str {
            "ADD"
        }
    }

    struct Counter;

    impl Domain for Counter {
        type Core = i64;
        type Event = Add;
        type Command = ();

        fn reduce(&self, core: &i64, event: &Add) -> i64 {
            core + event.0
        }

        fn execute(
            &self,
            _state: &MatchState<i64>,
            _command: &Command<()>,
            _ctx: &mut CommandContext,
        ) -> Result<Vec<Event<Add>>> {
            Ok(Vec::new())
        }

        fn active_player(&self, _core: &i64) -> PlayerId {
            PlayerId::new(0)
        }
    }

    fn context(state: &MatchState<i64>) -> CommandContext {
        CommandContext::new(&state.sys, PlayerId::new(0), "TEST", 0)
    }

    /// Two commands adding 2 then 3, each behind a checkpoint.
    fn played(manager: &UndoManager<'_>) -> MatchState<i64> {
        let mut state = MatchState::new(0, &EngineConfig::new(3), 1);
        for amount in [2, 3] {
            let ctx = context(&state);
            let mut tx = Transition::new(&Counter, state);
            manager.checkpoint(&mut tx, &ctx);
            tx.apply(ctx.domain(Add(amount)));
            state = tx.into_parts().0;
        }
        state
    }

    fn run(
        state: &MatchState<i64>,
        f: impl FnOnce(&mut Transition<'_, Counter>, &CommandContext) -> Result<()>,
    ) -> Result<MatchState<i64>> {
        let ctx = context(state);
        let mut tx = Transition::new(&Counter, state.clone());
        f(&mut tx, &ctx)?;
        Ok(tx.into_parts().0)
    }

    #[test]
    fn test_required_approvals_capped_by_others() {
        let config = UndoConfig::default().with_required_approvals(5);
        assert_eq!(UndoManager::new(&config, 3).required_approvals(), 2);
        assert_eq!(UndoManager::new(&config, 1).required_approvals(), 0);
    }

    #[test]
    fn test_approval_restores_latest_snapshot() {
        let config = UndoConfig::default();
        let manager = UndoManager::new(&config, 3);
        let state = played(&manager);
        assert_eq!(state.core, 5);
        assert_eq!(state.sys.undo.depth, 2);

        let p0 = PlayerId::new(0);
        let requested = run(&state, |tx, ctx| manager.request(tx, p0, ctx)).unwrap();
        assert_eq!(requested.core, 5);
        assert!(requested.sys.undo.pending.is_some());

        let undone = run(&requested, |tx, ctx| manager.approve(tx, PlayerId::new(1), ctx)).unwrap();
        assert_eq!(undone.core, 2);
        assert!(undone.sys.undo.pending.is_none());
        assert_eq!(undone.sys.undo.depth, 1);
        assert!(undone.sys.revision > requested.sys.revision);
    }

    #[test]
    fn test_requester_cannot_approve_or_reject() {
        let config = UndoConfig::default();
        let manager = UndoManager::new(&config, 2);
        let p0 = PlayerId::new(0);
        let requested = run(&played(&manager), |tx, ctx| manager.request(tx, p0, ctx)).unwrap();

        let err = run(&requested, |tx, ctx| manager.approve(tx, p0, ctx)).unwrap_err();
        assert_eq!(err, EngineError::from(ValidationError::OwnUndoRequest(p0)));
        let err = run(&requested, |tx, ctx| manager.reject(tx, p0, ctx)).unwrap_err();
        assert_eq!(err.reason_code(), "own_undo_request");
    }

    #[test]
    fn test_duplicate_approval_rejected() {
        let config = UndoConfig::default().with_required_approvals(2);
        let manager = UndoManager::new(&config, 3);
        let p1 = PlayerId::new(1);
        let requested = run(&played(&manager), |tx, ctx| manager.request(tx, PlayerId::new(0), ctx)).unwrap();
        let once = run(&requested, |tx, ctx| manager.approve(tx, p1, ctx)).unwrap();
        assert_eq!(once.core, 5);

        let err = run(&once, |tx, ctx| manager.approve(tx, p1, ctx)).unwrap_err();
        assert_eq!(err.reason_code(), "already_approved");
    }

    #[test]
    fn test_only_requester_cancels() {
        let config = UndoConfig::default();
        let manager = UndoManager::new(&config, 2);
        let p0 = PlayerId::new(0);
        let requested = run(&played(&manager), |tx, ctx| manager.request(tx, p0, ctx)).unwrap();

        let err = run(&requested, |tx, ctx| manager.cancel(tx, PlayerId::new(1), ctx)).unwrap_err();
        assert_eq!(
            err,
            EngineError::from(ValidationError::NotUndoRequester {
                requester: p0,
                got: PlayerId::new(1),
            })
        );
        let cancelled = run(&requested, |tx, ctx| manager.cancel(tx, p0, ctx)).unwrap();
        assert!(cancelled.sys.undo.pending.is_none());
        assert_eq!(cancelled.core, 5);
    }

    #[test]
    fn test_empty_history() {
        let config = UndoConfig::default();
        let manager = UndoManager::new(&config, 2);
        let state = MatchState::new(0, &EngineConfig::new(2), 1);
        let err = run(&state, |tx, ctx| manager.request(tx, PlayerId::new(0), ctx)).unwrap_err();
        assert_eq!(err.reason_code(), "nothing_to_undo");
    }
}
