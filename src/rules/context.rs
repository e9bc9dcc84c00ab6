//! Per-command context handed to everything that produces events.

use crate::core::{Event, EventKind, GameRng, PlayerId, SystemEvent, SystemState};

/// Clock, RNG and id allocation for the command being processed.
///
/// Events built through the context carry the command's timestamp and
/// wire type, so nothing downstream needs a clock.
#[derive(Clone, Debug)]
pub struct CommandContext {
    timestamp: u64,
    command_type: &'static str,
    player: PlayerId,
    rng: GameRng,
    next_id: u64,
    interaction_timeout: Option<u64>,
}

impl CommandContext {
    /// Context for a command issued against `sys`.
    pub fn new(sys: &SystemState, player: PlayerId, command_type: &'static str, timestamp: u64) -> Self {
        Self {
            timestamp,
            command_type,
            player,
            rng: GameRng::for_revision(sys.seed, sys.revision),
            next_id: sys.next_id,
            interaction_timeout: None,
        }
    }

    /// Deadline offset applied to interactions requested without one.
    #[must_use]
    pub fn with_interaction_timeout(mut self, timeout: Option<u64>) -> Self {
        self.interaction_timeout = timeout;
        self
    }

    #[must_use]
    pub fn interaction_timeout(&self) -> Option<u64> {
        self.interaction_timeout
    }

    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[must_use]
    pub fn command_type(&self) -> &'static str {
        self.command_type
    }

    /// The player the current step acts for.
    #[must_use]
    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn rng(&mut self) -> &mut GameRng {
        &mut self.rng
    }

    /// Hand out an id not used by `sys` or by this command so far.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Catch up with ids recorded by events folded since creation.
    pub fn sync(&mut self, sys: &SystemState) {
        self.next_id = self.next_id.max(sys.next_id);
    }

    /// Switch to a follow-up step, e.g. an engine-initiated advance.
    pub fn act_as(&mut self, player: PlayerId, command_type: &'static str) {
        self.player = player;
        self.command_type = command_type;
    }

    pub fn event<E>(&self, kind: EventKind<E>) -> Event<E> {
        Event::new(kind, self.timestamp).with_source(self.command_type)
    }

    pub fn system<E>(&self, event: SystemEvent) -> Event<E> {
        self.event(EventKind::System(event))
    }

    pub fn domain<E>(&self, event: E) -> Event<E> {
        self.event(EventKind::Domain(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PhaseId;

    #[test]
    fn test_ids_are_unique_within_command() {
        let mut sys = SystemState::new(PhaseId::new(0), 1);
        sys.next_id = 5;
        let mut ctx = CommandContext::new(&sys, PlayerId::new(0), "TEST", 0);
        assert_eq!(ctx.allocate_id(), 5);
        assert_eq!(ctx.allocate_id(), 6);

        sys.next_id = 6;
        ctx.sync(&sys);
        assert_eq!(ctx.allocate_id(), 7);
    }

    #[test]
    fn test_events_carry_provenance() {
        let sys = SystemState::new(PhaseId::new(0), 1);
        let ctx = CommandContext::new(&sys, PlayerId::new(1), "PLAY", 321);
        let event: Event<u8> = ctx.domain(4);
        assert_eq!(event.timestamp, 321);
        assert_eq!(event.source_command.as_deref(), Some("PLAY"));
    }

    #[test]
    fn test_rng_depends_on_revision() {
        let mut sys = SystemState::new(PhaseId::new(0), 1);
        let mut a = CommandContext::new(&sys, PlayerId::new(0), "ROLL", 0);
        let mut b = CommandContext::new(&sys, PlayerId::new(0), "ROLL", 0);
        let rolls_a: Vec<_> = (0..8).map(|_| a.rng().roll_die(6)).collect();
        let rolls_b: Vec<_> = (0..8).map(|_| b.rng().roll_die(6)).collect();
        assert_eq!(rolls_a, rolls_b);

        sys.revision = 1;
        let mut c = CommandContext::new(&sys, PlayerId::new(0), "ROLL", 0);
        let rolls_c: Vec<_> = (0..8).map(|_| c.rng().roll_die(6)).collect();
        assert_ne!(rolls_a, rolls_c);
    }
}
