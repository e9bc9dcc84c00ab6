//! Duel state and how the magnitude pipeline reads it.

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use crate::core::{EntityId, PhaseId, PlayerId, PlayerMap};
use crate::effects::modifier::priority;
use crate::effects::{BoundedResource, MagnitudeSource, Modifier, ModifierOrigin, Shield};

pub const UPKEEP: PhaseId = PhaseId(0);
pub const INCOME: PhaseId = PhaseId(1);
pub const MAIN: PhaseId = PhaseId(2);
pub const ATTACK: PhaseId = PhaseId(3);
pub const END: PhaseId = PhaseId(4);

/// Turn structure.
pub const PHASES: [PhaseId; 5] = [UPKEEP, INCOME, MAIN, ATTACK, END];

/// Tokens a fighter holds. Stacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Token {
    /// +1 outgoing damage per stack.
    Fury,
    /// Spent to react before an attack lands.
    Protect,
}

/// Statuses on a fighter. Stacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    /// -1 incoming damage per stack.
    Armor,
    /// +50% incoming damage. Cleared at the fighter's upkeep.
    Vulnerable,
    /// Skips the fighter's next main and attack phases.
    Stunned,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fighter {
    pub health: BoundedResource,
    pub cp: i64,
    /// Grant order; the front absorbs first.
    pub shields: Vector<Shield>,
    pub tokens: OrdMap<Token, u32>,
    pub statuses: OrdMap<Status, u32>,
}

impl Fighter {
    pub fn new(health: i64, cp: i64) -> Self {
        Self {
            health: BoundedResource::full(health),
            cp,
            shields: Vector::new(),
            tokens: OrdMap::new(),
            statuses: OrdMap::new(),
        }
    }

    #[must_use]
    pub fn token(&self, token: Token) -> u32 {
        self.tokens.get(&token).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn status(&self, status: Status) -> u32 {
        self.statuses.get(&status).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_defeated(&self) -> bool {
        self.health.is_empty()
    }
}

/// An attack declared in the main phase, resolved when the attack phase
/// ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAttack {
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub base: i64,
    /// The pre-damage response window has closed.
    pub reactions_done: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelState {
    pub active: PlayerId,
    pub round: u32,
    pub fighters: PlayerMap<Fighter>,
    pub pending_attack: Option<PendingAttack>,
    pub winner: Option<PlayerId>,
}

impl DuelState {
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.fighters.player_count()
    }

    pub fn fighter(&self, entity: EntityId) -> Option<&Fighter> {
        entity
            .as_player(self.player_count())
            .and_then(|player| self.fighters.get(player))
    }

    /// Living seats other than `player`, in seat order.
    pub fn opponents(&self, player: PlayerId) -> impl Iterator<Item = PlayerId> + '_ {
        self.fighters
            .iter()
            .filter(move |(seat, fighter)| *seat != player && !fighter.is_defeated())
            .map(|(seat, _)| seat)
    }

    /// Next living seat after `player`.
    #[must_use]
    pub fn next_alive(&self, player: PlayerId) -> PlayerId {
        let count = self.player_count();
        let mut seat = player.next(count);
        for _ in 0..count {
            if self.fighters.get(seat).is_some_and(|f| !f.is_defeated()) {
                return seat;
            }
            seat = seat.next(count);
        }
        player
    }
}

impl MagnitudeSource for DuelState {
    fn contains_entity(&self, entity: EntityId) -> bool {
        self.fighter(entity).is_some()
    }

    fn token_modifiers(&self, source: EntityId) -> Vec<Modifier> {
        let Some(fighter) = self.fighter(source) else {
            return Vec::new();
        };
        match fighter.token(Token::Fury) {
            0 => Vec::new(),
            stacks => vec![Modifier::flat("fury", i64::from(stacks), ModifierOrigin::Token)
                .with_priority(priority::TOKEN)
                .with_source(source)
                .with_label("Fury")],
        }
    }

    fn status_modifiers(&self, target: EntityId) -> Vec<Modifier> {
        let Some(fighter) = self.fighter(target) else {
            return Vec::new();
        };
        let mut modifiers = Vec::new();
        if let armor @ 1.. = fighter.status(Status::Armor) {
            modifiers.push(
                Modifier::flat("armor", -i64::from(armor), ModifierOrigin::Status)
                    .with_priority(priority::PREVENTION)
                    .with_source(target)
                    .with_label("Armor"),
            );
        }
        if fighter.status(Status::Vulnerable) > 0 {
            modifiers.push(
                Modifier::percent("vulnerable", 50, ModifierOrigin::Status)
                    .with_priority(priority::STATUS)
                    .with_source(target)
                    .with_label("Vulnerable"),
            );
        }
        modifiers
    }

    fn shields(&self, target: EntityId) -> Vector<Shield> {
        self.fighter(target)
            .map(|f| f.shields.clone())
            .unwrap_or_default()
    }
}
