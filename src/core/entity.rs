//! Entity identification.
//!
//! Anything a magnitude can come from or land on (a player, a minion, a
//! summoned object) is addressed by an `EntityId`.
//!
//! ## ID Layout
//!
//! - `0..player_count`: the players themselves
//! - `player_count..`: other entities, allocated by the game
//!
//! ```
//! use tabletop_engine::core::{EntityId, PlayerId};
//!
//! let hero = EntityId::from(PlayerId::new(1));
//! assert!(hero.is_player(2));
//! assert_eq!(hero.as_player(2), Some(PlayerId::new(1)));
//!
//! let minion = EntityId(7);
//! assert_eq!(minion.as_player(2), None);
//! ```

use serde::{Deserialize, Serialize};

use super::PlayerId;

/// Identifier for any entity that can be a source or target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The entity standing for a seated player.
    #[must_use]
    pub const fn player_id(index: u8) -> Self {
        Self(index as u32)
    }

    /// First id available for non-player entities.
    #[must_use]
    pub const fn first_non_player(player_count: usize) -> u32 {
        player_count as u32
    }

    /// Whether this id refers to a player at a table of `player_count`.
    #[must_use]
    pub const fn is_player(self, player_count: usize) -> bool {
        self.0 < player_count as u32
    }

    /// Convert to a seat if this is a player entity.
    #[must_use]
    pub fn as_player(self, player_count: usize) -> Option<PlayerId> {
        if self.is_player(player_count) {
            Some(PlayerId::new(self.0 as u8))
        } else {
            None
        }
    }

    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<PlayerId> for EntityId {
    fn from(player: PlayerId) -> Self {
        Self::player_id(player.0)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}
