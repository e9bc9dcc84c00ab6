//! Responder ordering.
//!
//! When several players may react to the same effect, the ones directly
//! involved (attacker, defender) go first, then bystanders. Inside each
//! group players act in turn order starting from the active player. The
//! order is computed once when a window opens.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::PlayerId;

/// Inline capacity for responder queues; most tables seat four or fewer.
pub type ResponderQueue = SmallVec<[PlayerId; 4]>;

/// How a candidate is involved in the effect a window is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponderRole {
    Attacker,
    Defender,
    Bystander,
}

impl ResponderRole {
    const fn rank(self) -> u8 {
        match self {
            ResponderRole::Attacker | ResponderRole::Defender => 0,
            ResponderRole::Bystander => 1,
        }
    }
}

/// Order `candidates` for a window opened while `active` holds the turn.
///
/// Duplicate candidates keep their best role and appear once.
///
/// ```
/// use tabletop_engine::core::PlayerId;
/// use tabletop_engine::response::{responder_order, ResponderRole};
///
/// let active = PlayerId::new(1);
/// let order = responder_order(
///     active,
///     4,
///     &[
///         (PlayerId::new(2), ResponderRole::Bystander),
///         (PlayerId::new(0), ResponderRole::Defender),
///         (PlayerId::new(1), ResponderRole::Attacker),
///         (PlayerId::new(3), ResponderRole::Bystander),
///     ],
/// );
///
/// let seats: Vec<u8> = order.iter().map(|p| p.0).collect();
/// assert_eq!(seats, vec![1, 0, 2, 3]);
/// ```
pub fn responder_order(
    active: PlayerId,
    player_count: usize,
    candidates: &[(PlayerId, ResponderRole)],
) -> ResponderQueue {
    let mut ranked: SmallVec<[(u8, usize, PlayerId); 4]> = SmallVec::new();

    for &(player, role) in candidates {
        let key = (role.rank(), player.turn_distance(active, player_count), player);
        match ranked.iter_mut().find(|(_, _, p)| *p == player) {
            Some(existing) if key < *existing => *existing = key,
            Some(_) => {}
            None => ranked.push(key),
        }
    }

    ranked.sort_unstable();
    ranked.into_iter().map(|(_, _, player)| player).collect()
}
