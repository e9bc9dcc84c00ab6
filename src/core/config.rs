//! Engine configuration.
//!
//! Games configure the engine at startup with an `EngineConfig`: how many
//! seats, which phase the match starts in, the static phase order, and
//! limits the engine enforces on itself. The engine never hardcodes
//! phases; games define them as `PhaseId` constants.

use serde::{Deserialize, Serialize};

/// Opaque phase identifier. Games define their own phases.
///
/// The engine only compares phases for equality and looks them up in
/// the configured phase order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseId(pub u32);

impl PhaseId {
    /// Create a new phase ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Phase({})", self.0)
    }
}

/// Default number of engine-initiated advances allowed per command.
pub const DEFAULT_MAX_AUTO_CONTINUE: u32 = 16;

/// Default number of pre-command snapshots kept for undo.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 50;

/// Undo settings. Undo is off unless the engine config carries one.
///
/// ```
/// use tabletop_engine::core::UndoConfig;
///
/// let undo = UndoConfig::default().with_max_snapshots(10).with_required_approvals(0);
/// assert_eq!(undo.max_snapshots, 10);
/// assert_eq!(undo.required_approvals, 0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoConfig {
    /// Oldest snapshots are dropped beyond this many.
    pub max_snapshots: usize,

    /// Approvals from other players before an undo applies. Zero undoes
    /// on request.
    pub required_approvals: u32,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            required_approvals: 1,
        }
    }
}

impl UndoConfig {
    #[must_use]
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }

    #[must_use]
    pub fn with_required_approvals(mut self, approvals: u32) -> Self {
        self.required_approvals = approvals;
        self
    }
}

/// Complete engine configuration.
///
/// ```
/// use tabletop_engine::core::{EngineConfig, PhaseId};
///
/// let config = EngineConfig::new(2)
///     .with_phase_order([PhaseId::new(0), PhaseId::new(1), PhaseId::new(2)])
///     .with_max_auto_continue(4);
///
/// assert_eq!(config.initial_phase, PhaseId::new(0));
/// assert_eq!(config.next_phase(PhaseId::new(2)), Some(PhaseId::new(0)));
/// assert_eq!(config.next_phase(PhaseId::new(9)), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of players (1-255).
    pub player_count: usize,

    /// Phase the match starts in.
    pub initial_phase: PhaseId,

    /// Static phase order. After the last phase comes the first.
    pub phase_order: Vec<PhaseId>,

    /// Upper bound on auto-continue advances within one command.
    pub max_auto_continue: u32,

    /// Deadline applied to interactions that do not carry their own,
    /// measured in the host's timestamp units.
    pub default_interaction_timeout: Option<u64>,

    /// Undo settings; `None` rejects undo commands.
    #[serde(default)]
    pub undo: Option<UndoConfig>,
}

impl EngineConfig {
    /// Create a configuration for `player_count` seats.
    pub fn new(player_count: usize) -> Self {
        assert!(player_count > 0, "Must have at least 1 player");
        assert!(player_count <= 255, "At most 255 players supported");

        Self {
            player_count,
            initial_phase: PhaseId::default(),
            phase_order: Vec::new(),
            max_auto_continue: DEFAULT_MAX_AUTO_CONTINUE,
            default_interaction_timeout: None,
            undo: None,
        }
    }

    /// Set the static phase order. The first phase becomes the initial
    /// phase.
    #[must_use]
    pub fn with_phase_order(mut self, phases: impl IntoIterator<Item = PhaseId>) -> Self {
        self.phase_order = phases.into_iter().collect();
        if let Some(first) = self.phase_order.first() {
            self.initial_phase = *first;
        }
        self
    }

    /// Set the initial phase.
    #[must_use]
    pub fn with_initial_phase(mut self, phase: PhaseId) -> Self {
        self.initial_phase = phase;
        self
    }

    /// Set the auto-continue bound.
    #[must_use]
    pub fn with_max_auto_continue(mut self, max: u32) -> Self {
        self.max_auto_continue = max;
        self
    }

    /// Set the default interaction deadline.
    #[must_use]
    pub fn with_interaction_timeout(mut self, timeout: u64) -> Self {
        self.default_interaction_timeout = Some(timeout);
        self
    }

    /// Enable undo.
    #[must_use]
    pub fn with_undo(mut self, undo: UndoConfig) -> Self {
        self.undo = Some(undo);
        self
    }

    /// The phase after `phase` in the static order.
    #[must_use]
    pub fn next_phase(&self, phase: PhaseId) -> Option<PhaseId> {
        let position = self.phase_order.iter().position(|p| *p == phase)?;
        let next = (position + 1) % self.phase_order.len();
        self.phase_order.get(next).copied()
    }

    /// Whether `phase` is a known phase. An empty order accepts any phase.
    #[must_use]
    pub fn knows_phase(&self, phase: PhaseId) -> bool {
        self.phase_order.is_empty() || self.phase_order.contains(&phase)
    }
}
