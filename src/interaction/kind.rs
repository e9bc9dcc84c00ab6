//! Interaction records and their kinds.
//!
//! An interaction is a blocking request for one player's input. It is
//! plain data: the follow-up logic is named by a [`Continuation`] and
//! looked up in the [`Registry`](crate::registry::Registry) when the
//! player answers, so a pending interaction survives a process restart.

use serde::{Deserialize, Serialize};

use crate::core::{PlayerId, Value};
use crate::error::ValidationError;

/// Option id that, when offered and selected, cancels the interaction.
pub const CANCEL_OPTION_ID: &str = "__cancel__";

/// Stable interaction identifier, allocated from the match's id counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub u64);

impl InteractionId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InteractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interaction({})", self.0)
    }
}

/// Name of a registered continuation handler.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId(pub String);

impl HandlerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to run when an interaction resolves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    pub handler: HandlerId,
    pub params: Value,
}

/// One selectable entry of a choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
    pub value: Value,
    pub disabled: bool,
}

impl ChoiceOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value: Value::Null,
            disabled: false,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// How many options a choice accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    Single,
    Multi { min: usize, max: usize },
}

/// Pick one or more options from a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSpec {
    pub title: String,
    pub options: Vec<ChoiceOption>,
    pub selection: Selection,
    /// Offer [`CANCEL_OPTION_ID`] as an extra answer.
    pub cancel_option: bool,
}

impl ChoiceSpec {
    pub fn new(title: impl Into<String>, options: Vec<ChoiceOption>) -> Self {
        Self {
            title: title.into(),
            options,
            selection: Selection::Single,
            cancel_option: false,
        }
    }

    #[must_use]
    pub fn multi(mut self, min: usize, max: usize) -> Self {
        self.selection = Selection::Multi { min, max };
        self
    }

    #[must_use]
    pub fn with_cancel_option(mut self) -> Self {
        self.cancel_option = true;
        self
    }

    /// Options a player may actually pick.
    pub fn enabled_options(&self) -> impl Iterator<Item = &ChoiceOption> {
        self.options.iter().filter(|o| !o.disabled)
    }
}

/// Pick a number from a stepped range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliderSpec {
    pub title: String,
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub default: i64,
    pub allow_skip: bool,
}

impl SliderSpec {
    pub fn new(title: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            title: title.into(),
            min,
            max,
            step: 1,
            default: min,
            allow_skip: false,
        }
    }

    #[must_use]
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: i64) -> Self {
        self.default = default;
        self
    }

    #[must_use]
    pub fn skippable(mut self) -> Self {
        self.allow_skip = true;
        self
    }
}

/// Interaction kinds the engine knows how to validate. `Custom` kinds
/// are validated by their continuation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    SimpleChoice(ChoiceSpec),
    Slider(SliderSpec),
    Custom(String),
}

impl InteractionKind {
    pub fn name(&self) -> &str {
        match self {
            InteractionKind::SimpleChoice(_) => "simple-choice",
            InteractionKind::Slider(_) => "slider",
            InteractionKind::Custom(name) => name,
        }
    }
}

/// A player's answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Selected option ids.
    Choice(Vec<String>),
    /// Slider value, `None` for skip.
    Amount(Option<i64>),
    Custom(Value),
}

impl Resolution {
    /// Single-option shorthand.
    pub fn choose(option: impl Into<String>) -> Self {
        Resolution::Choice(vec![option.into()])
    }

    /// The first selected option id, if any.
    #[must_use]
    pub fn first_choice(&self) -> Option<&str> {
        match self {
            Resolution::Choice(ids) => ids.first().map(String::as_str),
            _ => None,
        }
    }

    #[must_use]
    pub fn amount(&self) -> Option<i64> {
        match self {
            Resolution::Amount(v) => *v,
            _ => None,
        }
    }

    pub(crate) fn is_cancel_choice(&self) -> bool {
        matches!(self, Resolution::Choice(ids) if ids.len() == 1 && ids[0] == CANCEL_OPTION_ID)
    }
}

/// An interaction before an id has been allocated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionRequest {
    pub player: PlayerId,
    pub kind: InteractionKind,
    pub source_id: Option<String>,
    pub data: Value,
    pub continuation: Option<Continuation>,
    pub deadline: Option<u64>,
}

impl InteractionRequest {
    pub fn new(player: PlayerId, kind: InteractionKind) -> Self {
        Self {
            player,
            kind,
            source_id: None,
            data: Value::Null,
            continuation: None,
            deadline: None,
        }
    }

    pub fn choice(player: PlayerId, spec: ChoiceSpec) -> Self {
        Self::new(player, InteractionKind::SimpleChoice(spec))
    }

    pub fn slider(player: PlayerId, spec: SliderSpec) -> Self {
        Self::new(player, InteractionKind::Slider(spec))
    }

    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_continuation(mut self, handler: impl Into<String>, params: Value) -> Self {
        self.continuation = Some(Continuation {
            handler: HandlerId::new(handler),
            params,
        });
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn into_interaction(self, id: InteractionId) -> Interaction {
        Interaction {
            id,
            player: self.player,
            kind: self.kind,
            source_id: self.source_id,
            data: self.data,
            continuation: self.continuation,
            deadline: self.deadline,
        }
    }
}

/// A pending decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub player: PlayerId,
    pub kind: InteractionKind,
    pub source_id: Option<String>,
    pub data: Value,
    pub continuation: Option<Continuation>,
    /// Timestamp after which the host may expire this interaction.
    pub deadline: Option<u64>,
}

impl Interaction {
    /// Check an answer against the interaction's kind.
    pub fn validate(&self, resolution: &Resolution) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidResolution {
            interaction: self.id,
            reason,
        };

        match (&self.kind, resolution) {
            (InteractionKind::SimpleChoice(spec), Resolution::Choice(ids)) => {
                if spec.cancel_option && resolution.is_cancel_choice() {
                    return Ok(());
                }
                let (min, max) = match spec.selection {
                    Selection::Single => (1, 1),
                    Selection::Multi { min, max } => (min, max),
                };
                if ids.len() < min {
                    return Err(invalid(format!("select at least {min}")));
                }
                if ids.len() > max {
                    return Err(invalid(format!("select at most {max}")));
                }
                for (i, id) in ids.iter().enumerate() {
                    if ids[..i].contains(id) {
                        return Err(invalid(format!("option {id} selected twice")));
                    }
                    match spec.options.iter().find(|o| &o.id == id) {
                        None => return Err(invalid(format!("unknown option {id}"))),
                        Some(option) if option.disabled => {
                            return Err(invalid(format!("option {id} is disabled")))
                        }
                        Some(_) => {}
                    }
                }
                Ok(())
            }
            (InteractionKind::Slider(spec), Resolution::Amount(amount)) => match amount {
                None if spec.allow_skip => Ok(()),
                None => Err(invalid("this choice cannot be skipped".into())),
                Some(v) if *v < spec.min || *v > spec.max => Err(invalid(format!(
                    "{v} outside {}..={}",
                    spec.min, spec.max
                ))),
                Some(v) if spec.step > 0 && (v - spec.min) % spec.step != 0 => {
                    Err(invalid(format!("{v} is not a multiple of step {}", spec.step)))
                }
                Some(_) => Ok(()),
            },
            (InteractionKind::Custom(_), _) => Ok(()),
            (kind, _) => Err(invalid(format!("wrong answer shape for {}", kind.name()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(spec: ChoiceSpec) -> Interaction {
        InteractionRequest::choice(PlayerId::new(0), spec).into_interaction(InteractionId(1))
    }

    fn options() -> Vec<ChoiceOption> {
        vec![
            ChoiceOption::new("a", "Alpha"),
            ChoiceOption::new("b", "Beta"),
            ChoiceOption::new("c", "Gamma").disabled(),
        ]
    }

    #[test]
    fn test_single_choice() {
        let i = choice(ChoiceSpec::new("pick", options()));
        assert!(i.validate(&Resolution::choose("a")).is_ok());
        assert!(i.validate(&Resolution::choose("z")).is_err());
        assert!(i.validate(&Resolution::choose("c")).is_err());
        assert!(i.validate(&Resolution::Choice(vec![])).is_err());
        assert!(i.validate(&Resolution::Amount(Some(1))).is_err());
    }

    #[test]
    fn test_multi_choice_bounds() {
        let i = choice(ChoiceSpec::new("pick", options()).multi(1, 2));
        assert!(i.validate(&Resolution::Choice(vec!["a".into(), "b".into()])).is_ok());
        assert!(i
            .validate(&Resolution::Choice(vec!["a".into(), "a".into()]))
            .is_err());
        assert!(i.validate(&Resolution::Choice(vec![])).is_err());
    }

    #[test]
    fn test_cancel_option_only_when_offered() {
        let without = choice(ChoiceSpec::new("pick", options()));
        let with = choice(ChoiceSpec::new("pick", options()).with_cancel_option());
        let cancel = Resolution::choose(CANCEL_OPTION_ID);
        assert!(without.validate(&cancel).is_err());
        assert!(with.validate(&cancel).is_ok());
    }

    #[test]
    fn test_slider() {
        let spec = SliderSpec::new("spend", 0, 6).with_step(2);
        let i = InteractionRequest::slider(PlayerId::new(0), spec.clone())
            .into_interaction(InteractionId(2));
        assert!(i.validate(&Resolution::Amount(Some(4))).is_ok());
        assert!(i.validate(&Resolution::Amount(Some(3))).is_err());
        assert!(i.validate(&Resolution::Amount(Some(8))).is_err());
        assert!(i.validate(&Resolution::Amount(None)).is_err());

        let skippable = InteractionRequest::slider(PlayerId::new(0), spec.skippable())
            .into_interaction(InteractionId(3));
        assert!(skippable.validate(&Resolution::Amount(None)).is_ok());
    }

    #[test]
    fn test_custom_accepts_anything() {
        let i = InteractionRequest::new(PlayerId::new(1), InteractionKind::Custom("dice".into()))
            .into_interaction(InteractionId(4));
        assert!(i.validate(&Resolution::Custom(Value::from(3))).is_ok());
        assert_eq!(i.kind.name(), "dice");
    }
}
