//! Core types: tracked choices, trigger configuration, and input keys.
//!
//! Choices are opaque host values; the core only ever sees them through the
//! label function of the trigger that produced them.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

/// Char range binding a committed choice to the text, plus the trigger that
/// produced it.
///
/// The invariant `text[start..end] == label(choice)` holds except transiently
/// between an edit and the next reconciliation pass; while a label is absent
/// from the text the span is parked (see [`ChoiceIndices::is_unresolved`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceIndices {
    /// Char offset of the first label character.
    pub start: usize,
    /// Char offset one past the last label character.
    pub end: usize,
    /// The trigger character this choice was committed under.
    pub trigger_character: char,
}

impl ChoiceIndices {
    /// Sentinel span for a choice whose label is currently absent from the
    /// text. Never matches any containment check.
    pub const UNRESOLVED: usize = usize::MAX;

    pub fn new(start: usize, end: usize, trigger_character: char) -> Self {
        Self {
            start,
            end,
            trigger_character,
        }
    }

    /// Whether reconciliation failed to locate this choice's label.
    pub fn is_unresolved(&self) -> bool {
        self.start == Self::UNRESOLVED
    }

    /// Inclusive containment, the form the commit/edit protocol uses: a caret
    /// at either edge still counts as being on the choice.
    pub fn contains(&self, offset: usize) -> bool {
        !self.is_unresolved() && self.start <= offset && offset <= self.end
    }
}

/// A live choice-to-text-range binding.
///
/// Owned by the reconciliation engine; hosts receive clones and must route
/// changes back through the editor rather than mutating them in place.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedChoice<C> {
    /// The host-supplied choice value. Never inspected beyond the trigger's
    /// label function.
    pub choice: C,
    pub indices: ChoiceIndices,
    /// Overrides the overlay's default CSS class when set.
    pub css_class: Option<SmolStr>,
}

impl<C> TrackedChoice<C> {
    pub fn new(choice: C, indices: ChoiceIndices) -> Self {
        Self {
            choice,
            indices,
            css_class: None,
        }
    }
}

/// One configured trigger: the character that opens the choices menu and the
/// function that renders a choice into its label text.
///
/// The label is also the choice's identity during reconciliation, so the
/// function must be pure and stable for a given choice.
pub struct TriggerConfig<C> {
    pub trigger_character: char,
    get_choice_label: Arc<dyn Fn(&C) -> SmolStr + Send + Sync>,
}

impl<C> TriggerConfig<C> {
    pub fn new(
        trigger_character: char,
        get_choice_label: impl Fn(&C) -> SmolStr + Send + Sync + 'static,
    ) -> Self {
        Self {
            trigger_character,
            get_choice_label: Arc::new(get_choice_label),
        }
    }

    /// Render `choice` into its label text.
    pub fn label_of(&self, choice: &C) -> SmolStr {
        (self.get_choice_label)(choice)
    }
}

impl<C> Clone for TriggerConfig<C> {
    fn clone(&self) -> Self {
        Self {
            trigger_character: self.trigger_character,
            get_choice_label: Arc::clone(&self.get_choice_label),
        }
    }
}

impl<C> fmt::Debug for TriggerConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerConfig")
            .field("trigger_character", &self.trigger_character)
            .finish_non_exhaustive()
    }
}

/// Look up the label function for `trigger_character` and apply it.
///
/// With a single configured trigger the lookup is skipped, matching hosts
/// that never set the trigger character on externally supplied choices. An
/// unknown trigger is a normal non-match and yields the empty label, which
/// never resolves.
pub fn label_for<C>(triggers: &[TriggerConfig<C>], trigger_character: char, choice: &C) -> SmolStr {
    if triggers.len() == 1 {
        return triggers[0].label_of(choice);
    }
    triggers
        .iter()
        .find(|t| t.trigger_character == trigger_character)
        .map(|t| t.label_of(choice))
        .unwrap_or_default()
}

/// Keys the mention protocol reacts to.
///
/// Hosts convert native key events to this enum; anything else maps to
/// `Other` and passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Character(char),
    Backspace,
    Delete,
    ArrowLeft,
    ArrowRight,
    Other,
}

/// Modifier key state for a keydown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_contains_is_inclusive() {
        let indices = ChoiceIndices::new(3, 7, '@');
        assert!(!indices.contains(2));
        assert!(indices.contains(3));
        assert!(indices.contains(5));
        assert!(indices.contains(7));
        assert!(!indices.contains(8));
    }

    #[test]
    fn test_unresolved_span_matches_nothing() {
        let indices = ChoiceIndices::new(ChoiceIndices::UNRESOLVED, ChoiceIndices::UNRESOLVED, '@');
        assert!(indices.is_unresolved());
        assert!(!indices.contains(0));
        assert!(!indices.contains(usize::MAX));
    }

    #[test]
    fn test_label_for_single_config_skips_lookup() {
        let triggers = vec![TriggerConfig::new('@', |c: &String| {
            SmolStr::new(format!("@{c}"))
        })];
        // A mismatched trigger character still resolves through the only config.
        assert_eq!(label_for(&triggers, '#', &"Amelia".to_string()), "@Amelia");
    }

    #[test]
    fn test_label_for_unknown_trigger_is_empty() {
        let triggers = vec![
            TriggerConfig::new('@', |c: &String| SmolStr::new(format!("@{c}"))),
            TriggerConfig::new('#', |c: &String| SmolStr::new(format!("#{c}"))),
        ];
        assert_eq!(label_for(&triggers, '@', &"a".to_string()), "@a");
        assert_eq!(label_for(&triggers, '#', &"a".to_string()), "#a");
        assert_eq!(label_for(&triggers, '!', &"a".to_string()), "");
    }
}
