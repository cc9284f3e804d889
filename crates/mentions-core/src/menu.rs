//! Menu visibility state.
//!
//! "Menu open" is a real state with an anchor and an active trigger, not the
//! presence of an optional controller object, so it is modeled as a tagged
//! variant.

use crate::types::{TrackedChoice, TriggerConfig};

/// The open menu, anchored at the trigger character that opened it.
#[derive(Debug, Clone)]
pub struct MenuSession<C> {
    /// Char offset of the trigger character. Fixed once set; the search text
    /// is the span from here (exclusive) to the caret.
    pub trigger_character_position: usize,
    /// The trigger configuration that opened the menu.
    pub trigger: TriggerConfig<C>,
    /// Caret position captured on blur, so a pointer-driven selection that
    /// steals focus can still splice at the right place.
    pub last_caret_position: Option<usize>,
    /// The choice being re-edited; restored if the menu closes without a new
    /// commit and its label text survives unclaimed.
    pub editing: Option<TrackedChoice<C>>,
}

impl<C> MenuSession<C> {
    pub fn new(trigger_character_position: usize, trigger: TriggerConfig<C>) -> Self {
        Self {
            trigger_character_position,
            trigger,
            last_caret_position: None,
            editing: None,
        }
    }
}

/// Menu visibility.
#[derive(Debug, Clone)]
pub enum MenuState<C> {
    Idle,
    Open(MenuSession<C>),
}

impl<C> Default for MenuState<C> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<C> MenuState<C> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn session(&self) -> Option<&MenuSession<C>> {
        match self {
            Self::Open(session) => Some(session),
            Self::Idle => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut MenuSession<C>> {
        match self {
            Self::Open(session) => Some(session),
            Self::Idle => None,
        }
    }

    /// Close the menu, yielding the session that was open.
    pub fn close(&mut self) -> Option<MenuSession<C>> {
        match std::mem::replace(self, Self::Idle) {
            Self::Open(session) => Some(session),
            Self::Idle => None,
        }
    }
}
