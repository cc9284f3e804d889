//! Events emitted to the host.

use smol_str::SmolStr;

use crate::types::TrackedChoice;

/// Notifications flowing from the core back to the host.
///
/// Handlers return these in emission order. Snapshots are emitted by value;
/// the host must route any change back through the editor rather than
/// mutating a snapshot in place.
#[derive(Debug, Clone, PartialEq)]
pub enum MentionEvent<C> {
    /// The choices menu became visible.
    MenuShown,
    /// The choices menu was hidden.
    MenuHidden,
    /// The text after the trigger character changed; the host should run a
    /// search and feed the results to its menu widget.
    SearchRequested {
        search_text: SmolStr,
        trigger_character: char,
    },
    /// A choice entered the tracked set (committed, restored, or retrieved).
    ChoiceSelected(TrackedChoice<C>),
    /// A choice left the tracked set.
    ChoiceRemoved(TrackedChoice<C>),
    /// Full snapshot of the tracked set after any membership or offset
    /// change.
    SelectedChoicesChanged(Vec<TrackedChoice<C>>),
}
