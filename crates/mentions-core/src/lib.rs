//! Host-agnostic mention and tag tracking for plain text inputs.
//!
//! A text field has no native notion of tagged ranges, so this crate keeps an
//! authoritative list of committed choices and re-derives their char spans
//! from the current text after every edit. On top of that it drives the
//! trigger-character menu protocol (open, search, commit, edit, cancel) and
//! builds the highlight overlay segments a host renders behind the input.
//!
//! The crate owns no text and renders nothing: hosts implement [`TextInput`]
//! over their widget, forward key/input/click/blur events to
//! [`MentionsEditor`], and act on the returned [`MentionEvent`]s.
//!
//! All offsets are in chars (Unicode scalar values), never bytes.

pub mod annotations;
pub mod editor;
pub mod events;
pub mod menu;
pub mod overlay;
pub mod resolver;
pub mod text;
pub mod types;

pub use annotations::AnnotationSet;
pub use editor::{MentionsEditor, BLUR_CLOSE_DELAY};
pub use events::MentionEvent;
pub use menu::{MenuSession, MenuState};
pub use overlay::{
    build_overlay, spans_overlap, GeometryCache, HighlightTag, HoverChange, OverlayError, Segment,
    TagRect,
};
pub use resolver::{preceding_char_valid, resolve};
pub use text::{RopeInput, TextInput};
pub use types::{label_for, ChoiceIndices, Key, Modifiers, TrackedChoice, TriggerConfig};

pub use smol_str::SmolStr;
