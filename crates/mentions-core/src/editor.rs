//! The mentions editor: trigger detection, the commit/edit protocol, and the
//! reconciliation driver.
//!
//! Every handler runs synchronously to completion inside the host's event
//! dispatch. Session state shared between the handlers of one event sequence
//! (caret and selection captured at keydown) lives on the editor and is
//! rewritten at the start of each sequence. Two actions are deferred to the
//! host: completing a staged bulk replacement of the selection set
//! ([`MentionsEditor::apply_replaced_choices`], next tick) and closing the
//! menu after blur ([`MentionsEditor::on_blur_timeout`], after
//! [`BLUR_CLOSE_DELAY`]).

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::annotations::AnnotationSet;
use crate::events::MentionEvent;
use crate::menu::{MenuSession, MenuState};
use crate::overlay::spans_overlap;
use crate::resolver::preceding_char_valid;
use crate::text::TextInput;
use crate::types::{label_for, ChoiceIndices, Key, Modifiers, TrackedChoice, TriggerConfig};

/// Delay between input blur and the deferred menu close, long enough for a
/// click on the menu itself (which blurs the input first) to be processed.
pub const BLUR_CLOSE_DELAY: Duration = Duration::from_millis(250);

/// Search text must match this when the host does not supply a pattern.
static DEFAULT_SEARCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w*$").expect("default search pattern is valid"));

/// Tracks choices against a host text input and drives the trigger menu.
///
/// Generic over the opaque host choice type `C`; choices are only ever seen
/// through the label function of the trigger that produced them.
pub struct MentionsEditor<C> {
    triggers: Vec<TriggerConfig<C>>,
    search_pattern: Regex,
    close_menu_on_blur: bool,
    remove_whole_tag_on_backspace: bool,

    annotations: AnnotationSet<C>,
    menu: MenuState<C>,

    // Caret and selection end captured at keydown, before the edit lands.
    cursor_position: usize,
    cursor_selection_end: usize,

    staged_choices: Option<Vec<TrackedChoice<C>>>,
}

impl<C: Clone> MentionsEditor<C> {
    pub fn new(triggers: Vec<TriggerConfig<C>>) -> Self {
        Self {
            triggers,
            search_pattern: DEFAULT_SEARCH_PATTERN.clone(),
            close_menu_on_blur: false,
            remove_whole_tag_on_backspace: false,
            annotations: AnnotationSet::new(),
            menu: MenuState::Idle,
            cursor_position: 0,
            cursor_selection_end: 0,
            staged_choices: None,
        }
    }

    /// Replace the search-text validation pattern. Search text failing the
    /// pattern closes the menu.
    pub fn with_search_pattern(mut self, pattern: Regex) -> Self {
        self.search_pattern = pattern;
        self
    }

    /// Close the menu when the input loses focus (deferred, see
    /// [`MentionsEditor::on_blur`]).
    pub fn with_close_menu_on_blur(mut self, close: bool) -> Self {
        self.close_menu_on_blur = close;
        self
    }

    /// Backspace on a choice selects its whole range instead of reopening
    /// the menu for editing.
    pub fn with_remove_whole_tag_on_backspace(mut self, remove: bool) -> Self {
        self.remove_whole_tag_on_backspace = remove;
        self
    }

    /// Snapshot of the tracked choices.
    pub fn selected_choices(&self) -> Vec<TrackedChoice<C>> {
        self.annotations.snapshot()
    }

    /// Choices whose label is currently absent from the text.
    pub fn dumped_choices(&self) -> &[TrackedChoice<C>] {
        self.annotations.dumped()
    }

    pub fn menu_state(&self) -> &MenuState<C> {
        &self.menu
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu.is_open()
    }

    // === Input event handlers ===

    /// Handle a keydown, before the host applies the key's default edit.
    pub fn on_keydown<T: TextInput>(
        &mut self,
        input: &mut T,
        key: Key,
        modifiers: Modifiers,
    ) -> Vec<MentionEvent<C>> {
        let mut out = Vec::new();
        self.cursor_position = input.selection_start();
        self.cursor_selection_end = input.selection_end();
        let preceding = self
            .cursor_position
            .checked_sub(1)
            .and_then(|i| input.char_at(i));

        if !modifiers.shift {
            self.hop_caret_over_choice(input, key, self.cursor_position);
        }

        if let Key::Character(ch) = key {
            if let Some(trigger) = self
                .triggers
                .iter()
                .find(|t| t.trigger_character == ch)
                .cloned()
            {
                if preceding_char_valid(preceding) {
                    self.show_menu(input, trigger, &mut out);
                }
                return out;
            }
        }

        if matches!(key, Key::Backspace | Key::Delete) {
            if input.has_selection() {
                self.remove_choices_in_selection(&mut out);
            } else {
                let under_caret = self
                    .annotations
                    .tracked()
                    .iter()
                    .find(|t| t.indices.contains(self.cursor_position))
                    .cloned();
                if let Some(choice) = under_caret {
                    self.edit_choice(input, choice, &mut out);
                }
            }
        }
        out
    }

    /// Handle a text-change event, after the edit has landed in `input`.
    pub fn on_input<T: TextInput>(&mut self, input: &T) -> Vec<MentionEvent<C>> {
        let mut out = Vec::new();
        let text = input.value();
        let before = self.annotations.indices();

        if !self.menu.is_open() {
            // Dump choices whose text was removed (select-all + paste, cut)
            // and retrieve them if e.g. an undo brought the text back.
            // Known limitation: replacing a selection that contains choices
            // by typing a trigger character opens the menu first, so this
            // pass is skipped and the deleted choices are not dumped.
            for dumped in self.dump(&text) {
                out.push(MentionEvent::ChoiceRemoved(dumped));
            }
            for restored in self.retrieve(&text) {
                out.push(MentionEvent::ChoiceSelected(restored));
            }
            self.reconcile(&text);
            if self.annotations.indices() != before {
                out.push(MentionEvent::SelectedChoicesChanged(
                    self.annotations.snapshot(),
                ));
            }
            return out;
        }

        self.reconcile(&text);
        if self.annotations.indices() != before {
            out.push(MentionEvent::SelectedChoicesChanged(
                self.annotations.snapshot(),
            ));
        }

        let (anchor, trigger_character) = match self.menu.session() {
            Some(session) => (
                session.trigger_character_position,
                session.trigger.trigger_character,
            ),
            None => return out,
        };

        // The anchor must still hold the trigger character and the caret must
        // not have moved before it.
        if input.char_at(anchor) != Some(trigger_character) {
            self.hide_menu(input, &mut out);
            return out;
        }
        let caret = input.selection_start();
        if caret < anchor {
            self.hide_menu(input, &mut out);
            return out;
        }

        let search_text = if caret > anchor {
            input.slice(anchor + 1..caret).unwrap_or_default()
        } else {
            SmolStr::default()
        };
        if !self.search_pattern.is_match(&search_text) {
            self.hide_menu(input, &mut out);
            return out;
        }

        trace!(%search_text, trigger_character = %trigger_character, "search requested");
        out.push(MentionEvent::SearchRequested {
            search_text,
            trigger_character,
        });
        out
    }

    /// Handle a pointer-driven caret move.
    pub fn on_click<T: TextInput>(&mut self, input: &T) -> Vec<MentionEvent<C>> {
        let mut out = Vec::new();
        let anchor = match self.menu.session() {
            Some(session) => session.trigger_character_position,
            None => return out,
        };

        let caret = input.selection_start();
        if caret <= anchor {
            self.hide_menu(input, &mut out);
            return out;
        }
        let search_text = input.slice(anchor + 1..caret).unwrap_or_default();
        if !self.search_pattern.is_match(&search_text) {
            self.hide_menu(input, &mut out);
        }
        out
    }

    /// Handle focus loss. Records the caret so a pointer-driven selection can
    /// still splice correctly, and returns the delay after which the host
    /// should call [`MentionsEditor::on_blur_timeout`] (when close-on-blur is
    /// enabled).
    pub fn on_blur<T: TextInput>(&mut self, input: &T) -> Option<Duration> {
        let caret = input.selection_start();
        let session = self.menu.session_mut()?;
        session.last_caret_position = Some(caret);
        self.close_menu_on_blur.then_some(BLUR_CLOSE_DELAY)
    }

    /// Complete a blur-deferred close. A no-op when the menu already closed
    /// in the meantime (e.g. a selection click landed first).
    pub fn on_blur_timeout<T: TextInput>(&mut self, input: &T) -> Vec<MentionEvent<C>> {
        let mut out = Vec::new();
        self.hide_menu(input, &mut out);
        out
    }

    /// Explicitly close the menu (e.g. Escape).
    pub fn cancel_menu<T: TextInput>(&mut self, input: &T) -> Vec<MentionEvent<C>> {
        let mut out = Vec::new();
        self.hide_menu(input, &mut out);
        out
    }

    // === Commit protocol ===

    /// Commit `choice` from the open menu: splice its label into the text,
    /// track it, and close the menu. A no-op while the menu is closed.
    pub fn select_choice<T: TextInput>(&mut self, input: &mut T, choice: C) -> Vec<MentionEvent<C>> {
        let mut out = Vec::new();
        let (anchor, trigger, last_caret) = match self.menu.session() {
            Some(session) => (
                session.trigger_character_position,
                session.trigger.clone(),
                session.last_caret_position,
            ),
            None => return out,
        };

        let label = trigger.label_of(&choice);
        let caret = last_caret.unwrap_or_else(|| input.selection_start());
        let splice_end = caret.max(anchor).min(input.len_chars());
        let insert = format!("{label} ");
        input.replace(anchor..splice_end, &insert);
        let caret_after = anchor + insert.chars().count();
        input.set_selection_range(caret_after, caret_after);

        let tracked = TrackedChoice::new(
            choice,
            ChoiceIndices::new(
                anchor,
                anchor + label.chars().count(),
                trigger.trigger_character,
            ),
        );
        debug!(start = anchor, label = %label, "choice committed");
        self.annotations.add(tracked.clone());
        out.push(MentionEvent::ChoiceSelected(tracked));

        let text = input.value();
        self.reconcile(&text);
        out.push(MentionEvent::SelectedChoicesChanged(
            self.annotations.snapshot(),
        ));

        self.hide_menu(input, &mut out);
        out
    }

    // === Host-driven selection replacement (deferred) ===

    /// Stage a host-driven replacement of the whole selection set.
    ///
    /// The text value is not guaranteed to be current within the same
    /// synchronous turn, so reconciliation is deferred: call
    /// [`MentionsEditor::apply_replaced_choices`] on the next host tick.
    pub fn replace_selected_choices(&mut self, choices: Vec<TrackedChoice<C>>) {
        self.staged_choices = Some(choices);
    }

    /// Complete a staged replacement: reconcile the new set against the
    /// current text and discard entries whose label cannot be located.
    pub fn apply_replaced_choices<T: TextInput>(&mut self, input: &T) -> Vec<MentionEvent<C>> {
        let mut out = Vec::new();
        let Some(choices) = self.staged_choices.take() else {
            return out;
        };
        let before = self.annotations.indices();
        self.annotations.replace_tracked(choices);
        let text = input.value();
        self.reconcile(&text);
        self.annotations.prune_unresolved();
        if self.annotations.indices() != before {
            out.push(MentionEvent::SelectedChoicesChanged(
                self.annotations.snapshot(),
            ));
        }
        out
    }

    // === Internals ===

    fn show_menu<T: TextInput>(
        &mut self,
        input: &T,
        trigger: TriggerConfig<C>,
        out: &mut Vec<MentionEvent<C>>,
    ) {
        if self.menu.is_open() {
            // A second trigger while open must not reset the anchor.
            return;
        }
        let anchor = input.selection_start();
        debug!(anchor, trigger_character = %trigger.trigger_character, "menu opened");
        self.menu = MenuState::Open(MenuSession::new(anchor, trigger));
        out.push(MentionEvent::MenuShown);
    }

    fn hide_menu<T: TextInput>(&mut self, input: &T, out: &mut Vec<MentionEvent<C>>) {
        let Some(session) = self.menu.close() else {
            return;
        };
        debug!("menu hidden");
        out.push(MentionEvent::MenuHidden);

        let Some(editing) = session.editing else {
            return;
        };
        // The menu closed without a new commit: restore the choice being
        // edited if its label text survived, unclaimed by another choice.
        let label = self.label_of(editing.indices.trigger_character, &editing.choice);
        let text = input.value();
        let label_present = self
            .find_label(&text, &format!("{label} "), None)
            .is_some();
        let claimed = {
            let triggers = &self.triggers;
            self.annotations
                .tracked()
                .iter()
                .any(|t| label_for(triggers, t.indices.trigger_character, &t.choice) == label)
        };
        if label_present && !claimed {
            debug!(label = %label, "restored edited choice");
            self.annotations.add(editing.clone());
            out.push(MentionEvent::ChoiceSelected(editing));
            self.reconcile(&text);
            out.push(MentionEvent::SelectedChoicesChanged(
                self.annotations.snapshot(),
            ));
        }
    }

    /// Reopen the menu to edit the choice under the caret.
    fn edit_choice<T: TextInput>(
        &mut self,
        input: &mut T,
        choice: TrackedChoice<C>,
        out: &mut Vec<MentionEvent<C>>,
    ) {
        let label = self.label_of(choice.indices.trigger_character, &choice.choice);
        let occurrence = self.occurrence_at_cursor();
        let text = input.value();
        let Some(start) = self.find_label(&text, &label, occurrence) else {
            return;
        };
        let end = start + label.chars().count();

        let cursor = self.cursor_position;
        let editing = {
            let triggers = &self.triggers;
            self.annotations
                .tracked()
                .iter()
                .find(|t| {
                    label_for(triggers, t.indices.trigger_character, &t.choice) == label
                        && t.indices.contains(cursor)
                })
                .cloned()
        };
        let Some(editing) = editing else {
            return;
        };

        if let Some(removed) = self.remove_choice(&editing) {
            out.push(MentionEvent::ChoiceRemoved(removed));
            out.push(MentionEvent::SelectedChoicesChanged(
                self.annotations.snapshot(),
            ));
        }

        if self.remove_whole_tag_on_backspace {
            input.set_selection_range(start, end);
            return;
        }

        input.set_selection_range(end, end);

        let Some(trigger) = self
            .triggers
            .iter()
            .find(|t| t.trigger_character == choice.indices.trigger_character)
            .cloned()
        else {
            return;
        };
        self.show_menu(input, trigger.clone(), out);
        if let Some(session) = self.menu.session_mut() {
            session.trigger_character_position = start;
            session.editing = Some(editing);
        }

        let search_text = label.replacen(trigger.trigger_character, "", 1);
        out.push(MentionEvent::SearchRequested {
            search_text: SmolStr::new(search_text),
            trigger_character: trigger.trigger_character,
        });
    }

    /// Keep the caret out of choice interiors: an arrow key that would move
    /// it from one edge inward jumps it to the opposite edge instead.
    fn hop_caret_over_choice<T: TextInput>(&self, input: &mut T, key: Key, caret: usize) {
        let Some(choice) = self
            .annotations
            .tracked()
            .iter()
            .find(|t| t.indices.contains(caret))
        else {
            return;
        };
        match key {
            Key::ArrowLeft if choice.indices.end == caret => {
                input.set_selection_range(choice.indices.start, choice.indices.start);
            }
            Key::ArrowRight if choice.indices.start == caret => {
                input.set_selection_range(choice.indices.end, choice.indices.end);
            }
            _ => {}
        }
    }

    /// Remove every choice overlapping the active selection before the host
    /// deletes or types over it.
    fn remove_choices_in_selection(&mut self, out: &mut Vec<MentionEvent<C>>) {
        let (sel_start, sel_end) = (self.cursor_position, self.cursor_selection_end);
        let overlapping: Vec<TrackedChoice<C>> = self
            .annotations
            .tracked()
            .iter()
            .filter(|t| {
                !t.indices.is_unresolved()
                    && spans_overlap(t.indices.start, t.indices.end, sel_start, sel_end)
            })
            .cloned()
            .collect();
        for choice in overlapping {
            if let Some(removed) = self.remove_choice(&choice) {
                out.push(MentionEvent::ChoiceRemoved(removed));
            }
        }
        out.push(MentionEvent::SelectedChoicesChanged(
            self.annotations.snapshot(),
        ));
    }

    /// Occurrence index of the choice under the caret, counted among tracked
    /// choices sharing its label, in descending start order.
    fn occurrence_at_cursor(&self) -> Option<usize> {
        let mut sorted: Vec<&TrackedChoice<C>> = self.annotations.tracked().iter().collect();
        sorted.sort_by(|a, b| b.indices.start.cmp(&a.indices.start));

        let cursor = self.cursor_position;
        for (i, choice) in sorted.iter().enumerate() {
            if choice.indices.is_unresolved() || choice.indices.start > cursor {
                continue;
            }
            let label = self.label_of(choice.indices.trigger_character, &choice.choice);
            let count = 1 + sorted[i + 1..]
                .iter()
                .filter(|other| {
                    self.label_of(other.indices.trigger_character, &other.choice) == label
                })
                .count();
            return Some(count);
        }
        None
    }

    fn label_of(&self, trigger_character: char, choice: &C) -> SmolStr {
        label_for(&self.triggers, trigger_character, choice)
    }

    fn find_label(&self, text: &str, label: &str, occurrence: Option<usize>) -> Option<usize> {
        let triggers = &self.triggers;
        self.annotations
            .find_label(text, label, occurrence, |ch, c| label_for(triggers, ch, c))
    }

    fn reconcile(&mut self, text: &str) -> Vec<TrackedChoice<C>> {
        let triggers = &self.triggers;
        self.annotations
            .reconcile_all(text, |ch, c| label_for(triggers, ch, c))
    }

    fn dump(&mut self, text: &str) -> Vec<TrackedChoice<C>> {
        let triggers = &self.triggers;
        self.annotations
            .dump_unresolved(text, |ch, c| label_for(triggers, ch, c))
    }

    fn retrieve(&mut self, text: &str) -> Vec<TrackedChoice<C>> {
        let triggers = &self.triggers;
        self.annotations
            .retrieve_resolvable(text, |ch, c| label_for(triggers, ch, c))
    }

    fn remove_choice(&mut self, target: &TrackedChoice<C>) -> Option<TrackedChoice<C>> {
        let triggers = &self.triggers;
        self.annotations
            .remove(target, |ch, c| label_for(triggers, ch, c))
    }
}
