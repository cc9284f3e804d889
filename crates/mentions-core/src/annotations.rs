//! Tracked-choice bookkeeping: reconciliation, dump, and retrieval.
//!
//! The text field has no native notion of tagged ranges, so every mutation
//! can shift, duplicate, or destroy the substrings that represent committed
//! choices. This module owns the authoritative choice list and re-derives
//! every span by re-scanning the current text, moving choices whose label has
//! vanished into a holding area from which they can be restored (e.g. after
//! an undo).

use std::collections::HashMap;

use smol_str::SmolStr;
use tracing::debug;

use crate::resolver;
use crate::types::{ChoiceIndices, TrackedChoice};

/// The authoritative set of tracked choices plus the dumped holding area.
///
/// Label lookup is injected per call (`label_of: (trigger_character, &choice)
/// -> label`) so the set never needs to know about trigger configuration.
#[derive(Debug, Clone)]
pub struct AnnotationSet<C> {
    tracked: Vec<TrackedChoice<C>>,
    dumped: Vec<TrackedChoice<C>>,
}

impl<C> Default for AnnotationSet<C> {
    fn default() -> Self {
        Self {
            tracked: Vec::new(),
            dumped: Vec::new(),
        }
    }
}

impl<C: Clone> AnnotationSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tracked choices, in the order they were added.
    pub fn tracked(&self) -> &[TrackedChoice<C>] {
        &self.tracked
    }

    /// Choices whose label is currently absent from the text.
    pub fn dumped(&self) -> &[TrackedChoice<C>] {
        &self.dumped
    }

    /// Owned snapshot of the tracked set, for emission to the host.
    pub fn snapshot(&self) -> Vec<TrackedChoice<C>> {
        self.tracked.clone()
    }

    /// The spans of the tracked set, used for cheap change detection.
    pub fn indices(&self) -> Vec<ChoiceIndices> {
        self.tracked.iter().map(|t| t.indices).collect()
    }

    /// Replace the whole tracked set (host-driven bulk update). The dumped
    /// holding area is left untouched.
    pub fn replace_tracked(&mut self, choices: Vec<TrackedChoice<C>>) {
        self.tracked = choices;
    }

    pub fn add(&mut self, choice: TrackedChoice<C>) {
        self.tracked.push(choice);
    }

    /// Remove `target` from the tracked set.
    ///
    /// Only takes effect while some tracked entry still carries the same
    /// label, which guards against double removal during rapid edits. Prefers
    /// the entry with matching indices, falling back to the first label
    /// match.
    pub fn remove<F>(&mut self, target: &TrackedChoice<C>, label_of: F) -> Option<TrackedChoice<C>>
    where
        F: Fn(char, &C) -> SmolStr,
    {
        let label = label_of(target.indices.trigger_character, &target.choice);
        let position = self
            .tracked
            .iter()
            .position(|t| {
                t.indices == target.indices
                    && label_of(t.indices.trigger_character, &t.choice) == label
            })
            .or_else(|| {
                self.tracked
                    .iter()
                    .position(|t| label_of(t.indices.trigger_character, &t.choice) == label)
            })?;
        Some(self.tracked.remove(position))
    }

    /// Recompute every tracked choice's span against `text`.
    ///
    /// Labels are resolved in original list order with a per-label occurrence
    /// counter, so repeated labels map to distinct occurrences in the order
    /// the choices were added. Choices whose label cannot be located keep
    /// their place in the list with a parked span (see
    /// [`ChoiceIndices::is_unresolved`]) until the next dump pass; clones of
    /// them are returned.
    pub fn reconcile_all<F>(&mut self, text: &str, label_of: F) -> Vec<TrackedChoice<C>>
    where
        F: Fn(char, &C) -> SmolStr,
    {
        let labels = self.labels(&label_of);
        let mut seen: HashMap<SmolStr, usize> = HashMap::new();
        let mut unresolved = Vec::new();

        for (tracked, label) in self.tracked.iter_mut().zip(&labels) {
            let occurrence = seen
                .entry(label.clone())
                .and_modify(|n| *n += 1)
                .or_insert(1);
            match resolver::resolve(text, label, &labels, Some(*occurrence)) {
                Some(start) => {
                    tracked.indices.start = start;
                    tracked.indices.end = start + label.chars().count();
                }
                None => {
                    tracked.indices.start = ChoiceIndices::UNRESOLVED;
                    tracked.indices.end = ChoiceIndices::UNRESOLVED;
                    unresolved.push(tracked.clone());
                }
            }
        }
        unresolved
    }

    /// Drop every tracked entry with a parked span, returning the dropped
    /// entries. Used after host-driven bulk replacement, where unlocatable
    /// choices are discarded rather than dumped.
    pub fn prune_unresolved(&mut self) -> Vec<TrackedChoice<C>> {
        let mut pruned = Vec::new();
        self.tracked.retain(|t| {
            if t.indices.is_unresolved() {
                pruned.push(t.clone());
                false
            } else {
                true
            }
        });
        pruned
    }

    /// Move every tracked choice whose label cannot be found at all
    /// (occurrence-insensitive) into the dumped holding area. Returns the
    /// moved entries so the caller can notify the host.
    pub fn dump_unresolved<F>(&mut self, text: &str, label_of: F) -> Vec<TrackedChoice<C>>
    where
        F: Fn(char, &C) -> SmolStr,
    {
        let labels = self.labels(&label_of);
        let mut dumped_now = Vec::new();
        let mut kept = Vec::with_capacity(self.tracked.len());

        for (tracked, label) in self.tracked.drain(..).zip(&labels) {
            if resolver::resolve(text, label, &labels, None).is_some() {
                kept.push(tracked);
            } else {
                dumped_now.push(tracked.clone());
                self.dumped.push(tracked);
            }
        }
        self.tracked = kept;

        if !dumped_now.is_empty() {
            debug!(count = dumped_now.len(), "dumped choices absent from text");
        }
        dumped_now
    }

    /// Move every dumped choice whose label is present in `text` again, and
    /// not already claimed by a tracked choice, back into the tracked set.
    /// Returns the restored entries.
    pub fn retrieve_resolvable<F>(&mut self, text: &str, label_of: F) -> Vec<TrackedChoice<C>>
    where
        F: Fn(char, &C) -> SmolStr,
    {
        let tracked_labels = self.labels(&label_of);
        let mut restored = Vec::new();
        let mut still_dumped = Vec::new();

        for dumped in self.dumped.drain(..) {
            let label = label_of(dumped.indices.trigger_character, &dumped.choice);
            let claimed = tracked_labels.contains(&label);
            if !claimed && resolver::resolve(text, &label, &tracked_labels, None).is_some() {
                restored.push(dumped.clone());
                self.tracked.push(dumped);
            } else {
                still_dumped.push(dumped);
            }
        }
        self.dumped = still_dumped;

        if !restored.is_empty() {
            debug!(count = restored.len(), "retrieved choices back from dump");
        }
        restored
    }

    /// Find `label` in `text`, masked against all currently tracked labels.
    pub fn find_label<F>(
        &self,
        text: &str,
        label: &str,
        occurrence: Option<usize>,
        label_of: F,
    ) -> Option<usize>
    where
        F: Fn(char, &C) -> SmolStr,
    {
        let labels = self.labels(&label_of);
        resolver::resolve(text, label, &labels, occurrence)
    }

    fn labels<F>(&self, label_of: &F) -> Vec<SmolStr>
    where
        F: Fn(char, &C) -> SmolStr,
    {
        self.tracked
            .iter()
            .map(|t| label_of(t.indices.trigger_character, &t.choice))
            .collect()
    }
}
