//! Highlight overlay construction and pointer hit testing.
//!
//! The overlay mirrors the text field's content behind it: plain runs for
//! untagged text and styled runs for each highlight span. Tag sets are host
//! supplied and untrusted; malformed sets are rejected, while spans that are
//! merely stale against the current text are dropped from a single render
//! without failing the build.

use smol_str::SmolStr;
use thiserror::Error;
use tracing::trace;

/// Render input: a char range of the text to highlight.
///
/// Shares the span shape of a tracked choice but is independently owned; the
/// host may pass any set, so the builder validates rather than trusts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightTag {
    pub start: usize,
    pub end: usize,
    pub trigger_character: char,
    /// Overrides the default CSS class when set.
    pub css_class: Option<SmolStr>,
}

impl HighlightTag {
    pub fn new(start: usize, end: usize, trigger_character: char) -> Self {
        Self {
            start,
            end,
            trigger_character,
            css_class: None,
        }
    }
}

/// A malformed tag set. Indicates a host data-integrity bug, so it is
/// surfaced instead of silently corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("highlight tag [{start}, {end}] cannot start after it ends")]
    Inverted { start: usize, end: usize },
    #[error("highlight tag [{start}, {end}] overlaps tag [{other_start}, {other_end}]")]
    Overlap {
        start: usize,
        end: usize,
        other_start: usize,
        other_end: usize,
    },
}

/// One run of renderable, markup-escaped text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Unhighlighted text between tags.
    Plain(String),
    /// A highlighted span.
    Tag {
        text: String,
        css_class: SmolStr,
        /// Index of the source tag in the slice passed to [`build_overlay`],
        /// the key used by [`GeometryCache`].
        tag_index: usize,
    },
}

fn index_inside(index: usize, start: usize, end: usize) -> bool {
    start < index && index < end
}

/// Open-interval overlap: an endpoint of one span strictly inside the other.
/// Shared endpoints are not overlap, so adjacent spans are allowed. The
/// editor's range-delete pass applies the same rule to choice spans.
pub fn spans_overlap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    index_inside(b_start, a_start, a_end)
        || index_inside(b_end, a_start, a_end)
        || index_inside(a_start, b_start, b_end)
        || index_inside(a_end, b_start, b_end)
}

fn escape_markup(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Convert `tags` into renderable segments over `text`.
///
/// Tags are processed in ascending `start` order. A tag that starts after it
/// ends, or overlaps a previously accepted tag, fails the whole build. A tag
/// whose span no longer fits the text (stale offsets during rapid edits) is
/// skipped silently. `<` and `>` are escaped in every segment to prevent
/// markup injection.
pub fn build_overlay(
    text: &str,
    tags: &[HighlightTag],
    default_css_class: &str,
) -> Result<Vec<Segment>, OverlayError> {
    let chars: Vec<char> = text.chars().collect();

    let mut order: Vec<usize> = (0..tags.len()).collect();
    order.sort_by_key(|&i| tags[i].start);

    let mut segments = Vec::new();
    let mut accepted: Vec<&HighlightTag> = Vec::new();

    for &tag_index in &order {
        let tag = &tags[tag_index];
        if tag.start > tag.end {
            return Err(OverlayError::Inverted {
                start: tag.start,
                end: tag.end,
            });
        }
        for previous in &accepted {
            if spans_overlap(previous.start, previous.end, tag.start, tag.end) {
                return Err(OverlayError::Overlap {
                    start: tag.start,
                    end: tag.end,
                    other_start: previous.start,
                    other_end: previous.end,
                });
            }
        }

        // Stale offsets are expected between host updates; drop the tag from
        // this render only.
        let Some(contents) = chars.get(tag.start..tag.end) else {
            trace!(start = tag.start, end = tag.end, "skipping stale highlight tag");
            continue;
        };

        let previous_end = accepted.last().map_or(0, |t| t.end);
        let gap: String = chars[previous_end.min(tag.start)..tag.start].iter().collect();
        if !gap.is_empty() {
            segments.push(Segment::Plain(escape_markup(&gap)));
        }

        let css_class = tag
            .css_class
            .clone()
            .unwrap_or_else(|| SmolStr::new(default_css_class));
        segments.push(Segment::Tag {
            text: escape_markup(&contents.iter().collect::<String>()),
            css_class,
            tag_index,
        });
        accepted.push(tag);
    }

    let remaining_start = accepted.last().map_or(0, |t| t.end);
    let remaining: String = chars[remaining_start..].iter().collect();
    if !remaining.is_empty() {
        segments.push(Segment::Plain(escape_markup(&remaining)));
    }

    Ok(segments)
}

/// On-screen bounding box of a rendered tag segment, in the coordinate space
/// of the pointer events fed to [`GeometryCache::hit_test`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl TagRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Strict containment: points on the edges are not hits.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.left < x && x < self.right && self.top < y && y < self.bottom
    }
}

/// Hover transition produced by [`GeometryCache::pointer_moved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverChange {
    None,
    Entered(usize),
    Left(usize),
    Moved { left: usize, entered: usize },
}

/// Cached geometry for the rendered overlay.
///
/// The host measures each tag segment's bounding box after layout and
/// refreshes the cache on geometry-affecting events (resize, scroll, text
/// change); pointer moves only read it, so hit testing never forces a
/// re-layout.
#[derive(Debug, Clone, Default)]
pub struct GeometryCache {
    entries: Vec<(usize, TagRect)>,
    hovered: Option<usize>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached rects with freshly measured `(tag_index, rect)`
    /// pairs. Hover state survives the refresh.
    pub fn update(&mut self, entries: Vec<(usize, TagRect)>) {
        self.entries = entries;
    }

    /// The tag index under the pointer, if any.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<usize> {
        self.entries
            .iter()
            .find(|(_, rect)| rect.contains(x, y))
            .map(|(tag_index, _)| *tag_index)
    }

    /// Currently hovered tag index.
    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Track a pointer move, returning the hover transition so the host can
    /// decorate enter/leave.
    pub fn pointer_moved(&mut self, x: f64, y: f64) -> HoverChange {
        let hit = self.hit_test(x, y);
        let change = match (self.hovered, hit) {
            (None, Some(entered)) => HoverChange::Entered(entered),
            (Some(left), None) => HoverChange::Left(left),
            (Some(left), Some(entered)) if left != entered => {
                HoverChange::Moved { left, entered }
            }
            _ => HoverChange::None,
        };
        self.hovered = hit;
        change
    }

    /// The pointer left the input entirely.
    pub fn pointer_left(&mut self) -> HoverChange {
        match self.hovered.take() {
            Some(left) => HoverChange::Left(left),
            None => HoverChange::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(start: usize, end: usize) -> HighlightTag {
        HighlightTag::new(start, end, '@')
    }

    #[test]
    fn test_segments_around_single_tag() {
        let text = "hi @Amelia, ok?";
        let segments = build_overlay(text, &[tag(3, 10)], "mention").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Plain("hi ".into()),
                Segment::Tag {
                    text: "@Amelia".into(),
                    css_class: "mention".into(),
                    tag_index: 0,
                },
                Segment::Plain(", ok?".into()),
            ]
        );
    }

    #[test]
    fn test_tags_rendered_in_start_order() {
        let text = "@A x @B";
        let segments = build_overlay(text, &[tag(5, 7), tag(0, 2)], "m").unwrap();
        let tag_indices: Vec<_> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Tag { tag_index, .. } => Some(*tag_index),
                _ => None,
            })
            .collect();
        // Input order is preserved in tag_index, render order follows start.
        assert_eq!(tag_indices, vec![1, 0]);
    }

    #[test]
    fn test_adjacent_tags_allowed() {
        let text = "@A@B rest";
        let segments = build_overlay(text, &[tag(0, 2), tag(2, 4)], "m").unwrap();
        assert_eq!(
            segments.iter().filter(|s| matches!(s, Segment::Tag { .. })).count(),
            2
        );
    }

    #[test]
    fn test_overlap_is_an_error() {
        let text = "abcdefgh";
        let err = build_overlay(text, &[tag(0, 4), tag(2, 6)], "m").unwrap_err();
        assert_eq!(
            err,
            OverlayError::Overlap {
                start: 2,
                end: 6,
                other_start: 0,
                other_end: 4,
            }
        );
    }

    #[test]
    fn test_containing_tag_is_an_error() {
        let text = "abcdefgh";
        // One tag fully contains the other.
        let err = build_overlay(text, &[tag(2, 4), tag(0, 8)], "m").unwrap_err();
        assert!(matches!(err, OverlayError::Overlap { .. }));
    }

    #[test]
    fn test_spans_overlap_is_symmetric_and_open() {
        assert!(spans_overlap(0, 4, 2, 6));
        assert!(spans_overlap(2, 6, 0, 4));
        // Containment in either direction.
        assert!(spans_overlap(2, 4, 0, 8));
        assert!(spans_overlap(0, 8, 2, 4));
        // Touching endpoints are not overlap.
        assert!(!spans_overlap(0, 2, 2, 4));
        // Identical spans have no endpoint strictly inside the other.
        assert!(!spans_overlap(0, 4, 0, 4));
    }

    #[test]
    fn test_inverted_tag_is_an_error() {
        let err = build_overlay("abc", &[tag(2, 1)], "m").unwrap_err();
        assert_eq!(err, OverlayError::Inverted { start: 2, end: 1 });
    }

    #[test]
    fn test_stale_tag_skipped_silently() {
        let text = "hi @A";
        let segments = build_overlay(text, &[tag(3, 5), tag(10, 14)], "m").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Plain("hi ".into()),
                Segment::Tag {
                    text: "@A".into(),
                    css_class: "m".into(),
                    tag_index: 0,
                },
            ]
        );
    }

    #[test]
    fn test_markup_escaped_everywhere() {
        let text = "a<b> @X <c>";
        let segments = build_overlay(text, &[tag(5, 7)], "m").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Plain("a&lt;b&gt; ".into()),
                Segment::Tag {
                    text: "@X".into(),
                    css_class: "m".into(),
                    tag_index: 0,
                },
                Segment::Plain(" &lt;c&gt;".into()),
            ]
        );
    }

    #[test]
    fn test_per_tag_css_class_overrides_default() {
        let mut custom = tag(0, 2);
        custom.css_class = Some("special".into());
        let segments = build_overlay("@A", &[custom], "default").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Tag {
                text: "@A".into(),
                css_class: "special".into(),
                tag_index: 0,
            }]
        );
    }

    #[test]
    fn test_hit_test_strict_edges() {
        let mut cache = GeometryCache::new();
        cache.update(vec![(0, TagRect::new(10.0, 10.0, 20.0, 20.0))]);

        assert_eq!(cache.hit_test(15.0, 15.0), Some(0));
        // Edges are not hits.
        assert_eq!(cache.hit_test(10.0, 15.0), None);
        assert_eq!(cache.hit_test(20.0, 15.0), None);
        assert_eq!(cache.hit_test(15.0, 10.0), None);
        assert_eq!(cache.hit_test(15.0, 20.0), None);
        assert_eq!(cache.hit_test(0.0, 0.0), None);
    }

    #[test]
    fn test_hover_transitions() {
        let mut cache = GeometryCache::new();
        cache.update(vec![
            (0, TagRect::new(0.0, 0.0, 10.0, 10.0)),
            (1, TagRect::new(20.0, 0.0, 30.0, 10.0)),
        ]);

        assert_eq!(cache.pointer_moved(5.0, 5.0), HoverChange::Entered(0));
        assert_eq!(cache.pointer_moved(6.0, 5.0), HoverChange::None);
        assert_eq!(
            cache.pointer_moved(25.0, 5.0),
            HoverChange::Moved { left: 0, entered: 1 }
        );
        assert_eq!(cache.pointer_moved(15.0, 5.0), HoverChange::Left(1));
        assert_eq!(cache.pointer_left(), HoverChange::None);

        cache.pointer_moved(5.0, 5.0);
        assert_eq!(cache.pointer_left(), HoverChange::Left(0));
    }
}
