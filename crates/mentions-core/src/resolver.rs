//! Label occurrence resolution in free text.
//!
//! Labels are plain substrings of arbitrary user text, so locating a tracked
//! choice means re-scanning the buffer: find the Nth occurrence of the label
//! that starts at a valid boundary, while never matching inside a longer
//! label that happens to contain it (e.g. "@TED" inside "@TEDEducation").
//!
//! All offsets are char offsets (Unicode scalar values), never bytes.

/// Characters allowed immediately before a label start.
///
/// Labels found in other contexts (e.g. inside a URL) are not treated as
/// choices.
pub fn preceding_char_valid(ch: Option<char>) -> bool {
    matches!(ch, None | Some('\n') | Some(' ') | Some('('))
}

/// Find the char offset of `label` in `text`.
///
/// `other_labels` is the full set of currently tracked labels; every entry
/// that strictly contains `label` is masked out of the text first so the
/// search cannot land inside it. `occurrence` selects the Nth raw match
/// (1-based) before the boundary filter is applied; from there the scan walks
/// forward until a boundary-valid match is found.
///
/// A match is boundary-valid when the character before it satisfies
/// [`preceding_char_valid`], or when it is directly preceded by a literal
/// `<br>` line-break marker.
///
/// Returns `None` when no boundary-valid occurrence exists.
pub fn resolve<S: AsRef<str>>(
    text: &str,
    label: &str,
    other_labels: &[S],
    occurrence: Option<usize>,
) -> Option<usize> {
    if label.is_empty() {
        return None;
    }

    let masked = mask_superstrings(text, label, other_labels);

    // Skip to the requested raw occurrence before boundary filtering.
    let mut index = match occurrence {
        Some(n) if n > 0 => {
            let mut index = None;
            let mut from = 0;
            for _ in 0..n {
                match next_match(&masked, label, from) {
                    Some(i) => {
                        index = Some(i);
                        from = i + first_char_len(&masked[i..]);
                    }
                    None => return None,
                }
            }
            index?
        }
        _ => next_match(&masked, label, 0)?,
    };

    loop {
        if boundary_valid(&masked, index) {
            // Char alignment is preserved by same-char-length masking, so the
            // masked byte offset converts directly to the text's char offset.
            return Some(masked[..index].chars().count());
        }
        index = next_match(&masked, label, index + first_char_len(&masked[index..]))?;
    }
}

/// Replace every occurrence of each strict superstring of `label` with a
/// same-char-length run of `*`, so searching for `label` cannot match inside
/// an unrelated, longer label.
fn mask_superstrings<S: AsRef<str>>(text: &str, label: &str, other_labels: &[S]) -> String {
    let mut masked = text.to_owned();
    for other in other_labels {
        let other = other.as_ref();
        if other != label && other.contains(label) {
            masked = masked.replace(other, &"*".repeat(other.chars().count()));
        }
    }
    masked
}

fn next_match(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack.get(from..)?.find(needle).map(|i| from + i)
}

fn first_char_len(s: &str) -> usize {
    s.chars().next().map_or(1, char::len_utf8)
}

fn boundary_valid(text: &str, byte_index: usize) -> bool {
    let preceding = text[..byte_index].chars().next_back();
    preceding_char_valid(preceding)
        || (byte_index >= 4 && text.get(byte_index - 4..byte_index) == Some("<br>"))
}
