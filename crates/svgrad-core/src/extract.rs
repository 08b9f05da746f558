// ABOUTME: Pulls an SVG document out of free-form agent output.
// ABOUTME: Agents often wrap markup in prose or code fences; only the balanced <svg> span is kept.

use std::sync::LazyLock;

use regex::Regex;

static SVG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/)?svg(?:\s[^>]*?)?(/)?>").expect("svg tag pattern is valid")
});

/// Return the first `<svg ...>...</svg>` span in `raw`, or `None`.
///
/// Nested `<svg>` elements are balanced, so the span ends at the `</svg>`
/// that closes the outermost element. A self-closing `<svg/>` is a span of
/// its own. An unclosed element yields `None`.
pub fn extract_svg(raw: &str) -> Option<&str> {
    let mut tags = SVG_TAG.captures_iter(raw);

    let first = tags.find(|caps| caps.get(1).is_none())?;
    let whole = first.get(0)?;
    if first.get(2).is_some() {
        return Some(whole.as_str());
    }

    let start = whole.start();
    let mut depth = 1usize;
    for caps in tags {
        let tag = caps.get(0)?;
        match (caps.get(1).is_some(), caps.get(2).is_some()) {
            (true, _) => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..tag.end()]);
                }
            }
            (false, true) => {}
            (false, false) => depth += 1,
        }
    }
    None
}
