// ABOUTME: Keyword-based extraction of a GradientConfig from a natural-language prompt.
// ABOUTME: Backs the gradient parser agent's tool; unmatched details fall back to defaults.

use std::sync::LazyLock;

use regex::Regex;

use crate::gradient::{Direction, GradientConfig, GradientKind, HexColor, ShapeKind};

static HEX_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#([0-9A-Fa-f]+)").expect("hex token pattern is valid")
});

/// Words that select each shape, checked in this order.
const SHAPE_WORDS: [(ShapeKind, &[&str]); 3] = [
    (ShapeKind::Rect, &["rect", "rects", "rectangle", "rectangles"]),
    (ShapeKind::Circle, &["circle", "circles"]),
    (ShapeKind::Ellipse, &["ellipse", "ellipses"]),
];

/// Parse gradient details out of a free-form prompt.
///
/// Colors come from the first two `#rrggbb` or `#rgb` tokens; with fewer
/// than two, both default colors are kept. "radial" switches the kind,
/// "vertical" beats "horizontal", and the first shape word found picks the
/// target.
pub fn parse_gradient_prompt(prompt: &str) -> GradientConfig {
    let mut config = GradientConfig::default();

    let colors = hex_colors(prompt);
    if let [start, end, ..] = colors.as_slice() {
        config.start_color = start.clone();
        config.end_color = end.clone();
    }

    let lowered = prompt.to_lowercase();

    if lowered.contains("radial") {
        config.kind = GradientKind::Radial;
    }

    if lowered.contains("vertical") {
        config.direction = Direction::Vertical;
    } else if lowered.contains("horizontal") {
        config.direction = Direction::Horizontal;
    }

    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if let Some((shape, _)) = SHAPE_WORDS
        .iter()
        .find(|(_, names)| words.iter().any(|w| names.contains(w)))
    {
        config.target_shape = *shape;
    }

    tracing::debug!(
        kind = %config.kind,
        direction = %config.direction,
        start = %config.start_color,
        end = %config.end_color,
        target = %config.target_shape,
        "parsed gradient prompt"
    );

    config
}

/// All well-formed hex colors in the text, in order of appearance.
fn hex_colors(text: &str) -> Vec<HexColor> {
    HEX_TOKEN
        .captures_iter(text)
        .filter_map(|caps| caps.get(0))
        .filter_map(|m| m.as_str().parse::<HexColor>().ok())
        .collect()
}
