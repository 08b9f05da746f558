// ABOUTME: Core library for svgrad: gradient model, prompt parsing, SVG rewriting, and extraction.
// ABOUTME: Has no knowledge of agents or LLMs; everything here is deterministic.

pub mod extract;
pub mod gradient;
pub mod prompt;
pub mod svg;

pub use extract::extract_svg;
pub use gradient::{Direction, GradientConfig, GradientError, GradientKind, HexColor, ShapeKind};
pub use prompt::parse_gradient_prompt;
pub use svg::{AppliedGradient, DEFAULT_GRADIENT_ID, SvgError, apply_gradient, is_valid_gradient_id, validate_svg};
