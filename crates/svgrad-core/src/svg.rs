// ABOUTME: Streams an SVG document through quick-xml to add a gradient definition and retarget fills.
// ABOUTME: Also validates that text is a well-formed SVG document using roxmltree.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::gradient::GradientConfig;

/// Id given to the gradient element when the caller does not choose one.
pub const DEFAULT_GRADIENT_ID: &str = "grad1";

/// Errors raised while validating or rewriting SVG markup.
#[derive(Debug, Error)]
pub enum SvgError {
    #[error("SVG is not well-formed XML: {0}")]
    Malformed(String),

    #[error("root element is <{0}>, expected <svg>")]
    NotSvg(String),

    #[error("invalid gradient id: {0:?}")]
    InvalidId(String),

    #[error("failed to serialize SVG: {0}")]
    Write(String),
}

/// Result of applying a gradient to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedGradient {
    pub svg: String,
    /// Number of target-shape elements whose fill now references the gradient.
    pub shapes_updated: usize,
    /// True when a `<defs>` child with the same id was replaced.
    pub replaced_existing_gradient: bool,
}

/// Check that `svg` parses as XML and that its root element is `<svg>`.
pub fn validate_svg(svg: &str) -> Result<(), SvgError> {
    let doc = parse_document(svg)?;
    let root = doc.root_element().tag_name().name();
    if root != "svg" {
        return Err(SvgError::NotSvg(root.to_string()));
    }
    Ok(())
}

/// True if `id` can be used as an XML id and referenced from `url(#id)`.
pub fn is_valid_gradient_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Insert a gradient definition built from `config` and point every
/// `config.target_shape` element's fill at it.
///
/// The gradient becomes the first child of the first `<defs>`, replacing any
/// direct child carrying the same id. Without a `<defs>`, a new one is opened
/// right inside the root element. Everything not touched is copied through.
pub fn apply_gradient(
    svg: &str,
    config: &GradientConfig,
    gradient_id: &str,
) -> Result<AppliedGradient, SvgError> {
    if !is_valid_gradient_id(gradient_id) {
        return Err(SvgError::InvalidId(gradient_id.to_string()));
    }

    let has_defs = {
        let doc = parse_document(svg)?;
        let root = doc.root_element();
        if root.tag_name().name() != "svg" {
            return Err(SvgError::NotSvg(root.tag_name().name().to_string()));
        }
        doc.descendants().any(|n| n.tag_name().name() == "defs")
    };

    let target = config.target_shape.element_name().as_bytes();
    let fill_url = format!("url(#{})", gradient_id);

    let mut reader = Reader::from_str(svg);
    let mut writer = Writer::new(Vec::new());

    let mut depth = 0usize;
    let mut inserted = false;
    let mut defs_depth: Option<usize> = None;
    let mut skip_depth: Option<usize> = None;
    let mut shapes_updated = 0usize;
    let mut replaced = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SvgError::Malformed(e.to_string()))?;

        match event {
            Event::Eof => break,

            Event::Start(e) => {
                depth += 1;
                if skip_depth.is_some() {
                    continue;
                }

                if defs_depth.is_some_and(|d| depth == d + 1) && has_id(&e, gradient_id)? {
                    skip_depth = Some(depth);
                    replaced = true;
                    continue;
                }

                let local = e.local_name();
                if local.as_ref() == target {
                    let rewritten = retarget_fill(&e, &fill_url)?;
                    write(&mut writer, Event::Start(rewritten))?;
                    shapes_updated += 1;
                } else if depth == 1 && !has_defs {
                    write(&mut writer, Event::Start(e))?;
                    write_new_defs(&mut writer, config, gradient_id)?;
                    inserted = true;
                } else if local.as_ref() == b"defs" && has_defs && !inserted {
                    write(&mut writer, Event::Start(e))?;
                    write_gradient(&mut writer, config, gradient_id, "    ")?;
                    inserted = true;
                    defs_depth = Some(depth);
                } else {
                    write(&mut writer, Event::Start(e))?;
                }
            }

            Event::End(e) => {
                if let Some(skip) = skip_depth {
                    if depth == skip {
                        skip_depth = None;
                    }
                    depth -= 1;
                    continue;
                }
                if defs_depth == Some(depth) {
                    defs_depth = None;
                }
                depth -= 1;
                write(&mut writer, Event::End(e))?;
            }

            Event::Empty(e) => {
                if skip_depth.is_some() {
                    continue;
                }

                if defs_depth.is_some_and(|d| depth == d) && has_id(&e, gradient_id)? {
                    replaced = true;
                    continue;
                }

                let local = e.local_name();
                if local.as_ref() == target {
                    let rewritten = retarget_fill(&e, &fill_url)?;
                    write(&mut writer, Event::Empty(rewritten))?;
                    shapes_updated += 1;
                } else if local.as_ref() == b"defs" && has_defs && !inserted {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    write(&mut writer, Event::Start(e))?;
                    write_gradient(&mut writer, config, gradient_id, "    ")?;
                    write(&mut writer, text("\n  "))?;
                    write(&mut writer, Event::End(BytesEnd::new(name)))?;
                    inserted = true;
                } else if depth == 0 && !has_defs {
                    // Self-closing root: `<svg/>`.
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    write(&mut writer, Event::Start(e))?;
                    write_new_defs(&mut writer, config, gradient_id)?;
                    write(&mut writer, text("\n"))?;
                    write(&mut writer, Event::End(BytesEnd::new(name)))?;
                    inserted = true;
                } else {
                    write(&mut writer, Event::Empty(e))?;
                }
            }

            other => {
                if skip_depth.is_none() {
                    write(&mut writer, other)?;
                }
            }
        }
    }

    if !inserted {
        return Err(SvgError::Write(
            "no insertion point found for the gradient definition".to_string(),
        ));
    }

    let svg = String::from_utf8(writer.into_inner())
        .map_err(|e| SvgError::Write(e.to_string()))?;

    tracing::debug!(
        gradient_id,
        target = %config.target_shape,
        shapes_updated,
        replaced_existing_gradient = replaced,
        "applied gradient"
    );

    Ok(AppliedGradient {
        svg,
        shapes_updated,
        replaced_existing_gradient: replaced,
    })
}

fn parse_document(svg: &str) -> Result<roxmltree::Document<'_>, SvgError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    roxmltree::Document::parse_with_options(svg, options)
        .map_err(|e| SvgError::Malformed(e.to_string()))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), SvgError> {
    writer
        .write_event(event)
        .map_err(|e| SvgError::Write(e.to_string()))
}

fn text(content: &str) -> Event<'_> {
    Event::Text(BytesText::new(content))
}

fn has_id(element: &BytesStart<'_>, id: &str) -> Result<bool, SvgError> {
    let attr = element
        .try_get_attribute("id")
        .map_err(|e| SvgError::Malformed(e.to_string()))?;
    Ok(attr.is_some_and(|a| a.value.as_ref() == id.as_bytes()))
}

/// Copy a shape's start tag with its fill pointed at the gradient. The fill
/// keeps its attribute position when present; any inline `fill:` style is
/// dropped so it cannot win over the attribute.
fn retarget_fill(element: &BytesStart<'_>, fill_url: &str) -> Result<BytesStart<'static>, SvgError> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut fill_written = false;

    for attr in element.attributes() {
        let attr = attr.map_err(|e| SvgError::Malformed(e.to_string()))?;
        match attr.key.as_ref() {
            b"fill" => {
                out.push_attribute(("fill", fill_url));
                fill_written = true;
            }
            b"style" => {
                let value = attr
                    .unescape_value()
                    .map_err(|e| SvgError::Malformed(e.to_string()))?;
                let cleaned = strip_fill_declarations(&value);
                if !cleaned.is_empty() {
                    out.push_attribute(("style", cleaned.as_str()));
                }
            }
            _ => out.push_attribute(attr),
        }
    }

    if !fill_written {
        out.push_attribute(("fill", fill_url));
    }

    Ok(out)
}

fn strip_fill_declarations(style: &str) -> String {
    style
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            decl.split(':')
                .next()
                .map(|prop| !prop.trim().eq_ignore_ascii_case("fill"))
                .unwrap_or(true)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn write_new_defs(
    writer: &mut Writer<Vec<u8>>,
    config: &GradientConfig,
    gradient_id: &str,
) -> Result<(), SvgError> {
    write(writer, text("\n  "))?;
    write(writer, Event::Start(BytesStart::new("defs")))?;
    write_gradient(writer, config, gradient_id, "    ")?;
    write(writer, text("\n  "))?;
    write(writer, Event::End(BytesEnd::new("defs")))
}

fn write_gradient(
    writer: &mut Writer<Vec<u8>>,
    config: &GradientConfig,
    gradient_id: &str,
    indent: &str,
) -> Result<(), SvgError> {
    let element = config.kind.element_name();

    let mut start = BytesStart::new(element);
    start.push_attribute(("id", gradient_id));
    for (key, value) in config.geometry_attributes() {
        start.push_attribute((key, value));
    }

    let stops = [
        ("0%", config.start_color.as_str()),
        ("100%", config.end_color.as_str()),
    ];

    write(writer, text(&format!("\n{}", indent)))?;
    write(writer, Event::Start(start))?;
    for (offset, color) in stops {
        let style = format!("stop-color:{}; stop-opacity:1", color);
        let mut stop = BytesStart::new("stop");
        stop.push_attribute(("offset", offset));
        stop.push_attribute(("style", style.as_str()));
        write(writer, text(&format!("\n{}  ", indent)))?;
        write(writer, Event::Empty(stop))?;
    }
    write(writer, text(&format!("\n{}", indent)))?;
    write(writer, Event::End(BytesEnd::new(element)))
}
