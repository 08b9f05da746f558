// ABOUTME: End-to-end gradient workflow: read the input SVG, run the crew, pick and validate the result, write it.
// ABOUTME: Also writes the demo input document and optional JSON run reports.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use svgrad_core::{SvgError, extract_svg, validate_svg};

use crate::crew::{Crew, CrewError, CrewOptions, CrewOutput};
use crate::runtime::AgentRuntime;

/// Sample document used by `--demo` and `svgrad demo`.
pub const DEMO_SVG: &str = r#"<svg width="300" height="300" xmlns="http://www.w3.org/2000/svg">
 <rect x="50" y="50" width="200" height="100" fill="red"/>
</svg>"#;

/// Prompt used when none is given.
pub const DEMO_PROMPT: &str =
    "Change the red rectangle to have a vertical gradient from #ff0000 to #0000ff.";

/// Errors raised by the end-to-end pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read input SVG {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Crew(#[from] CrewError),

    #[error("no SVG content found in the agent output: {raw}")]
    NoSvgProduced { raw: String },

    #[error("final SVG is invalid: {0}")]
    InvalidOutput(#[from] SvgError),

    #[error("failed to write {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize run report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Where the final SVG came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SvgSource {
    /// Extracted from the last agent's answer.
    AgentResponse,
    /// Taken from the modifier tool's stored result.
    WorkflowState,
}

/// Inputs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub prompt: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub options: CrewOptions,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub svg: String,
    pub source: SvgSource,
    pub output_path: PathBuf,
    pub crew: CrewOutput,
}

/// Run the gradient crew over the input file and write the modified SVG.
pub async fn run_pipeline(
    runtime: Arc<dyn AgentRuntime>,
    request: &PipelineRequest,
) -> Result<PipelineOutcome, PipelineError> {
    let svg_content = std::fs::read_to_string(&request.input_path).map_err(|source| {
        PipelineError::ReadInput {
            path: request.input_path.clone(),
            source,
        }
    })?;

    tracing::info!(
        input = %request.input_path.display(),
        output = %request.output_path.display(),
        prompt = %request.prompt,
        "starting gradient pipeline"
    );

    let inputs = BTreeMap::from([
        ("user_prompt".to_string(), request.prompt.clone()),
        ("svg_content".to_string(), svg_content),
    ]);

    let crew = Crew::gradient_crew(runtime, request.options.clone());
    let output = crew.kickoff(inputs).await?;

    let (svg, source) = select_final_svg(&output)?;
    validate_svg(&svg)?;

    write_file(&request.output_path, &svg)?;
    tracing::info!(
        path = %request.output_path.display(),
        source = ?source,
        bytes = svg.len(),
        "wrote output SVG"
    );

    if let Some(report_path) = &request.report_path {
        write_report(report_path, &output)?;
    }

    Ok(PipelineOutcome {
        svg,
        source,
        output_path: request.output_path.clone(),
        crew: output,
    })
}

/// Pick the document to write.
///
/// The modifier tool's stored result wins when the final answer repeats it
/// verbatim, since it still carries the prolog (declaration, comments,
/// DOCTYPE). Otherwise an `<svg>` span from the answer is used if it is well
/// formed, falling back to the stored result when it is not.
pub fn select_final_svg(output: &CrewOutput) -> Result<(String, SvgSource), PipelineError> {
    let stored = output
        .state
        .final_svg
        .as_deref()
        .map(str::trim)
        .filter(|svg| !svg.is_empty());

    if let Some(svg) = stored
        && output.raw.contains(svg)
    {
        return Ok((svg.to_string(), SvgSource::WorkflowState));
    }

    let extracted = extract_svg(&output.raw).map(|svg| (svg, validate_svg(svg)));

    match (extracted, stored) {
        (Some((svg, Ok(()))), _) => Ok((svg.to_string(), SvgSource::AgentResponse)),
        (Some((_, Err(err))), Some(svg)) => {
            tracing::warn!(error = %err, "agent answer has a malformed SVG; using the modifier tool's result");
            Ok((svg.to_string(), SvgSource::WorkflowState))
        }
        (None, Some(svg)) => {
            tracing::info!("agent answer had no SVG; using the modifier tool's result");
            Ok((svg.to_string(), SvgSource::WorkflowState))
        }
        (Some((_, Err(err))), None) => Err(PipelineError::InvalidOutput(err)),
        (None, None) => Err(PipelineError::NoSvgProduced {
            raw: output.raw.clone(),
        }),
    }
}

/// Write the sample input document.
pub fn write_demo_svg(path: &Path) -> Result<(), PipelineError> {
    write_file(path, DEMO_SVG)
}

/// Write the crew output as pretty JSON.
pub fn write_report(path: &Path, output: &CrewOutput) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(output)?;
    write_file(path, &json)
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> Result<(), PipelineError> {
    let io_err = |source| PipelineError::WriteOutput {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, content).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::direct::DirectRuntime;
    use crate::runtime::AgentAction;
    use crate::testing::ScriptedRuntime;
    use crate::tools::{ToolCall, WorkflowState};
    use chrono::Utc;
    use ulid::Ulid;

    fn crew_output(raw: &str, final_svg: Option<&str>) -> CrewOutput {
        CrewOutput {
            run_id: Ulid::new(),
            provider: "test".to_string(),
            model: "test".to_string(),
            raw: raw.to_string(),
            task_outputs: Vec::new(),
            state: WorkflowState {
                final_svg: final_svg.map(String::from),
                ..WorkflowState::default()
            },
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    fn request(dir: &Path) -> PipelineRequest {
        PipelineRequest {
            prompt: DEMO_PROMPT.to_string(),
            input_path: dir.join("input.svg"),
            output_path: dir.join("out").join("output.svg"),
            report_path: None,
            options: CrewOptions::default(),
        }
    }

    #[test]
    fn selects_svg_from_agent_answer_first() {
        let output = crew_output("Sure!\n<svg a=\"1\"></svg>\nDone.", Some("<svg b=\"2\"/>"));
        let (svg, source) = select_final_svg(&output).unwrap();
        assert_eq!(svg, "<svg a=\"1\"></svg>");
        assert_eq!(source, SvgSource::AgentResponse);
    }

    #[test]
    fn falls_back_to_workflow_state() {
        let output = crew_output("I applied the gradient.", Some("<svg b=\"2\"/>"));
        let (svg, source) = select_final_svg(&output).unwrap();
        assert_eq!(svg, "<svg b=\"2\"/>");
        assert_eq!(source, SvgSource::WorkflowState);
    }

    #[test]
    fn no_svg_anywhere_is_an_error() {
        let output = crew_output("I could not do it.", Some("   "));
        match select_final_svg(&output) {
            Err(PipelineError::NoSvgProduced { raw }) => assert!(raw.contains("could not")),
            other => panic!("expected NoSvgProduced, got {:?}", other),
        }
    }

    #[test]
    fn verbatim_echo_prefers_stored_document() {
        let stored = "<?xml version=\"1.0\"?>\n<svg><rect fill=\"url(#grad1)\"/></svg>";
        let output = crew_output(&format!("Done:\n{}", stored), Some(stored));
        let (svg, source) = select_final_svg(&output).unwrap();
        assert_eq!(svg, stored);
        assert_eq!(source, SvgSource::WorkflowState);
    }

    #[test]
    fn malformed_answer_falls_back_to_stored_document() {
        let output = crew_output("<svg><rect></svg>", Some("<svg><rect/></svg>"));
        let (svg, source) = select_final_svg(&output).unwrap();
        assert_eq!(svg, "<svg><rect/></svg>");
        assert_eq!(source, SvgSource::WorkflowState);
    }

    #[test]
    fn malformed_answer_without_stored_document_is_invalid() {
        let output = crew_output("<svg><rect></svg>", None);
        assert!(matches!(
            select_final_svg(&output),
            Err(PipelineError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn nested_svg_input_survives_pipeline() {
        let dir = tempfile::TempDir::new().unwrap();
        let req = request(dir.path());
        std::fs::write(
            &req.input_path,
            r#"<svg xmlns="http://www.w3.org/2000/svg"><svg x="10"><rect width="5" height="5" fill="red"/></svg><rect width="9" height="9"/></svg>"#,
        )
        .unwrap();

        let outcome = run_pipeline(Arc::new(DirectRuntime::new()), &req)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&req.output_path).unwrap();
        validate_svg(&written).unwrap();
        assert_eq!(written.matches("fill=\"url(#grad1)\"").count(), 2);
        assert!(written.contains("<svg x=\"10\">"));
        assert_eq!(outcome.crew.state.shapes_updated, Some(2));
    }

    #[tokio::test]
    async fn nested_svg_echoed_with_prose_is_kept_whole() {
        let dir = tempfile::TempDir::new().unwrap();
        let req = request(dir.path());
        let nested = r#"<svg xmlns="http://www.w3.org/2000/svg"><svg x="1"><rect/></svg></svg>"#;
        std::fs::write(&req.input_path, nested).unwrap();

        let runtime = Arc::new(ScriptedRuntime::new(vec![
            AgentAction::UseTool {
                call_id: "1".to_string(),
                call: ToolCall::ParseGradientDetails {
                    prompt: DEMO_PROMPT.to_string(),
                },
            },
            AgentAction::Respond("parsed".to_string()),
            AgentAction::Respond(format!("Here it is:\n{}", nested)),
        ]));

        let outcome = run_pipeline(runtime, &req).await.unwrap();
        assert_eq!(outcome.source, SvgSource::AgentResponse);
        assert_eq!(outcome.svg, nested);
    }

    #[tokio::test]
    async fn prolog_and_doctype_survive_pipeline() {
        let dir = tempfile::TempDir::new().unwrap();
        let req = request(dir.path());
        std::fs::write(
            &req.input_path,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- (c) ACME -->\n\
             <!DOCTYPE svg [<!ENTITY c \"#00ff00\">]>\n\
             <svg xmlns=\"http://www.w3.org/2000/svg\"><rect stroke=\"&c;\" fill=\"red\"/></svg>",
        )
        .unwrap();

        let outcome = run_pipeline(Arc::new(DirectRuntime::new()), &req)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&req.output_path).unwrap();
        assert_eq!(written, outcome.svg);
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(written.contains("<!-- (c) ACME -->"));
        assert!(written.contains("<!ENTITY c"));
        assert!(written.contains("stroke=\"&c;\""));
        assert!(written.contains("fill=\"url(#grad1)\""));
    }

    #[tokio::test]
    async fn direct_pipeline_writes_output_and_report() {
        let dir = tempfile::TempDir::new().unwrap();
        write_demo_svg(&dir.path().join("input.svg")).unwrap();

        let mut req = request(dir.path());
        req.report_path = Some(dir.path().join("report.json"));

        let outcome = run_pipeline(Arc::new(DirectRuntime::new()), &req)
            .await
            .unwrap();

        assert_eq!(outcome.source, SvgSource::WorkflowState);
        let written = std::fs::read_to_string(&req.output_path).unwrap();
        assert_eq!(written, outcome.svg);
        assert!(written.contains("<linearGradient id=\"grad1\""));
        assert!(written.contains("fill=\"url(#grad1)\""));

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap())
                .unwrap();
        assert_eq!(report["provider"], "direct");
        assert_eq!(report["task_outputs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_agent_svg_is_rejected_before_writing() {
        let dir = tempfile::TempDir::new().unwrap();
        write_demo_svg(&dir.path().join("input.svg")).unwrap();
        let req = request(dir.path());

        let runtime = Arc::new(ScriptedRuntime::new(vec![
            AgentAction::UseTool {
                call_id: "1".to_string(),
                call: ToolCall::ParseGradientDetails {
                    prompt: DEMO_PROMPT.to_string(),
                },
            },
            AgentAction::Respond("parsed".to_string()),
            AgentAction::Respond("<svg><rect></svg>".to_string()),
        ]));

        let err = run_pipeline(runtime, &req).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidOutput(_)));
        assert!(!req.output_path.exists());
    }

    #[tokio::test]
    async fn missing_input_file_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let req = request(dir.path());
        let err = run_pipeline(Arc::new(DirectRuntime::new()), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ReadInput { .. }));
    }
}
