use std::fs::File;
use std::io::BufReader;

use stepwise::{
    Capability, CapabilityRegistry, CreativeReasoner, FallbackContext, FallbackFailure, SolutionTrace, SolveEngine,
    StepState, ToolOutcome, ToolReport, ToolValue, Verdict,
};

struct Fixed;

impl CreativeReasoner for Fixed {
    fn identity(&self) -> &str {
        "fixed"
    }

    fn generate(&self, _prompt: &str, _context: &FallbackContext) -> Result<String, FallbackFailure> {
        Ok("quantities noted".to_string())
    }
}

fn engine() -> SolveEngine {
    let tools = CapabilityRegistry::new()
        .with_fn(Capability::Arithmetic, |payload| {
            let rate: f64 = payload.numbers.iter().map(|n| 1.0 / n).sum();
            Ok(ToolReport::new(ToolValue::Number(1.0 / rate)))
        })
        .unwrap();
    SolveEngine::builder().tools(tools).reasoner(Fixed).build()
}

const MACHINES: &str = "Three machines can complete a job in 12, 6, and 4 hours respectively. How long together?";

#[test]
fn trace_file_round_trips() {
    let result = engine()
        .solve_text(MACHINES, None, &["2 hours", "3 hours", "Another answer"])
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");
    result.trace().write_json(File::create(&path).unwrap()).unwrap();

    let loaded: SolutionTrace = serde_json::from_reader(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(loaded.problem_id, result.problem_id);
    assert_eq!(loaded.answer, "2 hours");
    assert_eq!(loaded.match_kind, result.match_kind);
    assert_eq!(loaded.chain.steps.len(), 4);
    assert!(loaded.execution_time_ms.is_some());

    let compute = &loaded.chain.steps[2];
    assert_eq!(compute.tool_used, Some(Capability::Arithmetic));
    assert!(matches!(
        compute.tool_output,
        Some(ToolOutcome::Value {
            value: ToolValue::Number(_)
        })
    ));
    assert_eq!(compute.verified, Verdict::Passed);
    assert_eq!(compute.states.last(), Some(&StepState::Complete));
}

#[test]
fn trace_exposes_every_step_field() {
    let result = engine().solve_text(MACHINES, None, &[]).unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.trace().to_json_pretty().unwrap()).unwrap();

    for step in json["chain"]["steps"].as_array().unwrap() {
        for field in ["action", "thought", "result", "verified", "confidence", "states"] {
            assert!(step.get(field).is_some(), "missing {field} in {step}");
        }
    }
    assert_eq!(json["chain"]["final_answer"], "2 hours");
    assert_eq!(json["chain"]["problem_type"], "mathematical");
    let overall = json["chain"]["overall_confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&overall));
    assert!(json["verification"]["issues"].is_array());
}

#[test]
fn canonical_json_omits_timing() {
    let result = engine().solve_text(MACHINES, None, &[]).unwrap();
    let canonical: serde_json::Value = serde_json::from_str(&result.canonical_json().unwrap()).unwrap();
    assert!(canonical.get("execution_time_ms").is_none());
    assert_eq!(canonical["answer"], "2 hours");
}

#[test]
fn chain_summary_is_human_readable() {
    let result = engine().solve_text(MACHINES, None, &[]).unwrap();
    let text = result.to_string();
    assert!(text.contains("Step 3: compute"));
    assert!(text.contains("Tool: arithmetic"));
    assert!(text.contains("Answer: 2 hours"));
}
