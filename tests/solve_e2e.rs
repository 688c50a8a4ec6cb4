use std::sync::{Arc, Mutex};

use stepwise::{
    Capability, CapabilityRegistry, CreativeReasoner, FallbackContext, FallbackFailure, IssueKind, MatchKind,
    ProblemType, SolveEngine, StepOrigin, Strategy, ToolFailure, ToolReport, ToolValue, Verdict,
};

const MACHINES: &str = "Three machines can complete a job in 12, 6, and 4 hours respectively. How long together?";
const RACE: &str = "You overtake second place in a race. What position are you in?";

/// Collaborator stub that always replies with the same text and records
/// every request.
struct Scripted {
    reply: Result<String, FallbackFailure>,
    requests: Mutex<Vec<Option<String>>>,
}

impl Scripted {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(FallbackFailure::rejected("stub refuses")),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<Option<String>> {
        self.requests.lock().unwrap().clone()
    }
}

impl CreativeReasoner for Scripted {
    fn identity(&self) -> &str {
        "scripted"
    }

    fn generate(&self, _prompt: &str, context: &FallbackContext) -> Result<String, FallbackFailure> {
        self.requests.lock().unwrap().push(context.sub_problem.clone());
        self.reply.clone()
    }
}

fn work_rate_tools() -> CapabilityRegistry {
    CapabilityRegistry::new()
        .with_fn(Capability::Arithmetic, |payload| {
            if payload.numbers.iter().any(|n| *n == 0.0) {
                return Err(ToolFailure::numeric("division by zero"));
            }
            let rate: f64 = payload.numbers.iter().map(|n| 1.0 / n).sum();
            Ok(ToolReport::new(ToolValue::Number(1.0 / rate)))
        })
        .unwrap()
}

fn engine(tools: CapabilityRegistry, reasoner: Arc<Scripted>) -> SolveEngine {
    SolveEngine::builder().tools(tools).shared_reasoner(reasoner).build()
}

#[test]
fn work_rate_problem_is_computed_by_the_arithmetic_tool() {
    let engine = engine(work_rate_tools(), Arc::new(Scripted::replying("combined rate of all machines")));
    let result = engine
        .solve_text(MACHINES, None, &["2 hours", "3 hours", "4 hours", "5 hours", "Another answer"])
        .unwrap();

    assert_eq!(result.chain.plan.problem_type, ProblemType::Mathematical);
    assert_eq!(result.chain.plan.strategy, Strategy::DirectCalculation);
    assert_eq!(result.raw_answer, "2 hours");
    assert_eq!(result.answer, "2 hours");
    assert_eq!(result.matched_option.as_deref(), Some("2 hours"));
    assert!(matches!(result.match_kind, MatchKind::Exact | MatchKind::Numeric));
    assert!(result.confidence.value() >= 0.8, "confidence {}", result.confidence);
    assert!(result.is_valid());

    let answer_step = result.chain.answer_source().unwrap();
    assert_eq!(answer_step.origin, StepOrigin::Tool);
    assert_eq!(answer_step.tool_used, Some(Capability::Arithmetic));
}

#[test]
fn work_rate_problem_without_collaborator_keeps_the_tool_answer() {
    let engine = SolveEngine::builder().tools(work_rate_tools()).build();
    let result = engine
        .solve_text(MACHINES, None, &["2 hours", "3 hours", "4 hours", "5 hours", "Another answer"])
        .unwrap();

    assert_eq!(result.answer, "2 hours");
    assert_eq!(result.chain.answer_source().unwrap().origin, StepOrigin::Tool);
    // Narrative steps stay unresolved: two of four pass, and both steps
    // built on "extract quantities" lose their prerequisite.
    assert_eq!(result.verification.issues_of(IssueKind::BrokenDependency).count(), 2);
    assert!((result.confidence.value() - 0.7).abs() < 1e-9, "confidence {}", result.confidence);
    assert!(result.is_valid());
}

#[test]
fn race_riddle_escalates_to_the_collaborator() {
    let reasoner = Arc::new(Scripted::replying("Second"));
    let engine = engine(work_rate_tools(), Arc::clone(&reasoner));
    let result = engine
        .solve_text(RACE, None, &["First", "Second", "Third", "Fourth", "Another answer"])
        .unwrap();

    assert_eq!(result.chain.plan.problem_type, ProblemType::ClassicRiddle);
    assert_eq!(result.chain.plan.strategy, Strategy::CreativeThinking);
    assert_eq!(result.answer, "Second");
    assert_eq!(result.match_kind, MatchKind::Exact);
    assert!((result.confidence.value() - 0.5).abs() < 1e-9, "confidence {}", result.confidence);
    assert!(result.chain.steps.iter().all(|s| s.origin == StepOrigin::Fallback));
    assert!(result.chain.steps.iter().all(|s| s.tool_used.is_none()));
    assert_eq!(reasoner.requests().len(), result.chain.steps.len());
}

#[test]
fn failing_tool_falls_back_exactly_once_per_step() {
    let tools = CapabilityRegistry::new()
        .with_fn(Capability::Arithmetic, |_| Err(ToolFailure::numeric("division by zero")))
        .unwrap();
    let reasoner = Arc::new(Scripted::failing());
    let engine = engine(tools, Arc::clone(&reasoner));
    let result = engine.solve_text(MACHINES, None, &[]).unwrap();

    let plan = &result.chain.plan;
    let requests = reasoner.requests();
    for sub in &plan.sub_problems {
        let count = requests
            .iter()
            .filter(|r| r.as_deref() == Some(sub.description.as_str()))
            .count();
        assert_eq!(count, 1, "sub-problem '{}'", sub.description);
    }
    // Nothing resolved, so exactly one whole-chain escalation follows.
    assert_eq!(requests.iter().filter(|r| r.is_none()).count(), 1);
    assert_eq!(result.chain.steps.len(), plan.sub_problems.len() + 1);
    assert!(result.chain.steps.iter().all(|s| s.verified == Verdict::Failed));
    assert_eq!(result.confidence.value(), 0.0);
    assert!(!result.is_valid());
}

#[test]
fn answer_is_always_one_of_the_options() {
    let engine = engine(work_rate_tools(), Arc::new(Scripted::replying("a completely unrelated reply")));
    let cases: [(&str, &[&str]); 4] = [
        (MACHINES, &["1 hour", "3 hours", "7 hours"]),
        (RACE, &["First", "Second", "Another answer"]),
        ("What has keys but cannot open locks?", &["A piano", "A map"]),
        ("Zyx qwv?", &["Yes", "No"]),
    ];
    for (text, options) in cases {
        let result = engine.solve_text(text, None, options).unwrap();
        assert!(
            options.contains(&result.answer.as_str()),
            "{text}: '{}' is not an option",
            result.answer
        );
        let c = result.confidence.value();
        assert!((0.0..=1.0).contains(&c));
        assert!(!result.chain.steps.is_empty());
    }
}

#[test]
fn repeated_solves_are_identical() {
    let reasoner = Arc::new(Scripted::replying("Second"));
    let engine = engine(work_rate_tools(), reasoner);
    let options = ["First", "Second", "Third", "Fourth", "Another answer"];

    let first = engine.solve_text(RACE, None, &options).unwrap();
    let second = engine.solve_text(RACE, None, &options).unwrap();
    assert_eq!(first.canonical_json().unwrap(), second.canonical_json().unwrap());
    assert_eq!(first.problem_id, second.problem_id);

    let first = engine.solve_text(MACHINES, Some("Math"), &[]).unwrap();
    let second = engine.solve_text(MACHINES, Some("Math"), &[]).unwrap();
    assert_eq!(first.canonical_json().unwrap(), second.canonical_json().unwrap());
}

#[test]
fn classification_and_strategy_are_stable() {
    let engine = SolveEngine::default();
    let planner = engine.planner();
    for text in [MACHINES, RACE, "What is the next number in the sequence 2, 4, 8?"] {
        let problem = stepwise::Problem::new(text, None, Vec::new()).unwrap();
        let first = planner.create_plan(&problem);
        for _ in 0..5 {
            let again = planner.create_plan(&problem);
            assert_eq!(again.problem_type, first.problem_type);
            assert_eq!(again.strategy, first.strategy);
        }
    }
}

#[test]
fn unmatched_answer_uses_the_sentinel_with_capped_confidence() {
    let engine = engine(work_rate_tools(), Arc::new(Scripted::replying("Last")));
    let result = engine
        .solve_text(RACE, None, &["First", "Second", "Another answer"])
        .unwrap();
    assert_eq!(result.answer, "Another answer");
    assert_eq!(result.match_kind, MatchKind::Sentinel);
    assert!(result.confidence.value() <= 0.5);
}

#[test]
fn blank_options_are_reported_as_malformed() {
    let engine = engine(work_rate_tools(), Arc::new(Scripted::replying("Second")));
    let result = engine.solve_text(RACE, None, &["", "  "]).unwrap();
    assert_eq!(result.match_kind, MatchKind::Malformed);
    assert!(result.matched_option.is_none());
    assert_eq!(result.confidence.value(), 0.0);
}
