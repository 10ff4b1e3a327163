use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use grokrefactor::config::RefactorConfig;
use grokrefactor::ledger::StepLedger;
use grokrefactor::occurrence::OccurrenceTable;
use grokrefactor::refactor::{FileOutcome, Orchestrator, RefactorSpec};
use grokrefactor::tool::{ToolInvocation, ToolRunner};
use grokrefactor::utils::command::CapturedOutput;
use grokrefactor::ErrorCode;
use tempfile::TempDir;

const CONFIG_XML: &str = r#"<?xml version="1.0"?>
<config>
  <value name="FEATURE_X">false</value>
  <value name="FEATURE_Y">true</value>
</config>
"#;

/// Records every invocation and answers with a fixed exit code.
#[derive(Clone)]
struct ScriptedTool {
    exit_code: i32,
    calls: Rc<RefCell<Vec<ToolInvocation>>>,
}

impl ScriptedTool {
    fn exiting(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl ToolRunner for ScriptedTool {
    fn run(&self, invocation: &ToolInvocation) -> grokrefactor::Result<CapturedOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        Ok(CapturedOutput {
            stdout: Vec::new(),
            stderr: if self.exit_code == 0 {
                String::new()
            } else {
                "parse error".to_string()
            },
            exit_code: self.exit_code,
        })
    }
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.cpp"), "int x = FEATURE_X;\n").unwrap();
    fs::write(dir.path().join("config.xml"), CONFIG_XML).unwrap();
    dir
}

fn config_for(dir: &Path) -> RefactorConfig {
    let raw = format!(
        r#"{{
            "paths": {{ "sourceRoot": "{}" }},
            "document": {{ "queryTemplate": "/config/value[@name='{{term}}']" }},
            "ledger": {{ "stampFile": "{}" }}
        }}"#,
        dir.display(),
        dir.join("step.txt").display()
    );
    RefactorConfig::from_json(&raw, "test").unwrap()
}

fn spec(orchestrator: &Orchestrator) -> RefactorSpec {
    let table: OccurrenceTable =
        serde_json::from_str(r#"{"a.cpp": {"lines": [10, 20]}, "config.xml": {}}"#).unwrap();
    orchestrator
        .prepare("FEATURE_X", "true", table, None)
        .unwrap()
}

fn ledger_for(config: &RefactorConfig) -> StepLedger {
    StepLedger::from_config(&config.ledger).unwrap()
}

#[test]
fn compiled_source_and_document_run_as_two_steps() {
    let dir = workspace();
    let config = config_for(dir.path());
    let tool = ScriptedTool::exiting(0);
    let orchestrator = Orchestrator::from_config(config.clone())
        .unwrap()
        .with_runner(tool.clone());

    let report = orchestrator
        .run(&spec(&orchestrator), &mut ledger_for(&config))
        .unwrap();

    let calls = tool.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args[0], "--term=FEATURE_X");
    assert_eq!(calls[0].args[1], "--value=true");
    assert_eq!(calls[0].args[2], "--overwrite=true");
    assert!(calls[0].args[3].ends_with("a.cpp"));
    assert_eq!(calls[0].args[4], "--");

    let source = report.file("a.cpp").unwrap();
    assert_eq!(source.outcome, FileOutcome::Executed);
    assert_eq!(source.lines, vec![10, 20]);
    assert_eq!(source.step, Some(1));

    let document = report.file("config.xml").unwrap();
    assert_eq!(document.outcome, FileOutcome::Executed);
    assert_eq!(document.step, Some(2));
    let xml = fs::read_to_string(dir.path().join("config.xml")).unwrap();
    assert!(!xml.contains("FEATURE_X"));
    assert!(xml.contains("FEATURE_Y"));

    assert_eq!(report.total_steps, 2);
    assert!(!dir.path().join("step.txt").exists());
}

#[test]
fn tool_exit_code_aborts_run_and_keeps_stamp() {
    let dir = workspace();
    let config = config_for(dir.path());
    let orchestrator = Orchestrator::from_config(config.clone())
        .unwrap()
        .with_runner(ScriptedTool::exiting(2));

    let err = orchestrator
        .run(&spec(&orchestrator), &mut ledger_for(&config))
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ToolFailed);
    assert_eq!(err.details["exitCode"], 2);
    assert_eq!(err.details["step"], 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("step.txt")).unwrap(),
        "1"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("config.xml")).unwrap(),
        CONFIG_XML
    );
}

#[test]
fn rerun_after_failure_resumes_at_failed_step() {
    let dir = workspace();
    let config = config_for(dir.path());
    fs::write(dir.path().join("config.xml"), "<config>").unwrap();

    let first_tool = ScriptedTool::exiting(0);
    let first = Orchestrator::from_config(config.clone())
        .unwrap()
        .with_runner(first_tool.clone());
    let err = first
        .run(&spec(&first), &mut ledger_for(&config))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::StepFailed);
    assert_eq!(err.details["causeCode"], "document.invalid");
    assert_eq!(first_tool.calls.borrow().len(), 1);

    fs::write(dir.path().join("config.xml"), CONFIG_XML).unwrap();
    let second_tool = ScriptedTool::exiting(0);
    let second = Orchestrator::from_config(config.clone())
        .unwrap()
        .with_runner(second_tool.clone());
    let report = second
        .run(&spec(&second), &mut ledger_for(&config))
        .unwrap();

    assert_eq!(report.resumed_from, Some(2));
    assert!(second_tool.calls.borrow().is_empty());
    assert_eq!(report.file("a.cpp").unwrap().outcome, FileOutcome::SkippedResumed);
    assert_eq!(report.file("config.xml").unwrap().outcome, FileOutcome::Executed);
    assert!(!dir.path().join("step.txt").exists());
}

#[test]
fn ambiguous_document_does_not_stop_the_run() {
    let dir = workspace();
    let config = config_for(dir.path());
    let orchestrator = Orchestrator::from_config(config.clone())
        .unwrap()
        .with_runner(ScriptedTool::exiting(0));

    let spec = orchestrator
        .prepare(
            "FEATURE_Z",
            "true",
            serde_json::from_str(r#"{"a.cpp": {"lines": [1]}, "config.xml": {}, "zz.cpp": {}}"#)
                .unwrap(),
            None,
        )
        .unwrap();
    let report = orchestrator.run(&spec, &mut ledger_for(&config)).unwrap();

    let document = report.file("config.xml").unwrap();
    assert_eq!(document.outcome, FileOutcome::Ambiguous);
    assert_eq!(document.step, Some(2));
    assert_eq!(report.file("zz.cpp").unwrap().step, Some(3));
    assert_eq!(
        fs::read_to_string(dir.path().join("config.xml")).unwrap(),
        CONFIG_XML
    );
    assert!(!dir.path().join("step.txt").exists());
}
