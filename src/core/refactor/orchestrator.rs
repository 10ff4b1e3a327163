use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{FileKind, RefactorConfig};
use crate::document;
use crate::error::Result;
use crate::http::Transport;
use crate::ledger::{StepLedger, StepOutcome};
use crate::occurrence::{OccurrenceEntry, OccurrenceTable, RevisionReport};
use crate::paths;
use crate::resolver::DependencyResolver;
use crate::search::{IncludeIndex, SearchClient};
use crate::strategy::{
    CompilerFlags, ConfiguredFlags, HeaderMapping, MappedHeaders, PathTranslator, PrefixTranslator,
};
use crate::tool::{self, ProcessRunner, ToolRequest, ToolRunner};

use super::report::{FileOutcome, FileReport, HarvestFailure, RunReport};

/// One refactoring request. `table` is already expanded: every header has
/// been attached to its owning source.
#[derive(Debug, Clone)]
pub struct RefactorSpec {
    pub term: String,
    pub value: String,
    pub table: OccurrenceTable,
}

/// Drives a refactor over an occurrence table.
///
/// Every side effect (tool launch, document rewrite) runs as a guarded
/// ledger step, in path order, so an interrupted run can be replayed.
pub struct Orchestrator {
    config: RefactorConfig,
    working_dir: Option<PathBuf>,
    source_paths: Box<dyn PathTranslator>,
    save_paths: Box<dyn PathTranslator>,
    flags: Box<dyn CompilerFlags>,
    mapping: Box<dyn HeaderMapping>,
    runner: Box<dyn ToolRunner>,
}

impl Orchestrator {
    /// Builds the configured strategies: prefix path translation, config
    /// compiler flags, the `headers.map` table and a process runner.
    pub fn from_config(config: RefactorConfig) -> Result<Self> {
        let (source_paths, save_paths) = PrefixTranslator::from_config(&config.paths)?;
        let working_dir = match &config.tool.working_dir {
            Some(raw) => Some(paths::expand(raw, "tool.workingDir")?),
            None => None,
        };

        Ok(Self {
            working_dir,
            source_paths: Box::new(source_paths),
            save_paths: Box::new(save_paths),
            flags: Box::new(ConfiguredFlags::from_config(&config.tool.compiler_args)),
            mapping: Box::new(MappedHeaders::new(config.headers.map.clone())),
            runner: Box::new(ProcessRunner),
            config,
        })
    }

    pub fn with_runner(mut self, runner: impl ToolRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_translators(
        mut self,
        source: impl PathTranslator + 'static,
        save: impl PathTranslator + 'static,
    ) -> Self {
        self.source_paths = Box::new(source);
        self.save_paths = Box::new(save);
        self
    }

    pub fn with_flags(mut self, flags: impl CompilerFlags + 'static) -> Self {
        self.flags = Box::new(flags);
        self
    }

    pub fn with_mapping(mut self, mapping: impl HeaderMapping + 'static) -> Self {
        self.mapping = Box::new(mapping);
        self
    }

    pub fn config(&self) -> &RefactorConfig {
        &self.config
    }

    /// Expands `table` (header owners attached) into a runnable spec.
    pub fn prepare(
        &self,
        term: &str,
        value: &str,
        mut table: OccurrenceTable,
        index: Option<&dyn IncludeIndex>,
    ) -> Result<RefactorSpec> {
        let mut resolver =
            DependencyResolver::new(&self.config.extensions).with_mapping(self.mapping.as_ref());
        if let Some(index) = index {
            resolver = resolver.with_index(index);
        }
        resolver.attach_owning_sources(&mut table)?;

        Ok(RefactorSpec {
            term: term.to_string(),
            value: value.to_string(),
            table,
        })
    }

    /// Full pipeline against the search index: occurrences, header
    /// resolution, guarded run, then revisions of the pre-expansion table
    /// when `reportRevisions` is set.
    pub fn run_from_index<T: Transport>(
        &self,
        client: &SearchClient<T>,
        term: &str,
        value: &str,
        ledger: &mut StepLedger,
    ) -> Result<RunReport> {
        let found = client.find_occurrences(term)?;
        let index: &dyn IncludeIndex = client;
        let spec = self.prepare(term, value, found.clone(), Some(index))?;
        let mut report = self.run(&spec, ledger)?;

        if self.config.report_revisions {
            self.attach_revisions(client, &found, &mut report);
        }

        Ok(report)
    }

    /// Harvests revisions of `table` into `report`. The edits are already
    /// on disk, so a failure is recorded on the report instead of returned.
    pub fn attach_revisions<T: Transport>(
        &self,
        client: &SearchClient<T>,
        table: &OccurrenceTable,
        report: &mut RunReport,
    ) {
        match client.find_revisions(table) {
            Ok(record) => report.revisions = Some(RevisionReport::from_record(&record)),
            Err(err) => {
                log_status!("revisions", "Harvest failed after the run: {}", err.message);
                report.revisions_error = Some(HarvestFailure::from(&err));
            }
        }
    }

    /// Runs every entry of `spec.table` in path order. The ledger stamp is
    /// removed only when every step succeeded.
    pub fn run(&self, spec: &RefactorSpec, ledger: &mut StepLedger) -> Result<RunReport> {
        ledger.begin()?;
        let resumed_from = ledger.resume_from();

        let owners = owners_by_header(&spec.table);
        let mut files = Vec::with_capacity(spec.table.len());

        for (path, entry) in spec.table.iter() {
            let kind = self.config.extensions.classify(path);
            let report = match kind {
                FileKind::Compiled => self.refactor_source(spec, path, entry, ledger)?,
                FileKind::Document => self.edit_document(spec, path, entry, ledger)?,
                FileKind::Header => {
                    let mut report = FileReport::new(path, kind, entry, FileOutcome::Reported);
                    report.owner = owners.get(path.as_str()).cloned();
                    report
                }
                FileKind::Other => {
                    log_status!("refactor", "Found <{}> but no action is defined for it", path);
                    FileReport::new(path, kind, entry, FileOutcome::Reported)
                }
            };
            files.push(report);
        }

        let total_steps = ledger.current_step();
        ledger.end()?;

        Ok(RunReport {
            term: spec.term.clone(),
            value: spec.value.clone(),
            dry_run: !ledger.executes(),
            resumed_from,
            total_steps,
            files,
            revisions: None,
            revisions_error: None,
        })
    }

    fn refactor_source(
        &self,
        spec: &RefactorSpec,
        path: &str,
        entry: &OccurrenceEntry,
        ledger: &mut StepLedger,
    ) -> Result<FileReport> {
        let source = self.source_paths.translate(path);
        let save = self.save_paths.translate(path);
        let overwrite = source == save;

        let request = ToolRequest {
            term: &spec.term,
            value: &spec.value,
            source: &source,
            overwrite,
            base_flags: &self.config.tool.compiler_args_base,
            file_flags: self.flags.flags(&source),
        };
        let invocation = tool::build_invocation(
            &self.config.tool.command,
            self.working_dir.as_deref(),
            &request,
        );
        let command = invocation.display();
        let save_path = (!overwrite).then_some(save.as_path());

        let outcome = ledger.guard(&command, || {
            tool::execute(self.runner.as_ref(), &invocation, save_path)
        })?;

        let mut report = FileReport::new(path, FileKind::Compiled, entry, file_outcome(&outcome));
        report.command = Some(command);
        report.step = Some(ledger.current_step());
        Ok(report)
    }

    fn edit_document(
        &self,
        spec: &RefactorSpec,
        path: &str,
        entry: &OccurrenceEntry,
        ledger: &mut StepLedger,
    ) -> Result<FileReport> {
        let Some(query) = self.config.document.query_for(&spec.term) else {
            log_status!("refactor", "No document query configured; skipping <{}>", path);
            let mut report =
                FileReport::new(path, FileKind::Document, entry, FileOutcome::Reported);
            report.message = Some("document.queryTemplate is not configured".to_string());
            return Ok(report);
        };

        let source = self.source_paths.translate(path);
        let save = self.save_paths.translate(path);
        let label = format!("remove {} from {}", query, source.display());

        let outcome = ledger.guard(&label, || {
            match document::remove_node(&source, &save, &query) {
                Ok(()) => Ok(None),
                Err(err) if !err.is_fatal() => Ok(Some(err)),
                Err(err) => Err(err),
            }
        })?;

        let mut report = match outcome {
            StepOutcome::Ran(Some(ambiguity)) => {
                log_status!("document", "{}", ambiguity.message);
                let mut report =
                    FileReport::new(path, FileKind::Document, entry, FileOutcome::Ambiguous);
                report.message = Some(ambiguity.message);
                report
            }
            other => FileReport::new(path, FileKind::Document, entry, file_outcome(&other)),
        };
        report.command = Some(label);
        report.step = Some(ledger.current_step());
        Ok(report)
    }
}

fn file_outcome<T>(outcome: &StepOutcome<T>) -> FileOutcome {
    match outcome {
        StepOutcome::Ran(_) => FileOutcome::Executed,
        StepOutcome::Resumed => FileOutcome::SkippedResumed,
        StepOutcome::Planned => FileOutcome::Planned,
    }
}

fn owners_by_header(table: &OccurrenceTable) -> BTreeMap<&str, String> {
    let mut owners = BTreeMap::new();
    for (source, entry) in table.iter() {
        for header in &entry.dependent_headers {
            owners.entry(header.as_str()).or_insert_with(|| source.clone());
        }
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use crate::error::Error;
    use crate::utils::command::CapturedOutput;
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl ToolRunner for Recorder {
        fn run(&self, invocation: &tool::ToolInvocation) -> Result<CapturedOutput> {
            self.calls.borrow_mut().push(invocation.args.clone());
            Ok(CapturedOutput {
                stdout: b"// refactored\n".to_vec(),
                ..CapturedOutput::default()
            })
        }
    }

    fn orchestrator(dir: &TempDir, save_root: Option<&Path>) -> Orchestrator {
        let mut config = RefactorConfig::default();
        config.paths = PathsConfig {
            strip_prefix: "/proj/".to_string(),
            source_root: dir.path().display().to_string(),
            save_root: save_root.map(|p| p.display().to_string()),
        };
        Orchestrator::from_config(config).unwrap()
    }

    fn ledger(dir: &TempDir, execute: bool) -> StepLedger {
        StepLedger::new(dir.path().join("step.txt"), execute, false)
    }

    #[test]
    fn headers_are_reported_with_their_owner() {
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let orchestrator = orchestrator(&dir, None)
            .with_runner(recorder.clone())
            .with_mapping(|h: &str| (h == "/proj/a.h").then(|| "/proj/a.cpp".to_string()));

        let mut table = OccurrenceTable::new();
        table.add_line("/proj/a.h", 3);
        let spec = orchestrator.prepare("T", "1", table, None).unwrap();
        let report = orchestrator.run(&spec, &mut ledger(&dir, true)).unwrap();

        assert_eq!(report.total_steps, 1);
        let header = report.file("/proj/a.h").unwrap();
        assert_eq!(header.outcome, FileOutcome::Reported);
        assert_eq!(header.owner.as_deref(), Some("/proj/a.cpp"));
        let source = report.file("/proj/a.cpp").unwrap();
        assert_eq!(source.dependent_headers, vec!["/proj/a.h"]);
        assert_eq!(recorder.calls.borrow().len(), 1);
    }

    #[test]
    fn separate_save_root_writes_tool_stdout() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let orchestrator = orchestrator(&dir, Some(out.path())).with_runner(recorder.clone());

        let table: OccurrenceTable = [("/proj/b.cpp".to_string(), OccurrenceEntry::with_lines([4]))]
            .into_iter()
            .collect();
        let spec = orchestrator.prepare("T", "1", table, None).unwrap();
        orchestrator.run(&spec, &mut ledger(&dir, true)).unwrap();

        let args = &recorder.calls.borrow()[0];
        assert!(!args.contains(&"--overwrite=true".to_string()));
        assert_eq!(
            std::fs::read_to_string(out.path().join("b.cpp")).unwrap(),
            "// refactored\n"
        );
    }

    #[test]
    fn dry_run_plans_every_step() {
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let orchestrator = orchestrator(&dir, None).with_runner(recorder.clone());

        let mut table = OccurrenceTable::new();
        table.add_line("/proj/a.cpp", 1);
        table.add_line("/proj/b.cpp", 2);
        table.add_path("/proj/README");
        let spec = orchestrator.prepare("T", "1", table, None).unwrap();
        let report = orchestrator.run(&spec, &mut ledger(&dir, false)).unwrap();

        assert!(report.dry_run);
        assert_eq!(report.count(FileOutcome::Planned), 2);
        assert_eq!(report.count(FileOutcome::Reported), 1);
        assert!(recorder.calls.borrow().is_empty());
        assert!(!dir.path().join("step.txt").exists());
    }

    #[test]
    fn unresolved_header_aborts_before_any_step() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir, None);

        let mut table = OccurrenceTable::new();
        table.add_line("/proj/lost.h", 1);
        let err: Error = orchestrator.prepare("T", "1", table, None).unwrap_err();

        assert_eq!(err.code.as_str(), "resolve.unresolved_header");
    }
}
