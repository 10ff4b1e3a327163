//! External refactoring binary.
//!
//! Invocation shape:
//! `<command> --term=<term> --value=<value> [--overwrite=true] <file> -- <flags...>`
//!
//! With `--overwrite=true` the binary rewrites the file itself. Without it,
//! stdout is the complete replacement content and is saved by the caller.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ToolFailedDetails};
use crate::utils::command::{self, CapturedOutput};
use crate::utils::{io, shell};

/// A fully built command line plus the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn display(&self) -> String {
        shell::display_command(&self.program, &self.args)
    }
}

/// Launches invocations. Implementations must block until the process exits.
pub trait ToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<CapturedOutput>;
}

/// Runs the binary as a child process, without a shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<CapturedOutput> {
        command::run_captured(
            &invocation.program,
            &invocation.args,
            invocation.working_dir.as_deref(),
        )
    }
}

/// Everything that varies per refactored file.
#[derive(Debug, Clone)]
pub struct ToolRequest<'a> {
    pub term: &'a str,
    pub value: &'a str,
    pub source: &'a Path,
    pub overwrite: bool,
    pub base_flags: &'a [String],
    pub file_flags: Vec<String>,
}

pub fn build_invocation(
    command: &str,
    working_dir: Option<&Path>,
    request: &ToolRequest<'_>,
) -> ToolInvocation {
    let mut args = vec![
        format!("--term={}", request.term),
        format!("--value={}", request.value),
    ];
    if request.overwrite {
        args.push("--overwrite=true".to_string());
    }
    args.push(request.source.to_string_lossy().into_owned());
    args.push("--".to_string());
    args.extend(request.base_flags.iter().cloned());
    args.extend(request.file_flags.iter().cloned());

    ToolInvocation {
        program: command.to_string(),
        args,
        working_dir: working_dir.map(Path::to_path_buf),
    }
}

/// Runs `invocation`; a non-zero exit becomes `ToolFailed`. When
/// `save_path` is given, stdout replaces that file.
pub fn execute(
    runner: &dyn ToolRunner,
    invocation: &ToolInvocation,
    save_path: Option<&Path>,
) -> Result<()> {
    let output = runner.run(invocation)?;

    if !output.success() {
        return Err(Error::tool_failed(ToolFailedDetails {
            command: invocation.display(),
            exit_code: output.exit_code,
            stdout: if save_path.is_some() {
                String::new()
            } else {
                output.stdout_lossy()
            },
            stderr: output.stderr,
        }));
    }

    if let Some(path) = save_path {
        io::write_bytes_atomic(path, &output.stdout, "save refactored output")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct Scripted {
        exit_code: i32,
        stdout: &'static str,
        calls: RefCell<Vec<ToolInvocation>>,
    }

    impl ToolRunner for Scripted {
        fn run(&self, invocation: &ToolInvocation) -> Result<CapturedOutput> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok(CapturedOutput {
                stdout: self.stdout.as_bytes().to_vec(),
                stderr: String::new(),
                exit_code: self.exit_code,
            })
        }
    }

    fn scripted(exit_code: i32, stdout: &'static str) -> Scripted {
        Scripted {
            exit_code,
            stdout,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn request<'a>(source: &'a Path, base: &'a [String], overwrite: bool) -> ToolRequest<'a> {
        ToolRequest {
            term: "FEATURE_X",
            value: "true",
            source,
            overwrite,
            base_flags: base,
            file_flags: vec!["-I.".to_string()],
        }
    }

    #[test]
    fn invocation_follows_binary_contract() {
        let base = vec!["-std=c++11".to_string()];
        let invocation = build_invocation(
            "./simpleRefactor",
            Some(Path::new("/opt/tool")),
            &request(Path::new("src/a.cpp"), &base, true),
        );

        assert_eq!(invocation.program, "./simpleRefactor");
        assert_eq!(
            invocation.args,
            vec![
                "--term=FEATURE_X",
                "--value=true",
                "--overwrite=true",
                "src/a.cpp",
                "--",
                "-std=c++11",
                "-I.",
            ]
        );
        assert_eq!(invocation.working_dir, Some(PathBuf::from("/opt/tool")));
    }

    #[test]
    fn out_of_place_invocation_omits_overwrite() {
        let invocation =
            build_invocation("tool", None, &request(Path::new("a.cpp"), &[], false));
        assert!(!invocation.args.iter().any(|a| a.starts_with("--overwrite")));
    }

    #[test]
    fn non_zero_exit_is_tool_failed() {
        let runner = scripted(2, "");
        let invocation = build_invocation("tool", None, &request(Path::new("a.cpp"), &[], true));

        let err = execute(&runner, &invocation, None).unwrap_err();

        assert_eq!(err.code.as_str(), "tool.failed");
        assert_eq!(err.details["exitCode"], 2);
    }

    #[test]
    fn stdout_replaces_save_path() {
        let dir = TempDir::new().unwrap();
        let save = dir.path().join("out.cpp");
        let runner = scripted(0, "int refactored;\n");
        let invocation = build_invocation("tool", None, &request(Path::new("a.cpp"), &[], false));

        execute(&runner, &invocation, Some(&save)).unwrap();

        assert_eq!(std::fs::read_to_string(save).unwrap(), "int refactored;\n");
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_maps_real_exit_codes() {
        let invocation = ToolInvocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string()],
            working_dir: None,
        };

        let err = execute(&ProcessRunner, &invocation, None).unwrap_err();
        assert_eq!(err.details["exitCode"], 3);
    }
}
