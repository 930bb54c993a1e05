//! Run external commands and report whether they succeeded

use crate::{ReplayLogError, Result};
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// Run `cmd` through `/bin/sh -c`; true only if it ran and exited 0
pub fn run_shell(cmd: &str) -> bool {
    match Command::new("/bin/sh").arg("-c").arg(cmd).status() {
        Ok(status) => {
            debug!(%status, cmd, "Shell command finished");
            status.success()
        }
        Err(e) => {
            warn!(error = %e, cmd, "Failed to invoke shell");
            false
        }
    }
}

/// Execute `argv[0]` (an absolute path) with the remaining arguments
pub fn run<S: AsRef<OsStr>>(argv: &[S]) -> bool {
    report(execute(argv, None))
}

/// Like [`run`], with the child's stdout written to `output`
pub fn run_redirected<P: AsRef<Path>, S: AsRef<OsStr>>(output: P, argv: &[S]) -> bool {
    report(execute(argv, Some(output.as_ref())))
}

/// Spawn and wait for `argv`, optionally truncating stdout into `output`.
///
/// The program path is not searched in `PATH`; relative paths are rejected.
pub fn execute<S: AsRef<OsStr>>(argv: &[S], output: Option<&Path>) -> Result<ExitStatus> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ReplayLogError::Command("empty argument list".to_string()))?;

    let program: &OsStr = program.as_ref();
    let program = Path::new(program);
    if !program.is_absolute() {
        return Err(ReplayLogError::Command(format!(
            "{} is not an absolute path",
            program.display()
        )));
    }

    let mut command = Command::new(program);
    command.args(args);
    if let Some(path) = output {
        let file = File::create(path).map_err(|e| {
            ReplayLogError::Command(format!("open {} failed: {}", path.display(), e))
        })?;
        command.stdout(Stdio::from(file));
    }

    command
        .status()
        .map_err(|e| ReplayLogError::Command(format!("{} failed to start: {}", program.display(), e)))
}

fn report(result: Result<ExitStatus>) -> bool {
    match result {
        Ok(status) if status.success() => true,
        Ok(status) => {
            debug!(%status, "Command exited unsuccessfully");
            false
        }
        Err(e) => {
            warn!(error = %e, "Command not run");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_shell_reports_exit_status() {
        assert!(run_shell("echo this is a test > /dev/null"));
        assert!(!run_shell("exit 3"));
        assert!(!run_shell("/nonexistent/binary"));
    }

    #[test]
    fn test_run_requires_absolute_path() {
        assert!(run(&["/bin/sh", "-c", "exit 0"]));
        assert!(!run(&["/bin/sh", "-c", "exit 1"]));
        assert!(!run(&["echo", "relative"]));
        assert!(!run::<&str>(&[]));
    }

    #[test]
    fn test_execute_reports_missing_program() {
        let err = execute(&["/nonexistent/binary"], None).unwrap_err();
        assert!(matches!(err, ReplayLogError::Command(_)));
    }

    #[test]
    fn test_run_redirected_captures_stdout() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.txt");

        assert!(run_redirected(&output, &["/bin/sh", "-c", "echo home is $HOME"]));
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.starts_with("home is"));
    }

    #[test]
    fn test_run_redirected_truncates_previous_output() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.txt");
        std::fs::write(&output, "stale content that is longer\n").unwrap();

        assert!(run_redirected(&output, &["/bin/sh", "-c", "echo fresh"]));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "fresh\n");
    }
}
