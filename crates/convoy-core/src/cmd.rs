//! External command invocations with dry-run rendering.
//!
//! The release driver builds every mutating command as an [`Invocation`]
//! before deciding whether to run it, so a dry run can print exactly the
//! command line (and any stdin payload) that a real run would execute.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::context::WorkspaceContext;

/// Errors from running an external command.
#[derive(thiserror::Error, Debug)]
pub enum CmdError {
    /// Failed to spawn the program.
    #[error("failed to execute `{command}`: {source}")]
    Exec {
        /// The rendered command line.
        command: String,
        /// Spawn failure detail.
        source: std::io::Error,
    },

    /// The program ran and exited nonzero.
    #[error("`{command}` failed:\n{output}")]
    Failed {
        /// The rendered command line.
        command: String,
        /// Combined stdout and stderr from the failed run.
        output: String,
    },
}

/// Result alias for command execution.
pub type CmdResult<T> = Result<T, CmdError>;

/// A fully-described external command, ready to render or run.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Program name, resolved via `PATH`.
    pub program: String,
    /// Arguments, unquoted.
    pub args: Vec<String>,
    /// Payload piped to the child's stdin, if any.
    pub stdin: Option<String>,
}

impl Invocation {
    /// Build an invocation with no stdin payload.
    pub fn new(program: &str, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.to_string(),
            args: args.into_iter().collect(),
            stdin: None,
        }
    }

    /// Attach a stdin payload.
    #[must_use]
    pub fn with_stdin(mut self, stdin: String) -> Self {
        self.stdin = Some(stdin);
        self
    }

    /// The command line as it would appear in a shell, without quoting.
    pub fn rendered(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run the command in the workspace root, capturing output.
    pub fn run(&self, ctx: &WorkspaceContext) -> CmdResult<String> {
        debug!(command = %self.rendered(), "run");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(ctx.root())
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CmdError::Exec {
                command: self.rendered(),
                source,
            })?;

        // Feed stdin from a separate thread so a payload larger than the
        // pipe buffer cannot deadlock against an unread stdout/stderr.
        let mut writer = None;
        if let Some(payload) = &self.stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            let payload = payload.clone();
            writer = Some(std::thread::spawn(move || {
                pipe.write_all(payload.as_bytes())
            }));
        }

        let output = child.wait_with_output().map_err(|source| CmdError::Exec {
            command: self.rendered(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(CmdError::Failed {
                command: self.rendered(),
                output: combined,
            });
        }

        if let Some(handle) = writer {
            handle
                .join()
                .map_err(|_| CmdError::Exec {
                    command: self.rendered(),
                    source: std::io::Error::other("stdin writer panicked"),
                })?
                .map_err(|source| CmdError::Exec {
                    command: self.rendered(),
                    source,
                })?;
        }
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use camino::Utf8PathBuf;

    #[test]
    fn large_stdin_payload_round_trips_without_deadlock() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let ctx = WorkspaceContext::new(root, Config::default());

        // Well past the kernel pipe buffer, echoed straight back at us.
        let payload = "unreleased changelog line\n".repeat(100_000);
        let out = Invocation::new("cat", Vec::new())
            .with_stdin(payload.clone())
            .run(&ctx)
            .unwrap();
        assert_eq!(out.len(), payload.len());
    }

    #[test]
    fn rendered_joins_program_and_args() {
        let inv = Invocation::new("git", ["tag", "v1.2.3"].map(String::from));
        assert_eq!(inv.rendered(), "git tag v1.2.3");
    }

    #[test]
    fn with_stdin_attaches_payload() {
        let inv = Invocation::new("git", ["tag", "--file=-", "v1.0.0"].map(String::from))
            .with_stdin("notes".into());
        assert_eq!(inv.stdin.as_deref(), Some("notes"));
    }
}
