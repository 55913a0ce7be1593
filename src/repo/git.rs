//! [`Repository`] backed by the `git` command line.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use crate::error::{PatchError, Result};
use crate::repo::{ExportOptions, Repository};

/// Runs `git` inside a working tree or bare repository.
#[derive(Debug, Clone)]
pub struct GitCli {
    dir: PathBuf,
    program: String,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            program: "git".to_string(),
        }
    }

    /// Use a different `git` executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a revision to its full commit id.
    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        let args = [
            "rev-parse".to_string(),
            "--verify".to_string(),
            format!("{rev}^{{commit}}"),
        ];
        Ok(self.run(&args, None)?.trim().to_string())
    }

    fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        let command = args.first().cloned().unwrap_or_default();
        debug!(dir = %self.dir.display(), ?args, "Running git");

        let mut child = Command::new(&self.program)
            .arg("-C")
            .arg(&self.dir)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PatchError::Git {
                command: command.clone(),
                stderr: e.to_string(),
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).map_err(|e| PatchError::Git {
                command: command.clone(),
                stderr: e.to_string(),
            })?;
        }

        let output = child.wait_with_output().map_err(|e| PatchError::Git {
            command: command.clone(),
            stderr: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(PatchError::Git {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(bytes = stdout.len(), "git finished");
        Ok(stdout)
    }
}

/// Arguments for `git format-patch`.
fn format_patch_args(base: &str, head: &str, options: &ExportOptions) -> Vec<String> {
    let mut args = vec![
        "format-patch".to_string(),
        "--stdout".to_string(),
        "--thread=shallow".to_string(),
        format!("--subject-prefix={}", options.subject_prefix),
    ];
    if options.cover_letter {
        args.push("--cover-letter".to_string());
    }
    if let Some(id) = &options.in_reply_to {
        args.push(format!("--in-reply-to={id}"));
    }
    args.extend(options.to.iter().map(|to| format!("--to={to}")));
    args.extend(options.cc.iter().map(|cc| format!("--cc={cc}")));
    args.extend(options.add_headers.iter().map(|h| format!("--add-header={h}")));
    args.push(format!("{base}..{head}"));
    args
}

/// Arguments for `git tag`. The message is read from stdin.
fn tag_args(name: &str, commit: &str) -> Vec<String> {
    vec![
        "tag".to_string(),
        "-a".to_string(),
        "-f".to_string(),
        "-F".to_string(),
        "-".to_string(),
        name.to_string(),
        commit.to_string(),
    ]
}

/// Arguments for `git push`; a forced refspec so a re-created tag replaces
/// the stale one.
fn push_tag_args(remote: &str, name: &str) -> Vec<String> {
    vec![
        "push".to_string(),
        remote.to_string(),
        format!("+refs/tags/{name}"),
    ]
}

impl Repository for GitCli {
    fn format_patch(&self, base: &str, head: &str, options: &ExportOptions) -> Result<String> {
        self.run(&format_patch_args(base, head, options), None)
    }

    fn range_diff(&self, old_range: &str, new_range: &str) -> Result<String> {
        let args = [
            "range-diff".to_string(),
            "--no-color".to_string(),
            "--creation-factor=95".to_string(),
            old_range.to_string(),
            new_range.to_string(),
        ];
        self.run(&args, None)
    }

    fn rev_list(&self, range: &str) -> Result<Vec<String>> {
        let out = self.run(&["rev-list".to_string(), range.to_string()], None)?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn create_tag(&self, name: &str, message: &str, commit: &str) -> Result<()> {
        self.run(&tag_args(name, commit), Some(message)).map(|_| ())
    }

    fn push_tag(&self, remote: &str, name: &str) -> Result<()> {
        self.run(&push_tag_args(remote, name), None).map(|_| ())
    }
}
