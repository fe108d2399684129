//! Immutable description of one external command.

use std::path::{Path, PathBuf};

/// Where a process's captured output ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Redirect stdout into the capture file.
    Stdout,
    /// Append `<flag> <capture path>` to argv; the tool writes the file
    /// itself and stdout is discarded.
    OutputFlag(String),
    /// Hand stdout to the next stage of a pipeline; no capture file.
    Pipe,
}

/// Name, argv, working directory, and environment of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    name: String,
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    capture: Capture,
}

impl ProcessSpec {
    /// Create a spec capturing stdout. `argv[0]` is the program.
    pub fn new<I, S>(name: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProcessSpec {
            name: name.into(),
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            capture: Capture::Stdout,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_capture(mut self, capture: Capture) -> Self {
        self.capture = capture;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Capture file name for a process started at `stamp`.
    pub fn capture_file_name(&self, stamp: &str) -> String {
        let safe: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}-{}.log", stamp, safe)
    }

    /// Full argument list including any capture flag.
    pub(crate) fn effective_args(&self, capture_path: Option<&Path>) -> Vec<String> {
        let mut args = self.args().to_vec();
        if let (Capture::OutputFlag(flag), Some(path)) = (&self.capture, capture_path) {
            args.push(flag.clone());
            args.push(path.display().to_string());
        }
        args
    }
}
