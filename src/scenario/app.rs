//! A materialized scenario on disk and the means to run commands inside it.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tempfile::TempDir;

use crate::core::config::ExecuteConfig;
use crate::core::errors::{Result, ScenarioError};
use crate::logger::{self, ActivityEvent};

const READ_BUF_SIZE: usize = 8 * 1024;

/// Program plus the flag that makes it run one command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    pub program: String,
    pub arg: String,
}

impl Shell {
    pub fn new(program: impl Into<String>, arg: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            arg: arg.into(),
        }
    }

    pub fn from_config(config: &ExecuteConfig) -> Self {
        Self::new(&config.shell, &config.shell_arg)
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::from_config(&ExecuteConfig::default())
    }
}

/// Per-call options for [`PreparedApp::execute_with`].
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Merged over the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Overrides the app's shell for this call.
    pub shell: Option<Shell>,
}

impl ExecOptions {
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn shell(mut self, shell: Shell) -> Self {
        self.shell = Some(shell);
        self
    }
}

/// Which pipe a chunk of output arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
struct Chunk {
    stream: Stream,
    bytes: Vec<u8>,
}

/// Result of one command. Text views are assembled on access.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Exit status, or `-1` if the process was terminated by a signal.
    pub exit_code: i32,
    pub duration: Duration,
    chunks: Vec<Chunk>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout(&self) -> String {
        self.join(Some(Stream::Stdout))
    }

    pub fn stderr(&self) -> String {
        self.join(Some(Stream::Stderr))
    }

    /// stdout and stderr interleaved in the order they were read.
    pub fn output(&self) -> String {
        self.join(None)
    }

    fn join(&self, stream: Option<Stream>) -> String {
        let bytes: Vec<u8> = self
            .chunks
            .iter()
            .filter(|c| stream.is_none_or(|s| c.stream == s))
            .flat_map(|c| c.bytes.iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// A scenario written to disk.
///
/// When the directory was auto-allocated, this handle shares ownership of it;
/// the directory is removed once every handle is dropped.
#[derive(Debug, Clone)]
pub struct PreparedApp {
    dir: PathBuf,
    shell: Shell,
    temp_guard: Option<Arc<TempDir>>,
}

impl PreparedApp {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            shell: Shell::default(),
            temp_guard: None,
        }
    }

    pub(crate) fn with_guard(mut self, guard: Option<Arc<TempDir>>) -> Self {
        self.temp_guard = guard;
        self
    }

    #[must_use]
    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    /// Directory the scenario was written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the directory is removed once the last handle is dropped.
    pub fn is_temporary(&self) -> bool {
        self.temp_guard.is_some()
    }

    /// Run `command` through the shell with the app directory as cwd.
    ///
    /// A non-zero exit is reported in [`ExecOutput::exit_code`], not as an
    /// error. There is no timeout.
    pub fn execute(&self, command: &str) -> Result<ExecOutput> {
        self.execute_with(command, &ExecOptions::default())
    }

    pub fn execute_with(&self, command: &str, options: &ExecOptions) -> Result<ExecOutput> {
        let shell = options.shell.as_ref().unwrap_or(&self.shell);
        let started = Instant::now();

        let mut child = Command::new(&shell.program)
            .arg(&shell.arg)
            .arg(command)
            .current_dir(&self.dir)
            .envs(&options.env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ScenarioError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        // Ends once both readers hit EOF and drop their senders.
        let chunks: Vec<Chunk> = rx.iter().collect();

        let mut read_error = None;
        for reader in readers {
            match reader.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => read_error = Some(e),
                Err(_) => read_error = Some(std::io::Error::other("output reader panicked")),
            }
        }
        let status = child
            .wait()
            .map_err(|source| ScenarioError::io(&self.dir, source))?;
        if let Some(source) = read_error {
            return Err(ScenarioError::io(&self.dir, source));
        }

        let output = ExecOutput {
            exit_code: exit_code(status),
            duration: started.elapsed(),
            chunks,
        };
        logger::emit(ActivityEvent::CommandExecuted {
            dir: self.dir.display().to_string(),
            command: command.to_string(),
            exit_code: output.exit_code,
            duration: output.duration,
        });
        Ok(output)
    }
}

fn spawn_reader<R>(mut source: R, stream: Stream, tx: Sender<Chunk>) -> JoinHandle<std::io::Result<()>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0_u8; READ_BUF_SIZE];
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            let chunk = Chunk {
                stream,
                bytes: buf[..n].to_vec(),
            };
            if tx.send(chunk).is_err() {
                return Ok(());
            }
        }
    })
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
