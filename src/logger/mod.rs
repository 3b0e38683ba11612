//! Activity logging: a process-wide JSONL sink for scenario lifecycle events.
//!
//! Library code calls [`emit`] unconditionally; events are dropped unless a
//! sink was installed with [`install`] (the CLI does this from config).

#![allow(missing_docs)]

pub mod jsonl;

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::config::LoggingConfig;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Events emitted by the scenario layer.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    ScenarioPrepared {
        scenario: String,
        dir: String,
        steps: usize,
        duration: Duration,
    },
    PrepareFailed {
        scenario: String,
        error_code: String,
        error_message: String,
    },
    CommandExecuted {
        dir: String,
        command: String,
        exit_code: i32,
        duration: Duration,
    },
    ScenariosListed {
        count: usize,
    },
    ScenarioWritten {
        scenario: String,
        dir: String,
    },
}

impl ActivityEvent {
    fn into_entry(self) -> LogEntry {
        match self {
            Self::ScenarioPrepared {
                scenario,
                dir,
                steps,
                duration,
            } => {
                let mut e = LogEntry::new(EventType::ScenarioPrepared, Severity::Info);
                e.scenario = Some(scenario);
                e.path = Some(dir);
                e.count = Some(steps);
                e.duration_ms = Some(duration_ms(duration));
                e
            }
            Self::PrepareFailed {
                scenario,
                error_code,
                error_message,
            } => {
                let mut e = LogEntry::new(EventType::PrepareFailed, Severity::Error);
                e.scenario = Some(scenario);
                e.error_code = Some(error_code);
                e.error_message = Some(error_message);
                e
            }
            Self::CommandExecuted {
                dir,
                command,
                exit_code,
                duration,
            } => {
                let severity = if exit_code == 0 {
                    Severity::Info
                } else {
                    Severity::Warning
                };
                let mut e = LogEntry::new(EventType::CommandExecuted, severity);
                e.path = Some(dir);
                e.command = Some(command);
                e.exit_code = Some(exit_code);
                e.duration_ms = Some(duration_ms(duration));
                e
            }
            Self::ScenariosListed { count } => {
                let mut e = LogEntry::new(EventType::ScenariosListed, Severity::Info);
                e.count = Some(count);
                e
            }
            Self::ScenarioWritten { scenario, dir } => {
                let mut e = LogEntry::new(EventType::ScenarioWritten, Severity::Info);
                e.scenario = Some(scenario);
                e.path = Some(dir);
                e
            }
        }
    }

    fn summary(&self) -> String {
        match self {
            Self::ScenarioPrepared { scenario, dir, .. } => {
                format!("prepared {scenario} at {dir}")
            }
            Self::PrepareFailed {
                scenario,
                error_message,
                ..
            } => format!("prepare of {scenario} failed: {error_message}"),
            Self::CommandExecuted {
                command, exit_code, ..
            } => format!("`{command}` exited with {exit_code}"),
            Self::ScenariosListed { count } => format!("listed {count} scenario(s)"),
            Self::ScenarioWritten { scenario, dir } => format!("wrote {scenario} to {dir}"),
        }
    }
}

/// Cloneable handle to an activity sink.
#[derive(Clone)]
pub struct ActivityLog {
    writer: Option<Arc<Mutex<JsonlWriter>>>,
    verbose: bool,
}

impl ActivityLog {
    /// Sink that writes JSONL to `path`.
    pub fn to_file(path: &Path) -> Self {
        Self {
            writer: Some(Arc::new(Mutex::new(JsonlWriter::open(JsonlConfig::new(
                path,
            ))))),
            verbose: false,
        }
    }

    /// Sink that drops everything.
    pub fn disabled() -> Self {
        Self {
            writer: None,
            verbose: false,
        }
    }

    /// Build a sink from the `[logging]` config section.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut log = config
            .activity_log
            .as_deref()
            .map_or_else(Self::disabled, Self::to_file);
        log.verbose = config.verbose;
        log
    }

    /// Also echo a one-line summary of each event to stderr.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn record(&self, event: ActivityEvent) {
        if self.verbose {
            eprintln!("[ST] {}", event.summary());
        }
        if let Some(writer) = &self.writer {
            writer.lock().write_entry(&event.into_entry());
        }
    }
}

static SINK: OnceLock<ActivityLog> = OnceLock::new();

/// Install the process-wide sink. Returns `false` if one was already installed.
pub fn install(log: ActivityLog) -> bool {
    SINK.set(log).is_ok()
}

/// Record an event on the process-wide sink, if any.
pub fn emit(event: ActivityEvent) {
    if let Some(log) = SINK.get() {
        log.record(event);
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
