//! Operations and reporting for the settings command-line tool.

pub mod dry_run;

pub use dry_run::DryRunBackend;

use anyhow::{Context, Result};
use mailroom_settings::{BatchAction, PendingSnapshot, SettingsEvent, SettingsModel};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::broadcast::error::TryRecvError;

/// One change requested on the command line.
///
/// Written as `set:PATH=VALUE`, `remove:PATH`, `restore:PATH` or
/// `reset:PATH`. `VALUE` is parsed as JSON and falls back to a plain
/// string when it is not valid JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Set { path: String, value: Value },
    Remove(String),
    Restore(String),
    Reset(String),
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("expected VERB:PATH, got `{s}`"))?;
        if rest.is_empty() {
            return Err(format!("missing path in `{s}`"));
        }
        match verb {
            "set" => {
                let (path, raw) = rest
                    .split_once('=')
                    .ok_or_else(|| format!("expected set:PATH=VALUE, got `{s}`"))?;
                let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw));
                Ok(Self::Set {
                    path: path.to_string(),
                    value,
                })
            }
            "remove" => Ok(Self::Remove(rest.to_string())),
            "restore" => Ok(Self::Restore(rest.to_string())),
            "reset" => Ok(Self::Reset(rest.to_string())),
            other => Err(format!("unknown operation `{other}`")),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { path, value } => write!(f, "set:{path}={value}"),
            Self::Remove(path) => write!(f, "remove:{path}"),
            Self::Restore(path) => write!(f, "restore:{path}"),
            Self::Reset(path) => write!(f, "reset:{path}"),
        }
    }
}

/// Reads a JSON document from disk.
pub fn load_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Applies `operations` as one transaction, then saves whatever is queued,
/// resets included.
pub fn apply(model: &mut SettingsModel, operations: &[Operation]) {
    model.begin_edit();
    for op in operations {
        match op {
            Operation::Set { path, value } => model.set(path, value.clone()),
            Operation::Remove(path) => model.remove(path),
            Operation::Restore(path) => model.restore(path),
            Operation::Reset(path) => model.reset(path),
        }
    }
    model.end_edit();
    model.save();
}

/// What happened to the batches of one run.
#[derive(Debug, Default)]
pub struct Report {
    /// Confirmed batches and their entry counts.
    pub saved: Vec<(BatchAction, usize)>,
    /// Failed batches with the reason.
    pub failed: Vec<(BatchAction, String)>,
    /// Whatever is still queued afterwards.
    pub pending: PendingSnapshot,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies `operations`, waits for every batch and reports the outcome.
pub async fn run(model: &mut SettingsModel, operations: &[Operation]) -> Report {
    let mut events = model.subscribe();
    apply(model, operations);
    model.wait_idle().await;

    let mut report = Report::default();
    loop {
        match events.try_recv() {
            Ok(SettingsEvent::Save { action, settings }) => {
                report.saved.push((action, settings.len()))
            }
            Ok(SettingsEvent::Exception {
                action, message, ..
            }) => report.failed.push((action, message)),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    report.pending = model.pending();
    report
}
