//! Batch progress reporting for `genie run`.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use title_genie_core::progress::{BatchProgressEvent, BatchProgressReporter, NoProgress};

/// Human-friendly progress on stderr: "row 12  done  1,204 / 5,000 rows  (3 titles)".
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        let line = match &event {
            BatchProgressEvent::RowStarted { row, done, total } => format!(
                "row {}  generating  {} / {} rows\n",
                format_number(*row as u64),
                format_number(*done as u64),
                format_number(*total as u64)
            ),
            BatchProgressEvent::RowFinished {
                row,
                accepted,
                done,
                total,
            } => format!(
                "row {}  done  {} / {} rows  ({} titles)\n",
                format_number(*row as u64),
                format_number(*done as u64),
                format_number(*total as u64),
                accepted
            ),
            BatchProgressEvent::RowFailed { row, reason, .. } => {
                format!("row {}  failed  {}\n", format_number(*row as u64), reason)
            }
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        let obj = match &event {
            BatchProgressEvent::RowStarted { row, done, total } => serde_json::json!({
                "event": "row_started",
                "row": row,
                "done": done,
                "total": total
            }),
            BatchProgressEvent::RowFinished {
                row,
                accepted,
                done,
                total,
            } => serde_json::json!({
                "event": "row_finished",
                "row": row,
                "accepted": accepted,
                "done": done,
                "total": total
            }),
            BatchProgressEvent::RowFailed {
                row,
                reason,
                done,
                total,
            } => serde_json::json!({
                "event": "row_failed",
                "row": row,
                "reason": reason,
                "done": done,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
