//! Solve records.
//!
//! Every finished submission produces one line on stdout:
//! `<UTC ISO-8601 timestamp>,solve,<parent accepted 1|0>,<aux accepted 1|0>`.
use chrono::{DateTime, SecondsFormat, Utc};
use std::{
    fmt,
    io::{self, Write},
};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolveRecord {
    pub timestamp: DateTime<Utc>,
    pub parent_accepted: bool,
    pub aux_accepted: bool,
}

impl SolveRecord {
    pub fn new(parent_accepted: bool, aux_accepted: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            parent_accepted,
            aux_accepted,
        }
    }

    /// What the worker is told: the share counted for at least one chain.
    pub fn accepted(&self) -> bool {
        self.parent_accepted || self.aux_accepted
    }
}

impl fmt::Display for SolveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},solve,{},{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            u8::from(self.parent_accepted),
            u8::from(self.aux_accepted)
        )
    }
}

pub trait SolveReporter: Send + Sync {
    fn report(&self, record: &SolveRecord);
}

/// Writes solve records to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl SolveReporter for StdoutReporter {
    fn report(&self, record: &SolveRecord) {
        info!(
            parent_accepted = record.parent_accepted,
            aux_accepted = record.aux_accepted,
            "Share submitted"
        );
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{record}").and_then(|_| stdout.flush()) {
            warn!("Failed to write solve record: {}", e);
        }
    }
}
