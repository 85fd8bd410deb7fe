//! Where per-post and per-target outcomes get reported.
//!
//! The pipeline never branches on what a sink does with an event; it only
//! reports. [`ConsoleSink`] is the one used by the binary: a readable block on
//! stdout/stderr for the operator and a structured `tracing` event for the log
//! file.

use std::fmt;

use chrono::Utc;
use console::{style, Term};
use serde_json::{Map, Value};
use tracing::{error, info};

/// How bad an event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A key/value pair attached to an event.
pub type Field<'a> = (&'a str, String);

/// Accepts structured outcome events.
pub trait ResultSink {
    fn record(&self, severity: Severity, message: &str, fields: &[Field<'_>]);

    fn info(&self, message: &str, fields: &[Field<'_>]) {
        self.record(Severity::Info, message, fields);
    }

    fn error(&self, message: &str, fields: &[Field<'_>]) {
        self.record(Severity::Error, message, fields);
    }
}

/// Renders an event the way the operator sees it:
///
/// ```text
/// INFO: downloaded file
///   subreddit: "wallpapers"
///   filePath: "/home/me/Pictures/wallpapers_Sunset_img.jpg"
/// ```
pub fn format_event(prefix: &str, message: &str, fields: &[Field<'_>]) -> String {
    let mut out = format!("{} {}\n", prefix, message);
    for (key, value) in fields {
        out.push_str(&format!("  {}: {:?}\n", key, value));
    }
    out.push('\n');
    out
}

fn fields_as_json(fields: &[Field<'_>]) -> String {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.clone())))
        .collect();
    Value::Object(map).to_string()
}

/// Prints events to the terminal and mirrors them into the structured log.
pub struct ConsoleSink {
    out: Term,
    err: Term,
    color: bool,
}

impl ConsoleSink {
    pub fn new(color: bool) -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            color,
        }
    }

    fn prefix(&self, severity: Severity) -> String {
        let label = format!("{}:", severity);
        if !self.color {
            return label;
        }
        match severity {
            Severity::Info => style(label).green().bold().to_string(),
            Severity::Error => style(label).red().bold().to_string(),
        }
    }
}

impl ResultSink for ConsoleSink {
    fn record(&self, severity: Severity, message: &str, fields: &[Field<'_>]) {
        let context = fields_as_json(fields);
        let timestamp = Utc::now().to_rfc3339();
        match severity {
            Severity::Info => info!(context = %context, timestamp = %timestamp, "{}", message),
            Severity::Error => error!(context = %context, timestamp = %timestamp, "{}", message),
        }

        let text = format_event(&self.prefix(severity), message, fields);
        let term = match severity {
            Severity::Info => &self.out,
            Severity::Error => &self.err,
        };
        // Nothing sensible to do if the terminal is gone; the log still has it.
        let _ = term.write_str(&text);
    }
}
