use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entry::RecordedAttempt;
use crate::writer::AuditError;

/// Serialisation format for [`render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// A pretty-printed JSON array.
    Json,
    /// RFC 4180 CSV with a header row.
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
            ExportFormat::Csv => f.write_str("csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown export format '{0}'; expected 'json' or 'csv'")]
pub struct UnknownFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

const CSV_HEADER: [&str; 10] = [
    "id",
    "event_id",
    "timestamp",
    "uid",
    "zone_id",
    "device_id",
    "resolved_user_id",
    "status",
    "reason",
    "decision_time_ms",
];

/// Serialise `records` in the given format, preserving their order.
pub fn render(records: &[RecordedAttempt], format: ExportFormat) -> Result<Vec<u8>, AuditError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(records)?),
        ExportFormat::Csv => Ok(render_csv(records).into_bytes()),
    }
}

fn render_csv(records: &[RecordedAttempt]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));
    for r in records {
        let a = &r.attempt;
        push_row(
            &mut out,
            [
                r.id.to_string(),
                a.event_id.to_string(),
                a.timestamp.to_rfc3339(),
                a.uid.clone(),
                a.zone_id.to_string(),
                a.device_id.clone().unwrap_or_default(),
                a.resolved_user_id.clone().unwrap_or_default(),
                a.status.to_string(),
                a.reason.clone(),
                format!("{:.3}", a.decision_time_ms),
            ],
        );
    }
    out
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (idx, field) in fields.into_iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&escape_csv(&field));
    }
    out.push_str("\r\n");
}

/// Quote a field when it contains a delimiter, quote, or line break;
/// embedded quotes are doubled.
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
