// SPDX-License-Identifier: Apache-2.0

//! Normalized metric events, the pipeline's internal currency.

use std::collections::BTreeMap;
use std::fmt::Write;

/// Metric kind tag. Informational only; carried so an encoder that
/// distinguishes kinds can use it, ignored by the ones that don't.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    #[default]
    Unknown,
}

/// One normalized time-series point.
///
/// Labels live in a sorted map so every encoder observes them in
/// lexicographic key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricEvent {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
    pub kind: MetricKind,
    /// Milliseconds since epoch.
    pub timestamp_ms: i64,
}

/// A batch is owned by exactly one assembler cycle and dropped after the
/// transport step regardless of outcome.
pub type Batch = Vec<MetricEvent>;

impl MetricEvent {
    /// Appends this event as one exposition-format line:
    /// `name{key="value",...} value timestamp_ms\n`.
    ///
    /// Metric and label names get sanitized, label values escaped. The value
    /// is printed with six fractional digits, matching what the receiving
    /// endpoints were verified against.
    pub fn write_exposition(&self, out: &mut String) {
        out.push_str(&sanitize_name(&self.name));
        if !self.labels.is_empty() {
            // sanitizing can reorder keys (`-` sorts before `_`), so the
            // rendered pairs get sorted, not the raw ones
            let mut rendered: Vec<String> = self
                .labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", sanitize_name(k), escape_label_value(v)))
                .collect();
            rendered.sort_unstable();
            out.push('{');
            out.push_str(&rendered.join(","));
            out.push('}');
        }
        // String formatting is infallible
        let _ = writeln!(out, " {:.6} {}", self.value, self.timestamp_ms);
    }
}

/// Replaces characters the exposition format forbids in bare identifiers.
pub fn sanitize_name(name: &str) -> String {
    name.replace([' ', '-', '^', '#'], "_")
}

/// Escapes a label value for use inside double quotes: backslash, quote and
/// newline get backslash-escaped.
pub fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}
