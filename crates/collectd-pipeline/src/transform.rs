// SPDX-License-Identifier: Apache-2.0

//! Conversion of one collectd sample into zero or more metric events.

use std::collections::BTreeMap;

use crate::collectd::CollectdSample;
use crate::host_labels::HostLabelMap;
use crate::metric::{MetricEvent, MetricKind};

/// Turns one sample into its metric events.
///
/// Deterministic and pure apart from reading the host label snapshot. A
/// single-value sample produces one event; a multi-value sample produces one
/// event per value, each tagged with a `type` label carrying the data-source
/// name and a kind derived from the data-source type.
pub fn transform(sample: &CollectdSample, host_labels: &HostLabelMap) -> Vec<MetricEvent> {
    let name = metric_name(sample);
    let labels = assemble_labels(sample, host_labels);
    let timestamp_ms = (sample.time * 1000.0) as i64;

    if sample.values.len() == 1 {
        return vec![MetricEvent {
            name,
            labels,
            value: sample.values[0],
            kind: MetricKind::Unknown,
            timestamp_ms,
        }];
    }

    sample
        .values
        .iter()
        .enumerate()
        .map(|(idx, &value)| {
            let mut labels = labels.clone();
            labels.insert(
                "type".to_string(),
                sample.dsnames.get(idx).cloned().unwrap_or_default(),
            );
            let kind = match sample.dstypes.get(idx).map(String::as_str) {
                Some("derive") | Some("counter") => MetricKind::Counter,
                Some("gauge") => MetricKind::Gauge,
                _ => MetricKind::Unknown,
            };
            MetricEvent {
                name: name.clone(),
                labels,
                value,
                kind,
                timestamp_ms,
            }
        })
        .collect()
}

/// Base metric name for a sample, shared by every event it fans out into.
///
/// `gauge` samples take the bare plugin name, `counter`/`derive` get a
/// `_total` suffix, and anything else appends the type name with a redundant
/// leading plugin prefix stripped off.
fn metric_name(sample: &CollectdSample) -> String {
    let plugin = sample.plugin.as_str();
    match sample.type_name.as_str() {
        "gauge" => plugin.to_string(),
        "counter" | "derive" => format!("{plugin}_total"),
        // type repeating the plugin name adds nothing
        t if t == plugin => plugin.to_string(),
        t => {
            let stripped = t
                .strip_prefix(plugin)
                .unwrap_or(t)
                .trim_start_matches(['_', '-']);
            format!("{plugin}_{stripped}")
                .trim_matches(['_', '-'])
                .to_string()
        }
    }
}

fn assemble_labels(
    sample: &CollectdSample,
    host_labels: &HostLabelMap,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    if let Some(extra) = host_labels.get(&sample.host) {
        for (k, v) in extra {
            labels.insert(k.clone(), v.clone());
        }
    }
    // Sample-level labels win on key collision
    labels.insert("host".to_string(), sample.host.clone());
    if !sample.plugin_instance.is_empty() {
        labels.insert("instance".to_string(), sample.plugin_instance.clone());
    }
    if !sample.type_instance.is_empty() {
        labels.insert("type_instance".to_string(), sample.type_instance.clone());
    }
    labels
}
