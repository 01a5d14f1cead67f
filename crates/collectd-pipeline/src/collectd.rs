// SPDX-License-Identifier: Apache-2.0

//! Wire shape of one collectd `write_http` measurement report.

use serde::Deserialize;

/// One measurement report as posted by collectd's `write_http` plugin.
///
/// A report may carry several parallel values (e.g. rx/tx of an interface);
/// `values`, `dstypes` and `dsnames` are index-aligned in that case. Reports
/// with a single value are allowed to omit the parallel arrays entirely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectdSample {
    #[serde(default)]
    pub values: Vec<f64>,
    #[serde(default)]
    pub dstypes: Vec<String>,
    #[serde(default)]
    pub dsnames: Vec<String>,
    /// Seconds since epoch, with fractional part.
    #[serde(default)]
    pub time: f64,
    /// Sampling interval in seconds.
    #[serde(default)]
    pub interval: f64,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub plugin: String,
    #[serde(default)]
    pub plugin_instance: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub type_instance: String,
    #[serde(default)]
    pub meta: SampleMeta,
}

/// Metadata attached by collectd's network plugin when a sample was relayed
/// from another node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleMeta {
    #[serde(rename = "network:received", default)]
    pub network_received: bool,
    #[serde(rename = "network:ip_address", default)]
    pub network_ip_address: String,
}
