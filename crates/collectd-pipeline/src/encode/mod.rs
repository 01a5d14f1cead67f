// SPDX-License-Identifier: Apache-2.0

//! Per-backend batch encoders.
//!
//! Both backend families consume the same batch type; what differs is the
//! payload encoding and the request headers. The transport step itself
//! (single POST, 204 expected) lives in the writer and is shared.

use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::errors::EncodeError;
use crate::metric::MetricEvent;

pub mod exposition;
pub mod remote_write;

pub use exposition::ExpositionEncoder;
pub use remote_write::RemoteWriteEncoder;

/// Turns one batch into one outbound request body.
pub trait BatchEncoder: Send + Sync {
    /// Headers identifying the wire format, attached to every request.
    fn headers(&self) -> &HeaderMap;

    fn encode(&self, batch: &[MetricEvent]) -> Result<Vec<u8>, EncodeError>;
}

/// Wire format of a writer instance, selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Compressed protobuf remote-write (e.g. Prometheus, VictoriaMetrics).
    #[default]
    RemoteWrite,
    /// Newline-delimited text exposition (e.g. pushgateway-style imports).
    Exposition,
}

impl WireFormat {
    pub fn encoder(self) -> Box<dyn BatchEncoder> {
        match self {
            WireFormat::RemoteWrite => Box::new(RemoteWriteEncoder::new()),
            WireFormat::Exposition => Box::new(ExpositionEncoder::new()),
        }
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::RemoteWrite => write!(f, "remote_write"),
            WireFormat::Exposition => write!(f, "exposition"),
        }
    }
}
