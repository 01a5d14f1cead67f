// SPDX-License-Identifier: Apache-2.0

//! Transform-and-forward pipeline for collectd metric samples.
//!
//! Samples decoded from the collectd `write_http` JSON format are turned into
//! normalized metric events, buffered under backpressure, assembled into
//! bounded batches, and shipped to a metrics backend in either the Prometheus
//! remote-write wire format or the plain text exposition format.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod collectd;
pub mod encode;
pub mod errors;
pub mod host_labels;
pub mod metric;
pub mod queue;
pub mod stats;
pub mod transform;
pub mod writer;
