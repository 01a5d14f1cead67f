// SPDX-License-Identifier: Apache-2.0

//! Prometheus remote-write encoding: protobuf `WriteRequest`, snappy block
//! compression, `application/x-protobuf` transport headers.

use prost::Message;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};

use super::BatchEncoder;
use crate::errors::EncodeError;
use crate::metric::MetricEvent;

// Hand-rolled subset of prompb; the remote-write request only ever touches
// these four messages.

#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

pub struct RemoteWriteEncoder {
    headers: HeaderMap,
}

impl Default for RemoteWriteEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteWriteEncoder {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("snappy"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-protobuf"),
        );
        headers.insert(
            "x-prometheus-remote-write-version",
            HeaderValue::from_static("0.1.0"),
        );
        RemoteWriteEncoder { headers }
    }

    fn timeseries(event: &MetricEvent) -> TimeSeries {
        let mut labels = Vec::with_capacity(event.labels.len() + 1);
        labels.push(Label {
            name: "__name__".to_string(),
            value: event.name.clone(),
        });
        for (k, v) in &event.labels {
            labels.push(Label {
                name: k.clone(),
                value: v.clone(),
            });
        }
        // receivers are allowed to enforce sorted label sets
        labels.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        TimeSeries {
            labels,
            samples: vec![Sample {
                value: event.value,
                timestamp: event.timestamp_ms,
            }],
        }
    }
}

impl BatchEncoder for RemoteWriteEncoder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn encode(&self, batch: &[MetricEvent]) -> Result<Vec<u8>, EncodeError> {
        let request = WriteRequest {
            timeseries: batch.iter().map(Self::timeseries).collect(),
        };
        let raw = request.encode_to_vec();
        snap::raw::Encoder::new()
            .compress_vec(&raw)
            .map_err(|e| EncodeError::Compress(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn event(name: &str, labels: &[(&str, &str)], value: f64, ts: i64) -> MetricEvent {
        MetricEvent {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            value,
            timestamp_ms: ts,
            ..Default::default()
        }
    }

    fn decode(body: &[u8]) -> WriteRequest {
        let raw = snap::raw::Decoder::new().decompress_vec(body).unwrap();
        WriteRequest::decode(raw.as_slice()).unwrap()
    }

    #[test]
    fn encodes_name_as_dunder_label() {
        let encoder = RemoteWriteEncoder::new();
        let body = encoder
            .encode(&[event("cpu_total", &[("host", "leeloo")], 9.0, 1234)])
            .unwrap();

        let request = decode(&body);
        assert_eq!(request.timeseries.len(), 1);
        let series = &request.timeseries[0];
        assert!(series
            .labels
            .iter()
            .any(|l| l.name == "__name__" && l.value == "cpu_total"));
        assert_eq!(series.samples.len(), 1);
        assert_eq!(series.samples[0].value, 9.0);
        assert_eq!(series.samples[0].timestamp, 1234);
    }

    #[test]
    fn label_sets_are_sorted_by_name() {
        let encoder = RemoteWriteEncoder::new();
        let body = encoder
            .encode(&[event(
                "m",
                &[("zone", "a"), ("host", "h"), ("Zz", "upper")],
                1.0,
                0,
            )])
            .unwrap();

        let request = decode(&body);
        let names: Vec<&str> = request.timeseries[0]
            .labels
            .iter()
            .map(|l| l.name.as_str())
            .collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn one_series_per_event() {
        let encoder = RemoteWriteEncoder::new();
        let batch: Vec<MetricEvent> = (0..5)
            .map(|i| event("m", &[("host", "h")], i as f64, i))
            .collect();
        let request = decode(&encoder.encode(&batch).unwrap());
        assert_eq!(request.timeseries.len(), 5);
    }

    #[test]
    fn headers_identify_the_protocol() {
        let encoder = RemoteWriteEncoder::new();
        let headers = encoder.headers();
        assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "snappy");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/x-protobuf");
        assert_eq!(
            headers.get("x-prometheus-remote-write-version").unwrap(),
            "0.1.0"
        );
    }
}
