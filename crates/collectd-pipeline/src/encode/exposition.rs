// SPDX-License-Identifier: Apache-2.0

//! Plain text exposition encoding: one `name{labels} value timestamp_ms`
//! line per event, POSTed as `text/plain`.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use super::BatchEncoder;
use crate::errors::EncodeError;
use crate::metric::MetricEvent;

pub struct ExpositionEncoder {
    headers: HeaderMap,
}

impl Default for ExpositionEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpositionEncoder {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        ExpositionEncoder { headers }
    }
}

impl BatchEncoder for ExpositionEncoder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn encode(&self, batch: &[MetricEvent]) -> Result<Vec<u8>, EncodeError> {
        let mut buf = String::new();
        for event in batch {
            event.write_exposition(&mut buf);
        }
        Ok(buf.into_bytes())
    }
}
