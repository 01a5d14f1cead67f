// SPDX-License-Identifier: Apache-2.0

/// Errors fatal to a writer instance's construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid destination url {0}: {1}")]
    InvalidUrl(String, String),

    #[error("failed to read host label file {0}: {1}")]
    HostLabelRead(String, String),

    #[error("failed to parse host label file {0}: {1}")]
    HostLabelParse(String, String),

    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

/// Errors producing a wire payload from a batch.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to compress payload: {0}")]
    Compress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::InvalidUrl("ht!tp://".to_string(), "bad scheme".to_string());
        assert_eq!(
            error.to_string(),
            "invalid destination url ht!tp://: bad scheme"
        );
    }
}
