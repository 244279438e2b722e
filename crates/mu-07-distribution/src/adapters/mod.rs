//! HTTP-backed sinks.

pub mod archive;
pub mod prover;
pub mod relay;

use std::time::Duration;

use crate::domain::errors::SinkError;

/// Shared client construction for the HTTP sinks.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a response to `Ok` on 2xx.
pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SinkError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SinkError::Status {
            status: status.as_u16(),
        })
    }
}

/// Append path segments to a base URL, percent-encoding each one.
pub(crate) fn join_segments(base: &str, segments: &[&str]) -> Result<reqwest::Url, SinkError> {
    let mut url = reqwest::Url::parse(base).map_err(|e| SinkError::Encoding(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| SinkError::Encoding(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segments_encodes() {
        let url = join_segments("http://relay.local/api/", &["streams", "0xabc/m3tering/test", "publish"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://relay.local/api/streams/0xabc%2Fm3tering%2Ftest/publish"
        );
    }

    #[test]
    fn test_join_segments_rejects_bad_base() {
        assert!(join_segments("not a url", &["x"]).is_err());
    }
}
