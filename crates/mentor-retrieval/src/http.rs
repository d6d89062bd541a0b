//! Shared plumbing for the remote embedding and vector-index clients.

use std::time::Duration;

use mentor_core::error::MentorError;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, MentorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MentorError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// A failure to reach the remote at all.
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> MentorError {
    if err.is_timeout() {
        MentorError::Connectivity(format!("{} timed out: {}", service, err))
    } else {
        MentorError::Connectivity(format!("{} unreachable: {}", service, err))
    }
}

/// Turn a non-success response into `Upstream`, keeping the status code.
pub(crate) async fn check_status(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, MentorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MentorError::Upstream {
        status: Some(status.as_u16()),
        message: format!("{} returned {}: {}", service, status, truncate(&body, 200)),
    })
}

pub(crate) fn malformed(service: &str, detail: impl std::fmt::Display) -> MentorError {
    MentorError::Upstream {
        status: None,
        message: format!("{} sent a malformed response: {}", service, detail),
    }
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_base() {
        assert_eq!(trim_base("https://api.example.com/v1/"), "https://api.example.com/v1");
        assert_eq!(trim_base("http://localhost:9000"), "http://localhost:9000");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
        assert_eq!(truncate("short", 10), "short");
    }
}
