//! Error types for rollcall-google.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from credential handling and Sheets calls.
#[derive(Debug, Error)]
pub enum GoogleError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A credentials or token file did not parse.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The client secret file is not an "installed app" client.
    #[error("{path} has no `installed` client section")]
    NotInstalledApp { path: PathBuf },

    /// The endpoint answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The request never got an answer (DNS, TLS, timeout, …).
    #[error("{endpoint} unreachable: {message}")]
    Transport { endpoint: String, message: String },

    /// The response body was not the JSON we expected.
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The user submitted an empty authorization code.
    #[error("no authorization code entered")]
    EmptyCode,

    /// The stored token has expired and carries no refresh token.
    #[error("access token expired and no refresh token is stored; run `rollcall auth --force`")]
    NoRefreshToken,
}

/// Convenience constructor for [`GoogleError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> GoogleError {
    GoogleError::Io {
        path: path.into(),
        source,
    }
}

/// Map a `ureq` failure onto [`GoogleError`], pulling the API's own message
/// out of error bodies when there is one.
pub(crate) fn http_err(endpoint: &str, err: ureq::Error) -> GoogleError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            GoogleError::Http {
                endpoint: endpoint.to_string(),
                status,
                message: api_message(&body),
            }
        }
        ureq::Error::Transport(transport) => GoogleError::Transport {
            endpoint: endpoint.to_string(),
            message: transport.to_string(),
        },
    }
}

/// `{"error":{"message":…}}` (Sheets) or `{"error_description":…}` (OAuth),
/// falling back to the raw body.
pub(crate) fn api_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error_description"))
                .and_then(|m| m.as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheets_error_message_is_extracted() {
        let body = r#"{"error":{"code":400,"message":"Invalid requests[0].deleteDimension","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(api_message(body), "Invalid requests[0].deleteDimension");
    }

    #[test]
    fn oauth_error_description_is_extracted() {
        let body = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;
        assert_eq!(api_message(body), "Bad Request");
    }

    #[test]
    fn non_json_body_passes_through() {
        assert_eq!(api_message("  upstream timeout \n"), "upstream timeout");
    }
}
