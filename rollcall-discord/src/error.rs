use thiserror::Error;

/// Error surface for Discord REST calls.
#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("{endpoint} rate limited; retry after {retry_after}s")]
    RateLimited { endpoint: String, retry_after: f64 },

    #[error("{endpoint} unreachable: {message}")]
    Transport { endpoint: String, message: String },

    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, serde::Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    retry_after: Option<f64>,
}

pub(crate) fn http_err(endpoint: &str, err: ureq::Error) -> DiscordError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            from_status(endpoint, status, &body)
        }
        ureq::Error::Transport(transport) => DiscordError::Transport {
            endpoint: endpoint.to_string(),
            message: transport.to_string(),
        },
    }
}

pub(crate) fn from_status(endpoint: &str, status: u16, body: &str) -> DiscordError {
    let parsed: Option<ApiError> = serde_json::from_str(body).ok();
    if status == 429 {
        return DiscordError::RateLimited {
            endpoint: endpoint.to_string(),
            retry_after: parsed.and_then(|e| e.retry_after).unwrap_or(0.0),
        };
    }

    let message = match parsed {
        // 50001: Missing Access: usually the members intent is off.
        Some(ApiError {
            message: Some(msg),
            code: Some(50001),
            ..
        }) => format!("{msg} (is the Server Members intent enabled?)"),
        Some(ApiError {
            message: Some(msg),
            ..
        }) => msg,
        _ => body.trim().to_string(),
    };
    DiscordError::Http {
        endpoint: endpoint.to_string(),
        status,
        message,
    }
}
