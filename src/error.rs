use thiserror::Error;

/// Every failure aborts the run; callers only propagate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed ({status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    Http { status: u16, url: String, body: String },

    #[error("provider returned code {code}: {message}")]
    Provider { code: String, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Turn a non-2xx response into `Error::Http`, keeping the body for diagnostics.
pub async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Http {
        status: status.as_u16(),
        url,
        body,
    })
}
