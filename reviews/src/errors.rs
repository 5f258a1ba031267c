use http::StatusCode;
use thiserror::Error;

/// Failures talking to the remote metafield store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store answered with a non-2xx status. `errors` is the store's own
    /// error description, or the raw body when it had none.
    #[error("remote store returned {status}: {errors}")]
    Remote { status: StatusCode, errors: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid store URL: {0}")]
    InvalidUrl(String),
}

/// Failures of a submit or list operation.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("stored review list is not valid JSON: {0}")]
    MalformedReviewList(#[source] serde_json::Error),

    #[error("could not encode review list: {0}")]
    Encode(#[source] serde_json::Error),
}
