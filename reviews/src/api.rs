use crate::config::CorsConfig;
use crate::errors::{RelayError, StoreError};
use crate::metrics_defs::REQUEST_DURATION;
use crate::service::{ReviewService, Submission};
use crate::types::{ProductId, Review, ReviewSummary};
use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Query, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ORIGIN, VARY,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

pub const SUBMIT_OK: &str = "Review submitted successfully!";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Builds the public router: review endpoints, liveness, request metrics and
/// the optional single-origin CORS policy.
pub fn router(service: ReviewService, cors: Option<CorsConfig>) -> Router {
    let router = Router::new()
        .route("/", get(liveness))
        .route("/submit-review", post(submit_review))
        .route("/reviews", get(list_reviews))
        .with_state(service)
        .layer(middleware::from_fn(record_duration));

    match cors {
        Some(cors) => router.layer(middleware::from_fn_with_state(
            Arc::new(cors),
            cors_middleware,
        )),
        None => router,
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::Relay(RelayError::Store(StoreError::Remote { status, errors })) => {
                tracing::error!(%status, "store rejected request: {errors}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error: {errors}"),
                )
                    .into_response()
            }
            ApiError::Relay(err) => {
                tracing::error!("review relay failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
            }
        }
    }
}

async fn liveness() -> &'static str {
    "Review relay is running"
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    product_id: Option<ProductId>,
    review: Option<Review>,
    reviews: Option<Vec<Review>>,
}

async fn submit_review(
    State(service): State<ReviewService>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    let product_id = request
        .product_id
        .ok_or_else(|| ApiError::InvalidInput("Missing productId".into()))?;

    let submission = match (request.review, request.reviews) {
        (Some(review), None) => Submission::Append(review),
        (None, Some(reviews)) => Submission::Replace(reviews),
        (None, None) => return Err(ApiError::InvalidInput("Missing review".into())),
        (Some(_), Some(_)) => {
            return Err(ApiError::InvalidInput(
                "Send either review or reviews, not both".into(),
            ));
        }
    };

    service.submit(&product_id, submission).await?;
    Ok(SUBMIT_OK)
}

#[derive(Deserialize, Debug)]
struct ListParams {
    #[serde(rename = "productId")]
    product_id: Option<String>,
}

async fn list_reviews(
    State(service): State<ReviewService>,
    Query(params): Query<ListParams>,
) -> Result<Json<ReviewSummary>, ApiError> {
    let product_id = params
        .product_id
        .as_deref()
        .and_then(ProductId::parse)
        .ok_or_else(|| ApiError::InvalidInput("Missing productId".into()))?;

    Ok(Json(service.list(&product_id).await?))
}

async fn record_duration(req: Request, next: Next) -> Response {
    let handler = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    shared::histogram!(
        REQUEST_DURATION,
        "handler" => handler,
        "status" => response.status().as_u16().to_string()
    )
    .record(started.elapsed().as_secs_f64());
    response
}

async fn cors_middleware(
    State(cors): State<Arc<CorsConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(ORIGIN)
        .filter(|value| value.as_bytes() == cors.allowed_origin.as_bytes())
        .cloned();

    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        resp.headers_mut()
            .insert(VARY, HeaderValue::from_static("Origin"));
        if let Some(origin) = origin {
            let headers = resp.headers_mut();
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST"),
            );
            headers.insert(
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            );
        }
        return resp;
    }

    // Every response varies by origin once a policy is set
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.append(VARY, HeaderValue::from_static("Origin"));
    if let Some(origin) = origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    resp
}
