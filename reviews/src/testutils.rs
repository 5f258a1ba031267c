use crate::config::StoreConfig;
use crate::store::{METAFIELD_TYPE, Metafield, REVIEWS_KEY, REVIEWS_NAMESPACE};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use url::Url;

pub const TEST_ACCESS_TOKEN: &str = "shpat_test";

#[derive(Default)]
struct FakeState {
    products: HashMap<String, Vec<Metafield>>,
    next_id: u64,
    writes: usize,
    fail_next: Option<StatusCode>,
    last_query: Option<MetafieldQuery>,
}

impl FakeState {
    fn add(&mut self, product_id: &str, new: NewMetafield) -> Metafield {
        self.next_id += 1;
        let metafield = Metafield {
            id: self.next_id,
            namespace: new.namespace,
            key: new.key,
            value: new.value,
            r#type: Some(new.r#type),
        };
        self.products
            .entry(product_id.to_string())
            .or_default()
            .push(metafield.clone());
        metafield
    }
}

type SharedState = Arc<Mutex<FakeState>>;

/// In-process stand-in for the product metafield endpoints of the Admin API.
pub struct FakeAdminApi {
    base_url: Url,
    state: SharedState,
}

impl FakeAdminApi {
    pub async fn start() -> Self {
        let state = SharedState::default();

        let app = Router::new()
            .route(
                "/admin/api/{version}/products/{product_id}/metafields.json",
                get(list_metafields).post(create_metafield),
            )
            .route(
                "/admin/api/{version}/products/{product_id}/metafields/{file}",
                put(update_metafield),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeAdminApi {
            base_url: Url::parse(&format!("http://{addr}")).unwrap(),
            state,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            domain: "test-store.myshopify.com".into(),
            access_token: TEST_ACCESS_TOKEN.into(),
            base_url: Some(self.base_url.clone()),
            ..Default::default()
        }
    }

    /// Seeds a metafield without counting it as a write.
    pub fn insert(&self, product_id: &str, namespace: &str, key: &str, value: &str) {
        self.lock().add(
            product_id,
            NewMetafield {
                namespace: namespace.into(),
                key: key.into(),
                r#type: METAFIELD_TYPE.into(),
                value: value.into(),
            },
        );
    }

    /// Value of the review list metafield of `product_id`.
    pub fn stored_value(&self, product_id: &str) -> Option<String> {
        self.lock()
            .products
            .get(product_id)?
            .iter()
            .find(|m| m.namespace == REVIEWS_NAMESPACE && m.key == REVIEWS_KEY)
            .map(|m| m.value.clone())
    }

    pub fn metafield_count(&self, product_id: &str) -> usize {
        self.lock().products.get(product_id).map_or(0, Vec::len)
    }

    /// Query parameters of the most recent metafield listing.
    pub fn last_query(&self) -> Option<MetafieldQuery> {
        self.lock().last_query.clone()
    }

    /// Number of successful creates and updates.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Makes the next request fail with `status`.
    pub fn fail_next(&self, status: StatusCode) {
        self.lock().fail_next = Some(status);
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

fn error(status: StatusCode, errors: serde_json::Value) -> Response {
    (status, Json(json!({ "errors": errors }))).into_response()
}

fn authorize<'a>(
    state: &'a SharedState,
    headers: &HeaderMap,
) -> Result<MutexGuard<'a, FakeState>, Response> {
    let token = headers
        .get("x-shopify-access-token")
        .and_then(|v| v.to_str().ok());
    if token != Some(TEST_ACCESS_TOKEN) {
        return Err(error(
            StatusCode::UNAUTHORIZED,
            json!("[API] Invalid API key or access token"),
        ));
    }

    let mut guard = state.lock().unwrap();
    if let Some(status) = guard.fail_next.take() {
        return Err(error(status, json!(status.canonical_reason())));
    }
    Ok(guard)
}

#[derive(Deserialize)]
struct WriteBody<T> {
    metafield: T,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MetafieldQuery {
    pub namespace: Option<String>,
    pub key: Option<String>,
}

#[derive(Deserialize)]
struct NewMetafield {
    namespace: String,
    key: String,
    #[serde(rename = "type")]
    r#type: String,
    value: String,
}

#[derive(Deserialize)]
struct MetafieldUpdate {
    id: u64,
    #[serde(rename = "type")]
    r#type: Option<String>,
    value: String,
}

// Metafield writes without a supported type are rejected.
fn check_type(r#type: Option<&str>) -> Result<(), Response> {
    match r#type {
        Some(METAFIELD_TYPE) => Ok(()),
        _ => Err(error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"type": ["can't be blank or unsupported"]}),
        )),
    }
}

async fn list_metafields(
    State(state): State<SharedState>,
    Path((_version, product_id)): Path<(String, String)>,
    Query(query): Query<MetafieldQuery>,
    headers: HeaderMap,
) -> Response {
    let mut guard = match authorize(&state, &headers) {
        Ok(guard) => guard,
        Err(response) => return response,
    };

    let metafields: Vec<Metafield> = guard
        .products
        .get(&product_id)
        .into_iter()
        .flatten()
        .filter(|m| query.namespace.as_ref().is_none_or(|ns| *ns == m.namespace))
        .filter(|m| query.key.as_ref().is_none_or(|key| *key == m.key))
        .cloned()
        .collect();
    guard.last_query = Some(query);
    Json(json!({ "metafields": metafields })).into_response()
}

async fn create_metafield(
    State(state): State<SharedState>,
    Path((_version, product_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<WriteBody<NewMetafield>>,
) -> Response {
    let mut guard = match authorize(&state, &headers) {
        Ok(guard) => guard,
        Err(response) => return response,
    };

    let new = body.metafield;
    if let Err(response) = check_type(Some(new.r#type.as_str())) {
        return response;
    }
    let duplicate = guard
        .products
        .get(&product_id)
        .is_some_and(|list| {
            list.iter()
                .any(|m| m.namespace == new.namespace && m.key == new.key)
        });
    if duplicate {
        return error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"key": ["must be unique within this namespace on this resource"]}),
        );
    }

    let metafield = guard.add(&product_id, new);
    guard.writes += 1;
    (StatusCode::CREATED, Json(json!({ "metafield": metafield }))).into_response()
}

async fn update_metafield(
    State(state): State<SharedState>,
    Path((_version, product_id, file)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<WriteBody<MetafieldUpdate>>,
) -> Response {
    let mut guard = match authorize(&state, &headers) {
        Ok(guard) => guard,
        Err(response) => return response,
    };

    let update = body.metafield;
    if let Err(response) = check_type(update.r#type.as_deref()) {
        return response;
    }

    let id = file
        .strip_suffix(".json")
        .and_then(|id| id.parse::<u64>().ok());
    if id != Some(update.id) {
        return error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"id": ["does not match the resource"]}),
        );
    }

    let updated = id.and_then(|id| {
        let metafield = guard
            .products
            .get_mut(&product_id)?
            .iter_mut()
            .find(|m| m.id == id)?;
        metafield.value = update.value;
        metafield.r#type = update.r#type;
        Some(metafield.clone())
    });

    match updated {
        Some(metafield) => {
            guard.writes += 1;
            Json(json!({ "metafield": metafield })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, json!("Not Found")),
    }
}
