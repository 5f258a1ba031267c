use crate::config::StoreConfig;
use crate::errors::StoreError;
use crate::metrics_defs::STORE_REQUEST_DURATION;
use crate::types::ProductId;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Instant;
use url::Url;

pub const REVIEWS_NAMESPACE: &str = "custom";
pub const REVIEWS_KEY: &str = "reviews_list";
pub const METAFIELD_TYPE: &str = "json";

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

pub type MetafieldId = u64;

/// A metafield as returned by the Admin API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metafield {
    pub id: MetafieldId,
    pub namespace: String,
    pub key: String,
    /// Raw metafield value. For the review list this is itself a JSON
    /// document encoded as a string.
    #[serde(deserialize_with = "value_as_text")]
    pub value: String,
    #[serde(rename = "type", default)]
    pub r#type: Option<String>,
}

impl Metafield {
    fn is_reviews_list(&self) -> bool {
        self.namespace == REVIEWS_NAMESPACE && self.key == REVIEWS_KEY
    }
}

// Some API versions hand json metafields back already decoded.
fn value_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

/// Storage of the per-product review list metafield.
///
/// There is no compare-and-swap: `update` overwrites whatever is stored,
/// so a caller doing find-then-update can lose a concurrent writer's change.
#[async_trait]
pub trait MetafieldStore: Send + Sync {
    /// Returns the `custom.reviews_list` metafield of the product, if any.
    async fn find(&self, product_id: &ProductId) -> Result<Option<Metafield>, StoreError>;

    /// Creates the `custom.reviews_list` metafield with `value`.
    async fn create(&self, product_id: &ProductId, value: String)
    -> Result<Metafield, StoreError>;

    /// Overwrites the value of an existing metafield.
    async fn update(
        &self,
        product_id: &ProductId,
        id: MetafieldId,
        value: String,
    ) -> Result<Metafield, StoreError>;
}

#[derive(Deserialize)]
struct MetafieldList {
    metafields: Vec<Metafield>,
}

#[derive(Deserialize)]
struct MetafieldEnvelope {
    metafield: Metafield,
}

#[derive(Serialize)]
struct NewMetafield<'a> {
    namespace: &'a str,
    key: &'a str,
    r#type: &'a str,
    value: String,
}

#[derive(Serialize)]
struct MetafieldUpdate<'a> {
    id: MetafieldId,
    r#type: &'a str,
    value: String,
}

#[derive(Serialize)]
struct WriteRequest<T> {
    metafield: T,
}

/// Client for the product metafield endpoints of the Admin REST API.
#[derive(Clone)]
pub struct AdminApiClient {
    client: reqwest::Client,
    origin: Url,
    api_version: String,
    access_token: String,
}

impl AdminApiClient {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let origin = config
            .origin()
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;

        Ok(AdminApiClient {
            client: reqwest::Client::new(),
            origin,
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// `{origin}/admin/api/{version}/products/{product}/` followed by `tail`.
    fn product_url(&self, product_id: &ProductId, tail: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.origin.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.origin.to_string()))?
            .pop_if_empty()
            .extend([
                "admin",
                "api",
                self.api_version.as_str(),
                "products",
                product_id.as_str(),
            ])
            .extend(tail);
        Ok(url)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let started = Instant::now();
        let result = request
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .send()
            .await;

        let status = match &result {
            Ok(response) => response.status().as_u16().to_string(),
            Err(_) => "error".to_string(),
        };
        shared::histogram!(STORE_REQUEST_DURATION, "operation" => operation, "status" => status)
            .record(started.elapsed().as_secs_f64());

        let response = result?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(remote_error(response).await)
        }
    }
}

async fn remote_error(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StoreError::Remote {
        status,
        errors: describe_errors(&body),
    }
}

/// Extracts the `errors` member of an Admin API error body, falling back to
/// the body itself.
fn describe_errors(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut fields)) => match fields.remove("errors") {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}

#[async_trait]
impl MetafieldStore for AdminApiClient {
    async fn find(&self, product_id: &ProductId) -> Result<Option<Metafield>, StoreError> {
        let url = self.product_url(product_id, &["metafields.json"])?;
        let request = self
            .client
            .get(url)
            .query(&[("namespace", REVIEWS_NAMESPACE), ("key", REVIEWS_KEY)]);

        let list: MetafieldList = self.send("find", request).await?.json().await?;
        Ok(list.metafields.into_iter().find(Metafield::is_reviews_list))
    }

    async fn create(
        &self,
        product_id: &ProductId,
        value: String,
    ) -> Result<Metafield, StoreError> {
        let url = self.product_url(product_id, &["metafields.json"])?;
        let body = WriteRequest {
            metafield: NewMetafield {
                namespace: REVIEWS_NAMESPACE,
                key: REVIEWS_KEY,
                r#type: METAFIELD_TYPE,
                value,
            },
        };

        let request = self.client.post(url).json(&body);
        let created: MetafieldEnvelope = self.send("create", request).await?.json().await?;
        Ok(created.metafield)
    }

    async fn update(
        &self,
        product_id: &ProductId,
        id: MetafieldId,
        value: String,
    ) -> Result<Metafield, StoreError> {
        let file = format!("{id}.json");
        let url = self.product_url(product_id, &["metafields", file.as_str()])?;
        let body = WriteRequest {
            metafield: MetafieldUpdate {
                id,
                r#type: METAFIELD_TYPE,
                value,
            },
        };

        let request = self.client.put(url).json(&body);
        let updated: MetafieldEnvelope = self.send("update", request).await?.json().await?;
        Ok(updated.metafield)
    }
}
