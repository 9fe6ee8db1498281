//! Concrete remote adapters over the Supabase REST surface: PostgREST
//! for the product collection, the Storage object API for product
//! images, and GoTrue for session resolution. One `Supabase` value
//! implements all three of the core's collaborator contracts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use catalog_core::{AssetStore, ProductStore, SessionProvider};
use shared::domain::{OwnerId, ProductFields, ProductId, ProductRecord, SessionUser};
use shared::error::{RemoteError, StoreErrorBody};
use shared::protocol::{AuthUserResponse, ProductRow, ProductUpsertRow};

pub mod config;

pub use config::{load_settings, Settings};

const PRODUCTS_TABLE: &str = "loja_produto";
/// PostgREST media type making a write return the affected row as a
/// single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

pub struct Supabase {
    http: Client,
    base: Url,
    anon_key: String,
    bucket: String,
    access_token: RwLock<Option<String>>,
}

impl Supabase {
    pub fn new(settings: &Settings) -> Result<Self> {
        let base = Url::parse(&settings.supabase_url)
            .with_context(|| format!("invalid supabase url: {}", settings.supabase_url))?;
        Ok(Self {
            http: Client::new(),
            base,
            anon_key: settings.anon_key.clone(),
            bucket: settings.bucket.clone(),
            access_token: RwLock::new(None),
        })
    }

    /// Installs the access token of the active auth session. Requests
    /// fall back to the anon key until one is set.
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    async fn bearer(&self) -> String {
        self.access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("invalid endpoint path: {path}"))
    }

    async fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
    }

    fn products_endpoint(&self) -> Result<Url> {
        self.endpoint(&format!("rest/v1/{PRODUCTS_TABLE}"))
    }
}

/// Converts a non-success response into a `RemoteError` carrying the
/// store's own message when the body parses as one.
async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let parsed: StoreErrorBody = serde_json::from_str(&body).unwrap_or_default();
    Err(RemoteError::new(
        status.as_u16(),
        format!("{what}: {}", parsed.message_or(&body)),
    )
    .into())
}

#[async_trait]
impl SessionProvider for Supabase {
    async fn current_user(&self) -> Result<Option<SessionUser>> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .authed(self.http.get(url))
            .await
            .send()
            .await
            .context("session lookup failed")?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }

        let user: AuthUserResponse = check(response, "resolving the session")
            .await?
            .json()
            .await
            .context("invalid auth payload")?;
        if user.id.is_empty() {
            return Ok(None);
        }
        Ok(Some(SessionUser {
            id: OwnerId(user.id),
            email: user.email,
        }))
    }
}

#[async_trait]
impl ProductStore for Supabase {
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ProductRecord>> {
        let owner_filter = format!("eq.{owner}");
        let request = self.http.get(self.products_endpoint()?).query(&[
            ("select", "*"),
            ("user_id", owner_filter.as_str()),
            ("order", "created_at.desc"),
        ]);
        let response = self
            .authed(request)
            .await
            .send()
            .await
            .context("product list request failed")?;
        let rows: Vec<ProductRow> = check(response, "listing products")
            .await?
            .json()
            .await
            .context("invalid product list payload")?;
        debug!(count = rows.len(), "supabase: products listed");
        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn create(&self, fields: &ProductFields) -> Result<ProductRecord> {
        let request = self
            .http
            .post(self.products_endpoint()?)
            .header(header::ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(&ProductUpsertRow::from(fields));
        let response = self
            .authed(request)
            .await
            .send()
            .await
            .context("product insert request failed")?;
        let row: ProductRow = check(response, "creating the product")
            .await?
            .json()
            .await
            .context("invalid product payload")?;
        Ok(row.into())
    }

    async fn update(&self, id: ProductId, fields: &ProductFields) -> Result<ProductRecord> {
        let id_filter = format!("eq.{}", id.0);
        let request = self
            .http
            .patch(self.products_endpoint()?)
            .query(&[("id", id_filter.as_str())])
            .header(header::ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(&ProductUpsertRow::from(fields));
        let response = self
            .authed(request)
            .await
            .send()
            .await
            .context("product update request failed")?;
        let row: ProductRow = check(response, "updating the product")
            .await?
            .json()
            .await
            .context("invalid product payload")?;
        Ok(row.into())
    }

    async fn delete(&self, id: ProductId) -> Result<()> {
        let id_filter = format!("eq.{}", id.0);
        let request = self
            .http
            .delete(self.products_endpoint()?)
            .query(&[("id", id_filter.as_str())]);
        let response = self
            .authed(request)
            .await
            .send()
            .await
            .context("product delete request failed")?;
        check(response, "deleting the product").await?;
        Ok(())
    }
}

#[async_trait]
impl AssetStore for Supabase {
    async fn upload(&self, path: &str, bytes: Vec<u8>, overwrite: bool) -> Result<()> {
        let url = self.endpoint(&format!("storage/v1/object/{}/{path}", self.bucket))?;
        let mut request = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        if overwrite {
            request = request.header("x-upsert", "true");
        }
        let response = self
            .authed(request)
            .await
            .send()
            .await
            .context("object upload request failed")?;
        check(response, "uploading the object").await?;
        debug!(path, "supabase: object uploaded");
        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&format!("storage/v1/object/{}", self.bucket))?;
        let request = self
            .http
            .delete(url)
            .json(&serde_json::json!({ "prefixes": paths }));
        let response = self
            .authed(request)
            .await
            .send()
            .await
            .context("object delete request failed")?;
        check(response, "deleting objects").await?;
        debug!(count = paths.len(), "supabase: objects deleted");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{path}",
            self.base.as_str().trim_end_matches('/'),
            self.bucket
        )
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
