//! Client core for a seller's product catalog: the authoritative
//! in-memory product list, the single edit session funnelling all
//! writes, and the adapter contracts for the remote record store,
//! asset store, and auth session provider.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};

use shared::domain::{OwnerId, ProductFields, ProductId, ProductRecord, SessionUser};

pub mod edit_session;
pub mod money;
pub mod share;

pub use edit_session::{
    CommitError, DraftField, EditSession, ImagePreview, PendingImage, ProductDraft,
};

/// Resolves the currently authenticated seller. Injected rather than
/// read from ambient global state so tests can substitute it.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The active session's user, or `None` when no session exists.
    async fn current_user(&self) -> Result<Option<SessionUser>>;
}

pub struct MissingSessionProvider;

#[async_trait]
impl SessionProvider for MissingSessionProvider {
    async fn current_user(&self) -> Result<Option<SessionUser>> {
        Err(anyhow!("session provider is unavailable"))
    }
}

/// The remote record store for the product collection.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All records owned by `owner`, ordered by creation time
    /// descending.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ProductRecord>>;
    async fn create(&self, fields: &ProductFields) -> Result<ProductRecord>;
    async fn update(&self, id: ProductId, fields: &ProductFields) -> Result<ProductRecord>;
    async fn delete(&self, id: ProductId) -> Result<()>;
}

pub struct MissingProductStore;

#[async_trait]
impl ProductStore for MissingProductStore {
    async fn list_by_owner(&self, _owner: &OwnerId) -> Result<Vec<ProductRecord>> {
        Err(anyhow!("product store is unavailable"))
    }

    async fn create(&self, _fields: &ProductFields) -> Result<ProductRecord> {
        Err(anyhow!("product store is unavailable"))
    }

    async fn update(&self, _id: ProductId, _fields: &ProductFields) -> Result<ProductRecord> {
        Err(anyhow!("product store is unavailable"))
    }

    async fn delete(&self, _id: ProductId) -> Result<()> {
        Err(anyhow!("product store is unavailable"))
    }
}

/// Content-addressable-by-path binary storage for product images.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Uploads an object, replacing any existing object at `path`
    /// when `overwrite` is set.
    async fn upload(&self, path: &str, bytes: Vec<u8>, overwrite: bool) -> Result<()>;
    /// Bulk delete. Callers decide whether a failure aborts; the
    /// image replacement protocol treats it as best-effort.
    async fn delete(&self, paths: &[String]) -> Result<()>;
    /// Public locator for an uploaded object. Pure string resolution.
    fn public_url(&self, path: &str) -> String;
}

pub struct MissingAssetStore;

#[async_trait]
impl AssetStore for MissingAssetStore {
    async fn upload(&self, _path: &str, _bytes: Vec<u8>, _overwrite: bool) -> Result<()> {
        Err(anyhow!("asset store is unavailable"))
    }

    async fn delete(&self, _paths: &[String]) -> Result<()> {
        Err(anyhow!("asset store is unavailable"))
    }

    fn public_url(&self, path: &str) -> String {
        path.to_string()
    }
}

/// The yes/no gate in front of destructive operations.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Declines everything, so deletes stay gated until a real prompt is
/// wired in.
pub struct MissingConfirmPrompt;

#[async_trait]
impl ConfirmPrompt for MissingConfirmPrompt {
    async fn confirm(&self, _message: &str) -> bool {
        false
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no authenticated session")]
    AuthenticationMissing,
    #[error("loading products failed: {0}")]
    Load(String),
    #[error("deleting the product failed: {0}")]
    Delete(String),
}

#[derive(Debug, Clone)]
pub enum CatalogEvent {
    Loaded { count: usize },
    Saved(ProductId),
    Deleted(ProductId),
    Error(String),
}

#[derive(Default)]
struct CatalogState {
    products: Vec<ProductRecord>,
    last_error: Option<String>,
    loaded: bool,
}

/// Authoritative source of the visible product list. Owns the catalog
/// exclusively; all mutations arrive either through `load` or through
/// the confirmed result of the edit session.
pub struct CatalogController {
    sessions: Arc<dyn SessionProvider>,
    products: Arc<dyn ProductStore>,
    confirm: Arc<dyn ConfirmPrompt>,
    edit_session: EditSession,
    inner: Mutex<CatalogState>,
    events: broadcast::Sender<CatalogEvent>,
}

impl CatalogController {
    pub fn new() -> Arc<Self> {
        Self::new_with_dependencies(
            Arc::new(MissingSessionProvider),
            Arc::new(MissingProductStore),
            Arc::new(MissingAssetStore),
            Arc::new(MissingConfirmPrompt),
        )
    }

    pub fn new_with_dependencies(
        sessions: Arc<dyn SessionProvider>,
        products: Arc<dyn ProductStore>,
        assets: Arc<dyn AssetStore>,
        confirm: Arc<dyn ConfirmPrompt>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            edit_session: EditSession::new(
                Arc::clone(&sessions),
                Arc::clone(&products),
                assets,
            ),
            sessions,
            products,
            confirm,
            inner: Mutex::new(CatalogState::default()),
            events,
        })
    }

    /// Fetches the owner's products newest first and replaces the
    /// catalog wholesale. On failure the catalog is reset to empty and
    /// the error is surfaced for display.
    pub async fn load(&self) -> Result<(), CatalogError> {
        let user = match self.sessions.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => return self.fail_load(CatalogError::AuthenticationMissing).await,
            Err(err) => return self.fail_load(CatalogError::Load(err.to_string())).await,
        };

        match self.products.list_by_owner(&user.id).await {
            Ok(records) => {
                let count = records.len();
                {
                    let mut inner = self.inner.lock().await;
                    inner.products = records;
                    inner.last_error = None;
                    inner.loaded = true;
                }
                info!(count, owner = %user.id, "catalog: products loaded");
                let _ = self.events.send(CatalogEvent::Loaded { count });
                Ok(())
            }
            Err(err) => self.fail_load(CatalogError::Load(err.to_string())).await,
        }
    }

    async fn fail_load(&self, err: CatalogError) -> Result<(), CatalogError> {
        {
            let mut inner = self.inner.lock().await;
            inner.products.clear();
            inner.last_error = Some(err.to_string());
            inner.loaded = true;
        }
        error!("catalog: load failed: {err}");
        let _ = self.events.send(CatalogEvent::Error(err.to_string()));
        Err(err)
    }

    /// Opens the edit session on an empty draft. Never touches the
    /// catalog.
    pub async fn request_add(&self) {
        self.edit_session.open(None).await;
    }

    /// Opens the edit session seeded from `record`. Never touches the
    /// catalog.
    pub async fn request_edit(&self, record: ProductRecord) {
        self.edit_session.open(Some(record)).await;
    }

    pub fn edit_session(&self) -> &EditSession {
        &self.edit_session
    }

    /// Drives the open edit session's commit and merges the confirmed
    /// record into the catalog. A failed commit leaves the catalog
    /// untouched and the draft open for retry.
    pub async fn save_open_session(&self) -> Result<ProductRecord, CommitError> {
        let record = self.edit_session.commit().await.map_err(|err| {
            let _ = self.events.send(CatalogEvent::Error(err.to_string()));
            err
        })?;
        self.on_session_committed(record.clone()).await;
        Ok(record)
    }

    /// Merges one confirmed record: prepend when the id is new
    /// (newest-first ordering preserved), replace in place otherwise.
    /// The only way records enter or change in the catalog outside of
    /// `load`.
    pub async fn on_session_committed(&self, record: ProductRecord) {
        {
            let mut inner = self.inner.lock().await;
            match inner
                .products
                .iter_mut()
                .find(|product| product.id == record.id)
            {
                Some(existing) => *existing = record.clone(),
                None => inner.products.insert(0, record.clone()),
            }
        }
        let _ = self.events.send(CatalogEvent::Saved(record.id));
    }

    /// Deletes a record after explicit confirmation. Returns
    /// `Ok(false)` when the user declines, in which case no remote
    /// call is issued. The record's stored image is intentionally left
    /// behind in the asset store.
    pub async fn request_delete(&self, id: ProductId) -> Result<bool, CatalogError> {
        if !self
            .confirm
            .confirm("Tem certeza que deseja excluir este produto?")
            .await
        {
            info!(product_id = id.0, "catalog: delete declined");
            return Ok(false);
        }

        match self.products.delete(id).await {
            Ok(()) => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.products.retain(|product| product.id != id);
                }
                info!(product_id = id.0, "catalog: product deleted");
                let _ = self.events.send(CatalogEvent::Deleted(id));
                Ok(true)
            }
            Err(err) => {
                let err = CatalogError::Delete(err.to_string());
                self.inner.lock().await.last_error = Some(err.to_string());
                error!(product_id = id.0, "catalog: delete failed: {err}");
                let _ = self.events.send(CatalogEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    pub async fn products(&self) -> Vec<ProductRecord> {
        self.inner.lock().await.products.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.inner.lock().await.loaded
    }

    /// Derived, case-insensitive substring filter over name and
    /// description. Never mutates the catalog.
    pub async fn filtered_products(&self, term: &str) -> Vec<ProductRecord> {
        let inner = self.inner.lock().await;
        filter_products(&inner.products, term)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }
}

/// Case-insensitive substring match over `name` and `description`,
/// preserving catalog order.
pub fn filter_products(products: &[ProductRecord], term: &str) -> Vec<ProductRecord> {
    if term.is_empty() {
        return products.to_vec();
    }
    let needle = term.to_lowercase();
    products
        .iter()
        .filter(|product| {
            product.name.to_lowercase().contains(&needle)
                || product
                    .description
                    .as_deref()
                    .is_some_and(|description| description.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
