//! The transient editing state for a single product: form fields, the
//! pending image, validation, and the image-then-record commit.
//!
//! The session is an explicit state machine
//! (`Closed -> Open -> Committing -> {Closed, Open}`) so rejecting a
//! re-entrant commit is structural rather than a UI convention.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use shared::domain::{OwnerId, ProductFields, ProductRecord};

use crate::money::PriceInput;
use crate::{AssetStore, ProductStore, SessionProvider};

/// Prefix under which all product images of one owner live in the
/// asset store.
const ASSET_FOLDER: &str = "produtos";

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("no product is being edited")]
    SessionClosed,
    #[error("a save is already in progress")]
    CommitInFlight,
    #[error("{0}")]
    Validation(String),
    #[error("no authenticated session")]
    AuthenticationMissing,
    #[error("image upload failed: {0}")]
    AssetUpload(String),
    #[error("saving the product failed: {0}")]
    RecordWrite(String),
}

/// A locally selected image waiting to be uploaded at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PendingImage {
    fn extension(&self) -> Option<&str> {
        self.file_name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// What the form should preview: the locally selected file, or the
/// record's already uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePreview {
    Local { file_name: String },
    Remote { url: String },
}

/// Ephemeral form state. Never visible to the catalog until a commit
/// confirms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: PriceInput,
    pub pending_image: Option<PendingImage>,
}

impl ProductDraft {
    fn seeded_from(record: &ProductRecord) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone().unwrap_or_default(),
            price: PriceInput::from_value(record.price),
            pending_image: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DraftField {
    Name(String),
    Description(String),
    /// Raw text of the masked price field; non-digits are stripped.
    Price(String),
}

enum SessionState {
    Closed,
    Open {
        draft: ProductDraft,
        editing: Option<ProductRecord>,
    },
    Committing,
}

pub struct EditSession {
    sessions: Arc<dyn SessionProvider>,
    products: Arc<dyn ProductStore>,
    assets: Arc<dyn AssetStore>,
    state: Mutex<SessionState>,
}

impl EditSession {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        products: Arc<dyn ProductStore>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            sessions,
            products,
            assets,
            state: Mutex::new(SessionState::Closed),
        }
    }

    /// Opens the session with a fresh draft, seeded from `existing`
    /// when editing. Replaces whatever state the session was in.
    pub async fn open(&self, existing: Option<ProductRecord>) {
        let draft = existing
            .as_ref()
            .map(ProductDraft::seeded_from)
            .unwrap_or_default();
        *self.state.lock().await = SessionState::Open {
            draft,
            editing: existing,
        };
    }

    pub async fn is_open(&self) -> bool {
        matches!(*self.state.lock().await, SessionState::Open { .. })
    }

    pub async fn is_committing(&self) -> bool {
        matches!(*self.state.lock().await, SessionState::Committing)
    }

    pub async fn draft(&self) -> Option<ProductDraft> {
        match &*self.state.lock().await {
            SessionState::Open { draft, .. } => Some(draft.clone()),
            _ => None,
        }
    }

    /// Mutates one draft field. A no-op unless the session is open
    /// with no commit in flight.
    pub async fn update_field(&self, field: DraftField) {
        if let SessionState::Open { draft, .. } = &mut *self.state.lock().await {
            match field {
                DraftField::Name(name) => draft.name = name,
                DraftField::Description(description) => draft.description = description,
                DraftField::Price(raw) => draft.price.set_text(&raw),
            }
        }
    }

    /// Records (or clears) the pending local image. The remote image
    /// is untouched until commit.
    pub async fn select_image(&self, image: Option<PendingImage>) {
        if let SessionState::Open { draft, .. } = &mut *self.state.lock().await {
            draft.pending_image = image;
        }
    }

    pub async fn image_preview(&self) -> Option<ImagePreview> {
        match &*self.state.lock().await {
            SessionState::Open { draft, editing } => match &draft.pending_image {
                Some(pending) => Some(ImagePreview::Local {
                    file_name: pending.file_name.clone(),
                }),
                None => editing
                    .as_ref()
                    .and_then(|record| record.image_url.clone())
                    .map(|url| ImagePreview::Remote { url }),
            },
            _ => None,
        }
    }

    /// Discards the draft unconditionally. Safe in any state, has no
    /// remote side effects, and calling it twice is the same as once.
    pub async fn cancel(&self) {
        *self.state.lock().await = SessionState::Closed;
    }

    /// Validates the draft, runs the image replacement protocol, then
    /// writes the record. At most one delete, one upload, and one
    /// write per commit; a second call while one is in flight is
    /// rejected immediately.
    pub async fn commit(&self) -> Result<ProductRecord, CommitError> {
        let (draft, editing) = {
            let mut guard = self.state.lock().await;
            let (draft, editing) = match &*guard {
                SessionState::Closed => return Err(CommitError::SessionClosed),
                SessionState::Committing => return Err(CommitError::CommitInFlight),
                SessionState::Open { draft, editing } => {
                    // Fail fast before any remote call; the draft stays
                    // open for correction.
                    validate(draft)?;
                    (draft.clone(), editing.clone())
                }
            };
            *guard = SessionState::Committing;
            (draft, editing)
        };

        let result = self.run_commit(&draft, editing.as_ref()).await;

        let mut guard = self.state.lock().await;
        match result {
            Ok(record) => {
                *guard = SessionState::Closed;
                info!(product_id = record.id.0, "catalog: product saved");
                Ok(record)
            }
            Err(err) => {
                // Preserve the draft for retry unless the user
                // cancelled while the commit was in flight.
                if matches!(*guard, SessionState::Committing) {
                    *guard = SessionState::Open { draft, editing };
                }
                Err(err)
            }
        }
    }

    async fn run_commit(
        &self,
        draft: &ProductDraft,
        editing: Option<&ProductRecord>,
    ) -> Result<ProductRecord, CommitError> {
        let user = self
            .sessions
            .current_user()
            .await
            .map_err(|_| CommitError::AuthenticationMissing)?
            .ok_or(CommitError::AuthenticationMissing)?;

        let image_url = match &draft.pending_image {
            Some(pending) => Some(self.replace_image(pending, editing, &user.id).await?),
            None => editing.and_then(|record| record.image_url.clone()),
        };

        let description = draft.description.trim();
        let fields = ProductFields {
            name: draft.name.trim().to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            price: draft
                .price
                .value()
                .ok_or_else(|| CommitError::Validation("price is required".into()))?,
            image_url,
            owner_id: user.id,
        };

        let written = match editing {
            Some(record) => self.products.update(record.id, &fields).await,
            None => self.products.create(&fields).await,
        };
        written.map_err(|err| CommitError::RecordWrite(err.to_string()))
    }

    /// The image replacement protocol: best-effort delete of the prior
    /// remote image, upload of the pending one with overwrite enabled,
    /// and resolution of the new public locator. An upload failure
    /// aborts the whole commit; a delete failure does not.
    async fn replace_image(
        &self,
        pending: &PendingImage,
        editing: Option<&ProductRecord>,
        owner: &OwnerId,
    ) -> Result<String, CommitError> {
        if let Some(prior) = editing.and_then(|record| record.image_url.as_deref()) {
            if let Some(path) = object_path_from_url(prior, owner) {
                if let Err(err) = self.assets.delete(std::slice::from_ref(&path)).await {
                    warn!(
                        path = %path,
                        "catalog: best-effort delete of replaced image failed: {err:#}"
                    );
                }
            }
        }

        let path = upload_path(owner, pending);
        self.assets
            .upload(&path, pending.bytes.clone(), true)
            .await
            .map_err(|err| CommitError::AssetUpload(err.to_string()))?;
        Ok(self.assets.public_url(&path))
    }
}

fn validate(draft: &ProductDraft) -> Result<(), CommitError> {
    if draft.name.trim().is_empty() {
        return Err(CommitError::Validation("product name is required".into()));
    }
    match draft.price.value() {
        None => Err(CommitError::Validation("price is required".into())),
        Some(value) if value < 0.0 => {
            Err(CommitError::Validation("price must not be negative".into()))
        }
        Some(_) => Ok(()),
    }
}

/// Storage path for a newly uploaded image: owner-scoped folder plus a
/// timestamp-derived, collision-resistant file name keeping the
/// original extension.
fn upload_path(owner: &OwnerId, pending: &PendingImage) -> String {
    let stamp = Utc::now().timestamp_millis();
    match pending.extension() {
        Some(ext) => format!("{ASSET_FOLDER}/{owner}/{stamp}.{ext}"),
        None => format!("{ASSET_FOLDER}/{owner}/{stamp}"),
    }
}

/// Recovers the storage path of an already uploaded image from its
/// public URL: the last URL segment is the file name inside the
/// owner's folder.
fn object_path_from_url(url: &str, owner: &OwnerId) -> Option<String> {
    let file_name = url.rsplit('/').next()?;
    if file_name.is_empty() {
        return None;
    }
    Some(format!("{ASSET_FOLDER}/{owner}/{file_name}"))
}

#[cfg(test)]
#[path = "tests/edit_session_tests.rs"]
mod tests;
