//! Product edit surface as a headless controller.
//!
//! [`ProductEditor`] holds one product open, derives the form state from its
//! lifecycle, and sends mutations to the catalog authority. The shared cache
//! is written only after the authority confirms a change. Each control is busy
//! while its own request is in flight; other controls stay usable.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use roastah_products::{
    FieldError, ProductDetailsPatch, ProductId, ProductRecord, ProductState, ProductTag, TagBadge,
};

use crate::api::ApiError;
use crate::cache::{CacheWrite, ProductQueries};

/// An interactive control of the edit surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Control {
    Transition,
    Tag(ProductTag),
    SaveFields,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("no product is open")]
    NotLoaded,
    #[error("{0:?} is already waiting for a response")]
    Busy(Control),
    #[error("{action} is not allowed while the product is {state}")]
    NotAllowed {
        action: &'static str,
        state: ProductState,
    },
    #[error("cannot move from {from} to {to}")]
    TransitionNotOffered { from: ProductState, to: ProductState },
    #[error("invalid fields: {}", join_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("delete was not confirmed for this product")]
    ConfirmationRequired,
    #[error("session expired, sign in again")]
    SessionExpired,
    /// The editor was closed while the request was in flight, or a newer
    /// version of the product was already cached.
    #[error("response arrived after the editor moved on")]
    Stale,
    #[error(transparent)]
    Api(ApiError),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient notification for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Explicit confirmation that the user wants `product_id` deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteConfirmation {
    product_id: ProductId,
}

impl DeleteConfirmation {
    pub fn confirm(product_id: ProductId) -> Self {
        Self { product_id }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }
}

/// One tag toggle as rendered in the tag panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagToggle {
    pub tag: ProductTag,
    pub label: &'static str,
    pub value: bool,
    pub busy: bool,
}

/// Everything needed to render the edit surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditView {
    pub record: ProductRecord,
    pub state_label: &'static str,
    pub state_color: &'static str,
    pub fields_enabled: bool,
    pub transition_options: Vec<ProductState>,
    pub tag_panel_visible: bool,
    pub tags: Vec<TagToggle>,
    pub badges: Vec<TagBadge>,
    pub delete_enabled: bool,
    pub busy: BTreeSet<Control>,
}

impl EditView {
    pub fn is_busy(&self, control: Control) -> bool {
        self.busy.contains(&control)
    }
}

/// Releases a busy control when the request future finishes or is dropped.
struct BusyGuard<'a> {
    busy: &'a Mutex<BTreeSet<Control>>,
    control: Control,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.remove(&self.control);
        }
    }
}

/// Controller behind the product edit form.
pub struct ProductEditor {
    queries: ProductQueries,
    product_id: ProductId,
    epoch: AtomicU64,
    busy: Mutex<BTreeSet<Control>>,
    notices: Mutex<Vec<Notice>>,
    reauth: AtomicBool,
}

impl ProductEditor {
    /// Open the editor on `product_id`, loading the product through the cache.
    pub async fn open(queries: ProductQueries, product_id: ProductId) -> Result<Self, EditError> {
        let editor = Self {
            queries,
            product_id,
            epoch: AtomicU64::new(0),
            busy: Mutex::new(BTreeSet::new()),
            notices: Mutex::new(Vec::new()),
            reauth: AtomicBool::new(false),
        };
        match editor.queries.product(product_id).await {
            Ok(_) => Ok(editor),
            Err(err) => Err(editor.fail("Could not load product", err)),
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Refetch from the authority, bypassing the cache. A newer version
    /// confirmed meanwhile wins over the fetched one.
    pub async fn refresh(&self) -> Result<EditView, EditError> {
        let epoch = self.current_epoch();
        let record = self
            .queries
            .refetch_product(self.product_id)
            .await
            .map_err(|err| self.fail("Could not refresh product", err))?;
        if epoch != self.current_epoch() {
            return Err(EditError::Stale);
        }
        Ok(self.view_of(record))
    }

    /// Current view, derived from the last cached record even if it has expired.
    pub fn view(&self) -> Result<EditView, EditError> {
        self.current().map(|record| self.view_of(record))
    }

    pub async fn request_transition(&self, to: ProductState) -> Result<EditView, EditError> {
        let record = self.load().await?;
        if !record.state.can_transition_to(to) {
            return Err(EditError::TransitionNotOffered {
                from: record.state,
                to,
            });
        }

        let _guard = self.claim(Control::Transition)?;
        let epoch = self.current_epoch();
        let result = self
            .queries
            .api()
            .transition_state(self.product_id, to)
            .await;
        let confirmed = self.settle(epoch, result, "Could not change state").await?;
        tracing::info!(product_id = %self.product_id, state = %confirmed.state, "state change confirmed");
        self.notify(
            NoticeLevel::Success,
            format!("Product is now {}", confirmed.state.label()),
        );
        Ok(self.view_of(confirmed))
    }

    /// Flip `tag`; allowed only while the product is editable.
    pub async fn toggle_tag(&self, tag: ProductTag) -> Result<EditView, EditError> {
        let record = self.load().await?;
        if !record.state.can_edit() {
            return Err(EditError::NotAllowed {
                action: "changing tags",
                state: record.state,
            });
        }
        let value = !record.tags.get(tag);

        let _guard = self.claim(Control::Tag(tag))?;
        let epoch = self.current_epoch();
        let result = self
            .queries
            .api()
            .set_tag(self.product_id, tag, value)
            .await;
        let confirmed = self.settle(epoch, result, "Could not update tag").await?;
        tracing::info!(product_id = %self.product_id, tag = %tag, value, "tag change confirmed");
        Ok(self.view_of(confirmed))
    }

    /// Validate and save edited fields. Nothing is sent if validation fails.
    pub async fn save_fields(&self, patch: ProductDetailsPatch) -> Result<EditView, EditError> {
        let record = self.load().await?;
        if !record.state.can_edit() {
            return Err(EditError::NotAllowed {
                action: "editing fields",
                state: record.state,
            });
        }
        if patch.is_empty() {
            return Ok(self.view_of(record));
        }
        patch
            .apply_to(&record.details)
            .validate()
            .map_err(EditError::Validation)?;

        let _guard = self.claim(Control::SaveFields)?;
        let epoch = self.current_epoch();
        let result = self
            .queries
            .api()
            .update_fields(self.product_id, patch)
            .await;
        let confirmed = self.settle(epoch, result, "Could not save product").await?;
        self.notify(NoticeLevel::Success, "Product saved");
        Ok(self.view_of(confirmed))
    }

    /// Delete the product after explicit confirmation. The cache entry and
    /// list row are removed once the authority confirms.
    pub async fn delete(&self, confirmation: DeleteConfirmation) -> Result<(), EditError> {
        if confirmation.product_id() != self.product_id {
            return Err(EditError::ConfirmationRequired);
        }
        let record = self.load().await?;
        if !record.state.can_delete() {
            return Err(EditError::NotAllowed {
                action: "deleting",
                state: record.state,
            });
        }

        let _guard = self.claim(Control::Delete)?;
        let epoch = self.current_epoch();
        let result = self.queries.api().delete_product(self.product_id).await;
        if let Err(err) = result {
            return Err(self.fail("Could not delete product", err));
        }
        self.queries.cache().remove_product(self.product_id);
        if epoch != self.current_epoch() {
            return Err(EditError::Stale);
        }
        tracing::info!(product_id = %self.product_id, "product deletion confirmed");
        self.notify(NoticeLevel::Success, "Product deleted");
        Ok(())
    }

    /// Leave the editor; responses still in flight are dropped on arrival.
    pub fn close(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// The authority rejected the session; the caller must sign in again.
    pub fn reauth_required(&self) -> bool {
        self.reauth.load(Ordering::SeqCst)
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .unwrap_or_default()
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// The product as mutations see it: cached while fresh, refetched once
    /// expired or invalidated.
    async fn load(&self) -> Result<ProductRecord, EditError> {
        self.queries
            .product(self.product_id)
            .await
            .map_err(|err| self.fail("Could not load product", err))
    }

    fn current(&self) -> Result<ProductRecord, EditError> {
        self.queries
            .cache()
            .product(self.product_id, None)
            .ok_or(EditError::NotLoaded)
    }

    fn claim(&self, control: Control) -> Result<BusyGuard<'_>, EditError> {
        let mut busy = self.busy.lock().map_err(|_| EditError::Busy(control))?;
        if !busy.insert(control) {
            return Err(EditError::Busy(control));
        }
        Ok(BusyGuard {
            busy: &self.busy,
            control,
        })
    }

    /// Apply a mutation response: cache on success, notice on failure.
    ///
    /// A conflict or policy rejection means the cached record disagrees with
    /// the authority, so the product is refetched.
    async fn settle(
        &self,
        epoch: u64,
        result: Result<ProductRecord, ApiError>,
        failure: &str,
    ) -> Result<ProductRecord, EditError> {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let diverged = matches!(err, ApiError::Conflict(_) | ApiError::Rejected(_));
                let err = self.fail(failure, err);
                if diverged && epoch == self.current_epoch() {
                    self.reconcile().await;
                }
                return Err(err);
            }
        };
        if epoch != self.current_epoch() {
            tracing::debug!(product_id = %self.product_id, "editor closed before response");
            self.queries.cache().invalidate_product(self.product_id);
            self.queries.cache().invalidate_list();
            return Err(EditError::Stale);
        }
        match self.queries.cache().apply_confirmed(record.clone()) {
            CacheWrite::Applied => Ok(record),
            CacheWrite::Stale => Err(EditError::Stale),
        }
    }

    async fn reconcile(&self) {
        if let Err(err) = self.queries.refetch_product(self.product_id).await {
            tracing::debug!(product_id = %self.product_id, error = %err, "refetch after failed mutation");
        }
    }

    fn fail(&self, context: &str, err: ApiError) -> EditError {
        if err.requires_reauth() {
            self.reauth.store(true, Ordering::SeqCst);
            self.notify(NoticeLevel::Error, "Your session has expired. Please sign in again.");
            return EditError::SessionExpired;
        }
        tracing::warn!(product_id = %self.product_id, error = %err, "{context}");
        self.notify(NoticeLevel::Error, format!("{context}: {err}"));
        EditError::Api(err)
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice {
                level,
                message: message.into(),
            });
        }
    }

    fn view_of(&self, record: ProductRecord) -> EditView {
        let state = record.state;
        let busy = self.busy.lock().map(|b| b.clone()).unwrap_or_default();
        let tags = ProductTag::ALL
            .iter()
            .map(|&tag| TagToggle {
                tag,
                label: tag.label(),
                value: record.tags.get(tag),
                busy: busy.contains(&Control::Tag(tag)),
            })
            .collect();
        EditView {
            state_label: state.label(),
            state_color: state.color(),
            fields_enabled: state.can_edit(),
            transition_options: state.available_transitions().to_vec(),
            tag_panel_visible: state.can_edit(),
            tags,
            badges: record.badges(),
            delete_enabled: state.can_delete(),
            busy,
            record,
        }
    }
}
