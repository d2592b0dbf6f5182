//! Admin-side create/update/delete orchestration for news records.
//!
//! # Invariants
//! - Validation runs before any store call; a failing rule never reaches the
//!   backend.
//! - A record is never created without an image URL.
//! - Updating without a new image keeps the stored `image_url`.
//! - After a successful `remove`, the cached list no longer holds that id.
//! - Each write is attempted at most once; failures are returned to the
//!   caller, who keeps the form for a manual retry.

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::locale;
use crate::model::{
    DisplayNews, ImageSource, Localized, NewRecord, NewsForm, NewsId, NewsRecord, PreviewView,
    RecordPatch,
};
use crate::payload::{NewsPayload, PayloadError};
use crate::store::{ContentStore, DeleteOutcome, StoreError};

/// One variant per form rule; messages name the offending field.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title: a news title is required")]
    MissingTitle,
    #[error("date: a publication date is required")]
    MissingDate,
    #[error("description: a short description is required")]
    MissingDescription,
    #[error("content: the news body is required")]
    MissingContent,
    #[error("image: upload an image file or enter an image URL")]
    MissingImage,
}

impl ValidationError {
    /// Markup name of the field that failed.
    pub fn field(&self) -> &'static str {
        use crate::model::fields;
        match self {
            ValidationError::MissingTitle => fields::TITLE,
            ValidationError::MissingDate => fields::DATE,
            ValidationError::MissingDescription => fields::DESCRIPTION,
            ValidationError::MissingContent => fields::CONTENT,
            ValidationError::MissingImage => fields::IMAGE,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// Check the form. `require_image` is set for creates only; updates may
/// fall back to the stored image.
pub fn validate_form(form: &NewsForm, require_image: bool) -> Result<(), ValidationError> {
    if form.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    if form.date.trim().is_empty() {
        return Err(ValidationError::MissingDate);
    }
    if form.description.trim().is_empty() {
        return Err(ValidationError::MissingDescription);
    }
    if form.content.trim().is_empty() {
        return Err(ValidationError::MissingContent);
    }
    if require_image && !form.has_image_source() {
        return Err(ValidationError::MissingImage);
    }
    Ok(())
}

/// Asks the operator before destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Outcome of [`Synchronizer::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The store had no such row; the cache is left as it was.
    Missing,
    /// The operator declined; nothing was sent.
    Declined,
}

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this news item?";

pub struct Synchronizer<S> {
    store: S,
    author: String,
    records: Vec<NewsRecord>,
    edit_target: Option<NewsId>,
}

impl<S: ContentStore> Synchronizer<S> {
    pub fn new(store: S, author: impl Into<String>) -> Self {
        Self {
            store,
            author: author.into(),
            records: Vec::new(),
            edit_target: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records as last loaded, newest first.
    pub fn records(&self) -> &[NewsRecord] {
        &self.records
    }

    pub fn record(&self, id: &NewsId) -> Option<&NewsRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn edit_target(&self) -> Option<&NewsId> {
        self.edit_target.as_ref()
    }

    /// Replace the cached list with the store's current contents.
    #[instrument(skip_all)]
    pub async fn load(&mut self) -> Result<&[NewsRecord], SyncError> {
        let rows = self.store.list_all().await?;
        info!(count = rows.len(), "news list loaded");
        self.records = rows;
        Ok(&self.records)
    }

    /// Open the edit form for a cached record. The returned form carries the
    /// stored texts; its image fields stay empty so the stored image is kept
    /// unless a new one is supplied.
    pub fn begin_edit(&mut self, id: &NewsId) -> Option<NewsForm> {
        let record = self.record(id)?;
        let payload = NewsPayload::decode_or_neutral(&record.content, &record.title);
        let form = NewsForm {
            title: record.title.clone(),
            date: payload.date,
            description: payload.description,
            content: payload.main,
            image: None,
            image_url: String::new(),
            title_ru: payload.title_ru,
            title_en: payload.title_en,
            title_kz: payload.title_kz,
            description_ru: payload.description_ru,
            description_en: payload.description_en,
            description_kz: payload.description_kz,
        };
        self.edit_target = Some(id.clone());
        Some(form)
    }

    pub fn cancel_edit(&mut self) {
        self.edit_target = None;
    }

    /// Create or update depending on whether an edit is open.
    pub async fn submit(&mut self, form: &NewsForm) -> Result<NewsRecord, SyncError> {
        match self.edit_target.clone() {
            Some(id) => self.submit_update(&id, form).await,
            None => self.submit_create(form).await,
        }
    }

    #[instrument(skip_all)]
    pub async fn submit_create(&mut self, form: &NewsForm) -> Result<NewsRecord, SyncError> {
        validate_form(form, true)?;
        let image_url = self
            .resolve_image(form)
            .await?
            .ok_or(ValidationError::MissingImage)?;
        let content = NewsPayload::from_form(form).encode()?;
        let record = NewRecord {
            title: form.title.trim().to_string(),
            image_url: Some(image_url),
            author: self.author.clone(),
            content,
        };
        let row = self.store.insert(&record).await.map_err(|err| {
            warn!(%err, "failed to save news");
            err
        })?;
        info!(id = %row.id, "news created");
        self.records.insert(0, row.clone());
        self.edit_target = None;
        Ok(row)
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn submit_update(
        &mut self,
        id: &NewsId,
        form: &NewsForm,
    ) -> Result<NewsRecord, SyncError> {
        validate_form(form, false)?;
        let image_url = match self.resolve_image(form).await? {
            Some(url) => url,
            None => self
                .record(id)
                .and_then(|r| r.image_url.clone())
                .filter(|u| !u.trim().is_empty())
                .ok_or(ValidationError::MissingImage)?,
        };
        let patch = RecordPatch {
            title: Some(form.title.trim().to_string()),
            image_url: Some(image_url),
            content: Some(NewsPayload::from_form(form).encode()?),
        };
        let row = self.store.update_by_id(id, &patch).await.map_err(|err| {
            warn!(%err, "failed to update news");
            err
        })?;
        info!("news updated");
        match self.records.iter_mut().find(|r| &r.id == id) {
            Some(slot) => *slot = row.clone(),
            None => self.records.insert(0, row.clone()),
        }
        self.edit_target = None;
        Ok(row)
    }

    /// Delete after confirmation. A missing id is reported, not raised.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn remove(
        &mut self,
        id: &NewsId,
        confirm: &dyn Confirm,
    ) -> Result<RemoveOutcome, SyncError> {
        if !confirm.confirm(DELETE_PROMPT) {
            return Ok(RemoveOutcome::Declined);
        }
        match self.store.delete_by_id(id).await? {
            DeleteOutcome::Deleted => {
                self.records.retain(|r| &r.id != id);
                if self.edit_target.as_ref() == Some(id) {
                    self.edit_target = None;
                }
                info!("news removed");
                Ok(RemoveOutcome::Removed)
            }
            DeleteOutcome::Missing => {
                warn!("news to remove was not in the store");
                Ok(RemoveOutcome::Missing)
            }
        }
    }

    /// Local preview of unsaved form state. Never touches the store.
    pub fn render_preview(&self, form: &NewsForm) -> PreviewView {
        let payload = NewsPayload::from_form(form);
        let image = match (form.image_file(), form.image_url()) {
            (Some(file), _) => ImageSource::Inline {
                content_type: file.content_type(),
                bytes: file.bytes.clone(),
            },
            (None, Some(url)) => ImageSource::Url(url.to_string()),
            (None, None) => self
                .edit_target
                .as_ref()
                .and_then(|id| self.record(id))
                .and_then(|r| r.image_url.clone())
                .map(ImageSource::Url)
                .unwrap_or(ImageSource::Placeholder),
        };
        preview_from_parts(&payload, image)
    }

    /// Preview of a stored record, as it would look on the site.
    pub fn preview_record(&self, id: &NewsId) -> Option<PreviewView> {
        let news = DisplayNews::from_record(self.record(id)?);
        let image = news
            .image
            .clone()
            .map(ImageSource::Url)
            .unwrap_or(ImageSource::Placeholder);
        let payload = NewsPayload {
            main: news.content,
            description: news.description,
            date: news.date,
            title_ru: news.title_ru,
            title_en: news.title_en,
            title_kz: news.title_kz,
            description_ru: news.description_ru,
            description_en: news.description_en,
            description_kz: news.description_kz,
            ..NewsPayload::default()
        };
        Some(preview_from_parts(&payload, image))
    }

    async fn resolve_image(&self, form: &NewsForm) -> Result<Option<String>, StoreError> {
        if let Some(file) = form.image_file() {
            let url = self
                .store
                .upload_image(&file.bytes, &file.extension())
                .await?;
            return Ok(Some(url));
        }
        Ok(form.image_url().map(str::to_string))
    }
}

fn preview_from_parts(payload: &NewsPayload, image: ImageSource) -> PreviewView {
    PreviewView {
        title: Localized {
            ru: payload.title_ru.clone(),
            en: payload.title_en.clone(),
            kz: payload.title_kz.clone(),
        },
        description: Localized {
            ru: payload.description_ru.clone(),
            en: payload.description_en.clone(),
            kz: payload.description_kz.clone(),
        },
        content: payload.main.clone(),
        date: payload.date.clone(),
        date_label: Localized::from_fn(|l| locale::format_date_str(&payload.date, l)),
        image,
    }
}
