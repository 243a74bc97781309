use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    database::NoteStore,
    error::AppError,
    models::{Counter, ListScope, NoteDocument, NoteEdit, SortKey, search_and_sort, timestamp},
    storage::FileStorage,
    utils::{UploadForm, non_blank},
};

/// PDF resource operations. Holds nothing but the store and file handles between calls.
pub struct NoteService<N> {
    store: N,
    files: FileStorage,
    max_upload_bytes: usize,
}

impl<N: NoteStore> NoteService<N> {
    pub fn new(store: N, files: FileStorage, max_upload_bytes: usize) -> Self {
        Self {
            store,
            files,
            max_upload_bytes,
        }
    }

    pub fn files(&self) -> &FileStorage {
        &self.files
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    #[instrument(skip(self))]
    pub async fn list_approved(&self, needle: Option<&str>, sort: Option<&str>) -> Result<Vec<NoteDocument>, AppError> {
        let sort = match sort {
            Some(raw) => raw.parse::<SortKey>().map_err(AppError::BadRequest)?,
            None => SortKey::default(),
        };

        let notes = self.store.list(ListScope::Approved).await?;

        Ok(search_and_sort(notes, needle, sort))
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<NoteDocument>, AppError> {
        Ok(self.store.list(ListScope::All).await?)
    }

    /// Pending notes only resolve for admins.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str, include_pending: bool) -> Result<NoteDocument, AppError> {
        self.store
            .get(id)
            .await?
            .filter(|note| include_pending || note.is_approved)
            .ok_or(AppError::NotFound)
    }

    #[instrument(skip(self, form))]
    pub async fn upload(&self, form: UploadForm) -> Result<NoteDocument, AppError> {
        let file = form
            .file
            .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

        let title = non_blank(form.title.as_deref())
            .ok_or_else(|| AppError::BadRequest("Title is required".to_string()))?;
        let author = non_blank(form.author.as_deref())
            .ok_or_else(|| AppError::BadRequest("Author is required".to_string()))?;

        if !file.is_pdf() {
            return Err(AppError::BadRequest("Please upload a valid PDF file".to_string()));
        }

        if file.bytes.is_empty() {
            return Err(AppError::BadRequest("The uploaded file is empty".to_string()));
        }

        if file.bytes.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge {
                limit: self.max_upload_bytes,
            });
        }

        let locator = self.files.save(&file.bytes).await?;

        let note = NoteDocument::new(
            Uuid::new_v4().to_string(),
            title,
            author,
            locator,
            file.bytes.len() as u64,
        );

        if let Err(e) = self.store.insert(&note).await {
            if let Err(cleanup) = self.files.remove(&note.file_url).await {
                warn!("Failed to clean up {} after store error: {cleanup}", note.file_url);
            }

            return Err(e.into());
        }

        info!("Uploaded {} ({} bytes)", note.id, note.file_size);

        Ok(note)
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, id: &str) -> Result<NoteDocument, AppError> {
        let note = self
            .store
            .approve(id, timestamp())
            .await?
            .ok_or(AppError::NotFound)?;

        info!("Approved {id}");

        Ok(note)
    }

    #[instrument(skip(self))]
    pub async fn edit(&self, id: &str, edit: NoteEdit) -> Result<NoteDocument, AppError> {
        let edit = validate_edit(edit)?;

        self.store
            .update(id, &edit, timestamp())
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Unknown ids succeed, deleting twice is not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let Some(note) = self.store.delete(id).await? else {
            info!("Delete of unknown note {id}, nothing to do");
            return Ok(());
        };

        if let Err(e) = self.files.remove(&note.file_url).await {
            warn!("Deleted {id} but failed to remove {}: {e}", note.file_url);
        }

        info!("Deleted {id}");

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn track(&self, id: &str, counter: Counter) -> Result<u64, AppError> {
        self.store
            .increment(id, counter, timestamp())
            .await?
            .ok_or(AppError::NotFound)
    }
}

fn validate_edit(edit: NoteEdit) -> Result<NoteEdit, AppError> {
    if edit.is_empty() {
        return Err(AppError::BadRequest("Nothing to update, expected title or author".to_string()));
    }

    Ok(NoteEdit {
        title: present(edit.title, "Title cannot be empty")?,
        author: present(edit.author, "Author cannot be empty")?,
    })
}

/// Supplied values must not be blank; absent ones stay absent.
fn present(value: Option<String>, message: &str) -> Result<Option<String>, AppError> {
    value
        .map(|v| non_blank(Some(&v)).ok_or_else(|| AppError::BadRequest(message.to_string())))
        .transpose()
}
