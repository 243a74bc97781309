use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    database::{NoteStore, StoreError},
    models::{Counter, ListScope, NoteDocument, NoteEdit},
};

/// Process-local store. Every mutation happens under the write lock, which makes it atomic per document.
#[derive(Default)]
pub struct MemoryStore {
    notes: RwLock<HashMap<String, NoteDocument>>,
}

impl NoteStore for MemoryStore {
    async fn insert(&self, note: &NoteDocument) -> Result<(), StoreError> {
        self.notes.write().await.insert(note.id.clone(), note.clone());

        Ok(())
    }

    async fn list(&self, scope: ListScope) -> Result<Vec<NoteDocument>, StoreError> {
        let mut notes: Vec<NoteDocument> = self
            .notes
            .read()
            .await
            .values()
            .filter(|note| scope == ListScope::All || note.is_approved)
            .cloned()
            .collect();

        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Ok(notes)
    }

    async fn get(&self, id: &str) -> Result<Option<NoteDocument>, StoreError> {
        Ok(self.notes.read().await.get(id).cloned())
    }

    async fn approve(&self, id: &str, now: DateTime<Utc>) -> Result<Option<NoteDocument>, StoreError> {
        let mut notes = self.notes.write().await;

        Ok(notes.get_mut(id).map(|note| {
            note.is_approved = true;
            note.touch(now);
            note.clone()
        }))
    }

    async fn update(
        &self,
        id: &str,
        edit: &NoteEdit,
        now: DateTime<Utc>,
    ) -> Result<Option<NoteDocument>, StoreError> {
        let mut notes = self.notes.write().await;

        Ok(notes.get_mut(id).map(|note| {
            note.apply(edit);
            note.touch(now);
            note.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<Option<NoteDocument>, StoreError> {
        Ok(self.notes.write().await.remove(id))
    }

    async fn increment(&self, id: &str, counter: Counter, now: DateTime<Utc>) -> Result<Option<u64>, StoreError> {
        let mut notes = self.notes.write().await;

        Ok(notes.get_mut(id).map(|note| {
            note.touch(now);

            let value = match counter {
                Counter::Views => &mut note.views,
                Counter::Downloads => &mut note.downloads,
            };
            *value += 1;
            *value
        }))
    }
}
