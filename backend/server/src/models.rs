use std::{cmp::Ordering, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NoteDocument {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    pub author: String,
    pub file_url: String,
    pub file_size: u64,
    pub is_approved: bool,
    pub views: u64,
    pub downloads: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NoteDocument {
    /// Fresh upload: unapproved, zero counters.
    pub fn new(id: String, title: String, author: String, file_url: String, file_size: u64) -> Self {
        let now = timestamp();

        Self {
            id,
            title,
            author,
            file_url,
            file_size,
            is_approved: false,
            views: 0,
            downloads: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = next_update(self.updated_at, now);
    }

    pub fn apply(&mut self, edit: &NoteEdit) {
        if let Some(title) = &edit.title {
            self.title = title.clone();
        }

        if let Some(author) = &edit.author {
            self.author = author.clone();
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.author.to_lowercase().contains(needle)
            || self.file_size.to_string().contains(needle)
    }
}

/// Partial update accepted by the edit endpoint. Unknown fields are ignored.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteEdit {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl NoteEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none()
    }

    /// Field/value pairs in store column naming.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = Vec::new();

        if let Some(title) = &self.title {
            fields.push(("title", title.as_str()));
        }

        if let Some(author) = &self.author {
            fields.push(("author", author.as_str()));
        }

        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Downloads,
}

impl Counter {
    pub fn field(self) -> &'static str {
        match self {
            Counter::Views => "views",
            Counter::Downloads => "downloads",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    Approved,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    TitleAsc,
    TitleDesc,
    SizeSmall,
    SizeLarge,
    #[default]
    DateNewest,
    DateOldest,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "titleAsc" => Ok(SortKey::TitleAsc),
            "titleDesc" => Ok(SortKey::TitleDesc),
            "sizeSmall" => Ok(SortKey::SizeSmall),
            "sizeLarge" => Ok(SortKey::SizeLarge),
            "dateNewest" => Ok(SortKey::DateNewest),
            "dateOldest" => Ok(SortKey::DateOldest),
            other => Err(format!("Unknown sort key: {other}")),
        }
    }
}

impl SortKey {
    fn compare(self, a: &NoteDocument, b: &NoteDocument) -> Ordering {
        match self {
            SortKey::TitleAsc => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::TitleDesc => b.title.to_lowercase().cmp(&a.title.to_lowercase()),
            SortKey::SizeSmall => a.file_size.cmp(&b.file_size),
            SortKey::SizeLarge => b.file_size.cmp(&a.file_size),
            SortKey::DateNewest => b.created_at.cmp(&a.created_at),
            SortKey::DateOldest => a.created_at.cmp(&b.created_at),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
}

/// Filters by a case-insensitive needle, then stable-sorts. Input is expected newest first.
pub fn search_and_sort(notes: Vec<NoteDocument>, needle: Option<&str>, sort: SortKey) -> Vec<NoteDocument> {
    let needle = needle
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty());

    let mut notes: Vec<NoteDocument> = match needle {
        Some(needle) => notes.into_iter().filter(|note| note.matches(&needle)).collect(),
        None => notes,
    };

    notes.sort_by(|a, b| sort.compare(a, b));
    notes
}

/// Current time truncated to the millisecond precision the stores keep.
pub fn timestamp() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// `updatedAt` must strictly increase even when two writes land in the same millisecond.
pub fn next_update(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + TimeDelta::milliseconds(1)
    }
}
