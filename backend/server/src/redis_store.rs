//! # Redis
//!
//! RAM database holding every note.
//!
//! ## Implementation
//!
//! - Redis hash per note: `note:{id}` with one field per document attribute
//! - Timestamps stored as epoch milliseconds, booleans as `0`/`1`
//! - Sorted set `notes:all` scored by `created_at` for the admin list
//! - Sorted set `notes:approved` scored by `created_at` for the public list
//! - Every single note mutation is one Lua script, Redis runs scripts atomically so concurrent increments on
//!   the same note never lose an update and the indexes never disagree with the hashes
use std::{collections::HashMap, str::FromStr, sync::LazyLock, time::Duration};

use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::info;

use crate::{
    database::{NoteStore, StoreError},
    models::{Counter, ListScope, NoteDocument, NoteEdit},
};

pub const ALL_INDEX: &str = "notes:all";
pub const APPROVED_INDEX: &str = "notes:approved";

const BUMP_UPDATED_AT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return false
end
local now = tonumber(ARGV[1])
local previous = tonumber(redis.call('HGET', KEYS[1], 'updated_at'))
if previous and now <= previous then
    now = previous + 1
end
redis.call('HSET', KEYS[1], 'updated_at', string.format('%d', now))
";

// KEYS: note, approved index. ARGV: now, id.
static APPROVE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(&format!(
        r"{BUMP_UPDATED_AT}
redis.call('HSET', KEYS[1], 'is_approved', '1')
redis.call('ZADD', KEYS[2], redis.call('HGET', KEYS[1], 'created_at'), ARGV[2])
return redis.call('HGETALL', KEYS[1])
"
    ))
});

// KEYS: note. ARGV: now, then field/value pairs.
static UPDATE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(&format!(
        r"{BUMP_UPDATED_AT}
for i = 2, #ARGV, 2 do
    redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
end
return redis.call('HGETALL', KEYS[1])
"
    ))
});

// KEYS: note. ARGV: now, counter field.
static INCREMENT_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(&format!(
        r"{BUMP_UPDATED_AT}
return redis.call('HINCRBY', KEYS[1], ARGV[2], 1)
"
    ))
});

// KEYS: note, all index, approved index. ARGV: id.
static DELETE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local row = redis.call('HGETALL', KEYS[1])
if #row == 0 then
    return false
end
redis.call('DEL', KEYS[1])
redis.call('ZREM', KEYS[2], ARGV[1])
redis.call('ZREM', KEYS[3], ARGV[1])
return row
",
    )
});

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    info!("Connected to Redis");

    Ok(connection_manager)
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(init_redis(redis_url).await?))
    }
}

impl NoteStore for RedisStore {
    async fn insert(&self, note: &NoteDocument) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let created = note.created_at.timestamp_millis();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(note_key(&note.id), &encode_note(note))
            .zadd(ALL_INDEX, &note.id, created);

        if note.is_approved {
            pipe.zadd(APPROVED_INDEX, &note.id, created);
        }

        pipe.exec_async(&mut connection).await?;

        Ok(())
    }

    async fn list(&self, scope: ListScope) -> Result<Vec<NoteDocument>, StoreError> {
        let mut connection = self.connection.clone();

        let index = match scope {
            ListScope::Approved => APPROVED_INDEX,
            ListScope::All => ALL_INDEX,
        };

        let ids: Vec<String> = connection.zrevrange(index, 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hgetall(note_key(id));
        }

        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut connection).await?;

        // a note deleted between the two round trips comes back as an empty hash
        ids.iter()
            .zip(rows)
            .filter(|(_, row)| !row.is_empty())
            .map(|(id, row)| decode_note(id, row))
            .collect()
    }

    async fn get(&self, id: &str) -> Result<Option<NoteDocument>, StoreError> {
        let mut connection = self.connection.clone();

        let row: HashMap<String, String> = connection.hgetall(note_key(id)).await?;
        if row.is_empty() {
            return Ok(None);
        }

        decode_note(id, row).map(Some)
    }

    async fn approve(&self, id: &str, now: DateTime<Utc>) -> Result<Option<NoteDocument>, StoreError> {
        let mut connection = self.connection.clone();

        let row: Option<HashMap<String, String>> = APPROVE_SCRIPT
            .key(note_key(id))
            .key(APPROVED_INDEX)
            .arg(now.timestamp_millis())
            .arg(id)
            .invoke_async(&mut connection)
            .await?;

        row.map(|row| decode_note(id, row)).transpose()
    }

    async fn update(
        &self,
        id: &str,
        edit: &NoteEdit,
        now: DateTime<Utc>,
    ) -> Result<Option<NoteDocument>, StoreError> {
        let mut connection = self.connection.clone();

        let mut invocation = UPDATE_SCRIPT.key(note_key(id));
        invocation.arg(now.timestamp_millis());
        for (field, value) in edit.fields() {
            invocation.arg(field).arg(value);
        }

        let row: Option<HashMap<String, String>> = invocation.invoke_async(&mut connection).await?;

        row.map(|row| decode_note(id, row)).transpose()
    }

    async fn delete(&self, id: &str) -> Result<Option<NoteDocument>, StoreError> {
        let mut connection = self.connection.clone();

        let row: Option<HashMap<String, String>> = DELETE_SCRIPT
            .key(note_key(id))
            .key(ALL_INDEX)
            .key(APPROVED_INDEX)
            .arg(id)
            .invoke_async(&mut connection)
            .await?;

        row.map(|row| decode_note(id, row)).transpose()
    }

    async fn increment(&self, id: &str, counter: Counter, now: DateTime<Utc>) -> Result<Option<u64>, StoreError> {
        let mut connection = self.connection.clone();

        let count: Option<u64> = INCREMENT_SCRIPT
            .key(note_key(id))
            .arg(now.timestamp_millis())
            .arg(counter.field())
            .invoke_async(&mut connection)
            .await?;

        Ok(count)
    }
}

pub fn note_key(id: &str) -> String {
    format!("note:{id}")
}

fn encode_note(note: &NoteDocument) -> Vec<(&'static str, String)> {
    vec![
        ("id", note.id.clone()),
        ("title", note.title.clone()),
        ("author", note.author.clone()),
        ("file_url", note.file_url.clone()),
        ("file_size", note.file_size.to_string()),
        ("is_approved", if note.is_approved { "1" } else { "0" }.to_string()),
        ("views", note.views.to_string()),
        ("downloads", note.downloads.to_string()),
        ("created_at", note.created_at.timestamp_millis().to_string()),
        ("updated_at", note.updated_at.timestamp_millis().to_string()),
    ]
}

fn decode_note(id: &str, mut row: HashMap<String, String>) -> Result<NoteDocument, StoreError> {
    Ok(NoteDocument {
        id: id.to_string(),
        title: take(id, &mut row, "title")?,
        author: take(id, &mut row, "author")?,
        file_url: take(id, &mut row, "file_url")?,
        file_size: parse(id, &mut row, "file_size")?,
        is_approved: take(id, &mut row, "is_approved")? == "1",
        views: parse(id, &mut row, "views")?,
        downloads: parse(id, &mut row, "downloads")?,
        created_at: millis(id, &mut row, "created_at")?,
        updated_at: millis(id, &mut row, "updated_at")?,
    })
}

fn corrupt(id: &str, reason: String) -> StoreError {
    StoreError::Corrupt {
        id: id.to_string(),
        reason,
    }
}

fn take(id: &str, row: &mut HashMap<String, String>, field: &str) -> Result<String, StoreError> {
    row.remove(field)
        .ok_or_else(|| corrupt(id, format!("missing field {field}")))
}

fn parse<T: FromStr>(id: &str, row: &mut HashMap<String, String>, field: &str) -> Result<T, StoreError> {
    let raw = take(id, row, field)?;

    raw.parse()
        .map_err(|_| corrupt(id, format!("invalid {field}: {raw}")))
}

fn millis(id: &str, row: &mut HashMap<String, String>, field: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: i64 = parse(id, row, field)?;

    DateTime::from_timestamp_millis(raw).ok_or_else(|| corrupt(id, format!("{field} out of range: {raw}")))
}
