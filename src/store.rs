use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::InvalidPostId;

pub const MIN_POST_ID_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(String);

impl PostId {
    pub fn parse(raw: &str) -> Result<Self, InvalidPostId> {
        if raw.len() >= MIN_POST_ID_DIGITS && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidPostId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFact {
    pub post_id: PostId,
    pub author: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub urls: Vec<String>,
    pub author: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub sequence: u64,
}

impl MediaRecord {
    pub fn is_more_recent_than(&self, other: &MediaRecord) -> bool {
        (self.captured_at, self.sequence) > (other.captured_at, other.sequence)
    }

    pub fn authored_by(&self, handle: &str) -> bool {
        self.author.as_deref() == Some(handle)
    }
}

#[derive(Default)]
struct Records {
    entries: Vec<(PostId, MediaRecord)>,
    index: HashMap<PostId, usize>,
    next_sequence: u64,
}

impl Records {
    fn upsert(
        &mut self,
        post_id: &PostId,
        author: Option<&str>,
        url: &str,
        at: DateTime<Utc>,
    ) -> bool {
        let slot = match self.index.get(post_id).copied() {
            Some(slot) => slot,
            None => {
                let record = MediaRecord {
                    urls: Vec::new(),
                    author: None,
                    captured_at: at,
                    sequence: self.next_sequence,
                };
                self.next_sequence += 1;
                self.entries.push((post_id.clone(), record));
                self.index.insert(post_id.clone(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        let record = &mut self.entries[slot].1;
        if record.author.is_none() {
            if let Some(author) = author.filter(|a| !a.is_empty()) {
                record.author = Some(author.to_string());
            }
        }
        if url.is_empty() || record.urls.iter().any(|existing| existing == url) {
            return false;
        }
        record.urls.push(url.to_string());
        true
    }
}

// Upserts only append distinct URLs and set the author once, so apply order never
// changes the final contents of a record.
#[derive(Default)]
pub struct CorrelationStore {
    records: RwLock<Records>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, post_id: &PostId, author: Option<&str>, url: &str) -> bool {
        self.upsert_at(post_id, author, url, Utc::now())
    }

    pub fn upsert_at(
        &self,
        post_id: &PostId,
        author: Option<&str>,
        url: &str,
        at: DateTime<Utc>,
    ) -> bool {
        let added = self.records.write().upsert(post_id, author, url, at);
        if added {
            debug!(
                post_id = %post_id,
                author = author.unwrap_or("unknown"),
                url,
                "captured variant"
            );
        }
        added
    }

    pub fn apply(&self, facts: &[MediaFact]) -> usize {
        if facts.is_empty() {
            return 0;
        }
        let now = Utc::now();
        let mut records = self.records.write();
        let mut added = 0;
        for fact in facts {
            if records.upsert(&fact.post_id, fact.author.as_deref(), &fact.url, now) {
                debug!(
                    post_id = %fact.post_id,
                    author = fact.author.as_deref().unwrap_or("unknown"),
                    url = %fact.url,
                    "captured variant"
                );
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, post_id: &PostId) -> Option<MediaRecord> {
        let records = self.records.read();
        records
            .index
            .get(post_id)
            .map(|slot| records.entries[*slot].1.clone())
    }

    pub fn all(&self) -> Vec<(PostId, MediaRecord)> {
        self.records.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut records = self.records.write();
        let dropped = records.entries.len();
        *records = Records::default();
        debug!(dropped, "correlation store cleared");
    }
}
