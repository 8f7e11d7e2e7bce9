//! Knowledge entries and search filters.

use aria_core::{normalize_keyword, EntryId, EntryKind, Error, Importance, Result, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque structured payload. The store never inspects its shape.
pub type Content = serde_json::Map<String, serde_json::Value>;

/// An immutable fact record. One JSON object per entry on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    #[serde(default)]
    pub content: Content,
    pub importance: Importance,
    /// `None` for system-scoped facts.
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn has_any_keyword(&self, keywords: &BTreeSet<String>) -> bool {
        keywords.iter().any(|k| self.keywords.contains(k))
    }
}

/// Any combination of kind, owner, keywords (OR-matched) and an inclusive
/// time range. An empty filter matches everything.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    pub kind: Option<EntryKind>,
    pub owner: Option<UserId>,
    pub keywords: Option<Vec<String>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: impl Into<EntryKind>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn owner(mut self, owner: impl Into<UserId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.get_or_insert_with(Vec::new).push(keyword.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords
            .get_or_insert_with(Vec::new)
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    pub fn until(mut self, at: DateTime<Utc>) -> Self {
        self.until = Some(at);
        self
    }

    /// Reject malformed filters before any matching is attempted.
    pub(crate) fn resolve(&self) -> Result<ResolvedFilter> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(Error::invalid_filter(format!(
                    "time range is inverted: since {since} is after until {until}"
                )));
            }
        }

        let keywords = match &self.keywords {
            None => None,
            Some(raw) if raw.is_empty() => {
                return Err(Error::invalid_filter("keyword set is empty"));
            }
            Some(raw) => {
                let mut set = BTreeSet::new();
                for k in raw {
                    match normalize_keyword(k) {
                        Some(n) => {
                            set.insert(n);
                        }
                        None => {
                            return Err(Error::invalid_filter(format!(
                                "blank keyword {k:?}"
                            )))
                        }
                    }
                }
                Some(set)
            }
        };

        Ok(ResolvedFilter {
            kind: self.kind.clone(),
            owner: self.owner.clone(),
            keywords,
            since: self.since,
            until: self.until,
        })
    }
}

/// A validated filter with normalized keywords.
#[derive(Debug)]
pub(crate) struct ResolvedFilter {
    pub kind: Option<EntryKind>,
    pub owner: Option<UserId>,
    pub keywords: Option<BTreeSet<String>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ResolvedFilter {
    /// True when an index can narrow the candidate set.
    pub fn is_index_scoped(&self) -> bool {
        self.kind.is_some()
            || self.owner.is_some()
            || self.keywords.is_some()
            || self.since.is_some()
            || self.until.is_some()
    }

    pub fn matches(&self, entry: &KnowledgeEntry) -> bool {
        if let Some(kind) = &self.kind {
            if &entry.kind != kind {
                return false;
            }
        }
        if let Some(owner) = &self.owner {
            if entry.owner.as_ref() != Some(owner) {
                return false;
            }
        }
        if let Some(keywords) = &self.keywords {
            if !entry.has_any_keyword(keywords) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.created_at > until {
                return false;
            }
        }
        true
    }
}
