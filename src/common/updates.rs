//! Update records and the pending-update set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// One watched page that changed since the last clear.
///
/// Identity is the request URL alone: equality, hashing and ordering ignore
/// every other field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// URL the page is fetched from
    pub req_url: String,
    /// When the change was detected, if the scraper recorded it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<DateTime<Utc>>,
}

impl UpdateRecord {
    pub fn new(req_url: impl Into<String>) -> Self {
        Self {
            req_url: req_url.into(),
            detected_at: None,
        }
    }

    /// Record stamped with the current time
    pub fn detected_now(req_url: impl Into<String>) -> Self {
        Self {
            req_url: req_url.into(),
            detected_at: Some(Utc::now()),
        }
    }
}

impl PartialEq for UpdateRecord {
    fn eq(&self, other: &Self) -> bool {
        self.req_url == other.req_url
    }
}

impl Eq for UpdateRecord {}

impl Hash for UpdateRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.req_url.hash(state);
    }
}

impl PartialOrd for UpdateRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UpdateRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.req_url.cmp(&other.req_url)
    }
}

/// Pending updates keyed by record, each with its pending flag.
///
/// Presence already means pending; the flag is kept because it is part of
/// the encoded shape shared by the state file and the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSet {
    entries: HashMap<UpdateRecord, bool>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a record pending. Returns false if it was already present.
    pub fn insert(&mut self, record: UpdateRecord) -> bool {
        if self.entries.contains_key(&record) {
            return false;
        }
        self.entries.insert(record, true);
        true
    }

    pub fn contains(&self, req_url: &str) -> bool {
        self.entries.contains_key(&UpdateRecord::new(req_url))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &UpdateRecord> {
        self.entries.keys()
    }

    /// Records sorted by URL
    pub fn sorted(&self) -> Vec<&UpdateRecord> {
        let mut records: Vec<_> = self.entries.keys().collect();
        records.sort();
        records
    }

    pub fn urls(&self) -> Vec<String> {
        self.sorted().into_iter().map(|r| r.req_url.clone()).collect()
    }
}

impl FromIterator<UpdateRecord> for UpdateSet {
    fn from_iter<I: IntoIterator<Item = UpdateRecord>>(iter: I) -> Self {
        let mut set = UpdateSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl Extend<UpdateRecord> for UpdateSet {
    fn extend<I: IntoIterator<Item = UpdateRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

/// Encoded form of one set entry
#[derive(Serialize)]
struct EntryRef<'a> {
    #[serde(flatten)]
    update: &'a UpdateRecord,
    pending: bool,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(flatten)]
    update: UpdateRecord,
    pending: bool,
}

impl Serialize for UpdateSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        serializer.collect_seq(entries.into_iter().map(|(update, pending)| EntryRef {
            update,
            pending: *pending,
        }))
    }
}

impl<'de> Deserialize<'de> for UpdateSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        let mut set = UpdateSet::new();
        for entry in entries {
            set.entries.entry(entry.update).or_insert(entry.pending);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(urls: &[&str]) -> UpdateSet {
        urls.iter().map(|u| UpdateRecord::new(*u)).collect()
    }

    #[test]
    fn test_record_identity_ignores_metadata() {
        let plain = UpdateRecord::new("http://example.org/");
        let stamped = UpdateRecord::detected_now("http://example.org/");
        assert_eq!(plain, stamped);
        assert_ne!(plain, UpdateRecord::new("http://example.org/other"));
    }

    #[test]
    fn test_insert_deduplicates_by_url() {
        let mut set = UpdateSet::new();
        assert!(set.insert(UpdateRecord::new("http://a/")));
        assert!(!set.insert(UpdateRecord::detected_now("http://a/")));
        assert_eq!(set.len(), 1);
        assert!(set.contains("http://a/"));
    }

    #[test]
    fn test_clear_empties_set() {
        let mut set = set_of(&["http://a/", "http://b/"]);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_sorted_urls() {
        let set = set_of(&["http://c/", "http://a/", "http://b/"]);
        assert_eq!(set.urls(), vec!["http://a/", "http://b/", "http://c/"]);
    }

    #[test]
    fn test_json_round_trip_by_size() {
        let cases: [&[&str]; 4] = [
            &[],
            &["http://a/"],
            &["http://a/", "http://b/"],
            &["http://a/", "http://b/", "http://c/", "http://d/?q=1"],
        ];
        for urls in cases {
            let set = set_of(urls);
            let json = serde_json::to_string(&set).unwrap();
            let back: UpdateSet = serde_json::from_str(&json).unwrap();
            assert_eq!(back, set, "round trip of {:?}", urls);
        }
    }

    #[test]
    fn test_encoded_shape() {
        let set = set_of(&["http://b/", "http://a/"]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(
            json,
            r#"[{"req_url":"http://a/","pending":true},{"req_url":"http://b/","pending":true}]"#
        );
    }

    #[test]
    fn test_round_trip_keeps_detection_time() {
        let mut set = UpdateSet::new();
        set.insert(UpdateRecord::detected_now("http://a/"));
        let json = serde_json::to_string(&set).unwrap();
        let back: UpdateSet = serde_json::from_str(&json).unwrap();
        let record = back.iter().next().unwrap();
        assert!(record.detected_at.is_some());
    }

    #[test]
    fn test_decode_rejects_missing_flag() {
        let result: Result<UpdateSet, _> = serde_json::from_str(r#"[{"req_url":"http://a/"}]"#);
        assert!(result.is_err());
    }
}
