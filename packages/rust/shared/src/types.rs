//! Dataset-level types: collections, singletons, and the snapshot document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Remote collection holding the singleton documents.
pub const SINGLETON_COLLECTION: &str = "site";

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// A named multi-document collection, shared by the remote store and the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Programs,
    Experiences,
    Solutions,
    Testimonials,
    Pages,
}

impl Collection {
    /// Collections holding offering records.
    pub const OFFERINGS: [Collection; 3] = [
        Collection::Programs,
        Collection::Experiences,
        Collection::Solutions,
    ];

    /// Every collection, in export order.
    pub const ALL: [Collection; 5] = [
        Collection::Programs,
        Collection::Experiences,
        Collection::Solutions,
        Collection::Testimonials,
        Collection::Pages,
    ];

    /// Collection name in the remote store and the snapshot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Programs => "programs",
            Self::Experiences => "experiences",
            Self::Solutions => "solutions",
            Self::Testimonials => "testimonials",
            Self::Pages => "pages",
        }
    }

    /// Singular entity type name used in reference findings.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::Programs => "program",
            Self::Experiences => "experience",
            Self::Solutions => "solution",
            Self::Testimonials => "testimonial",
            Self::Pages => "page",
        }
    }

    pub fn is_offering(&self) -> bool {
        Self::OFFERINGS.contains(self)
    }

    /// Parse a collection name (`programs`) or entity type (`program`).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == name || c.entity_type() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Singleton
// ---------------------------------------------------------------------------

/// A single document keyed by a fixed id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Singleton {
    Navigation,
    Settings,
}

impl Singleton {
    pub const ALL: [Singleton; 2] = [Singleton::Navigation, Singleton::Settings];

    /// Fixed document id inside [`SINGLETON_COLLECTION`] and snapshot key.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Settings => "settings",
        }
    }
}

// ---------------------------------------------------------------------------
// Record keys
// ---------------------------------------------------------------------------

/// Read a non-empty string field from a JSON object.
pub fn str_field<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Identity key of a record: `slug`, falling back to `id`.
pub fn record_key(record: &Value) -> Option<String> {
    str_field(record, "slug")
        .or_else(|| str_field(record, "id"))
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The static content snapshot: every collection and singleton under fixed
/// top-level keys. Also used as the in-memory shape of a remote export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub programs: Vec<Value>,
    #[serde(default)]
    pub experiences: Vec<Value>,
    #[serde(default)]
    pub solutions: Vec<Value>,
    #[serde(default)]
    pub testimonials: Vec<Value>,
    /// Pages keyed by page id.
    #[serde(default)]
    pub pages: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Unknown top-level keys, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Snapshot {
    /// Records of a collection, in stored order. Pages come out in id order.
    pub fn records(&self, collection: Collection) -> Vec<&Value> {
        match collection {
            Collection::Programs => self.programs.iter().collect(),
            Collection::Experiences => self.experiences.iter().collect(),
            Collection::Solutions => self.solutions.iter().collect(),
            Collection::Testimonials => self.testimonials.iter().collect(),
            Collection::Pages => self.pages.values().collect(),
        }
    }

    /// Records keyed for comparison: list collections by `slug ?? id`,
    /// pages by their map key. Records without any key are skipped, and a
    /// repeated key keeps the first record with a warning.
    pub fn keyed_records(&self, collection: Collection) -> BTreeMap<String, &Value> {
        if collection == Collection::Pages {
            return self.pages.iter().map(|(k, v)| (k.clone(), v)).collect();
        }

        let mut keyed = BTreeMap::new();
        for record in self.records(collection) {
            let Some(key) = record_key(record) else {
                continue;
            };
            if keyed.contains_key(&key) {
                warn!(%collection, %key, "repeated record key; keeping the first");
                continue;
            }
            keyed.insert(key, record);
        }
        keyed
    }

    /// Mutable access to a list collection. Pages are a map and return `None`.
    pub fn list_mut(&mut self, collection: Collection) -> Option<&mut Vec<Value>> {
        match collection {
            Collection::Programs => Some(&mut self.programs),
            Collection::Experiences => Some(&mut self.experiences),
            Collection::Solutions => Some(&mut self.solutions),
            Collection::Testimonials => Some(&mut self.testimonials),
            Collection::Pages => None,
        }
    }

    pub fn singleton(&self, singleton: Singleton) -> Option<&Value> {
        match singleton {
            Singleton::Navigation => self.navigation.as_ref(),
            Singleton::Settings => self.settings.as_ref(),
        }
    }

    pub fn set_singleton(&mut self, singleton: Singleton, value: Option<Value>) {
        match singleton {
            Singleton::Navigation => self.navigation = value,
            Singleton::Settings => self.settings = value,
        }
    }

    /// Total number of records across all collections.
    pub fn record_count(&self) -> usize {
        Collection::ALL
            .iter()
            .map(|c| self.records(*c).len())
            .sum()
    }
}
