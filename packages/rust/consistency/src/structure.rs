//! Field inventory of a dataset: which field paths exist in each collection,
//! how often, and with which JSON types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use contentsync_shared::{Collection, SINGLETON_COLLECTION, Singleton, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            Value::Null => Self::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    /// Documents containing the path at least once.
    pub present: usize,
    /// Occurrences per type. Array element paths can count several per document.
    pub types: BTreeMap<JsonType, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStructure {
    pub name: String,
    pub document_count: usize,
    /// Keyed by path; array elements appear as `field[]`.
    pub fields: BTreeMap<String, FieldStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    pub collections: Vec<CollectionStructure>,
}

/// Inventory every collection and singleton in `dataset`.
#[instrument(skip_all)]
pub fn inspect_structure(dataset: &Snapshot) -> StructureReport {
    let mut collections: Vec<CollectionStructure> = Collection::ALL
        .into_iter()
        .map(|c| inspect_documents(c.as_str(), dataset.records(c)))
        .collect();

    for singleton in Singleton::ALL {
        if let Some(doc) = dataset.singleton(singleton) {
            collections.push(inspect_documents(
                &format!("{SINGLETON_COLLECTION}/{}", singleton.id()),
                vec![doc],
            ));
        }
    }

    StructureReport { collections }
}

fn inspect_documents(name: &str, documents: Vec<&Value>) -> CollectionStructure {
    let mut fields: BTreeMap<String, FieldStats> = BTreeMap::new();

    for doc in &documents {
        let mut seen = BTreeSet::new();
        if let Value::Object(map) = doc {
            for (key, value) in map {
                record_field(&mut fields, &mut seen, key.clone(), value);
            }
        }
        for path in seen {
            if let Some(stats) = fields.get_mut(&path) {
                stats.present += 1;
            }
        }
    }

    CollectionStructure {
        name: name.to_string(),
        document_count: documents.len(),
        fields,
    }
}

fn record_field(
    fields: &mut BTreeMap<String, FieldStats>,
    seen: &mut BTreeSet<String>,
    path: String,
    value: &Value,
) {
    let stats = fields.entry(path.clone()).or_default();
    *stats.types.entry(JsonType::of(value)).or_default() += 1;

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                record_field(fields, seen, format!("{path}.{key}"), child);
            }
        }
        Value::Array(items) => {
            let element_path = format!("{path}[]");
            for item in items {
                record_field(fields, seen, element_path.clone(), item);
            }
        }
        _ => {}
    }

    seen.insert(path);
}
