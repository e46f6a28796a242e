//! FAQ block normalization.
//!
//! Historical records carry FAQs in four shapes: a bare array of items, or an
//! object whose list lives under `items`, `questions`, `qna` or `qAndA`. Items
//! themselves are `{q, a}` or `{question, answer}`. [`LegacyFaq`] names those
//! shapes once at ingest; everything downstream only sees [`Faq`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use contentsync_shared::{Faq, FaqItem};

/// Object keys that have held the FAQ item list, in lookup order.
const LIST_KEYS: [&str; 4] = ["items", "questions", "qna", "qAndA"];

/// How a raw FAQ value was encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegacyFaq<'a> {
    /// No FAQ at all (absent, null, or not a list/object).
    Missing,
    /// A bare array of items.
    BareArray(&'a [Value]),
    /// An object, with the key its item list was found under (if any).
    Object {
        list_key: Option<&'static str>,
        fields: &'a Map<String, Value>,
    },
}

impl<'a> LegacyFaq<'a> {
    pub fn classify(raw: Option<&'a Value>) -> Self {
        match raw {
            Some(Value::Array(items)) => Self::BareArray(items),
            Some(Value::Object(fields)) => Self::Object {
                list_key: LIST_KEYS
                    .into_iter()
                    .find(|key| fields.get(*key).is_some_and(Value::is_array)),
                fields,
            },
            _ => Self::Missing,
        }
    }

    /// Convert into the canonical block.
    pub fn into_faq(self) -> Faq {
        match self {
            Self::Missing => Faq::default(),
            Self::BareArray(items) => Faq {
                items: normalize_items(items),
                ..Default::default()
            },
            Self::Object { list_key, fields } => {
                let items = list_key
                    .and_then(|key| fields.get(key))
                    .and_then(Value::as_array)
                    .map(|items| normalize_items(items))
                    .unwrap_or_default();

                let mut extra = fields.clone();
                for key in LIST_KEYS.iter().chain(["title", "subtitle"].iter()) {
                    extra.remove(*key);
                }

                Faq {
                    title: string_or_empty(fields.get("title")),
                    subtitle: string_or_empty(fields.get("subtitle")),
                    items,
                    extra,
                }
            }
        }
    }
}

/// Audit classification of one FAQ normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaqChange {
    CreatedFaq,
    WrappedArray,
    NormalizedItems,
    AddedMissingFields,
    Unchanged,
}

impl FaqChange {
    pub const ALL: [FaqChange; 5] = [
        FaqChange::CreatedFaq,
        FaqChange::WrappedArray,
        FaqChange::NormalizedItems,
        FaqChange::AddedMissingFields,
        FaqChange::Unchanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedFaq => "created-faq",
            Self::WrappedArray => "wrapped-array",
            Self::NormalizedItems => "normalized-items",
            Self::AddedMissingFields => "added-missing-fields",
            Self::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for FaqChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a raw FAQ value and classify what changed.
///
/// The classification compares the serialized form before and after: equal
/// output is always `unchanged`, whatever shape it came in.
pub fn normalize_faq(raw: Option<&Value>) -> (Faq, FaqChange) {
    let legacy = LegacyFaq::classify(raw);
    let faq = legacy.into_faq();

    let before = raw.map(Value::to_string).unwrap_or_default();
    let after = serialized(&faq);
    if before == after {
        return (faq, FaqChange::Unchanged);
    }

    let change = match legacy {
        LegacyFaq::Missing => FaqChange::CreatedFaq,
        LegacyFaq::BareArray(_) => FaqChange::WrappedArray,
        LegacyFaq::Object {
            list_key: Some("items"),
            fields,
        } if items_canonical(fields.get("items")) => FaqChange::AddedMissingFields,
        LegacyFaq::Object { list_key: None, .. } => FaqChange::AddedMissingFields,
        LegacyFaq::Object { .. } => FaqChange::NormalizedItems,
    };
    (faq, change)
}

/// Canonical serialization of a block, with keys in sorted order.
pub fn serialized(faq: &Faq) -> String {
    serde_json::to_value(faq)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

/// Keys an item may carry its question or answer under.
const ITEM_KEYS: [&str; 4] = ["q", "question", "a", "answer"];

/// Map raw items to `{q, a}`, dropping items with neither. Other item keys
/// have no place in the canonical shape and are logged at debug level.
pub fn normalize_items(items: &[Value]) -> Vec<FaqItem> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(q) => Some(FaqItem {
                q: q.clone(),
                a: String::new(),
            }),
            Value::Object(fields) => {
                let unknown = unknown_item_keys(fields);
                if !unknown.is_empty() {
                    debug!(keys = ?unknown, "dropping unknown FAQ item keys");
                }
                Some(FaqItem {
                    q: first_string(fields, &["q", "question"]),
                    a: first_string(fields, &["a", "answer"]),
                })
            }
            _ => None,
        })
        .filter(|item| !(item.q.trim().is_empty() && item.a.trim().is_empty()))
        .collect()
}

fn unknown_item_keys(fields: &Map<String, Value>) -> Vec<&str> {
    fields
        .keys()
        .map(String::as_str)
        .filter(|k| !ITEM_KEYS.iter().any(|known| known == k))
        .collect()
}

fn items_canonical(items: Option<&Value>) -> bool {
    let Some(Value::Array(raw)) = items else {
        return false;
    };
    serde_json::to_value(normalize_items(raw)).is_ok_and(|v| v == Value::Array(raw.clone()))
}

fn first_string(fields: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| fields.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn string_or_empty(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_item_keys_are_reported() {
        let item = json!({"question": "When?", "answer": "Monthly.", "order": 2, "id": "f1"});
        let fields = item.as_object().unwrap();
        assert_eq!(unknown_item_keys(fields), vec!["id", "order"]);

        let items = normalize_items(std::slice::from_ref(&item));
        assert_eq!(items[0].q, "When?");
        assert_eq!(items[0].a, "Monthly.");
    }

    #[test]
    fn missing_faq_is_created() {
        let (faq, change) = normalize_faq(None);
        assert_eq!(change, FaqChange::CreatedFaq);
        assert_eq!(
            serde_json::to_value(&faq).unwrap(),
            json!({"title": "", "subtitle": "", "items": []})
        );

        let (_, change) = normalize_faq(Some(&Value::Null));
        assert_eq!(change, FaqChange::CreatedFaq);
    }

    #[test]
    fn bare_array_is_wrapped() {
        let raw = json!([
            {"question": "How long?", "answer": "Six weeks."},
            {"q": "Online?", "a": "Yes."}
        ]);
        let (faq, change) = normalize_faq(Some(&raw));
        assert_eq!(change, FaqChange::WrappedArray);
        assert_eq!(faq.items.len(), 2);
        assert_eq!(faq.items[0].q, "How long?");
        assert_eq!(faq.items[0].a, "Six weeks.");
        assert_eq!(faq.title, "");
    }

    #[test]
    fn alternate_list_keys_are_normalized() {
        for key in ["questions", "qna", "qAndA"] {
            let raw = json!({"title": "FAQ", key: [{"question": "Why?", "answer": "Because."}]});
            let (faq, change) = normalize_faq(Some(&raw));
            assert_eq!(change, FaqChange::NormalizedItems, "key {key}");
            assert_eq!(faq.title, "FAQ");
            assert_eq!(faq.items, vec![FaqItem { q: "Why?".into(), a: "Because.".into() }]);
            assert!(faq.extra.is_empty());
        }
    }

    #[test]
    fn items_with_legacy_item_shape_are_normalized() {
        let raw = json!({"title": "", "subtitle": "", "items": [{"question": "Q", "answer": "A"}]});
        let (_, change) = normalize_faq(Some(&raw));
        assert_eq!(change, FaqChange::NormalizedItems);
    }

    #[test]
    fn canonical_items_missing_title_gets_fields_added() {
        let raw = json!({"items": [{"q": "Q", "a": "A"}]});
        let (faq, change) = normalize_faq(Some(&raw));
        assert_eq!(change, FaqChange::AddedMissingFields);
        assert_eq!(faq.subtitle, "");

        let (_, change) = normalize_faq(Some(&json!({"title": "Only a title"})));
        assert_eq!(change, FaqChange::AddedMissingFields);
    }

    #[test]
    fn canonical_block_is_unchanged_and_byte_identical() {
        let raw = json!({
            "title": "Questions",
            "subtitle": "Ask away",
            "items": [{"q": "Q1", "a": "A1"}, {"q": "Q2", "a": "A2"}]
        });
        let (once, change) = normalize_faq(Some(&raw));
        assert_eq!(change, FaqChange::Unchanged);

        let once_value = serde_json::to_value(&once).unwrap();
        let (twice, change) = normalize_faq(Some(&once_value));
        assert_eq!(change, FaqChange::Unchanged);
        assert_eq!(serialized(&once), serialized(&twice));
        assert_eq!(serialized(&once), raw.to_string());
    }

    #[test]
    fn empty_items_are_dropped_and_strings_become_questions() {
        let raw = json!([{"q": "", "a": " "}, "Just a question", 42]);
        let (faq, _) = normalize_faq(Some(&raw));
        assert_eq!(
            faq.items,
            vec![FaqItem { q: "Just a question".into(), a: String::new() }]
        );
    }

    #[test]
    fn unknown_faq_keys_survive() {
        let raw = json!({"title": "", "subtitle": "", "items": [], "layout": "accordion"});
        let (faq, change) = normalize_faq(Some(&raw));
        assert_eq!(change, FaqChange::Unchanged);
        assert_eq!(faq.extra["layout"], "accordion");
    }

    #[test]
    fn classify_reports_list_key() {
        let raw = json!({"qna": []});
        match LegacyFaq::classify(Some(&raw)) {
            LegacyFaq::Object { list_key, .. } => assert_eq!(list_key, Some("qna")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(LegacyFaq::classify(Some(&json!("text"))), LegacyFaq::Missing);
    }
}
