//! Structural diff between the remote store and the snapshot.
//!
//! Records are matched by `slug ?? id` (pages and singletons by their fixed
//! id) and diffed field by field from the record root. Only objects are
//! recursed into; an array is one value and differs as a whole.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use contentsync_shared::{Collection, SINGLETON_COLLECTION, Singleton, Snapshot};

/// A record present on one side only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRecord {
    pub collection: String,
    pub id: String,
}

/// A field whose value differs between the two sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub collection: String,
    pub id: String,
    /// Dotted path from the record root.
    pub field: String,
    /// Remote value, absent when the remote record lacks the field.
    #[serde(rename = "firestore", skip_serializing_if = "Option::is_none")]
    pub remote: Option<Value>,
    /// Snapshot value, absent when the snapshot record lacks the field.
    #[serde(rename = "json", skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
}

/// A field that exists only in the snapshot record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraField {
    pub collection: String,
    pub id: String,
    pub field: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParityReport {
    /// Present remotely, absent from the snapshot.
    pub missing_in_json: Vec<MissingRecord>,
    /// Present in the snapshot, absent remotely.
    pub missing_in_firestore: Vec<MissingRecord>,
    pub field_mismatches: Vec<FieldMismatch>,
    pub extra_fields_in_json: Vec<ExtraField>,
}

impl ParityReport {
    pub fn is_clean(&self) -> bool {
        self.missing_in_json.is_empty()
            && self.missing_in_firestore.is_empty()
            && self.field_mismatches.is_empty()
            && self.extra_fields_in_json.is_empty()
    }
}

/// Diff every collection and singleton of `remote` against `snapshot`.
#[instrument(skip_all)]
pub fn diff_datasets(remote: &Snapshot, snapshot: &Snapshot) -> ParityReport {
    let mut report = ParityReport::default();

    for collection in Collection::ALL {
        let remote_records = remote.keyed_records(collection);
        let snapshot_records = snapshot.keyed_records(collection);
        let name = collection.as_str();

        let ids: BTreeSet<&String> = remote_records.keys().chain(snapshot_records.keys()).collect();
        for id in ids {
            diff_document(
                &mut report,
                name,
                id,
                remote_records.get(id).copied(),
                snapshot_records.get(id).copied(),
            );
        }
    }

    for singleton in Singleton::ALL {
        diff_document(
            &mut report,
            SINGLETON_COLLECTION,
            singleton.id(),
            remote.singleton(singleton),
            snapshot.singleton(singleton),
        );
    }

    info!(
        missing_in_json = report.missing_in_json.len(),
        missing_in_firestore = report.missing_in_firestore.len(),
        field_mismatches = report.field_mismatches.len(),
        extra_fields_in_json = report.extra_fields_in_json.len(),
        "parity diff complete"
    );
    report
}

/// Diff one document that may be missing on either side.
pub fn diff_document(
    report: &mut ParityReport,
    collection: &str,
    id: &str,
    remote: Option<&Value>,
    snapshot: Option<&Value>,
) {
    let missing = || MissingRecord {
        collection: collection.to_string(),
        id: id.to_string(),
    };

    match (remote, snapshot) {
        (None, None) => {}
        (Some(_), None) => report.missing_in_json.push(missing()),
        (None, Some(_)) => report.missing_in_firestore.push(missing()),
        (Some(remote), Some(snapshot)) => {
            let mut ctx = DiffContext {
                report,
                collection,
                id,
            };
            ctx.diff_value(&mut Vec::new(), Some(remote), Some(snapshot));
        }
    }
}

struct DiffContext<'r, 'a> {
    report: &'r mut ParityReport,
    collection: &'a str,
    id: &'a str,
}

impl DiffContext<'_, '_> {
    fn diff_value(&mut self, path: &mut Vec<String>, remote: Option<&Value>, snapshot: Option<&Value>) {
        match (remote, snapshot) {
            (Some(Value::Object(r)), Some(Value::Object(s))) => self.diff_objects(path, r, s),
            (None, Some(_)) => self.extra(path),
            (r, s) => {
                let equal = match (r, s) {
                    (Some(r), Some(s)) => json_eq(r, s),
                    _ => false,
                };
                if !equal {
                    self.mismatch(path, r, s);
                }
            }
        }
    }

    fn diff_objects(&mut self, path: &mut Vec<String>, remote: &Map<String, Value>, snapshot: &Map<String, Value>) {
        let keys: BTreeSet<&String> = remote.keys().chain(snapshot.keys()).collect();
        for key in keys {
            path.push(key.clone());
            self.diff_value(path, remote.get(key), snapshot.get(key));
            path.pop();
        }
    }

    fn mismatch(&mut self, path: &[String], remote: Option<&Value>, snapshot: Option<&Value>) {
        self.report.field_mismatches.push(FieldMismatch {
            collection: self.collection.to_string(),
            id: self.id.to_string(),
            field: field_path(path),
            remote: remote.cloned(),
            snapshot: snapshot.cloned(),
        });
    }

    fn extra(&mut self, path: &[String]) {
        self.report.extra_fields_in_json.push(ExtraField {
            collection: self.collection.to_string(),
            id: self.id.to_string(),
            field: field_path(path),
        });
    }
}

fn field_path(path: &[String]) -> String {
    if path.is_empty() {
        "(root)".to_string()
    } else {
        path.join(".")
    }
}

/// Deep equality where numbers compare by value (`1` equals `1.0`). Object
/// key order never matters.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            x.as_f64() == y.as_f64()
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_eq(v, other)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(value: Value) -> Snapshot {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Snapshot {
        dataset(json!({
            "programs": [
                {"id": "p1", "slug": "lab", "title": "Lab", "hero": {"headline": "H"}, "tags": ["a", "b"]},
                {"id": "p2", "slug": "retreat", "title": "Retreat"}
            ],
            "testimonials": [{"id": "t1", "text": "Great", "rating": 5}],
            "pages": {"home": {"title": "Home", "featuredPrograms": ["lab"]}},
            "navigation": {"menu": [{"label": "Lab", "href": "/programs/lab"}]},
            "settings": {"siteName": "Example"}
        }))
    }

    #[test]
    fn diff_is_reflexive() {
        let data = sample();
        let copy = data.clone();
        let report = diff_datasets(&data, &copy);
        assert!(report.is_clean(), "{report:?}");
    }

    #[test]
    fn missing_records_on_each_side() {
        let remote = sample();
        let mut snapshot = sample();
        snapshot.programs.remove(1);
        snapshot
            .experiences
            .push(json!({"id": "e1", "slug": "walk", "title": "Walk"}));

        let report = diff_datasets(&remote, &snapshot);
        assert_eq!(
            report.missing_in_json,
            vec![MissingRecord { collection: "programs".into(), id: "retreat".into() }]
        );
        assert_eq!(
            report.missing_in_firestore,
            vec![MissingRecord { collection: "experiences".into(), id: "walk".into() }]
        );
        assert!(report.field_mismatches.is_empty());
    }

    #[test]
    fn nested_objects_recurse_and_arrays_compare_whole() {
        let remote = sample();
        let mut snapshot = sample();
        snapshot.programs[0]["hero"]["headline"] = json!("Changed");
        snapshot.programs[0]["tags"] = json!(["b", "a"]);

        let report = diff_datasets(&remote, &snapshot);
        let fields: Vec<&str> = report
            .field_mismatches
            .iter()
            .map(|m| m.field.as_str())
            .collect();
        assert_eq!(fields, vec!["hero.headline", "tags"]);
        assert_eq!(report.field_mismatches[1].remote, Some(json!(["a", "b"])));
        assert_eq!(report.field_mismatches[1].snapshot, Some(json!(["b", "a"])));
    }

    #[test]
    fn object_against_scalar_is_a_mismatch() {
        let remote = sample();
        let mut snapshot = sample();
        snapshot.programs[0]["hero"] = json!("flat");

        let report = diff_datasets(&remote, &snapshot);
        assert_eq!(report.field_mismatches.len(), 1);
        assert_eq!(report.field_mismatches[0].field, "hero");
    }

    #[test]
    fn snapshot_only_fields_are_extras_not_mismatches() {
        let remote = sample();
        let mut snapshot = sample();
        snapshot.programs[0]["faq"] = json!({"title": "", "subtitle": "", "items": []});
        snapshot.settings.as_mut().unwrap()["theme"] = json!("dark");

        let report = diff_datasets(&remote, &snapshot);
        assert!(report.field_mismatches.is_empty());
        let extras: Vec<(&str, &str)> = report
            .extra_fields_in_json
            .iter()
            .map(|e| (e.collection.as_str(), e.field.as_str()))
            .collect();
        assert_eq!(extras, vec![("programs", "faq"), ("site", "theme")]);
    }

    #[test]
    fn remote_only_field_is_a_mismatch() {
        let mut remote = sample();
        let snapshot = sample();
        remote.testimonials[0]["verified"] = json!(true);

        let report = diff_datasets(&remote, &snapshot);
        assert_eq!(report.field_mismatches.len(), 1);
        let mismatch = &report.field_mismatches[0];
        assert_eq!(mismatch.field, "verified");
        assert_eq!(mismatch.snapshot, None);
        assert!(report.extra_fields_in_json.is_empty());
    }

    #[test]
    fn singletons_are_diffed() {
        let remote = sample();
        let mut snapshot = sample();
        snapshot.navigation = None;

        let report = diff_datasets(&remote, &snapshot);
        assert_eq!(
            report.missing_in_json,
            vec![MissingRecord { collection: "site".into(), id: "navigation".into() }]
        );
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!json_eq(&json!(1), &json!("1")));
        assert!(!json_eq(&json!([1, 2]), &json!([2, 1])));
        assert!(!json_eq(&json!({"a": 1}), &json!({"a": 1, "b": null})));
    }
}
