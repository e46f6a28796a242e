//! Duplicate collapsing for offering collections.
//!
//! Records sharing a key (`slug`, falling back to `id`) are merged in the
//! order they were read. The first record of a group keeps its identity and
//! each later one is folded into it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use contentsync_shared::{Collection, Offering};

/// One group of duplicates that was collapsed into a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMerge {
    pub collection: Collection,
    pub slug: String,
    /// Id of the first-seen record, which the group collapsed into.
    pub kept_id: String,
    pub merged_ids: Vec<String>,
}

/// A record excluded from the merge because it has neither `slug` nor `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedRecord {
    pub collection: Collection,
    /// Position of the record in the raw collection, before normalization.
    pub index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MergeResult {
    /// Merged records, sorted by `order`.
    pub records: Vec<Offering>,
    pub merges: Vec<DuplicateMerge>,
    pub dropped: Vec<DroppedRecord>,
}

/// Collapse duplicates in one offering collection.
pub fn merge_collection(collection: Collection, records: Vec<Offering>) -> MergeResult {
    merge_positioned(collection, records.into_iter().enumerate().collect())
}

/// Collapse duplicates in records tagged with their position in the raw
/// collection. Positions are carried into [`DroppedRecord::index`].
#[instrument(skip_all, fields(collection = %collection, input = records.len()))]
pub fn merge_positioned(collection: Collection, records: Vec<(usize, Offering)>) -> MergeResult {
    let mut merged: Vec<Offering> = Vec::new();
    let mut merged_ids: Vec<Vec<String>> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut dropped = Vec::new();

    for (index, record) in records {
        let Some(key) = record.key().map(str::to_string) else {
            debug!(index, "record has no slug or id; dropped");
            dropped.push(DroppedRecord { collection, index });
            continue;
        };

        match positions.get(&key) {
            Some(&pos) => {
                merged_ids[pos].push(record.id.clone());
                merge_into(&mut merged[pos], record);
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(record);
                merged_ids.push(Vec::new());
            }
        }
    }

    let merges: Vec<DuplicateMerge> = merged
        .iter()
        .zip(merged_ids)
        .filter(|(_, ids)| !ids.is_empty())
        .map(|(record, ids)| DuplicateMerge {
            collection,
            slug: record.key().unwrap_or_default().to_string(),
            kept_id: record.id.clone(),
            merged_ids: ids,
        })
        .collect();

    // Stable: ties keep first-seen order.
    merged.sort_by(|a, b| a.sort_order().total_cmp(&b.sort_order()));

    if !merges.is_empty() || !dropped.is_empty() {
        info!(
            output = merged.len(),
            merges = merges.len(),
            dropped = dropped.len(),
            "collapsed duplicates"
        );
    }

    MergeResult {
        records: merged,
        merges,
        dropped,
    }
}

/// Fold `incoming` into `existing`.
///
/// - scalars take the incoming value only when it is non-empty
/// - `outcomes`, `modules`, `includes`, `tags` become the order-preserving union
/// - `hero`, `format`, `price`, `ctas`, `seo` are replaced whole when present
/// - everything else takes the incoming value when it is non-empty
///
/// `id` and `slug` stay those of the first-seen record.
pub fn merge_into(existing: &mut Offering, incoming: Offering) {
    take_non_empty(&mut existing.title, incoming.title);

    union(&mut existing.outcomes, incoming.outcomes);
    union(&mut existing.modules, incoming.modules);
    union(&mut existing.includes, incoming.includes);
    union(&mut existing.tags, incoming.tags);

    replace_if_present(&mut existing.hero, incoming.hero);
    replace_if_present(&mut existing.format, incoming.format);
    replace_if_present(&mut existing.price, incoming.price);
    replace_if_present(&mut existing.ctas, incoming.ctas);
    replace_if_present(&mut existing.seo, incoming.seo);
    replace_if_present(&mut existing.order, incoming.order);
    replace_if_present(&mut existing.published, incoming.published);

    if !incoming.testimonial_refs.is_empty() {
        existing.testimonial_refs = incoming.testimonial_refs;
    }
    if !incoming.faq.is_empty() {
        existing.faq = incoming.faq;
    }

    for (key, value) in incoming.extra {
        if !is_blank(&value) {
            existing.extra.insert(key, value);
        }
    }
}

fn take_non_empty(existing: &mut String, incoming: String) {
    if !incoming.trim().is_empty() {
        *existing = incoming;
    }
}

fn replace_if_present<T>(existing: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *existing = incoming;
    }
}

/// First occurrence wins, including repeats already inside `existing`.
fn union<T: PartialEq>(existing: &mut Vec<T>, incoming: Vec<T>) {
    let mut result: Vec<T> = Vec::with_capacity(existing.len() + incoming.len());
    for item in std::mem::take(existing).into_iter().chain(incoming) {
        if !result.contains(&item) {
            result.push(item);
        }
    }
    *existing = result;
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
