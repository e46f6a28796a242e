//! Offering and testimonial normalization.
//!
//! Each field rule runs independently against the raw record: a rule reads
//! its legacy keys, removes them, and sets the canonical field. Whatever no
//! rule claims is carried in `extra`, so a canonical record comes back out
//! unchanged.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use contentsync_shared::{
    Author, ContentSyncError, Cta, Faq, Format, Hero, Offering, Price, Result, Seo, Testimonial,
};

use crate::faq::{FaqChange, normalize_faq, normalize_items};

// ---------------------------------------------------------------------------
// Audit types
// ---------------------------------------------------------------------------

/// A legacy-to-canonical field mapping that fired for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldMapping {
    #[serde(rename = "howItWorks→modules")]
    HowItWorksToModules,
    #[serde(rename = "faqs→faq")]
    FaqsToFaq,
    #[serde(rename = "format_legacy→format")]
    LegacyFormat,
    #[serde(rename = "price-coercion")]
    PriceCoercion,
    #[serde(rename = "ctas")]
    Ctas,
}

impl FieldMapping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HowItWorksToModules => "howItWorks→modules",
            Self::FaqsToFaq => "faqs→faq",
            Self::LegacyFormat => "format_legacy→format",
            Self::PriceCoercion => "price-coercion",
            Self::Ctas => "ctas",
        }
    }
}

impl std::fmt::Display for FieldMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What normalization did to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationAudit {
    /// `slug ?? id` of the record (empty when it has neither).
    pub id: String,
    pub faq: FaqChange,
    pub mappings: Vec<FieldMapping>,
}

impl NormalizationAudit {
    /// Whether the canonical record differs from the raw one in any way the
    /// audit tracks.
    pub fn changed(&self) -> bool {
        self.faq != FaqChange::Unchanged || !self.mappings.is_empty()
    }
}

/// A canonical offering plus its audit entry.
#[derive(Debug, Clone)]
pub struct NormalizedOffering {
    pub offering: Offering,
    pub audit: NormalizationAudit,
}

// ---------------------------------------------------------------------------
// Offering
// ---------------------------------------------------------------------------

/// Map one raw program/experience/solution record to the canonical shape.
///
/// Fails only when the record is not a JSON object.
pub fn normalize_offering(raw: &Value) -> Result<NormalizedOffering> {
    let Value::Object(fields) = raw else {
        return Err(ContentSyncError::validation(format!(
            "offering record is not a JSON object: {raw}"
        )));
    };
    let mut map = fields.clone();
    let mut mappings = Vec::new();

    let id = take_string(&mut map, "id");
    let slug = take_string(&mut map, "slug");
    let title = take_string(&mut map, "title");

    let modules = take_modules(&mut map, &mut mappings);
    let format = take_format(&mut map, &mut mappings);
    let price = take_price(&mut map, &mut mappings);
    let ctas = take_ctas(&mut map, &mut mappings);
    let (faq, faq_change) = take_faq(&mut map, &mut mappings);

    let offering = Offering {
        hero: take_composite::<Hero>(&mut map, "hero"),
        outcomes: take_list(&mut map, "outcomes"),
        includes: take_list(&mut map, "includes"),
        testimonial_refs: take_strings(&mut map, "testimonialRefs"),
        seo: take_composite::<Seo>(&mut map, "seo"),
        order: take_number(&mut map, "order"),
        tags: take_strings(&mut map, "tags"),
        published: take_bool(&mut map, "published"),
        id,
        slug,
        title,
        modules,
        format,
        price,
        ctas,
        faq,
        extra: map,
    };

    let audit = NormalizationAudit {
        id: offering.key().unwrap_or_default().to_string(),
        faq: faq_change,
        mappings,
    };
    if audit.changed() {
        debug!(id = %audit.id, faq = %audit.faq, mappings = ?audit.mappings, "normalized offering");
    }

    Ok(NormalizedOffering { offering, audit })
}

/// `modules` wins when it has entries; otherwise `howItWorks` is rendered into it.
fn take_modules(map: &mut Map<String, Value>, mappings: &mut Vec<FieldMapping>) -> Vec<String> {
    let modules = map.remove("modules");
    let how_it_works = map.remove("howItWorks");

    let rendered = |value: Option<&Value>| -> Vec<String> {
        value
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| render_module(i, item))
                    .collect()
            })
            .unwrap_or_default()
    };

    let current = rendered(modules.as_ref());
    if !current.is_empty() {
        return current;
    }

    let legacy = rendered(how_it_works.as_ref());
    if !legacy.is_empty() {
        mappings.push(FieldMapping::HowItWorksToModules);
    }
    legacy
}

/// Render a module step as `"{step}. {title}: {description}"`.
fn render_module(index: usize, item: &Value) -> Option<String> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(step) => {
            let number = match step.get("step") {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                _ => (index + 1).to_string(),
            };
            let title = step.get("title").and_then(Value::as_str).unwrap_or_default();
            let description = step
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();

            match (title.is_empty(), description.is_empty()) {
                (true, true) => None,
                (false, true) => Some(format!("{number}. {title}")),
                (true, false) => Some(format!("{number}. {description}")),
                (false, false) => Some(format!("{number}. {title}: {description}")),
            }
        }
        _ => None,
    }
}

/// Fold `format` (object or bare delivery string), `format_legacy`, and the
/// top-level `duration` / `location` strings into one `format` object.
fn take_format(map: &mut Map<String, Value>, mappings: &mut Vec<FieldMapping>) -> Option<Format> {
    let mut legacy = false;

    let mut format = match map.remove("format") {
        None | Some(Value::Null) => None,
        Some(Value::String(delivery)) => {
            legacy = true;
            Some(Format {
                delivery: Some(delivery),
                ..Default::default()
            })
        }
        Some(other) => match serde_json::from_value::<Format>(other.clone()) {
            Ok(format) => Some(format),
            Err(e) => {
                warn!(error = %e, "format has an unexpected shape; left as-is");
                map.insert("format".into(), other);
                return None;
            }
        },
    };

    if let Some(Value::String(delivery)) = map.remove("format_legacy") {
        legacy = true;
        let target = format.get_or_insert_with(Format::default);
        if target.delivery.is_none() {
            target.delivery = Some(delivery);
        }
    }

    for key in ["duration", "location"] {
        if !matches!(map.get(key), Some(Value::String(_))) {
            continue;
        }
        let Some(Value::String(value)) = map.remove(key) else {
            continue;
        };
        legacy = true;
        let target = format.get_or_insert_with(Format::default);
        let slot = if key == "duration" {
            &mut target.duration
        } else {
            &mut target.location
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    if legacy {
        mappings.push(FieldMapping::LegacyFormat);
    }
    format
}

/// Coerce string prices to numbers. A bare price is the individual price.
fn take_price(map: &mut Map<String, Value>, mappings: &mut Vec<FieldMapping>) -> Option<Price> {
    let mut coerced = false;

    let price = match map.remove("price") {
        None | Some(Value::Null) => None,
        Some(Value::Object(mut fields)) => {
            let individual = coerce_price_field(&mut fields, "individual", &mut coerced);
            let organization = coerce_price_field(&mut fields, "organization", &mut coerced);
            Some(Price {
                individual,
                organization,
                extra: fields,
            })
        }
        Some(Value::Number(n)) => Some(Price {
            individual: Some(n),
            ..Default::default()
        }),
        Some(Value::String(s)) => match parse_price(&s) {
            Some(n) => {
                coerced = true;
                Some(Price {
                    individual: Some(n),
                    ..Default::default()
                })
            }
            None => {
                warn!(price = %s, "price is not numeric; left as-is");
                map.insert("price".into(), Value::String(s));
                None
            }
        },
        Some(other) => {
            warn!(price = %other, "price has an unexpected shape; left as-is");
            map.insert("price".into(), other);
            None
        }
    };

    if coerced {
        mappings.push(FieldMapping::PriceCoercion);
    }
    price
}

/// Take a numeric price field, parsing strings. Unparseable values stay in
/// `fields` under the same key.
fn coerce_price_field(
    fields: &mut Map<String, Value>,
    key: &str,
    coerced: &mut bool,
) -> Option<Number> {
    match fields.remove(key) {
        Some(Value::Number(n)) => Some(n),
        Some(Value::String(s)) => match parse_price(&s) {
            Some(n) => {
                *coerced = true;
                Some(n)
            }
            None => {
                warn!(field = key, price = %s, "price is not numeric; left as-is");
                fields.insert(key.to_string(), Value::String(s));
                None
            }
        },
        Some(Value::Null) | None => None,
        Some(other) => {
            fields.insert(key.to_string(), other);
            None
        }
    }
}

/// Parse `"$1,200"`, `"1200.50"`, `"€ 90"` into a JSON number. Whole values
/// stay integers.
pub fn parse_price(raw: &str) -> Option<Number> {
    static NOISE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\s$€£,]").expect("valid regex"));

    let cleaned = NOISE_RE.replace_all(raw, "");
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return Some(n.into());
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

/// Normalize each CTA to `{label, url, external}`.
fn take_ctas(map: &mut Map<String, Value>, mappings: &mut Vec<FieldMapping>) -> Option<Vec<Cta>> {
    let items = match map.remove("ctas") {
        None | Some(Value::Null) => return None,
        Some(Value::Array(items)) => items,
        Some(other) => {
            warn!("ctas is not a list; left as-is");
            map.insert("ctas".into(), other);
            return None;
        }
    };

    let mut changed = false;
    let ctas: Vec<Cta> = items
        .iter()
        .filter_map(|item| {
            let cta = normalize_cta(item);
            let same = cta
                .as_ref()
                .and_then(|c| serde_json::to_value(c).ok())
                .is_some_and(|v| &v == item);
            changed |= !same;
            cta
        })
        .collect();

    if changed {
        mappings.push(FieldMapping::Ctas);
    }
    Some(ctas)
}

fn normalize_cta(item: &Value) -> Option<Cta> {
    let Value::Object(fields) = item else {
        return None;
    };
    let mut extra = fields.clone();

    let label = take_canonical_or_alias(&mut extra, "label", &["text", "title"]);
    let url = take_canonical_or_alias(&mut extra, "url", &["pathOrUrl", "href"]);
    let external = match extra.remove("external") {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => url.starts_with("http://") || url.starts_with("https://"),
    };

    Some(Cta {
        label,
        url,
        external,
        extra,
    })
}

/// `faq` wins; `faqs` fills in items when `faq` has none. `faqs` is always
/// removed.
fn take_faq(
    map: &mut Map<String, Value>,
    mappings: &mut Vec<FieldMapping>,
) -> (Faq, FaqChange) {
    let raw = map.remove("faq").filter(|v| !v.is_null());
    let legacy = map.remove("faqs").filter(|v| !v.is_null());

    let Some(legacy) = legacy else {
        return normalize_faq(raw.as_ref());
    };

    match raw {
        None => {
            mappings.push(FieldMapping::FaqsToFaq);
            normalize_faq(Some(&legacy))
        }
        Some(raw) => {
            let (mut faq, change) = normalize_faq(Some(&raw));
            if faq.items.is_empty() {
                let legacy_items = match &legacy {
                    Value::Array(items) => normalize_items(items),
                    other => normalize_faq(Some(other)).0.items,
                };
                if !legacy_items.is_empty() {
                    faq.items = legacy_items;
                    mappings.push(FieldMapping::FaqsToFaq);
                    let change = if change == FaqChange::Unchanged {
                        FaqChange::NormalizedItems
                    } else {
                        change
                    };
                    return (faq, change);
                }
            }
            (faq, change)
        }
    }
}

// ---------------------------------------------------------------------------
// Testimonial
// ---------------------------------------------------------------------------

/// Map a raw testimonial record to the canonical shape.
///
/// `text` falls back to `quote` / `content`, a string author becomes
/// `{name}`, and string ratings and flags are coerced.
pub fn normalize_testimonial(raw: &Value) -> Result<Testimonial> {
    let Value::Object(fields) = raw else {
        return Err(ContentSyncError::validation(format!(
            "testimonial record is not a JSON object: {raw}"
        )));
    };
    let mut map = fields.clone();

    if !map.get("text").is_some_and(Value::is_string) {
        for legacy in ["quote", "content"] {
            if let Some(Value::String(_)) = map.get(legacy) {
                if let Some(text) = map.remove(legacy) {
                    map.insert("text".into(), text);
                }
                break;
            }
        }
    }

    if let Some(Value::String(name)) = map.get("author") {
        let author = Author {
            name: Some(name.clone()),
            ..Default::default()
        };
        map.insert("author".into(), serde_json::to_value(author).unwrap_or_default());
    }

    if let Some(Value::String(rating)) = map.get("rating") {
        match parse_price(rating) {
            Some(n) => {
                map.insert("rating".into(), Value::Number(n));
            }
            None => {
                map.remove("rating");
            }
        }
    }

    for flag in ["featured", "verified"] {
        if let Some(Value::String(s)) = map.get(flag) {
            let b = s.eq_ignore_ascii_case("true");
            map.insert(flag.into(), Value::Bool(b));
        }
    }

    let id = map
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    serde_json::from_value(Value::Object(map))
        .map_err(|e| ContentSyncError::validation(format!("testimonial '{id}': {e}")))
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Take a string field; numbers are stringified. Anything else stays in `map`.
fn take_string(map: &mut Map<String, Value>, key: &str) -> String {
    match map.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            map.insert(key.to_string(), other);
            String::new()
        }
    }
}

fn take_first_string(map: &mut Map<String, Value>, keys: &[&str]) -> String {
    let mut found = String::new();
    for key in keys {
        if let Some(Value::String(s)) = map.get(*key) {
            if found.is_empty() && !s.is_empty() {
                found = s.clone();
            }
            map.remove(*key);
        }
    }
    found
}

/// Take `canonical` alone when it holds a non-empty string, leaving the
/// aliases in place. Otherwise fall back to the aliases and consume them.
fn take_canonical_or_alias(
    map: &mut Map<String, Value>,
    canonical: &str,
    aliases: &[&str],
) -> String {
    match map.get(canonical) {
        Some(Value::String(s)) if !s.is_empty() => {
            let found = s.clone();
            map.remove(canonical);
            found
        }
        _ => {
            let mut keys = vec![canonical];
            keys.extend_from_slice(aliases);
            take_first_string(map, &keys)
        }
    }
}

/// Take a list; a lone scalar becomes a one-element list.
fn take_list(map: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// Take a list of strings; numbers are stringified and other items dropped.
fn take_strings(map: &mut Map<String, Value>, key: &str) -> Vec<String> {
    take_list(map, key)
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

fn take_number(map: &mut Map<String, Value>, key: &str) -> Option<Number> {
    match map.remove(key) {
        Some(Value::Number(n)) => Some(n),
        Some(Value::String(s)) => match parse_price(&s) {
            Some(n) => Some(n),
            None => {
                map.insert(key.to_string(), Value::String(s));
                None
            }
        },
        Some(Value::Null) | None => None,
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
    }
}

fn take_bool(map: &mut Map<String, Value>, key: &str) -> Option<bool> {
    match map.remove(key) {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Some(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Some(false),
        Some(Value::Null) | None => None,
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
    }
}

/// Take a composite object field. A value that does not fit the canonical
/// shape stays in `map` untouched.
fn take_composite<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.remove(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value::<T>(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(field = key, error = %e, "field has an unexpected shape; left as-is");
            map.insert(key.to_string(), value);
            None
        }
    }
}
