//! Post-merge schema checks on canonical offerings.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use contentsync_shared::{Collection, Offering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub collection: Collection,
    /// `slug ?? id` of the offending record.
    pub id: String,
    pub field: String,
    pub message: String,
}

/// Check one merged collection.
///
/// `testimonial_ids` holds every testimonial id in the dataset; refs that are
/// not in it cannot resolve.
pub fn validate_offerings(
    collection: Collection,
    records: &[Offering],
    testimonial_ids: &HashSet<String>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut slugs: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let id = record.key().unwrap_or_default();
        let mut issue = |field: String, message: String| {
            issues.push(ValidationIssue {
                collection,
                id: id.to_string(),
                field,
                message,
            });
        };

        for (field, value) in [
            ("id", &record.id),
            ("slug", &record.slug),
            ("title", &record.title),
        ] {
            if value.trim().is_empty() {
                issue(field.to_string(), format!("{field} is empty"));
            }
        }

        if !record.slug.is_empty() {
            let seen = slugs.entry(record.slug.as_str()).or_default();
            *seen += 1;
            if *seen == 2 {
                issue(
                    "slug".into(),
                    format!("slug '{}' is not unique in {collection}", record.slug),
                );
            }
        }

        for (i, item) in record.faq.items.iter().enumerate() {
            if item.q.trim().is_empty() {
                issue(format!("faq.items[{i}].q"), "FAQ item has no question".into());
            }
        }

        for reference in &record.testimonial_refs {
            if !testimonial_ids.contains(reference) {
                issue(
                    "testimonialRefs".into(),
                    format!("testimonial '{reference}' does not exist"),
                );
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offering(value: serde_json::Value) -> Offering {
        serde_json::from_value(value).unwrap()
    }

    fn ids(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_record_has_no_issues() {
        let records = vec![offering(json!({
            "id": "p1", "slug": "lab", "title": "Lab",
            "testimonialRefs": ["t1"],
            "faq": {"title": "", "subtitle": "", "items": [{"q": "Q", "a": "A"}]}
        }))];
        assert!(validate_offerings(Collection::Programs, &records, &ids(&["t1"])).is_empty());
    }

    #[test]
    fn reports_each_problem() {
        let records = vec![
            offering(json!({
                "id": "p1", "slug": "lab", "title": "",
                "testimonialRefs": ["t9"],
                "faq": {"title": "", "subtitle": "", "items": [{"q": "", "a": "Orphan answer"}]}
            })),
            offering(json!({"id": "p2", "slug": "lab", "title": "Copy"})),
        ];
        let issues = validate_offerings(Collection::Programs, &records, &HashSet::new());
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "faq.items[0].q", "testimonialRefs", "slug"]);
        assert!(issues.iter().all(|i| i.id == "lab"));
    }

    #[test]
    fn missing_identity_fields() {
        let records = vec![offering(json!({"slug": "lab", "title": "Lab"}))];
        let issues = validate_offerings(Collection::Solutions, &records, &HashSet::new());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "id");
        assert_eq!(issues[0].message, "id is empty");
    }
}
