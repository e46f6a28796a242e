//! Reference integrity and coverage.
//!
//! References are found through a declared table: fields that hold lists of
//! record ids in a known collection, and fields that hold site routes such as
//! `/programs/<slug>`. Page ids are entry points and always count as used.
//! Path-name heuristics (any string under a field path mentioning `program`,
//! `experience`, `solution` or `slug`) can be switched on as an extra pass.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use contentsync_shared::{Collection, Singleton, Snapshot, str_field};

/// Fields holding lists of ids/slugs in a fixed collection.
const REFERENCE_LISTS: [(&str, Collection); 5] = [
    ("testimonialRefs", Collection::Testimonials),
    ("featuredPrograms", Collection::Programs),
    ("featuredExperiences", Collection::Experiences),
    ("featuredSolutions", Collection::Solutions),
    ("featuredTestimonials", Collection::Testimonials),
];

/// Fields holding site routes.
const ROUTE_FIELDS: [&str; 2] = ["href", "url"];

/// Path fragments the heuristic pass treats as reference-bearing, with the
/// collection each implies. `slug` implies any offering collection.
const PATH_HINTS: [(&str, Option<Collection>); 4] = [
    ("program", Some(Collection::Programs)),
    ("experience", Some(Collection::Experiences)),
    ("solution", Some(Collection::Solutions)),
    ("slug", None),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceOptions {
    /// Also treat strings under reference-sounding field paths as references.
    pub path_heuristics: bool,
}

/// A discovered reference from one document to a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Document the reference was found in (`navigation`, `pages/home`,
    /// `programs/lab`).
    pub source: String,
    /// The value as written.
    pub link: String,
    /// Target collection; `None` means any offering collection.
    pub collection: Option<Collection>,
    /// Id or slug of the target record.
    pub target: String,
}

/// A reference whose target does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingLink {
    pub page: String,
    pub link: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

/// A stored record nothing refers to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Orphan {
    pub collection: Collection,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    /// Distinct references discovered.
    pub references: usize,
    pub used_count: usize,
    pub orphan_count: usize,
    /// Percentage of stored records that are referenced.
    pub coverage: u32,
    pub dangling_links: Vec<DanglingLink>,
    pub orphans: Vec<Orphan>,
}

/// `used / (used + orphans) * 100`, rounded; 100 when there is nothing stored.
pub fn coverage_percent(used: usize, orphans: usize) -> u32 {
    let total = used + orphans;
    if total == 0 {
        return 100;
    }
    ((used as f64 / total as f64) * 100.0).round() as u32
}

/// Discover every reference in the snapshot and classify it.
#[instrument(skip_all, fields(heuristics = options.path_heuristics))]
pub fn check_references(snapshot: &Snapshot, options: &ReferenceOptions) -> CoverageReport {
    let index = RecordIndex::build(snapshot);
    let references = discover_references(snapshot, options);

    let mut used: HashSet<(Collection, String)> = snapshot
        .pages
        .keys()
        .map(|id| (Collection::Pages, id.clone()))
        .collect();
    let mut dangling_links = Vec::new();

    for reference in &references {
        match index.resolve(reference.collection, &reference.target) {
            Some(hit) => {
                used.insert(hit);
            }
            None => {
                debug!(source = %reference.source, link = %reference.link, "dangling reference");
                dangling_links.push(DanglingLink {
                    page: reference.source.clone(),
                    link: reference.link.clone(),
                    kind: reference
                        .collection
                        .map(|c| c.entity_type())
                        .unwrap_or("offering")
                        .to_string(),
                    target: reference.target.clone(),
                });
            }
        }
    }

    let orphans: Vec<Orphan> = index
        .records()
        .filter(|(collection, key)| !used.contains(&(*collection, key.to_string())))
        .map(|(collection, key)| Orphan {
            collection,
            id: key.to_string(),
        })
        .collect();

    let used_count = used.len();
    let report = CoverageReport {
        references: references.len(),
        used_count,
        orphan_count: orphans.len(),
        coverage: coverage_percent(used_count, orphans.len()),
        dangling_links,
        orphans,
    };

    info!(
        references = report.references,
        used = report.used_count,
        orphans = report.orphan_count,
        dangling = report.dangling_links.len(),
        coverage = report.coverage,
        "reference check complete"
    );
    report
}

/// Walk every document and collect distinct references in discovery order.
pub fn discover_references(snapshot: &Snapshot, options: &ReferenceOptions) -> Vec<Reference> {
    let mut seen = HashSet::new();
    let mut references = Vec::new();

    for doc in documents(snapshot) {
        let mut path = Vec::new();
        walk(doc.value, &mut path, &mut |path: &[String], value: &Value| {
            let found = declared_references(&doc.source, path, value).into_iter().chain(
                options
                    .path_heuristics
                    .then(|| heuristic_reference(&doc, path, value))
                    .flatten(),
            );
            for reference in found {
                if seen.insert(reference.clone()) {
                    references.push(reference);
                }
            }
        });
    }

    references
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

struct Document<'a> {
    source: String,
    /// Set for records of list collections, whose root `id` / `slug` are the
    /// record's own identity.
    list_record: bool,
    value: &'a Value,
}

fn documents(snapshot: &Snapshot) -> Vec<Document<'_>> {
    let mut docs = Vec::new();

    for collection in Collection::ALL {
        if collection == Collection::Pages {
            for (id, page) in &snapshot.pages {
                docs.push(Document {
                    source: format!("pages/{id}"),
                    list_record: false,
                    value: page,
                });
            }
            continue;
        }
        for (position, record) in snapshot.records(collection).into_iter().enumerate() {
            let key = str_field(record, "slug")
                .or_else(|| str_field(record, "id"))
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{position}"));
            docs.push(Document {
                source: format!("{collection}/{key}"),
                list_record: true,
                value: record,
            });
        }
    }

    for singleton in Singleton::ALL {
        if let Some(value) = snapshot.singleton(singleton) {
            docs.push(Document {
                source: singleton.id().to_string(),
                list_record: false,
                value,
            });
        }
    }

    docs
}

fn declared_references(source: &str, path: &[String], value: &Value) -> Vec<Reference> {
    let Some(field) = path.last() else {
        return Vec::new();
    };

    if let Some((_, collection)) = REFERENCE_LISTS.iter().find(|(name, _)| *name == field.as_str()) {
        let Some(items) = value.as_array() else {
            return Vec::new();
        };
        return items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Object(_) => str_field(item, "slug")
                    .or_else(|| str_field(item, "id"))
                    .map(str::to_string),
                _ => None,
            })
            .map(|target| Reference {
                source: source.to_string(),
                link: target.clone(),
                collection: Some(*collection),
                target,
            })
            .collect();
    }

    if ROUTE_FIELDS.contains(&field.as_str()) {
        if let Some(link) = value.as_str() {
            return parse_route(link)
                .map(|(collection, target)| Reference {
                    source: source.to_string(),
                    link: link.to_string(),
                    collection: Some(collection),
                    target,
                })
                .into_iter()
                .collect();
        }
    }

    Vec::new()
}

fn heuristic_reference(doc: &Document<'_>, path: &[String], value: &Value) -> Option<Reference> {
    let link = value.as_str()?.trim();
    if link.is_empty() || link.contains(char::is_whitespace) {
        return None;
    }
    if doc.list_record && path.len() == 1 && (path[0] == "id" || path[0] == "slug") {
        return None;
    }

    let rendered = render_path(path).to_lowercase();
    let (_, hint) = PATH_HINTS
        .iter()
        .find(|(fragment, _)| rendered.contains(fragment))?;

    let (collection, target) = match parse_route(link) {
        Some((collection, target)) => (Some(collection), target),
        None => (*hint, link.to_string()),
    };
    Some(Reference {
        source: doc.source.clone(),
        link: link.to_string(),
        collection,
        target,
    })
}

/// Map `/programs/<slug>` style routes (singular or plural, optional query,
/// fragment or trailing slash) to their collection and target.
pub fn parse_route(link: &str) -> Option<(Collection, String)> {
    static ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^/(programs?|experiences?|solutions?|testimonials?)/([^/?#]+)/?(?:[?#].*)?$")
            .expect("valid regex")
    });

    let caps = ROUTE_RE.captures(link.trim())?;
    let collection = Collection::parse(&caps[1])?;
    Some((collection, caps[2].to_string()))
}

fn walk<'a>(value: &'a Value, path: &mut Vec<String>, visit: &mut dyn FnMut(&[String], &'a Value)) {
    visit(path.as_slice(), value);
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                walk(child, path, visit);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(format!("[{i}]"));
                walk(child, path, visit);
                path.pop();
            }
        }
        _ => {}
    }
}

/// `["menu", "[0]", "href"]` renders as `menu[0].href`.
fn render_path(path: &[String]) -> String {
    let mut out = String::new();
    for segment in path {
        if !out.is_empty() && !segment.starts_with('[') {
            out.push('.');
        }
        out.push_str(segment);
    }
    out
}

// ---------------------------------------------------------------------------
// Record index
// ---------------------------------------------------------------------------

/// Stored records of the referenceable collections, addressable by id or slug.
struct RecordIndex {
    /// (collection, canonical key) in collection order.
    keys: BTreeSet<(Collection, String)>,
    /// (collection, id or slug) -> canonical key.
    aliases: HashMap<(Collection, String), String>,
}

impl RecordIndex {
    fn build(snapshot: &Snapshot) -> Self {
        let mut keys = BTreeSet::new();
        let mut aliases = HashMap::new();

        for collection in Collection::ALL {
            if collection == Collection::Pages {
                continue;
            }
            for record in snapshot.records(collection) {
                let slug = str_field(record, "slug");
                let id = str_field(record, "id");
                let Some(key) = slug.or(id) else {
                    continue;
                };
                keys.insert((collection, key.to_string()));
                for alias in [slug, id].into_iter().flatten() {
                    aliases
                        .entry((collection, alias.to_string()))
                        .or_insert_with(|| key.to_string());
                }
            }
        }

        Self { keys, aliases }
    }

    fn resolve(&self, collection: Option<Collection>, target: &str) -> Option<(Collection, String)> {
        let candidates: &[Collection] = match &collection {
            Some(c) => std::slice::from_ref(c),
            None => &Collection::OFFERINGS,
        };
        candidates.iter().find_map(|c| {
            self.aliases
                .get(&(*c, target.to_string()))
                .map(|key| (*c, key.clone()))
        })
    }

    fn records(&self) -> impl Iterator<Item = (Collection, &str)> {
        self.keys.iter().map(|(c, k)| (*c, k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(value: Value) -> Snapshot {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn coverage_arithmetic() {
        assert_eq!(coverage_percent(8, 2), 80);
        assert_eq!(coverage_percent(0, 0), 100);
        assert_eq!(coverage_percent(1, 2), 33);
        assert_eq!(coverage_percent(2, 1), 67);
        assert_eq!(coverage_percent(0, 5), 0);
    }

    #[test]
    fn navigation_to_missing_program_is_dangling() {
        let snapshot = dataset(json!({
            "programs": [{"id": "p1", "slug": "lab", "title": "Lab"}],
            "navigation": {"menu": [
                {"label": "Lab", "href": "/programs/lab"},
                {"label": "Ghost", "href": "/programs/ghost"},
                {"label": "About", "href": "/about"},
                {"label": "Blog", "href": "https://blog.example.com/programs/x"}
            ]}
        }));

        let report = check_references(&snapshot, &ReferenceOptions::default());
        assert_eq!(
            report.dangling_links,
            vec![DanglingLink {
                page: "navigation".into(),
                link: "/programs/ghost".into(),
                kind: "program".into(),
                target: "ghost".into(),
            }]
        );
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn unreferenced_records_are_orphans() {
        let snapshot = dataset(json!({
            "programs": [
                {"id": "p1", "slug": "lab", "testimonialRefs": ["t1"]},
                {"id": "p2", "slug": "retreat"}
            ],
            "testimonials": [{"id": "t1", "text": "A"}, {"id": "t2", "text": "B"}],
            "pages": {"home": {"featuredPrograms": ["lab"]}}
        }));

        let report = check_references(&snapshot, &ReferenceOptions::default());
        assert_eq!(
            report.orphans,
            vec![
                Orphan { collection: Collection::Programs, id: "retreat".into() },
                Orphan { collection: Collection::Testimonials, id: "t2".into() },
            ]
        );
        // home page, lab, t1
        assert_eq!(report.used_count, 3);
        assert_eq!(report.coverage, 60);
        assert!(report.dangling_links.is_empty());
    }

    #[test]
    fn references_resolve_by_id_or_slug() {
        let snapshot = dataset(json!({
            "solutions": [{"id": "s-001", "slug": "teams"}],
            "pages": {"home": {"featuredSolutions": [{"id": "s-001"}]}},
            "settings": {"footer": {"links": [{"url": "/solution/teams/?ref=footer"}]}}
        }));

        let refs = discover_references(&snapshot, &ReferenceOptions::default());
        assert_eq!(refs.len(), 2);
        let report = check_references(&snapshot, &ReferenceOptions::default());
        assert!(report.dangling_links.is_empty());
        assert_eq!(report.orphan_count, 0);
    }

    #[test]
    fn empty_snapshot_has_full_coverage() {
        let report = check_references(&Snapshot::default(), &ReferenceOptions::default());
        assert_eq!(report.coverage, 100);
        assert_eq!(report.references, 0);
    }

    #[test]
    fn heuristics_are_opt_in() {
        let snapshot = dataset(json!({
            "programs": [{"id": "p1", "slug": "lab"}],
            "experiences": [{"id": "e1", "slug": "walk", "relatedProgram": "lab", "nextSlug": "gone"}]
        }));

        let declared = check_references(&snapshot, &ReferenceOptions::default());
        assert_eq!(declared.orphan_count, 2);
        assert!(declared.dangling_links.is_empty());

        let heuristic = check_references(&snapshot, &ReferenceOptions { path_heuristics: true });
        assert_eq!(
            heuristic.orphans,
            vec![Orphan { collection: Collection::Experiences, id: "walk".into() }]
        );
        assert_eq!(heuristic.dangling_links.len(), 1);
        assert_eq!(heuristic.dangling_links[0].kind, "offering");
        assert_eq!(heuristic.dangling_links[0].target, "gone");
    }

    #[test]
    fn heuristics_skip_own_identity() {
        let snapshot = dataset(json!({
            "programs": [{"id": "p1", "slug": "lab", "title": "Program title with spaces"}]
        }));
        let report = check_references(&snapshot, &ReferenceOptions { path_heuristics: true });
        assert_eq!(report.references, 0);
        assert_eq!(report.orphan_count, 1);
    }

    #[test]
    fn route_parsing() {
        assert_eq!(
            parse_route("/programs/lab"),
            Some((Collection::Programs, "lab".to_string()))
        );
        assert_eq!(
            parse_route("/experience/walk#dates"),
            Some((Collection::Experiences, "walk".to_string()))
        );
        assert_eq!(parse_route("/programs"), None);
        assert_eq!(parse_route("/programs/lab/schedule"), None);
        assert_eq!(parse_route("https://example.com/programs/lab"), None);
    }

    #[test]
    fn render_path_formats_indices() {
        let path = vec!["menu".to_string(), "[0]".to_string(), "href".to_string()];
        assert_eq!(render_path(&path), "menu[0].href");
    }
}
