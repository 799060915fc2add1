//! Annotation aggregation: folds a component's sequence-similarity hits
//! into a per-tag index and a per-unitig annotation list.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Substituted for a hit's `general`/`specific` tag when neither the tag nor
/// its header fallback carried a non-empty value.
pub const EMPTY_TAG: &str = "<EMPTY>";

/// One sequence-similarity hit against a unitig.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub unitig_id: usize,
    pub e_value: f64,
    pub general: String,
    pub specific: String,
}

impl Hit {
    /// Builds a hit using the three-tier fallback for `general`/`specific`:
    /// the explicit tag if the upstream tool supplied one (even an empty
    /// string counts as supplied), else the raw hit `header`, and only if
    /// that final value is itself empty does it become [`EMPTY_TAG`] (with a
    /// warning).
    pub fn new(
        unitig_id: usize,
        e_value: f64,
        header: &str,
        general: Option<&str>,
        specific: Option<&str>,
    ) -> Self {
        let general = resolve_tag(unitig_id, "general", header, general);
        let specific = resolve_tag(unitig_id, "specific", header, specific);
        Self {
            unitig_id,
            e_value,
            general,
            specific,
        }
    }
}

/// `explicit`, if supplied (even empty), wins; otherwise falls back to
/// `header`. Only substitutes [`EMPTY_TAG`] once that resolved value is
/// itself empty.
fn resolve_tag(unitig_id: usize, tag_name: &str, header: &str, explicit: Option<&str>) -> String {
    let candidate = explicit.unwrap_or(header);
    if candidate.is_empty() {
        log::warn!(
            "hit on unitig {unitig_id} has an empty '{tag_name}' tag (header {header:?}), substituting {EMPTY_TAG}"
        );
        EMPTY_TAG.to_string()
    } else {
        candidate.to_string()
    }
}

/// Aggregate state for one `general` tag across a component.
#[derive(Debug, Clone, Serialize)]
pub struct TagEntry {
    pub unitig_ids: BTreeSet<usize>,
    pub min_e_value: f64,
    pub representative_hit: Hit,
}

/// The JSON-serializable projection of an [`AnnotationRecord`], consumed by
/// the external headless-renderer process: tags in stable
/// insertion order and the per-unitig annotation lists keyed by unitig id.
#[derive(Debug, Serialize)]
pub struct AnnotationSnapshot<'a> {
    pub tags: &'a [String],
    pub by_tag: &'a [TagEntry],
    pub by_unitig: Vec<UnitigAnnotation>,
}

#[derive(Debug, Serialize)]
pub struct UnitigAnnotation {
    pub unitig_id: usize,
    pub tags: Vec<(usize, f64)>,
}

/// Per-component annotation state: the stable-order tag index, the
/// per-tag aggregate, and the per-unitig tag/e-value list.
#[derive(Debug, Default)]
pub struct AnnotationRecord {
    tag_order: Vec<String>,
    tag_index_of: HashMap<String, usize>,
    by_tag: Vec<TagEntry>,
    by_unitig: HashMap<usize, Vec<(usize, f64)>>,
}

impl AnnotationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one hit into the record: resolves (or creates) the hit's tag
    /// id, updates `byTag`, and updates `byUnitig` with the elementwise
    /// minimum e-value for that tag.
    pub fn add_hit(&mut self, hit: Hit) {
        let tag_id = match self.tag_index_of.get(&hit.general) {
            Some(&id) => id,
            None => {
                let id = self.tag_order.len();
                self.tag_order.push(hit.general.clone());
                self.tag_index_of.insert(hit.general.clone(), id);
                self.by_tag.push(TagEntry {
                    unitig_ids: BTreeSet::new(),
                    min_e_value: hit.e_value,
                    representative_hit: hit.clone(),
                });
                id
            }
        };

        let entry = &mut self.by_tag[tag_id];
        entry.unitig_ids.insert(hit.unitig_id);
        if hit.e_value < entry.min_e_value {
            entry.min_e_value = hit.e_value;
            entry.representative_hit = hit.clone();
        }

        let per_unitig = self.by_unitig.entry(hit.unitig_id).or_default();
        match per_unitig.iter_mut().find(|(t, _)| *t == tag_id) {
            Some(existing) if hit.e_value < existing.1 => existing.1 = hit.e_value,
            Some(_) => {}
            None => per_unitig.push((tag_id, hit.e_value)),
        }
    }

    /// Tags in insertion order; `tag_order()[tag_id]` is the tag string.
    pub fn tag_order(&self) -> &[String] {
        &self.tag_order
    }

    /// The tag id a tag string was assigned, if it has appeared in a hit.
    pub fn tag_id(&self, tag: &str) -> Option<usize> {
        self.tag_index_of.get(tag).copied()
    }

    pub fn by_tag(&self) -> &[TagEntry] {
        &self.by_tag
    }

    pub fn by_unitig(&self, unitig_id: usize) -> Option<&[(usize, f64)]> {
        self.by_unitig.get(&unitig_id).map(Vec::as_slice)
    }

    /// A serializable snapshot of this record, for handing a component's
    /// annotations to the external renderer as JSON rather than the
    /// HTML/JS template substitution an external renderer owns.
    pub fn snapshot(&self) -> AnnotationSnapshot<'_> {
        let mut by_unitig: Vec<UnitigAnnotation> = self
            .by_unitig
            .iter()
            .map(|(&unitig_id, tags)| UnitigAnnotation {
                unitig_id,
                tags: tags.clone(),
            })
            .collect();
        by_unitig.sort_by_key(|u| u.unitig_id);
        AnnotationSnapshot {
            tags: &self.tag_order,
            by_tag: &self.by_tag,
            by_unitig,
        }
    }

    /// Renders [`Self::snapshot`] as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two hits on unitigs 4 and 7, tag "gyrA".
    #[test]
    fn aggregates_min_e_value_and_per_unitig_lists() {
        let mut record = AnnotationRecord::new();
        record.add_hit(Hit::new(4, 1e-20, "hdr4", Some("gyrA"), Some("gyrA_frag1")));
        record.add_hit(Hit::new(7, 1e-50, "hdr7", Some("gyrA"), Some("gyrA_frag2")));

        let tag_id = record.tag_id("gyrA").unwrap();
        assert_eq!(tag_id, 0);
        let entry = &record.by_tag()[0];
        assert_eq!(entry.min_e_value, 1e-50);
        assert_eq!(entry.unitig_ids, BTreeSet::from([4, 7]));

        assert_eq!(record.by_unitig(4).unwrap(), &[(0, 1e-20)]);
        assert_eq!(record.by_unitig(7).unwrap(), &[(0, 1e-50)]);
    }

    #[test]
    fn missing_tags_fall_back_to_the_header() {
        let mut record = AnnotationRecord::new();
        record.add_hit(Hit::new(1, 1e-10, "contig_7 partial", None, None));
        let tag_id = record.tag_id("contig_7 partial").unwrap();
        assert_eq!(tag_id, 0);
    }

    #[test]
    fn missing_tag_and_empty_header_substitute_empty_marker() {
        let mut record = AnnotationRecord::new();
        record.add_hit(Hit::new(1, 1e-10, "", None, None));
        assert_eq!(record.tag_id(EMPTY_TAG), Some(0));
    }

    #[test]
    fn explicit_empty_tag_substitutes_empty_marker_even_with_a_header() {
        let mut record = AnnotationRecord::new();
        record.add_hit(Hit::new(1, 1e-10, "contig_7 partial", Some(""), None));
        assert_eq!(record.tag_id(EMPTY_TAG), Some(0));
    }

    #[test]
    fn repeated_hit_on_same_unitig_and_tag_keeps_the_lower_e_value() {
        let mut record = AnnotationRecord::new();
        record.add_hit(Hit::new(1, 1e-10, "hdr", Some("ampC"), Some("x")));
        record.add_hit(Hit::new(1, 1e-30, "hdr", Some("ampC"), Some("y")));
        assert_eq!(record.by_unitig(1).unwrap(), &[(0, 1e-30)]);
    }

    #[test]
    fn new_tags_get_the_next_sequential_id() {
        let mut record = AnnotationRecord::new();
        record.add_hit(Hit::new(1, 1e-10, "hdr", Some("first"), None));
        record.add_hit(Hit::new(2, 1e-10, "hdr", Some("second"), None));
        record.add_hit(Hit::new(3, 1e-10, "hdr", Some("first"), None));
        assert_eq!(record.tag_order(), &["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut record = AnnotationRecord::new();
        record.add_hit(Hit::new(4, 1e-20, "hdr", Some("gyrA"), Some("gyrA_frag1")));
        let json = record.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tags"][0], "gyrA");
        assert_eq!(value["by_unitig"][0]["unitig_id"], 4);
    }
}
