use crate::core::error::HullError;
use crate::core::structure::Structure;

/// Quality and tag constraints applied to reference lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    /// Every tag must be present on a matching document.
    pub tags: Vec<String>,
    /// Accept documents flagged with quality 0.
    pub include_poor_quality: bool,
}

impl QueryFilter {
    pub fn with_tags(tags: Vec<String>) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }

    /// Documents without a quality flag count as usable.
    pub fn accepts(&self, doc: &Structure) -> bool {
        let quality_ok = self.include_poor_quality || doc.quality.map_or(true, |q| q > 0);
        quality_ok && self.tags.iter().all(|tag| doc.tags.contains(tag))
    }
}

/// The subset of a structure database the hull engine depends on.
pub trait DocumentStore {
    /// Lowest enthalpy-per-atom document whose composition is exactly
    /// `element`, subject to `filter`.
    fn lowest_elemental(&self, element: &str, filter: &QueryFilter) -> Result<Option<Structure>, HullError>;
}

/// In-memory store over already loaded documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Vec<Structure>,
}

impl MemoryStore {
    pub fn new(documents: Vec<Structure>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[Structure] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn lowest_elemental(&self, element: &str, filter: &QueryFilter) -> Result<Option<Structure>, HullError> {
        let best = self
            .documents
            .iter()
            .filter(|doc| doc.is_elemental(element) && filter.accepts(doc))
            .min_by(|a, b| a.enthalpy_per_atom.total_cmp(&b.enthalpy_per_atom));
        Ok(best.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elemental(id: &str, element: &str, enthalpy_per_atom: f64) -> Structure {
        Structure::new(id, vec![(element.to_string(), 1.0)], enthalpy_per_atom * 2.0, 2, 2, 30.0)
    }

    #[test]
    fn picks_lowest_enthalpy_elemental_document() {
        let mut poor = elemental("Li-poor", "Li", -2.5);
        poor.quality = Some(0);
        let store = MemoryStore::new(vec![
            elemental("Li-fcc", "Li", -1.8),
            elemental("Li-bcc", "Li", -1.9),
            poor,
            Structure::new("LiP", vec![("Li".into(), 1.0), ("P".into(), 1.0)], -10.0, 2, 1, 30.0),
        ]);
        let best = store.lowest_elemental("Li", &QueryFilter::default()).unwrap().unwrap();
        assert_eq!(best.id, "Li-bcc");

        let relaxed = QueryFilter {
            include_poor_quality: true,
            ..QueryFilter::default()
        };
        let best = store.lowest_elemental("Li", &relaxed).unwrap().unwrap();
        assert_eq!(best.id, "Li-poor");

        assert!(store.lowest_elemental("P", &QueryFilter::default()).unwrap().is_none());
    }

    #[test]
    fn zero_count_documents_never_become_references() {
        let ghost = Structure::new("Li-ghost", vec![("Li".to_string(), 0.0)], -50.0, 1, 1, 10.0);
        let store = MemoryStore::new(vec![ghost.clone(), elemental("Li-bcc", "Li", -1.9)]);
        assert_eq!(store.lowest_elemental("Li", &QueryFilter::default()).unwrap().unwrap().id, "Li-bcc");

        let store = MemoryStore::new(vec![ghost]);
        assert!(store.lowest_elemental("Li", &QueryFilter::default()).unwrap().is_none());
    }

    #[test]
    fn tags_must_all_match() {
        let mut tagged = elemental("Sn-alpha", "Sn", -3.9);
        tagged.tags = vec!["pbe".into(), "ultrasoft".into()];
        let store = MemoryStore::new(vec![tagged, elemental("Sn-beta", "Sn", -4.0)]);

        let filter = QueryFilter::with_tags(vec!["pbe".into()]);
        assert_eq!(store.lowest_elemental("Sn", &filter).unwrap().unwrap().id, "Sn-alpha");

        let filter = QueryFilter::with_tags(vec!["pbe".into(), "paw".into()]);
        assert!(store.lowest_elemental("Sn", &filter).unwrap().is_none());
    }
}
