use crate::core::error::HullError;
use crate::core::structure::Structure;
use crate::io::store::{DocumentStore, QueryFilter};
use serde::Serialize;

/// Where a chemical potential came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChemicalPotentialSource {
    /// Lowest-energy elemental document of the store, by id.
    Document(String),
    /// Supplied by the caller.
    Manual,
}

/// Reference energy of one element of the composition.
#[derive(Debug, Clone, Serialize)]
pub struct ChemicalPotential {
    pub element: String,
    pub enthalpy_per_atom: f64,
    /// Unknown for manual references.
    pub volume_per_atom: Option<f64>,
    pub source: ChemicalPotentialSource,
    /// Set on the first (guest) element only: the left boundary of any
    /// intercalation path, where guest per host diverges.
    pub infinite_dilution: bool,
    /// The end member that enters the point cloud.
    pub reference: Structure,
}

impl ChemicalPotential {
    /// Builds references straight from caller energies.
    ///
    /// Positive energies are negated so every formation energy is measured
    /// against an exothermic reference.
    pub fn from_overrides(elements: &[String], energies: &[f64]) -> Result<Vec<Self>, HullError> {
        if elements.len() != energies.len() {
            return Err(HullError::ChemicalPotentialCount {
                expected: elements.len(),
                got: energies.len(),
            });
        }
        let chempots: Vec<Self> = elements
            .iter()
            .zip(energies)
            .enumerate()
            .map(|(i, (element, &energy))| {
                let energy = if energy > 0.0 { -energy } else { energy };
                let mut reference = Structure::new(
                    format!("command line {}", element),
                    vec![(element.clone(), 1.0)],
                    energy,
                    1,
                    1,
                    0.0,
                );
                reference.enthalpy_per_atom = energy;
                Self {
                    element: element.clone(),
                    enthalpy_per_atom: energy,
                    volume_per_atom: None,
                    source: ChemicalPotentialSource::Manual,
                    infinite_dilution: i == 0,
                    reference,
                }
            })
            .collect();

        log::info!(
            "Using custom energies of {} eV/atom as chemical potentials.",
            chempots
                .iter()
                .map(|mu| format!("{} ({})", mu.enthalpy_per_atom, mu.element))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(chempots)
    }

    fn from_document(doc: Structure, element: &str, index: usize) -> Self {
        let volume_per_atom = if doc.num_atoms > 0 {
            Some(doc.cell_volume / doc.num_atoms as f64)
        } else {
            None
        };
        Self {
            element: element.to_string(),
            enthalpy_per_atom: doc.enthalpy_per_atom,
            volume_per_atom,
            source: ChemicalPotentialSource::Document(doc.id.clone()),
            infinite_dilution: index == 0,
            reference: doc,
        }
    }
}

/// Finds one reference energy per element, in composition order.
pub struct ChemicalPotentialResolver<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    filter: &'a QueryFilter,
}

impl<'a, S: DocumentStore + ?Sized> ChemicalPotentialResolver<'a, S> {
    pub fn new(store: &'a S, filter: &'a QueryFilter) -> Self {
        Self { store, filter }
    }

    /// Resolves the references, preferring `overrides` when given.
    ///
    /// A missing reference aborts the whole hull: no partial hull is built.
    pub fn resolve(
        &self,
        elements: &[String],
        overrides: Option<&[f64]>,
    ) -> Result<Vec<ChemicalPotential>, HullError> {
        if let Some(energies) = overrides {
            return ChemicalPotential::from_overrides(elements, energies);
        }

        let mut chempots = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            log::info!("Scanning for suitable {} chemical potential...", element);
            let doc = self
                .store
                .lowest_elemental(element, self.filter)?
                .ok_or_else(|| HullError::missing_chemical_potential(element.as_str()))?;
            log::info!("Using {} as chem pot for {}", doc, element);
            chempots.push(ChemicalPotential::from_document(doc, element, index));
        }
        Ok(chempots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;

    fn elements(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    fn elemental(id: &str, element: &str, enthalpy: f64, atoms: u32) -> Structure {
        Structure::new(id, vec![(element.to_string(), 1.0)], enthalpy, atoms, atoms, 20.0 * atoms as f64)
    }

    #[test]
    fn overrides_are_made_exothermic() {
        let mus = ChemicalPotential::from_overrides(&elements(&["K", "P"]), &[1.5, -5.0]).unwrap();
        assert_eq!(mus[0].enthalpy_per_atom, -1.5);
        assert_eq!(mus[1].enthalpy_per_atom, -5.0);
        assert_eq!(mus[0].reference.enthalpy_per_atom, -1.5);
        assert!(mus[0].infinite_dilution);
        assert!(!mus[1].infinite_dilution);
        assert_eq!(mus[1].source, ChemicalPotentialSource::Manual);
        assert!(mus[1].volume_per_atom.is_none());
    }

    #[test]
    fn override_count_must_match() {
        let err = ChemicalPotential::from_overrides(&elements(&["K", "P"]), &[-1.0]).unwrap_err();
        assert!(matches!(err, HullError::ChemicalPotentialCount { expected: 2, got: 1 }));
    }

    #[test]
    fn resolves_from_store_in_composition_order() {
        let store = MemoryStore::new(vec![
            elemental("P-black", "P", -21.6, 4),
            elemental("K-bcc", "K", -2.0, 2),
            elemental("K-fcc", "K", -1.9, 2),
        ]);
        let filter = QueryFilter::default();
        let resolver = ChemicalPotentialResolver::new(&store, &filter);
        let mus = resolver.resolve(&elements(&["K", "P"]), None).unwrap();

        assert_eq!(mus.len(), 2);
        assert_eq!(mus[0].element, "K");
        assert_eq!(mus[0].enthalpy_per_atom, -1.0);
        assert_eq!(mus[0].source, ChemicalPotentialSource::Document("K-bcc".into()));
        assert_eq!(mus[0].volume_per_atom, Some(20.0));
        assert!(mus[0].infinite_dilution);
        assert_eq!(mus[1].enthalpy_per_atom, -5.4);
    }

    #[test]
    fn missing_reference_is_fatal() {
        let store = MemoryStore::new(vec![elemental("K-bcc", "K", -2.0, 2)]);
        let filter = QueryFilter::default();
        let resolver = ChemicalPotentialResolver::new(&store, &filter);
        let err = resolver.resolve(&elements(&["K", "P"]), None).unwrap_err();
        match err {
            HullError::MissingChemicalPotential { element } => assert_eq!(element, "P"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn overrides_skip_the_store() {
        let store = MemoryStore::default();
        let filter = QueryFilter::default();
        let resolver = ChemicalPotentialResolver::new(&store, &filter);
        let mus = resolver.resolve(&elements(&["K", "P"]), Some(&[-1.0, -5.4])).unwrap();
        assert_eq!(mus[1].enthalpy_per_atom, -5.4);
    }
}
