use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TRAITS
// ============================================================================

/// Anything that can be located by its ordered stoichiometry.
pub trait Composed {
    fn stoichiometry(&self) -> &[(String, f64)];

    /// Number of atoms in one formula unit.
    fn atoms_per_fu(&self) -> f64 {
        self.stoichiometry().iter().map(|(_, count)| count).sum()
    }

    /// Count of `element` in one formula unit (0 if absent).
    fn count_of(&self, element: &str) -> f64 {
        self.stoichiometry()
            .iter()
            .filter(|(symbol, _)| symbol == element)
            .map(|(_, count)| count)
            .sum()
    }

    /// Renders the formula, e.g. `Li2SnS3`.
    fn formula(&self) -> String {
        formula(self.stoichiometry())
    }
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// A computed crystal structure as stored in the document store.
///
/// Records are immutable once loaded; every derived quantity lives on the
/// stage records produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Human readable identifier (e.g. `"KSnS-3a1b"`).
    #[serde(default)]
    pub id: String,
    pub stoichiometry: Vec<(String, f64)>,
    /// Total enthalpy of the cell (eV).
    pub enthalpy: f64,
    /// Derived from `enthalpy` by the parser when absent.
    #[serde(default)]
    pub enthalpy_per_atom: f64,
    /// Cell volume (Å³).
    #[serde(default)]
    pub cell_volume: f64,
    pub num_atoms: u32,
    pub num_fu: u32,

    // --- Store metadata ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_group: Option<String>,
    /// Curation flag; `Some(0)` marks a structure as unusable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Structure {
    /// Minimal constructor used for synthesized references and fixtures.
    pub fn new(
        id: impl Into<String>,
        stoichiometry: Vec<(String, f64)>,
        enthalpy: f64,
        num_atoms: u32,
        num_fu: u32,
        cell_volume: f64,
    ) -> Self {
        let enthalpy_per_atom = if num_atoms > 0 {
            enthalpy / num_atoms as f64
        } else {
            0.0
        };
        Self {
            id: id.into(),
            stoichiometry,
            enthalpy,
            enthalpy_per_atom,
            cell_volume,
            num_atoms,
            num_fu,
            space_group: None,
            quality: None,
            tags: Vec::new(),
        }
    }

    /// Distinct element symbols, in stoichiometry order.
    pub fn elements(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.stoichiometry.len());
        for (symbol, _) in &self.stoichiometry {
            if !seen.contains(&symbol.as_str()) {
                seen.push(symbol);
            }
        }
        seen
    }

    /// True when the structure contains exactly `element` and nothing else.
    pub fn is_elemental(&self, element: &str) -> bool {
        self.count_of(element) > 0.0
            && self
                .stoichiometry
                .iter()
                .all(|(symbol, count)| symbol == element || *count == 0.0)
    }
}

impl Composed for Structure {
    fn stoichiometry(&self) -> &[(String, f64)] {
        &self.stoichiometry
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.formula())
        } else {
            write!(f, "{} ({})", self.formula(), self.id)
        }
    }
}

/// Geometric projection of a structure used by the hull algorithms.
#[derive(Debug, Clone, PartialEq)]
pub struct HullPoint {
    pub concentration: Vec<f64>,
    pub formation_enthalpy_per_atom: f64,
}

impl HullPoint {
    pub fn new(concentration: Vec<f64>, formation_enthalpy_per_atom: f64) -> Self {
        Self {
            concentration,
            formation_enthalpy_per_atom,
        }
    }

    /// Concentration along axis `i`, 0 when the axis is absent.
    pub fn coord(&self, i: usize) -> f64 {
        self.concentration.get(i).copied().unwrap_or(0.0)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Formats a stoichiometry as a chemical formula.
pub fn formula(stoichiometry: &[(String, f64)]) -> String {
    let mut out = String::new();
    for (symbol, count) in stoichiometry {
        if *count == 0.0 {
            continue;
        }
        out.push_str(symbol);
        if (*count - 1.0).abs() > f64::EPSILON {
            if count.fract() == 0.0 {
                out.push_str(&format!("{}", *count as i64));
            } else {
                out.push_str(&format!("{}", count));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stoich(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(s, c)| (s.to_string(), *c)).collect()
    }

    #[test]
    fn formula_omits_unit_counts() {
        assert_eq!(formula(&stoich(&[("Li", 2.0), ("Sn", 1.0), ("S", 3.0)])), "Li2SnS3");
        assert_eq!(formula(&stoich(&[("Li", 0.5), ("P", 1.0)])), "Li0.5P");
    }

    #[test]
    fn counts_and_elemental_checks() {
        let s = Structure::new("x", stoich(&[("Li", 3.0), ("P", 1.0)]), -20.0, 8, 2, 80.0);
        assert_eq!(s.atoms_per_fu(), 4.0);
        assert_eq!(s.count_of("P"), 1.0);
        assert_eq!(s.count_of("Sn"), 0.0);
        assert_eq!(s.enthalpy_per_atom, -2.5);
        assert!(!s.is_elemental("Li"));

        let li = Structure::new("li", stoich(&[("Li", 1.0)]), -3.8, 2, 2, 40.0);
        assert!(li.is_elemental("Li"));
        assert!(!li.is_elemental("P"));
        assert_eq!(li.elements(), vec!["Li"]);
    }

    #[test]
    fn zero_count_documents_are_not_elemental() {
        let empty = Structure::new("empty", stoich(&[("Li", 0.0)]), -1.0, 1, 1, 10.0);
        assert!(!empty.is_elemental("Li"));

        // A zero-count entry for another element does not disqualify.
        let padded = Structure::new("padded", stoich(&[("Li", 1.0), ("P", 0.0)]), -1.9, 1, 1, 20.0);
        assert!(padded.is_elemental("Li"));
    }

    #[test]
    fn structure_deserializes_from_document() {
        let json = r#"{
            "id": "LiP-abc",
            "stoichiometry": [["Li", 1], ["P", 1]],
            "enthalpy": -10.0,
            "enthalpy_per_atom": -2.5,
            "cell_volume": 60.0,
            "num_atoms": 4,
            "num_fu": 2,
            "tags": ["pbe"]
        }"#;
        let s: Structure = serde_json::from_str(json).unwrap();
        assert_eq!(s.formula(), "LiP");
        assert_eq!(s.quality, None);
        assert_eq!(s.tags, vec!["pbe".to_string()]);
    }
}
