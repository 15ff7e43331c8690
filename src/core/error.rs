//! Error types for phase-diagram construction.
//!
//! Every fatal condition of the pipeline maps onto one variant. Degenerate
//! hull geometry is *not* an error: it is reported through
//! [`HullResult::SolverFailure`](crate::analysis::hull::HullResult::SolverFailure).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HullError {
    /// No elemental reference could be found for one of the hull elements.
    #[error("no possible chemical potential found for {element}")]
    MissingChemicalPotential { element: String },

    /// Manual chemical potentials do not line up with the composition.
    #[error("expected {expected} chemical potentials for the composition, got {got}")]
    ChemicalPotentialCount { expected: usize, got: usize },

    /// Ternary hulls are only meaningful over the intersection of compositions.
    #[error("ternary hulls must be queried with --intersection")]
    TernaryWithoutIntersection,

    /// `hull_cutoff` and `hull_temp` are mutually exclusive.
    #[error("hull_cutoff and hull_temp both specified")]
    ConflictingCutoff,

    #[error("hulls are limited to binary and ternary compositions, got {0} elements")]
    UnsupportedComposition(usize),

    #[error("invalid composition '{input}': {detail}")]
    InvalidComposition { input: String, detail: String },

    /// A record whose stoichiometry sums to zero atoms.
    #[error("structure '{id}' has no atoms per formula unit")]
    EmptyFormulaUnit { id: String },

    /// Cell counts that make per-atom or per-host quantities undefined.
    #[error("structure '{id}' is malformed: {detail}")]
    MalformedRecord { id: String, detail: String },

    #[error("no molar mass tabulated for element '{0}'")]
    UnknownElement(String),
}

impl HullError {
    pub fn missing_chemical_potential(element: impl Into<String>) -> Self {
        Self::MissingChemicalPotential {
            element: element.into(),
        }
    }

    pub fn invalid_composition(input: &str, detail: impl Into<String>) -> Self {
        Self::InvalidComposition {
            input: input.to_string(),
            detail: detail.into(),
        }
    }

    pub fn empty_formula_unit(id: impl Into<String>) -> Self {
        Self::EmptyFormulaUnit { id: id.into() }
    }

    pub fn malformed_record(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            id: id.into(),
            detail: detail.into(),
        }
    }
}
