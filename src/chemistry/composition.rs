use crate::chemistry::elements::gravimetric_capacity;
use crate::chemistry::potentials::ChemicalPotential;
use crate::core::error::HullError;
use crate::core::structure::{Composed, HullPoint, Structure};
use serde::Serialize;

/// Legacy stand-in for per-host quantities of host-free structures.
pub const HOST_FREE_SENTINEL: f64 = 1.25e6;

// ============================================================================
// COMPOSITION PARSING
// ============================================================================

/// Splits a composition such as `"LiSnS"` into `["Li", "Sn", "S"]`.
///
/// Element order is significant: the first element is the intercalating guest,
/// the remaining ones form the host.
pub fn parse_composition(input: &str) -> Result<Vec<String>, HullError> {
    let trimmed = input.trim();
    let mut elements: Vec<String> = Vec::new();

    for ch in trimmed.chars() {
        if ch.is_ascii_uppercase() {
            elements.push(ch.to_string());
        } else if ch.is_ascii_lowercase() {
            match elements.last_mut() {
                Some(symbol) => symbol.push(ch),
                None => return Err(HullError::invalid_composition(input, "must start with a capital letter")),
            }
        } else {
            return Err(HullError::invalid_composition(input, format!("unexpected character '{}'", ch)));
        }
    }

    if elements.is_empty() {
        return Err(HullError::invalid_composition(input, "no elements given"));
    }
    for (i, symbol) in elements.iter().enumerate() {
        if elements[..i].contains(symbol) {
            return Err(HullError::invalid_composition(input, format!("{} repeated", symbol)));
        }
    }
    Ok(elements)
}

// ============================================================================
// STAGE RECORD
// ============================================================================

/// Quantities normalized per atom of the host (second) species. Binary only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerHost {
    Normalized { enthalpy_per_b: f64, cell_volume_per_b: f64 },
    /// The structure holds no host atoms (pure guest).
    HostFree,
}

/// A structure placed in composition/energy space.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedStructure {
    pub structure: Structure,
    /// Atomic fractions of every element but the last.
    pub concentration: Vec<f64>,
    pub formation_enthalpy_per_atom: f64,
    /// `None` for ternary hulls.
    pub host: Option<PerHost>,
    /// mAh/g; binary only, `None` for the pure guest.
    pub gravimetric_capacity: Option<f64>,
}

impl NormalizedStructure {
    pub fn hull_point(&self) -> HullPoint {
        HullPoint::new(self.concentration.clone(), self.formation_enthalpy_per_atom)
    }

    pub fn enthalpy_per_b(&self) -> Option<f64> {
        match self.host {
            Some(PerHost::Normalized { enthalpy_per_b, .. }) => Some(enthalpy_per_b),
            _ => None,
        }
    }

    pub fn cell_volume_per_b(&self) -> Option<f64> {
        match self.host {
            Some(PerHost::Normalized { cell_volume_per_b, .. }) => Some(cell_volume_per_b),
            _ => None,
        }
    }

    /// Per-host enthalpy with host-free records mapped to [`HOST_FREE_SENTINEL`].
    pub fn legacy_enthalpy_per_b(&self) -> Option<f64> {
        self.host.map(|host| match host {
            PerHost::Normalized { enthalpy_per_b, .. } => enthalpy_per_b,
            PerHost::HostFree => HOST_FREE_SENTINEL,
        })
    }

    pub fn legacy_cell_volume_per_b(&self) -> Option<f64> {
        self.host.map(|host| match host {
            PerHost::Normalized { cell_volume_per_b, .. } => cell_volume_per_b,
            PerHost::HostFree => HOST_FREE_SENTINEL,
        })
    }

    /// Guest atoms per host atom, `c / (1 - c)`; undefined for the pure guest.
    pub fn guest_per_host(&self) -> Option<f64> {
        guest_per_host(self.concentration.first().copied().unwrap_or(0.0))
    }
}

pub(crate) fn guest_per_host(guest_fraction: f64) -> Option<f64> {
    let host_fraction = 1.0 - guest_fraction;
    if host_fraction <= 1e-12 {
        None
    } else {
        Some(guest_fraction / host_fraction)
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Converts raw structures into concentration and formation-energy coordinates.
pub struct CompositionNormalizer<'a> {
    elements: Vec<&'a str>,
    chempots: &'a [ChemicalPotential],
    /// Molar masses in composition order, when all are tabulated.
    masses: Option<Vec<f64>>,
}

impl<'a> CompositionNormalizer<'a> {
    pub fn new(chempots: &'a [ChemicalPotential]) -> Self {
        let elements: Vec<&str> = chempots.iter().map(|mu| mu.element.as_str()).collect();
        let masses: Option<Vec<f64>> = elements
            .iter()
            .map(|e| crate::chemistry::elements::molar_mass(e))
            .collect();
        if masses.is_none() {
            log::debug!("Molar masses incomplete for {:?}; capacities left undefined.", elements);
        }
        Self {
            elements,
            chempots,
            masses,
        }
    }

    pub fn is_binary(&self) -> bool {
        self.elements.len() == 2
    }

    pub fn normalize(&self, structure: &Structure) -> Result<NormalizedStructure, HullError> {
        let atoms_per_fu = structure.atoms_per_fu();
        if !(atoms_per_fu > 0.0) || !atoms_per_fu.is_finite() {
            return Err(HullError::empty_formula_unit(structure.to_string()));
        }
        if structure.num_atoms == 0 {
            return Err(HullError::malformed_record(structure.to_string(), "num_atoms is zero"));
        }
        if structure.num_fu == 0 {
            return Err(HullError::malformed_record(structure.to_string(), "num_fu is zero"));
        }

        let n = self.elements.len();
        let concentration: Vec<f64> = self.elements[..n - 1]
            .iter()
            .map(|e| structure.count_of(e) / atoms_per_fu)
            .collect();

        let mut formation = structure.enthalpy_per_atom;
        for mu in self.chempots {
            let count = structure.count_of(&mu.element);
            if count > 0.0 {
                formation -= mu.enthalpy_per_atom * count / atoms_per_fu;
            }
        }

        let (host, gravimetric_capacity) = if self.is_binary() {
            let num_b = structure.count_of(self.elements[1]);
            let host = if num_b == 0.0 {
                PerHost::HostFree
            } else {
                let per_b = num_b * structure.num_fu as f64;
                PerHost::Normalized {
                    enthalpy_per_b: structure.enthalpy / per_b,
                    cell_volume_per_b: structure.cell_volume / per_b,
                }
            };
            let capacity = self.masses.as_ref().and_then(|masses| {
                let c = concentration[0];
                gravimetric_capacity(&[c, 1.0 - c], masses)
            });
            (Some(host), capacity)
        } else {
            (None, None)
        };

        Ok(NormalizedStructure {
            structure: structure.clone(),
            concentration,
            formation_enthalpy_per_atom: formation,
            host,
            gravimetric_capacity,
        })
    }

    pub fn normalize_all(&self, structures: &[Structure]) -> Result<Vec<NormalizedStructure>, HullError> {
        structures.iter().map(|s| self.normalize(s)).collect()
    }
}
