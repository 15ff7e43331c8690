use crate::analysis::hull::{ComputedHull, HullResult, HULL_TOLERANCE};
use crate::chemistry::composition::NormalizedStructure;
use crate::core::structure::HullPoint;
use serde::Serialize;

/// Boltzmann constant (eV/K) for temperature cutoffs.
pub const BOLTZMANN_EV_PER_K: f64 = 8.61733e-5;

/// Distance assigned to every non-vertex in [`TernaryDistanceMode::Legacy`].
pub const LEGACY_OFF_HULL_DISTANCE: f64 = 1.0;

const NEAR_HULL_SLACK: f64 = 1e-12;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// How distances are measured for ternary hulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TernaryDistanceMode {
    /// Vertical distance to the lower envelope across all facets.
    #[default]
    FacetProjection,
    /// Vertices at 0, everything else at [`LEGACY_OFF_HULL_DISTANCE`].
    Legacy,
}

/// Width of the near-hull window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HullCutoff {
    /// eV/atom above the hull.
    Energy(f64),
    /// Kelvin, converted with [`BOLTZMANN_EV_PER_K`].
    Temperature(f64),
}

impl HullCutoff {
    pub fn energy(&self) -> f64 {
        match *self {
            HullCutoff::Energy(ev) => ev,
            HullCutoff::Temperature(kelvin) => kelvin * BOLTZMANN_EV_PER_K,
        }
    }
}

// ============================================================================
// STAGE RECORD
// ============================================================================

/// A normalized structure with its distance above the hull.
#[derive(Debug, Clone, Serialize)]
pub struct StabilityRecord {
    #[serde(flatten)]
    pub normalized: NormalizedStructure,
    /// eV/atom; `None` when the hull could not be built.
    pub hull_distance: Option<f64>,
}

impl StabilityRecord {
    /// On the hull, within tolerance.
    pub fn is_stable(&self) -> bool {
        self.hull_distance.map_or(false, |d| d.abs() <= 1e-16)
    }
}

/// Piecewise-linear binary hull, sorted by concentration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieLine {
    pub concentration: Vec<f64>,
    pub energy: Vec<f64>,
}

impl TieLine {
    /// Tie-line through the hull vertices. `None` for ternary or failed hulls.
    pub fn from_hull(points: &[HullPoint], hull: &HullResult) -> Option<Self> {
        if points.first().map_or(true, |p| p.concentration.len() != 1) {
            return None;
        }
        let mut vertices = match hull {
            HullResult::TrivialTwoPoint { endpoints } => endpoints.to_vec(),
            HullResult::Computed(ComputedHull { vertices, .. }) => vertices.clone(),
            HullResult::SolverFailure { .. } => return None,
        };
        vertices.sort_by(|&a, &b| {
            points[a]
                .coord(0)
                .total_cmp(&points[b].coord(0))
                .then(points[a].formation_enthalpy_per_atom.total_cmp(&points[b].formation_enthalpy_per_atom))
        });
        // One vertex per concentration, the lowest.
        vertices.dedup_by(|later, earlier| points[*later].coord(0) == points[*earlier].coord(0));
        if vertices.len() < 2 {
            return None;
        }

        Some(Self {
            concentration: vertices.iter().map(|&i| points[i].coord(0)).collect(),
            energy: vertices.iter().map(|&i| points[i].formation_enthalpy_per_atom).collect(),
        })
    }

    /// Energy of the bracketing segment at `c`.
    pub fn energy_at(&self, c: f64) -> f64 {
        let last = self.concentration.len() - 1;
        let i = self.concentration.partition_point(|&t| t < c).clamp(1, last);
        let (c0, c1) = (self.concentration[i - 1], self.concentration[i]);
        let (e0, e1) = (self.energy[i - 1], self.energy[i]);
        let gradient = (e1 - e0) / (c1 - c0);
        // Evaluate from the nearer end so vertices reproduce their own energy.
        if c - c0 <= c1 - c {
            e0 + gradient * (c - c0)
        } else {
            e1 + gradient * (c - c1)
        }
    }
}

// ============================================================================
// CALCULATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct HullDistanceCalculator {
    mode: TernaryDistanceMode,
}

impl HullDistanceCalculator {
    pub fn new(mode: TernaryDistanceMode) -> Self {
        Self { mode }
    }

    /// Distance above the hull for every point, parallel to `points`.
    pub fn distances(&self, points: &[HullPoint], hull: &HullResult) -> Vec<Option<f64>> {
        match hull {
            HullResult::SolverFailure { .. } => vec![None; points.len()],
            HullResult::TrivialTwoPoint { .. } => points
                .iter()
                .map(|p| Some(snap(p.formation_enthalpy_per_atom)))
                .collect(),
            HullResult::Computed(computed) => {
                if let Some(tie_line) = TieLine::from_hull(points, hull) {
                    points
                        .iter()
                        .map(|p| Some(snap(p.formation_enthalpy_per_atom - tie_line.energy_at(p.coord(0)))))
                        .collect()
                } else {
                    self.ternary_distances(points, computed)
                }
            }
        }
    }

    fn ternary_distances(&self, points: &[HullPoint], hull: &ComputedHull) -> Vec<Option<f64>> {
        match self.mode {
            TernaryDistanceMode::Legacy => (0..points.len())
                .map(|i| {
                    if hull.vertices.binary_search(&i).is_ok() {
                        Some(0.0)
                    } else {
                        Some(LEGACY_OFF_HULL_DISTANCE)
                    }
                })
                .collect(),
            TernaryDistanceMode::FacetProjection => points
                .iter()
                .map(|p| {
                    let envelope = hull
                        .facets
                        .iter()
                        .map(|facet| facet.plane.energy_at(p.coord(0), p.coord(1)))
                        .fold(f64::NEG_INFINITY, f64::max);
                    if envelope.is_finite() {
                        Some(snap(p.formation_enthalpy_per_atom - envelope))
                    } else {
                        None
                    }
                })
                .collect(),
        }
    }

    /// Pairs each normalized structure with its distance.
    pub fn annotate(&self, normalized: Vec<NormalizedStructure>, hull: &HullResult) -> Vec<StabilityRecord> {
        let points: Vec<HullPoint> = normalized.iter().map(|n| n.hull_point()).collect();
        let distances = self.distances(&points, hull);
        normalized
            .into_iter()
            .zip(distances)
            .map(|(normalized, hull_distance)| StabilityRecord {
                normalized,
                hull_distance,
            })
            .collect()
    }
}

/// Records within `cutoff` eV/atom of the hull, in input order.
pub fn near_hull(records: &[StabilityRecord], cutoff: f64) -> Vec<StabilityRecord> {
    records
        .iter()
        .filter(|r| r.hull_distance.map_or(false, |d| d <= cutoff + NEAR_HULL_SLACK))
        .cloned()
        .collect()
}

fn snap(distance: f64) -> f64 {
    if distance.abs() <= HULL_TOLERANCE {
        0.0
    } else {
        distance
    }
}
