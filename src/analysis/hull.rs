use crate::core::structure::HullPoint;
use crate::math::envelope::lower_envelope;
use crate::math::planar::{all_collinear, lower_chain};
use crate::math::plane::EnergyPlane;
use nalgebra::{Vector2, Vector3};

/// Energy tolerance (eV/atom) for "on or below the zero line".
pub const HULL_TOLERANCE: f64 = 1e-9;

/// Geometric tolerance for areas and collinearity in concentration space.
const GEOMETRY_EPS: f64 = 1e-12;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// One planar piece of a ternary lower envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarFacet {
    /// Counter-clockwise polygon of point indices.
    pub vertices: Vec<usize>,
    pub plane: EnergyPlane,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedHull {
    /// Indices into the point array: by concentration for binary hulls,
    /// ascending for ternary ones.
    pub vertices: Vec<usize>,
    /// Lower facets. Empty for binary hulls, whose facets are the tie-line
    /// segments between consecutive vertices.
    pub facets: Vec<PlanarFacet>,
}

/// Outcome of a hull construction.
#[derive(Debug, Clone, PartialEq)]
pub enum HullResult {
    /// Only the two chemical-potential endpoints qualify: the tie-line is the
    /// zero-energy line itself.
    TrivialTwoPoint { endpoints: [usize; 2] },
    Computed(ComputedHull),
    /// Degenerate geometry; callers fall back to the raw point cloud.
    SolverFailure { reason: String },
}

impl HullResult {
    pub fn vertices(&self) -> Vec<usize> {
        match self {
            HullResult::TrivialTwoPoint { endpoints } => endpoints.to_vec(),
            HullResult::Computed(hull) => hull.vertices.clone(),
            HullResult::SolverFailure { .. } => Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, HullResult::SolverFailure { .. })
    }

    fn failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        log::warn!("Error with hull construction ({}), plotting points only...", reason);
        HullResult::SolverFailure { reason }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Lower convex envelope of formation energies over composition space.
#[derive(Debug, Clone)]
pub struct HullBuilder {
    tolerance: f64,
}

impl Default for HullBuilder {
    fn default() -> Self {
        Self {
            tolerance: HULL_TOLERANCE,
        }
    }
}

impl HullBuilder {
    pub fn build(&self, points: &[HullPoint]) -> HullResult {
        match points.first().map(|p| p.concentration.len()) {
            Some(1) => self.build_binary(points),
            Some(2) => self.build_ternary(points),
            Some(n) => HullResult::failure(format!("unsupported hull dimension {}", n + 1)),
            None => HullResult::failure("no points"),
        }
    }

    /// Binary: hull over the non-positive subset only.
    fn build_binary(&self, points: &[HullPoint]) -> HullResult {
        let qualifying: Vec<usize> = (0..points.len())
            .filter(|&i| points[i].formation_enthalpy_per_atom <= self.tolerance)
            .collect();

        match qualifying.len() {
            0 | 1 => return HullResult::failure("fewer than two points on or below the zero line"),
            2 => {
                log::debug!("Only the chemical potentials qualify; using the zero tie-line.");
                return HullResult::TrivialTwoPoint {
                    endpoints: [qualifying[0], qualifying[1]],
                };
            }
            _ => {}
        }

        let projected: Vec<Vector2<f64>> = points
            .iter()
            .map(|p| Vector2::new(p.coord(0), p.formation_enthalpy_per_atom))
            .collect();
        if all_collinear(&projected, &qualifying, GEOMETRY_EPS) {
            return HullResult::failure("qualifying points are collinear");
        }

        let vertices = lower_chain(&projected, &qualifying, GEOMETRY_EPS);
        log::debug!("Binary hull: {} vertices from {} candidates.", vertices.len(), qualifying.len());
        HullResult::Computed(ComputedHull {
            vertices,
            facets: Vec::new(),
        })
    }

    /// Ternary: lower envelope of the full point set.
    ///
    /// Candidates are restricted to non-positive points: with the three
    /// elemental references at zero, no positive point can touch the envelope.
    fn build_ternary(&self, points: &[HullPoint]) -> HullResult {
        let lifted: Vec<Vector3<f64>> = points
            .iter()
            .map(|p| Vector3::new(p.coord(0), p.coord(1), p.formation_enthalpy_per_atom))
            .collect();
        let projected: Vec<Vector2<f64>> = lifted.iter().map(|p| Vector2::new(p.x, p.y)).collect();
        let candidates: Vec<usize> = (0..points.len())
            .filter(|&i| lifted[i].z <= self.tolerance)
            .collect();

        if all_collinear(&projected, &candidates, GEOMETRY_EPS) {
            return HullResult::failure("compositions are collinear");
        }

        let Some(faces) = lower_envelope(&lifted, &candidates, self.tolerance, GEOMETRY_EPS) else {
            return HullResult::failure("no supporting facet found");
        };

        let facets: Vec<PlanarFacet> = faces
            .into_iter()
            .map(|face| PlanarFacet {
                vertices: face.polygon,
                plane: face.plane,
            })
            .collect();

        let mut vertices: Vec<usize> = facets
            .iter()
            .flat_map(|facet| facet.vertices.iter().copied())
            .collect();
        vertices.sort_unstable();
        vertices.dedup();

        log::debug!("Ternary hull: {} facets, {} vertices.", facets.len(), vertices.len());
        HullResult::Computed(ComputedHull { vertices, facets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::planar::cross;

    fn binary(raw: &[(f64, f64)]) -> Vec<HullPoint> {
        raw.iter().map(|&(c, e)| HullPoint::new(vec![c], e)).collect()
    }

    fn ternary(raw: &[(f64, f64, f64)]) -> Vec<HullPoint> {
        raw.iter().map(|&(a, b, e)| HullPoint::new(vec![a, b], e)).collect()
    }

    #[test]
    fn two_endpoints_give_trivial_hull() {
        let points = binary(&[(1.0, 0.0), (0.5, 0.1), (0.0, 0.0)]);
        assert_eq!(
            HullBuilder::default().build(&points),
            HullResult::TrivialTwoPoint { endpoints: [0, 2] }
        );
    }

    #[test]
    fn binary_hull_skips_metastable_points() {
        let points = binary(&[(1.0, 0.0), (0.5, -0.3), (0.25, -0.1), (0.75, -0.1), (0.0, 0.0), (0.6, 0.2)]);
        match HullBuilder::default().build(&points) {
            HullResult::Computed(hull) => {
                assert_eq!(hull.vertices, vec![4, 1, 0]);
                assert!(hull.facets.is_empty());
            }
            other => panic!("unexpected hull {:?}", other),
        }
    }

    #[test]
    fn collinear_binary_input_is_a_solver_failure() {
        let points = binary(&[(1.0, 0.0), (0.5, 0.0), (0.0, 0.0)]);
        assert!(HullBuilder::default().build(&points).is_failure());
        assert!(HullBuilder::default().build(&[]).is_failure());
    }

    #[test]
    fn ternary_hull_finds_lower_facets() {
        let points = ternary(&[
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 0.0),
            (1.0 / 3.0, 1.0 / 3.0, -0.5),
            (0.2, 0.2, 0.3),
            (0.5, 0.0, -0.05),
        ]);
        match HullBuilder::default().build(&points) {
            HullResult::Computed(hull) => {
                assert_eq!(hull.vertices, vec![0, 1, 2, 3, 5]);
                // Li-S edge split by the binary compound: 4 facets.
                assert_eq!(hull.facets.len(), 4);
                for facet in &hull.facets {
                    assert_eq!(facet.vertices.len(), 3);
                    for &v in &facet.vertices {
                        let p = &points[v];
                        let on_plane = facet.plane.energy_at(p.coord(0), p.coord(1));
                        assert!((on_plane - p.formation_enthalpy_per_atom).abs() < 1e-9);
                    }
                }
            }
            other => panic!("unexpected hull {:?}", other),
        }
    }

    #[test]
    fn coplanar_points_are_not_vertices() {
        // A point lying exactly on the zero plane is not a vertex.
        let points = ternary(&[(1.0, 0.0, 0.0), (0.0, 1.0, 0.0), (0.0, 0.0, 0.0), (0.3, 0.3, 0.0)]);
        match HullBuilder::default().build(&points) {
            HullResult::Computed(hull) => {
                assert_eq!(hull.vertices, vec![0, 1, 2]);
                assert_eq!(hull.facets.len(), 1);
            }
            other => panic!("unexpected hull {:?}", other),
        }
    }

    /// Deterministic scatter inside the triangle, plus the three corners at zero.
    fn scattered(n: usize, seed: u64) -> Vec<HullPoint> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        let mut points = ternary(&[(1.0, 0.0, 0.0), (0.0, 1.0, 0.0), (0.0, 0.0, 0.0)]);
        for _ in 0..n {
            let (mut a, mut b) = (next(), next());
            if a + b > 1.0 {
                a = 1.0 - a;
                b = 1.0 - b;
            }
            points.push(HullPoint::new(vec![a, b], -0.5 * next()));
        }
        points
    }

    /// Every supporting plane through three points, O(n^4).
    fn exhaustive_vertices(points: &[HullPoint]) -> Vec<usize> {
        let lifted: Vec<Vector3<f64>> = points
            .iter()
            .map(|p| Vector3::new(p.coord(0), p.coord(1), p.formation_enthalpy_per_atom))
            .collect();
        let mut vertices = Vec::new();
        for a in 0..lifted.len() {
            for b in a + 1..lifted.len() {
                for c in b + 1..lifted.len() {
                    let Some(plane) = EnergyPlane::through([lifted[a], lifted[b], lifted[c]], GEOMETRY_EPS) else {
                        continue;
                    };
                    if lifted.iter().all(|p| p.z >= plane.energy_at(p.x, p.y) - HULL_TOLERANCE) {
                        vertices.extend([a, b, c]);
                    }
                }
            }
        }
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    #[test]
    fn ternary_vertices_match_exhaustive_search() {
        for seed in [1, 7, 42] {
            let points = scattered(30, seed);
            let hull = HullBuilder::default().build(&points);
            assert_eq!(hull.vertices(), exhaustive_vertices(&points), "seed {}", seed);
        }
    }

    #[test]
    fn large_ternary_cloud_is_tiled_by_supporting_facets() {
        let points = scattered(400, 2024);
        let HullResult::Computed(hull) = HullBuilder::default().build(&points) else {
            panic!("hull construction failed");
        };
        assert!(hull.vertices.len() > 3);

        let mut area = 0.0;
        for facet in &hull.facets {
            for p in &points {
                assert!(p.formation_enthalpy_per_atom >= facet.plane.energy_at(p.coord(0), p.coord(1)) - 1e-9);
            }
            let corners: Vec<Vector2<f64>> = facet
                .vertices
                .iter()
                .map(|&i| Vector2::new(points[i].coord(0), points[i].coord(1)))
                .collect();
            for k in 1..corners.len() - 1 {
                area += 0.5 * cross(&corners[0], &corners[k], &corners[k + 1]);
            }
        }
        // Facets cover the composition triangle exactly once.
        assert!((area - 0.5).abs() < 1e-9, "covered area {}", area);

        for &v in &hull.vertices {
            let p = &points[v];
            let envelope = hull
                .facets
                .iter()
                .map(|f| f.plane.energy_at(p.coord(0), p.coord(1)))
                .fold(f64::NEG_INFINITY, f64::max);
            assert!((envelope - p.formation_enthalpy_per_atom).abs() < 1e-9);
        }
    }

    #[test]
    fn collinear_ternary_compositions_fail() {
        let points = ternary(&[(0.0, 0.0, 0.0), (0.5, 0.5, -0.1), (1.0, 0.0, 0.0), (0.25, 0.25, 0.0)]);
        // Non-collinear: succeeds.
        assert!(!HullBuilder::default().build(&points).is_failure());
        let line = ternary(&[(0.0, 0.0, 0.0), (0.25, 0.25, -0.1), (0.5, 0.5, 0.0)]);
        assert!(HullBuilder::default().build(&line).is_failure());
    }
}
