use crate::analysis::distance::StabilityRecord;
use crate::analysis::hull::{ComputedHull, HullBuilder, HullResult};
use crate::chemistry::composition::guest_per_host;
use crate::chemistry::elements::{gravimetric_capacity, molar_mass};
use crate::chemistry::potentials::ChemicalPotential;
use crate::core::error::HullError;
use crate::core::structure::{Composed, HullPoint};
use nalgebra::Vector2;
use serde::Serialize;

/// Path parameters closer than this to the ends snap onto them.
const PATH_EPS: f64 = 1e-9;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltagePoint {
    /// mAh/g; `None` at the pure guest end.
    pub capacity: Option<f64>,
    /// V vs. the guest metal.
    pub voltage: f64,
}

/// Staircase open-circuit voltage curve for one intercalation path.
///
/// `x`, `capacity` and `voltage` are parallel and ordered by ascending
/// capacity; `voltage[0]` repeats `voltage[1]` so the first plateau starts at
/// zero capacity. `reactions[i]` names the phases in equilibrium between
/// points `i` and `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageProfile {
    pub starting_formula: String,
    /// Guest atoms per host atom.
    pub x: Vec<Option<f64>>,
    pub capacity: Vec<Option<f64>>,
    pub voltage: Vec<f64>,
    pub reactions: Vec<Vec<String>>,
}

impl VoltageProfile {
    pub fn points(&self) -> impl Iterator<Item = VoltagePoint> + '_ {
        self.capacity
            .iter()
            .zip(&self.voltage)
            .map(|(&capacity, &voltage)| VoltagePoint { capacity, voltage })
    }

    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Capacity-weighted mean voltage over the defined part of the curve.
    pub fn average_voltage(&self) -> Option<f64> {
        let mut energy = 0.0;
        let mut last_capacity = 0.0;
        for point in self.points().skip(1) {
            let Some(capacity) = point.capacity else { break };
            energy += point.voltage * (capacity - last_capacity);
            last_capacity = capacity;
        }
        if last_capacity > 0.0 {
            Some(energy / last_capacity)
        } else {
            None
        }
    }
}

// ============================================================================
// GENERATOR
// ============================================================================

/// Derives voltage profiles from the near-hull subset.
pub struct VoltageCurveGenerator<'a> {
    chempots: &'a [ChemicalPotential],
}

impl<'a> VoltageCurveGenerator<'a> {
    pub fn new(chempots: &'a [ChemicalPotential]) -> Self {
        Self { chempots }
    }

    pub fn generate(&self, stable: &[StabilityRecord]) -> Result<Vec<VoltageProfile>, HullError> {
        log::info!("Generating voltage curve...");
        match self.chempots.len() {
            2 => Ok(self.binary(stable)?.into_iter().collect()),
            3 => self.ternary(stable),
            n => Err(HullError::UnsupportedComposition(n)),
        }
    }

    fn masses(&self) -> Result<Vec<f64>, HullError> {
        self.chempots
            .iter()
            .map(|mu| molar_mass(&mu.element).ok_or_else(|| HullError::UnknownElement(mu.element.clone())))
            .collect()
    }

    fn guest(&self) -> &ChemicalPotential {
        self.chempots
            .iter()
            .find(|mu| mu.infinite_dilution)
            .unwrap_or(&self.chempots[0])
    }

    /// One staircase over guest-per-host `x`.
    fn binary(&self, stable: &[StabilityRecord]) -> Result<Option<VoltageProfile>, HullError> {
        let masses = self.masses()?;
        let guest = self.guest();

        let mut entries: Vec<(f64, f64, String)> = stable
            .iter()
            .filter_map(|r| {
                let x = r.normalized.guest_per_host()?;
                let per_b = r.normalized.enthalpy_per_b()?;
                Some((x, per_b, r.normalized.structure.formula()))
            })
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        entries.dedup_by(|later, earlier| later.0 == earlier.0);

        if entries.len() < 2 {
            log::warn!("Fewer than two stable host compositions; no voltage curve.");
            return Ok(None);
        }

        let mut voltage = Vec::with_capacity(entries.len() + 1);
        voltage.push(0.0);
        for i in 1..entries.len() {
            voltage.push(-(entries[i].1 - entries[i - 1].1) / (entries[i].0 - entries[i - 1].0) + guest.enthalpy_per_atom);
        }
        voltage[0] = voltage[1];

        let mut x: Vec<Option<f64>> = entries.iter().map(|e| Some(e.0)).collect();
        let mut capacity: Vec<Option<f64>> = entries
            .iter()
            .map(|e| gravimetric_capacity(&[e.0, 1.0], &masses))
            .collect();
        let mut reactions: Vec<Vec<String>> = entries
            .windows(2)
            .map(|pair| vec![pair[0].2.clone(), pair[1].2.clone()])
            .collect();

        // Past the most guest-rich compound the guest precipitates as metal.
        if let Some(metal) = stable.iter().find(|r| r.normalized.structure.is_elemental(&guest.element)) {
            x.push(None);
            capacity.push(None);
            voltage.push(0.0);
            if let Some(last) = entries.last() {
                reactions.push(vec![last.2.clone(), metal.normalized.structure.formula()]);
            }
        }

        Ok(Some(VoltageProfile {
            starting_formula: entries[0].2.clone(),
            x,
            capacity,
            voltage,
            reactions,
        }))
    }

    /// One profile per host binary phase, walking straight to the guest corner.
    fn ternary(&self, stable: &[StabilityRecord]) -> Result<Vec<VoltageProfile>, HullError> {
        let masses = self.masses()?;
        let points: Vec<HullPoint> = stable.iter().map(|r| r.normalized.hull_point()).collect();
        let hull = match HullBuilder::default().build(&points) {
            HullResult::Computed(hull) => hull,
            _ => {
                log::warn!("No ternary hull through the stable structures; no voltage curve.");
                return Ok(Vec::new());
            }
        };

        let mut starts: Vec<usize> = Vec::new();
        for &v in &hull.vertices {
            let (guest, first_host) = (points[v].coord(0), points[v].coord(1));
            let on_host_edge = guest.abs() <= PATH_EPS && first_host > PATH_EPS && first_host < 1.0 - PATH_EPS;
            let seen = starts
                .iter()
                .any(|&s| (points[s].coord(1) - first_host).abs() <= PATH_EPS);
            if on_host_edge && !seen {
                starts.push(v);
            }
        }
        log::info!("{} starting point(s) found.", starts.len());

        let mut profiles = Vec::with_capacity(starts.len());
        for start in starts {
            let formula = stable[start].normalized.structure.formula();
            match self.walk(stable, &points, &hull, start, &masses) {
                Some(profile) => {
                    log::info!(
                        "Reaction from {}: {}",
                        formula,
                        profile
                            .reactions
                            .iter()
                            .map(|phases| phases.join(" + "))
                            .collect::<Vec<_>>()
                            .join(" ---> ")
                    );
                    profiles.push(profile);
                }
                None => log::warn!("Path from {} crosses no facet; skipped.", formula),
            }
        }
        Ok(profiles)
    }

    fn walk(
        &self,
        stable: &[StabilityRecord],
        points: &[HullPoint],
        hull: &ComputedHull,
        start: usize,
        masses: &[f64],
    ) -> Option<VoltageProfile> {
        let origin = Vector2::new(0.0, points[start].coord(1));
        let corner = Vector2::new(1.0, 0.0);
        let projected = |i: usize| Vector2::new(points[i].coord(0), points[i].coord(1));

        // (t_in, t_out, facet)
        let mut segments: Vec<(f64, f64, usize)> = hull
            .facets
            .iter()
            .enumerate()
            .filter_map(|(k, facet)| {
                let polygon: Vec<Vector2<f64>> = facet.vertices.iter().map(|&i| projected(i)).collect();
                crate::math::planar::clip_segment(&polygon, &origin, &corner, PATH_EPS).map(|(t0, t1)| (t0, t1, k))
            })
            .collect();
        segments.sort_by(|a, b| a.0.total_cmp(&b.0));
        // A path running along a shared edge touches both facets: keep one.
        segments.dedup_by(|later, earlier| (later.0 - earlier.0).abs() <= PATH_EPS);
        if segments.is_empty() {
            return None;
        }

        let snap = |t: f64| {
            if t <= PATH_EPS {
                0.0
            } else if t >= 1.0 - PATH_EPS {
                1.0
            } else {
                t
            }
        };
        let crossings: Vec<f64> = std::iter::once(snap(segments[0].0))
            .chain(segments.iter().map(|s| snap(s.1)))
            .collect();

        let mut voltage = Vec::with_capacity(crossings.len());
        for &(_, _, k) in &segments {
            // Formation energies put the guest reference at zero.
            voltage.push(-hull.facets[k].plane.guest_potential());
        }
        voltage.insert(0, voltage[0]);

        let mut x = Vec::with_capacity(crossings.len());
        let mut capacity = Vec::with_capacity(crossings.len());
        for &t in &crossings {
            let guest = t;
            let first_host = (1.0 - t) * origin.y;
            let last_host = 1.0 - guest - first_host;
            x.push(guest_per_host(guest));
            capacity.push(gravimetric_capacity(&[guest, first_host, last_host], masses));
        }

        let reactions = segments
            .iter()
            .map(|&(_, _, k)| {
                let mut phases: Vec<String> = Vec::new();
                for &v in &hull.facets[k].vertices {
                    let formula = stable[v].normalized.structure.formula();
                    if !phases.contains(&formula) {
                        phases.push(formula);
                    }
                }
                phases
            })
            .collect();

        Some(VoltageProfile {
            starting_formula: stable[start].normalized.structure.formula(),
            x,
            capacity,
            voltage,
            reactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::distance::HullDistanceCalculator;
    use crate::chemistry::composition::CompositionNormalizer;
    use crate::core::structure::Structure;

    fn stoich(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(s, c)| (s.to_string(), *c)).collect()
    }

    fn stable_records(chempots: &[ChemicalPotential], structures: &[Structure]) -> Vec<StabilityRecord> {
        let normalized = CompositionNormalizer::new(chempots).normalize_all(structures).unwrap();
        let points: Vec<HullPoint> = normalized.iter().map(|n| n.hull_point()).collect();
        let hull = HullBuilder::default().build(&points);
        HullDistanceCalculator::default().annotate(normalized, &hull)
    }

    #[test]
    fn binary_profile_doubles_first_voltage_and_ends_at_metal() {
        let chempots =
            ChemicalPotential::from_overrides(&["Li".to_string(), "Ge".to_string()], &[-1.9, -4.5]).unwrap();
        let mut structures: Vec<Structure> = chempots.iter().map(|mu| mu.reference.clone()).collect();
        // LiGe at -0.3 eV/atom formation energy.
        structures.push(Structure::new("LiGe", stoich(&[("Li", 1.0), ("Ge", 1.0)]), -7.0, 2, 1, 40.0));
        let records = stable_records(&chempots, &structures);

        let profiles = VoltageCurveGenerator::new(&chempots).generate(&records).unwrap();
        assert_eq!(profiles.len(), 1);
        let profile = &profiles[0];
        assert_eq!(profile.starting_formula, "Ge");
        assert_eq!(profile.x, vec![Some(0.0), Some(1.0), None]);
        assert_eq!(profile.voltage[0], profile.voltage[1]);
        // -( -7.0 - (-4.5) ) / 1 + (-1.9)
        assert!((profile.voltage[1] - 0.6).abs() < 1e-12);
        assert_eq!(profile.voltage[2], 0.0);
        assert_eq!(profile.capacity[0], Some(0.0));
        assert!(profile.capacity[2].is_none());
        assert_eq!(profile.reactions, vec![vec!["Ge".to_string(), "LiGe".to_string()], vec!["LiGe".to_string(), "Li".to_string()]]);
        assert!((profile.average_voltage().unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn binary_needs_two_host_compositions() {
        let chempots =
            ChemicalPotential::from_overrides(&["Li".to_string(), "Ge".to_string()], &[-1.9, -4.5]).unwrap();
        let structures: Vec<Structure> = chempots.iter().map(|mu| mu.reference.clone()).collect();
        let records = stable_records(&chempots, &structures);
        assert!(VoltageCurveGenerator::new(&chempots).generate(&records).unwrap().is_empty());
    }

    #[test]
    fn unknown_host_element_is_fatal() {
        let chempots =
            ChemicalPotential::from_overrides(&["Li".to_string(), "Qq".to_string()], &[-1.9, -4.5]).unwrap();
        let err = VoltageCurveGenerator::new(&chempots).generate(&[]).unwrap_err();
        assert!(matches!(err, HullError::UnknownElement(ref e) if e == "Qq"));
    }

    #[test]
    fn ternary_path_crosses_each_facet_once() {
        let chempots = ChemicalPotential::from_overrides(
            &["Li".to_string(), "Sn".to_string(), "S".to_string()],
            &[-2.0, -4.0, -3.0],
        )
        .unwrap();
        let mut structures: Vec<Structure> = chempots.iter().map(|mu| mu.reference.clone()).collect();
        // SnS at -0.5 eV/atom and Li2S at -1.0 eV/atom formation energy.
        structures.push(Structure::new("SnS", stoich(&[("Sn", 1.0), ("S", 1.0)]), -8.0, 2, 1, 40.0));
        structures.push(Structure::new("Li2S", stoich(&[("Li", 2.0), ("S", 1.0)]), -10.0, 3, 1, 40.0));
        let records = stable_records(&chempots, &structures);

        let profiles = VoltageCurveGenerator::new(&chempots).generate(&records).unwrap();
        assert_eq!(profiles.len(), 1);
        let profile = &profiles[0];
        assert_eq!(profile.starting_formula, "SnS");
        assert_eq!(profile.voltage.len(), profile.capacity.len());
        assert_eq!(profile.voltage[0], profile.voltage[1]);
        assert_eq!(profile.capacity[0], Some(0.0));
        assert_eq!(*profile.capacity.last().unwrap(), None);
        assert!(profile.voltage.last().unwrap().abs() < 1e-12);
        // SnS + 2 Li -> Li2S + Sn releases (3 * 1.0 - 2 * 0.5) eV over 2 Li.
        assert!((profile.voltage[1] - 1.0).abs() < 1e-9);
        assert_eq!(profile.x.len(), 3);
        assert!((profile.x[1].unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(profile.reactions.len(), 2);
    }
}
