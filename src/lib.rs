// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
pub mod core;
pub mod io;
pub mod math;
pub mod analysis;
pub mod chemistry;
pub mod electrochem;

// ============================================================================
// RE-EXPORTS (Public API)
// ============================================================================
pub use crate::core::error::HullError;
pub use crate::core::structure::{Composed, HullPoint, Structure};
pub use crate::io::{parser, writer};
pub use crate::io::store::{DocumentStore, MemoryStore, QueryFilter};

pub use crate::chemistry::composition::{parse_composition, CompositionNormalizer, NormalizedStructure, PerHost};
pub use crate::chemistry::potentials::{ChemicalPotential, ChemicalPotentialResolver, ChemicalPotentialSource};
pub use crate::analysis::hull::{ComputedHull, HullBuilder, HullResult, PlanarFacet};
pub use crate::analysis::distance::{
    near_hull, HullCutoff, HullDistanceCalculator, StabilityRecord, TernaryDistanceMode, TieLine,
};
pub use crate::electrochem::voltage::{VoltageCurveGenerator, VoltagePoint, VoltageProfile};
pub use crate::electrochem::volume::{VolumeCurve, VolumeCurveGenerator};

use anyhow::{Context, Result};

// ============================================================================
// HIGH-LEVEL INTERFACE
// ============================================================================

/// Configuration for the phase-diagram pipeline.
#[derive(Debug, Clone, Default)]
pub struct HullConfig {
    /// Ordered element symbols; the first is the guest.
    pub composition: Vec<String>,
    /// Near-hull window; `None` keeps only structures on the hull.
    pub cutoff: Option<HullCutoff>,
    /// Manual chemical potentials (eV/atom), one per element.
    pub chempots: Option<Vec<f64>>,
    /// Include structures from every sub-system of the composition,
    /// not only those containing all of its elements.
    pub intersection: bool,
    pub ternary_distance: TernaryDistanceMode,
    /// Applied to reference lookups and to the query structures.
    pub filter: QueryFilter,
}

impl HullConfig {
    /// Builds a config from command-line style inputs.
    pub fn from_parts(
        composition: &str,
        hull_cutoff: Option<f64>,
        hull_temp: Option<f64>,
    ) -> std::result::Result<Self, HullError> {
        let cutoff = match (hull_cutoff, hull_temp) {
            (Some(_), Some(_)) => return Err(HullError::ConflictingCutoff),
            (Some(ev), None) => Some(HullCutoff::Energy(ev)),
            (None, Some(kelvin)) => Some(HullCutoff::Temperature(kelvin)),
            (None, None) => None,
        };
        Ok(Self {
            composition: parse_composition(composition)?,
            cutoff,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> std::result::Result<(), HullError> {
        match self.composition.len() {
            2 => Ok(()),
            3 if self.intersection => Ok(()),
            3 => Err(HullError::TernaryWithoutIntersection),
            n => Err(HullError::UnsupportedComposition(n)),
        }
    }

    /// eV/atom above the hull still counted as "near".
    pub fn cutoff_energy(&self) -> f64 {
        self.cutoff.map_or(0.0, |c| c.energy())
    }

    /// Whether `doc` lies in the queried composition space.
    fn admits(&self, doc: &Structure) -> bool {
        let elements = doc.elements();
        let inside = elements
            .iter()
            .all(|e| self.composition.iter().any(|c| c == e));
        let complete = self.intersection || elements.len() == self.composition.len();
        inside && complete && self.filter.accepts(doc)
    }
}

/// Everything derived from one hull construction.
#[derive(Debug, Clone)]
pub struct PhaseDiagram {
    pub chempots: Vec<ChemicalPotential>,
    /// One record per point of the hull, references included.
    pub records: Vec<StabilityRecord>,
    pub hull: HullResult,
    /// Binary hulls only.
    pub tie_line: Option<TieLine>,
    pub near_hull: Vec<StabilityRecord>,
    pub cutoff: f64,
}

impl PhaseDiagram {
    pub fn elements(&self) -> Vec<&str> {
        self.chempots.iter().map(|mu| mu.element.as_str()).collect()
    }

    pub fn is_binary(&self) -> bool {
        self.chempots.len() == 2
    }

    /// Records exactly on the hull.
    pub fn stable(&self) -> impl Iterator<Item = &StabilityRecord> {
        self.records.iter().filter(|r| r.is_stable())
    }

    pub fn voltage_profiles(&self) -> std::result::Result<Vec<VoltageProfile>, HullError> {
        if self.hull.is_failure() {
            return Ok(Vec::new());
        }
        VoltageCurveGenerator::new(&self.chempots).generate(&self.near_hull)
    }

    /// `None` for ternary diagrams and failed hulls.
    pub fn volume_curve(&self) -> Option<VolumeCurve> {
        if !self.is_binary() || self.hull.is_failure() {
            return None;
        }
        Some(VolumeCurveGenerator.generate(&self.near_hull))
    }
}

/// The Master Pipeline function.
///
/// The point cloud is the guest reference, then the query structures, then
/// the remaining references. Query documents that are themselves references
/// are not added twice.
pub fn construct_phase_diagram<S: DocumentStore + ?Sized>(
    structures: &[Structure],
    store: &S,
    config: &HullConfig,
) -> Result<(PhaseDiagram, String)> {
    config.validate()?;

    // 1. REFERENCES
    let resolver = ChemicalPotentialResolver::new(store, &config.filter);
    let chempots = resolver
        .resolve(&config.composition, config.chempots.as_deref())
        .context("Could not resolve chemical potentials")?;

    // 2. POINT CLOUD
    let reference_ids: Vec<&str> = chempots.iter().map(|mu| mu.reference.id.as_str()).collect();
    let mut cloud: Vec<Structure> = Vec::with_capacity(structures.len() + chempots.len());
    cloud.push(chempots[0].reference.clone());
    cloud.extend(
        structures
            .iter()
            .filter(|doc| config.admits(doc) && !reference_ids.contains(&doc.id.as_str()))
            .cloned(),
    );
    cloud.extend(chempots[1..].iter().map(|mu| mu.reference.clone()));
    log::info!("{} structures in composition space.", cloud.len());

    let normalized = CompositionNormalizer::new(&chempots)
        .normalize_all(&cloud)
        .context("Could not place structures in composition space")?;

    // 3. HULL
    let points: Vec<HullPoint> = normalized.iter().map(|n| n.hull_point()).collect();
    let hull = HullBuilder::default().build(&points);
    let tie_line = TieLine::from_hull(&points, &hull);

    // 4. STABILITY
    let records = HullDistanceCalculator::new(config.ternary_distance).annotate(normalized, &hull);
    let cutoff = config.cutoff_energy();
    let near = near_hull(&records, cutoff);

    let diagram = PhaseDiagram {
        chempots,
        records,
        hull,
        tie_line,
        near_hull: near,
        cutoff,
    };
    let report = report(&diagram, config);
    Ok((diagram, report))
}

fn report(diagram: &PhaseDiagram, config: &HullConfig) -> String {
    let mut out = String::new();
    out.push_str("--- Phase Diagram Report ---\n");
    out.push_str(&format!("• Composition:     {}\n", diagram.elements().join(":")));
    for mu in &diagram.chempots {
        let source = match &mu.source {
            ChemicalPotentialSource::Document(id) => id.as_str(),
            ChemicalPotentialSource::Manual => "manual",
        };
        out.push_str(&format!(
            "• μ({}):{:>10.4} eV/atom [{}]\n",
            mu.element, mu.enthalpy_per_atom, source
        ));
    }
    out.push_str(&format!("• Structures:      {}\n", diagram.records.len()));
    match &diagram.hull {
        HullResult::TrivialTwoPoint { .. } => out.push_str("• Hull:            chemical potentials only\n"),
        HullResult::Computed(hull) => out.push_str(&format!(
            "• Hull:            {} vertices, {} facets\n",
            hull.vertices.len(),
            hull.facets.len()
        )),
        HullResult::SolverFailure { reason } => out.push_str(&format!("• Hull:            failed ({})\n", reason)),
    }

    if diagram.near_hull.is_empty() {
        out.push_str("No structures on hull with chosen chemical potentials.\n");
        return out;
    }

    match config.cutoff {
        Some(HullCutoff::Temperature(kelvin)) => out.push_str(&format!(
            "{} structures within {} K ({:.4} eV) of the hull\n",
            diagram.near_hull.len(),
            kelvin,
            diagram.cutoff
        )),
        _ => out.push_str(&format!(
            "{} structures within {} eV of the hull\n",
            diagram.near_hull.len(),
            diagram.cutoff
        )),
    }
    out.push_str(&format!("{:<24}{:<28}{:>14}{:>16}\n", "Formula", "ID", "ΔH (meV/atom)", "Hull (meV/atom)"));
    for record in &diagram.near_hull {
        let structure = &record.normalized.structure;
        out.push_str(&format!(
            "{:<24}{:<28}{:>14.1}{:>16.1}\n",
            structure.formula(),
            structure.id,
            record.normalized.formation_enthalpy_per_atom * 1000.0,
            record.hull_distance.unwrap_or(0.0) * 1000.0
        ));
    }
    out
}
