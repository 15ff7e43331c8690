use crate::analysis::distance::{StabilityRecord, TieLine};
use crate::analysis::hull::HullResult;
use crate::chemistry::potentials::ChemicalPotential;
use crate::electrochem::voltage::VoltageProfile;
use crate::electrochem::volume::VolumeCurve;
use crate::PhaseDiagram;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum HullSummary<'a> {
    TrivialTwoPoint { vertices: Vec<&'a str> },
    Computed { vertices: Vec<&'a str>, facets: Vec<Vec<&'a str>> },
    SolverFailure { reason: &'a str },
}

/// Serialized view of a diagram; vertices are named by structure id.
#[derive(Serialize)]
struct DiagramExport<'a> {
    elements: Vec<&'a str>,
    chemical_potentials: &'a [ChemicalPotential],
    hull: HullSummary<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tie_line: Option<&'a TieLine>,
    hull_cutoff: f64,
    structures: &'a [StabilityRecord],
    near_hull: Vec<&'a str>,
    voltage_profiles: Vec<VoltageProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume_curve: Option<VolumeCurve>,
}

impl<'a> DiagramExport<'a> {
    fn new(diagram: &'a PhaseDiagram) -> Result<Self> {
        let id = move |i: usize| -> &'a str { diagram.records[i].normalized.structure.id.as_str() };
        let hull = match &diagram.hull {
            HullResult::TrivialTwoPoint { endpoints } => HullSummary::TrivialTwoPoint {
                vertices: endpoints.iter().map(|&i| id(i)).collect(),
            },
            HullResult::Computed(computed) => HullSummary::Computed {
                vertices: computed.vertices.iter().map(|&i| id(i)).collect(),
                facets: computed
                    .facets
                    .iter()
                    .map(|facet| facet.vertices.iter().map(|&i| id(i)).collect())
                    .collect(),
            },
            HullResult::SolverFailure { reason } => HullSummary::SolverFailure { reason },
        };

        Ok(Self {
            elements: diagram.elements(),
            chemical_potentials: &diagram.chempots,
            hull,
            tie_line: diagram.tie_line.as_ref(),
            hull_cutoff: diagram.cutoff,
            structures: &diagram.records,
            near_hull: diagram
                .near_hull
                .iter()
                .map(|r| r.normalized.structure.id.as_str())
                .collect(),
            voltage_profiles: diagram.voltage_profiles()?,
            volume_curve: diagram.volume_curve(),
        })
    }
}

/// Renders the diagram, its curves included, as pretty-printed JSON.
pub fn to_json_string(diagram: &PhaseDiagram) -> Result<String> {
    let export = DiagramExport::new(diagram).context("Could not derive curves for export")?;
    serde_json::to_string_pretty(&export).context("Failed to serialize phase diagram")
}

pub fn to_json(diagram: &PhaseDiagram, path: &Path) -> Result<()> {
    let contents = to_json_string(diagram)?;
    fs::write(path, contents).with_context(|| format!("Failed to write output to {:?}", path))?;
    log::info!("Wrote phase diagram to {:?}", path);
    Ok(())
}
