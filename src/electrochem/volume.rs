use crate::analysis::distance::StabilityRecord;
use serde::Serialize;

/// Cell volume per host atom relative to the host-richest entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeCurve {
    /// Guest atoms per host atom.
    pub x: Vec<f64>,
    pub volume_ratio: Vec<f64>,
    /// Whether each entry sits exactly on the hull.
    pub stable: Vec<bool>,
}

impl VolumeCurve {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Largest expansion along the curve, if any.
    pub fn max_expansion(&self) -> Option<f64> {
        self.volume_ratio.iter().copied().reduce(f64::max)
    }
}

/// Binary volume-expansion curve over the near-hull subset.
#[derive(Debug, Default)]
pub struct VolumeCurveGenerator;

impl VolumeCurveGenerator {
    /// Records without a defined host are skipped. The reference volume is
    /// that of the last remaining record, which for pipeline output is the
    /// host end member.
    pub fn generate(&self, stable: &[StabilityRecord]) -> VolumeCurve {
        let entries: Vec<(f64, f64, bool)> = stable
            .iter()
            .filter_map(|r| {
                let x = r.normalized.guest_per_host()?;
                let volume = r.normalized.cell_volume_per_b()?;
                Some((x, volume, r.is_stable()))
            })
            .collect();

        let Some(&(_, bulk, _)) = entries.last() else {
            log::warn!("No host-containing structures; volume curve is empty.");
            return VolumeCurve::default();
        };
        if bulk <= 0.0 {
            log::warn!("Reference volume is {}; volume curve is empty.", bulk);
            return VolumeCurve::default();
        }

        let mut curve = VolumeCurve::default();
        for (x, volume, stable) in entries {
            curve.x.push(x);
            curve.volume_ratio.push(volume / bulk);
            curve.stable.push(stable);
        }
        log::info!("Volume curve with {} points.", curve.len());
        curve
    }
}
