use nalgebra::{Matrix3, Vector2, Vector3};

/// Non-vertical plane `E(c) = gradient · c + intercept` over two
/// concentration axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyPlane {
    pub gradient: Vector2<f64>,
    pub intercept: f64,
}

impl EnergyPlane {
    /// Plane through three (c0, c1, energy) points.
    ///
    /// Returns `None` when the points project onto a line in concentration
    /// space, i.e. the plane would be vertical.
    pub fn through(points: [Vector3<f64>; 3], eps: f64) -> Option<Self> {
        let [p, q, r] = points;
        let projected_area = (q.x - p.x) * (r.y - p.y) - (r.x - p.x) * (q.y - p.y);
        if projected_area.abs() <= eps {
            return None;
        }
        let system = Matrix3::new(
            p.x, p.y, 1.0,
            q.x, q.y, 1.0,
            r.x, r.y, 1.0,
        );
        let energies = Vector3::new(p.z, q.z, r.z);
        let solution = system.lu().solve(&energies)?;
        Some(Self {
            gradient: Vector2::new(solution.x, solution.y),
            intercept: solution.z,
        })
    }

    pub fn energy_at(&self, c0: f64, c1: f64) -> f64 {
        self.gradient.x * c0 + self.gradient.y * c1 + self.intercept
    }

    /// Chemical potential of the guest (axis 0) across this facet.
    ///
    /// With `c2 = 1 - c0 - c1`, the plane reads
    /// `E = (μ0 - μ2) c0 + (μ1 - μ2) c1 + μ2`.
    pub fn guest_potential(&self) -> f64 {
        self.gradient.x + self.intercept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_elemental_potentials() {
        // mu = (-1, -2, -3) for the three corners.
        let plane = EnergyPlane::through(
            [
                Vector3::new(1.0, 0.0, -1.0),
                Vector3::new(0.0, 1.0, -2.0),
                Vector3::new(0.0, 0.0, -3.0),
            ],
            1e-12,
        )
        .unwrap();
        assert!((plane.guest_potential() + 1.0).abs() < 1e-12);
        assert!((plane.energy_at(0.0, 0.0) + 3.0).abs() < 1e-12);
        assert!((plane.energy_at(0.25, 0.25) + 2.25).abs() < 1e-12);
    }

    #[test]
    fn vertical_planes_are_rejected() {
        let plane = EnergyPlane::through(
            [
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.5, 0.5, -1.0),
                Vector3::new(1.0, 1.0, 0.0),
            ],
            1e-12,
        );
        assert!(plane.is_none());
    }
}
