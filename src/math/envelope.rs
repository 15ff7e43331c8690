use super::planar::{convex_polygon, cross, lower_chain};
use super::plane::EnergyPlane;
use nalgebra::{Vector2, Vector3};
use std::collections::{BTreeMap, VecDeque};

/// One planar face of a lower envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeFace {
    /// Counter-clockwise polygon of point indices.
    pub polygon: Vec<usize>,
    pub plane: EnergyPlane,
}

/// Lower convex envelope of lifted `(c0, c1, energy)` points over `candidates`.
///
/// Gift wrapping: the first face hangs off the lowest edge of the projected
/// boundary, and each face is reached from a neighbour by pivoting a plane
/// about their shared edge. Every pivot scans the candidates once, so the
/// walk is O(faces · n). Coplanar points (within `tolerance`) merge into a
/// single polygonal face, and only the lowest point per composition takes
/// part. Faces come back ordered by their coplanar index set.
///
/// Returns `None` when the candidates do not span a triangle.
pub fn lower_envelope(
    lifted: &[Vector3<f64>],
    candidates: &[usize],
    tolerance: f64,
    eps: f64,
) -> Option<Vec<EnvelopeFace>> {
    let projected: Vec<Vector2<f64>> = lifted.iter().map(|p| Vector2::new(p.x, p.y)).collect();
    let sites = lowest_per_site(lifted, candidates, eps);
    let boundary = convex_polygon(&projected, &sites, eps);
    if boundary.len() < 3 {
        return None;
    }

    // Seed: a boundary edge of the lower envelope, interior to its left.
    let (u, v) = lowest_boundary_edge(lifted, &projected, &sites, boundary[0], boundary[1], eps)?;
    let (pu, pv) = (projected[u], projected[v]);
    let span = pv - pu;
    let rise = lifted[v].z - lifted[u].z;
    let along_edge = |p: &Vector3<f64>| {
        let t = (Vector2::new(p.x, p.y) - pu).dot(&span) / span.norm_squared();
        lifted[u].z + t * rise
    };
    let c = pivot(lifted, &projected, &sites, (u, v), 1.0, along_edge, eps)?;
    let seed = EnergyPlane::through([lifted[u], lifted[v], lifted[c]], eps)?;

    let mut faces: BTreeMap<Vec<usize>, EnvelopeFace> = BTreeMap::new();
    let mut pending: VecDeque<Vec<usize>> = VecDeque::new();
    let (key, face) = face_on(seed, lifted, &projected, &sites, tolerance, eps);
    pending.push_back(key.clone());
    faces.insert(key, face);

    while let Some(key) = pending.pop_front() {
        let Some(face) = faces.get(&key).cloned() else {
            continue;
        };
        let n = face.polygon.len();
        for k in 0..n {
            let edge = (face.polygon[k], face.polygon[(k + 1) % n]);
            // Beyond the edge means to its right.
            let height = |p: &Vector3<f64>| face.plane.energy_at(p.x, p.y);
            let Some(c) = pivot(lifted, &projected, &sites, edge, -1.0, height, eps) else {
                continue;
            };
            let Some(plane) = EnergyPlane::through([lifted[edge.0], lifted[edge.1], lifted[c]], eps) else {
                continue;
            };
            let (next_key, next) = face_on(plane, lifted, &projected, &sites, tolerance, eps);
            if !faces.contains_key(&next_key) {
                pending.push_back(next_key.clone());
                faces.insert(next_key, next);
            }
        }
    }

    Some(faces.into_values().collect())
}

/// Candidates with duplicate compositions reduced to their lowest energy.
/// Ascending index order.
fn lowest_per_site(lifted: &[Vector3<f64>], candidates: &[usize], eps: f64) -> Vec<usize> {
    let mut order = candidates.to_vec();
    order.sort_by(|&i, &j| {
        lifted[i]
            .x
            .total_cmp(&lifted[j].x)
            .then(lifted[i].y.total_cmp(&lifted[j].y))
            .then(lifted[i].z.total_cmp(&lifted[j].z))
            .then(i.cmp(&j))
    });

    let mut sites: Vec<usize> = Vec::with_capacity(order.len());
    for idx in order {
        if let Some(&last) = sites.last() {
            if (lifted[last].x - lifted[idx].x).abs() <= eps && (lifted[last].y - lifted[idx].y).abs() <= eps {
                continue;
            }
        }
        sites.push(idx);
    }
    sites.sort_unstable();
    sites
}

/// First lower edge leaving boundary corner `from` towards corner `to`.
///
/// Points lying on that side of the boundary may dip below the straight
/// corner-to-corner segment, so the edge comes from their lower chain.
fn lowest_boundary_edge(
    lifted: &[Vector3<f64>],
    projected: &[Vector2<f64>],
    sites: &[usize],
    from: usize,
    to: usize,
    eps: f64,
) -> Option<(usize, usize)> {
    let (a, b) = (projected[from], projected[to]);
    let span = b - a;
    let on_side: Vec<usize> = sites
        .iter()
        .copied()
        .filter(|&i| cross(&a, &b, &projected[i]).abs() <= eps)
        .collect();
    let profile: Vec<Vector2<f64>> = lifted
        .iter()
        .zip(projected)
        .map(|(p, q)| Vector2::new((q - a).dot(&span) / span.norm_squared(), p.z))
        .collect();
    let chain = lower_chain(&profile, &on_side, eps);
    match chain.as_slice() {
        [first, second, ..] => Some((*first, *second)),
        _ => None,
    }
}

/// Pivots the plane `height` about `edge` and returns the first candidate it
/// meets on the given side (`1.0` for left, `-1.0` for right).
///
/// Planes through the edge differ from `height` by `s · offset(p)`, with
/// `offset` the signed distance from the edge line; the supporting one has
/// the smallest `s` over the points on that side.
fn pivot(
    lifted: &[Vector3<f64>],
    projected: &[Vector2<f64>],
    sites: &[usize],
    edge: (usize, usize),
    side: f64,
    height: impl Fn(&Vector3<f64>) -> f64,
    eps: f64,
) -> Option<usize> {
    let (a, b) = (projected[edge.0], projected[edge.1]);
    let mut best: Option<(f64, usize)> = None;
    for &q in sites {
        let offset = side * cross(&a, &b, &projected[q]);
        if offset <= eps {
            continue;
        }
        let slope = (lifted[q].z - height(&lifted[q])) / offset;
        if best.map_or(true, |(s, _)| slope < s) {
            best = Some((slope, q));
        }
    }
    best.map(|(_, q)| q)
}

fn face_on(
    plane: EnergyPlane,
    lifted: &[Vector3<f64>],
    projected: &[Vector2<f64>],
    sites: &[usize],
    tolerance: f64,
    eps: f64,
) -> (Vec<usize>, EnvelopeFace) {
    let coplanar: Vec<usize> = sites
        .iter()
        .copied()
        .filter(|&i| (lifted[i].z - plane.energy_at(lifted[i].x, lifted[i].y)).abs() <= tolerance)
        .collect();
    let polygon = convex_polygon(projected, &coplanar, eps);
    (coplanar, EnvelopeFace { polygon, plane })
}
