use nalgebra::Vector2;

type Point2 = Vector2<f64>;

/// Twice the signed area of the triangle (o, a, b). Positive for a
/// counter-clockwise turn.
pub fn cross(o: &Point2, a: &Point2, b: &Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Sorts indices by (x, y) so the chains below are deterministic.
fn sorted_indices(points: &[Point2], indices: &[usize]) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&i, &j| {
        points[i]
            .x
            .total_cmp(&points[j].x)
            .then(points[i].y.total_cmp(&points[j].y))
            .then(i.cmp(&j))
    });
    sorted
}

/// Lower chain of Andrew's monotone-chain algorithm over `indices`.
///
/// Collinear and duplicate points are dropped, so the chain holds only
/// strict vertices, ordered by ascending x.
pub fn lower_chain(points: &[Point2], indices: &[usize], eps: f64) -> Vec<usize> {
    let mut chain: Vec<usize> = Vec::with_capacity(indices.len());
    for idx in sorted_indices(points, indices) {
        while chain.len() >= 2
            && cross(&points[chain[chain.len() - 2]], &points[chain[chain.len() - 1]], &points[idx]) <= eps
        {
            chain.pop();
        }
        // Same abscissa as the previous vertex: keep the lower one.
        if let Some(&last) = chain.last() {
            if (points[last].x - points[idx].x).abs() <= eps {
                continue;
            }
        }
        chain.push(idx);
    }
    chain
}

/// Counter-clockwise convex polygon around `indices` (monotone chain).
pub fn convex_polygon(points: &[Point2], indices: &[usize], eps: f64) -> Vec<usize> {
    let sorted = sorted_indices(points, indices);
    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<usize> = Vec::with_capacity(sorted.len());
    for &idx in &sorted {
        while lower.len() >= 2
            && cross(&points[lower[lower.len() - 2]], &points[lower[lower.len() - 1]], &points[idx]) <= eps
        {
            lower.pop();
        }
        lower.push(idx);
    }
    let mut upper: Vec<usize> = Vec::with_capacity(sorted.len());
    for &idx in sorted.iter().rev() {
        while upper.len() >= 2
            && cross(&points[upper[upper.len() - 2]], &points[upper[upper.len() - 1]], &points[idx]) <= eps
        {
            upper.pop();
        }
        upper.push(idx);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// True when every point lies on one line (or they all coincide).
pub fn all_collinear(points: &[Point2], indices: &[usize], eps: f64) -> bool {
    let Some(&first) = indices.first() else {
        return true;
    };
    let Some(&far) = indices
        .iter()
        .max_by(|&&a, &&b| {
            (points[a] - points[first])
                .norm_squared()
                .total_cmp(&(points[b] - points[first]).norm_squared())
        })
    else {
        return true;
    };
    if (points[far] - points[first]).norm_squared() <= eps * eps {
        return true;
    }
    indices
        .iter()
        .all(|&idx| cross(&points[first], &points[far], &points[idx]).abs() <= eps)
}

/// Parameter interval `[t0, t1]` of the segment `start + t (end - start)`,
/// `t` in [0, 1], lying inside the convex counter-clockwise polygon.
///
/// Returns `None` when the segment misses the polygon or only grazes it.
pub fn clip_segment(polygon: &[Point2], start: &Point2, end: &Point2, eps: f64) -> Option<(f64, f64)> {
    if polygon.len() < 3 {
        return None;
    }
    let direction = end - start;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);

    for (k, a) in polygon.iter().enumerate() {
        let b = &polygon[(k + 1) % polygon.len()];
        let edge = b - a;
        // Inside means a non-negative cross product with the edge.
        let at_start = edge.x * (start.y - a.y) - edge.y * (start.x - a.x);
        let rate = edge.x * direction.y - edge.y * direction.x;
        if rate.abs() < 1e-14 {
            if at_start < -eps {
                return None;
            }
            continue;
        }
        let t = -at_start / rate;
        if rate > 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
    }

    if t1 - t0 > eps {
        Some((t0, t1))
    } else {
        None
    }
}
