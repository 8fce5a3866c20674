//! Small vector helpers on `[f64; 3]`.

pub fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

pub fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    norm(sub(a, b))
}

/// Unit vector in the direction of `a`; the zero vector stays zero.
pub fn normalize(a: [f64; 3]) -> [f64; 3] {
    let n = norm(a);
    if n < 1e-15 {
        a
    } else {
        scale(a, 1.0 / n)
    }
}

/// True when `a` and `b` point along the same line (either sense).
pub fn parallel(a: [f64; 3], b: [f64; 3], angular_tol: f64) -> bool {
    norm(cross(normalize(a), normalize(b))) <= angular_tol
}

/// True when `a` and `b` are perpendicular.
pub fn perpendicular(a: [f64; 3], b: [f64; 3], angular_tol: f64) -> bool {
    dot(normalize(a), normalize(b)).abs() <= angular_tol
}

/// Signed distance of `p` from the plane through `origin` with unit `normal`.
pub fn plane_distance(p: [f64; 3], origin: [f64; 3], normal: [f64; 3]) -> f64 {
    dot(sub(p, origin), normalize(normal))
}

/// Distance of `p` from the infinite line through `origin` along `dir`.
pub fn line_distance(p: [f64; 3], origin: [f64; 3], dir: [f64; 3]) -> f64 {
    norm(cross(sub(p, origin), normalize(dir)))
}

/// Newell normal of a closed polygon; its length is twice the polygon area.
pub fn newell(points: &[[f64; 3]]) -> [f64; 3] {
    let mut n = [0.0; 3];
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        n[0] += (p[1] - q[1]) * (p[2] + q[2]);
        n[1] += (p[2] - q[2]) * (p[0] + q[0]);
        n[2] += (p[0] - q[0]) * (p[1] + q[1]);
    }
    n
}

pub fn polygon_area(points: &[[f64; 3]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    0.5 * norm(newell(points))
}

pub fn centroid(points: &[[f64; 3]]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let sum = points.iter().fold([0.0; 3], |acc, p| add(acc, *p));
    scale(sum, 1.0 / points.len() as f64)
}

/// A unit vector perpendicular to `normal`, preferring the global X axis.
pub fn tangent_x_from_normal(normal: [f64; 3]) -> [f64; 3] {
    let n = normalize(normal);
    let reference = if n[0].abs() > 0.9 {
        [0.0, 1.0, 0.0]
    } else {
        [1.0, 0.0, 0.0]
    };
    normalize(sub(reference, scale(n, dot(reference, n))))
}

/// Index of the single non-zero component of an axis-aligned direction.
pub fn axis_index(dir: [f64; 3], angular_tol: f64) -> Option<usize> {
    let d = normalize(dir);
    (0..3).find(|&i| (d[i].abs() - 1.0).abs() <= angular_tol)
}
