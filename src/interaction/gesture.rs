use rand::Rng;

pub const POINTS_PER_SEGMENT: usize = 20;
pub const CONTROL_JITTER: f64 = 20.0;

/// Standard normal sample (Box-Muller).
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std_dev
}

fn cubic(p0: f64, c1: f64, c2: f64, p1: f64, t: f64) -> f64 {
    let u = 1.0 - t;
    u.powi(3) * p0 + 3.0 * u.powi(2) * t * c1 + 3.0 * u * t.powi(2) * c2 + t.powi(3) * p1
}

/// Cubic Bézier segments between consecutive points with jittered control points.
/// Each segment starts exactly on its start point and ends on its end point.
pub fn natural_curve<R: Rng + ?Sized>(points: &[(f64, f64)], rng: &mut R) -> Vec<(f64, f64)> {
    if points.len() < 2 {
        return points.to_vec();
    }

    let mut curve = Vec::with_capacity((points.len() - 1) * POINTS_PER_SEGMENT);
    for pair in points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let c1 = (start.0 + gaussian(rng, CONTROL_JITTER), start.1 + gaussian(rng, CONTROL_JITTER));
        let c2 = (end.0 + gaussian(rng, CONTROL_JITTER), end.1 + gaussian(rng, CONTROL_JITTER));

        for i in 0..POINTS_PER_SEGMENT {
            let t = i as f64 / (POINTS_PER_SEGMENT - 1) as f64;
            curve.push((
                cubic(start.0, c1.0, c2.0, end.0, t),
                cubic(start.1, c1.1, c2.1, end.1, t),
            ));
        }
    }
    curve
}
