use ndarray::{Array3, Axis};

/// Pole of the cubic B-spline prefilter, sqrt(3) - 2.
const POLE: f64 = -0.267_949_192_431_122_7;
const TOLERANCE: f64 = 1e-10;

/// Input voxel read by one output voxel along one axis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CubicTap {
    pub index: [usize; 4],
    pub weight: [f64; 4],
}

/// Samples whose continuous index falls outside `[-0.5, n - 0.5)` take the fill value.
#[inline]
fn is_inside(c: f64, n: usize) -> bool {
    c >= -0.5 && c < n as f64 - 0.5
}

/// Mirror an out-of-range index back into `[0, n)` (whole-sample symmetric boundary).
#[inline]
fn mirror(k: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let mut k = k.rem_euclid(period);
    if k >= n as isize {
        k = period - k;
    }
    k as usize
}

/// Nearest input index for each output index on one axis; `None` marks fill.
pub(crate) fn nearest_taps(out_len: usize, scale: f64, in_len: usize) -> Vec<Option<usize>> {
    (0..out_len)
        .map(|i| {
            let c = i as f64 * scale;
            if !is_inside(c, in_len) {
                return None;
            }
            // round half up, as the reference nearest-neighbor interpolator does
            let idx = (c + 0.5).floor().clamp(0.0, (in_len - 1) as f64);
            Some(idx as usize)
        })
        .collect()
}

/// Cubic B-spline basis weights and mirrored indices for each output index on one axis.
pub(crate) fn cubic_taps(out_len: usize, scale: f64, in_len: usize) -> Vec<Option<CubicTap>> {
    (0..out_len)
        .map(|i| {
            let c = i as f64 * scale;
            if !is_inside(c, in_len) {
                return None;
            }
            let f = c.floor();
            let t = c - f;
            let t2 = t * t;
            let t3 = t2 * t;
            let weight = [
                (1.0 - t).powi(3) / 6.0,
                (4.0 - 6.0 * t2 + 3.0 * t3) / 6.0,
                (1.0 + 3.0 * t + 3.0 * t2 - 3.0 * t3) / 6.0,
                t3 / 6.0,
            ];
            let base = f as isize - 1;
            let index = std::array::from_fn(|k| mirror(base + k as isize, in_len));
            Some(CubicTap { index, weight })
        })
        .collect()
}

#[inline]
pub(crate) fn evaluate_cubic(
    coeffs: &Array3<f64>,
    tx: &CubicTap,
    ty: &CubicTap,
    tz: &CubicTap,
) -> f64 {
    let mut acc = 0.0;
    for (&ix, &wx) in tx.index.iter().zip(&tx.weight) {
        for (&iy, &wy) in ty.index.iter().zip(&ty.weight) {
            let wxy = wx * wy;
            for (&iz, &wz) in tz.index.iter().zip(&tz.weight) {
                acc += wxy * wz * coeffs[[ix, iy, iz]];
            }
        }
    }
    acc
}

/// Interpolating cubic B-spline coefficients: the separable recursive prefilter
/// applied along every axis, with mirror-symmetric boundaries.
pub(crate) fn bspline_coefficients(data: &Array3<f32>) -> Array3<f64> {
    let mut coeffs = data.mapv(f64::from);
    let mut line = Vec::new();
    for axis in 0..3 {
        for mut lane in coeffs.lanes_mut(Axis(axis)) {
            line.clear();
            line.extend(lane.iter().copied());
            prefilter_line(&mut line);
            for (dst, &src) in lane.iter_mut().zip(&line) {
                *dst = src;
            }
        }
    }
    coeffs
}

fn prefilter_line(c: &mut [f64]) {
    let n = c.len();
    if n < 2 {
        return;
    }
    let z = POLE;
    let gain = (1.0 - z) * (1.0 - 1.0 / z);
    for v in c.iter_mut() {
        *v *= gain;
    }

    c[0] = initial_causal(c, z);
    for k in 1..n {
        c[k] += z * c[k - 1];
    }

    c[n - 1] = (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1]);
    for k in (0..n - 1).rev() {
        c[k] = z * (c[k + 1] - c[k]);
    }
}

fn initial_causal(c: &[f64], z: f64) -> f64 {
    let n = c.len();
    let horizon = (TOLERANCE.ln() / z.abs().ln()).ceil() as usize;

    if horizon < n {
        // truncated geometric sum is accurate to TOLERANCE
        let mut zn = z;
        let mut sum = c[0];
        for &v in &c[1..horizon] {
            sum += zn * v;
            zn *= z;
        }
        sum
    } else {
        let iz = 1.0 / z;
        let mut zn = z;
        let mut z2n = z.powi((n - 1) as i32);
        let mut sum = c[0] + z2n * c[n - 1];
        z2n *= z2n * iz;
        for &v in &c[1..n - 1] {
            sum += (zn + z2n) * v;
            zn *= z;
            z2n *= iz;
        }
        sum / (1.0 - zn * zn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mirror_reflects_without_repeating_edges() {
        assert_eq!(mirror(-1, 5), 1);
        assert_eq!(mirror(-2, 5), 2);
        assert_eq!(mirror(5, 5), 3);
        assert_eq!(mirror(6, 5), 2);
        assert_eq!(mirror(3, 1), 0);
    }

    #[test]
    fn cubic_weights_partition_unity() {
        for tap in cubic_taps(7, 0.37, 5).into_iter().flatten() {
            let sum: f64 = tap.weight.iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn nearest_marks_samples_past_the_edge() {
        // 4 input voxels sampled at twice the spacing: 0, 2, 4 -> last is out of range
        let taps = nearest_taps(3, 2.0, 4);
        assert_eq!(taps, vec![Some(0), Some(2), None]);
    }

    #[test]
    fn prefiltered_spline_reproduces_samples() {
        for len in [3usize, 9, 40] {
            let data =
                Array3::from_shape_fn((len, 2, 1), |(x, y, _)| ((x * 7 + y * 3) % 11) as f32);
            let coeffs = bspline_coefficients(&data);
            let tx = cubic_taps(len, 1.0, len);
            let ty = cubic_taps(2, 1.0, 2);
            let tz = cubic_taps(1, 1.0, 1);
            for x in 0..len {
                for y in 0..2 {
                    let v = evaluate_cubic(
                        &coeffs,
                        tx[x].as_ref().unwrap(),
                        ty[y].as_ref().unwrap(),
                        tz[0].as_ref().unwrap(),
                    );
                    assert_abs_diff_eq!(v, data[[x, y, 0]] as f64, epsilon = 1e-6);
                }
            }
        }
    }
}
