//! Gap filling of a regularly sampled time series.
//!
//! Missing samples are NaN. A missing first (last) sample is first replaced by the start (end)
//! fallback value, which makes every remaining gap an interior one; interior gaps are then
//! interpolated from the known samples only, never from previously filled ones.
//!
//! A gap outside the known samples (possible only with a NaN fallback) holds the nearest known
//! value. A series without any known sample is left untouched.
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapFilling {
    /// Straight line between the nearest known samples on each side.
    #[default]
    Linear,
    /// Parabola through the three known samples nearest to the gap.
    Quadratic,
    /// Natural cubic spline through all known samples.
    Spline,
}

/// Fill every NaN of `series` in place.
///
/// Arguments
/// -----------------
/// * `series`: one value per time slot, NaN for missing slots.
/// * `method`: interpolation used for interior gaps.
/// * `start_fallback`, `end_fallback`: values taken by a missing first / last slot.
pub fn fill_gaps(series: &mut [f64], method: GapFilling, start_fallback: f64, end_fallback: f64) {
    let n = series.len();
    if n == 0 {
        return;
    }
    if series[0].is_nan() {
        series[0] = start_fallback;
    }
    if series[n - 1].is_nan() {
        series[n - 1] = end_fallback;
    }

    let known: Vec<usize> = (0..n).filter(|&i| !series[i].is_nan()).collect();
    if known.is_empty() || known.len() == n {
        return;
    }

    let spline = match method {
        GapFilling::Spline if known.len() >= 3 => NaturalSpline::through(series, &known),
        _ => None,
    };

    for i in 0..n {
        if !series[i].is_nan() {
            continue;
        }
        let value = match (method, &spline) {
            (GapFilling::Quadratic, _) if known.len() >= 3 => quadratic_at(series, &known, i)
                .unwrap_or_else(|| linear_at(series, &known, i)),
            (GapFilling::Spline, Some(spline)) => spline.at(series, &known, i),
            _ => linear_at(series, &known, i),
        };
        series[i] = value;
    }
}

/// Position of `i` among the known samples: the last known index before it.
fn left_neighbour(known: &[usize], i: usize) -> usize {
    known.partition_point(|&k| k < i).saturating_sub(1)
}

/// Known samples `(x0, x1)` enclosing `i`, or the nearest one twice when `i` is outside them.
fn enclosing(known: &[usize], i: usize) -> (usize, usize) {
    let first = known[0];
    let last = known[known.len() - 1];
    if i <= first {
        return (first, first);
    }
    if i >= last {
        return (last, last);
    }
    let l = left_neighbour(known, i);
    (known[l], known[l + 1])
}

fn linear_at(series: &[f64], known: &[usize], i: usize) -> f64 {
    let (x0, x1) = enclosing(known, i);
    if x0 == x1 {
        return series[x0];
    }
    series[x0] + (series[x1] - series[x0]) * (i - x0) as f64 / (x1 - x0) as f64
}

fn quadratic_at(series: &[f64], known: &[usize], i: usize) -> Option<f64> {
    if i < known[0] || i > known[known.len() - 1] {
        return None;
    }
    // Three consecutive known samples around the gap, the tighter of the two candidate windows.
    let l = left_neighbour(known, i);
    let last = known.len() - 3;
    let spread = |s: usize| known[s..s + 3].iter().map(|&k| k.abs_diff(i)).max();
    let (s0, s1) = (l.saturating_sub(1).min(last), l.min(last));
    let start = if spread(s1) < spread(s0) { s1 } else { s0 };
    let xs = &known[start..start + 3];

    let a = Matrix3::from_fn(|r, c| (xs[r] as f64).powi(c as i32));
    let b = Vector3::from_fn(|r, _| series[xs[r]]);
    let coef = a.lu().solve(&b)?;
    let x = i as f64;
    Some(coef[0] + coef[1] * x + coef[2] * x * x)
}

/// Second derivatives of the natural cubic spline at every known sample.
#[derive(Debug)]
struct NaturalSpline {
    m: Vec<f64>,
}

impl NaturalSpline {
    /// Solve the tridiagonal system of the interior knots; `m` is zero at both ends.
    fn through(series: &[f64], known: &[usize]) -> Option<Self> {
        let k = known.len();
        let x = |j: usize| known[j] as f64;
        let y = |j: usize| series[known[j]];
        let h = |j: usize| x(j + 1) - x(j);

        let size = k - 2;
        let mut a = DMatrix::<f64>::zeros(size, size);
        let mut b = DVector::<f64>::zeros(size);
        for r in 0..size {
            let j = r + 1;
            a[(r, r)] = 2.0 * (h(j - 1) + h(j));
            if r > 0 {
                a[(r, r - 1)] = h(j - 1);
            }
            if r + 1 < size {
                a[(r, r + 1)] = h(j);
            }
            b[r] = 6.0 * ((y(j + 1) - y(j)) / h(j) - (y(j) - y(j - 1)) / h(j - 1));
        }
        let interior = a.lu().solve(&b)?;

        let mut m = vec![0.0; k];
        m[1..k - 1].copy_from_slice(interior.as_slice());
        Some(NaturalSpline { m })
    }

    fn at(&self, series: &[f64], known: &[usize], i: usize) -> f64 {
        let (x0, x1) = enclosing(known, i);
        if x0 == x1 {
            return series[x0];
        }
        let j = left_neighbour(known, i);
        let (m0, m1) = (self.m[j], self.m[j + 1]);
        let (y0, y1) = (series[x0], series[x1]);
        let h = (x1 - x0) as f64;
        let (a, b) = ((x1 - i) as f64, (i - x0) as f64);

        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}
