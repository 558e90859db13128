//! Cumulative-weight sampler.
//!
//! Inclusive prefix sums built with Kahan compensated summation, and inverse
//! lookup by binary search (`cm[i]` is the sum of weights `0..=i`).

use rayon::prelude::*;

/// Draws whose scaled position exceeds the last cumulative entry by more than
/// this (relative) amount are counted as overshoots.
pub const OVERSHOOT_TOLERANCE: f64 = 1.0e-12;

/// Monotonic cumulative weight array.
#[derive(Debug, Clone, Default)]
pub struct CumulativeWeight {
    cm: Vec<f64>,
    total: f64,
    overshoots: usize,
}

impl CumulativeWeight {
    /// Build from element weights, optionally multiplied by profile values.
    pub fn build(weights: &[f64], profile: Option<&[f64]>) -> Self {
        match profile {
            Some(p) => {
                debug_assert_eq!(p.len(), weights.len());
                let scaled: Vec<f64> = weights.par_iter().zip(p).map(|(w, p)| w * p).collect();
                Self::from_weights(scaled.into_iter())
            }
            None => Self::from_weights(weights.iter().copied()),
        }
    }

    /// Build from parent weights gathered through element ids.
    pub fn build_indexed(parent_weights: &[f64], elt_ids: &[usize], profile: Option<&[f64]>) -> Self {
        match profile {
            Some(p) => {
                debug_assert_eq!(p.len(), elt_ids.len());
                let scaled: Vec<f64> = elt_ids
                    .par_iter()
                    .zip(p)
                    .map(|(&e, p)| parent_weights[e] * p)
                    .collect();
                Self::from_weights(scaled.into_iter())
            }
            None => Self::from_weights(elt_ids.iter().map(|&e| parent_weights[e])),
        }
    }

    fn from_weights(values: impl ExactSizeIterator<Item = f64>) -> Self {
        let mut cm = Vec::with_capacity(values.len());
        let mut sum = 0.0_f64;
        let mut c = 0.0_f64;
        let mut last = 0.0_f64;

        for w in values {
            // Zero weights must keep the exact previous prefix
            if w != 0.0 {
                let y = w - c;
                let t = sum + y;
                c = (t - sum) - y;
                sum = t;
                // Compensation may step backwards on tiny weights
                last = last.max(sum);
            }
            cm.push(last);
        }

        Self {
            cm,
            total: last,
            overshoots: 0,
        }
    }

    /// Sum of all weights.
    #[inline]
    pub fn total(&self) -> f64 {
        self.total
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cm.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cm.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.cm
    }

    /// Scale to `[0, 1]`. No-op when the total is zero.
    pub fn normalize(&mut self) {
        if self.total > 0.0 {
            let inv = 1.0 / self.total;
            for v in &mut self.cm {
                *v *= inv;
            }
            self.total = self.cm.last().copied().unwrap_or(0.0);
        }
    }

    /// Smallest index `i` with `cm[i] >= x`; `x` is clamped to the last entry.
    ///
    /// Must not be called on an empty array.
    pub fn locate(&self, x: f64) -> usize {
        locate(&self.cm, x)
    }

    /// Select an element for a uniform draw `u` in `[0, 1)` on a normalized
    /// array.
    ///
    /// A zero draw is nudged up so it never lands on a leading zero-weight
    /// element.
    pub fn sample(&mut self, u: f64) -> usize {
        let x = u.max(f64::MIN_POSITIVE);
        if let Some(&last) = self.cm.last()
            && x > last * (1.0 + OVERSHOOT_TOLERANCE)
        {
            self.overshoots += 1;
        }
        self.locate(x)
    }

    /// Number of draws clamped beyond [`OVERSHOOT_TOLERANCE`] so far.
    #[inline]
    pub fn overshoots(&self) -> usize {
        self.overshoots
    }
}

/// Binary search: smallest `i` with `a[i] >= x`, clamping `x` to `a[n-1]`.
pub fn locate(a: &[f64], x: f64) -> usize {
    debug_assert!(!a.is_empty());
    let end = a.len() - 1;
    let x = x.min(a[end]);
    a[..end].partition_point(|&v| v < x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_prefix_sums() {
        let cw = CumulativeWeight::build(&[1.0, 1.0, 2.0], None);
        assert_eq!(cw.as_slice(), &[1.0, 2.0, 4.0]);
        assert_eq!(cw.total(), 4.0);
    }

    #[test]
    fn test_build_with_profile() {
        let cw = CumulativeWeight::build(&[1.0, 1.0, 2.0], Some(&[2.0, 0.0, 1.0]));
        assert_eq!(cw.as_slice(), &[2.0, 2.0, 4.0]);
    }

    #[test]
    fn test_build_indexed() {
        let parent = [10.0, 1.0, 5.0, 2.0];
        let cw = CumulativeWeight::build_indexed(&parent, &[1, 3], None);
        assert_eq!(cw.as_slice(), &[1.0, 3.0]);
    }

    #[test]
    fn test_kahan_beats_naive() {
        // One large weight followed by many tiny ones
        let mut weights = vec![1.0e8];
        weights.extend(std::iter::repeat_n(1.0e-8, 100_000));
        let cw = CumulativeWeight::build(&weights, None);
        let exact = 1.0e8 + 1.0e-3;
        assert!((cw.total() - exact).abs() < 1.0e-6);
    }

    #[test]
    fn test_locate() {
        let cw = CumulativeWeight::build(&[1.0, 1.0, 2.0], None);
        assert_eq!(cw.locate(0.5), 0);
        assert_eq!(cw.locate(1.0), 0);
        assert_eq!(cw.locate(1.5), 1);
        assert_eq!(cw.locate(3.9), 2);
        // Overshoot clamps to the last entry
        assert_eq!(cw.locate(7.0), 2);
    }

    #[test]
    fn test_locate_skips_zero_weights() {
        let mut cw = CumulativeWeight::build(&[0.0, 0.0, 3.0, 0.0], None);
        cw.normalize();
        assert_eq!(cw.sample(0.0), 2);
        assert_eq!(cw.sample(0.999), 2);
    }

    #[test]
    fn test_sample_counts_overshoot() {
        let mut cw = CumulativeWeight::build(&[1.0, 1.0], None);
        cw.normalize();
        assert_eq!(cw.sample(0.75), 1);
        assert_eq!(cw.overshoots(), 0);
        assert_eq!(cw.sample(1.5), 1);
        assert_eq!(cw.overshoots(), 1);
    }

    #[test]
    fn test_normalize_zero_total() {
        let mut cw = CumulativeWeight::build(&[0.0, 0.0], None);
        cw.normalize();
        assert_eq!(cw.total(), 0.0);
        assert_eq!(cw.as_slice(), &[0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn prop_cumulative_non_decreasing(weights in prop::collection::vec(0.0f64..1.0e6, 1..200)) {
            let cw = CumulativeWeight::build(&weights, None);
            for pair in cw.as_slice().windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }

        #[test]
        fn prop_locate_at_entry(weights in prop::collection::vec(0.0f64..100.0, 1..100)) {
            let cw = CumulativeWeight::build(&weights, None);
            for (i, &v) in cw.as_slice().iter().enumerate() {
                prop_assert!(cw.locate(v) <= i);
            }
        }

        #[test]
        fn prop_locate_monotonic(
            weights in prop::collection::vec(0.0f64..100.0, 1..100),
            a in 0.0f64..1.0,
            b in 0.0f64..1.0,
        ) {
            let mut cw = CumulativeWeight::build(&weights, None);
            cw.normalize();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(cw.locate(lo) <= cw.locate(hi));
        }
    }
}
