//! Smooth weighted round-robin strategy.
//!
//! Interleaves selections in proportion to weight instead of emitting a
//! burst per target: weights `{a: 5, b: 1, c: 1}` yield `a a a a a b c`
//! ordered so that over any window of `Σw` calls each target is chosen
//! exactly `w` times.

use std::sync::Mutex;

use crate::load_balancer::Balancer;

/// Greatest common divisor. `gcd(a, 0) == a`.
pub fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = if a < b { (b, a) } else { (a, b) };
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// GCD across all weights. A single weight is its own GCD; zeros are neutral.
pub fn n_gcd(weights: &[u32]) -> u32 {
    weights.iter().copied().fold(0, gcd)
}

/// Mutable scheduling state, shared by all callers of one scheduler.
#[derive(Debug)]
struct State {
    /// Index returned by the previous call.
    last_index: usize,
    /// Current weight threshold.
    current_weight: i64,
}

/// Smooth weighted round-robin selector.
#[derive(Debug)]
pub struct SmoothWeighted {
    weights: Vec<u32>,
    max_weight: i64,
    step: i64,
    state: Mutex<State>,
}

impl SmoothWeighted {
    /// Build a scheduler over `weights`.
    ///
    /// Returns `None` for an empty weight list; the owning engine reports
    /// that as a construction error.
    pub fn new(weights: Vec<u32>) -> Option<Self> {
        if weights.is_empty() {
            return None;
        }
        let max_weight = weights.iter().copied().max().unwrap_or(0) as i64;
        let step = n_gcd(&weights) as i64;
        let last_index = weights.len() - 1;

        Some(Self {
            weights,
            max_weight,
            step,
            state: Mutex::new(State {
                last_index,
                current_weight: 0,
            }),
        })
    }

    /// Number of targets this scheduler distributes over.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[u32] {
        &self.weights
    }
}

impl Balancer for SmoothWeighted {
    fn select(&self) -> usize {
        // All-zero weights: nothing can ever clear the threshold.
        if self.max_weight == 0 {
            return 0;
        }

        let n = self.weights.len();
        let mut state = self.state.lock().expect("balancer mutex poisoned");

        loop {
            state.last_index = (state.last_index + 1) % n;

            if state.last_index == 0 {
                state.current_weight -= self.step;
                if state.current_weight <= 0 {
                    state.current_weight = self.max_weight;
                }
            }

            if self.weights[state.last_index] as i64 >= state.current_weight {
                return state.last_index;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn counts(lb: &SmoothWeighted, calls: usize) -> Vec<usize> {
        let mut counts = vec![0; lb.len()];
        for _ in 0..calls {
            counts[lb.select()] += 1;
        }
        counts
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(10, 12), 2);
        assert_eq!(gcd(12, 10), 2);
        assert_eq!(gcd(7, 0), 7);
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(gcd(0, 0), 0);
        assert_eq!(gcd(17, 5), 1);
    }

    #[test]
    fn test_n_gcd() {
        assert_eq!(n_gcd(&[4, 8, 16]), 4);
        assert_eq!(n_gcd(&[9]), 9);
        assert_eq!(n_gcd(&[0, 6, 9]), 3);
        assert_eq!(n_gcd(&[20, 30, 50]), 10);
    }

    #[test]
    fn test_empty_weights_rejected() {
        assert!(SmoothWeighted::new(vec![]).is_none());
    }

    #[test]
    fn test_smooth_sequence() {
        let lb = SmoothWeighted::new(vec![5, 1, 1]).unwrap();
        let seq: Vec<usize> = (0..7).map(|_| lb.select()).collect();
        assert_eq!(seq, vec![0, 0, 0, 0, 0, 1, 2]);

        let lb = SmoothWeighted::new(vec![2, 1]).unwrap();
        let seq: Vec<usize> = (0..6).map(|_| lb.select()).collect();
        assert_eq!(seq, vec![0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_exact_share_per_window() {
        let weights = vec![3, 1, 4, 2];
        let total: u32 = weights.iter().sum();
        let lb = SmoothWeighted::new(weights.clone()).unwrap();

        for _ in 0..5 {
            let got = counts(&lb, total as usize);
            let want: Vec<usize> = weights.iter().map(|w| *w as usize).collect();
            assert_eq!(got, want);
        }
    }

    #[test]
    fn test_proportional_share() {
        let lb = SmoothWeighted::new(vec![20, 30, 50]).unwrap();
        let got = counts(&lb, 10_000);
        for (count, share) in got.iter().zip([0.20, 0.30, 0.50]) {
            let ratio = *count as f64 / 10_000.0;
            assert!((ratio - share).abs() <= 0.05, "ratio {ratio} vs {share}");
        }
    }

    #[test]
    fn test_all_zero_weights() {
        let lb = SmoothWeighted::new(vec![0, 0, 0]).unwrap();
        for _ in 0..100 {
            assert_eq!(lb.select(), 0);
        }
    }

    #[test]
    fn test_zero_weight_never_selected() {
        let lb = SmoothWeighted::new(vec![0, 5, 0, 5]).unwrap();
        for _ in 0..100 {
            let idx = lb.select();
            assert!(idx == 1 || idx == 3);
        }
    }

    #[test]
    fn test_single_target() {
        let lb = SmoothWeighted::new(vec![7]).unwrap();
        for _ in 0..10 {
            assert_eq!(lb.select(), 0);
        }
    }

    #[test]
    fn test_concurrent_selection_keeps_shares() {
        let lb = Arc::new(SmoothWeighted::new(vec![1, 2, 3]).unwrap());
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let lb = lb.clone();
                std::thread::spawn(move || {
                    let mut counts = [0usize; 3];
                    for _ in 0..600 {
                        counts[lb.select()] += 1;
                    }
                    counts
                })
            })
            .collect();

        let mut total = [0usize; 3];
        for h in handles {
            let c = h.join().unwrap();
            for i in 0..3 {
                total[i] += c[i];
            }
        }
        // 3600 calls are a whole number of 6-call windows.
        assert_eq!(total, [600, 1200, 1800]);
    }
}
