//! Deterministic k-fold partitioning

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KilnError, Result};

/// One train/test index partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// A full k-fold partition of `0..n`.
///
/// Test sets across folds are pairwise disjoint and their union covers the
/// whole index range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldPlan {
    n: usize,
    k: usize,
    seed: u64,
    folds: Vec<Fold>,
}

impl FoldPlan {
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }
}

/// Partition `0..n` into `k` folds, shuffled by `seed`.
///
/// Identical `(n, k, seed)` always yields identical fold membership. Fold
/// sizes differ by at most one; the first `n % k` folds take the extra
/// element. `k < 2` or `k > n` is rejected before any training begins.
pub fn partition(n: usize, k: usize, seed: u64) -> Result<FoldPlan> {
    if k < 2 {
        return Err(KilnError::ValidationError(format!(
            "fold count must be at least 2, got {}",
            k
        )));
    }
    if k > n {
        return Err(KilnError::ValidationError(format!(
            "fold count ({}) exceeds dataset size ({})",
            k, n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n / k;
    let remainder = n % k;

    let mut folds = Vec::with_capacity(k);
    let mut current = 0;
    for index in 0..k {
        let fold_size = if index < remainder { base + 1 } else { base };
        let test: Vec<usize> = indices[current..current + fold_size].to_vec();
        let train: Vec<usize> = indices[..current]
            .iter()
            .chain(indices[current + fold_size..].iter())
            .copied()
            .collect();
        folds.push(Fold { index, train, test });
        current += fold_size;
    }

    debug!(n, k, seed, "partitioned dataset");
    Ok(FoldPlan { n, k, seed, folds })
}
