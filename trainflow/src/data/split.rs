//! Random train/test split of a table.

use super::table::Table;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Number of test rows for `n_rows` rows at `test_ratio`, rounded up.
#[must_use]
pub fn test_row_count(n_rows: usize, test_ratio: f64) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let n_test = (n_rows as f64 * test_ratio).ceil() as usize;
    n_test.min(n_rows)
}

/// Shuffles the rows and splits them into `(train, test)`.
///
/// Without a seed the shuffle draws from OS entropy and differs per call.
#[must_use]
pub fn train_test_split(table: &Table, test_ratio: f64, seed: Option<u64>) -> (Table, Table) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut indices: Vec<usize> = (0..table.n_rows()).collect();
    indices.shuffle(&mut rng);

    let n_test = test_row_count(indices.len(), test_ratio);
    let (test_idx, train_idx) = indices.split_at(n_test);
    (table.select_rows(train_idx), table.select_rows(test_idx))
}
