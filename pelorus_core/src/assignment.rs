//! Optimal minimum-cost assignment (Hungarian algorithm).
//!
//! The correlation engine builds one dense cost matrix per sensor batch:
//! rows are detections, columns are candidate tracks plus dummy "new track"
//! columns. Ungated pairs are masked with [`FORBIDDEN`]; because every row
//! has a dummy column cheaper than the mask, the optimum can never select a
//! masked cell, so the solver never forces a bad match.
//!
//! The implementation is the classic potentials/augmenting-path form,
//! O(rows² × cols) and allocation-light since it runs every cycle.

/// Sentinel cost for masked (ungated) pairs.
///
/// Kept finite so the dual potentials stay well-defined; strictly greater
/// than any reachable pair cost and any new-track cost.
pub const FORBIDDEN: f64 = 1.0e6;

/// Dense row-major cost matrix, `rows <= cols`.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    costs: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl CostMatrix {
    /// Creates a matrix with every cell masked.
    pub fn forbidden(rows: usize, cols: usize) -> Self {
        Self {
            costs: vec![FORBIDDEN; rows * cols],
            rows,
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.costs[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, cost: f64) {
        self.costs[row * self.cols + col] = cost;
    }

    /// True when the cell is masked.
    pub fn is_forbidden(&self, row: usize, col: usize) -> bool {
        self.get(row, col) >= FORBIDDEN
    }
}

/// Solves the minimum-cost assignment, returning the column chosen for each
/// row. Every row is assigned; columns are used at most once.
///
/// # Panics
///
/// Panics if `rows > cols`. Callers pad with dummy columns, so a matrix
/// with more rows than columns is a construction bug.
pub fn solve(matrix: &CostMatrix) -> Vec<usize> {
    let n = matrix.rows();
    let m = matrix.cols();
    assert!(n <= m, "cost matrix must have at least as many columns as rows");
    if n == 0 {
        return Vec::new();
    }

    // Dual potentials and matching, 1-indexed with a virtual 0th row/column.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut matched_row = vec![0usize; m + 1]; // matched_row[j] = row matched to column j
    let mut way = vec![0usize; m + 1];

    let mut min_to = vec![f64::INFINITY; m + 1];
    let mut used = vec![false; m + 1];

    for i in 1..=n {
        matched_row[0] = i;
        let mut j0 = 0usize;
        min_to.iter_mut().for_each(|x| *x = f64::INFINITY);
        used.iter_mut().for_each(|x| *x = false);

        // Grow the alternating tree until a free column is reached.
        loop {
            used[j0] = true;
            let i0 = matched_row[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let reduced = matrix.get(i0 - 1, j - 1) - u[i0] - v[j];
                if reduced < min_to[j] {
                    min_to[j] = reduced;
                    way[j] = j0;
                }
                if min_to[j] < delta {
                    delta = min_to[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[matched_row[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_to[j] -= delta;
                }
            }

            j0 = j1;
            if matched_row[j0] == 0 {
                break;
            }
        }

        // Unwind the augmenting path.
        loop {
            let j1 = way[j0];
            matched_row[j0] = matched_row[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0usize; n];
    for j in 1..=m {
        if matched_row[j] > 0 {
            assignment[matched_row[j] - 1] = j - 1;
        }
    }
    assignment
}

/// Total cost of an assignment against a matrix.
pub fn total_cost(matrix: &CostMatrix, assignment: &[usize]) -> f64 {
    assignment
        .iter()
        .enumerate()
        .map(|(row, &col)| matrix.get(row, col))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix_from(rows: usize, cols: usize, cells: &[f64]) -> CostMatrix {
        let mut m = CostMatrix::forbidden(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, cells[r * cols + c]);
            }
        }
        m
    }

    /// Exhaustive reference: tries every injective row -> column mapping.
    fn brute_force_min(matrix: &CostMatrix) -> f64 {
        fn recurse(matrix: &CostMatrix, row: usize, used: &mut Vec<bool>) -> f64 {
            if row == matrix.rows() {
                return 0.0;
            }
            let mut best = f64::INFINITY;
            for col in 0..matrix.cols() {
                if used[col] {
                    continue;
                }
                used[col] = true;
                let cost = matrix.get(row, col) + recurse(matrix, row + 1, used);
                used[col] = false;
                if cost < best {
                    best = cost;
                }
            }
            best
        }
        let mut used = vec![false; matrix.cols()];
        recurse(matrix, 0, &mut used)
    }

    #[test]
    fn test_trivial_square() {
        let m = matrix_from(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let assignment = solve(&m);
        assert_eq!(assignment, vec![0, 1]);
        assert_relative_eq!(total_cost(&m, &assignment), 2.0);
    }

    #[test]
    fn test_crossing_preference() {
        // Greedy would give row 0 its cheapest column (0 at cost 1) forcing
        // row 1 to cost 10; the optimum crosses for a total of 4.
        let m = matrix_from(2, 2, &[1.0, 2.0, 2.0, 10.0]);
        let assignment = solve(&m);
        assert_eq!(assignment, vec![1, 0]);
        assert_relative_eq!(total_cost(&m, &assignment), 4.0);
    }

    #[test]
    fn test_rectangular_leaves_columns_free() {
        let m = matrix_from(2, 4, &[5.0, 1.0, 9.0, 9.0, 1.0, 5.0, 9.0, 9.0]);
        let assignment = solve(&m);
        assert_eq!(assignment, vec![1, 0]);
    }

    #[test]
    fn test_forbidden_never_selected_with_dummies() {
        // One real column is masked; each row has its own dummy at 0.85.
        let mut m = CostMatrix::forbidden(2, 4);
        m.set(0, 0, 0.2); // row 0 gated to track 0
        m.set(0, 2, 0.85);
        m.set(0, 3, 0.85);
        m.set(1, 2, 0.85); // row 1 gated to nothing
        m.set(1, 3, 0.85);
        let assignment = solve(&m);
        assert_eq!(assignment[0], 0);
        assert!(assignment[1] >= 2, "ungated row must take a dummy column");
        assert!(!m.is_forbidden(1, assignment[1]));
    }

    #[test]
    fn test_matches_brute_force_on_fixed_matrices() {
        // Deterministic pseudo-random matrices via a simple LCG.
        let mut state = 0x2545f4914f6cdd1du64;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64) / ((1u64 << 31) as f64)
        };

        for rows in 1..=4usize {
            for extra in 0..=2usize {
                let cols = rows + extra;
                for _ in 0..20 {
                    let cells: Vec<f64> =
                        (0..rows * cols).map(|_| (next() * 10.0).round() / 2.0).collect();
                    let m = matrix_from(rows, cols, &cells);
                    let assignment = solve(&m);
                    // Column uniqueness
                    let mut seen = vec![false; cols];
                    for &c in &assignment {
                        assert!(!seen[c]);
                        seen[c] = true;
                    }
                    assert_relative_eq!(
                        total_cost(&m, &assignment),
                        brute_force_min(&m),
                        epsilon = 1e-9
                    );
                }
            }
        }
    }

    #[test]
    fn test_empty_matrix() {
        let m = CostMatrix::forbidden(0, 0);
        assert!(solve(&m).is_empty());
    }
}
