//! Island partitioning.
//!
//! An island is a maximal set of nodes connected through non-zero
//! off-diagonals of the admittance matrix. Separate islands can be
//! decomposed independently, which pays off whenever the largest island
//! is much smaller than the network.

use nalgebra::DMatrix;
use std::sync::Arc;

/// The island partition of a network: per-node island numbers and one
/// sorted node-index vector per island (empty for absorbed numbers).
///
/// Island vectors are shared (`Arc`) so nodes can hold a read-only view
/// for the duration of the step without owning the table.
#[derive(Debug, Clone, Default)]
pub struct Islands {
    node_numbers: Vec<usize>,
    vectors: Vec<Arc<Vec<usize>>>,
    count: usize,
    max_size: usize,
}

impl Islands {
    /// Partition from the admittance matrix in a single upper-triangle
    /// sweep. Column searches happen only at off-diagonal non-zeros, so
    /// the cost tracks the matrix sparsity.
    pub fn build(a: &DMatrix<f64>, n: usize) -> Self {
        let mut numbers: Vec<usize> = (0..n).collect();

        for row in 0..n.saturating_sub(1) {
            for col in row + 1..n {
                if a[(row, col)] != 0.0 {
                    // Lowest island number among all populated rows of
                    // this column, the current row, and the diagonal.
                    let mut min_number = numbers[col].min(numbers[row]);
                    for row2 in row + 1..col {
                        if a[(row2, col)] != 0.0 {
                            min_number = min_number.min(numbers[row2]);
                        }
                    }

                    for row2 in row + 1..col {
                        if a[(row2, col)] != 0.0 {
                            let n2 = numbers[row2];
                            merge(&mut numbers, n2, min_number);
                        }
                    }
                    let n_row = numbers[row];
                    merge(&mut numbers, n_row, min_number);
                    let n_col = numbers[col];
                    merge(&mut numbers, n_col, min_number);
                }
            }
        }

        // Ascending node scan keeps each island vector sorted.
        let mut raw: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, number) in numbers.iter().enumerate() {
            raw[*number].push(node);
        }

        let mut count = 0;
        let mut max_size = 0;
        let vectors: Vec<Arc<Vec<usize>>> = raw
            .into_iter()
            .map(|nodes| {
                if !nodes.is_empty() {
                    count += 1;
                    max_size = max_size.max(nodes.len());
                }
                Arc::new(nodes)
            })
            .collect();

        Self {
            node_numbers: numbers,
            vectors,
            count,
            max_size,
        }
    }

    pub fn node_island_number(&self, node: usize) -> usize {
        self.node_numbers[node]
    }

    /// The island vector containing the given node.
    pub fn island_of(&self, node: usize) -> &Arc<Vec<usize>> {
        &self.vectors[self.node_numbers[node]]
    }

    /// All island slots (some empty after merging).
    pub fn vectors(&self) -> &[Arc<Vec<usize>>] {
        &self.vectors
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// Re-tag every node on island `from` to island `to`.
fn merge(numbers: &mut [usize], from: usize, to: usize) {
    if from != to {
        for number in numbers.iter_mut() {
            if *number == from {
                *number = to;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_from(entries: &[(usize, usize, f64)], n: usize) -> DMatrix<f64> {
        let mut a = DMatrix::zeros(n, n);
        for i in 0..n {
            a[(i, i)] = 1.0;
        }
        for &(r, c, v) in entries {
            a[(r, c)] = v;
            a[(c, r)] = v;
        }
        a
    }

    #[test]
    fn disconnected_nodes_stay_on_own_islands() {
        let a = matrix_from(&[], 4);
        let islands = Islands::build(&a, 4);
        assert_eq!(islands.count(), 4);
        assert_eq!(islands.max_size(), 1);
        for node in 0..4 {
            assert_eq!(islands.island_of(node).as_slice(), &[node]);
        }
    }

    #[test]
    fn chain_collapses_to_one_island() {
        let a = matrix_from(&[(0, 1, -1.0), (1, 2, -1.0), (2, 3, -1.0)], 4);
        let islands = Islands::build(&a, 4);
        assert_eq!(islands.count(), 1);
        assert_eq!(islands.max_size(), 4);
        assert_eq!(islands.island_of(3).as_slice(), &[0, 1, 2, 3]);
    }

    #[test]
    fn two_separate_pairs() {
        let a = matrix_from(&[(0, 2, -1.0), (1, 3, -1.0)], 4);
        let islands = Islands::build(&a, 4);
        assert_eq!(islands.count(), 2);
        assert_eq!(islands.max_size(), 2);
        assert_eq!(islands.island_of(0).as_slice(), &[0, 2]);
        assert_eq!(islands.island_of(1).as_slice(), &[1, 3]);
        assert_eq!(islands.node_island_number(2), islands.node_island_number(0));
    }

    #[test]
    fn every_off_diagonal_joins_its_endpoints() {
        let a = matrix_from(&[(0, 4, -1.0), (1, 3, -1.0), (3, 5, -1.0), (2, 2, 0.0)], 6);
        let islands = Islands::build(&a, 6);
        for r in 0..6 {
            for c in 0..6 {
                if r != c && a[(r, c)] != 0.0 {
                    assert_eq!(
                        islands.node_island_number(r),
                        islands.node_island_number(c),
                        "nodes {r} and {c} must share an island"
                    );
                }
            }
        }
    }
}
