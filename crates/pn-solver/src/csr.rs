//! Compressed sparse row matrix assembled from triplets.

use nalgebra::DMatrix;

/// Square CSR matrix.
///
/// `row_ptr[i]..row_ptr[i+1]` indexes the non-zeros of row `i`; columns are
/// sorted within each row and duplicates are summed at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

/// Triplet accumulator for [`CsrMatrix`].
#[derive(Debug, Clone, Default)]
pub struct CsrBuilder {
    n: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl CsrBuilder {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            entries: Vec::new(),
        }
    }

    /// Add `value` to entry (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.entries.push((row, col, value));
    }

    /// Add the symmetric stencil of a conductance `g` between `i` and `j`.
    pub fn add_link(&mut self, i: usize, j: usize, g: f64) {
        self.add(i, i, g);
        self.add(j, j, g);
        self.add(i, j, -g);
        self.add(j, i, -g);
    }

    pub fn build(mut self) -> CsrMatrix {
        self.entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_ptr = vec![0usize; self.n + 1];
        let mut col_idx = Vec::with_capacity(self.entries.len());
        let mut values: Vec<f64> = Vec::with_capacity(self.entries.len());
        let mut last: Option<(usize, usize)> = None;
        for (row, col, value) in self.entries {
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += value;
                }
                continue;
            }
            col_idx.push(col);
            values.push(value);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }
        for i in 0..self.n {
            row_ptr[i + 1] += row_ptr[i];
        }

        CsrMatrix {
            n: self.n,
            row_ptr,
            col_idx,
            values,
        }
    }
}

impl CsrMatrix {
    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// y = A·x
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        for (i, yi) in y.iter_mut().enumerate().take(self.n) {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            *yi = sum;
        }
    }

    pub fn diagonal(&self) -> Vec<f64> {
        let mut diag = vec![0.0; self.n];
        for (i, d) in diag.iter_mut().enumerate() {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                if self.col_idx[k] == i {
                    *d = self.values[k];
                }
            }
        }
        diag
    }

    /// Multiply every entry by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.values {
            *v *= factor;
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n, self.n);
        for i in 0..self.n {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                dense[(i, self.col_idx[k])] += self.values[k];
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_summed() {
        let mut b = CsrBuilder::new(2);
        b.add_link(0, 1, 2.0);
        b.add(0, 0, 1.0);
        let a = b.build();
        assert_eq!(a.nnz(), 4);
        assert_eq!(a.diagonal(), vec![3.0, 2.0]);

        let mut y = vec![0.0; 2];
        a.mul_vec(&[1.0, 1.0], &mut y);
        assert_eq!(y, vec![1.0, 0.0]);
    }

    #[test]
    fn dense_matches_sparse() {
        let mut b = CsrBuilder::new(3);
        b.add_link(0, 1, 1.0);
        b.add_link(1, 2, 3.0);
        let a = b.build();
        let d = a.to_dense();
        assert_eq!(d[(1, 1)], 4.0);
        assert_eq!(d[(2, 1)], -3.0);
        assert_eq!(d[(0, 2)], 0.0);
    }
}
