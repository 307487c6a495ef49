//! Dense LU decomposition with partial pivoting.
//!
//! The silent-path closure needs one matrix inversion per evaluated
//! machine. The factorization is kept separate from the inversion so a
//! caller doing repeated solves against the same system pays for the
//! decomposition once.

use ndarray::Array2;

use crate::constants::SINGULAR_PIVOT_EPSILON;

/// The coefficient matrix was singular to working precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("matrix is singular to working precision")]
pub struct SingularMatrix;

/// An LU factorization `PA = LU` of a square matrix.
///
/// `L` (unit lower triangular) and `U` share one storage array; the row
/// permutation is kept as an index vector.
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    lu: Array2<f64>,
    perm: Vec<usize>,
}

impl LuDecomposition {
    /// Factorize a square matrix. A pivot at or below
    /// [`SINGULAR_PIVOT_EPSILON`] aborts with [`SingularMatrix`].
    pub fn decompose(mut a: Array2<f64>) -> Result<LuDecomposition, SingularMatrix> {
        let n = a.nrows();
        debug_assert_eq!(n, a.ncols(), "matrix must be square");
        let mut perm: Vec<usize> = (0..n).collect();
        for k in 0..n {
            let mut pivot_row = k;
            let mut pivot_abs = a[[k, k]].abs();
            for i in (k + 1)..n {
                let v = a[[i, k]].abs();
                if v > pivot_abs {
                    pivot_abs = v;
                    pivot_row = i;
                }
            }
            if !(pivot_abs > SINGULAR_PIVOT_EPSILON) {
                return Err(SingularMatrix);
            }
            if pivot_row != k {
                for j in 0..n {
                    a.swap([k, j], [pivot_row, j]);
                }
                perm.swap(k, pivot_row);
            }
            let pivot = a[[k, k]];
            for i in (k + 1)..n {
                let factor = a[[i, k]] / pivot;
                a[[i, k]] = factor;
                for j in (k + 1)..n {
                    let above = a[[k, j]];
                    a[[i, j]] -= factor * above;
                }
            }
        }
        Ok(LuDecomposition { lu: a, perm })
    }

    /// Solve `Ax = b` for a single right-hand side.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lu.nrows();
        debug_assert_eq!(b.len(), n);
        let mut x: Vec<f64> = self.perm.iter().map(|&p| b[p]).collect();
        // forward substitution through unit-diagonal L
        for i in 1..n {
            let mut acc = x[i];
            for j in 0..i {
                acc -= self.lu[[i, j]] * x[j];
            }
            x[i] = acc;
        }
        // back substitution through U
        for i in (0..n).rev() {
            let mut acc = x[i];
            for j in (i + 1)..n {
                acc -= self.lu[[i, j]] * x[j];
            }
            x[i] = acc / self.lu[[i, i]];
        }
        x
    }

    /// Invert the factorized matrix, one solve per unit vector.
    pub fn invert(&self) -> Array2<f64> {
        let n = self.lu.nrows();
        let mut inverse = Array2::zeros((n, n));
        let mut unit = vec![0.0; n];
        for col in 0..n {
            unit[col] = 1.0;
            let x = self.solve(&unit);
            unit[col] = 0.0;
            for (row, &v) in x.iter().enumerate() {
                inverse[[row, col]] = v;
            }
        }
        inverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_matrix_close(a: &Array2<f64>, b: &Array2<f64>) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "expected {:?} got {:?}", b, a);
        }
    }

    #[test]
    fn inverts_a_known_matrix() {
        let a = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = LuDecomposition::decompose(a).unwrap().invert();
        assert_matrix_close(&inv, &array![[0.6, -0.7], [-0.2, 0.4]]);
    }

    #[test]
    fn identity_is_its_own_inverse() {
        let eye = Array2::<f64>::eye(4);
        let inv = LuDecomposition::decompose(eye.clone()).unwrap().invert();
        assert_matrix_close(&inv, &eye);
    }

    #[test]
    fn solve_round_trips_through_the_matrix() {
        let a = array![[2.0, 1.0, 0.0], [0.0, 3.0, 1.0], [1.0, 0.0, 2.0]];
        let lu = LuDecomposition::decompose(a.clone()).unwrap();
        let x = lu.solve(&[1.0, 2.0, 3.0]);
        let back = a.dot(&ndarray::arr1(&x));
        for (v, expected) in back.iter().zip([1.0, 2.0, 3.0]) {
            assert!((v - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn pivoting_handles_a_zero_leading_entry() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let inv = LuDecomposition::decompose(a).unwrap().invert();
        assert_matrix_close(&inv, &array![[0.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(LuDecomposition::decompose(a), Err(SingularMatrix)));
    }
}
