use crate::error::{Result, SinterError};
use faer::prelude::SpSolver;
use faer::sparse::SparseColMat;
use faer::Mat;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

/// Jacobian representation the Newton iteration can solve against.
pub trait LinearSystem {
    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>>;
}

impl LinearSystem for DMatrix<f64> {
    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        solve_dense(self.clone(), rhs)
    }
}

impl LinearSystem for CscMatrix<f64> {
    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        let columns = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
        let solution = solve_sparse_columns(self, &columns)?;
        Ok(solution.column(0).into_owned())
    }
}

/// Solves `a x = b` through an LU decomposition.
pub fn solve_dense(a: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    check_dimensions(a.nrows(), a.ncols(), b.len())?;
    let n = a.nrows();
    a.lu()
        .solve(b)
        .filter(|x| x.iter().all(|v| v.is_finite()))
        .ok_or_else(|| SinterError::LinearSolveFailed(format!("singular {}x{} matrix", n, n)))
}

/// Solves `a X = B` with a sparse LU factorization of `a`, computed once for all columns of `B`.
pub fn solve_sparse_columns(a: &CscMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    check_dimensions(a.nrows(), a.ncols(), b.nrows())?;
    let n = a.nrows();
    if n == 0 {
        return Ok(DMatrix::zeros(0, b.ncols()));
    }

    let triplets: Vec<(usize, usize, f64)> = a.triplet_iter().map(|(i, j, v)| (i, j, *v)).collect();
    let matrix = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets)
        .map_err(|e| SinterError::LinearSolveFailed(format!("sparse assembly of {}x{} matrix: {:?}", n, n, e)))?;
    let lu = matrix
        .as_ref()
        .sp_lu()
        .map_err(|e| SinterError::LinearSolveFailed(format!("sparse LU of {}x{} matrix: {:?}", n, n, e)))?;

    let rhs = Mat::<f64>::from_fn(b.nrows(), b.ncols(), |i, j| b[(i, j)]);
    let x = lu.solve(rhs.as_ref());
    let solution = DMatrix::from_fn(b.nrows(), b.ncols(), |i, j| x.read(i, j));
    if solution.iter().all(|v| v.is_finite()) {
        Ok(solution)
    } else {
        Err(SinterError::LinearSolveFailed(format!("singular sparse {}x{} matrix", n, n)))
    }
}

fn check_dimensions(rows: usize, columns: usize, rhs_rows: usize) -> Result<()> {
    if rows != columns || rows != rhs_rows {
        return Err(SinterError::LinearSolveFailed(format!(
            "dimension mismatch: {}x{} matrix, {} right-hand side rows",
            rows, columns, rhs_rows
        )));
    }
    Ok(())
}
