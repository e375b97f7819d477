use nalgebra::DMatrix;

/// The condition number of a matrix is the ratio of its largest singular value to the smallest one.
/// It measures how sensitive the solution of A x = b is to small perturbations of the input data.
/// Returns f64::INFINITY for an exactly singular matrix.
pub fn condition_number(A: &DMatrix<f64>) -> f64 {
    if A.is_empty() {
        return f64::INFINITY;
    }
    let singular_values = A.singular_values();
    let max_sigma = singular_values.max();
    let min_sigma = singular_values.min();
    if min_sigma <= 0.0 || !min_sigma.is_finite() {
        return f64::INFINITY;
    }
    max_sigma / min_sigma
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// famous example of ill-conditioned matrix
    fn hilbert_matrix(n: usize) -> DMatrix<f64> {
        let mut A = DMatrix::zeros(n, n);
        for i in 1..n + 1 {
            for j in 1..n + 1 {
                A[(i - 1, j - 1)] = 1.0 / (i as f64 + j as f64 - 1.0);
            }
        }
        A
    }

    #[test]
    fn test_condition_number_diagonal() {
        let A = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![4.0, 2.0, 0.5]));
        assert_relative_eq!(condition_number(&A), 8.0, epsilon = 1e-10);
    }

    #[test]
    fn test_condition_number_singular() {
        let A: DMatrix<f64> = DMatrix::zeros(2, 2);
        assert_eq!(condition_number(&A), f64::INFINITY);
    }

    #[test]
    fn test_condition_number_hilbert() {
        let A = hilbert_matrix(6);
        // cond(H_6) is about 1.5e7
        let cond = condition_number(&A);
        assert!(cond > 1e7 && cond < 1e8, "cond = {}", cond);
    }
}
