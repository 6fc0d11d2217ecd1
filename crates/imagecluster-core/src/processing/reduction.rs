use log::info;
use ndarray::{Array1, Array2, Axis};

use super::{DimensionalityReducer, PcaComponents, PcaParams};
use crate::error::{Error, Result};
use crate::types::Fingerprints;

/// Principal component analysis.
///
/// Works on the `n x n` Gram matrix of the centered data, so the cost depends
/// on the number of images rather than the fingerprint length. Eigenpairs are
/// found one at a time by power iteration with deflation. If `u` is a unit
/// eigenvector of the Gram matrix with eigenvalue `l`, the component scores of
/// the samples are `sqrt((n - 1) * l) * u`.
#[derive(Debug, Clone)]
pub struct Pca {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for Pca {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-10,
        }
    }
}

impl Pca {
    fn dominant_eigenpair(&self, matrix: &Array2<f64>) -> (f64, Array1<f64>) {
        let n = matrix.nrows();
        let mut v = Array1::from_iter((0..n).map(|i| 1.0 + i as f64 / n as f64));
        let norm = v.dot(&v).sqrt();
        v /= norm;

        for _ in 0..self.max_iterations {
            let w = matrix.dot(&v);
            let norm = w.dot(&w).sqrt();
            if norm == 0.0 {
                return (0.0, v);
            }
            let next = w / norm;
            let delta = (&next - &v).mapv(f64::abs).sum();
            v = next;
            if delta < self.tolerance {
                break;
            }
        }

        let lambda = v.dot(&matrix.dot(&v));
        (lambda, v)
    }
}

impl DimensionalityReducer for Pca {
    fn reduce(&self, fingerprints: &Fingerprints, params: &PcaParams) -> Result<Fingerprints> {
        params.validate()?;

        let n = fingerprints.len();
        if n < 2 {
            return Err(Error::Reduction(format!(
                "PCA needs at least 2 fingerprints, got {}",
                n
            )));
        }
        let d = fingerprints.values().next().map(Vec::len).unwrap_or(0);
        if fingerprints.values().any(|fp| fp.len() != d) {
            return Err(Error::Reduction(
                "fingerprints differ in length".to_string(),
            ));
        }

        let mut x = Array2::<f64>::zeros((n, d));
        for (mut row, fp) in x.axis_iter_mut(Axis(0)).zip(fingerprints.values()) {
            for (cell, &value) in row.iter_mut().zip(fp) {
                *cell = value as f64;
            }
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Reduction("empty fingerprint matrix".to_string()))?;
        x -= &mean;

        let mut gram = x.dot(&x.t()) / (n as f64 - 1.0);
        let total_variance: f64 = gram.diag().sum();

        let mut components: Vec<(f64, Array1<f64>)> = Vec::new();
        let mut explained = 0.0;
        for _ in 0..n.min(d) {
            let enough = match params.n_components {
                PcaComponents::Count(k) => components.len() >= k,
                PcaComponents::Fraction(f) => {
                    !components.is_empty() && explained >= f * total_variance * (1.0 - 1e-9)
                }
            };
            if enough {
                break;
            }

            let (lambda, u) = self.dominant_eigenpair(&gram);
            if lambda <= total_variance * 1e-12 {
                break;
            }
            for a in 0..n {
                for b in 0..n {
                    gram[[a, b]] -= lambda * u[a] * u[b];
                }
            }
            explained += lambda;
            components.push((lambda, u));
        }

        info!(
            "pca dims: {} ({:.1}% of variance)",
            components.len().max(1),
            if total_variance > 0.0 {
                100.0 * explained / total_variance
            } else {
                100.0
            }
        );

        // All fingerprints identical: a single zero component
        if components.is_empty() {
            return Ok(fingerprints.keys().map(|k| (k.clone(), vec![0.0])).collect());
        }

        let reduced = fingerprints
            .keys()
            .enumerate()
            .map(|(i, key)| {
                let scores = components
                    .iter()
                    .map(|(lambda, u)| (((n as f64 - 1.0) * lambda).sqrt() * u[i]) as f32)
                    .collect();
                (key.clone(), scores)
            })
            .collect();

        Ok(reduced)
    }
}
