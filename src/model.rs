use std::path::Path;

use crate::error::{LdaError, Result};

/// Largest distance from 1.0 accepted for the sum of a θ or φ row.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Immutable snapshot of an inferred topic model.
///
/// `theta` is D×K (P(topic | document)) and `phi` is K×V (P(term | topic)),
/// both row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicModel {
    num_topics: usize,
    num_docs: usize,
    num_terms: usize,
    theta: Vec<f64>,
    phi: Vec<f64>,
}

impl TopicModel {
    /// Builds a model from raw matrices, checking shapes, that every entry is
    /// finite and non-negative, and that every row sums to 1 within
    /// [`ROW_SUM_TOLERANCE`].
    pub fn from_parts(
        num_topics: usize,
        num_docs: usize,
        num_terms: usize,
        theta: Vec<f64>,
        phi: Vec<f64>,
    ) -> Result<Self> {
        if num_topics == 0 || num_docs == 0 || num_terms == 0 {
            return Err(LdaError::InvalidModel(format!(
                "dimensions must be non-zero (K={num_topics}, D={num_docs}, V={num_terms})"
            )));
        }
        if theta.len() != num_docs * num_topics {
            return Err(LdaError::InvalidModel(format!(
                "theta has {} values, expected {}x{}",
                theta.len(),
                num_docs,
                num_topics
            )));
        }
        if phi.len() != num_topics * num_terms {
            return Err(LdaError::InvalidModel(format!(
                "phi has {} values, expected {}x{}",
                phi.len(),
                num_topics,
                num_terms
            )));
        }
        if let Some(i) = theta.iter().position(|p| !p.is_finite() || *p < 0.0) {
            return Err(LdaError::InvalidModel(format!(
                "theta[{}][{}] = {} is not a probability",
                i / num_topics,
                i % num_topics,
                theta[i]
            )));
        }
        if let Some(i) = phi.iter().position(|p| !p.is_finite() || *p < 0.0) {
            return Err(LdaError::InvalidModel(format!(
                "phi[{}][{}] = {} is not a probability",
                i / num_terms,
                i % num_terms,
                phi[i]
            )));
        }
        check_row_sums("theta", &theta, num_topics)?;
        check_row_sums("phi", &phi, num_terms)?;
        Ok(Self {
            num_topics,
            num_docs,
            num_terms,
            theta,
            phi,
        })
    }

    /// Loads a model written by [`crate::store::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::store::load(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::store::save(self, path)
    }

    pub fn num_topics(&self) -> usize {
        self.num_topics
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    /// Row-major D×K document-topic matrix.
    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    /// Row-major K×V topic-term matrix.
    pub fn phi(&self) -> &[f64] {
        &self.phi
    }

    /// φ row of one topic. Panics if `topic` is out of range.
    pub(crate) fn phi_row(&self, topic: usize) -> &[f64] {
        &self.phi[topic * self.num_terms..(topic + 1) * self.num_terms]
    }

    /// φ entry, or `None` when either id is outside the model.
    pub(crate) fn phi_at(&self, topic: usize, term: usize) -> Option<f64> {
        if topic >= self.num_topics || term >= self.num_terms {
            return None;
        }
        self.phi.get(topic * self.num_terms + term).copied()
    }

    /// Skips every check. Lets tests build models `from_parts` refuses.
    #[cfg(test)]
    pub(crate) fn from_parts_unchecked(
        num_topics: usize,
        num_docs: usize,
        num_terms: usize,
        theta: Vec<f64>,
        phi: Vec<f64>,
    ) -> Self {
        Self {
            num_topics,
            num_docs,
            num_terms,
            theta,
            phi,
        }
    }
}

fn check_row_sums(name: &str, values: &[f64], width: usize) -> Result<()> {
    for (row, chunk) in values.chunks(width).enumerate() {
        let sum: f64 = chunk.iter().sum();
        if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(LdaError::InvalidModel(format!(
                "{name} row {row} sums to {sum}, expected 1"
            )));
        }
    }
    Ok(())
}
