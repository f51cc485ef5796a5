//! Term ranking strategies for [`TopicModel::top_k_with`].

use crate::error::{LdaError, Result};
use crate::index::TermId;
use crate::model::TopicModel;
use crate::query::TopicId;

/// Scores a term within a topic. Implementations must be pure: the same
/// model, topic and term always give the same score.
///
/// A topic or term outside the model carries no probability mass and scores
/// 0.
pub trait TermScorer {
    fn score(&self, model: &TopicModel, topic: TopicId, term: TermId) -> f64;
}

/// Ranks terms by their raw probability in the topic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbabilityScorer;

impl TermScorer for ProbabilityScorer {
    fn score(&self, model: &TopicModel, topic: TopicId, term: TermId) -> f64 {
        model.phi_at(topic, term).unwrap_or(0.0)
    }
}

/// Blei–Lafferty term score:
///
/// ```text
/// score(k, t) = phi[k][t] * (ln phi[k][t] - (1/K) * sum_j ln phi[j][t])
/// ```
///
/// Terms that are likely under every topic are pushed down relative to terms
/// concentrated in one topic. Zero entries contribute nothing to the log
/// mean and score 0 themselves.
///
/// The scorer borrows the model it was built from and caches that model's
/// per-term log means. Scoring any other model computes the means from that
/// model instead.
#[derive(Debug, Clone)]
pub struct BleiLaffertyScorer<'m> {
    model: &'m TopicModel,
    /// (1/K) * sum of ln phi over topics, per term.
    mean_log: Vec<f64>,
}

impl<'m> BleiLaffertyScorer<'m> {
    pub fn new(model: &'m TopicModel) -> Result<Self> {
        for topic in 0..model.num_topics() {
            if model.phi_row(topic).iter().all(|&p| p == 0.0) {
                return Err(LdaError::InvalidModel(format!(
                    "topic {topic} assigns zero probability to every term"
                )));
            }
        }
        let mean_log = (0..model.num_terms())
            .map(|term| column_mean_log(model, term))
            .collect();
        Ok(Self { model, mean_log })
    }

    /// The model whose log means are cached.
    pub fn model(&self) -> &'m TopicModel {
        self.model
    }
}

fn column_mean_log(model: &TopicModel, term: TermId) -> f64 {
    let k = model.num_topics();
    let sum: f64 = (0..k)
        .filter_map(|topic| model.phi_at(topic, term))
        .filter(|&p| p > 0.0)
        .map(f64::ln)
        .sum();
    sum / k as f64
}

impl TermScorer for BleiLaffertyScorer<'_> {
    fn score(&self, model: &TopicModel, topic: TopicId, term: TermId) -> f64 {
        let p = match model.phi_at(topic, term) {
            Some(p) if p > 0.0 => p,
            _ => return 0.0,
        };
        let mean_log = if std::ptr::eq(model, self.model) {
            self.mean_log[term]
        } else {
            column_mean_log(model, term)
        };
        p * (p.ln() - mean_log)
    }
}
