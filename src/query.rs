//! Read-side queries over a loaded [`TopicModel`].

use std::cmp::Ordering;

use crate::error::{LdaError, Result};
use crate::index::{DocId, TermId};
use crate::model::TopicModel;
use crate::scorer::{ProbabilityScorer, TermScorer};

pub type TopicId = usize;

/// Number of terms returned when a caller has no preference.
pub const DEFAULT_TOP_K: usize = 10;

/// Descending by score, ascending term id on ties.
fn rank_order(a: &(TermId, f64), b: &(TermId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

impl TopicModel {
    /// The `k` most probable terms of `topic`.
    pub fn top_k(&self, topic: TopicId, k: usize) -> Result<Vec<(TermId, f64)>> {
        self.top_k_with(topic, k, &ProbabilityScorer)
    }

    /// The `k` best terms of `topic` under `scorer`, best first.
    pub fn top_k_with(
        &self,
        topic: TopicId,
        k: usize,
        scorer: &dyn TermScorer,
    ) -> Result<Vec<(TermId, f64)>> {
        self.check_topic(topic)?;
        let k = k.min(self.num_terms());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(TermId, f64)> = (0..self.num_terms())
            .map(|t| (t, scorer.score(self, topic, t)))
            .collect();
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank_order);
        Ok(scored)
    }

    /// P(topic | doc) for every topic, indexed by topic id.
    pub fn topic_distribution(&self, doc: DocId) -> Result<&[f64]> {
        self.check_doc(doc)?;
        let k = self.num_topics();
        Ok(&self.theta()[doc * k..(doc + 1) * k])
    }

    pub fn topic_probability(&self, doc: DocId, topic: TopicId) -> Result<f64> {
        self.check_topic(topic)?;
        Ok(self.topic_distribution(doc)?[topic])
    }

    pub fn term_probability(&self, topic: TopicId, term: TermId) -> Result<f64> {
        self.check_topic(topic)?;
        if term >= self.num_terms() {
            return Err(LdaError::out_of_range("term", term, self.num_terms()));
        }
        Ok(self.phi_row(topic)[term])
    }

    fn check_topic(&self, topic: TopicId) -> Result<()> {
        if topic >= self.num_topics() {
            return Err(LdaError::out_of_range("topic", topic, self.num_topics()));
        }
        Ok(())
    }

    fn check_doc(&self, doc: DocId) -> Result<()> {
        if doc >= self.num_docs() {
            return Err(LdaError::out_of_range("document", doc, self.num_docs()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> TopicModel {
        TopicModel::from_parts(
            2,
            2,
            4,
            vec![0.9, 0.1, 0.25, 0.75],
            vec![
                0.1, 0.4, 0.4, 0.1, //
                0.7, 0.0, 0.1, 0.2,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_top_k_orders_by_score_then_term_id() {
        let m = model();
        assert_eq!(m.top_k(0, 4).unwrap(), vec![(1, 0.4), (2, 0.4), (0, 0.1), (3, 0.1)]);
        assert_eq!(m.top_k(1, 2).unwrap(), vec![(0, 0.7), (3, 0.2)]);
    }

    #[test]
    fn test_top_k_partial_selection_keeps_tie_break() {
        let m = model();
        assert_eq!(m.top_k(0, 1).unwrap(), vec![(1, 0.4)]);
        assert_eq!(m.top_k(0, 3).unwrap(), vec![(1, 0.4), (2, 0.4), (0, 0.1)]);
    }

    #[test]
    fn test_top_k_clamps_and_handles_zero() {
        let m = model();
        assert_eq!(m.top_k(1, 100).unwrap().len(), 4);
        assert!(m.top_k(1, 0).unwrap().is_empty());
    }

    #[test]
    fn test_top_k_topic_out_of_range() {
        let m = model();
        assert!(matches!(
            m.top_k(2, 3),
            Err(LdaError::OutOfRange { kind: "topic", id: 2, bound: 2 })
        ));
    }

    #[test]
    fn test_topic_distribution() {
        let m = model();
        assert_eq!(m.topic_distribution(1).unwrap(), &[0.25, 0.75]);
        assert_eq!(m.topic_probability(0, 1).unwrap(), 0.1);
        assert!(matches!(
            m.topic_distribution(2),
            Err(LdaError::OutOfRange { kind: "document", .. })
        ));
    }

    #[test]
    fn test_term_probability() {
        let m = model();
        assert_eq!(m.term_probability(1, 3).unwrap(), 0.2);
        assert!(m.term_probability(1, 4).is_err());
        assert!(m.term_probability(3, 0).is_err());
    }
}
