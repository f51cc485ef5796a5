use ldatopics::{BleiLaffertyScorer, Dataset, LdaConfig, LdaCvb, TopicModel};
use proptest::prelude::*;

/// Up to 6 documents over a vocabulary of up to 8 terms, each document
/// non-empty.
fn corpus() -> impl Strategy<Value = (Vec<Vec<(usize, u64)>>, usize)> {
    (2usize..=8).prop_flat_map(|v| {
        let doc = prop::collection::vec((0..v, 1u64..6), 1..6);
        (prop::collection::vec(doc, 1..=6), Just(v))
    })
}

fn trained(docs: Vec<Vec<(usize, u64)>>, v: usize, k: usize, seed: u64) -> TopicModel {
    let dataset = Dataset::from_documents(docs, v).unwrap();
    let cfg = LdaConfig::new(k, 0.5, 0.05).with_iterations(8).with_seed(seed);
    let mut lda = LdaCvb::new(&dataset, cfg).unwrap();
    lda.run();
    lda.model().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Dataset never yields a term id outside the vocabulary.
    #[test]
    fn prop_dataset_terms_within_vocab((docs, v) in corpus()) {
        let dataset = Dataset::from_documents(docs, v).unwrap();
        for d in 0..dataset.document_count() {
            for (term, count) in dataset.terms(d).unwrap() {
                prop_assert!(term < v);
                prop_assert!(count > 0);
            }
        }
    }

    /// Every row of phi and theta is a probability distribution.
    #[test]
    fn prop_rows_sum_to_one((docs, v) in corpus(), k in 1usize..5, seed in any::<u64>()) {
        let model = trained(docs, v, k, seed);
        for row in model.phi().chunks(model.num_terms()) {
            prop_assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        }
        for row in model.theta().chunks(model.num_topics()) {
            prop_assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        }
    }

    /// top_k is sorted, bounded by min(k, V), and ties break by term id.
    #[test]
    fn prop_top_k_sorted_and_bounded(
        (docs, v) in corpus(),
        k in 1usize..4,
        n in 0usize..12,
        seed in any::<u64>()
    ) {
        let model = trained(docs, v, k, seed);
        for topic in 0..k {
            let top = model.top_k(topic, n).unwrap();
            prop_assert_eq!(top.len(), n.min(v));
            for pair in top.windows(2) {
                prop_assert!(
                    pair[0].1 > pair[1].1 || (pair[0].1 == pair[1].1 && pair[0].0 < pair[1].0)
                );
            }
        }
        prop_assert!(model.top_k(k, n).is_err());
    }

    /// Blei-Lafferty scores are finite everywhere.
    #[test]
    fn prop_blei_lafferty_finite((docs, v) in corpus(), k in 1usize..5, seed in any::<u64>()) {
        let model = trained(docs, v, k, seed);
        let scorer = BleiLaffertyScorer::new(&model).unwrap();
        for topic in 0..k {
            for (_, score) in model.top_k_with(topic, v, &scorer).unwrap() {
                prop_assert!(score.is_finite());
            }
        }
    }

    /// Blei-Lafferty stays finite on hand-built models with zero entries.
    #[test]
    fn prop_blei_lafferty_finite_with_zeros(
        rows in prop::collection::vec(prop::collection::vec(0u8..4, 5), 1..4)
    ) {
        let k = rows.len();
        let mut phi = Vec::new();
        for mut row in rows {
            // keep every topic non-empty
            row[0] = row[0].max(1);
            let sum: f64 = row.iter().map(|&x| f64::from(x)).sum();
            phi.extend(row.iter().map(|&x| f64::from(x) / sum));
        }
        let theta = vec![1.0 / k as f64; k];
        let model = TopicModel::from_parts(k, 1, 5, theta, phi).unwrap();
        let scorer = BleiLaffertyScorer::new(&model).unwrap();
        for topic in 0..k {
            for (_, score) in model.top_k_with(topic, 5, &scorer).unwrap() {
                prop_assert!(score.is_finite());
            }
        }
    }
}
