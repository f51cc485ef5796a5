//! Collapsed variational Bayes inference for LDA.
//!
//! Every (document, distinct term) pair carries a responsibility vector
//! `gamma` over the K topics. All occurrences of a term in a document share
//! it, weighted by the term count. A sweep visits each pair, removes its own
//! expected counts, recomputes
//!
//! ```text
//! gamma[k] ∝ (n_wk + beta) / (n_k + V*beta) * (n_dk + alpha)
//! ```
//!
//! and adds the new expected counts back. With
//! [`Approximation::SecondOrder`] the update is multiplied by the Gaussian
//! variance correction of full CVB.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::{Approximation, Initialization, LdaConfig};
use crate::dataset::{Dataset, Document};
use crate::error::Result;
use crate::model::TopicModel;

/// Cloneable flag that asks a running engine to stop after the current
/// iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What a call to [`LdaCvb::run`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    /// Iterations completed by this call.
    pub iterations: usize,
    /// The L1 change of phi and theta fell below the configured tolerance.
    pub converged: bool,
    /// The stop handle was raised before the iteration budget ran out.
    pub cancelled: bool,
    /// L1 change of phi plus theta in the last iteration, when a tolerance is set.
    pub last_change: Option<f64>,
    /// Largest single responsibility change in the last iteration.
    pub max_gamma_change: f64,
}

#[derive(Debug, Clone, Copy)]
struct Params {
    k: usize,
    alpha: f64,
    beta: f64,
    v_beta: f64,
    second_order: bool,
}

/// Per-document variational state. Only the owning document touches it.
#[derive(Debug, Clone)]
struct DocState {
    gamma: Vec<f64>,     // [unique term][topic]
    topic: Vec<f64>,     // [topic]: expected tokens in doc assigned to topic
    topic_var: Vec<f64>, // [topic]: variance of the above, second order only
}

/// Expected counts shared by all documents.
#[derive(Debug, Clone)]
struct SharedCounts {
    term_topic: Vec<f64>,     // [term][topic]: expected occurrences of term in topic
    topic: Vec<f64>,          // [topic]: expected tokens assigned to topic
    term_topic_var: Vec<f64>, // second order only
    topic_var: Vec<f64>,      // second order only
}

impl SharedCounts {
    fn zeros(k: usize, v: usize, second_order: bool) -> Self {
        let var_len = |n: usize| if second_order { n } else { 0 };
        Self {
            term_topic: vec![0.0; v * k],
            topic: vec![0.0; k],
            term_topic_var: vec![0.0; var_len(v * k)],
            topic_var: vec![0.0; var_len(k)],
        }
    }

    /// `self += local - base`, element-wise over every buffer.
    fn add_delta(&mut self, local: &SharedCounts, base: &SharedCounts) {
        fn merge(acc: &mut [f64], local: &[f64], base: &[f64]) {
            for ((a, l), b) in acc.iter_mut().zip(local).zip(base) {
                *a += l - b;
            }
        }
        merge(&mut self.term_topic, &local.term_topic, &base.term_topic);
        merge(&mut self.topic, &local.topic, &base.topic);
        merge(&mut self.term_topic_var, &local.term_topic_var, &base.term_topic_var);
        merge(&mut self.topic_var, &local.topic_var, &base.topic_var);
    }
}

/// Adds (`sign = 1.0`) or removes (`sign = -1.0`) the expected counts of one
/// (document, term) responsibility.
fn accumulate(
    state: &mut DocState,
    counts: &mut SharedCounts,
    gamma: &[f64],
    term: usize,
    count: f64,
    sign: f64,
    params: &Params,
) {
    let row = term * params.k;
    for (k, &g) in gamma.iter().enumerate() {
        let mass = sign * g * count;
        state.topic[k] += mass;
        counts.term_topic[row + k] += mass;
        counts.topic[k] += mass;
        if params.second_order {
            let var = sign * g * (1.0 - g) * count;
            state.topic_var[k] += var;
            counts.term_topic_var[row + k] += var;
            counts.topic_var[k] += var;
        }
    }
}

/// Reusable per-worker buffers for [`sweep_document`].
struct Scratch {
    old: Vec<f64>,
    weights: Vec<f64>,
}

impl Scratch {
    fn new(k: usize) -> Self {
        Self {
            old: vec![0.0; k],
            weights: vec![0.0; k],
        }
    }
}

/// One Gauss-Seidel pass over a document. Returns the largest change of any
/// responsibility.
fn sweep_document(
    doc: &Document,
    state: &mut DocState,
    counts: &mut SharedCounts,
    params: &Params,
    scratch: &mut Scratch,
) -> f64 {
    let k = params.k;
    let mut max_change = 0.0f64;
    let Scratch { old, weights } = scratch;

    for (i, &(term, count)) in doc.terms().iter().enumerate() {
        let count = count as f64;
        old.copy_from_slice(&state.gamma[i * k..(i + 1) * k]);

        // Remove this term's own contribution
        accumulate(state, counts, old.as_slice(), term, count, -1.0, params);

        let row = term * k;
        if params.second_order {
            // log space: the correction can be large when V*beta is tiny
            for t in 0..k {
                let a = state.topic[t].max(0.0) + params.alpha;
                let b = counts.term_topic[row + t].max(0.0) + params.beta;
                let c = counts.topic[t].max(0.0) + params.v_beta;
                let var_a = state.topic_var[t].max(0.0);
                let var_b = counts.term_topic_var[row + t].max(0.0);
                let var_c = counts.topic_var[t].max(0.0);
                weights[t] = a.ln() + b.ln() - c.ln() - var_a / (2.0 * a * a)
                    - var_b / (2.0 * b * b)
                    + var_c / (2.0 * c * c);
            }
            let top = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            for w in weights.iter_mut() {
                *w = (*w - top).exp();
            }
        } else {
            for t in 0..k {
                let a = state.topic[t].max(0.0) + params.alpha;
                let b = counts.term_topic[row + t].max(0.0) + params.beta;
                let c = counts.topic[t].max(0.0) + params.v_beta;
                weights[t] = a * b / c;
            }
        }
        normalize(weights.as_mut_slice());

        let gamma = &mut state.gamma[i * k..(i + 1) * k];
        for (t, g) in gamma.iter_mut().enumerate() {
            max_change = max_change.max((weights[t] - *g).abs());
            *g = weights[t];
        }
        accumulate(state, counts, weights.as_slice(), term, count, 1.0, params);
    }
    max_change
}

fn normalize(weights: &mut [f64]) {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        for w in weights.iter_mut() {
            *w /= sum;
        }
    } else {
        let uniform = 1.0 / weights.len() as f64;
        weights.fill(uniform);
    }
}

/// LDA inference engine (CVB0 by default).
pub struct LdaCvb<'a> {
    // evidence
    dataset: &'a Dataset,
    config: LdaConfig,
    params: Params,

    // variational state
    docs: Vec<DocState>,
    counts: SharedCounts,

    // execution
    pool: Option<rayon::ThreadPool>,
    stop: StopHandle,
    iterations_run: usize,
}

impl<'a> LdaCvb<'a> {
    /// Validates `config` and initializes the responsibilities. No sweep is
    /// run until [`LdaCvb::run`].
    pub fn new(dataset: &'a Dataset, config: LdaConfig) -> Result<Self> {
        config.validate()?;

        let k = config.num_topics;
        let v = dataset.vocab_size();
        let params = Params {
            k,
            alpha: config.alpha,
            beta: config.beta,
            v_beta: v as f64 * config.beta,
            second_order: config.approximation == Approximation::SecondOrder,
        };

        let pool = if config.num_threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.num_threads)
                    .build()?,
            )
        } else {
            None
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut counts = SharedCounts::zeros(k, v, params.second_order);
        let mut docs = Vec::with_capacity(dataset.document_count());
        let mut gamma = vec![0.0; k];

        for doc in dataset.documents() {
            let mut state = DocState {
                gamma: Vec::with_capacity(doc.unique_terms() * k),
                topic: vec![0.0; k],
                topic_var: if params.second_order {
                    vec![0.0; k]
                } else {
                    Vec::new()
                },
            };
            for &(term, count) in doc.terms() {
                match config.initialization {
                    Initialization::Uniform => gamma.fill(1.0 / k as f64),
                    Initialization::Random => {
                        for g in gamma.iter_mut() {
                            *g = rng.gen::<f64>();
                        }
                        normalize(&mut gamma);
                    }
                }
                state.gamma.extend_from_slice(&gamma);
                accumulate(&mut state, &mut counts, &gamma, term, count as f64, 1.0, &params);
            }
            docs.push(state);
        }

        Ok(Self {
            dataset,
            config,
            params,
            docs,
            counts,
            pool,
            stop: StopHandle::default(),
            iterations_run: 0,
        })
    }

    pub fn config(&self) -> &LdaConfig {
        &self.config
    }

    /// Handle that can stop [`LdaCvb::run`] from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Total iterations completed over all calls to [`LdaCvb::run`].
    pub fn iterations_run(&self) -> usize {
        self.iterations_run
    }

    /// Runs up to `num_iterations` sweeps, stopping early on convergence or
    /// when the stop handle is raised. The stop flag is only checked between
    /// iterations, so phi and theta are always from a complete sweep.
    /// Calling `run` again continues from the current state.
    pub fn run(&mut self) -> RunSummary {
        let budget = self.config.num_iterations;
        log::info!(
            "Running CVB ({:?}): K={}, alpha={}, beta={}, {} documents, {} terms, up to {} iterations",
            self.config.approximation,
            self.params.k,
            self.params.alpha,
            self.params.beta,
            self.dataset.document_count(),
            self.dataset.vocab_size(),
            budget
        );

        let mut summary = RunSummary::default();
        let mut previous = self.config.convergence_tolerance.map(|_| self.normalized());

        for it in 0..budget {
            if self.stop.is_stopped() {
                log::warn!("CVB stopped after {} of {} iterations", it, budget);
                summary.cancelled = true;
                break;
            }

            summary.max_gamma_change = self.sweep();
            summary.iterations += 1;
            self.iterations_run += 1;

            if let (Some(tol), Some(prev)) = (self.config.convergence_tolerance, previous.as_mut())
            {
                let current = self.normalized();
                let change = l1_distance(&prev.0, &current.0) + l1_distance(&prev.1, &current.1);
                summary.last_change = Some(change);
                *prev = current;
                log::debug!(
                    "Iteration {}/{}: max gamma change {:.6e}, L1 change {:.6e}",
                    it + 1,
                    budget,
                    summary.max_gamma_change,
                    change
                );
                if change < tol {
                    summary.converged = true;
                    log::info!("CVB converged after {} iterations", it + 1);
                    break;
                }
            } else {
                log::debug!(
                    "Iteration {}/{}: max gamma change {:.6e}",
                    it + 1,
                    budget,
                    summary.max_gamma_change
                );
            }
        }

        log::info!(
            "CVB finished: {} iterations this run, {} total",
            summary.iterations,
            self.iterations_run
        );
        summary
    }

    fn sweep(&mut self) -> f64 {
        let params = self.params;
        let documents = self.dataset.as_slice();

        let Some(pool) = self.pool.as_ref() else {
            let mut scratch = Scratch::new(params.k);
            let mut max_change = 0.0f64;
            for (doc, state) in documents.iter().zip(self.docs.iter_mut()) {
                let change = sweep_document(doc, state, &mut self.counts, &params, &mut scratch);
                max_change = max_change.max(change);
            }
            return max_change;
        };

        // Each worker sweeps a contiguous chunk against its own copy of the
        // shared counts; deltas are merged in chunk order.
        let chunk = documents.len().div_ceil(self.config.num_threads).max(1);
        let base = &self.counts;
        let partials: Vec<(SharedCounts, f64)> = pool.install(|| {
            documents
                .par_chunks(chunk)
                .zip(self.docs.par_chunks_mut(chunk))
                .map(|(docs, states)| {
                    let mut local = base.clone();
                    let mut scratch = Scratch::new(params.k);
                    let mut max_change = 0.0f64;
                    for (doc, state) in docs.iter().zip(states.iter_mut()) {
                        let change = sweep_document(doc, state, &mut local, &params, &mut scratch);
                        max_change = max_change.max(change);
                    }
                    (local, max_change)
                })
                .collect()
        });

        let mut merged = base.clone();
        let mut max_change = 0.0f64;
        for (local, change) in &partials {
            merged.add_delta(local, base);
            max_change = max_change.max(*change);
        }
        self.counts = merged;
        max_change
    }

    /// Row-major K×V topic-term distribution.
    pub fn phi(&self) -> Vec<f64> {
        let k = self.params.k;
        let v = self.dataset.vocab_size();
        let mut phi = vec![0.0; k * v];
        for t in 0..k {
            let row = &mut phi[t * v..(t + 1) * v];
            for (w, p) in row.iter_mut().enumerate() {
                *p = self.counts.term_topic[w * k + t].max(0.0) + self.params.beta;
            }
            normalize(row);
        }
        phi
    }

    /// Row-major D×K document-topic distribution.
    pub fn theta(&self) -> Vec<f64> {
        let k = self.params.k;
        let mut theta = Vec::with_capacity(self.docs.len() * k);
        for state in &self.docs {
            let start = theta.len();
            theta.extend(state.topic.iter().map(|n| n.max(0.0) + self.params.alpha));
            normalize(&mut theta[start..]);
        }
        theta
    }

    fn normalized(&self) -> (Vec<f64>, Vec<f64>) {
        (self.phi(), self.theta())
    }

    /// Snapshot of the current estimates.
    pub fn model(&self) -> Result<TopicModel> {
        TopicModel::from_parts(
            self.params.k,
            self.dataset.document_count(),
            self.dataset.vocab_size(),
            self.theta(),
            self.phi(),
        )
    }

    /// Saves the current estimates with [`crate::store::save`].
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        self.model()?.save(path)
    }
}

fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}
