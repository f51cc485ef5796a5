//! Latent Dirichlet Allocation topic inference over a forward index.
//!
//! The pipeline is:
//!
//! 1. wrap a [`ForwardIndex`] in a [`Dataset`];
//! 2. run collapsed variational Bayes ([`LdaCvb`], CVB0 by default);
//! 3. save the estimates with [`store::save`];
//! 4. reload them as a [`TopicModel`] and query top terms per topic, either by
//!    raw probability or with the [`BleiLaffertyScorer`].
//!
//! ```
//! use ldatopics::{BleiLaffertyScorer, Dataset, LdaConfig, LdaCvb, MemoryIndex};
//!
//! let index = MemoryIndex::from_texts(&[
//!     "smoking ban restaurants smoking",
//!     "part time job students job",
//! ]);
//! let dataset = Dataset::build(&index)?;
//! let mut lda = LdaCvb::new(&dataset, LdaConfig::new(2, 1.0, 0.01).with_iterations(50))?;
//! lda.run();
//!
//! let model = lda.model()?;
//! let scorer = BleiLaffertyScorer::new(&model)?;
//! let top = model.top_k_with(0, 3, &scorer)?;
//! assert_eq!(top.len(), 3);
//! # Ok::<(), ldatopics::LdaError>(())
//! ```

pub mod config;
pub mod cvb;
pub mod dataset;
pub mod error;
pub mod index;
pub mod model;
pub mod query;
pub mod scorer;
pub mod store;

pub use config::{Approximation, Initialization, LdaConfig};
pub use cvb::{LdaCvb, RunSummary, StopHandle};
pub use dataset::{Dataset, Document};
pub use error::{LdaError, Result};
pub use index::{DocId, ForwardIndex, MemoryIndex, TermId, Vocabulary};
pub use model::TopicModel;
pub use query::{TopicId, DEFAULT_TOP_K};
pub use scorer::{BleiLaffertyScorer, ProbabilityScorer, TermScorer};
