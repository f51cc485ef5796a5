//! Forward index: the per-document bag-of-words the engine reads from.
//!
//! The engine only depends on the [`ForwardIndex`] trait. [`MemoryIndex`] is a
//! small in-memory implementation with a plain lowercase tokenizer, enough to
//! feed the engine from raw text in tests and the demo.

use std::collections::{BTreeMap, HashMap, HashSet};

pub type TermId = usize;
pub type DocId = usize;

/// Read access to an already-built forward index.
pub trait ForwardIndex {
    fn document_count(&self) -> usize;

    fn vocab_size(&self) -> usize;

    /// `(term_id, count)` pairs of one document. Order is not significant.
    fn doc_terms(&self, doc: DocId) -> Vec<(TermId, u64)>;

    fn term_text(&self, term: TermId) -> Option<&str>;

    fn term_id(&self, text: &str) -> Option<TermId>;
}

/// Bidirectional term-id <-> term string mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    terms: Vec<String>,
    ids: HashMap<String, TermId>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `term`, assigning the next dense id if it is new.
    pub fn intern(&mut self, term: &str) -> TermId {
        if let Some(&id) = self.ids.get(term) {
            return id;
        }
        let id = self.terms.len();
        self.terms.push(term.to_string());
        self.ids.insert(term.to_string(), id);
        id
    }

    pub fn id(&self, term: &str) -> Option<TermId> {
        self.ids.get(term).copied()
    }

    pub fn text(&self, id: TermId) -> Option<&str> {
        self.terms.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut vocab = Vocabulary::new();
        for term in iter {
            vocab.intern(term.as_ref());
        }
        vocab
    }
}

pub fn default_stopwords() -> HashSet<&'static str> {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
        "of", "on", "or", "that", "the", "to", "was", "were", "will", "with",
    ]
    .into_iter()
    .collect()
}

/// Lowercases, splits on non-alphabetic characters and drops one-letter
/// tokens and stopwords.
pub fn tokenize(text: &str, stopwords: &HashSet<&str>) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|tok| tok.chars().count() >= 2 && !stopwords.contains(*tok))
        .map(str::to_string)
        .collect()
}

/// In-memory forward index.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    vocab: Vocabulary,
    docs: Vec<Vec<(TermId, u64)>>,
}

impl MemoryIndex {
    /// Builds an index from raw documents using [`tokenize`] and the default
    /// stopword list. Documents that tokenize to nothing are kept (empty).
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let stop = default_stopwords();
        let mut index = MemoryIndex::default();
        for text in texts {
            let tokens = tokenize(text.as_ref(), &stop);
            index.push_tokens(tokens.iter().map(String::as_str));
        }
        log::debug!(
            "Built memory index: {} documents, {} terms",
            index.docs.len(),
            index.vocab.len()
        );
        index
    }

    /// Builds an index from a vocabulary and per-document `(term_id, count)`
    /// lists. Term ids are not checked here; [`crate::Dataset::build`] does.
    pub fn from_counts(vocab: Vocabulary, docs: Vec<Vec<(TermId, u64)>>) -> Self {
        Self { vocab, docs }
    }

    /// Appends one document made of already-tokenized terms and returns its id.
    pub fn push_tokens<'a, I>(&mut self, tokens: I) -> DocId
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: BTreeMap<TermId, u64> = BTreeMap::new();
        for tok in tokens {
            *counts.entry(self.vocab.intern(tok)).or_insert(0) += 1;
        }
        self.docs.push(counts.into_iter().collect());
        self.docs.len() - 1
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }
}

impl ForwardIndex for MemoryIndex {
    fn document_count(&self) -> usize {
        self.docs.len()
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn doc_terms(&self, doc: DocId) -> Vec<(TermId, u64)> {
        self.docs.get(doc).cloned().unwrap_or_default()
    }

    fn term_text(&self, term: TermId) -> Option<&str> {
        self.vocab.text(term)
    }

    fn term_id(&self, text: &str) -> Option<TermId> {
        self.vocab.id(text)
    }
}
