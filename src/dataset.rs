use crate::error::{LdaError, Result};
use crate::index::{DocId, ForwardIndex, TermId};

/// Sparse term counts of one document, sorted by term id, no zero counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    terms: Vec<(TermId, u64)>,
    length: u64,
}

impl Document {
    fn from_counts(mut counts: Vec<(TermId, u64)>) -> Self {
        counts.retain(|&(_, c)| c > 0);
        counts.sort_unstable_by_key(|&(t, _)| t);
        // Merge duplicate term ids an index might report separately.
        counts.dedup_by(|next, kept| {
            if next.0 == kept.0 {
                kept.1 += next.1;
                true
            } else {
                false
            }
        });
        let length = counts.iter().map(|&(_, c)| c).sum();
        Self {
            terms: counts,
            length,
        }
    }

    pub fn terms(&self) -> &[(TermId, u64)] {
        &self.terms
    }

    /// Number of distinct terms.
    pub fn unique_terms(&self) -> usize {
        self.terms.len()
    }

    /// Total token count.
    pub fn length(&self) -> u64 {
        self.length
    }
}

/// Read-only array of documents the inference engine iterates over.
#[derive(Debug, Clone)]
pub struct Dataset {
    docs: Vec<Document>,
    vocab_size: usize,
}

impl Dataset {
    /// Loads every document of `index` into memory.
    pub fn build<I: ForwardIndex + ?Sized>(index: &I) -> Result<Self> {
        let docs = (0..index.document_count())
            .map(|d| index.doc_terms(d))
            .collect();
        let dataset = Self::from_documents(docs, index.vocab_size())?;
        log::info!(
            "Built dataset: {} documents, {} terms, {} tokens",
            dataset.document_count(),
            dataset.vocab_size(),
            dataset.total_tokens()
        );
        Ok(dataset)
    }

    pub fn from_documents(docs: Vec<Vec<(TermId, u64)>>, vocab_size: usize) -> Result<Self> {
        if docs.is_empty() {
            return Err(LdaError::IndexFormat("index has no documents".to_string()));
        }
        if vocab_size == 0 {
            return Err(LdaError::IndexFormat("index has an empty vocabulary".to_string()));
        }
        let docs: Vec<Document> = docs.into_iter().map(Document::from_counts).collect();
        for (d, doc) in docs.iter().enumerate() {
            if let Some(&(t, _)) = doc.terms.last() {
                if t >= vocab_size {
                    return Err(LdaError::IndexFormat(format!(
                        "document {d} references term {t} but vocabulary size is {vocab_size}"
                    )));
                }
            }
        }
        Ok(Self { docs, vocab_size })
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn document(&self, doc: DocId) -> Result<&Document> {
        self.docs
            .get(doc)
            .ok_or_else(|| LdaError::out_of_range("document", doc, self.docs.len()))
    }

    pub fn terms(&self, doc: DocId) -> Result<impl Iterator<Item = (TermId, u64)> + '_> {
        Ok(self.document(doc)?.terms.iter().copied())
    }

    pub fn document_length(&self, doc: DocId) -> Result<u64> {
        Ok(self.document(doc)?.length)
    }

    pub fn total_tokens(&self) -> u64 {
        self.docs.iter().map(Document::length).sum()
    }

    pub fn documents(&self) -> impl ExactSizeIterator<Item = &Document> + '_ {
        self.docs.iter()
    }

    pub(crate) fn as_slice(&self) -> &[Document] {
        &self.docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MemoryIndex, Vocabulary};

    fn toy_index() -> MemoryIndex {
        let vocab: Vocabulary = ["smoke", "ban", "job", "pay"].into_iter().collect();
        MemoryIndex::from_counts(vocab, vec![vec![(1, 2), (0, 3)], vec![(2, 1), (3, 0)]])
    }

    #[test]
    fn test_build_sorts_and_drops_zero_counts() {
        let ds = Dataset::build(&toy_index()).unwrap();
        assert_eq!(ds.document_count(), 2);
        assert_eq!(ds.vocab_size(), 4);
        assert_eq!(ds.terms(0).unwrap().collect::<Vec<_>>(), vec![(0, 3), (1, 2)]);
        assert_eq!(ds.terms(1).unwrap().collect::<Vec<_>>(), vec![(2, 1)]);
        assert_eq!(ds.document_length(0).unwrap(), 5);
        assert_eq!(ds.total_tokens(), 6);
    }

    #[test]
    fn test_duplicate_terms_are_merged() {
        let ds = Dataset::from_documents(vec![vec![(1, 2), (1, 3), (0, 1)]], 2).unwrap();
        assert_eq!(ds.terms(0).unwrap().collect::<Vec<_>>(), vec![(0, 1), (1, 5)]);
    }

    #[test]
    fn test_empty_index_is_rejected() {
        let empty = MemoryIndex::default();
        assert!(matches!(
            Dataset::build(&empty),
            Err(LdaError::IndexFormat(_))
        ));

        let no_vocab = MemoryIndex::from_counts(Vocabulary::new(), vec![vec![]]);
        assert!(matches!(
            Dataset::build(&no_vocab),
            Err(LdaError::IndexFormat(_))
        ));
    }

    #[test]
    fn test_out_of_vocabulary_term_is_rejected() {
        let err = Dataset::from_documents(vec![vec![(0, 1), (4, 1)]], 4).unwrap_err();
        assert!(err.to_string().contains("term 4"));
    }

    #[test]
    fn test_terms_out_of_range() {
        let ds = Dataset::build(&toy_index()).unwrap();
        assert!(matches!(
            ds.terms(2).err(),
            Some(LdaError::OutOfRange { id: 2, bound: 2, .. })
        ));
    }
}
