// memdoc-core/src/collection/cursor.rs
// Cursor over the result set of a find

use crate::document::SharedDocument;

/// Cursor over query results
///
/// The result set is fixed when the cursor is created; the documents
/// themselves are live handles (unless a projection produced copies).
#[derive(Debug, Clone)]
pub struct FindCursor {
    docs: Vec<SharedDocument>,
    position: usize,
}

impl FindCursor {
    pub(crate) fn new(docs: Vec<SharedDocument>) -> Self {
        FindCursor { docs, position: 0 }
    }

    /// Fetch the next batch of documents (up to `batch_size`)
    pub fn next_batch(&mut self, batch_size: usize) -> Vec<SharedDocument> {
        let end = (self.position + batch_size).min(self.docs.len());
        let batch = self.docs[self.position..end].to_vec();
        self.position = end;
        batch
    }

    /// Remaining documents in the cursor
    pub fn remaining(&self) -> usize {
        self.docs.len().saturating_sub(self.position)
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.docs.len()
    }

    /// Drain everything not yet returned
    pub fn to_vec(&mut self) -> Vec<SharedDocument> {
        let rest = self.docs[self.position..].to_vec();
        self.position = self.docs.len();
        rest
    }
}

impl Iterator for FindCursor {
    type Item = SharedDocument;

    fn next(&mut self) -> Option<SharedDocument> {
        let doc = self.docs.get(self.position).cloned()?;
        self.position += 1;
        Some(doc)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for FindCursor {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::share;
    use bson::doc;

    fn cursor(n: i32) -> FindCursor {
        FindCursor::new((0..n).map(|i| share(doc! {"i": i})).collect())
    }

    #[test]
    fn test_next_batch_and_remaining() {
        let mut cursor = cursor(5);
        assert_eq!(cursor.next_batch(2).len(), 2);
        assert_eq!(cursor.remaining(), 3);
        assert_eq!(cursor.next_batch(10).len(), 3);
        assert!(cursor.is_exhausted());
        assert!(cursor.next_batch(1).is_empty());
    }

    #[test]
    fn test_iterator_and_to_vec() {
        let mut cursor = cursor(3);
        let first = cursor.next().unwrap();
        assert_eq!(first.read().get_i32("i").unwrap(), 0);
        assert_eq!(cursor.len(), 2);
        let rest = cursor.to_vec();
        assert_eq!(rest.len(), 2);
        assert!(cursor.next().is_none());
    }
}
