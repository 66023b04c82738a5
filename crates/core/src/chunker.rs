//! Chunk selection.
//!
//! Units never share a cursor: a continuation is built holding the tail of
//! the batch, so every unit chunks from offset 0 of what it owns.

use std::num::NonZeroUsize;

/// A view of one chunk of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a, R> {
    pub records: &'a [R],
    pub has_more: bool,
}

/// Records `[offset, offset + chunk_size)` of `batch`, clipped to its length.
pub fn next_chunk<R>(batch: &[R], offset: usize, chunk_size: NonZeroUsize) -> Chunk<'_, R> {
    let start = offset.min(batch.len());
    let end = offset.saturating_add(chunk_size.get());

    Chunk {
        records: &batch[start..end.min(batch.len())],
        has_more: end < batch.len(),
    }
}

/// Split an owned batch into its first chunk and the remaining tail.
///
/// `has_more` for the chunk is `!tail.is_empty()`.
pub fn split_chunk<R>(mut batch: Vec<R>, chunk_size: NonZeroUsize) -> (Vec<R>, Vec<R>) {
    let tail = if batch.len() > chunk_size.get() {
        batch.split_off(chunk_size.get())
    } else {
        Vec::new()
    };
    (batch, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn empty_batch_yields_empty_chunk() {
        let chunk = next_chunk::<u32>(&[], 0, size(50));
        assert!(chunk.records.is_empty());
        assert!(!chunk.has_more);

        let (head, tail) = split_chunk::<u32>(Vec::new(), size(50));
        assert!(head.is_empty() && tail.is_empty());
    }

    #[test]
    fn clips_to_batch_length() {
        let batch: Vec<u32> = (0..120).collect();

        let first = next_chunk(&batch, 0, size(50));
        assert_eq!(first.records.len(), 50);
        assert!(first.has_more);

        let last = next_chunk(&batch, 100, size(50));
        assert_eq!(last.records, &batch[100..]);
        assert!(!last.has_more);
    }

    #[test]
    fn exact_multiple_has_no_more() {
        let batch: Vec<u32> = (0..100).collect();
        let chunk = next_chunk(&batch, 50, size(50));
        assert_eq!(chunk.records.len(), 50);
        assert!(!chunk.has_more);
    }

    #[test]
    fn offset_past_end_is_empty() {
        let batch = [1, 2, 3];
        let chunk = next_chunk(&batch, 10, size(2));
        assert!(chunk.records.is_empty());
        assert!(!chunk.has_more);
    }

    #[test]
    fn split_matches_next_chunk() {
        let batch: Vec<u32> = (0..7).collect();
        let view = next_chunk(&batch, 0, size(3));
        let (head, tail) = split_chunk(batch.clone(), size(3));
        assert_eq!(head, view.records);
        assert_eq!(!tail.is_empty(), view.has_more);
        assert_eq!(tail, vec![3, 4, 5, 6]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: chaining split_chunk over the tail reproduces the batch
            /// in order, without gaps or duplicates.
            #[test]
            fn chunks_cover_batch_in_order(
                batch in proptest::collection::vec(any::<u16>(), 0..400),
                chunk_size in 1usize..64
            ) {
                let mut seen = Vec::with_capacity(batch.len());
                let mut remaining = batch.clone();
                let mut units = 0usize;

                loop {
                    let (chunk, tail) = split_chunk(remaining, size(chunk_size));
                    prop_assert!(chunk.len() <= chunk_size);
                    seen.extend(chunk);
                    units += 1;
                    if tail.is_empty() {
                        break;
                    }
                    remaining = tail;
                }

                prop_assert_eq!(&seen, &batch);
                prop_assert_eq!(units, batch.len().div_ceil(chunk_size).max(1));
            }

            #[test]
            fn has_more_iff_records_follow(
                len in 0usize..300,
                offset in 0usize..300,
                chunk_size in 1usize..64
            ) {
                let batch: Vec<usize> = (0..len).collect();
                let chunk = next_chunk(&batch, offset, size(chunk_size));
                prop_assert_eq!(chunk.has_more, offset + chunk_size < len);
            }
        }
    }
}
