//! Chunker - splits a submission into size-bounded, order-preserving chunks

use std::num::NonZeroUsize;

use crate::error::DispatchError;

/// Maximum items per sink call (always >= 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSize(NonZeroUsize);

impl BatchSize {
    /// Validate a raw batch size
    ///
    /// # Errors
    /// `InvalidConfiguration` when `size` is zero
    pub fn new(size: usize) -> Result<Self, DispatchError> {
        NonZeroUsize::new(size).map(Self).ok_or_else(|| {
            DispatchError::invalid_configuration("max_batch_size", "must be >= 1, got 0")
        })
    }

    /// Raw value
    pub fn get(self) -> usize {
        self.0.get()
    }
}

/// Split `items` into contiguous chunks of at most `max_size` items.
///
/// Every chunk but the last holds exactly `max_size` items; empty input
/// yields no chunks.
pub fn chunk<T>(items: &[T], max_size: BatchSize) -> std::slice::Chunks<'_, T> {
    items.chunks(max_size.get())
}

/// Number of chunks `chunk` yields for `len` items
pub fn chunk_count(len: usize, max_size: BatchSize) -> usize {
    len.div_ceil(max_size.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> BatchSize {
        BatchSize::new(n).unwrap()
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(matches!(
            BatchSize::new(0),
            Err(DispatchError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let items: Vec<u32> = Vec::new();
        assert_eq!(chunk(&items, size(10)).count(), 0);
        assert_eq!(chunk_count(0, size(10)), 0);
    }

    #[test]
    fn test_chunk_completeness_and_bounds() {
        for len in 1..=40usize {
            for max in 1..=12usize {
                let items: Vec<usize> = (0..len).collect();
                let chunks: Vec<&[usize]> = chunk(&items, size(max)).collect();

                assert_eq!(chunks.len(), chunk_count(len, size(max)));

                let rebuilt: Vec<usize> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
                assert_eq!(rebuilt, items, "len={len} max={max}");

                let (last, full) = chunks.split_last().unwrap();
                assert!(full.iter().all(|c| c.len() == max));
                assert!((1..=max).contains(&last.len()));
            }
        }
    }

    #[test]
    fn test_250_items_by_100() {
        let items: Vec<u32> = (0..250).collect();
        let sizes: Vec<usize> = chunk(&items, size(100)).map(<[u32]>::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }
}
