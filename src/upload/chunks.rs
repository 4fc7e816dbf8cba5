//! Chunk planning: split the package into the byte ranges negotiated with the service.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// One byte range of the package
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ChunkRange {
    /// 1-based block number
    pub(crate) block_number: u32,
    pub(crate) offset: u64,
    pub(crate) len: u64,
}

/// Ordered, contiguous ranges covering `[0, file_size)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
    ranges: Vec<ChunkRange>,
}

impl ChunkPlan {
    /// Plan `expected_count` chunks of `chunk_size` bytes over a file of `file_size` bytes.
    ///
    /// The last chunk holds the remainder. The expected count comes from the
    /// service and must agree with `ceil(file_size / chunk_size)`.
    pub(crate) fn new(file_size: u64, chunk_size: u64, expected_count: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::chunking("negotiated chunk size is zero"));
        }
        let count = file_size.div_ceil(chunk_size);
        if count != expected_count as u64 {
            return Err(Error::chunking(format!(
                "service expects {} chunks but a {} byte file in {} byte chunks needs {}",
                expected_count, file_size, chunk_size, count
            )));
        }
        let count = u32::try_from(count)
            .map_err(|_| Error::chunking(format!("too many chunks: {}", count)))?;

        let ranges = (0..count)
            .map(|i| {
                let offset = u64::from(i) * chunk_size;
                ChunkRange {
                    block_number: i + 1,
                    offset,
                    len: chunk_size.min(file_size - offset),
                }
            })
            .collect();

        Ok(Self {
            file_size,
            chunk_size,
            ranges,
        })
    }

    pub(crate) fn ranges(&self) -> &[ChunkRange] {
        &self.ranges
    }

    pub(crate) fn len(&self) -> usize {
        self.ranges.len()
    }

    pub(crate) fn file_size(&self) -> u64 {
        self.file_size
    }

    pub(crate) fn chunk_size(&self) -> u64 {
        self.chunk_size
    }
}

/// Sequential reader filling one chunk at a time, in plan order
pub(crate) struct ChunkReader<R> {
    source: R,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub(crate) fn new(source: R) -> Self {
        Self { source }
    }

    /// Read exactly `range.len` bytes. A short read is a chunking error.
    pub(crate) async fn read_chunk(&mut self, range: &ChunkRange) -> Result<Vec<u8>> {
        let len = usize::try_from(range.len)
            .map_err(|_| Error::chunking(format!("chunk {} does not fit in memory", range.block_number)))?;
        let mut data = vec![0u8; len];
        match self.source.read_exact(&mut data).await {
            Ok(_) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::Chunking {
                reason: format!(
                    "short read for chunk {}: expected {} bytes at offset {}",
                    range.block_number, range.len, range.offset
                ),
                source: Some(e),
            }),
            Err(e) => Err(Error::Chunking {
                reason: format!("failed to read chunk {}", range.block_number),
                source: Some(e),
            }),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn ten_mib_in_four_mib_chunks() {
        let plan = ChunkPlan::new(10 * MIB, 4 * MIB, 3).unwrap();

        let lens: Vec<u64> = plan.ranges().iter().map(|r| r.len).collect();
        assert_eq!(lens, vec![4 * MIB, 4 * MIB, 2 * MIB]);
        let blocks: Vec<u32> = plan.ranges().iter().map(|r| r.block_number).collect();
        assert_eq!(blocks, vec![1, 2, 3]);
    }

    #[test]
    fn ranges_are_contiguous_and_cover_the_file() {
        for (size, chunk) in [(1, 1), (7, 3), (9, 3), (4096, 1000), (10 * MIB + 1, 4 * MIB)] {
            let count = size.div_ceil(chunk) as usize;
            let plan = ChunkPlan::new(size, chunk, count).unwrap();

            let mut next = 0;
            for (i, range) in plan.ranges().iter().enumerate() {
                assert_eq!(range.offset, next, "size={size} chunk={chunk}");
                assert_eq!(range.block_number as usize, i + 1);
                assert!(range.len > 0 && range.len <= chunk);
                next += range.len;
            }
            assert_eq!(next, size);
            let last = plan.ranges().last().unwrap();
            assert_eq!(last.len, size - (count as u64 - 1) * chunk);
        }
    }

    #[test]
    fn empty_file_has_no_chunks() {
        let plan = ChunkPlan::new(0, 4 * MIB, 0).unwrap();
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = ChunkPlan::new(10, 0, 1).unwrap_err();
        assert!(matches!(err, Error::Chunking { .. }));
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let err = ChunkPlan::new(10 * MIB, 4 * MIB, 2).unwrap_err();
        assert!(matches!(err, Error::Chunking { .. }));
        assert!(err.to_string().contains("expects 2 chunks"), "{err}");
    }

    #[tokio::test]
    async fn reader_fills_chunks_in_order() {
        let bytes: Vec<u8> = (0..10u8).collect();
        let plan = ChunkPlan::new(10, 4, 3).unwrap();
        let mut reader = ChunkReader::new(std::io::Cursor::new(bytes));

        let mut chunks = Vec::new();
        for range in plan.ranges() {
            chunks.push(reader.read_chunk(range).await.unwrap());
        }

        assert_eq!(chunks, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
    }

    #[tokio::test]
    async fn short_read_is_a_chunking_error() {
        let plan = ChunkPlan::new(10, 4, 3).unwrap();
        let mut reader = ChunkReader::new(std::io::Cursor::new(vec![0u8; 6]));

        reader.read_chunk(&plan.ranges()[0]).await.unwrap();
        let err = reader.read_chunk(&plan.ranges()[1]).await.unwrap_err();

        match err {
            Error::Chunking { reason, source } => {
                assert!(reason.contains("chunk 2"), "{reason}");
                assert!(source.is_some());
            }
            other => panic!("expected chunking error, got {other:?}"),
        }
    }
}
