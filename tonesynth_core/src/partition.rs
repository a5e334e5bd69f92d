//! Splitting the sample region into per-worker partitions.
//!
//! The 44-byte header sits at the start of the buffer. Bytes between the end
//! of the header and the next cache-line boundary are never handed to a
//! worker, so every partition starts on a cache line. Those slots keep the
//! value the buffer was initialised with (zero).

use std::ops::Range;

use crate::SynthError;

pub const CACHE_LINE_BYTES: usize = 64;
pub const HEADER_BYTES: usize = 44;
pub const BYTES_PER_SAMPLE: usize = 2;
pub const SAMPLES_PER_CACHE_LINE: usize = CACHE_LINE_BYTES / BYTES_PER_SAMPLE;

/// Buffer offset at which the first partition begins.
pub const ALIGNED_DATA_OFFSET: usize = HEADER_BYTES.next_multiple_of(CACHE_LINE_BYTES);

/// A contiguous run of samples owned by a single worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkPartition {
    /// Position of the partition in the plan, which is also the worker index.
    pub index: usize,
    /// Index of the first sample covered by the partition.
    pub start_sample: usize,
    pub sample_count: usize,
}

impl WorkPartition {
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn sample_range(&self) -> Range<usize> {
        self.start_sample..self.start_sample + self.sample_count
    }

    /// Byte range of the partition within the whole file buffer.
    pub fn byte_range(&self) -> Range<usize> {
        let start = HEADER_BYTES + self.start_sample * BYTES_PER_SAMPLE;
        start..start + self.sample_count * BYTES_PER_SAMPLE
    }
}

/// Number of samples left unwritten between the header and the first
/// cache-line boundary.
pub fn header_gap_samples(sample_count: usize) -> usize {
    ((ALIGNED_DATA_OFFSET - HEADER_BYTES) / BYTES_PER_SAMPLE).min(sample_count)
}

/// Divide the post-header region of a buffer into `workers` partitions.
///
/// Whole cache lines are shared out evenly; the remainder of the division,
/// plus any trailing partial cache line, goes to the last worker. When there
/// are fewer cache lines than workers the leading partitions are empty.
pub fn plan_partitions(
    sample_count: usize,
    total_bytes: usize,
    workers: usize,
) -> Result<Vec<WorkPartition>, SynthError> {
    if workers == 0 {
        return Err(SynthError::NoWorkers);
    }
    debug_assert_eq!(total_bytes, HEADER_BYTES + sample_count * BYTES_PER_SAMPLE);

    let region_start = ALIGNED_DATA_OFFSET.min(total_bytes);
    let region_bytes = total_bytes - region_start;
    let cache_lines = region_bytes / CACHE_LINE_BYTES;
    let tail_bytes = region_bytes % CACHE_LINE_BYTES;
    let lines_per_worker = cache_lines / workers;
    let remainder = cache_lines % workers;

    let mut cursor = region_start;
    let mut partitions = Vec::with_capacity(workers);
    for index in 0..workers {
        let last = index + 1 == workers;
        let mut bytes = lines_per_worker * CACHE_LINE_BYTES;
        if last {
            bytes += remainder * CACHE_LINE_BYTES + tail_bytes;
        }

        partitions.push(WorkPartition {
            index,
            start_sample: (cursor - HEADER_BYTES) / BYTES_PER_SAMPLE,
            sample_count: bytes / BYTES_PER_SAMPLE,
        });
        cursor += bytes;
    }

    Ok(partitions)
}

/// Carve one disjoint mutable view per partition out of the file buffer.
///
/// # Panics
///
/// Panics if the partitions are not in ascending order or reach past the end
/// of `buffer`. Plans produced by [`plan_partitions`] for the same buffer
/// always satisfy both.
pub fn split_regions<'a>(buffer: &'a mut [u8], partitions: &[WorkPartition]) -> Vec<&'a mut [u8]> {
    let mut rest = buffer;
    let mut consumed = 0;
    let mut regions = Vec::with_capacity(partitions.len());

    for partition in partitions {
        let range = partition.byte_range();
        let (_, tail) = std::mem::take(&mut rest).split_at_mut(range.start - consumed);
        let (region, tail) = tail.split_at_mut(range.len());
        regions.push(region);
        rest = tail;
        consumed = range.end;
    }

    regions
}
