use aligned_vec::{AVec, ConstAlign};

use crate::config::ToneParameters;
use crate::partition::{split_regions, WorkPartition, BYTES_PER_SAMPLE, CACHE_LINE_BYTES, HEADER_BYTES};
use crate::SynthError;

/// Zero-initialised, cache-line aligned storage for a complete WAV file:
/// the header followed by the sample data.
pub struct SampleBuffer {
    bytes: AVec<u8, ConstAlign<CACHE_LINE_BYTES>>,
    sample_count: usize,
}

impl SampleBuffer {
    /// Allocate a buffer sized for `tone`.
    ///
    /// Fails with [`SynthError::Allocation`] when the allocator cannot supply
    /// the memory, instead of aborting.
    pub fn allocate(tone: &ToneParameters) -> Result<Self, SynthError> {
        let sample_count = tone.sample_count();
        let len = sample_count
            .checked_mul(BYTES_PER_SAMPLE)
            .and_then(|data| data.checked_add(HEADER_BYTES))
            .ok_or(SynthError::Allocation {
                bytes: u64::from(tone.data_size()) + HEADER_BYTES as u64,
            })?;

        Ok(Self {
            bytes: zeroed(len)?,
            sample_count,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// The whole file image.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Overwrite the header region.
    pub fn write_header(&mut self, header: &[u8; HEADER_BYTES]) {
        self.bytes[..HEADER_BYTES].copy_from_slice(header);
    }

    /// Sample at `index`, if it is inside the data region.
    pub fn sample(&self, index: usize) -> Option<i16> {
        let offset = HEADER_BYTES + index.checked_mul(BYTES_PER_SAMPLE)?;
        let pair = self.bytes.get(offset..offset + BYTES_PER_SAMPLE)?;
        Some(i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Disjoint mutable views of the sample data, one per partition.
    pub fn regions(&mut self, partitions: &[WorkPartition]) -> Vec<&mut [u8]> {
        split_regions(&mut self.bytes, partitions)
    }
}

fn zeroed(len: usize) -> Result<AVec<u8, ConstAlign<CACHE_LINE_BYTES>>, SynthError> {
    let mut bytes = AVec::new(CACHE_LINE_BYTES);
    bytes
        .try_reserve_exact(len)
        .map_err(|_| SynthError::Allocation { bytes: len as u64 })?;
    bytes.resize(len, 0);
    Ok(bytes)
}
