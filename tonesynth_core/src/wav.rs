//! Canonical 44-byte RIFF/WAVE header and the single bounded file write.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::{ToneParameters, BITS_PER_SAMPLE, CHANNEL_COUNT};
use crate::partition::HEADER_BYTES;
use crate::SynthError;

pub const FORMAT_PCM: u16 = 1;
const FMT_CHUNK_SIZE: u32 = 16;
/// Header bytes counted by the RIFF size field (everything after it).
const RIFF_SIZE_OVERHEAD: u32 = HEADER_BYTES as u32 - 8;

/// Header fields of a mono 16-bit PCM file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavHeader {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    pub fn for_tone(tone: &ToneParameters) -> Self {
        Self {
            format_tag: FORMAT_PCM,
            channels: CHANNEL_COUNT,
            sample_rate: tone.sample_rate(),
            byte_rate: tone.byte_rate(),
            block_align: tone.block_align(),
            bits_per_sample: BITS_PER_SAMPLE,
            data_size: tone.data_size(),
        }
    }

    /// Value of the RIFF chunk size field: file size minus 8.
    pub fn riff_size(&self) -> u32 {
        RIFF_SIZE_OVERHEAD + self.data_size
    }

    pub fn file_size(&self) -> u64 {
        HEADER_BYTES as u64 + u64::from(self.data_size)
    }

    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&self.riff_size().to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
        out[20..22].copy_from_slice(&self.format_tag.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }
}

/// Destination file opened ahead of synthesis and written exactly once.
#[derive(Debug)]
pub struct ContainerWriter {
    path: PathBuf,
    file: File,
}

impl ContainerWriter {
    /// Open `path` for writing. Without `overwrite` an existing file is an
    /// error.
    pub fn create(path: &Path, overwrite: bool) -> Result<Self, SynthError> {
        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let file = options.open(path).map_err(|source| {
            if source.kind() == ErrorKind::AlreadyExists {
                SynthError::OutputExists(path.to_path_buf())
            } else {
                SynthError::CreateOutput {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Write the whole file image and close the file.
    ///
    /// Succeeds only if every byte of `bytes` reached the file.
    pub fn write(mut self, bytes: &[u8]) -> Result<usize, SynthError> {
        let mut written = 0;
        while written < bytes.len() {
            match self.file.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(SynthError::Io(err)),
            }
        }
        self.file.flush()?;

        if written != bytes.len() {
            return Err(SynthError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }

        debug!("wrote {} bytes to '{}'", written, self.path.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_canonical_layout() {
        let tone = ToneParameters::new(440.0, 44_100, 1, 32_767.0).unwrap();
        let header = WavHeader::for_tone(&tone).encode();

        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(header[4..8].try_into().unwrap()), 88_236);
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(header[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 1);
        assert_eq!(u32::from_le_bytes(header[24..28].try_into().unwrap()), 44_100);
        assert_eq!(u32::from_le_bytes(header[28..32].try_into().unwrap()), 88_200);
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 2);
        assert_eq!(u16::from_le_bytes([header[34], header[35]]), 16);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32::from_le_bytes(header[40..44].try_into().unwrap()), 88_200);
    }

    #[test]
    fn zero_duration_header_describes_empty_data() {
        let tone = ToneParameters::new(440.0, 44_100, 0, 32_767.0).unwrap();
        let header = WavHeader::for_tone(&tone);
        assert_eq!(header.data_size, 0);
        assert_eq!(header.riff_size(), 36);
        assert_eq!(header.file_size(), 44);
    }

    #[test]
    fn refuses_to_replace_existing_file_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, b"existing").unwrap();

        let err = ContainerWriter::create(&path, false).unwrap_err();
        assert!(matches!(err, SynthError::OutputExists(p) if p == path));

        let writer = ContainerWriter::create(&path, true).unwrap();
        assert_eq!(writer.write(b"new").unwrap(), 3);
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn reports_unopenable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("tone.wav");
        let err = ContainerWriter::create(&path, false).unwrap_err();
        assert!(matches!(err, SynthError::CreateOutput { .. }));
    }
}
