//! Sample kernels that fill one partition with 16-bit PCM sine samples.
//!
//! Both kernels work in batches of [`LANES`] samples and stop once another
//! full batch no longer fits the region, so up to `LANES - 1` trailing
//! samples of a region stay unwritten. The scalar kernel reproduces the
//! batch boundaries and the float arithmetic of the vectorized one exactly;
//! for identical inputs the two produce identical bytes.
//!
//! Kernels poll a shared cancel flag between batches and return early once it
//! is raised, leaving the rest of the region untouched.

use std::sync::atomic::{AtomicBool, Ordering};

use wide::{f32x8, i16x8};

use crate::config::ToneParameters;
use crate::partition::BYTES_PER_SAMPLE;

/// Samples produced per iteration.
pub const LANES: usize = 8;
/// Bytes stored per iteration.
pub const BATCH_BYTES: usize = LANES * BYTES_PER_SAMPLE;

const LANE_OFFSETS: [f32; LANES] = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];

/// Which kernel a worker runs over its partition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Kernel {
    /// 8-wide batched kernel.
    #[default]
    Vectorized,
    /// Per-sample reference kernel.
    Scalar,
}

impl Kernel {
    /// Render into `region`, returning the number of samples written.
    pub fn render(
        self,
        tone: &ToneParameters,
        start_sample: usize,
        region: &mut [u8],
        cancel: &AtomicBool,
    ) -> usize {
        match self {
            Kernel::Vectorized => render_vectorized(tone, start_sample, region, cancel),
            Kernel::Scalar => render_scalar(tone, start_sample, region, cancel),
        }
    }
}

/// Sine of every lane.
///
/// There is no portable 8-wide sine instruction, so each lane is evaluated
/// on its own; all eight results are produced before anything is stored.
#[inline]
pub(crate) fn sin8(phases: f32x8) -> f32x8 {
    f32x8::from(phases.to_array().map(f32::sin))
}

/// Narrow eight scaled samples to `i16` little-endian bytes.
///
/// Lanes are truncated toward zero into 32-bit integers and then packed with
/// signed saturation, so out-of-range values clamp to `i16::MIN`/`i16::MAX`
/// instead of wrapping. NaN maps to zero.
#[inline]
pub(crate) fn quantize8(scaled: f32x8) -> [u8; BATCH_BYTES] {
    let packed = i16x8::from_i32x8_saturate(scaled.trunc_int());
    bytemuck::cast(packed.to_array().map(i16::to_le))
}

/// Scalar form of [`quantize8`]: truncate toward zero, then saturate.
#[inline]
pub fn quantize(value: f32) -> i16 {
    let widened = value as i32;
    widened.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// First sample index of batch `batch` as the float the phase is built from.
#[inline]
fn batch_base(start_sample: usize, batch: usize) -> f32 {
    (start_sample + batch * LANES) as f32
}

/// Fill `region` with samples `start_sample..`, eight at a time.
pub fn render_vectorized(
    tone: &ToneParameters,
    start_sample: usize,
    region: &mut [u8],
    cancel: &AtomicBool,
) -> usize {
    let step = f32x8::splat(tone.angular_step());
    let amplitude = f32x8::splat(tone.amplitude_scale());
    let offsets = f32x8::from(LANE_OFFSETS);

    let mut written = 0;
    for (batch, out) in region.chunks_exact_mut(BATCH_BYTES).enumerate() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let phases = (f32x8::splat(batch_base(start_sample, batch)) + offsets) * step;
        out.copy_from_slice(&quantize8(sin8(phases) * amplitude));
        written += LANES;
    }
    written
}

/// Single-lane reference for [`render_vectorized`].
pub fn render_scalar(
    tone: &ToneParameters,
    start_sample: usize,
    region: &mut [u8],
    cancel: &AtomicBool,
) -> usize {
    let step = tone.angular_step();
    let amplitude = tone.amplitude_scale();

    let mut written = 0;
    for (batch, out) in region.chunks_exact_mut(BATCH_BYTES).enumerate() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let base = batch_base(start_sample, batch);
        for (slot, offset) in out.chunks_exact_mut(BYTES_PER_SAMPLE).zip(LANE_OFFSETS) {
            let value = ((base + offset) * step).sin() * amplitude;
            slot.copy_from_slice(&quantize(value).to_le_bytes());
        }
        written += LANES;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frequency: f32, sample_rate: u32, amplitude: f32) -> ToneParameters {
        ToneParameters::new(frequency, sample_rate, 1, amplitude).unwrap()
    }

    fn running() -> AtomicBool {
        AtomicBool::new(false)
    }

    fn decode(region: &[u8]) -> Vec<i16> {
        region
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    #[test]
    fn quantize_truncates_toward_zero() {
        assert_eq!(quantize(1.9), 1);
        assert_eq!(quantize(-1.9), -1);
        assert_eq!(quantize(32_766.99), 32_766);
        assert_eq!(quantize(f32::NAN), 0);
    }

    #[test]
    fn quantize_saturates() {
        assert_eq!(quantize(40_000.0), i16::MAX);
        assert_eq!(quantize(-40_000.0), i16::MIN);
        assert_eq!(quantize(f32::INFINITY), i16::MAX);
        assert_eq!(quantize(f32::NEG_INFINITY), i16::MIN);
    }

    #[test]
    fn quantize8_matches_scalar_policy() {
        let values = [1.9, -1.9, 32_766.99, 40_000.0, -40_000.0, f32::NAN, f32::INFINITY, -0.5];
        let bytes = quantize8(f32x8::from(values));
        for (pair, value) in bytes.chunks_exact(2).zip(values) {
            assert_eq!(i16::from_le_bytes([pair[0], pair[1]]), quantize(value), "{value}");
        }
    }

    #[test]
    fn raised_cancel_flag_stops_rendering() {
        let tone = tone(440.0, 44_100, 32_767.0);
        let cancel = AtomicBool::new(true);
        for kernel in [Kernel::Vectorized, Kernel::Scalar] {
            let mut region = vec![0xAAu8; 256];
            assert_eq!(kernel.render(&tone, 0, &mut region, &cancel), 0);
            assert!(region.iter().all(|&b| b == 0xAA));
        }
    }

    #[test]
    fn sin8_matches_lanewise_sine() {
        let phases = [0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 6.0];
        let result = sin8(f32x8::from(phases)).to_array();
        for (phase, value) in phases.iter().zip(result) {
            assert_eq!(value, phase.sin());
        }
    }

    #[test]
    fn vectorized_starts_at_zero_and_peaks_at_quarter_period() {
        let tone = tone(440.0, 44_100, 32_767.0);
        let mut region = vec![0u8; 64 * BYTES_PER_SAMPLE];
        render_vectorized(&tone, 0, &mut region, &running());
        let samples = decode(&region);
        assert_eq!(samples[0], 0);
        assert!(samples[25] >= 32_700, "peak was {}", samples[25]);
    }

    #[test]
    fn partial_batches_are_left_untouched() {
        let tone = tone(1_000.0, 48_000, 32_767.0);
        let mut region = vec![0xAAu8; 13 * BYTES_PER_SAMPLE];
        let written = render_vectorized(&tone, 3, &mut region, &running());
        assert_eq!(written, 8);
        assert!(region[BATCH_BYTES..].iter().all(|&b| b == 0xAA));

        let mut short = vec![0xAAu8; 7 * BYTES_PER_SAMPLE];
        assert_eq!(render_scalar(&tone, 3, &mut short, &running()), 0);
        assert!(short.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn scalar_and_vectorized_agree() {
        let tone = tone(523.25, 44_100, 30_000.0);
        for start in [0, 17, 9_999, 44_000] {
            let mut vectorized = vec![0u8; 203 * BYTES_PER_SAMPLE];
            let mut scalar = vectorized.clone();
            assert_eq!(
                render_vectorized(&tone, start, &mut vectorized, &running()),
                render_scalar(&tone, start, &mut scalar, &running())
            );
            for (v, s) in decode(&vectorized).into_iter().zip(decode(&scalar)) {
                assert!((i32::from(v) - i32::from(s)).abs() <= 1);
            }
        }
    }

    #[test]
    fn output_is_deterministic() {
        let tone = tone(440.0, 44_100, 32_767.0);
        let mut first = vec![0u8; 512];
        let mut second = vec![0u8; 512];
        Kernel::Vectorized.render(&tone, 100, &mut first, &running());
        Kernel::Vectorized.render(&tone, 100, &mut second, &running());
        assert_eq!(first, second);
    }

    #[test]
    fn amplitude_beyond_full_scale_saturates_without_wrapping() {
        // A quarter of the sample rate lands phases on multiples of π/2.
        let tone = tone(11_025.0, 44_100, 40_000.0);
        let mut region = vec![0u8; 64 * BYTES_PER_SAMPLE];
        render_vectorized(&tone, 0, &mut region, &running());
        let samples = decode(&region);
        for chunk in samples.chunks(4) {
            assert_eq!(chunk[1], i16::MAX);
            assert_eq!(chunk[3], i16::MIN);
        }
    }
}
