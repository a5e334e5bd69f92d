use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::kernel::Kernel;
use crate::SynthError;

/// Tone frequency used when none is supplied.
pub const DEFAULT_FREQUENCY_HZ: f32 = 440.0;
/// Sample rate used when none is supplied.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Tone length used when none is supplied.
pub const DEFAULT_DURATION_SECS: u32 = 3;
/// Upper bound on the number of workers picked from hardware parallelism.
pub const DEFAULT_WORKER_CAP: usize = 16;
/// How long the join barrier waits for all workers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Highest sample rate accepted by [`ToneParameters::new`].
pub const MAX_SAMPLE_RATE: u32 = 768_000;

pub const BITS_PER_SAMPLE: u16 = 16;
pub const CHANNEL_COUNT: u16 = 1;
/// Full-scale amplitude for signed 16-bit samples, `2^(bits - 1) - 1`.
pub const FULL_SCALE_AMPLITUDE: f32 = ((1u32 << (BITS_PER_SAMPLE - 1)) - 1) as f32;

/// Bytes a RIFF container spends before the sample data.
const RIFF_OVERHEAD: u64 = 36;

/// Immutable description of the tone rendered by a single run.
///
/// Every worker receives a shared reference; nothing in here changes once
/// the value has been validated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneParameters {
    frequency: f32,
    sample_rate: u32,
    duration_secs: u32,
    amplitude_scale: f32,
}

impl ToneParameters {
    /// Validate and construct tone parameters.
    ///
    /// The sample rate must be in `1..=MAX_SAMPLE_RATE`, the frequency finite
    /// and within `(0, sample_rate / 2]`, the amplitude finite and
    /// non-negative, and the resulting data chunk must fit the 32-bit RIFF
    /// size fields.
    pub fn new(
        frequency: f32,
        sample_rate: u32,
        duration_secs: u32,
        amplitude_scale: f32,
    ) -> Result<Self, SynthError> {
        if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
            return Err(SynthError::InvalidSampleRate(sample_rate));
        }

        let nyquist = sample_rate as f32 / 2.0;
        if !frequency.is_finite() || frequency <= 0.0 || frequency > nyquist {
            return Err(SynthError::InvalidFrequency { frequency, nyquist });
        }

        if !amplitude_scale.is_finite() || amplitude_scale < 0.0 {
            return Err(SynthError::InvalidAmplitude(amplitude_scale));
        }

        let data_bytes = u64::from(sample_rate)
            * u64::from(duration_secs)
            * u64::from(CHANNEL_COUNT)
            * u64::from(BITS_PER_SAMPLE / 8);
        if data_bytes + RIFF_OVERHEAD > u64::from(u32::MAX) {
            return Err(SynthError::BufferTooLarge { bytes: data_bytes });
        }

        Ok(Self {
            frequency,
            sample_rate,
            duration_secs,
            amplitude_scale,
        })
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn amplitude_scale(&self) -> f32 {
        self.amplitude_scale
    }

    pub fn sample_count(&self) -> usize {
        self.sample_rate as usize * self.duration_secs as usize * CHANNEL_COUNT as usize
    }

    /// Size of the sample data chunk in bytes.
    pub fn data_size(&self) -> u32 {
        // Bounded by the check in `new`.
        (self.sample_count() * usize::from(BITS_PER_SAMPLE / 8)) as u32
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(BITS_PER_SAMPLE) * u32::from(CHANNEL_COUNT) / 8
    }

    pub fn block_align(&self) -> u16 {
        CHANNEL_COUNT * BITS_PER_SAMPLE / 8
    }

    /// Phase advance per sample in radians, `2π * frequency / sample_rate`.
    pub fn angular_step(&self) -> f32 {
        core::f32::consts::TAU * self.frequency / self.sample_rate as f32
    }
}

impl Default for ToneParameters {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY_HZ,
            sample_rate: DEFAULT_SAMPLE_RATE,
            duration_secs: DEFAULT_DURATION_SECS,
            amplitude_scale: FULL_SCALE_AMPLITUDE,
        }
    }
}

/// Configuration for a synthesis run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Destination of the WAV file.
    pub output_path: PathBuf,
    /// Tone rendered into the file.
    pub tone: ToneParameters,
    /// Number of workers, and therefore partitions.
    pub workers: NonZeroUsize,
    /// Maximum time the join barrier waits for the workers.
    pub timeout: Duration,
    /// Replace an existing file at `output_path`.
    pub overwrite: bool,
    /// Sample kernel run by every worker.
    pub kernel: Kernel,
}

impl Config {
    /// Construct a [`Config`] with default tone parameters.
    pub fn new<P: AsRef<Path>>(output: P) -> Result<Self, SynthError> {
        Self::builder(output).build()
    }

    /// Start building a [`Config`] that writes to `output`.
    pub fn builder<P: AsRef<Path>>(output: P) -> ConfigBuilder {
        ConfigBuilder::new(output.as_ref().to_path_buf())
    }
}

/// Builder for [`Config`] allowing optional parameters to be customised.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    output_path: PathBuf,
    frequency: f32,
    sample_rate: u32,
    duration_secs: u32,
    amplitude_scale: f32,
    workers: Option<usize>,
    worker_cap: usize,
    timeout: Duration,
    overwrite: bool,
    kernel: Kernel,
}

impl ConfigBuilder {
    fn new(output_path: PathBuf) -> Self {
        Self {
            output_path,
            frequency: DEFAULT_FREQUENCY_HZ,
            sample_rate: DEFAULT_SAMPLE_RATE,
            duration_secs: DEFAULT_DURATION_SECS,
            amplitude_scale: FULL_SCALE_AMPLITUDE,
            workers: None,
            worker_cap: DEFAULT_WORKER_CAP,
            timeout: DEFAULT_TIMEOUT,
            overwrite: false,
            kernel: Kernel::default(),
        }
    }

    pub fn frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn duration_secs(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn amplitude(mut self, amplitude_scale: f32) -> Self {
        self.amplitude_scale = amplitude_scale;
        self
    }

    /// Use exactly `workers` partitions instead of deriving the count from
    /// hardware parallelism.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Cap applied to the hardware-derived worker count.
    pub fn worker_cap(mut self, cap: usize) -> Self {
        self.worker_cap = cap;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Validate the collected parameters and produce a [`Config`].
    pub fn build(self) -> Result<Config, SynthError> {
        let tone = ToneParameters::new(
            self.frequency,
            self.sample_rate,
            self.duration_secs,
            self.amplitude_scale,
        )?;

        let requested = match self.workers {
            Some(workers) => workers,
            None => default_worker_count(self.worker_cap),
        };
        let workers = NonZeroUsize::new(requested).ok_or(SynthError::NoWorkers)?;

        if self.timeout.is_zero() {
            return Err(SynthError::InvalidTimeout);
        }

        Ok(Config {
            output_path: self.output_path,
            tone,
            workers,
            timeout: self.timeout,
            overwrite: self.overwrite,
            kernel: self.kernel,
        })
    }
}

/// `min(available_parallelism, cap)`, treating unknown parallelism as one.
pub fn default_worker_count(cap: usize) -> usize {
    let available = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    available.min(cap)
}
