//! Parallel, vectorized synthesis of a sine tone into a 16-bit PCM WAV file.
//!
//! A run plans one cache-line aligned partition per worker, renders every
//! partition concurrently with an 8-wide sine kernel, joins all workers at a
//! single barrier and only then writes the finished buffer to disk.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info};
use thiserror::Error;

pub mod buffer;
pub mod config;
pub mod kernel;
pub mod partition;
pub mod pool;
pub mod wav;

pub use buffer::SampleBuffer;
pub use config::{Config, ConfigBuilder, ToneParameters};
pub use kernel::Kernel;
pub use partition::{header_gap_samples, plan_partitions, WorkPartition};
pub use pool::{WorkerPool, WorkerReport};
pub use wav::{ContainerWriter, WavHeader};

/// Errors that can occur while synthesizing a tone.
#[derive(Debug, Error)]
pub enum SynthError {
    /// The sample rate is zero or above the supported maximum.
    #[error("sample rate {0} Hz is outside the supported range")]
    InvalidSampleRate(u32),

    /// The frequency is not finite, not positive, or above Nyquist.
    #[error("frequency {frequency} Hz must be positive and at most {nyquist} Hz")]
    InvalidFrequency { frequency: f32, nyquist: f32 },

    /// The amplitude scale is negative or not finite.
    #[error("amplitude scale {0} must be finite and non-negative")]
    InvalidAmplitude(f32),

    /// A run needs at least one worker.
    #[error("worker count must be at least one")]
    NoWorkers,

    /// The worker barrier timeout must be non-zero.
    #[error("worker timeout must be greater than zero")]
    InvalidTimeout,

    /// The sample data does not fit the 32-bit RIFF size fields.
    #[error("{bytes} bytes of sample data exceed the WAV size limit")]
    BufferTooLarge { bytes: u64 },

    /// The file buffer could not be allocated.
    #[error("could not allocate a {bytes} byte sample buffer")]
    Allocation { bytes: u64 },

    /// The output file exists and overwriting was not requested.
    #[error("output file already exists: {0}")]
    OutputExists(PathBuf),

    /// The output file could not be opened for writing.
    #[error("could not create output file '{path}'")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operating system refused to start a worker thread.
    #[error("could not spawn worker {index}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Not every worker finished before the barrier timed out.
    #[error("{pending} worker(s) did not finish within {timeout:?}")]
    WorkerTimeout { timeout: Duration, pending: usize },

    /// A worker thread panicked while rendering.
    #[error("worker {index} panicked")]
    WorkerPanicked { index: usize },

    /// The write finished without storing the whole file.
    #[error("wrote {written} of {expected} bytes to the output file")]
    ShortWrite { written: usize, expected: usize },

    /// Wrapper around IO errors encountered while writing the file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Progress notifications emitted during [`run_with_progress`] and
/// [`run_with_metrics`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Synthesis is about to fan out to `partitions` workers.
    Start { partitions: usize, samples: usize },
    /// One more worker passed the barrier.
    Advance { completed: usize, partitions: usize },
    /// All workers joined; the file is being written.
    Writing { bytes: u64 },
    Finish,
}

/// Receiver of [`ProgressEvent`]s.
pub trait ProgressReporter {
    fn report(&mut self, _event: ProgressEvent) {}
}

struct CallbackReporter<F>(F);

impl<F: FnMut(ProgressEvent)> ProgressReporter for CallbackReporter<F> {
    fn report(&mut self, event: ProgressEvent) {
        (self.0)(event);
    }
}

struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Summary of a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisMetrics {
    pub partitions: usize,
    pub samples_written: usize,
    /// Samples left at zero: the header gap plus per-partition tails.
    pub unwritten_samples: usize,
    pub bytes_written: usize,
    pub elapsed: Duration,
}

/// Everything a run will do, computed without allocating or writing.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisPlan {
    pub header: WavHeader,
    pub partitions: Vec<WorkPartition>,
    pub gap_samples: usize,
}

/// Compute the header and partition layout for `config`.
pub fn plan(config: &Config) -> Result<SynthesisPlan, SynthError> {
    let header = WavHeader::for_tone(&config.tone);
    let sample_count = config.tone.sample_count();
    let partitions = plan_partitions(
        sample_count,
        header.file_size() as usize,
        config.workers.get(),
    )?;

    Ok(SynthesisPlan {
        header,
        partitions,
        gap_samples: header_gap_samples(sample_count),
    })
}

/// Synthesize the configured tone and write it to `config.output_path`.
pub fn run(config: Config) -> Result<(), SynthError> {
    run_with_metrics(config, &mut NoProgress).map(|_| ())
}

/// Like [`run`], reporting progress through `callback`.
pub fn run_with_progress<F>(config: Config, callback: F) -> Result<SynthesisMetrics, SynthError>
where
    F: FnMut(ProgressEvent),
{
    run_with_metrics(config, &mut CallbackReporter(callback))
}

/// Like [`run`], reporting progress to `reporter` and returning metrics.
pub fn run_with_metrics<R>(config: Config, reporter: &mut R) -> Result<SynthesisMetrics, SynthError>
where
    R: ProgressReporter + ?Sized,
{
    let started = Instant::now();
    let tone = config.tone;
    info!(
        "synthesizing {} Hz for {} s at {} Hz with {} worker(s)",
        tone.frequency(),
        tone.duration_secs(),
        tone.sample_rate(),
        config.workers
    );

    let plan = plan(&config)?;
    debug!("partition plan: {:?}", plan.partitions);
    info!("file size: {} bytes", plan.header.file_size());

    let writer = ContainerWriter::create(&config.output_path, config.overwrite)?;
    let mut buffer = SampleBuffer::allocate(&tone)?;
    buffer.write_header(&plan.header.encode());

    let total = plan.partitions.len();
    reporter.report(ProgressEvent::Start {
        partitions: total,
        samples: buffer.sample_count(),
    });

    let jobs = plan
        .partitions
        .iter()
        .copied()
        .zip(buffer.regions(&plan.partitions))
        .collect();
    let mut completed = 0;
    let reports = WorkerPool::new(config.timeout).run(&tone, config.kernel, jobs, |_| {
        completed += 1;
        reporter.report(ProgressEvent::Advance {
            completed,
            partitions: total,
        });
    })?;

    let samples_written: usize = reports.iter().map(|r| r.samples_written).sum();
    reporter.report(ProgressEvent::Writing {
        bytes: plan.header.file_size(),
    });
    let bytes_written = writer.write(buffer.as_bytes())?;
    reporter.report(ProgressEvent::Finish);

    let metrics = SynthesisMetrics {
        partitions: total,
        samples_written,
        unwritten_samples: buffer.sample_count() - samples_written,
        bytes_written,
        elapsed: started.elapsed(),
    };
    info!(
        "wrote '{}' ({} samples, {} left unwritten) in {:?}",
        config.output_path.display(),
        metrics.samples_written,
        metrics.unwritten_samples,
        metrics.elapsed
    );
    Ok(metrics)
}
