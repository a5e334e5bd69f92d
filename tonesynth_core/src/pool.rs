//! Fork-join execution of one kernel per partition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use log::{debug, warn};

use crate::config::ToneParameters;
use crate::kernel::Kernel;
use crate::partition::WorkPartition;
use crate::SynthError;

/// Completion notice sent by a worker once its region is filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    pub partition: WorkPartition,
    pub samples_written: usize,
}

/// Runs one worker thread per partition behind a single join barrier.
#[derive(Clone, Copy, Debug)]
pub struct WorkerPool {
    timeout: Duration,
}

impl WorkerPool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Render every `(partition, region)` job on its own thread and wait for
    /// all of them.
    ///
    /// `on_complete` is invoked on the calling thread, in completion order,
    /// as reports arrive. Threads are joined before this returns on every
    /// path, including spawn failures and timeouts; a worker still running
    /// when the deadline passes turns the whole run into
    /// [`SynthError::WorkerTimeout`]. Once the barrier fails, remaining
    /// workers are cancelled and stop at their next batch, so the join does
    /// not wait for their regions to finish. Reports are returned in
    /// partition order.
    pub fn run<'a, F>(
        &self,
        tone: &ToneParameters,
        kernel: Kernel,
        jobs: Vec<(WorkPartition, &'a mut [u8])>,
        mut on_complete: F,
    ) -> Result<Vec<WorkerReport>, SynthError>
    where
        F: FnMut(&WorkerReport),
    {
        let expected = jobs.len();
        let deadline = Instant::now() + self.timeout;
        let (sender, receiver) = channel::unbounded();
        let cancel = AtomicBool::new(false);

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(expected);
            let mut spawn_error = None;

            for (partition, region) in jobs {
                if partition.is_empty() {
                    warn!("worker {} received an empty partition", partition.index);
                }

                let sender = sender.clone();
                let cancel = &cancel;
                let spawned = thread::Builder::new()
                    .name(format!("tonesynth-worker-{}", partition.index))
                    .spawn_scoped(scope, move || {
                        let samples_written =
                            kernel.render(tone, partition.start_sample, region, cancel);
                        // The barrier may already have given up on us.
                        let _ = sender.send(WorkerReport {
                            partition,
                            samples_written,
                        });
                    });

                match spawned {
                    Ok(handle) => handles.push((partition.index, handle)),
                    Err(source) => {
                        spawn_error = Some(SynthError::WorkerSpawn {
                            index: partition.index,
                            source,
                        });
                        break;
                    }
                }
            }
            drop(sender);

            let barrier = match spawn_error {
                Some(err) => Err(err),
                None => self.await_reports(&receiver, expected, deadline, &mut on_complete),
            };
            if barrier.is_err() {
                cancel.store(true, Ordering::Relaxed);
            }

            let mut panicked = None;
            for (index, handle) in handles {
                if handle.join().is_err() && panicked.is_none() {
                    panicked = Some(index);
                }
            }

            if let Some(index) = panicked {
                return Err(SynthError::WorkerPanicked { index });
            }

            let mut reports = barrier?;
            reports.sort_by_key(|report| report.partition.index);
            Ok(reports)
        })
    }

    fn await_reports<F>(
        &self,
        receiver: &Receiver<WorkerReport>,
        expected: usize,
        deadline: Instant,
        on_complete: &mut F,
    ) -> Result<Vec<WorkerReport>, SynthError>
    where
        F: FnMut(&WorkerReport),
    {
        let mut reports = Vec::with_capacity(expected);
        while reports.len() < expected {
            match receiver.recv_deadline(deadline) {
                Ok(report) => {
                    debug!(
                        "worker {} wrote {} of {} samples",
                        report.partition.index,
                        report.samples_written,
                        report.partition.sample_count
                    );
                    on_complete(&report);
                    reports.push(report);
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SynthError::WorkerTimeout {
                        timeout: self.timeout,
                        pending: expected - reports.len(),
                    });
                }
                // Every sender is gone: the missing workers panicked and
                // are reported when joined.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(reports)
    }
}
