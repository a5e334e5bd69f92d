mod cli;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tonesynth_core::{plan, run_with_progress, Config, Kernel, ProgressEvent};

use crate::cli::build_cli;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();

    let output_path = matches
        .get_one::<PathBuf>("output")
        .expect("defaulted argument");
    let frequency = *matches
        .get_one::<f32>("frequency")
        .expect("defaulted argument");
    let sample_rate = *matches
        .get_one::<u32>("sample-rate")
        .expect("defaulted argument");
    let duration_secs = *matches
        .get_one::<u32>("duration")
        .expect("defaulted argument");
    let amplitude = *matches
        .get_one::<f32>("amplitude")
        .expect("defaulted argument");
    let timeout = *matches
        .get_one::<Duration>("timeout")
        .expect("defaulted argument");
    let kernel = if matches.get_flag("scalar") {
        Kernel::Scalar
    } else {
        Kernel::Vectorized
    };

    let mut builder = Config::builder(output_path)
        .frequency(frequency)
        .sample_rate(sample_rate)
        .duration_secs(duration_secs)
        .amplitude(amplitude)
        .timeout(timeout)
        .kernel(kernel)
        .overwrite(matches.get_flag("overwrite"));
    if let Some(workers) = matches.get_one::<NonZeroUsize>("workers") {
        builder = builder.workers(workers.get());
    }
    let config = builder
        .build()
        .context("failed to create synthesis configuration")?;

    if matches.get_flag("dry-run") {
        let plan = plan(&config).context("failed to plan synthesis")?;
        let header = plan.header;

        println!(
            "Dry run: would write {} ({} bytes)",
            output_path.display(),
            header.file_size()
        );
        println!(
            "  {} Hz, {} channel(s), {} bits, byte rate {}, block align {}, data size {}",
            header.sample_rate,
            header.channels,
            header.bits_per_sample,
            header.byte_rate,
            header.block_align,
            header.data_size
        );
        println!(
            "  {} worker(s), {} sample(s) reserved after the header",
            plan.partitions.len(),
            plan.gap_samples
        );
        for partition in &plan.partitions {
            let range = partition.sample_range();
            println!(
                "  worker {}: samples {}..{} ({} samples)",
                partition.index, range.start, range.end, partition.sample_count
            );
        }

        return Ok(());
    }

    let progress = ProgressBar::new(0);
    progress.set_draw_target(ProgressDrawTarget::stderr());

    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let progress_handle = progress.clone();
    let result = run_with_progress(config, move |event| match event {
        ProgressEvent::Start {
            partitions,
            samples,
        } => {
            progress_handle.set_style(bar_style.clone());
            progress_handle.set_length(partitions as u64);
            progress_handle.enable_steady_tick(Duration::from_millis(100));
            progress_handle.set_message(format!("rendering {samples} samples"));
        }
        ProgressEvent::Advance { completed, .. } => {
            progress_handle.set_position(completed as u64);
        }
        ProgressEvent::Writing { bytes } => {
            progress_handle.set_message(format!("writing {}", HumanBytes(bytes)));
        }
        ProgressEvent::Finish => {
            progress_handle.set_message(String::from("Completed"));
        }
    })
    .with_context(|| format!("failed to synthesize '{}'", output_path.display()));

    progress.finish_and_clear();

    let metrics = result?;
    log::info!(
        "finished {} in {}",
        output_path.display(),
        HumanDuration(metrics.elapsed)
    );

    Ok(())
}
