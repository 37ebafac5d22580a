//! Running many independent replicates of a model, and the command line entry point.
//!
//! Replicates are handed out to a fixed pool of scoped worker threads through an atomic counter.
//! Each replicate runs on its own deep copy of the template model, seeded with
//! [`derive_replicate_seed`], so its output depends only on the base seed and its index. The
//! number of workers changes the order in which replicates finish, never their results.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use clap::Parser;

use crate::config::ModelConfig;
use crate::database::ReplicateOutput;
use crate::error::SimError;
pub use crate::execution_stats::MultipleRunSummary;
use crate::execution_stats::{log_execution_statistics, BatchClock};
use crate::log::{apply_log_level_spec, debug, error, info, LogLevelSpec};
use crate::model::SeirMixingModel;
use crate::random::derive_replicate_seed;
use crate::report::{CsvSaver, MemorySaver, ResultSink};

/// How a batch of replicates is run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    pub days: usize,
    pub replicates: usize,
    pub seed: u64,
    /// Reset every replicate to day 0 before running it. Otherwise every replicate continues from
    /// the template's current state.
    pub reset: bool,
    /// Number of worker threads; zero is treated as one.
    pub threads: usize,
    /// Show a progress bar, if the `progress_bar` feature is enabled.
    pub progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            days: 100,
            replicates: 1,
            seed: 0,
            reset: true,
            threads: 1,
            progress: false,
        }
    }
}

/// Runs `replicates` independent replicates of `model` for `days` days on `threads` workers and
/// hands every successful one to `sink`.
///
/// # Errors
///
/// See [`run_batch`].
pub fn run_multiple<S: ResultSink + ?Sized>(
    model: &SeirMixingModel,
    days: usize,
    replicates: usize,
    seed: u64,
    sink: &S,
    reset: bool,
    threads: usize,
) -> Result<MultipleRunSummary, SimError> {
    let options = BatchOptions {
        days,
        replicates,
        seed,
        reset,
        threads,
        progress: false,
    };
    run_batch(model, &options, sink)
}

/// Runs a batch of replicates.
///
/// The sink's stale artifacts are cleared and the configuration is validated before any replicate
/// starts. Every replicate is then run, even after a sibling has failed, but only successful
/// replicates reach the sink.
///
/// # Errors
///
/// Returns the sink's error if its destination cannot be prepared, a [`SimError::ConfigError`] if
/// the model configuration is invalid, and otherwise a [`SimError::ReplicateFailed`] for the
/// lowest-indexed replicate that failed or could not be saved.
pub fn run_batch<S: ResultSink + ?Sized>(
    model: &SeirMixingModel,
    options: &BatchOptions,
    sink: &S,
) -> Result<MultipleRunSummary, SimError> {
    let clock = BatchClock::start();
    let threads = options.threads.clamp(1, options.replicates.max(1));

    sink.clear_stale()?;

    // Validates the configuration once, before any worker starts. Parameters may have changed
    // since a ready template was last reset.
    let mut template = model.clone();
    if template.is_ready() {
        template.params().validate()?;
    } else {
        template.resume(0, options.seed)?;
    }

    info!(
        "running {} replicates of {} days on {threads} threads (seed={}, reset={})",
        options.replicates, options.days, options.seed, options.reset
    );
    #[cfg(feature = "progress_bar")]
    if options.progress {
        crate::progress::init_replicate_progress_bar(options.replicates);
    }

    let next = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let failures: Mutex<Vec<(usize, SimError)>> = Mutex::new(Vec::new());

    thread::scope(|scope| {
        for worker in 0..threads {
            let (template, next, completed, failures) = (&template, &next, &completed, &failures);
            scope.spawn(move || loop {
                let replicate = next.fetch_add(1, Ordering::Relaxed);
                if replicate >= options.replicates {
                    break;
                }
                debug!("worker {worker} starting replicate {replicate}");
                match run_replicate(template, replicate, options, sink) {
                    Ok(()) => {
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(error) => {
                        error!("replicate {replicate} failed: {error}");
                        failures
                            .lock()
                            .unwrap_or_else(std::sync::PoisonError::into_inner)
                            .push((replicate, error));
                    }
                }
                #[cfg(feature = "progress_bar")]
                if options.progress {
                    crate::progress::increment_replicate_progress();
                }
            });
        }
    });

    #[cfg(feature = "progress_bar")]
    if options.progress {
        crate::progress::finalize_replicate_progress();
    }

    let failures = failures
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some((replicate, source)) = failures
        .into_iter()
        .min_by_key(|(replicate, _)| *replicate)
    {
        return Err(SimError::ReplicateFailed {
            replicate,
            source: Box::new(source),
        });
    }

    let summary = clock.finish(
        completed.into_inner(),
        threads,
        options.days,
        template.population().len(),
    );
    log_execution_statistics(&summary);
    Ok(summary)
}

/// Runs one replicate on a private copy of the template and saves it if it completes.
fn run_replicate<S: ResultSink + ?Sized>(
    template: &SeirMixingModel,
    replicate: usize,
    options: &BatchOptions,
    sink: &S,
) -> Result<(), SimError> {
    let seed = derive_replicate_seed(options.seed, replicate);
    let mut model = template.clone();
    if options.reset {
        model.run(options.days, seed)?;
    } else {
        model.resume(options.days, seed)?;
    }

    let output = ReplicateOutput {
        replicate,
        seed,
        days: options.days,
        database: model.into_database(),
    };
    sink.save(replicate, &output)
}

/// Command line arguments of the `seirmix` binary.
#[derive(Parser, Debug)]
#[command(name = "seirmix", version, about = "SEIR epidemics in mixing populations")]
pub struct RunArgs {
    /// Path of a JSON model configuration. Defaults to two mixing groups of 500 agents
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of days to simulate
    #[arg(short, long, default_value_t = 100)]
    pub days: usize,

    /// Number of replicates
    #[arg(short = 'n', long, default_value_t = 1)]
    pub replicates: usize,

    /// Random seed of the first replicate
    #[arg(short, long, default_value_t = 0)]
    pub random_seed: u64,

    /// Destination pattern for the CSV output, e.g. `output/run-{:03}`. Without it, final counts
    /// are printed instead
    #[arg(short, long)]
    pub output: Option<String>,

    /// Number of worker threads
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,

    /// Continue every replicate from the initial state instead of resetting it
    #[arg(long)]
    pub no_reset: bool,

    /// Log level, e.g. `info` or `seirmix::runner=trace,warn`
    #[arg(long)]
    pub log_level: Option<String>,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,
}

impl RunArgs {
    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            days: self.days,
            replicates: self.replicates,
            seed: self.random_seed,
            reset: !self.no_reset,
            threads: self.threads,
            progress: self.progress,
        }
    }
}

/// Loads the model, runs the batch described by `args` and reports where the output went.
///
/// # Errors
///
/// Returns an error if the log level or configuration is invalid, or if the batch fails.
pub fn run_with_args(args: &RunArgs) -> Result<MultipleRunSummary, SimError> {
    if let Some(spec) = &args.log_level {
        apply_log_level_spec(&spec.parse::<LogLevelSpec>()?);
    }

    let config = match &args.config {
        Some(path) => ModelConfig::from_file(path)?,
        None => ModelConfig::default(),
    };
    let model = config.into_model()?;
    let options = args.batch_options();

    let summary = match &args.output {
        Some(pattern) => {
            let saver = CsvSaver::new(pattern)?;
            let summary = run_batch(&model, &options, &saver)?;
            println!(
                "Wrote {} replicates to {}",
                summary.replicates,
                saver.pattern().dir().display()
            );
            summary
        }
        None => {
            let saver = MemorySaver::new();
            let summary = run_batch(&model, &options, &saver)?;
            for (replicate, output) in saver.into_outputs() {
                if let Some(totals) = output.database.totals(options.days) {
                    println!(
                        "replicate {replicate} (seed {}): S={} E={} I={} R={}",
                        output.seed, totals[0], totals[1], totals[2], totals[3]
                    );
                }
            }
            summary
        }
    };
    println!("{summary}");
    Ok(summary)
}
