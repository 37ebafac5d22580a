//! A stochastic, discrete-time SEIR simulator for populations split into mixing groups.
//!
//! Agents belong to entities (households, schools, regions, ...) and meet infected agents of
//! every entity according to a group-to-group contact matrix. A single virus moves agents through
//! the Susceptible, Exposed, Infected and Recovered states one day at a time, driven by a seeded
//! random stream so that every run can be reproduced exactly.
//!
//! The main pieces are:
//! * [`SeirMixingModel`]: the model and its day loop.
//! * [`ContactMatrix`] and the contact sampler, which decide who meets whom.
//! * [`run_multiple`]: many independent replicates on a pool of worker threads, each handed to
//!   a [`ResultSink`] such as [`CsvSaver`] when it completes.
//!
//! ```no_run
//! use seirmix::{run_multiple, CsvSaver, ModelConfig};
//!
//! let model = ModelConfig::default().into_model()?;
//! let saver = CsvSaver::new("output/run-{:03}")?;
//! let summary = run_multiple(&model, 100, 10, 42, &saver, true, 4)?;
//! println!("{summary}");
//! # Ok::<(), seirmix::SimError>(())
//! ```
pub mod config;
pub mod contact_matrix;
pub mod contact_sampler;
pub mod database;
pub mod error;
pub mod execution_stats;
pub mod infected_index;
pub mod log;
pub mod model;
pub mod params;
pub mod population;
#[cfg(feature = "progress_bar")]
pub mod progress;
pub mod random;
pub mod report;
pub mod runner;
pub mod virus;

pub use config::ModelConfig;
pub use contact_matrix::ContactMatrix;
pub use database::{Database, ReplicateOutput};
pub use error::SimError;
pub use model::{InitialStates, SeirMixingModel};
pub use params::{ParamKey, Parameters};
pub use population::{AgentId, EntityId, EntitySpec, HealthState, Modifiers};
pub use report::{CsvSaver, MemorySaver, ResultSink, SaveWhat};
pub use runner::{run_batch, run_multiple, BatchOptions, MultipleRunSummary, RunArgs};
pub use virus::{Virus, VirusId, VirusRate};

// Re-exported for use in models and tests.
pub use rand;

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
