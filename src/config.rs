//! JSON model configuration.
//!
//! ```json
//! {
//!   "name": "flu",
//!   "n": 1000,
//!   "prevalence": 0.01,
//!   "contact_rate": 2.0,
//!   "transmission_rate": 0.3,
//!   "avg_incubation_days": 7.0,
//!   "recovery_rate": 0.14,
//!   "contact_matrix": [0.9, 0.1, 0.1, 0.9],
//!   "entities": [
//!     { "name": "north", "membership": 500 },
//!     { "name": "south", "membership": 500 }
//!   ]
//! }
//! ```
//!
//! `contact_matrix` is flattened in column-major order. An entity's `membership` is either a size
//! or an explicit list of agent ids.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::log::debug;
use crate::model::{InitialStates, SeirMixingModel};
use crate::population::EntitySpec;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Name of the virus.
    pub name: String,
    /// Number of agents.
    pub n: usize,
    pub prevalence: f64,
    pub contact_rate: f64,
    pub transmission_rate: f64,
    pub avg_incubation_days: f64,
    pub recovery_rate: f64,
    pub contact_matrix: Vec<f64>,
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub initial_states: InitialStates,
}

impl Default for ModelConfig {
    /// Two groups of 500 agents that mostly mix among themselves.
    fn default() -> Self {
        ModelConfig {
            name: "flu".to_string(),
            n: 1000,
            prevalence: 0.01,
            contact_rate: 2.0,
            transmission_rate: 0.3,
            avg_incubation_days: 7.0,
            recovery_rate: 0.14,
            contact_matrix: vec![0.9, 0.1, 0.1, 0.9],
            entities: vec![
                EntitySpec::with_size("north", 500),
                EntitySpec::with_size("south", 500),
            ],
            initial_states: InitialStates::default(),
        }
    }
}

impl ModelConfig {
    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::IoError`] if the file cannot be opened and a [`SimError::JsonError`]
    /// if it is not a valid configuration.
    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        debug!("loading model configuration from {}", path.display());
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Builds a model from this configuration. The model is not reset.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] if the entities do not fit the population or the initial
    /// state fractions are out of range.
    pub fn into_model(self) -> Result<SeirMixingModel, SimError> {
        let mut model = SeirMixingModel::new(
            &self.name,
            self.n,
            self.prevalence,
            self.contact_rate,
            self.transmission_rate,
            self.avg_incubation_days,
            self.recovery_rate,
            self.contact_matrix,
            &self.entities,
        )?;
        model.initial_states(self.initial_states)?;
        Ok(model)
    }
}
