//! Model parameters.
//!
//! The mixing model has four named scalar parameters. Viruses do not copy their values: they hold a
//! [`ParamKey`] and look the value up in the model's [`Parameters`] whenever a probability is
//! needed, so changing a parameter between runs is seen by every virus, attached or not.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::SimError;

/// Names a model parameter. The string forms are the labels used in configuration files and
/// model summaries.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum ParamKey {
    #[strum(to_string = "Contact rate")]
    #[serde(rename = "Contact rate")]
    ContactRate,
    #[strum(to_string = "Prob. Transmission")]
    #[serde(rename = "Prob. Transmission")]
    TransmissionRate,
    #[strum(to_string = "Prob. Recovery")]
    #[serde(rename = "Prob. Recovery")]
    RecoveryRate,
    #[strum(to_string = "Avg. Incubation days")]
    #[serde(rename = "Avg. Incubation days")]
    IncubationDays,
}

/// The scalar parameters shared by every agent of a run.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Expected number of contacts per agent per day.
    pub contact_rate: f64,
    /// Probability that a contact with an infected agent transmits the virus.
    pub transmission_rate: f64,
    /// Daily probability that an infected agent recovers.
    pub recovery_rate: f64,
    /// Mean number of days spent in the exposed state.
    pub avg_incubation_days: f64,
}

impl Parameters {
    pub fn get(&self, key: ParamKey) -> f64 {
        match key {
            ParamKey::ContactRate => self.contact_rate,
            ParamKey::TransmissionRate => self.transmission_rate,
            ParamKey::RecoveryRate => self.recovery_rate,
            ParamKey::IncubationDays => self.avg_incubation_days,
        }
    }

    pub fn set(&mut self, key: ParamKey, value: f64) {
        let slot = match key {
            ParamKey::ContactRate => &mut self.contact_rate,
            ParamKey::TransmissionRate => &mut self.transmission_rate,
            ParamKey::RecoveryRate => &mut self.recovery_rate,
            ParamKey::IncubationDays => &mut self.avg_incubation_days,
        };
        *slot = value;
    }

    /// Checks every parameter is in its domain.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] naming the first offending parameter.
    pub fn validate(&self) -> Result<(), SimError> {
        check_finite(ParamKey::ContactRate, self.contact_rate)?;
        if self.contact_rate < 0.0 {
            return Err(SimError::config(format!(
                "{} must be non-negative, but is {}",
                ParamKey::ContactRate,
                self.contact_rate
            )));
        }
        check_probability(ParamKey::TransmissionRate, self.transmission_rate)?;
        check_probability(ParamKey::RecoveryRate, self.recovery_rate)?;
        check_finite(ParamKey::IncubationDays, self.avg_incubation_days)?;
        if self.avg_incubation_days <= 0.0 {
            return Err(SimError::config(format!(
                "{} must be positive, but is {}",
                ParamKey::IncubationDays,
                self.avg_incubation_days
            )));
        }
        Ok(())
    }
}

fn check_finite(key: ParamKey, value: f64) -> Result<(), SimError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::config(format!("{key} must be finite, but is {value}")))
    }
}

fn check_probability(key: ParamKey, value: f64) -> Result<(), SimError> {
    check_finite(key, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{key} must be in [0, 1], but is {value}"
        )))
    }
}
