use serde::{Deserialize, Serialize};

use crate::params::{ParamKey, Parameters};

/// Identifies a virus within a model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirusId(pub usize);

/// Where a virus gets one of its rates from: a fixed value, or a model parameter read at the
/// time the rate is needed.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VirusRate {
    Constant(f64),
    Param(ParamKey),
}

impl VirusRate {
    pub fn value(&self, params: &Parameters) -> f64 {
        match *self {
            VirusRate::Constant(value) => value,
            VirusRate::Param(key) => params.get(key),
        }
    }
}

/// A virus. Agents own a copy of the virus that infected them; the copy holds no mutable state of
/// its own, only where to find its rates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Virus {
    id: VirusId,
    name: String,
    prob_infecting: VirusRate,
    prob_recovery: VirusRate,
    prob_death: VirusRate,
    incubation: VirusRate,
}

impl Virus {
    /// A virus with zero death probability and all other rates bound to the model parameters.
    pub fn new(id: VirusId, name: impl Into<String>) -> Self {
        Virus {
            id,
            name: name.into(),
            prob_infecting: VirusRate::Param(ParamKey::TransmissionRate),
            prob_recovery: VirusRate::Param(ParamKey::RecoveryRate),
            prob_death: VirusRate::Constant(0.0),
            incubation: VirusRate::Param(ParamKey::IncubationDays),
        }
    }

    pub fn id(&self) -> VirusId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn with_prob_infecting(mut self, rate: VirusRate) -> Self {
        self.prob_infecting = rate;
        self
    }

    #[must_use]
    pub fn with_prob_recovery(mut self, rate: VirusRate) -> Self {
        self.prob_recovery = rate;
        self
    }

    #[must_use]
    pub fn with_prob_death(mut self, rate: VirusRate) -> Self {
        self.prob_death = rate;
        self
    }

    #[must_use]
    pub fn with_incubation(mut self, rate: VirusRate) -> Self {
        self.incubation = rate;
        self
    }

    pub fn prob_infecting(&self, params: &Parameters) -> f64 {
        self.prob_infecting.value(params)
    }

    pub fn prob_recovery(&self, params: &Parameters) -> f64 {
        self.prob_recovery.value(params)
    }

    pub fn prob_death(&self, params: &Parameters) -> f64 {
        self.prob_death.value(params)
    }

    /// Mean incubation period in days.
    pub fn incubation(&self, params: &Parameters) -> f64 {
        self.incubation.value(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> Parameters {
        Parameters {
            contact_rate: 2.0,
            transmission_rate: 0.3,
            recovery_rate: 0.14,
            avg_incubation_days: 7.0,
        }
    }

    #[test]
    fn rates_follow_parameter_changes() {
        let virus = Virus::new(VirusId(0), "flu");
        let mut params = parameters();
        assert_eq!(virus.prob_infecting(&params), 0.3);
        assert_eq!(virus.incubation(&params), 7.0);

        params.set(ParamKey::TransmissionRate, 0.9);
        params.set(ParamKey::IncubationDays, 2.0);
        assert_eq!(virus.prob_infecting(&params), 0.9);
        assert_eq!(virus.incubation(&params), 2.0);
    }

    #[test]
    fn copies_share_no_state() {
        let virus = Virus::new(VirusId(0), "flu");
        let copy = virus.clone().with_prob_recovery(VirusRate::Constant(1.0));
        let params = parameters();
        assert_eq!(virus.prob_recovery(&params), 0.14);
        assert_eq!(copy.prob_recovery(&params), 1.0);
        assert_eq!(copy.prob_death(&params), 0.0);
        assert_eq!(copy.name(), "flu");
    }
}
