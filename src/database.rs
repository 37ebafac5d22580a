//! Per-run history of the model: daily state totals, daily transition counts and individual
//! transmission events. A run appends to its own database only; it is cleared on every reset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};

use crate::population::{AgentId, HealthState};
use crate::virus::Virus;
use crate::HashMap;

type StateCounts = [usize; HealthState::COUNT];
type TransitionCounts = [[usize; HealthState::COUNT]; HealthState::COUNT];

/// Number of agents in a state at the end of a day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHistRow {
    pub date: usize,
    pub state: HealthState,
    pub counts: usize,
}

/// Number of agents that moved from one state to another during a day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRow {
    pub date: usize,
    pub from: HealthState,
    pub to: HealthState,
    pub counts: usize,
}

/// One infection: `source` passed `virus` to `target` on `date`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionRow {
    pub date: usize,
    pub virus_id: usize,
    pub virus: String,
    pub source: usize,
    pub target: usize,
}

/// Number of agents infected by `source`, which was itself exposed on `source_exposure_date`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReproductiveRow {
    pub virus_id: usize,
    pub virus: String,
    pub source: usize,
    pub source_exposure_date: usize,
    pub rt: usize,
}

/// Days between the exposure of `source` and one of the infections it caused on `date`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRow {
    pub date: usize,
    pub virus_id: usize,
    pub virus: String,
    pub source: usize,
    pub source_exposure_date: usize,
    pub generation_time: usize,
}

// An agent carrying the virus at day 0.
#[derive(Clone, Debug, PartialEq)]
struct SeededAgent {
    agent: usize,
    virus_id: usize,
    virus: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Database {
    daily_totals: Vec<StateCounts>,
    daily_transitions: Vec<TransitionCounts>,
    transmissions: Vec<TransmissionRow>,
    seeded: Vec<SeededAgent>,
}

impl Database {
    pub fn clear(&mut self) {
        self.daily_totals.clear();
        self.daily_transitions.clear();
        self.transmissions.clear();
        self.seeded.clear();
    }

    /// Appends the totals and transitions of the next day. Day 0 is the initial state and has no
    /// transitions.
    pub(crate) fn record_day(&mut self, totals: StateCounts, transitions: TransitionCounts) {
        self.daily_totals.push(totals);
        self.daily_transitions.push(transitions);
    }

    pub(crate) fn record_transmission(
        &mut self,
        date: usize,
        source: AgentId,
        target: AgentId,
        virus: &Virus,
    ) {
        self.transmissions.push(TransmissionRow {
            date,
            virus_id: virus.id().0,
            virus: virus.name().to_string(),
            source: source.0,
            target: target.0,
        });
    }

    /// Marks `agent` as infected at day 0, without a source.
    pub(crate) fn record_seed(&mut self, agent: AgentId, virus: &Virus) {
        self.seeded.push(SeededAgent {
            agent: agent.0,
            virus_id: virus.id().0,
            virus: virus.name().to_string(),
        });
    }

    /// Number of recorded days, including day 0.
    pub fn n_days(&self) -> usize {
        self.daily_totals.len()
    }

    /// State totals of `date`, indexed by [`HealthState::index`].
    pub fn totals(&self, date: usize) -> Option<&StateCounts> {
        self.daily_totals.get(date)
    }

    /// The daily series of one state.
    pub fn series(&self, state: HealthState) -> Vec<usize> {
        self.daily_totals
            .iter()
            .map(|totals| totals[state.index()])
            .collect()
    }

    pub fn total_hist(&self) -> Vec<TotalHistRow> {
        let mut rows = Vec::with_capacity(self.daily_totals.len() * HealthState::COUNT);
        for (date, totals) in self.daily_totals.iter().enumerate() {
            for state in HealthState::iter() {
                rows.push(TotalHistRow {
                    date,
                    state,
                    counts: totals[state.index()],
                });
            }
        }
        rows
    }

    /// Non-zero transitions between distinct states, by day.
    pub fn transitions(&self) -> Vec<TransitionRow> {
        let mut rows = Vec::new();
        for (date, counts) in self.daily_transitions.iter().enumerate() {
            for from in HealthState::iter() {
                for to in HealthState::iter() {
                    let n = counts[from.index()][to.index()];
                    if from != to && n > 0 {
                        rows.push(TransitionRow {
                            date,
                            from,
                            to,
                            counts: n,
                        });
                    }
                }
            }
        }
        rows
    }

    pub fn transmissions(&self) -> &[TransmissionRow] {
        &self.transmissions
    }

    // Exposure date of every agent that has carried the virus. Seeded agents count as exposed on
    // day 0.
    fn exposure_dates(&self) -> HashMap<usize, usize> {
        let mut dates = HashMap::default();
        for seeded in &self.seeded {
            dates.insert(seeded.agent, 0);
        }
        for transmission in &self.transmissions {
            dates.insert(transmission.target, transmission.date);
        }
        dates
    }

    /// Realized reproductive number of every agent that has carried the virus, ordered by
    /// exposure date and agent. Agents that infected nobody have `rt == 0`.
    pub fn reproductive_number(&self) -> Vec<ReproductiveRow> {
        let dates = self.exposure_dates();
        let mut rows: BTreeMap<(usize, usize), ReproductiveRow> = BTreeMap::new();

        let carriers = self
            .seeded
            .iter()
            .map(|seeded| (seeded.agent, seeded.virus_id, &seeded.virus))
            .chain(self.transmissions.iter().map(|transmission| {
                (transmission.target, transmission.virus_id, &transmission.virus)
            }));
        for (agent, virus_id, virus) in carriers {
            let source_exposure_date = dates[&agent];
            rows.entry((source_exposure_date, agent))
                .or_insert_with(|| ReproductiveRow {
                    virus_id,
                    virus: virus.clone(),
                    source: agent,
                    source_exposure_date,
                    rt: 0,
                });
        }

        for transmission in &self.transmissions {
            if let Some(&date) = dates.get(&transmission.source) {
                if let Some(row) = rows.get_mut(&(date, transmission.source)) {
                    row.rt += 1;
                }
            }
        }
        rows.into_values().collect()
    }

    /// One row per transmission whose source has a known exposure date, in transmission order.
    pub fn generation_time(&self) -> Vec<GenerationRow> {
        let dates = self.exposure_dates();
        self.transmissions
            .iter()
            .filter_map(|transmission| {
                let &source_exposure_date = dates.get(&transmission.source)?;
                Some(GenerationRow {
                    date: transmission.date,
                    virus_id: transmission.virus_id,
                    virus: transmission.virus.clone(),
                    source: transmission.source,
                    source_exposure_date,
                    generation_time: transmission.date.saturating_sub(source_exposure_date),
                })
            })
            .collect()
    }
}

/// The result of one completed replicate, as handed to a
/// [`ResultSink`](crate::report::ResultSink).
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicateOutput {
    pub replicate: usize,
    pub seed: u64,
    pub days: usize,
    pub database: Database,
}
