//! Per-day index of infectious agents, bucketed by entity.
//!
//! The index is a single buffer with one slot per agent. Entity `g` owns the slots
//! `offsets[g]..offsets[g] + size[g]`, and after a rebuild its infected agents occupy the first
//! `counts[g]` of them. Slots past the live count hold ids from earlier days and are never read.
//! The buffer is allocated at reset and reused every day.

use crate::population::{Agent, AgentId, HealthState};

#[derive(Clone, Debug, Default)]
pub struct InfectedIndex {
    ids: Vec<AgentId>,
    offsets: Vec<usize>,
    counts: Vec<usize>,
}

impl InfectedIndex {
    /// Lays out the buckets for entities of the given sizes. Entity sizes are fixed for a run, so
    /// this is done once per reset.
    pub fn configure(&mut self, entity_sizes: &[usize], population: usize) {
        self.offsets.clear();
        let mut offset = 0;
        for &size in entity_sizes {
            self.offsets.push(offset);
            offset += size;
        }
        self.counts.clear();
        self.counts.resize(entity_sizes.len(), 0);
        self.ids.clear();
        self.ids.resize(population.max(offset), AgentId(0));
    }

    /// Refills the buckets from the agents' current states.
    pub fn rebuild(&mut self, agents: &[Agent]) {
        self.counts.fill(0);
        for agent in agents {
            if agent.state() != HealthState::Infected {
                continue;
            }
            let Some(entity) = agent.entity() else {
                continue;
            };
            let group = entity.0;
            self.ids[self.offsets[group] + self.counts[group]] = agent.id();
            self.counts[group] += 1;
        }
    }

    pub fn n_groups(&self) -> usize {
        self.counts.len()
    }

    /// Number of infected agents in `group` as of the last rebuild.
    pub fn count(&self, group: usize) -> usize {
        self.counts[group]
    }

    pub fn offset(&self, group: usize) -> usize {
        self.offsets[group]
    }

    /// The infected agents of `group` as of the last rebuild.
    pub fn live(&self, group: usize) -> &[AgentId] {
        let start = self.offsets[group];
        &self.ids[start..start + self.counts[group]]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}
