//! Agents and the entities (mixing groups) that partition them.
//!
//! The population is built once from a list of [`EntitySpec`]s and never changes shape during a
//! run: agents keep their id and their entity for the lifetime of the model. Only the per-agent
//! health state, attached virus and modifiers change.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, EnumString};

use crate::error::SimError;
use crate::virus::Virus;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

/// Health states of the SEIR mixing model. `Recovered` is terminal.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    EnumString,
    EnumIter,
    EnumCount,
)]
pub enum HealthState {
    Susceptible,
    Exposed,
    Infected,
    Recovered,
}

impl HealthState {
    /// Position of the state in per-state count arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// States in which an agent carries a virus.
    pub fn carries_virus(self) -> bool {
        matches!(self, HealthState::Exposed | HealthState::Infected)
    }
}

/// Per-agent adjustments to the virus probabilities, normally supplied by tools such as vaccines or
/// masks. All of them are probabilities in `[0, 1]` and default to zero (no effect).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    pub susceptibility_reduction: f64,
    pub transmission_reduction: f64,
    pub recovery_enhancer: f64,
    pub death_reduction: f64,
}

impl Modifiers {
    fn validate(&self) -> Result<(), SimError> {
        for (name, value) in [
            ("susceptibility reduction", self.susceptibility_reduction),
            ("transmission reduction", self.transmission_reduction),
            ("recovery enhancer", self.recovery_enhancer),
            ("death reduction", self.death_reduction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::config(format!(
                    "{name} must be in [0, 1], but is {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    id: AgentId,
    state: HealthState,
    entity: Option<EntityId>,
    virus: Option<Virus>,
    modifiers: Modifiers,
}

impl Agent {
    fn new(id: AgentId, entity: Option<EntityId>) -> Self {
        Agent {
            id,
            state: HealthState::Susceptible,
            entity,
            virus: None,
            modifiers: Modifiers::default(),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    pub fn virus(&self) -> Option<&Virus> {
        self.virus.as_ref()
    }

    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    /// Attaches a copy of `virus` and moves the agent to `state`, which must be a state that
    /// carries a virus.
    pub(crate) fn attach_virus(&mut self, virus: Virus, state: HealthState) -> Result<(), SimError> {
        if !state.carries_virus() {
            return Err(SimError::invariant(format!(
                "agent {} cannot hold a virus in state {state}",
                self.id
            )));
        }
        self.virus = Some(virus);
        self.state = state;
        Ok(())
    }

    /// Moves an agent that carries a virus to another virus carrying state.
    pub(crate) fn progress(&mut self, state: HealthState) -> Result<(), SimError> {
        if self.virus.is_none() || !state.carries_virus() {
            return Err(SimError::invariant(format!(
                "agent {} cannot move from {} to {state}",
                self.id, self.state
            )));
        }
        self.state = state;
        Ok(())
    }

    /// Detaches the virus and moves the agent to a virus-free `state`.
    pub(crate) fn detach_virus(&mut self, state: HealthState) -> Result<Virus, SimError> {
        if state.carries_virus() {
            return Err(SimError::invariant(format!(
                "agent {} cannot drop its virus and stay in state {state}",
                self.id
            )));
        }
        let virus = self.virus.take().ok_or_else(|| {
            SimError::invariant(format!("agent {} has no virus to detach", self.id))
        })?;
        self.state = state;
        Ok(virus)
    }

    /// Sets a virus-free state without touching the virus slot. Only valid on agents without a
    /// virus, e.g. when seeding initially recovered agents.
    pub(crate) fn set_virus_free_state(&mut self, state: HealthState) -> Result<(), SimError> {
        if self.virus.is_some() || state.carries_virus() {
            return Err(SimError::invariant(format!(
                "agent {} cannot be put in state {state} directly",
                self.id
            )));
        }
        self.state = state;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: HealthState) {
        self.state = state;
    }
}

/// How the members of an entity are chosen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Membership {
    /// The next `size` agents not yet claimed by an earlier entity.
    Size(usize),
    /// An explicit list of agent ids.
    Members(Vec<usize>),
}

/// Declares a mixing group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    pub membership: Membership,
}

impl EntitySpec {
    pub fn with_size(name: impl Into<String>, size: usize) -> Self {
        EntitySpec {
            name: name.into(),
            membership: Membership::Size(size),
        }
    }

    pub fn with_members(name: impl Into<String>, members: Vec<usize>) -> Self {
        EntitySpec {
            name: name.into(),
            membership: Membership::Members(members),
        }
    }
}

/// A mixing group. Membership is fixed once the population is built.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    id: EntityId,
    name: String,
    members: Vec<AgentId>,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// All agents of a model together with the entities partitioning them.
#[derive(Clone, Debug, PartialEq)]
pub struct Population {
    agents: Vec<Agent>,
    entities: Vec<Entity>,
}

impl Population {
    /// Builds `n` susceptible agents and assigns them to entities in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] if the entities claim more agents than exist, name an
    /// agent id out of range, or claim the same agent twice.
    pub fn new(n: usize, specs: &[EntitySpec]) -> Result<Self, SimError> {
        let mut owner: Vec<Option<EntityId>> = vec![None; n];
        let mut entities = Vec::with_capacity(specs.len());
        let mut next_free = 0;

        for (index, spec) in specs.iter().enumerate() {
            let id = EntityId(index);
            let members: Vec<AgentId> = match &spec.membership {
                Membership::Size(size) => {
                    let mut members = Vec::with_capacity(*size);
                    while members.len() < *size {
                        while next_free < n && owner[next_free].is_some() {
                            next_free += 1;
                        }
                        if next_free >= n {
                            return Err(SimError::config(format!(
                                "entity {:?} needs {size} agents but the population of {n} is exhausted",
                                spec.name
                            )));
                        }
                        members.push(AgentId(next_free));
                        owner[next_free] = Some(id);
                    }
                    members
                }
                Membership::Members(ids) => {
                    let mut members = Vec::with_capacity(ids.len());
                    for &agent in ids {
                        match owner.get(agent) {
                            None => {
                                return Err(SimError::config(format!(
                                    "entity {:?} names agent {agent}, but the population has {n} agents",
                                    spec.name
                                )));
                            }
                            Some(Some(other)) => {
                                return Err(SimError::config(format!(
                                    "agent {agent} cannot belong to entity {:?}: it already belongs to entity {}",
                                    spec.name, other.0
                                )));
                            }
                            Some(None) => {
                                owner[agent] = Some(id);
                                members.push(AgentId(agent));
                            }
                        }
                    }
                    members
                }
            };
            entities.push(Entity {
                id,
                name: spec.name.clone(),
                members,
            });
        }

        let agents = owner
            .into_iter()
            .enumerate()
            .map(|(index, entity)| Agent::new(AgentId(index), entity))
            .collect();

        Ok(Population { agents, entities })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id.0]
    }

    pub(crate) fn agent_mut(&mut self, id: AgentId) -> &mut Agent {
        &mut self.agents[id.0]
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_sizes(&self) -> Vec<usize> {
        self.entities.iter().map(Entity::size).collect()
    }

    /// Sets the modifiers of one agent.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] if a modifier is outside `[0, 1]` or the agent does not
    /// exist.
    pub fn set_modifiers(&mut self, id: AgentId, modifiers: Modifiers) -> Result<(), SimError> {
        modifiers.validate()?;
        let agent = self
            .agents
            .get_mut(id.0)
            .ok_or_else(|| SimError::config(format!("agent {id} does not exist")))?;
        agent.modifiers = modifiers;
        Ok(())
    }

    /// Returns every agent to the susceptible state without a virus. Entities and modifiers are
    /// kept.
    pub(crate) fn clear_health_states(&mut self) {
        for agent in &mut self.agents {
            agent.state = HealthState::Susceptible;
            agent.virus = None;
        }
    }

    /// Number of agents in each [`HealthState`], indexed by [`HealthState::index`].
    pub fn state_counts(&self) -> [usize; HealthState::COUNT] {
        let mut counts = [0; HealthState::COUNT];
        for agent in &self.agents {
            counts[agent.state.index()] += 1;
        }
        counts
    }
}
