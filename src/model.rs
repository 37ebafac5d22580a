//! The SEIR model with mixing groups.
//!
//! A run advances in whole days. Every agent is evaluated once per day against the state of the
//! population at the start of that day: the infected index is frozen and no agent's state or virus
//! changes until all agents have been evaluated. The changes are then applied together, the
//! infected index is rebuilt for the next day, and the day is recorded.

use std::fmt::{self, Display};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};

use crate::contact_matrix::ContactMatrix;
use crate::contact_sampler::{adjusted_contact_rates, sample_contacts};
use crate::database::Database;
use crate::error::SimError;
use crate::infected_index::InfectedIndex;
use crate::params::{ParamKey, Parameters};
use crate::population::{Agent, AgentId, EntitySpec, HealthState, Modifiers, Population};
use crate::random::RngStream;
use crate::virus::{Virus, VirusId};

pub const MODEL_NAME: &str = "Susceptible-Exposed-Infected-Removed (SEIR) with Mixing";

/// Fractions used to move agents out of their default initial state at reset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialStates {
    /// Share of the seeded (exposed) agents that start infected instead.
    pub infected: f64,
    /// Share of the agents not seeded with the virus that start recovered.
    pub recovered: f64,
}

impl InitialStates {
    fn validate(&self) -> Result<(), SimError> {
        for (name, value) in [("infected", self.infected), ("recovered", self.recovered)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::config(format!(
                    "the initial {name} fraction must be in [0, 1], but is {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A change to one agent, decided during the day and applied once every agent has been evaluated.
#[derive(Clone, Debug)]
enum Change {
    Expose { source: AgentId, virus: Virus },
    Infect,
    Recover,
}

#[derive(Clone, Debug)]
pub struct SeirMixingModel {
    virus: Virus,
    prevalence: f64,
    params: Parameters,
    contact_matrix: ContactMatrix,
    population: Population,
    initial_states: InitialStates,

    rng: RngStream,
    adjusted_contact_rates: Vec<f64>,
    index: InfectedIndex,
    database: Database,
    current_day: usize,
    ready: bool,

    // Scratch buffers reused across agents and days.
    contacts: Vec<AgentId>,
    weights: Vec<f64>,
    pending: Vec<(AgentId, Change)>,
}

impl SeirMixingModel {
    /// Builds a model of `n` agents split into `entities`, with a single virus named `name`.
    ///
    /// `contact_matrix` is flattened in column-major order. Parameters and the matrix are only
    /// checked on [`SeirMixingModel::reset`], so they can still be corrected after construction.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] if the entities do not fit in the population.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        n: usize,
        prevalence: f64,
        contact_rate: f64,
        transmission_rate: f64,
        avg_incubation_days: f64,
        recovery_rate: f64,
        contact_matrix: Vec<f64>,
        entities: &[EntitySpec],
    ) -> Result<Self, SimError> {
        let population = Population::new(n, entities)?;
        Ok(SeirMixingModel {
            virus: Virus::new(VirusId(0), name),
            prevalence,
            params: Parameters {
                contact_rate,
                transmission_rate,
                recovery_rate,
                avg_incubation_days,
            },
            contact_matrix: ContactMatrix::from_column_major(contact_matrix),
            population,
            initial_states: InitialStates::default(),
            rng: RngStream::new(0),
            adjusted_contact_rates: Vec::new(),
            index: InfectedIndex::default(),
            database: Database::default(),
            current_day: 0,
            ready: false,
            contacts: Vec::new(),
            weights: Vec::new(),
            pending: Vec::new(),
        })
    }

    pub fn virus(&self) -> &Virus {
        &self.virus
    }

    pub fn prevalence(&self) -> f64 {
        self.prevalence
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn param(&self, key: ParamKey) -> f64 {
        self.params.get(key)
    }

    /// Changes a parameter. Viruses read parameters when they are used, so the new value applies
    /// from the next evaluated day.
    pub fn set_param(&mut self, key: ParamKey, value: f64) {
        debug!("setting {key} to {value}");
        self.params.set(key, value);
    }

    pub fn contact_matrix(&self) -> &ContactMatrix {
        &self.contact_matrix
    }

    /// Replaces the contact matrix. It is validated on the next reset.
    pub fn set_contact_matrix(&mut self, contact_matrix: ContactMatrix) {
        self.contact_matrix = contact_matrix;
        self.ready = false;
    }

    /// Sets the initial state fractions applied on every reset.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] if a fraction is outside `[0, 1]`.
    pub fn initial_states(&mut self, initial_states: InitialStates) -> Result<(), SimError> {
        initial_states.validate()?;
        self.initial_states = initial_states;
        Ok(())
    }

    /// See [`Population::set_modifiers`].
    pub fn set_modifiers(&mut self, agent: AgentId, modifiers: Modifiers) -> Result<(), SimError> {
        self.population.set_modifiers(agent, modifiers)
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        self.population.agent(id)
    }

    pub fn infected_index(&self) -> &InfectedIndex {
        &self.index
    }

    pub fn adjusted_contact_rates(&self) -> &[f64] {
        &self.adjusted_contact_rates
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn into_database(self) -> Database {
        self.database
    }

    /// The last simulated day; 0 right after a reset.
    pub fn today(&self) -> usize {
        self.current_day
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Whether the model has been reset since its configuration last changed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Validates the configuration and returns the model to day 0.
    ///
    /// Every agent becomes susceptible, then `floor(prevalence * n)` agents drawn without
    /// replacement receive a copy of the virus and start exposed. The initial state fractions are
    /// applied on top of that. Finally the adjusted contact rates and the infected index are
    /// rebuilt and day 0 is recorded. Draws come from the current random stream.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] if the parameters, the prevalence or the contact matrix
    /// are invalid. Nothing is changed in that case.
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.params.validate()?;
        if !(0.0..=1.0).contains(&self.prevalence) {
            return Err(SimError::config(format!(
                "prevalence must be in [0, 1], but is {}",
                self.prevalence
            )));
        }
        let n_entities = self.population.entities().len();
        self.contact_matrix.validate(n_entities)?;

        self.population.clear_health_states();
        self.database.clear();
        self.current_day = 0;
        self.seed_initial_states()?;

        let entity_sizes = self.population.entity_sizes();
        self.adjusted_contact_rates =
            adjusted_contact_rates(self.params.contact_rate, &entity_sizes);
        self.index.configure(&entity_sizes, self.population.len());
        self.index.rebuild(self.population.agents());

        let totals = self.population.state_counts();
        let mut transitions = [[0; HealthState::COUNT]; HealthState::COUNT];
        for (state, &count) in totals.iter().enumerate() {
            transitions[state][state] = count;
        }
        self.database.record_day(totals, transitions);
        self.ready = true;

        debug!(
            "reset {} agents in {n_entities} entities (seed={}): {:?}",
            self.population.len(),
            self.rng.seed(),
            totals
        );
        Ok(())
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn seed_initial_states(&mut self) -> Result<(), SimError> {
        let n = self.population.len();
        let n_seeded = (self.prevalence * n as f64).floor() as usize;
        let seeded = self.rng.sample_without_replacement(n, n_seeded);

        let n_infected = (self.initial_states.infected * seeded.len() as f64).round() as usize;
        let infected = self.rng.sample_without_replacement(seeded.len(), n_infected);
        let mut infected = infected.into_iter().peekable();
        for (position, &id) in seeded.iter().enumerate() {
            let state = if infected.next_if_eq(&position).is_some() {
                HealthState::Infected
            } else {
                HealthState::Exposed
            };
            self.population
                .agent_mut(AgentId(id))
                .attach_virus(self.virus.clone(), state)?;
            self.database.record_seed(AgentId(id), &self.virus);
        }

        if self.initial_states.recovered > 0.0 {
            let free: Vec<AgentId> = self
                .population
                .agents()
                .iter()
                .filter(|agent| agent.virus().is_none())
                .map(Agent::id)
                .collect();
            let n_recovered = (self.initial_states.recovered * free.len() as f64).round() as usize;
            for position in self.rng.sample_without_replacement(free.len(), n_recovered) {
                self.population
                    .agent_mut(free[position])
                    .set_virus_free_state(HealthState::Recovered)?;
            }
        }
        Ok(())
    }

    /// Reseeds the random stream with `seed`, resets, and simulates `days` days.
    ///
    /// # Errors
    ///
    /// Fails with the configuration error of [`SeirMixingModel::reset`], or with a
    /// [`SimError::InvariantBreach`] if an agent is found in an inconsistent state.
    pub fn run(&mut self, days: usize, seed: u64) -> Result<(), SimError> {
        self.rng.reseed(seed);
        self.reset()?;
        self.simulate(days)
    }

    /// Reseeds the random stream with `seed` and simulates `days` more days from the current state,
    /// without resetting. A model that has never been reset is reset first.
    ///
    /// # Errors
    ///
    /// See [`SeirMixingModel::run`].
    pub fn resume(&mut self, days: usize, seed: u64) -> Result<(), SimError> {
        self.rng.reseed(seed);
        if self.ready {
            self.params.validate()?;
        } else {
            self.reset()?;
        }
        self.simulate(days)
    }

    fn simulate(&mut self, days: usize) -> Result<(), SimError> {
        debug!(
            "simulating {days} days from day {} (seed={})",
            self.current_day,
            self.rng.seed()
        );
        for _ in 0..days {
            self.step()?;
        }
        Ok(())
    }

    /// Simulates one day.
    fn step(&mut self) -> Result<(), SimError> {
        self.evaluate_day()?;
        let day = self.current_day + 1;

        let mut totals = self.population.state_counts();
        let mut transitions = [[0; HealthState::COUNT]; HealthState::COUNT];
        for (state, &count) in totals.iter().enumerate() {
            transitions[state][state] = count;
        }

        for (id, change) in self.pending.drain(..) {
            let agent = self.population.agent_mut(id);
            let from = agent.state();
            match change {
                Change::Expose { source, virus } => {
                    self.database.record_transmission(day, source, id, &virus);
                    agent.attach_virus(virus, HealthState::Exposed)?;
                }
                Change::Infect => agent.progress(HealthState::Infected)?,
                Change::Recover => {
                    agent.detach_virus(HealthState::Recovered)?;
                }
            }
            let to = agent.state();
            transitions[from.index()][from.index()] -= 1;
            transitions[from.index()][to.index()] += 1;
            totals[from.index()] -= 1;
            totals[to.index()] += 1;
        }

        self.index.rebuild(self.population.agents());
        self.database.record_day(totals, transitions);
        self.current_day = day;
        trace!("day {day}: {totals:?}");
        Ok(())
    }

    /// Decides the change of every agent against the frozen start-of-day state.
    fn evaluate_day(&mut self) -> Result<(), SimError> {
        let SeirMixingModel {
            params,
            contact_matrix,
            population,
            rng,
            adjusted_contact_rates,
            index,
            contacts,
            weights,
            pending,
            ..
        } = self;
        pending.clear();

        for agent in population.agents() {
            let change = match agent.state() {
                HealthState::Susceptible => {
                    sample_contacts(
                        agent.id(),
                        agent.entity(),
                        index,
                        contact_matrix,
                        adjusted_contact_rates,
                        rng,
                        contacts,
                    );
                    expose(agent, population, params, contacts, weights, rng)?
                }
                HealthState::Exposed => incubate(agent, params, rng)?,
                HealthState::Infected => recover(agent, params, rng)?,
                HealthState::Recovered => None,
            };
            if let Some(change) = change {
                pending.push((agent.id(), change));
            }
        }
        Ok(())
    }
}

/// Susceptible to exposed: each contact is a candidate source weighted by
/// `(1 - susceptibility_reduction) * prob_infecting * (1 - transmission_reduction of the source)`.
fn expose(
    agent: &Agent,
    population: &Population,
    params: &Parameters,
    contacts: &[AgentId],
    weights: &mut Vec<f64>,
    rng: &mut RngStream,
) -> Result<Option<Change>, SimError> {
    if contacts.is_empty() {
        return Ok(None);
    }
    let susceptibility = 1.0 - agent.modifiers().susceptibility_reduction;

    weights.clear();
    for &contact in contacts {
        let source = population.agent(contact);
        let virus = source.virus().ok_or_else(|| {
            SimError::invariant(format!(
                "agent {contact} is in the infected index but has no virus"
            ))
        })?;
        weights.push(
            susceptibility
                * virus.prob_infecting(params)
                * (1.0 - source.modifiers().transmission_reduction),
        );
    }

    let Some(chosen) = rng.roulette(weights) else {
        return Ok(None);
    };
    let source = contacts[chosen];
    let virus = population
        .agent(source)
        .virus()
        .cloned()
        .ok_or_else(|| SimError::invariant(format!("agent {source} has no virus to pass on")))?;
    Ok(Some(Change::Expose { source, virus }))
}

/// Exposed to infected with probability `1 / incubation`.
fn incubate(
    agent: &Agent,
    params: &Parameters,
    rng: &mut RngStream,
) -> Result<Option<Change>, SimError> {
    let virus = agent.virus().ok_or_else(|| {
        SimError::invariant(format!("exposed agent {} has no virus", agent.id()))
    })?;
    let u = rng.runif();
    Ok((u < 1.0 / virus.incubation(params)).then_some(Change::Infect))
}

/// Infected to recovered with probability `1 - (1 - prob_recovery) * (1 - recovery_enhancer)`.
fn recover(
    agent: &Agent,
    params: &Parameters,
    rng: &mut RngStream,
) -> Result<Option<Change>, SimError> {
    let virus = agent.virus().ok_or_else(|| {
        SimError::invariant(format!("infected agent {} has no virus", agent.id()))
    })?;
    let weight =
        1.0 - (1.0 - virus.prob_recovery(params)) * (1.0 - agent.modifiers().recovery_enhancer);
    Ok(rng.roulette(&[weight]).map(|_| Change::Recover))
}

impl Display for SeirMixingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{MODEL_NAME}")?;
        writeln!(f, "  virus              : {}", self.virus.name())?;
        writeln!(f, "  population size    : {}", self.population.len())?;
        writeln!(f, "  prevalence         : {}", self.prevalence)?;
        writeln!(f, "  entities           : {}", self.population.entities().len())?;
        for entity in self.population.entities() {
            writeln!(f, "    - {} ({} agents)", entity.name(), entity.size())?;
        }
        for key in ParamKey::iter() {
            writeln!(f, "  {:<19}: {}", key.to_string(), self.params.get(key))?;
        }
        writeln!(f, "  days simulated     : {}", self.current_day)?;
        if self.ready {
            let counts = self.population.state_counts();
            write!(f, "  final counts       :")?;
            for (state, count) in HealthState::iter().zip(counts) {
                write!(f, " {state}={count}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
