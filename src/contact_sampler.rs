//! Draws the infectious contacts of a susceptible agent for one day.

use crate::contact_matrix::ContactMatrix;
use crate::infected_index::InfectedIndex;
use crate::population::{AgentId, EntityId};
use crate::random::{sample_index, RngStream};

/// Per-entity contact rate: `min(1, contact_rate / entity_size)`. Entities without members get a
/// rate of zero.
#[allow(clippy::cast_precision_loss)]
pub fn adjusted_contact_rates(contact_rate: f64, entity_sizes: &[usize]) -> Vec<f64> {
    entity_sizes
        .iter()
        .map(|&size| {
            if size == 0 {
                0.0
            } else {
                (contact_rate / size as f64).min(1.0)
            }
        })
        .collect()
}

/// Samples the infected agents that `agent` meets today and appends them to `contacts`, which is
/// cleared first.
///
/// For every entity `g`, the number of contacts is `Binomial(count[g], rate[own] * C[own, g])`,
/// and each contact is drawn uniformly, with replacement, from the live infected agents of `g`.
/// The same infected agent can be drawn more than once; every draw is a separate exposure and is
/// kept. Draws of the agent itself are dropped. An agent with no entity has no contacts and
/// consumes no randomness.
pub fn sample_contacts(
    agent: AgentId,
    entity: Option<EntityId>,
    index: &InfectedIndex,
    matrix: &ContactMatrix,
    adjusted_rates: &[f64],
    rng: &mut RngStream,
    contacts: &mut Vec<AgentId>,
) {
    contacts.clear();
    let Some(EntityId(own)) = entity else {
        return;
    };
    let n_groups = index.n_groups();

    for group in 0..n_groups {
        let live = index.live(group);
        let p = adjusted_rates[own] * matrix.get(own, group, n_groups);
        let n_draws = rng.rbinom(live.len(), p);

        for _ in 0..n_draws {
            let candidate = live[sample_index(rng.runif(), live.len())];
            if candidate != agent {
                contacts.push(candidate);
            }
        }
    }
}
