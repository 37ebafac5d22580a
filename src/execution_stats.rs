//! Summary of a replicate batch: how many replicates ran, on how many workers, and for how long.

use std::fmt::{self, Display};
use std::time::{Duration, Instant};

use humantime::format_duration;

use crate::log::info;

/// Times a batch from construction until [`BatchClock::finish`].
pub(crate) struct BatchClock {
    start: Instant,
}

impl BatchClock {
    pub(crate) fn start() -> Self {
        BatchClock {
            start: Instant::now(),
        }
    }

    pub(crate) fn finish(
        &self,
        replicates: usize,
        threads: usize,
        days: usize,
        population: usize,
    ) -> MultipleRunSummary {
        MultipleRunSummary {
            replicates,
            threads,
            days,
            population,
            wall_time: self.start.elapsed(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MultipleRunSummary {
    /// Number of replicates that completed and were saved.
    pub replicates: usize,
    pub threads: usize,
    pub days: usize,
    pub population: usize,
    pub wall_time: Duration,
}

impl MultipleRunSummary {
    /// Wall time per completed replicate; zero if none completed.
    pub fn wall_time_per_replicate(&self) -> Duration {
        u32::try_from(self.replicates)
            .ok()
            .filter(|&replicates| replicates > 0)
            .map_or(Duration::ZERO, |replicates| self.wall_time / replicates)
    }
}

impl Display for MultipleRunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "━━━━ Execution Summary ━━━━")?;
        writeln!(f, "{:<25}{}", "Replicates:", self.replicates)?;
        writeln!(f, "{:<25}{}", "Worker threads:", self.threads)?;
        writeln!(f, "{:<25}{}", "Days per replicate:", self.days)?;
        writeln!(f, "{:<25}{}", "Population:", self.population)?;
        writeln!(f, "{:<25}{}", "Wall time:", format_duration(self.wall_time))?;
        write!(
            f,
            "{:<25}{}",
            "Wall time per replicate:",
            format_duration(self.wall_time_per_replicate())
        )
    }
}

/// Logs the batch summary with the logging system.
pub fn log_execution_statistics(summary: &MultipleRunSummary) {
    info!(
        "{} replicates of {} days ({} agents) on {} threads",
        summary.replicates, summary.days, summary.population, summary.threads
    );
    info!("Wall time: {}", format_duration(summary.wall_time));
    info!(
        "Wall time per replicate: {}",
        format_duration(summary.wall_time_per_replicate())
    );
}
