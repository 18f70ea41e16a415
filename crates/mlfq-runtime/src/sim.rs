use crate::factory::{ProcessFactory, RoleCounts};
use crate::trace;
use log::{info, warn};
use mlfq_kernel::{CoreConfig, SchedulerCore, SchedulerError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub core: CoreConfig,
    /// Total simulated-instruction budget.
    pub iterations: u64,
    /// Priority boost (and spawn lottery) period, in iterations.
    pub boost_period: u64,
    /// Chance in percent of admitting a fresh pair at each boost.
    pub spawn_percent: u32,
    /// The run stops once this many processes have been admitted.
    pub max_processes: u32,
    pub deadlock_prone: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            iterations: 50_000,
            boost_period: 1000,
            spawn_percent: 40,
            max_processes: 300,
            deadlock_prone: false,
        }
    }
}

/// End-of-run tallies.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimSummary {
    pub ticks: u64,
    pub admitted: u32,
    pub counts: RoleCounts,
    pub sync_switches: u64,
    pub timer_interrupts: u64,
    pub io_traps: u64,
    pub io_interrupts: u64,
    pub terminated: u64,
    pub violations: u64,
    pub deadlocks: u64,
}

/// Drives the scheduler core for a fixed iteration budget, boosting the
/// MLFQ periodically and admitting fresh process pairs by lottery.
pub struct Simulation {
    core: SchedulerCore,
    factory: ProcessFactory,
    config: SimConfig,
    lottery: StdRng,
    admitted: u32,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let core = SchedulerCore::new(config.core.clone());
        let factory = ProcessFactory::new(config.core.seed, config.deadlock_prone);
        // separate stream so spawn draws do not disturb process shaping
        let lottery = StdRng::seed_from_u64(config.core.seed.wrapping_add(1));
        Self {
            core,
            factory,
            config,
            lottery,
            admitted: 0,
        }
    }

    pub fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn admit_batch(&mut self) {
        let (first, second) = self.factory.make_pair();
        match self.core.admit_pair(first, second) {
            Ok(_) => self.admitted += 2,
            // capacity exhaustion is recoverable: drop the pair
            Err(full) => warn!("registry full, discarding pair: {full}"),
        }
    }

    /// Runs to the iteration budget or the process cap. A returned error
    /// is a true invariant breach; the caller decides to halt.
    pub fn run(&mut self) -> Result<SimSummary, SchedulerError> {
        let mut summary = SimSummary::default();
        self.admit_batch();
        trace::log_snapshot(&self.core.snapshot());

        for iteration in 1..=self.config.iterations {
            let report = self.core.tick()?;
            summary.ticks += 1;
            summary.sync_switches += report.sync_switch as u64;
            summary.timer_interrupts += report.timer_fired as u64;
            summary.io_traps += report.io_trap as u64;
            summary.io_interrupts += report.io_interrupt as u64;
            summary.terminated += report.terminated.is_some() as u64;
            summary.violations += report.violation.is_some() as u64;
            if let Some(verdict) = report.deadlock {
                summary.deadlocks += verdict.deadlocked as u64;
            }
            if report.interrupted() {
                trace::log_snapshot(&self.core.snapshot());
            }

            if iteration % self.config.boost_period == 0 {
                info!("resetting MLFQ at iteration {iteration}");
                self.core.boost();
                if self.lottery.gen_range(0..100) < self.config.spawn_percent {
                    self.admit_batch();
                }
                trace::log_snapshot(&self.core.snapshot());
            }

            if self.admitted >= self.config.max_processes {
                info!("reached max processes ({}), ending run", self.admitted);
                break;
            }
        }

        summary.admitted = self.admitted;
        summary.counts = *self.factory.counts();
        trace::log_role_counts(&summary.counts);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_run_completes_without_invariant_breaches() {
        let config = SimConfig {
            iterations: 20_000,
            boost_period: 500,
            max_processes: 60,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config);
        let summary = sim.run().expect("no invariant breaches expected");
        assert!(summary.ticks > 0);
        assert!(summary.admitted >= 2);
        assert_eq!(summary.counts.total(), summary.admitted);
        assert!(summary.timer_interrupts > 0);
    }

    #[test]
    fn deadlock_prone_run_still_terminates() {
        let config = SimConfig {
            core: CoreConfig {
                seed: 11,
                ..CoreConfig::default()
            },
            iterations: 20_000,
            boost_period: 500,
            max_processes: 60,
            deadlock_prone: true,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config);
        let summary = sim.run().expect("no invariant breaches expected");
        assert!(summary.ticks > 0);
    }

    #[test]
    fn identical_seeds_reproduce_identical_runs() {
        let config = SimConfig {
            iterations: 5_000,
            max_processes: 40,
            ..SimConfig::default()
        };
        let a = Simulation::new(config.clone()).run().unwrap();
        let b = Simulation::new(config).run().unwrap();
        assert_eq!(a.ticks, b.ticks);
        assert_eq!(a.admitted, b.admitted);
        assert_eq!(a.timer_interrupts, b.timer_interrupts);
        assert_eq!(a.terminated, b.terminated);
    }
}
