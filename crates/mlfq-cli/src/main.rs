use clap::{Parser, Subcommand};
use mlfq_kernel::CoreConfig;
use mlfq_runtime::{SimConfig, Simulation};
use std::error::Error;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler simulation
    Run {
        /// RNG seed for process shaping and wake timers
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Simulated-instruction budget
        #[arg(long, default_value_t = 50_000)]
        iterations: u64,

        /// Priority-boost period in iterations
        #[arg(long, default_value_t = 1000)]
        boost_period: u64,

        /// Chance in percent of spawning a pair at each boost
        #[arg(long, default_value_t = 40)]
        spawn_percent: u32,

        /// Stop once this many processes have been admitted
        #[arg(long, default_value_t = 300)]
        max_processes: u32,

        /// Mutex registry capacity
        #[arg(long, default_value_t = 200, value_parser = parse_capacity)]
        registry_capacity: usize,

        /// Give shared pairs inverted lock ordering (deadlock-prone)
        #[arg(long)]
        deadlock: bool,
    },
}

fn parse_capacity(s: &str) -> Result<usize, String> {
    let capacity: usize = s.parse().map_err(|e| format!("{e}"))?;
    if capacity == 0 {
        return Err("registry capacity must be at least 1".to_string());
    }
    Ok(capacity)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            seed,
            iterations,
            boost_period,
            spawn_percent,
            max_processes,
            registry_capacity,
            deadlock,
        } => {
            let config = SimConfig {
                core: CoreConfig {
                    registry_capacity,
                    seed,
                    ..CoreConfig::default()
                },
                iterations,
                boost_period,
                spawn_percent,
                max_processes,
                deadlock_prone: deadlock,
            };

            println!("Starting MLFQ simulation ({iterations} iterations, seed {seed})...");

            let mut sim = Simulation::new(config);
            let summary = sim.run()?;

            println!("Simulation completed after {} ticks.", summary.ticks);
            println!(
                "  processes admitted:  {} ({} compute, {} I/O, {} paired, {} shared)",
                summary.admitted,
                summary.counts.compute,
                summary.counts.io_bound,
                summary.counts.paired,
                summary.counts.shared
            );
            println!("  timer interrupts:    {}", summary.timer_interrupts);
            println!("  I/O traps:           {}", summary.io_traps);
            println!("  I/O interrupts:      {}", summary.io_interrupts);
            println!("  forced sync switches: {}", summary.sync_switches);
            println!("  terminated:          {}", summary.terminated);
            println!("  protocol violations: {}", summary.violations);
            println!("  deadlock reports:    {}", summary.deadlocks);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn capacity_parser_rejects_zero() {
        assert!(parse_capacity("0").is_err());
        assert_eq!(parse_capacity("200"), Ok(200));
        assert!(parse_capacity("many").is_err());
    }

    #[test]
    fn zero_registry_capacity_is_a_usage_error() {
        let result = Cli::try_parse_from(["mlfq", "run", "--registry-capacity", "0"]);
        assert!(result.is_err());
        assert!(Cli::try_parse_from(["mlfq", "run", "--registry-capacity", "16"]).is_ok());
    }
}
