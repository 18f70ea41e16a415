//! Human-readable views of the scheduler state. Read-only: everything
//! here works from snapshots.

use crate::factory::RoleCounts;
use log::{debug, info};
use mlfq_kernel::SchedulerSnapshot;

pub fn log_snapshot(snap: &SchedulerSnapshot) {
    debug!("MLFQ state:");
    for (level, (quantum, pids)) in snap.levels.iter().enumerate() {
        if pids.is_empty() {
            continue;
        }
        let members: Vec<String> = pids.iter().map(|p| p.to_string()).collect();
        debug!(
            "  Q{level:2} (quantum {quantum}): {}",
            members.join(" ")
        );
    }
    debug!(
        "blocked: {}, killed: {}, killed mutexes: {}, registry: {}",
        snap.blocked.len(),
        snap.killed_len,
        snap.killed_mutexes_len,
        snap.registry_len
    );
    match (snap.running, snap.next_ready) {
        (Some((pid, pc, priority)), Some(next)) => {
            debug!("running {pid} (pc {pc}, priority {priority}); next up {next}")
        }
        (Some((pid, pc, priority)), None) => {
            debug!("running {pid} (pc {pc}, priority {priority}); MLFQ empty")
        }
        (None, Some(next)) => debug!("running slot empty; next up {next}"),
        (None, None) => debug!("idle: no running process, MLFQ empty"),
    }
}

pub fn log_role_counts(counts: &RoleCounts) {
    info!("total processes created: {}", counts.total());
    info!("  compute: {}", counts.compute);
    info!("  io:      {}", counts.io_bound);
    info!("  paired:  {}", counts.paired);
    info!("  shared:  {}", counts.shared);
}
