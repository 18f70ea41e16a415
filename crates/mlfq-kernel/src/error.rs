use crate::types::{MutexId, Pid};
use thiserror::Error;

/// Fatal invariant breaches. Anything recoverable (protocol violations,
/// registry capacity) is reported through status values instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("process {pid} at pc {pc} matches no lock/unlock/signal/wait position")]
    UnknownSyncPoint { pid: Pid, pc: u32 },

    #[error("process {pid} references mutex {mid} which is not in the registry")]
    MutexMissing { pid: Pid, mid: MutexId },

    #[error("process {pid} runs the sync protocol but has no mutex bound for its role")]
    UnboundResource { pid: Pid },

    #[error("reclamation requested with an empty running slot")]
    EmptyReclaim,
}
