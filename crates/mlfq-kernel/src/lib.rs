//! Core of the MLFQ scheduler simulator: process records, the
//! multi-level feedback queue, the open-addressed mutex registry, the
//! cooperative synchronization primitives and the interrupt-driven
//! scheduling loop. Process shaping and tracing live in `mlfq-runtime`.

pub mod error;
pub mod mlfq;
pub mod pcb;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod types;

pub use error::SchedulerError;
pub use mlfq::{Mlfq, MIN_QUANTUM, NUM_PRIORITIES, QUANTUM_STEP};
pub use pcb::{ProcState, ProcessImage, ProcessRecord, Role, TrapTable, TrapTables, TRAP_COUNT};
pub use queue::ReadyQueue;
pub use registry::{MutexRegistry, RegistryFull, DEFAULT_CAPACITY};
pub use scheduler::{
    CoreConfig, DeadlockVerdict, ProtocolViolation, SchedulerCore, SchedulerSnapshot, TickReport,
};
pub use sync::{CondVar, LockOutcome, Mutex, UnlockOutcome};
pub use types::{MutexId, Pid};
