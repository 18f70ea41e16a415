use crate::types::{MutexId, Pid};

/// Number of entries in each trap-position table.
pub const TRAP_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Compute,
    IoBound,
    Paired,
    Shared,
}

impl Role {
    /// Roles that coordinate through mutexes and run the sync protocol.
    pub fn is_synced(&self) -> bool {
        matches!(self, Role::Paired | Role::Shared)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    New,
    Ready,
    Running,
    Waiting,
    Interrupted,
    Halted,
}

/// Fixed-size table of program-counter values that trigger an operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapTable {
    slots: [Option<u32>; TRAP_COUNT],
}

impl TrapTable {
    pub fn from_positions(positions: &[u32]) -> Self {
        let mut slots = [None; TRAP_COUNT];
        for (slot, &pc) in slots.iter_mut().zip(positions) {
            *slot = Some(pc);
        }
        Self { slots }
    }

    pub fn contains(&self, pc: u32) -> bool {
        self.slots.iter().any(|s| *s == Some(pc))
    }

    pub fn positions(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().filter_map(|s| *s)
    }
}

/// Trap positions for every operation a process shape can carry. Tables
/// not used by the role stay empty and never match.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapTables {
    pub lock_r1: TrapTable,
    pub unlock_r1: TrapTable,
    pub lock_r2: TrapTable,
    pub unlock_r2: TrapTable,
    pub signal: TrapTable,
    pub wait: TrapTable,
    pub io_1: TrapTable,
    pub io_2: TrapTable,
}

/// Process shape as supplied by the factory: everything about a process
/// except the identifiers the scheduler allocates at admission.
#[derive(Debug, Clone)]
pub struct ProcessImage {
    pub role: Role,
    pub max_pc: u32,
    pub terminate: u32,
    pub traps: TrapTables,
    pub is_producer: bool,
}

/// Process control block. Owned by exactly one container at a time: one
/// MLFQ level, the blocked queue, the killed queue, or the running slot.
/// Deliberately not `Clone`: records move between containers by value.
#[derive(Debug)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub parent: Option<Pid>,
    pub role: Role,
    pub state: ProcState,
    pub priority: usize,
    pub pc: u32,
    pub max_pc: u32,
    /// Halts for real only once `term_count` reaches this; 0 = never.
    pub terminate: u32,
    pub term_count: u32,
    pub mutex_r1: Option<MutexId>,
    pub mutex_r2: Option<MutexId>,
    pub traps: TrapTables,
    pub blocked_timer: u32,
    pub is_producer: bool,
}

impl ProcessRecord {
    pub fn from_image(pid: Pid, parent: Option<Pid>, image: ProcessImage) -> Self {
        Self {
            pid,
            parent,
            role: image.role,
            state: ProcState::New,
            priority: 0,
            pc: 0,
            max_pc: image.max_pc,
            terminate: image.terminate,
            term_count: 0,
            mutex_r1: None,
            mutex_r2: None,
            traps: image.traps,
            blocked_timer: 0,
            is_producer: image.is_producer,
        }
    }

    /// True if `pc` sits on one of this process's I/O trap positions.
    pub fn at_io_trap(&self) -> bool {
        self.traps.io_1.contains(self.pc) || self.traps.io_2.contains(self.pc)
    }
}
