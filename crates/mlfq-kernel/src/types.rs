use std::fmt;

/// Simulated process identifier (monotonic, never reused within a run)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Pid(u32);

impl Pid {
    pub fn new(id: u32) -> Self {
        Pid(id)
    }

    pub fn val(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Mutex identifier (monotonic, never reused within a run)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MutexId(u32);

impl MutexId {
    pub fn new(id: u32) -> Self {
        MutexId(id)
    }

    pub fn val(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MutexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}
