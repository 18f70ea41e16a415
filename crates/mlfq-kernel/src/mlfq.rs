use crate::pcb::{ProcessRecord, ProcState};
use crate::queue::ReadyQueue;
use crate::types::Pid;

/// Number of priority levels. Level 0 is the highest priority.
pub const NUM_PRIORITIES: usize = 16;

/// Quantum for level 0.
pub const MIN_QUANTUM: u32 = 1;

/// Quantum for level k > 0 is k times this.
pub const QUANTUM_STEP: u32 = 10;

/// Multi-level feedback queue: one ReadyQueue per priority level, each
/// with its own quantum size.
#[derive(Debug)]
pub struct Mlfq {
    levels: Vec<ReadyQueue>,
}

impl Default for Mlfq {
    fn default() -> Self {
        Self::new()
    }
}

impl Mlfq {
    pub fn new() -> Self {
        let levels = (0..NUM_PRIORITIES)
            .map(|i| {
                let quantum = if i == 0 {
                    MIN_QUANTUM
                } else {
                    i as u32 * QUANTUM_STEP
                };
                ReadyQueue::new(quantum)
            })
            .collect();
        Self { levels }
    }

    /// Routes the record to the level matching its priority field.
    pub fn enqueue(&mut self, record: ProcessRecord) {
        debug_assert!(record.priority < NUM_PRIORITIES);
        self.levels[record.priority].enqueue(record);
    }

    /// Removes and returns the head of the lowest-numbered non-empty
    /// level. Lower levels always preempt higher ones.
    pub fn dequeue(&mut self) -> Option<ProcessRecord> {
        self.levels.iter_mut().find(|q| !q.is_empty())?.dequeue()
    }

    pub fn peek(&self) -> Option<&ProcessRecord> {
        self.levels.iter().find(|q| !q.is_empty())?.peek()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|q| q.is_empty())
    }

    pub fn total_len(&self) -> usize {
        self.levels.iter().map(|q| q.len()).sum()
    }

    /// Quantum of the first non-empty level; 0 when the MLFQ is empty.
    pub fn next_quantum_size(&self) -> u32 {
        self.levels
            .iter()
            .find(|q| !q.is_empty())
            .map(|q| q.quantum_size)
            .unwrap_or(0)
    }

    /// Priority boost: drains every level above 0 into level 0 and
    /// resets each moved record's priority. Returns true iff every level
    /// was empty beforehand, which makes the scheduler idle-eligible.
    pub fn boost(&mut self) -> bool {
        let all_empty = self.is_empty();
        let (head, rest) = self.levels.split_at_mut(1);
        for queue in rest {
            while let Some(mut record) = queue.dequeue() {
                record.priority = 0;
                record.state = ProcState::Ready;
                head[0].enqueue(record);
            }
        }
        all_empty
    }

    /// Pulls the record with the given pid out of whichever level holds
    /// it. Used when one half of a shared pair terminates.
    pub fn remove_pid(&mut self, pid: Pid) -> Option<ProcessRecord> {
        self.levels
            .iter_mut()
            .find_map(|q| q.remove_matching(|r| r.pid == pid))
    }

    pub fn level(&self, index: usize) -> &ReadyQueue {
        &self.levels[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcb::{ProcessImage, Role, TrapTables};

    fn record(pid: u32, priority: usize) -> ProcessRecord {
        let image = ProcessImage {
            role: Role::Compute,
            max_pc: 100,
            terminate: 1,
            traps: TrapTables::default(),
            is_producer: false,
        };
        let mut r = ProcessRecord::from_image(Pid::new(pid), None, image);
        r.priority = priority;
        r
    }

    #[test]
    fn quantum_ladder() {
        let mlfq = Mlfq::new();
        assert_eq!(mlfq.level(0).quantum_size, MIN_QUANTUM);
        assert_eq!(mlfq.level(1).quantum_size, QUANTUM_STEP);
        assert_eq!(mlfq.level(5).quantum_size, 5 * QUANTUM_STEP);
    }

    #[test]
    fn dequeue_prefers_lowest_level() {
        let mut mlfq = Mlfq::new();
        mlfq.enqueue(record(1, 5));
        mlfq.enqueue(record(2, 2));
        mlfq.enqueue(record(3, 5));
        assert_eq!(mlfq.peek().unwrap().pid, Pid::new(2));
        assert_eq!(mlfq.dequeue().unwrap().pid, Pid::new(2));
        assert_eq!(mlfq.dequeue().unwrap().pid, Pid::new(1));
        assert_eq!(mlfq.dequeue().unwrap().pid, Pid::new(3));
        assert!(mlfq.dequeue().is_none());
    }

    #[test]
    fn enqueue_then_dequeue_same_record() {
        let mut mlfq = Mlfq::new();
        mlfq.enqueue(record(9, 7));
        let out = mlfq.dequeue().unwrap();
        assert_eq!(out.pid, Pid::new(9));
        assert_eq!(out.priority, 7);
    }

    #[test]
    fn next_quantum_tracks_first_nonempty_level() {
        let mut mlfq = Mlfq::new();
        assert_eq!(mlfq.next_quantum_size(), 0);
        mlfq.enqueue(record(1, 3));
        assert_eq!(mlfq.next_quantum_size(), 3 * QUANTUM_STEP);
        mlfq.enqueue(record(2, 0));
        assert_eq!(mlfq.next_quantum_size(), MIN_QUANTUM);
    }

    #[test]
    fn boost_collects_everything_at_level_zero() {
        let mut mlfq = Mlfq::new();
        for (pid, prio) in [(1, 0), (2, 3), (3, 8), (4, 15)] {
            mlfq.enqueue(record(pid, prio));
        }
        let total = mlfq.total_len();
        let was_empty = mlfq.boost();
        assert!(!was_empty);
        assert_eq!(mlfq.level(0).len(), total);
        for level in 1..NUM_PRIORITIES {
            assert!(mlfq.level(level).is_empty());
        }
        assert!(mlfq.level(0).iter().all(|r| r.priority == 0));
        // level 0's prior contents stay at the head
        assert_eq!(mlfq.peek().unwrap().pid, Pid::new(1));
    }

    #[test]
    fn boost_of_empty_mlfq_reports_idle_eligible() {
        let mut mlfq = Mlfq::new();
        assert!(mlfq.boost());
    }

    #[test]
    fn remove_pid_searches_all_levels() {
        let mut mlfq = Mlfq::new();
        mlfq.enqueue(record(1, 2));
        mlfq.enqueue(record(2, 11));
        let found = mlfq.remove_pid(Pid::new(2)).unwrap();
        assert_eq!(found.pid, Pid::new(2));
        assert!(mlfq.remove_pid(Pid::new(2)).is_none());
        assert_eq!(mlfq.total_len(), 1);
    }
}
