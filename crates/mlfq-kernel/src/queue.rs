use crate::pcb::ProcessRecord;
use std::collections::VecDeque;

/// FIFO of process records with the time-slice length for its priority
/// level. Also used (quantum ignored) for the blocked and killed sets.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    records: VecDeque<ProcessRecord>,
    pub quantum_size: u32,
}

impl ReadyQueue {
    pub fn new(quantum_size: u32) -> Self {
        Self {
            records: VecDeque::new(),
            quantum_size,
        }
    }

    pub fn enqueue(&mut self, record: ProcessRecord) {
        self.records.push_back(record);
    }

    pub fn dequeue(&mut self) -> Option<ProcessRecord> {
        self.records.pop_front()
    }

    pub fn peek(&self) -> Option<&ProcessRecord> {
        self.records.front()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Splices out the first record matching the predicate, head and
    /// single-element cases included.
    pub fn remove_matching<F>(&mut self, pred: F) -> Option<ProcessRecord>
    where
        F: Fn(&ProcessRecord) -> bool,
    {
        let pos = self.records.iter().position(pred)?;
        self.records.remove(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.iter()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = ProcessRecord> + '_ {
        self.records.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcb::{ProcessImage, ProcessRecord, Role, TrapTables};
    use crate::types::Pid;

    fn record(pid: u32) -> ProcessRecord {
        let image = ProcessImage {
            role: Role::Compute,
            max_pc: 100,
            terminate: 1,
            traps: TrapTables::default(),
            is_producer: false,
        };
        ProcessRecord::from_image(Pid::new(pid), None, image)
    }

    #[test]
    fn fifo_order() {
        let mut q = ReadyQueue::new(1);
        q.enqueue(record(1));
        q.enqueue(record(2));
        assert_eq!(q.peek().unwrap().pid, Pid::new(1));
        assert_eq!(q.dequeue().unwrap().pid, Pid::new(1));
        assert_eq!(q.dequeue().unwrap().pid, Pid::new(2));
        assert!(q.dequeue().is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn remove_matching_head_and_middle() {
        let mut q = ReadyQueue::new(1);
        for pid in 1..=3 {
            q.enqueue(record(pid));
        }
        let head = q.remove_matching(|r| r.pid == Pid::new(1)).unwrap();
        assert_eq!(head.pid, Pid::new(1));
        let mid = q.remove_matching(|r| r.pid == Pid::new(3)).unwrap();
        assert_eq!(mid.pid, Pid::new(3));
        assert_eq!(q.len(), 1);
        assert!(q.remove_matching(|r| r.pid == Pid::new(9)).is_none());
    }

    #[test]
    fn remove_matching_sole_element() {
        let mut q = ReadyQueue::new(1);
        q.enqueue(record(7));
        assert!(q.remove_matching(|r| r.pid == Pid::new(7)).is_some());
        assert!(q.is_empty());
        assert!(q.peek().is_none());
    }
}
