use crate::error::SchedulerError;
use crate::mlfq::{Mlfq, NUM_PRIORITIES};
use crate::pcb::{ProcState, ProcessImage, ProcessRecord, Role};
use crate::queue::ReadyQueue;
use crate::registry::{MutexRegistry, RegistryFull, DEFAULT_CAPACITY};
use crate::sync::{LockOutcome, Mutex, UnlockOutcome};
use crate::types::{MutexId, Pid};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Core knobs. Counters that the C original kept as process-wide globals
/// live as fields of `SchedulerCore` instead.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub registry_capacity: usize,
    /// Upper bound for the random I/O wake timer (drawn as 1..=range).
    pub timer_range: u32,
    /// Killed-process queue is drained once it reaches this size.
    pub killed_batch: usize,
    /// Killed-mutex queue batch threshold.
    pub killed_mutex_batch: usize,
    /// Deadlock monitor runs every this many forced sync switches.
    pub deadlock_period: u32,
    pub seed: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            registry_capacity: DEFAULT_CAPACITY,
            timer_range: 1000,
            killed_batch: 10,
            killed_mutex_batch: 10,
            deadlock_period: 10,
            seed: 0,
        }
    }
}

/// Recoverable protocol violations, reported and continued past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    RelockByOwner { pid: Pid, mid: MutexId },
    UnlockWhileFree { pid: Pid, mid: MutexId },
    UnlockByNonOwner { pid: Pid, mid: MutexId },
}

#[derive(Debug, Clone, Copy)]
pub struct DeadlockVerdict {
    pub pair: (Pid, Pid),
    pub deadlocked: bool,
}

/// What happened during one simulated instruction.
#[derive(Debug, Default)]
pub struct TickReport {
    pub idle: bool,
    /// A lock or wait forced the running process out.
    pub sync_switch: bool,
    pub violation: Option<ProtocolViolation>,
    pub deadlock: Option<DeadlockVerdict>,
    pub timer_fired: bool,
    pub io_trap: bool,
    pub io_interrupt: bool,
    /// The running process's pc wrapped past max_pc.
    pub wrapped: bool,
    pub terminated: Option<Pid>,
}

impl TickReport {
    pub fn interrupted(&self) -> bool {
        self.sync_switch
            || self.timer_fired
            || self.io_trap
            || self.io_interrupt
            || self.terminated.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    R1,
    R2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncClass {
    Lock(Resource),
    Unlock(Resource),
    Signal,
    Wait,
}

#[derive(Debug, Default)]
struct SyncStep {
    switched: bool,
    violation: Option<ProtocolViolation>,
}

/// Read-only view of the scheduler for tracing.
#[derive(Debug, Clone)]
pub struct SchedulerSnapshot {
    /// (quantum size, resident pids) per priority level.
    pub levels: Vec<(u32, Vec<Pid>)>,
    pub blocked: Vec<Pid>,
    pub killed_len: usize,
    pub killed_mutexes_len: usize,
    pub registry_len: usize,
    pub running: Option<(Pid, u32, usize)>,
    pub next_ready: Option<Pid>,
}

/// Orchestrates the MLFQ, the blocked/killed queues, the mutex registry
/// and the single running slot. All state transitions are synchronous
/// calls inside one simulated tick.
pub struct SchedulerCore {
    config: CoreConfig,
    ready: Mlfq,
    blocked: ReadyQueue,
    killed: ReadyQueue,
    killed_mutexes: VecDeque<Mutex>,
    registry: MutexRegistry,
    running: Option<ProcessRecord>,
    /// Set when every level was empty; the next admission dispatches
    /// immediately.
    is_new: bool,
    curr_quantum: u32,
    quantum_tick: u32,
    io_timer: u32,
    switch_count: u32,
    next_pid: u32,
    next_mid: u32,
    rng: StdRng,
}

impl SchedulerCore {
    pub fn new(config: CoreConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let registry = MutexRegistry::new(config.registry_capacity);
        Self {
            config,
            ready: Mlfq::new(),
            blocked: ReadyQueue::new(0),
            killed: ReadyQueue::new(0),
            killed_mutexes: VecDeque::new(),
            registry,
            running: None,
            is_new: true,
            curr_quantum: 0,
            quantum_tick: 0,
            io_timer: 0,
            switch_count: 0,
            next_pid: 0,
            next_mid: 0,
            rng,
        }
    }

    pub fn running(&self) -> Option<&ProcessRecord> {
        self.running.as_ref()
    }

    pub fn registry(&self) -> &MutexRegistry {
        &self.registry
    }

    pub fn ready(&self) -> &Mlfq {
        &self.ready
    }

    pub fn killed_len(&self) -> usize {
        self.killed.len()
    }

    pub fn killed_mutexes_len(&self) -> usize {
        self.killed_mutexes.len()
    }

    pub fn blocked_len(&self) -> usize {
        self.blocked.len()
    }

    fn alloc_pid(&mut self) -> Pid {
        let pid = Pid::new(self.next_pid);
        self.next_pid += 1;
        pid
    }

    fn alloc_mid(&mut self) -> MutexId {
        let mid = MutexId::new(self.next_mid);
        self.next_mid += 1;
        mid
    }

    /// Admits a freshly shaped pair. The second record becomes a child of
    /// the first. Paired/Shared roles get their mutexes built, wired into
    /// both records and inserted into the registry; a full registry
    /// rejects the whole pair (recoverable: the caller may discard it).
    pub fn admit_pair(
        &mut self,
        image1: ProcessImage,
        image2: ProcessImage,
    ) -> Result<(Pid, Pid), RegistryFull> {
        let pid1 = self.alloc_pid();
        let pid2 = self.alloc_pid();
        let role = image1.role;
        let mut rec1 = ProcessRecord::from_image(pid1, None, image1);
        let mut rec2 = ProcessRecord::from_image(pid2, Some(pid1), image2);

        if role.is_synced() {
            let mid1 = self.alloc_mid();
            let mutex1 = Mutex::new(mid1, (pid1, pid2));
            rec1.mutex_r1 = Some(mid1);
            rec2.mutex_r1 = Some(mid1);

            let mutex2 = if role == Role::Shared {
                let mid2 = self.alloc_mid();
                rec1.mutex_r2 = Some(mid2);
                rec2.mutex_r2 = Some(mid2);
                Some(Mutex::new(mid2, (pid1, pid2)))
            } else {
                None
            };

            let mid1 = mutex1.mid;
            self.registry.insert(mutex1)?;
            if let Some(mutex2) = mutex2 {
                if let Err(full) = self.registry.insert(mutex2) {
                    // undo the first insert so the pair leaves no trace
                    self.registry.take_and_remove(mid1);
                    return Err(full);
                }
            }
            info!("admitted {:?} pair {} / {}", role, pid1, pid2);
        } else {
            debug!("admitted {:?} pair {} / {}", role, pid1, pid2);
        }

        rec1.state = ProcState::Ready;
        rec2.state = ProcState::Ready;
        self.ready.enqueue(rec1);
        self.ready.enqueue(rec2);

        if self.is_new {
            self.dispatch();
            self.is_new = false;
        }
        Ok((pid1, pid2))
    }

    /// Priority boost. Flags the core idle-eligible when the MLFQ was
    /// completely empty, so the next admission dispatches.
    pub fn boost(&mut self) {
        if self.ready.boost() {
            self.is_new = true;
        }
    }

    /// One simulated instruction for the running process, followed by the
    /// interrupt checks in fixed order. Fatal errors are true invariant
    /// breaches; the caller decides whether to halt the simulation.
    pub fn tick(&mut self) -> Result<TickReport, SchedulerError> {
        let mut report = TickReport::default();

        let Some(running) = self.running.as_ref() else {
            report.idle = true;
            // a woken or boosted process may be waiting for the slot
            if self.ready.peek().is_some() {
                self.dispatch();
            }
            return Ok(report);
        };

        if running.role.is_synced() {
            if let Some(class) = Self::classify(running)? {
                let sync = self.sync_step(class)?;
                report.violation = sync.violation;
                if sync.switched {
                    report.sync_switch = true;
                    self.switch_count += 1;
                    if self.switch_count >= self.config.deadlock_period {
                        self.switch_count = 0;
                        report.deadlock = self.deadlock_monitor()?;
                    }
                    return Ok(report);
                }
            }
        }

        if let Some(rec) = self.running.as_mut() {
            rec.pc += 1;
        }

        // timer interrupt
        if self.quantum_tick >= self.curr_quantum {
            self.quantum_tick = 0;
            self.timer_isr();
            report.timer_fired = true;
        } else {
            self.quantum_tick += 1;
        }

        // I/O trap
        if self.running.as_ref().is_some_and(|r| r.at_io_trap()) {
            self.io_trap_isr();
            report.io_trap = true;
        }

        // natural completion: wrap and count a finished run
        if let Some(rec) = self.running.as_mut() {
            if rec.pc >= rec.max_pc {
                rec.pc = 0;
                rec.term_count += 1;
                report.wrapped = true;
            }
        }

        // I/O interrupt: wake the head of the blocked queue when due
        let due = self
            .blocked
            .peek()
            .map(|head| self.io_timer >= head.blocked_timer);
        match due {
            Some(true) => {
                self.io_timer = 0;
                if let Some(mut rec) = self.blocked.dequeue() {
                    info!("I/O interrupt: {} rejoins the MLFQ", rec.pid);
                    rec.state = ProcState::Ready;
                    self.ready.enqueue(rec);
                }
                report.io_interrupt = true;
                // the running process, if any, is not displaced
                if self.running.is_none() {
                    self.dispatch();
                }
            }
            Some(false) => self.io_timer += 1,
            None => {}
        }

        // termination for real once the threshold is reached
        let halting = self
            .running
            .as_ref()
            .is_some_and(|r| r.terminate > 0 && r.term_count >= r.terminate);
        if halting {
            report.terminated = self.running.as_ref().map(|r| r.pid);
            self.reclaim_running()?;
            self.dispatch();
        }

        Ok(report)
    }

    /// Moves the next ready process into the running slot, adopting the
    /// quantum of the level it came from.
    fn dispatch(&mut self) {
        self.curr_quantum = self.ready.next_quantum_size();
        if let Some(mut rec) = self.ready.dequeue() {
            debug!("dispatching {} (priority {})", rec.pid, rec.priority);
            rec.state = ProcState::Running;
            self.running = Some(rec);
        }
    }

    fn timer_isr(&mut self) {
        if let Some(mut rec) = self.running.take() {
            rec.state = ProcState::Interrupted;
            // age one level down, wrapping back to the top from the bottom
            rec.priority = if rec.priority < NUM_PRIORITIES - 1 {
                rec.priority + 1
            } else {
                0
            };
            info!("timer interrupt: {} demoted to level {}", rec.pid, rec.priority);
            rec.state = ProcState::Ready;
            self.ready.enqueue(rec);
        }
        self.dispatch();
    }

    fn io_trap_isr(&mut self) {
        if let Some(mut rec) = self.running.take() {
            rec.blocked_timer = self.rng.gen_range(1..=self.config.timer_range);
            info!(
                "I/O trap: {} blocked at pc {} for {} ticks",
                rec.pid, rec.pc, rec.blocked_timer
            );
            rec.state = ProcState::Waiting;
            self.blocked.enqueue(rec);
        }
        self.dispatch();
    }

    /// Classifies the running process's pc against its trap tables, in
    /// the fixed order lock R1, lock R2, unlock R1, unlock R2, signal,
    /// wait. `Ok(None)` means no sync position: a plain instruction. A pc
    /// sitting on a table its role or producer flag cannot legally use
    /// means the shape generator is inconsistent, which is fatal.
    fn classify(rec: &ProcessRecord) -> Result<Option<SyncClass>, SchedulerError> {
        let pc = rec.pc;
        let invalid = SchedulerError::UnknownSyncPoint { pid: rec.pid, pc };
        if rec.traps.lock_r1.contains(pc) {
            return Ok(Some(SyncClass::Lock(Resource::R1)));
        }
        if rec.traps.lock_r2.contains(pc) {
            if rec.role != Role::Shared {
                return Err(invalid);
            }
            return Ok(Some(SyncClass::Lock(Resource::R2)));
        }
        if rec.traps.unlock_r1.contains(pc) {
            return Ok(Some(SyncClass::Unlock(Resource::R1)));
        }
        if rec.traps.unlock_r2.contains(pc) {
            if rec.role != Role::Shared {
                return Err(invalid);
            }
            return Ok(Some(SyncClass::Unlock(Resource::R2)));
        }
        if rec.traps.signal.contains(pc) {
            if rec.role != Role::Paired || !rec.is_producer {
                return Err(invalid);
            }
            return Ok(Some(SyncClass::Signal));
        }
        if rec.traps.wait.contains(pc) {
            if rec.role != Role::Paired || rec.is_producer {
                return Err(invalid);
            }
            return Ok(Some(SyncClass::Wait));
        }
        Ok(None)
    }

    fn resource_id(rec: &ProcessRecord, res: Resource) -> Result<MutexId, SchedulerError> {
        let mid = match res {
            Resource::R1 => rec.mutex_r1,
            Resource::R2 => rec.mutex_r2,
        };
        mid.ok_or(SchedulerError::UnboundResource { pid: rec.pid })
    }

    /// Lock/unlock/signal/wait protocol for the running Paired/Shared
    /// process, at the classified trap position.
    fn sync_step(&mut self, class: SyncClass) -> Result<SyncStep, SchedulerError> {
        let Some(rec) = self.running.as_ref() else {
            return Ok(SyncStep::default());
        };
        let pid = rec.pid;
        let pc = rec.pc;

        let mut step = SyncStep::default();
        match class {
            SyncClass::Lock(res) => {
                let mid = Self::resource_id(rec, res)?;
                let mutex = self
                    .registry
                    .lookup_mut(mid)
                    .ok_or(SchedulerError::MutexMissing { pid, mid })?;
                match mutex.lock(pid) {
                    LockOutcome::Acquired => {
                        debug!("{} locked {} at pc {}", pid, mid, pc);
                    }
                    LockOutcome::AlreadyOwned => {
                        warn!("{} relocked its own {} at pc {}", pid, mid, pc);
                        step.violation = Some(ProtocolViolation::RelockByOwner { pid, mid });
                        self.switch_out_running();
                        step.switched = true;
                    }
                    LockOutcome::Contended => {
                        debug!("{} contended on {}, switching out", pid, mid);
                        self.switch_out_running();
                        step.switched = true;
                    }
                }
            }
            SyncClass::Unlock(res) => {
                let mid = Self::resource_id(rec, res)?;
                let mutex = self
                    .registry
                    .lookup_mut(mid)
                    .ok_or(SchedulerError::MutexMissing { pid, mid })?;
                match mutex.unlock(pid) {
                    UnlockOutcome::Released => {
                        debug!("{} unlocked {} at pc {}", pid, mid, pc);
                    }
                    UnlockOutcome::NotLocked => {
                        warn!("{} unlocked already-free {}", pid, mid);
                        step.violation = Some(ProtocolViolation::UnlockWhileFree { pid, mid });
                    }
                    UnlockOutcome::NotOwner => {
                        warn!("{} unlocked {} it does not own", pid, mid);
                        step.violation = Some(ProtocolViolation::UnlockByNonOwner { pid, mid });
                    }
                }
            }
            SyncClass::Signal => {
                let mid = Self::resource_id(rec, Resource::R1)?;
                let mutex = self
                    .registry
                    .lookup_mut(mid)
                    .ok_or(SchedulerError::MutexMissing { pid, mid })?;
                debug!("{} signaled {} at pc {}", pid, mid, pc);
                mutex.cond.signal();
            }
            SyncClass::Wait => {
                let mid = Self::resource_id(rec, Resource::R1)?;
                let mutex = self
                    .registry
                    .lookup_mut(mid)
                    .ok_or(SchedulerError::MutexMissing { pid, mid })?;
                if mutex.cond.is_signaled() {
                    debug!("{} waiting on {}, switching out", pid, mid);
                    self.switch_out_running();
                    step.switched = true;
                } else {
                    mutex.cond.reset();
                }
            }
        }
        Ok(step)
    }

    /// Forced context switch: the running process rejoins the MLFQ at its
    /// current priority and the next process is dispatched.
    fn switch_out_running(&mut self) {
        if let Some(mut rec) = self.running.take() {
            rec.state = ProcState::Ready;
            self.ready.enqueue(rec);
        }
        self.dispatch();
    }

    /// Point-in-time heuristic over the running Shared process's own two
    /// resources only; not a cycle detector. Paired partnerships (one
    /// mutex) are skipped.
    fn deadlock_monitor(&mut self) -> Result<Option<DeadlockVerdict>, SchedulerError> {
        let Some(rec) = self.running.as_ref() else {
            return Ok(None);
        };
        if rec.role != Role::Shared {
            return Ok(None);
        }
        let pid = rec.pid;
        let mid1 = Self::resource_id(rec, Resource::R1)?;
        let mid2 = Self::resource_id(rec, Resource::R2)?;
        let mutex1 = self
            .registry
            .lookup(mid1)
            .ok_or(SchedulerError::MutexMissing { pid, mid: mid1 })?;
        let mutex2 = self
            .registry
            .lookup(mid2)
            .ok_or(SchedulerError::MutexMissing { pid, mid: mid2 })?;

        let owns_both = mutex1.locked
            && mutex1.owner == Some(pid)
            && mutex2.locked
            && mutex2.owner == Some(pid);
        let verdict = DeadlockVerdict {
            pair: mutex1.pair,
            deadlocked: !owns_both,
        };
        if verdict.deadlocked {
            warn!(
                "deadlock detected for processes {} & {}",
                verdict.pair.0, verdict.pair.1
            );
        } else {
            info!(
                "no deadlock for processes {} & {}",
                verdict.pair.0, verdict.pair.1
            );
        }
        Ok(Some(verdict))
    }

    /// Hands the halted running process (and, for synced roles, its
    /// mutexes and partner) to the killed queues, draining them in
    /// batches. A mutex absent from the registry here is fatal: the
    /// registry must stay consistent with every live synced process.
    fn reclaim_running(&mut self) -> Result<(), SchedulerError> {
        let Some(mut rec) = self.running.take() else {
            return Err(SchedulerError::EmptyReclaim);
        };
        rec.state = ProcState::Halted;
        let pid = rec.pid;

        if rec.role.is_synced() {
            let mid1 = Self::resource_id(&rec, Resource::R1)?;
            let mutex1 = self
                .registry
                .take_and_remove(mid1)
                .ok_or(SchedulerError::MutexMissing { pid, mid: mid1 })?;
            let mutex2 = if rec.role == Role::Shared {
                let mid2 = Self::resource_id(&rec, Resource::R2)?;
                let m = self
                    .registry
                    .take_and_remove(mid2)
                    .ok_or(SchedulerError::MutexMissing { pid, mid: mid2 })?;
                Some(m)
            } else {
                None
            };

            let partner = mutex1.partner_of(pid);
            info!("reclaiming {} and partner {}", pid, partner);
            self.killed.enqueue(rec);
            // absent partner means it was already reclaimed
            if let Some(mut found) = self.ready.remove_pid(partner) {
                found.state = ProcState::Halted;
                self.killed.enqueue(found);
            }
            self.killed_mutexes.push_back(mutex1);
            if let Some(mutex2) = mutex2 {
                self.killed_mutexes.push_back(mutex2);
            }
        } else {
            info!("reclaiming {}", pid);
            self.killed.enqueue(rec);
        }

        if self.killed.len() >= self.config.killed_batch {
            debug!("draining killed queue ({} records)", self.killed.len());
            self.killed.drain().for_each(drop);
        }
        if self.killed_mutexes.len() >= self.config.killed_mutex_batch {
            debug!(
                "draining killed-mutex queue ({} mutexes)",
                self.killed_mutexes.len()
            );
            self.killed_mutexes.clear();
        }
        Ok(())
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let levels = (0..NUM_PRIORITIES)
            .map(|i| {
                let q = self.ready.level(i);
                (q.quantum_size, q.iter().map(|r| r.pid).collect())
            })
            .collect();
        SchedulerSnapshot {
            levels,
            blocked: self.blocked.iter().map(|r| r.pid).collect(),
            killed_len: self.killed.len(),
            killed_mutexes_len: self.killed_mutexes.len(),
            registry_len: self.registry.len(),
            running: self.running.as_ref().map(|r| (r.pid, r.pc, r.priority)),
            next_ready: self.ready.peek().map(|r| r.pid),
        }
    }
}
