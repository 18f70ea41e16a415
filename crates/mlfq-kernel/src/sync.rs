use crate::types::{MutexId, Pid};

/// Binary signal flag. No waiter queue: "waiting" is a poll of the flag
/// by the consumer, not a block.
#[derive(Debug, Clone, Copy, Default)]
pub struct CondVar {
    signal: bool,
}

impl CondVar {
    pub fn signal(&mut self) {
        self.signal = true;
    }

    pub fn is_signaled(&self) -> bool {
        self.signal
    }

    pub fn reset(&mut self) {
        self.signal = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Held by another process; the caller will be context-switched out.
    Contended,
    /// Held by the caller itself; diagnostic condition.
    AlreadyOwned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Released,
    /// Unlock of a mutex that was not locked; protocol violation.
    NotLocked,
    /// Unlock by a process that does not own the lock; protocol violation.
    NotOwner,
}

/// Advisory lock shared by one producer/consumer pair or one
/// shared-resource pair. `owner` and `pair` are weak pid references;
/// the processes themselves are owned by whichever queue holds them.
/// Not `Clone`: the registry (or killed-mutex queue) is the sole owner.
#[derive(Debug)]
pub struct Mutex {
    pub mid: MutexId,
    pub locked: bool,
    pub owner: Option<Pid>,
    /// The two processes created to share this mutex.
    pub pair: (Pid, Pid),
    pub cond: CondVar,
}

impl Mutex {
    pub fn new(mid: MutexId, pair: (Pid, Pid)) -> Self {
        Self {
            mid,
            locked: false,
            owner: None,
            pair,
            cond: CondVar::default(),
        }
    }

    pub fn lock(&mut self, pid: Pid) -> LockOutcome {
        if self.locked {
            if self.owner == Some(pid) {
                LockOutcome::AlreadyOwned
            } else {
                LockOutcome::Contended
            }
        } else {
            self.locked = true;
            self.owner = Some(pid);
            LockOutcome::Acquired
        }
    }

    pub fn unlock(&mut self, pid: Pid) -> UnlockOutcome {
        if !self.locked {
            UnlockOutcome::NotLocked
        } else if self.owner == Some(pid) {
            self.locked = false;
            self.owner = None;
            UnlockOutcome::Released
        } else {
            UnlockOutcome::NotOwner
        }
    }

    /// Partner of the given process on this mutex.
    pub fn partner_of(&self, pid: Pid) -> Pid {
        if self.pair.0 == pid {
            self.pair.1
        } else {
            self.pair.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutex() -> Mutex {
        Mutex::new(MutexId::new(0), (Pid::new(1), Pid::new(2)))
    }

    #[test]
    fn lock_unlock_cycle() {
        let mut m = mutex();
        let p1 = Pid::new(1);
        assert_eq!(m.lock(p1), LockOutcome::Acquired);
        assert!(m.locked);
        assert_eq!(m.owner, Some(p1));
        assert_eq!(m.unlock(p1), UnlockOutcome::Released);
        assert!(!m.locked);
        assert_eq!(m.owner, None);
    }

    #[test]
    fn contended_and_self_relock() {
        let mut m = mutex();
        let (p1, p2) = (Pid::new(1), Pid::new(2));
        assert_eq!(m.lock(p1), LockOutcome::Acquired);
        assert_eq!(m.lock(p2), LockOutcome::Contended);
        assert_eq!(m.lock(p1), LockOutcome::AlreadyOwned);
        // contended lock attempt does not steal ownership
        assert_eq!(m.owner, Some(p1));
    }

    #[test]
    fn unlock_violations() {
        let mut m = mutex();
        let (p1, p2) = (Pid::new(1), Pid::new(2));
        assert_eq!(m.unlock(p1), UnlockOutcome::NotLocked);
        m.lock(p1);
        assert_eq!(m.unlock(p2), UnlockOutcome::NotOwner);
        assert!(m.locked);
    }

    #[test]
    fn cond_var_signal_and_reset() {
        let mut m = mutex();
        assert!(!m.cond.is_signaled());
        m.cond.signal();
        assert!(m.cond.is_signaled());
        m.cond.reset();
        assert!(!m.cond.is_signaled());
    }

    #[test]
    fn partner_lookup() {
        let m = mutex();
        assert_eq!(m.partner_of(Pid::new(1)), Pid::new(2));
        assert_eq!(m.partner_of(Pid::new(2)), Pid::new(1));
    }
}
