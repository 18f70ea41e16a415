use mlfq_kernel::{ProcessImage, Role, TrapTable, TrapTables, TRAP_COUNT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Trap sections are laid out at strides of `max_pc / MAX_DIVIDER`.
const MAX_DIVIDER: u32 = 4;

/// A process never restarts more than this many times before halting.
const MAX_TERMINATE: u32 = 4;

/// Tally of every role ever produced. Over a long run the shares settle
/// to roughly 50%, 25%, 12.5%, 12.5%.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleCounts {
    pub compute: u32,
    pub io_bound: u32,
    pub paired: u32,
    pub shared: u32,
}

impl RoleCounts {
    pub fn total(&self) -> u32 {
        self.compute + self.io_bound + self.paired + self.shared
    }

    fn record(&mut self, role: Role, n: u32) {
        match role {
            Role::Compute => self.compute += n,
            Role::IoBound => self.io_bound += n,
            Role::Paired => self.paired += n,
            Role::Shared => self.shared += n,
        }
    }
}

/// Shapes new processes: role lottery, instruction-count sizing, trap
/// placement. Identifiers are allocated by the scheduler at admission,
/// not here.
pub struct ProcessFactory {
    rng: StdRng,
    /// Shared pairs get inverted lock ordering on the second process,
    /// making the pair deadlock-prone by construction.
    deadlock_prone: bool,
    counts: RoleCounts,
}

impl ProcessFactory {
    pub fn new(seed: u64, deadlock_prone: bool) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            deadlock_prone,
            counts: RoleCounts::default(),
        }
    }

    pub fn counts(&self) -> &RoleCounts {
        &self.counts
    }

    fn draw_role(&mut self) -> Role {
        match self.rng.gen_range(0..8) {
            0..=3 => Role::Compute,
            4..=5 => Role::IoBound,
            6 => Role::Paired,
            _ => Role::Shared,
        }
    }

    /// Produces one pair of images sharing a role. The caller admits them
    /// together; for Paired roles the first image is the producer.
    pub fn make_pair(&mut self) -> (ProcessImage, ProcessImage) {
        let role = self.draw_role();
        self.counts.record(role, 2);

        let mut first = self.base_image(role);
        let mut second = self.base_image(role);

        match role {
            Role::Compute => {}
            Role::IoBound => {
                self.place_io_traps(&mut first);
                self.place_io_traps(&mut second);
            }
            Role::Shared => {
                place_shared_traps(&mut first, false);
                place_shared_traps(&mut second, self.deadlock_prone);
            }
            Role::Paired => {
                first.is_producer = true;
                place_paired_traps(&mut first);
                place_paired_traps(&mut second);
            }
        }

        (first, second)
    }

    fn base_image(&mut self, role: Role) -> ProcessImage {
        ProcessImage {
            role,
            max_pc: self.rng.gen_range(2000..4000),
            terminate: self.rng.gen_range(0..=MAX_TERMINATE),
            traps: TrapTables::default(),
            is_producer: false,
        }
    }

    fn place_io_traps(&mut self, image: &mut ProcessImage) {
        let mut positions: Vec<u32> = (0..2 * TRAP_COUNT)
            .map(|_| self.rng.gen_range(1..image.max_pc))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        let split = positions.len() / 2;
        image.traps.io_1 = TrapTable::from_positions(&positions[..split]);
        image.traps.io_2 = TrapTable::from_positions(&positions[split..]);
    }
}

fn section_bases(max_pc: u32) -> [u32; TRAP_COUNT] {
    let stride = max_pc / MAX_DIVIDER;
    let mut bases = [0; TRAP_COUNT];
    for (i, base) in bases.iter_mut().enumerate() {
        *base = stride * i as u32;
    }
    bases
}

/// Nested lock sections. The ordinary layout is 1-2-2-1 (lock R1, lock
/// R2, unlock R2, unlock R1); `inverted` flips the resources to 2-1-1-2
/// so the two processes acquire in opposite order.
fn place_shared_traps(image: &mut ProcessImage, inverted: bool) {
    let mut lock_r1 = [0; TRAP_COUNT];
    let mut lock_r2 = [0; TRAP_COUNT];
    let mut unlock_r2 = [0; TRAP_COUNT];
    let mut unlock_r1 = [0; TRAP_COUNT];
    for (i, base) in section_bases(image.max_pc).into_iter().enumerate() {
        if inverted {
            lock_r2[i] = base + 1;
            lock_r1[i] = base + 2;
            unlock_r1[i] = base + 3;
            unlock_r2[i] = base + 4;
        } else {
            lock_r1[i] = base + 1;
            lock_r2[i] = base + 2;
            unlock_r2[i] = base + 3;
            unlock_r1[i] = base + 4;
        }
    }
    image.traps.lock_r1 = TrapTable::from_positions(&lock_r1);
    image.traps.lock_r2 = TrapTable::from_positions(&lock_r2);
    image.traps.unlock_r2 = TrapTable::from_positions(&unlock_r2);
    image.traps.unlock_r1 = TrapTable::from_positions(&unlock_r1);
}

/// Lock / signal-or-wait / unlock triplets per section. Which of the
/// signal and wait tables applies is decided by `is_producer` at
/// classification time.
fn place_paired_traps(image: &mut ProcessImage) {
    let mut lock_r1 = [0; TRAP_COUNT];
    let mut cond = [0; TRAP_COUNT];
    let mut unlock_r1 = [0; TRAP_COUNT];
    for (i, base) in section_bases(image.max_pc).into_iter().enumerate() {
        lock_r1[i] = base + 1;
        cond[i] = base + 2;
        unlock_r1[i] = base + 3;
    }
    image.traps.lock_r1 = TrapTable::from_positions(&lock_r1);
    image.traps.unlock_r1 = TrapTable::from_positions(&unlock_r1);
    if image.is_producer {
        image.traps.signal = TrapTable::from_positions(&cond);
    } else {
        image.traps.wait = TrapTable::from_positions(&cond);
    }
}
