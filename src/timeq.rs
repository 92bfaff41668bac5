/*
Time helpers for the memory controller model.

The controller does not model DRAM commands. Every admitted request is stamped with a `Ticket`
whose `ready_at` is the arrival cycle plus the fixed latency of the channel it landed in. The
per-cycle completion scan compares that stamp against the current cycle; nothing here ever waits.
*/

use crate::base::module::IsModule;

pub type Cycle = u64;

// Helper to read the current cycle from any module
pub fn module_now<M: IsModule>(module: &M) -> Cycle {
    module.base_ref().cycle
}

// Completion stamp of an admitted request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ticket {
    issued_at: Cycle,
    ready_at: Cycle,
}

impl Ticket {
    pub fn new(issued_at: Cycle, latency: Cycle) -> Self {
        Self {
            issued_at,
            ready_at: issued_at.saturating_add(latency),
        }
    }

    // Cycle at which the request entered the controller.
    pub fn issued_at(&self) -> Cycle {
        self.issued_at
    }

    // Cycle at which the request may be returned to its originators.
    pub fn ready_at(&self) -> Cycle {
        self.ready_at
    }

    // Whether the ticket is ready at the provided cycle.
    pub fn is_ready(&self, now: Cycle) -> bool {
        now >= self.ready_at
    }
}
