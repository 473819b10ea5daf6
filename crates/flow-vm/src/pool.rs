//! Reusable-object pools for VMs and compilation buffers.
//!
//! Both pools keep an owned slot collection plus an available-index
//! stack; acquiring pops or constructs, releasing resets the object and
//! either returns it to the stack or, when the idle stack is at its
//! configured cap, destroys it outright. `available + active == total`
//! holds after every paired acquire/release.

use tracing::trace;

use crate::error::{FlowError, FlowResult};
use crate::vm::FlowVm;

/// Pool occupancy snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub active: usize,
}

/// A checked-out VM's pool slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VmSlot(usize);

impl VmSlot {
    /// Raw slot index; stable while the VM is checked out.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Owns every flow VM; flows never allocate their machine per cast.
pub struct VmPool {
    slots: Vec<Option<FlowVm>>,
    /// Idle slots ready to hand out.
    available: Vec<usize>,
    /// Checked-out slots in acquisition order; drives tick ordering.
    active: Vec<usize>,
    /// Destroyed slots whose indices can host future constructions.
    vacant: Vec<usize>,
    max_idle: usize,
    max_active: usize,
}

impl VmPool {
    /// Create a pool with the given idle and active caps.
    #[must_use]
    pub fn new(max_idle: usize, max_active: usize) -> Self {
        Self {
            slots: Vec::new(),
            available: Vec::new(),
            active: Vec::new(),
            vacant: Vec::new(),
            max_idle,
            max_active,
        }
    }

    /// Construct VMs until `n` are idle and ready.
    pub fn prewarm(&mut self, n: usize) {
        while self.available.len() < n {
            let index = self.new_slot();
            self.available.push(index);
        }
    }

    /// Check out a VM, constructing one if none are idle.
    pub fn acquire(&mut self) -> FlowResult<VmSlot> {
        if self.active.len() >= self.max_active {
            return Err(FlowError::PoolExhausted);
        }
        let index = match self.available.pop() {
            Some(index) => index,
            None => self.new_slot(),
        };
        self.active.push(index);
        Ok(VmSlot(index))
    }

    /// Return a VM to the pool, resetting its state.
    ///
    /// If the idle stack is already at its cap the VM is destroyed and
    /// its slot goes vacant. No-op for a slot that is not checked out.
    pub fn release(&mut self, slot: VmSlot) {
        let Some(position) = self.active.iter().position(|&i| i == slot.0) else {
            return;
        };
        self.active.remove(position);
        if let Some(vm) = self.slots[slot.0].as_mut() {
            vm.reset();
        }
        if self.available.len() >= self.max_idle {
            trace!(slot = slot.0, "idle cap reached; destroying vm");
            self.slots[slot.0] = None;
            self.vacant.push(slot.0);
        } else {
            self.available.push(slot.0);
        }
    }

    /// Borrow a checked-out VM.
    #[must_use]
    pub fn get(&self, slot: VmSlot) -> Option<&FlowVm> {
        self.slots.get(slot.0)?.as_ref()
    }

    /// Mutably borrow a checked-out VM.
    pub fn get_mut(&mut self, slot: VmSlot) -> Option<&mut FlowVm> {
        self.slots.get_mut(slot.0)?.as_mut()
    }

    /// Temporarily remove a VM from its slot (for split borrows during
    /// the tick loop). Pair with [`VmPool::put_back`].
    pub fn take(&mut self, slot: VmSlot) -> Option<FlowVm> {
        self.slots.get_mut(slot.0)?.take()
    }

    /// Restore a VM taken with [`VmPool::take`].
    pub fn put_back(&mut self, slot: VmSlot, vm: FlowVm) {
        if let Some(entry) = self.slots.get_mut(slot.0) {
            *entry = Some(vm);
        }
    }

    /// Checked-out slots in acquisition order.
    #[must_use]
    pub fn active_slots(&self) -> Vec<VmSlot> {
        self.active.iter().map(|&i| VmSlot(i)).collect()
    }

    /// Occupancy counts; `available + active == total` always.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.available.len() + self.active.len(),
            available: self.available.len(),
            active: self.active.len(),
        }
    }

    fn new_slot(&mut self) -> usize {
        let vm = FlowVm::new();
        if let Some(index) = self.vacant.pop() {
            self.slots[index] = Some(vm);
            index
        } else {
            self.slots.push(Some(vm));
            self.slots.len() - 1
        }
    }
}

/// Recycles raw byte buffers used while compiling programs.
pub struct BytecodePool {
    available: Vec<Vec<u8>>,
    active: usize,
    max_idle: usize,
}

impl BytecodePool {
    /// Create a pool with the given idle cap.
    #[must_use]
    pub const fn new(max_idle: usize) -> Self {
        Self {
            available: Vec::new(),
            active: 0,
            max_idle,
        }
    }

    /// Allocate buffers until `n` are idle.
    pub fn prewarm(&mut self, n: usize) {
        while self.available.len() < n {
            self.available.push(Vec::new());
        }
    }

    /// Check out a scratch buffer.
    pub fn acquire(&mut self) -> Vec<u8> {
        self.active += 1;
        self.available.pop().unwrap_or_default()
    }

    /// Return a buffer; dropped outright when the idle stack is full.
    pub fn release(&mut self, buffer: Vec<u8>) {
        self.active = self.active.saturating_sub(1);
        if self.available.len() < self.max_idle {
            self.available.push(buffer);
        }
    }

    /// Account for a buffer consumed by a failed build and never returned.
    pub fn discard(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// Occupancy counts.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.available.len() + self.active,
            available: self.available.len(),
            active: self.active,
        }
    }
}
