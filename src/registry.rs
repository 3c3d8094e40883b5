//! Allocation of UART port indices.

use crate::consts;
use crate::error::{Error, Result};
use log::debug;
use std::sync::{Arc, Mutex, OnceLock};

/// A fixed set of UART port slots, handed out at bind and returned on unbind.
#[derive(Debug)]
pub struct PortRegistry {
    slots: Mutex<Vec<bool>>,
}

impl PortRegistry {
    /// Creates a registry with `capacity` free slots.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(vec![false; capacity]),
        })
    }

    /// Process-wide registry used by the `open_*` constructors.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<PortRegistry>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| PortRegistry::new(consts::UART_PORTS_MAX)))
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        self.slots
            .lock()
            .map(|s| s.iter().filter(|&&used| used).count())
            .unwrap_or(0)
    }

    /// Takes the lowest free slot.
    pub fn acquire(self: &Arc<Self>) -> Result<PortSlot> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::Transport("port registry lock poisoned".to_string()))?;
        let capacity = slots.len();
        let index = slots
            .iter()
            .position(|&used| !used)
            .ok_or(Error::NoFreePortSlot { capacity })?;
        slots[index] = true;
        debug!("Acquired UART port slot {}", index);
        Ok(PortSlot {
            registry: Arc::clone(self),
            index,
        })
    }

    fn release(&self, index: usize) {
        if let Ok(mut slots) = self.slots.lock() {
            if let Some(slot) = slots.get_mut(index) {
                *slot = false;
                debug!("Released UART port slot {}", index);
            }
        }
    }
}

/// A held port slot; the index returns to its registry on drop.
#[derive(Debug)]
pub struct PortSlot {
    registry: Arc<PortRegistry>,
    index: usize,
}

impl PortSlot {
    /// Port index, as used in a `ttyFT<index>` style name.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for PortSlot {
    fn drop(&mut self) {
        self.registry.release(self.index);
    }
}
