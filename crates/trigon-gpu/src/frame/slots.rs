//! Frame slots: synchronization for multiple frames in flight.

use crate::error::{GpuError, Result};
use crate::frame::SyncDevice;

/// Synchronization for one frame in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot<S, F> {
    /// Signaled when the acquired image is ready to be rendered to.
    pub image_acquired: S,
    /// Signaled when rendering completes; present waits on it.
    pub render_finished: S,
    /// Signaled when the slot's submission has finished executing.
    pub in_flight: F,
}

type SlotOf<D> = FrameSlot<<D as SyncDevice>::Semaphore, <D as SyncDevice>::Fence>;

/// Fixed ring of frame slots, created once and reused across swapchain rebuilds.
pub struct FrameSlotPool<D: SyncDevice> {
    slots: Vec<SlotOf<D>>,
    current: usize,
}

impl<D: SyncDevice> FrameSlotPool<D> {
    /// Create `count` slots. Fences start signaled so the first use of
    /// each slot does not block.
    pub fn new(device: &mut D, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(GpuError::InvalidState(
                "at least one frame in flight is required".into(),
            ));
        }

        let mut pool = Self {
            slots: Vec::with_capacity(count),
            current: 0,
        };
        for _ in 0..count {
            match create_slot(device) {
                Ok(slot) => pool.slots.push(slot),
                Err(e) => {
                    pool.destroy(device);
                    return Err(e);
                }
            }
        }

        Ok(pool)
    }

    /// The active slot.
    pub fn current(&self) -> &SlotOf<D> {
        &self.slots[self.current]
    }

    /// Index of the active slot.
    pub const fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Move to the next slot.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotOf<D>> {
        self.slots.iter()
    }

    /// Block until no slot has unfinished work.
    pub fn wait_all(&self, device: &mut D) -> Result<()> {
        for slot in &self.slots {
            device.wait_for_fence(slot.in_flight)?;
        }
        Ok(())
    }

    /// Give the active slot a fresh signaled fence and destroy the old one.
    ///
    /// For a fence that was reset but never submitted: nothing would ever
    /// signal it, so [`wait_all`](Self::wait_all) would block forever.
    /// Returns the destroyed handle.
    pub fn replace_current_fence(&mut self, device: &mut D) -> Result<D::Fence> {
        let fresh = device.create_fence(true)?;
        let stale = std::mem::replace(&mut self.slots[self.current].in_flight, fresh);
        device.destroy_fence(stale);
        Ok(stale)
    }

    /// Destroy every slot. Callers must have drained the pool first.
    pub fn destroy(self, device: &mut D) {
        for slot in self.slots {
            destroy_slot(device, slot);
        }
    }
}

fn create_slot<D: SyncDevice>(device: &mut D) -> Result<SlotOf<D>> {
    let image_acquired = device.create_semaphore()?;
    let render_finished = match device.create_semaphore() {
        Ok(semaphore) => semaphore,
        Err(e) => {
            device.destroy_semaphore(image_acquired);
            return Err(e);
        }
    };
    let in_flight = match device.create_fence(true) {
        Ok(fence) => fence,
        Err(e) => {
            device.destroy_semaphore(image_acquired);
            device.destroy_semaphore(render_finished);
            return Err(e);
        }
    };

    Ok(FrameSlot {
        image_acquired,
        render_finished,
        in_flight,
    })
}

fn destroy_slot<D: SyncDevice>(device: &mut D, slot: SlotOf<D>) {
    device.destroy_semaphore(slot.image_acquired);
    device.destroy_semaphore(slot.render_finished);
    device.destroy_fence(slot.in_flight);
}
