use super::FrameID;
use crate::storage::BlockId;
use log::trace;

#[derive(Clone, Default)]
struct ClockItem {
    /// block held by the frame, `None` if never assigned
    block: Option<BlockId>,
    /// number of outstanding pins
    pin_count: usize,
    /// chances left before the frame can be evicted
    reference_count: usize,
}

impl ClockItem {
    /// return true if the frame was unpinned before
    pub fn pin(&mut self) -> bool {
        self.pin_count += 1;
        self.pin_count == 1
    }
    /// return true if the frame is unpinned afterwards
    pub fn unpin(&mut self) -> bool {
        debug_assert!(self.pin_count > 0);
        self.pin_count = self.pin_count.saturating_sub(1);
        self.pin_count == 0
    }
    pub fn try_victim(&mut self) -> bool {
        if self.pin_count > 0 {
            false
        } else if self.reference_count > 0 {
            self.reference_count -= 1;
            false
        } else {
            true
        }
    }
}

/// Generalized clock. Every frame carries a reference count which
/// the handle decrements as it sweeps past an unpinned frame, a
/// frame is the victim once the count has decayed to zero.
pub struct ClockReplacer {
    /// the clock
    clock: Vec<ClockItem>,
    /// clock handle
    handle: usize,
    /// full sweeps allowed per victim search
    max_rotations: usize,
}

impl ClockReplacer {
    pub fn new(size: usize, max_rotations: usize) -> Self {
        Self {
            clock: vec![ClockItem::default(); size],
            handle: 0,
            max_rotations,
        }
    }

    /// we may pin a frame multiple times
    pub fn pin(&mut self, frame_id: FrameID) -> bool {
        assert!(frame_id < self.clock.len());
        self.clock[frame_id].pin()
    }

    pub fn unpin(&mut self, frame_id: FrameID) -> bool {
        assert!(frame_id < self.clock.len());
        self.clock[frame_id].unpin()
    }

    /// a resident frame was accessed again
    pub fn touch(&mut self, frame_id: FrameID) {
        assert!(frame_id < self.clock.len());
        self.clock[frame_id].reference_count += 1;
    }

    /// Record which block the frame holds from now on and return
    /// the block it held before. A new block starts with no
    /// reference count.
    pub fn assign(&mut self, frame_id: FrameID, block: Option<BlockId>) -> Option<BlockId> {
        assert!(frame_id < self.clock.len());
        let item = &mut self.clock[frame_id];
        item.reference_count = 0;
        std::mem::replace(&mut item.block, block)
    }

    pub fn block(&self, frame_id: FrameID) -> Option<&BlockId> {
        self.clock[frame_id].block.as_ref()
    }
    pub fn pin_count(&self, frame_id: FrameID) -> usize {
        self.clock[frame_id].pin_count
    }
    #[cfg(test)]
    pub fn reference_count(&self, frame_id: FrameID) -> usize {
        self.clock[frame_id].reference_count
    }
    #[cfg(test)]
    pub fn handle(&self) -> usize {
        self.handle
    }

    /// advance the clock handle, return the old handle
    fn advance(&mut self) -> usize {
        let handle = self.handle;
        self.handle += 1;
        if self.handle == self.clock.len() {
            self.handle = 0;
        }
        handle
    }

    /// Choose a frame to hold a new block. Frames that never held
    /// a block are taken first. Otherwise the handle sweeps at most
    /// `max_rotations * size + 1` frames, `None` means every frame
    /// is pinned or still referenced.
    pub fn victim(&mut self) -> Option<FrameID> {
        if let Some(frame_id) = self
            .clock
            .iter()
            .position(|item| item.block.is_none() && item.pin_count == 0)
        {
            trace!("clock: empty frame {}", frame_id);
            return Some(frame_id);
        }
        if self.clock.is_empty() {
            return None;
        }
        let budget = self.max_rotations * self.clock.len() + 1;
        for _ in 0..budget {
            let handle = self.advance();
            if self.clock[handle].try_victim() {
                trace!("clock: victim frame {}", handle);
                return Some(handle);
            }
        }
        None
    }
}
