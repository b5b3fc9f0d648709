//! Machine state snapshots for rewind.
//!
//! Snapshots are stored in a ring buffer, taken every N frames (default 60 =
//! 1 second), allowing rewind of up to `capacity` snapshots. ROM is not
//! captured: a session runs a single cartridge.

use crate::cpu::Cpu;
use crate::PALETTE_SIZE;

/// A frozen copy of everything a running program can change.
#[derive(Clone)]
pub struct Snapshot {
    pub cpu: Cpu,
    pub cycles: u64,
    pub running: bool,
    pub ram: Vec<u8>,
    pub vram: Vec<u8>,
    pub io: Vec<u8>,
    pub palette: [u8; PALETTE_SIZE],
    /// Frame number when this snapshot was taken
    pub frame: u32,
}

/// Ring buffer of snapshots for rewind.
pub struct RewindBuffer {
    buf: Vec<Option<Snapshot>>,
    /// Write position (next slot to overwrite)
    write_pos: usize,
    /// Number of valid snapshots
    count: usize,
    /// Frames between snapshots
    pub interval: u32,
    frame_counter: u32,
}

impl RewindBuffer {
    /// Create a new rewind buffer holding `capacity` snapshots.
    pub fn new(capacity: usize, interval: u32) -> Self {
        RewindBuffer {
            buf: vec![None; capacity.max(1)],
            write_pos: 0,
            count: 0,
            interval,
            frame_counter: 0,
        }
    }

    /// Notify that a frame has completed. Returns true if a snapshot should be taken.
    pub fn tick_frame(&mut self) -> bool {
        self.frame_counter += 1;
        if self.frame_counter >= self.interval {
            self.frame_counter = 0;
            true
        } else {
            false
        }
    }

    /// Push a snapshot, overwriting the oldest one when full.
    pub fn push(&mut self, snap: Snapshot) {
        self.buf[self.write_pos] = Some(snap);
        self.write_pos = (self.write_pos + 1) % self.buf.len();
        if self.count < self.buf.len() {
            self.count += 1;
        }
    }

    /// Pop the most recent snapshot. Returns None if empty.
    pub fn pop(&mut self) -> Option<Snapshot> {
        if self.count == 0 { return None; }
        self.write_pos = self.write_pos.checked_sub(1).unwrap_or(self.buf.len() - 1);
        self.count -= 1;
        self.buf[self.write_pos].take()
    }

    pub fn len(&self) -> usize { self.count }

    pub fn is_empty(&self) -> bool { self.count == 0 }

    /// Drop all snapshots and restart the interval.
    pub fn clear(&mut self) {
        for slot in self.buf.iter_mut() { *slot = None; }
        self.count = 0;
        self.write_pos = 0;
        self.frame_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Machine;

    fn make_snap(frame: u32) -> Snapshot {
        let mut snap = Machine::new().save_snapshot();
        snap.frame = frame;
        snap
    }

    #[test]
    fn test_push_pop() {
        let mut rb = RewindBuffer::new(3, 1);
        rb.push(make_snap(1));
        rb.push(make_snap(2));
        rb.push(make_snap(3));
        assert_eq!(rb.len(), 3);

        assert_eq!(rb.pop().unwrap().frame, 3);
        assert_eq!(rb.pop().unwrap().frame, 2);
        assert_eq!(rb.len(), 1);
    }

    #[test]
    fn test_ring_overflow() {
        let mut rb = RewindBuffer::new(2, 1);
        rb.push(make_snap(1));
        rb.push(make_snap(2));
        rb.push(make_snap(3)); // overwrites frame 1
        assert_eq!(rb.len(), 2);

        assert_eq!(rb.pop().unwrap().frame, 3);
        assert_eq!(rb.pop().unwrap().frame, 2);
        assert!(rb.pop().is_none());
        assert!(rb.is_empty());
    }

    #[test]
    fn test_tick_frame() {
        let mut rb = RewindBuffer::new(10, 60);
        for _ in 0..59 { assert!(!rb.tick_frame()); }
        assert!(rb.tick_frame());
        rb.clear();
        assert!(!rb.tick_frame());
    }
}
