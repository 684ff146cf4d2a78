//! State snapshots for rewind functionality.
//!
//! Snapshots are stored in a ring buffer, taken every N frames (default
//! 60 = about one second), allowing rewind of up to `capacity` intervals.
//!
//! ## Usage
//!
//! ```text
//! // GUI: hold Backspace to rewind
//! ```

use crate::CoreState;

/// A frozen copy of the core registers.
#[derive(Clone)]
pub struct Snapshot {
    pub state: CoreState,
    /// Frame number when this snapshot was taken
    pub frame: u64,
}

impl Snapshot {
    pub fn capture(sys: &crate::System) -> Self {
        Snapshot { state: sys.capture_state(), frame: sys.frame_count() }
    }
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
    /// Frame counter for interval tracking
    frame_counter: u32,
}

impl RewindBuffer {
    /// Create a new rewind buffer with given capacity (number of snapshots).
    ///
    /// With interval=60 and capacity=300, stores 5 minutes of rewind at 60fps.
    pub fn new(capacity: usize, interval: u32) -> Self {
        let capacity = capacity.max(1);
        RewindBuffer {
            buf: vec![None; capacity],
            write_pos: 0,
            count: 0,
            interval: interval.max(1),
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

    /// Push a snapshot into the ring buffer.
    pub fn push(&mut self, snap: Snapshot) {
        self.buf[self.write_pos] = Some(snap);
        self.write_pos = (self.write_pos + 1) % self.buf.len();
        if self.count < self.buf.len() {
            self.count += 1;
        }
    }

    /// Pop the most recent snapshot (for rewind). Returns None if empty.
    pub fn pop(&mut self) -> Option<Snapshot> {
        if self.count == 0 { return None; }
        if self.write_pos == 0 {
            self.write_pos = self.buf.len() - 1;
        } else {
            self.write_pos -= 1;
        }
        self.count -= 1;
        self.buf[self.write_pos].take()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize { self.count }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool { self.count == 0 }

    /// Clear all snapshots.
    pub fn clear(&mut self) {
        for slot in self.buf.iter_mut() { *slot = None; }
        self.count = 0;
        self.write_pos = 0;
        self.frame_counter = 0;
    }

    /// Estimated memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.count * std::mem::size_of::<Snapshot>()
    }
}
