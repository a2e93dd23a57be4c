//! DRAM backing store (§4.M).
//!
//! A request/latch/serve/ack handshake addressed to a single 64-bit word at
//! a time is the nominal protocol here. Because the bus arbiter is the sole caller
//! of [`Dram`] (it resolves a miss or writeback synchronously within its own
//! tick rather than handing the request to a separate DRAM thread), that
//! handshake collapses here into a plain mutex-guarded method: the critical
//! section the handshake protects is exactly the body of [`Dram::read_line`]
//! / [`Dram::write_line`]. Lines are still moved four 8-byte words at a
//! time, matching the bus's four-segment transfer.
use std::sync::Mutex;

use crate::mesi::types::LINE_BYTES;

const WORD_BYTES: usize = 8;

/// Flat, byte-addressable DRAM.
#[derive(Debug)]
pub struct Dram {
    bytes: Mutex<Vec<u8>>,
}

impl Dram {
    /// Builds a zero-initialized DRAM of `size` bytes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            bytes: Mutex::new(vec![0u8; size]),
        }
    }

    /// Reads one `LINE_BYTES`-byte line, `WORD_BYTES` at a time.
    #[must_use]
    pub fn read_line(&self, addr: u16) -> [u8; LINE_BYTES] {
        let bytes = self.bytes.lock().expect("dram lock poisoned");
        let start = addr as usize;
        let mut line = [0u8; LINE_BYTES];
        for segment in 0..LINE_BYTES / WORD_BYTES {
            let offset = segment * WORD_BYTES;
            line[offset..offset + WORD_BYTES].copy_from_slice(&bytes[start + offset..start + offset + WORD_BYTES]);
        }
        line
    }

    /// Writes one line back, `WORD_BYTES` at a time.
    pub fn write_line(&self, addr: u16, data: &[u8; LINE_BYTES]) {
        let mut bytes = self.bytes.lock().expect("dram lock poisoned");
        let start = addr as usize;
        for segment in 0..LINE_BYTES / WORD_BYTES {
            let offset = segment * WORD_BYTES;
            bytes[start + offset..start + offset + WORD_BYTES].copy_from_slice(&data[offset..offset + WORD_BYTES]);
        }
    }

    /// Zeroes every byte (UI `reset`).
    pub fn reset(&self) {
        self.bytes.lock().expect("dram lock poisoned").iter_mut().for_each(|b| *b = 0);
    }

    /// A full copy of the backing store, for the UI's observable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().expect("dram lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_a_line() {
        let dram = Dram::new(4096);
        let data = [7u8; LINE_BYTES];
        dram.write_line(0x40, &data);
        assert_eq!(dram.read_line(0x40), data);
    }

    #[test]
    fn reset_zeroes_every_byte() {
        let dram = Dram::new(64);
        dram.write_line(0, &[9u8; LINE_BYTES]);
        dram.reset();
        assert_eq!(dram.read_line(0), [0u8; LINE_BYTES]);
    }
}
