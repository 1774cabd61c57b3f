//! Ringview defaults
//!
//! Values used when no explicit configuration is supplied. Everything here can be
//! overridden through `SlotLayout`, `RingConfig` and `BenchConfig`.

use std::time::Duration;

/// Records generated and parsed per run when the caller does not choose
pub const DEFAULT_EVENTS: u64 = 50_000;

/// How long the reader may sit with zero pending data before a run fails
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5);

/// Size of the packet handed to the producer on every trigger
pub const PACKET_DATA_SIZE: usize = 128;

/// Per-record header written by the producer (length word + flags)
pub const RING_HEADER_SIZE: usize = 8;

/// Records start on 8-byte boundaries inside the ring
pub const RECORD_ALIGN: usize = 8;

/// Default shared buffer capacity (must be power of 2)
pub const DEFAULT_RING_CAPACITY: usize = 256 * 1024 * 1024;

/// Largest repeat count a single producer trigger accepts
pub const MAX_TRIGGER_REPEAT: u64 = u32::MAX as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_power_of_two() {
        assert!(DEFAULT_RING_CAPACITY.is_power_of_two());
    }

    #[test]
    fn test_header_is_aligned() {
        assert!(RECORD_ALIGN.is_power_of_two());
        assert_eq!(RING_HEADER_SIZE % RECORD_ALIGN, 0);
    }
}
