//! Slot framing: how one record occupies space in the ring.
//!
//! ```text
//! ┌──────────────┬──────────────────────────┬─────────┐
//! │ header (8 B) │ record (record_size B)   │ padding │
//! └──────────────┴──────────────────────────┴─────────┘
//!   slot_size = align_up(record_size, align) + header_size
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::constants::{ RECORD_ALIGN, RING_HEADER_SIZE };
use crate::error::{ Result, RingError };
use crate::layout::Record;

/// Round `n` up to the next multiple of `align` (power of two).
#[inline]
pub const fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Bytes one framed record occupies in the ring.
#[inline]
pub const fn slot_size(record_size: usize, align: usize, header_size: usize) -> usize {
    align_up(record_size, align) + header_size
}

/// Whether `required` bytes fit in a buffer of `capacity` bytes.
#[inline]
pub fn fits(capacity: u64, required: u64) -> bool {
    capacity >= required
}

/// The buffer cannot hold the requested number of events.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "ring buffer too small: need {needed} bytes ({events} events * {slot_size} bytes) but buffer has {available} bytes"
)]
pub struct CapacityShortfall {
    pub needed: u64,
    pub available: u64,
    pub events: u64,
    pub slot_size: usize,
}

/// Record size, alignment and header size agreed on by producer and consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotLayout {
    record_size: usize,
    align: usize,
    header_size: usize,
}

impl SlotLayout {
    pub fn new(record_size: usize, align: usize, header_size: usize) -> Result<Self> {
        if record_size == 0 {
            return Err(RingError::config("Record size must be greater than 0"));
        }
        if align == 0 || !align.is_power_of_two() {
            return Err(RingError::config("Record alignment must be a power of 2"));
        }
        let overflows = record_size
            .checked_add(align - 1)
            .and_then(|n| n.checked_add(header_size))
            .is_none();
        if overflows {
            return Err(RingError::config("Record size overflows slot size"));
        }
        Ok(Self { record_size, align, header_size })
    }

    /// Layout of `R` with the ring's own header and alignment.
    pub fn of<R: Record>() -> Self {
        Self {
            record_size: std::mem::size_of::<R>(),
            align: RECORD_ALIGN,
            header_size: RING_HEADER_SIZE,
        }
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    #[inline]
    pub fn slot_size(&self) -> usize {
        slot_size(self.record_size, self.align, self.header_size)
    }

    /// `events * slot_size`, or `None` on overflow.
    pub fn required_bytes(&self, events: u64) -> Option<u64> {
        events.checked_mul(self.slot_size() as u64)
    }

    /// Most events a buffer of `capacity` bytes can hold at once.
    pub fn max_events(&self, capacity: usize) -> u64 {
        (capacity / self.slot_size()) as u64
    }

    pub fn check_capacity(
        &self,
        capacity: usize,
        events: u64
    ) -> std::result::Result<(), CapacityShortfall> {
        match self.required_bytes(events) {
            Some(needed) if fits(capacity as u64, needed) => Ok(()),
            // An overflowing request never fits, whatever the capacity.
            needed =>
                Err(CapacityShortfall {
                    needed: needed.unwrap_or(u64::MAX),
                    available: capacity as u64,
                    events,
                    slot_size: self.slot_size(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SkbMeta;
    use proptest::prelude::*;

    #[test]
    fn test_skb_meta_slot() {
        let layout = SlotLayout::of::<SkbMeta>();
        assert_eq!(layout.record_size(), 64);
        assert_eq!(layout.slot_size(), 72);
    }

    #[test]
    fn test_padding() {
        assert_eq!(slot_size(60, 8, 8), 72);
        assert_eq!(slot_size(1, 8, 8), 16);
        assert_eq!(slot_size(64, 8, 8), 72);
        assert_eq!(slot_size(65, 16, 8), 88);
    }

    #[test]
    fn test_invalid_layouts() {
        assert!(SlotLayout::new(0, 8, 8).is_err());
        assert!(SlotLayout::new(64, 0, 8).is_err());
        assert!(SlotLayout::new(64, 12, 8).is_err());
        assert!(SlotLayout::new(usize::MAX, 8, 8).is_err());
        assert!(SlotLayout::new(1, 8, usize::MAX).is_err());
        assert!(SlotLayout::new(usize::MAX - 15, 8, 8).is_ok());
        assert!(SlotLayout::new(usize::MAX - 14, 8, 8).is_err());
    }

    #[test]
    fn test_capacity_boundary() {
        let layout = SlotLayout::of::<SkbMeta>();
        let capacity = 4096;
        let max = layout.max_events(capacity);
        assert_eq!(max, 56);

        assert!(layout.check_capacity(capacity, 1).is_ok());
        assert!(layout.check_capacity(capacity, max).is_ok());

        let err = layout.check_capacity(capacity, max + 1).unwrap_err();
        assert_eq!(err.needed, 57 * 72);
        assert_eq!(err.available, 4096);
        assert!(err.to_string().contains("need 4104 bytes"));
    }

    #[test]
    fn test_required_bytes_overflow() {
        let layout = SlotLayout::of::<SkbMeta>();
        assert_eq!(layout.required_bytes(u64::MAX), None);
        let err = layout.check_capacity(usize::MAX, u64::MAX).unwrap_err();
        assert_eq!(err.needed, u64::MAX);
        assert_eq!(err.events, u64::MAX);
    }

    proptest! {
        #[test]
        fn prop_slot_size_is_aligned_plus_header(
            record_size in 1usize..100_000,
            align_shift in 0u32..12,
            header_size in 0usize..64,
        ) {
            let align = 1usize << align_shift;
            let layout = SlotLayout::new(record_size, align, header_size).unwrap();
            let body = layout.slot_size() - header_size;
            prop_assert_eq!(body % align, 0);
            prop_assert!(body >= record_size);
            prop_assert!(body < record_size + align);
        }

        #[test]
        fn prop_fits_iff_capacity_covers_events(
            capacity in 0usize..1 << 24,
            events in 0u64..1 << 20,
        ) {
            let layout = SlotLayout::of::<SkbMeta>();
            let ok = layout.check_capacity(capacity, events).is_ok();
            prop_assert_eq!(ok, capacity as u64 >= events * 72);
            prop_assert_eq!(ok, events <= layout.max_events(capacity));
        }
    }
}
