//! Record layout shared by producer and consumer.
//!
//! - `Record` - fixed-size `Pod` type with a deterministic fold
//! - `SkbMeta` - the 64-byte packet metadata record
//! - `Checksum` - wrapping sum of record folds
//! - `SlotLayout` - header + record + padding framing inside the ring

pub mod skb_meta;
pub mod slot;

pub use skb_meta::SkbMeta;
pub use slot::{ align_up, fits, slot_size, CapacityShortfall, SlotLayout };

use bytemuck::{ Pod, PodCastError };
use serde::Serialize;

use crate::error::LayoutError;

/// A fixed-layout record carried in every ring slot.
///
/// Implementors are plain old data: no padding, no pointers, every bit pattern valid.
pub trait Record: Pod {
    /// Wrapping sum over every field.
    fn fold(&self) -> u64;

    /// Borrow `bytes` as a record without copying.
    ///
    /// The length must match exactly; a longer sample is a layout divergence,
    /// not something to truncate.
    fn view(bytes: &[u8]) -> Result<&Self, LayoutError> {
        let expected = std::mem::size_of::<Self>();
        if bytes.len() != expected {
            return Err(LayoutError::SizeMismatch { got: bytes.len(), expected });
        }
        bytemuck::try_from_bytes(bytes).map_err(|e| match e {
            PodCastError::TargetAlignmentGreaterAndInputNotAligned =>
                LayoutError::Misaligned { align: std::mem::align_of::<Self>() },
            _ => LayoutError::SizeMismatch { got: bytes.len(), expected },
        })
    }

    /// Copy `bytes` into an owned record. Alignment of the source does not matter.
    fn read(bytes: &[u8]) -> Result<Self, LayoutError> {
        let expected = std::mem::size_of::<Self>();
        if bytes.len() != expected {
            return Err(LayoutError::SizeMismatch { got: bytes.len(), expected });
        }
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

/// Modular sum over consumed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Checksum(u64);

impl Checksum {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn absorb(&mut self, fold: u64) {
        self.0 = self.0.wrapping_add(fold);
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
