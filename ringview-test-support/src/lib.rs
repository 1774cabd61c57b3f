//! # ringview-test-support
//!
//! Testing infrastructure for ringview.
//!
//! ## Components
//!
//! - **ShortProducer / MalformedProducer / SequenceProducer** - scripted record sources
//!   for starvation, framing and equivalence tests
//! - **ThreadedProducer** - writes from a background thread, backing off while the ring is full
//! - **RandomRecords** - seeded `SkbMeta` generator with a reference checksum
//! - **OverwriteAfterRelease** - strategy wrapper that refills each slot as soon as it is released

pub mod overwrite;
pub mod random;
pub mod scripted;
pub mod threaded;

pub use overwrite::OverwriteAfterRelease;
pub use random::{ checksum_of, RandomRecords };
pub use scripted::{ MalformedProducer, SequenceProducer, ShortProducer };
pub use threaded::ThreadedProducer;
