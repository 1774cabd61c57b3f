use std::marker::PhantomData;

use super::{ ConsumeStrategy, Step, StepError };
use crate::layout::Record;
use crate::ringbuf::{ RawRecord, RingReader };

/// Copies every sample into an owned scratch record before interpreting it.
pub struct CopyStrategy<R: Record> {
    scratch: RawRecord,
    _record: PhantomData<R>,
}

impl<R: Record> CopyStrategy<R> {
    pub fn new() -> Self {
        Self {
            scratch: RawRecord::with_capacity(std::mem::size_of::<R>()),
            _record: PhantomData,
        }
    }
}

impl<R: Record> Default for CopyStrategy<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> ConsumeStrategy for CopyStrategy<R> {
    fn name(&self) -> &'static str {
        "copy"
    }

    #[inline]
    fn read_one(&mut self, reader: &mut RingReader) -> Result<Step, StepError> {
        reader.read_into(&mut self.scratch)?;
        let record = R::read(self.scratch.as_bytes())?;
        Ok(Step {
            fold: record.fold(),
            more_ready: self.scratch.remaining() > 0 && reader.ready(),
        })
    }
}
