use std::marker::PhantomData;

use super::{ ConsumeStrategy, Step, StepError };
use crate::layout::Record;
use crate::ringbuf::RingReader;

/// Folds each sample in place through a borrowed view, then releases the slot.
pub struct ViewStrategy<R: Record> {
    _record: PhantomData<R>,
}

impl<R: Record> ViewStrategy<R> {
    pub fn new() -> Self {
        Self { _record: PhantomData }
    }
}

impl<R: Record> Default for ViewStrategy<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> ConsumeStrategy for ViewStrategy<R> {
    fn name(&self) -> &'static str {
        "view"
    }

    #[inline]
    fn read_one(&mut self, reader: &mut RingReader) -> Result<Step, StepError> {
        let view = reader.peek()?;
        let fold = view.record::<R>().map(|record| record.fold());
        view.release();

        Ok(Step {
            fold: fold?,
            more_ready: reader.ready(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SkbMeta;
    use crate::ringbuf::{ page_size, RingBuf, RingConfig };

    #[test]
    fn test_short_sample_is_released_before_error() {
        let ring = RingBuf::new(RingConfig::new(page_size()).unwrap()).unwrap();
        let mut producer = ring.producer().unwrap();
        let mut reader = ring.reader().unwrap();

        producer.write(&[0u8; 56]).unwrap();
        let err = ViewStrategy::<SkbMeta>::new().read_one(&mut reader).unwrap_err();
        assert!(matches!(err, StepError::Layout(_)));
        assert_eq!(ring.used_bytes(), 0);
    }

    #[test]
    fn test_fold_matches_copy() {
        let ring = RingBuf::new(RingConfig::new(page_size()).unwrap()).unwrap();
        let mut producer = ring.producer().unwrap();
        let mut reader = ring.reader().unwrap();

        let meta = SkbMeta { address: 0xffff_8880_0000_0000, len: 128, protocol: 8, ..Default::default() };
        producer.write(bytemuck::bytes_of(&meta)).unwrap();

        let step = ViewStrategy::<SkbMeta>::new().read_one(&mut reader).unwrap();
        assert_eq!(step.fold, meta.fold());
        assert!(!step.more_ready);
    }
}
