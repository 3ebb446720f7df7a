//! Parse progress reporting
//!
//! Multi-megabyte boards take long enough to parse that a front end wants to
//! show progress. Both parser strategies report `(consumed, total)` byte
//! counts after every top-level node and once more when the document ends.

/// Receives progress updates from a running parse
pub trait ProgressObserver {
    fn on_progress(&mut self, consumed: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: FnMut(usize, usize),
{
    fn on_progress(&mut self, consumed: usize, total: usize) {
        self(consumed, total)
    }
}

/// Optional observer plus the total byte count it is reported against
pub(crate) struct Progress<'o> {
    observer: Option<&'o mut dyn ProgressObserver>,
    total: usize,
}

impl<'o> Progress<'o> {
    pub(crate) fn new(observer: Option<&'o mut dyn ProgressObserver>, total: usize) -> Self {
        Self { observer, total }
    }

    pub(crate) fn report(&mut self, consumed: usize) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_progress(consumed.min(self.total), self.total);
        }
    }

    pub(crate) fn finish(&mut self) {
        let total = self.total;
        self.report(total);
    }
}
