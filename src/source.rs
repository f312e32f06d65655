use crossbeam::channel::{bounded, Receiver, Sender};
use std::thread;

use crate::config::Config;
use crate::error::Result;

/// Feeds payloads into the head of a pipeline.
///
/// A plain closure works too: any `FnMut(&Emitter<T>)` is a generator.
pub trait Generator<T>: Send + 'static {
    /// Push payloads into `out` until the stream is exhausted
    fn generate(&mut self, out: &Emitter<T>);
}

impl<T, F> Generator<T> for F
where
    F: FnMut(&Emitter<T>) + Send + 'static,
{
    fn generate(&mut self, out: &Emitter<T>) {
        self(out)
    }
}

/// Write half of a source's output queue, handed to the generator.
pub struct Emitter<T> {
    tx: Sender<T>,
}

impl<T> Emitter<T> {
    /// Push one payload downstream, blocking while the queue is full.
    ///
    /// Returns `false` once every downstream reader is gone; a generator
    /// should stop emitting at that point.
    pub fn emit(&self, payload: T) -> bool {
        self.tx.send(payload).is_ok()
    }
}

/// Producer stage: a single generator task feeding a bounded output queue.
///
/// The queue's capacity is `cfg.output_buffer`, so a fast generator is
/// throttled to the pace of downstream consumption by its own blocking
/// pushes.
pub struct Source<T> {
    cfg: Config,
    generator: Box<dyn Generator<T>>,
}

impl<T: Send + 'static> Source<T> {
    /// Create a source running `generator` under `cfg`
    pub fn new(cfg: Config, generator: impl Generator<T>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            generator: Box::new(generator),
        })
    }

    /// Start the generator task and hand back the read side of its output
    /// queue.
    ///
    /// Returns immediately. The queue closes when the generator returns,
    /// which is the end-of-stream signal every downstream stage watches for.
    pub fn generate(self) -> Receiver<T> {
        let (tx, rx) = bounded(self.cfg.output_buffer);
        let mut generator = self.generator;

        thread::spawn(move || {
            let out = Emitter { tx };
            generator.generate(&out);
            log::debug!("source: generator finished, closing output");
            // dropping the emitter closes the queue
        });

        rx
    }
}
