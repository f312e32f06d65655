use crossbeam::channel::Receiver;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::limit::RateLimiter;
use crate::pipe::{Pipe, Processor};
use crate::sink::{Completion, Handler, Sink};
use crate::source::{Generator, Source};

/// Fluent assembly of a linear pipeline: one source, any number of pipes,
/// one sink.
///
/// Each link starts its stage immediately and carries the stream's payload
/// type, so a mismatched chain fails to compile.
///
/// ```ignore
/// let done = Pipeline::source(cfg, gen)?
///     .pipe(cfg, square)?
///     .sink(cfg, collect)?;
/// done.wait()?;
/// ```
pub struct Pipeline<T> {
    stream: Receiver<T>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Start a pipeline from a generator
    pub fn source(cfg: Config, generator: impl Generator<T>) -> Result<Self> {
        Ok(Self {
            stream: Source::new(cfg, generator)?.generate(),
        })
    }

    /// Wrap an existing queue, e.g. one produced by a manually wired stage
    pub fn from_receiver(stream: Receiver<T>) -> Self {
        Self { stream }
    }

    /// Append a transform stage
    pub fn pipe<O: Send + 'static>(
        self,
        cfg: Config,
        processor: impl Processor<T, O>,
    ) -> Result<Pipeline<O>> {
        Ok(Pipeline {
            stream: Pipe::new(cfg, processor)?.process(self.stream),
        })
    }

    /// Append a transform stage that shares `limiter` with other stages
    pub fn pipe_with_limiter<O: Send + 'static>(
        self,
        cfg: Config,
        processor: impl Processor<T, O>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Result<Pipeline<O>> {
        Ok(Pipeline {
            stream: Pipe::with_limiter(cfg, processor, limiter)?.process(self.stream),
        })
    }

    /// Terminate the chain with a sink and start draining
    pub fn sink(self, cfg: Config, handler: impl Handler<T>) -> Result<Completion> {
        Ok(Sink::new(cfg, handler)?.receive(self.stream))
    }

    /// Hand back the underlying queue for manual consumption
    pub fn into_receiver(self) -> Receiver<T> {
        self.stream
    }
}
