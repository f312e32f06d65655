use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::config::Config;
use crate::error::Result;
use crate::job::Job;
use crate::limit::{Pacer, RateLimiter};
use crate::metrics::StageMetrics;

/// Transforms one payload into another.
///
/// Shared by every worker in a pipe's pool, so implementations must be
/// `Sync`. A plain closure works too: any `Fn(I) -> Result<O>` is a
/// processor.
pub trait Processor<I, O>: Send + Sync + 'static {
    /// Transform a payload.
    ///
    /// An error drops the item; the stage keeps processing the rest.
    fn process(&self, input: I) -> Result<O>;
}

impl<I, O, F> Processor<I, O> for F
where
    F: Fn(I) -> Result<O> + Send + Sync + 'static,
{
    fn process(&self, input: I) -> Result<O> {
        self(input)
    }
}

/// Transform stage: a dispatcher feeding a rate-limited worker pool.
///
/// Payloads read from the input queue are stamped into [`Job`]s and fanned
/// out to `cfg.max_workers` workers; results land on a bounded output queue.
/// Both the internal job queue and the output queue push with blocking
/// semantics, so a slow pool propagates backpressure all the way upstream.
pub struct Pipe<I, O> {
    cfg: Config,
    limiter: Arc<dyn RateLimiter>,
    processor: Arc<dyn Processor<I, O>>,
    metrics: StageMetrics,
}

impl<I: Send + 'static, O: Send + 'static> Pipe<I, O> {
    /// Create a pipe with a stage-private [`Pacer`] built from
    /// `cfg.rate_limit`
    pub fn new(cfg: Config, processor: impl Processor<I, O>) -> Result<Self> {
        let limiter = Arc::new(Pacer::new(cfg.rate_limit));
        Self::with_limiter(cfg, processor, limiter)
    }

    /// Create a pipe that borrows `limiter`, e.g. to share one ceiling
    /// across several stages
    pub fn with_limiter(
        cfg: Config,
        processor: impl Processor<I, O>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            limiter,
            processor: Arc::new(processor),
            metrics: StageMetrics::new(),
        })
    }

    /// Handle on the stage's counters, usable while the stage runs
    pub fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    /// Start the stage and hand back the read side of its output queue.
    ///
    /// Returns immediately. A dispatcher drains `input` until it is closed
    /// and empty, stamping each payload with a sequence number and queuing it
    /// for the pool. Each worker acquires one rate-limiter token per job
    /// before invoking the processor. Once the input is exhausted and every
    /// worker has exited, the output queue closes.
    pub fn process(self, input: Receiver<I>) -> Receiver<O> {
        let (out_tx, out_rx) = bounded(self.cfg.output_buffer);
        let (job_tx, job_rx) = bounded(self.cfg.max_jobs);

        let Pipe {
            cfg,
            limiter,
            processor,
            metrics,
        } = self;

        thread::spawn(move || {
            let mut workers = Vec::with_capacity(cfg.max_workers);
            for _ in 0..cfg.max_workers {
                let job_rx = job_rx.clone();
                let out_tx = out_tx.clone();
                let processor = Arc::clone(&processor);
                let limiter = Arc::clone(&limiter);
                let metrics = metrics.clone();
                workers.push(thread::spawn(move || {
                    work(job_rx, out_tx, processor, limiter, metrics)
                }));
            }
            // only the workers may hold the job receiver and output sender
            drop(job_rx);
            drop(out_tx);

            dispatch(input, job_tx);
            for worker in workers {
                let _ = worker.join();
            }
            // the last worker dropped its sender, closing the output queue
        });

        out_rx
    }
}

/// Drain the input queue, stamping payloads into jobs in arrival order.
///
/// Blocks on a full job queue: that stall backs up through the input queue
/// to the upstream stage. Dropping the sender on return closes the job
/// queue, which is how workers learn the stage is draining.
fn dispatch<I>(input: Receiver<I>, jobs: Sender<Job<I>>) {
    let mut seq = 0u64;
    for payload in input.iter() {
        seq += 1;
        if jobs.send(Job::new(seq, payload)).is_err() {
            // every worker is gone; nothing left to feed
            break;
        }
    }
}

fn work<I: 'static, O: 'static>(
    jobs: Receiver<Job<I>>,
    out: Sender<O>,
    processor: Arc<dyn Processor<I, O>>,
    limiter: Arc<dyn RateLimiter>,
    metrics: StageMetrics,
) {
    for job in jobs.iter() {
        limiter.acquire();
        let start = Instant::now();
        match processor.process(job.payload) {
            Ok(output) => {
                metrics.record_latency(start.elapsed().as_nanos() as u64);
                metrics.record_processed();
                if out.send(output).is_err() {
                    log::debug!("pipe: output reader gone, worker stopping");
                    break;
                }
            }
            Err(err) => {
                metrics.record_failed();
                log::warn!("pipe: dropping job #{}: {}", job.seq, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn feed<T: Send + 'static>(items: Vec<T>) -> Receiver<T> {
        let (tx, rx) = bounded(items.len());
        for item in items {
            tx.send(item).unwrap();
        }
        rx
    }

    fn square(x: i64) -> Result<i64> {
        Ok(x * x)
    }

    #[test]
    fn test_single_worker_preserves_order() {
        let cfg = Config::new(4, 1, 0, 4);
        let pipe = Pipe::new(cfg, square).unwrap();

        let out: Vec<i64> = pipe.process(feed(vec![1, 2, 3, 4, 5])).iter().collect();
        assert_eq!(out, vec![1, 4, 9, 16, 25]);
    }

    #[test]
    fn test_failed_items_are_dropped() {
        let cfg = Config::new(4, 2, 0, 8);
        let pipe = Pipe::new(cfg, |x: i64| {
            if x % 2 == 0 {
                Err(PipelineError::Process(format!("even input {x}")))
            } else {
                Ok(x * 10)
            }
        })
        .unwrap();
        let metrics = pipe.metrics();

        let mut out: Vec<i64> = pipe
            .process(feed(vec![1, 2, 3, 4, 5, 6]))
            .iter()
            .collect();
        out.sort_unstable();

        assert_eq!(out, vec![10, 30, 50]);
        assert_eq!(metrics.total_processed(), 3);
        assert_eq!(metrics.total_failed(), 3);
    }

    #[test]
    fn test_pool_drains_everything() {
        let cfg = Config::new(8, 3, 0, 16);
        let pipe = Pipe::new(cfg, square).unwrap();

        let mut out: Vec<i64> = pipe.process(feed((1..=50).collect())).iter().collect();
        out.sort_unstable();

        let expected: Vec<i64> = (1..=50).map(|x| x * x).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = Config::new(0, 1, 0, 1);
        assert!(Pipe::new(cfg, square).is_err());
    }
}
