use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::job::Job;
use crate::limit::{Pacer, RateLimiter};
use crate::metrics::StageMetrics;

/// Terminal callback applied to every payload reaching the end of a
/// pipeline.
///
/// A plain closure works too: any `Fn(T) -> Result<()>` is a handler.
pub trait Handler<T>: Send + Sync + 'static {
    /// Consume a payload.
    ///
    /// An error drops the item; the stage keeps draining the rest.
    fn handle(&self, payload: T) -> Result<()>;
}

impl<T, F> Handler<T> for F
where
    F: Fn(T) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, payload: T) -> Result<()> {
        self(payload)
    }
}

/// One-shot signal resolved after a sink has drained its input.
///
/// Both wait operations consume the handle, so a completion can only ever be
/// observed once.
pub struct Completion {
    rx: Receiver<()>,
}

impl Completion {
    /// Block until the sink has processed every payload
    pub fn wait(self) -> Result<()> {
        self.rx.recv().map_err(|_| PipelineError::Disconnected)
    }

    /// Like [`wait`](Self::wait), but give up after `timeout`
    pub fn wait_timeout(self, timeout: Duration) -> Result<()> {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(PipelineError::WaitTimeout),
            Err(RecvTimeoutError::Disconnected) => Err(PipelineError::Disconnected),
        }
    }
}

/// Consumer stage: the pipe's dispatcher/worker-pool shape without an
/// output queue.
///
/// Workers acquire a rate-limiter token per job, hand the payload to the
/// terminal handler, and discard any result. When the input is exhausted and
/// every worker has exited, the stage fires its [`Completion`] exactly once.
pub struct Sink<T> {
    cfg: Config,
    limiter: Arc<dyn RateLimiter>,
    handler: Arc<dyn Handler<T>>,
    metrics: StageMetrics,
}

impl<T: Send + 'static> Sink<T> {
    /// Create a sink with a stage-private [`Pacer`] built from
    /// `cfg.rate_limit`
    pub fn new(cfg: Config, handler: impl Handler<T>) -> Result<Self> {
        let limiter = Arc::new(Pacer::new(cfg.rate_limit));
        Self::with_limiter(cfg, handler, limiter)
    }

    /// Create a sink that borrows `limiter`, e.g. to share one ceiling
    /// across several stages
    pub fn with_limiter(
        cfg: Config,
        handler: impl Handler<T>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            limiter,
            handler: Arc::new(handler),
            metrics: StageMetrics::new(),
        })
    }

    /// Handle on the stage's counters, usable while the stage runs
    pub fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    /// Start draining `input` and hand back the completion signal.
    ///
    /// Returns immediately. The signal fires only after the input queue is
    /// closed and drained and all workers have joined.
    pub fn receive(self, input: Receiver<T>) -> Completion {
        let (done_tx, done_rx) = bounded(1);
        let (job_tx, job_rx) = bounded(self.cfg.max_jobs);

        let Sink {
            cfg,
            limiter,
            handler,
            metrics,
        } = self;

        thread::spawn(move || {
            let mut workers = Vec::with_capacity(cfg.max_workers);
            for _ in 0..cfg.max_workers {
                let job_rx = job_rx.clone();
                let handler = Arc::clone(&handler);
                let limiter = Arc::clone(&limiter);
                let metrics = metrics.clone();
                workers.push(thread::spawn(move || {
                    work(job_rx, handler, limiter, metrics)
                }));
            }
            drop(job_rx);

            dispatch(input, job_tx);
            for worker in workers {
                let _ = worker.join();
            }
            let _ = done_tx.send(());
        });

        Completion { rx: done_rx }
    }
}

/// Drain the input queue, stamping payloads into jobs in arrival order.
///
/// Same backpressure contract as the pipe's dispatcher: a full job queue
/// blocks the read side of the upstream output queue.
fn dispatch<T>(input: Receiver<T>, jobs: Sender<Job<T>>) {
    let mut seq = 0u64;
    for payload in input.iter() {
        seq += 1;
        if jobs.send(Job::new(seq, payload)).is_err() {
            break;
        }
    }
}

fn work<T: 'static>(
    jobs: Receiver<Job<T>>,
    handler: Arc<dyn Handler<T>>,
    limiter: Arc<dyn RateLimiter>,
    metrics: StageMetrics,
) {
    for job in jobs.iter() {
        limiter.acquire();
        let start = Instant::now();
        match handler.handle(job.payload) {
            Ok(()) => {
                metrics.record_latency(start.elapsed().as_nanos() as u64);
                metrics.record_processed();
            }
            Err(err) => {
                metrics.record_failed();
                log::warn!("sink: dropping job #{}: {}", job.seq, err);
            }
        }
    }
}
