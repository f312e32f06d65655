use conveyor::{Config, Emitter, Pacer, Pipe, Pipeline, RateLimiter, Sink, Source};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn square(x: u64) -> conveyor::Result<u64> {
    Ok(x * x)
}

/// The canonical scenario: 10 generated integers squared by a pool of 3
/// workers at 5 ops/sec, collected into a set by a sink.
#[test]
fn test_end_to_end_squares() {
    init_logs();
    let cfg = Config::new(10, 3, 5, 5);

    let source = Source::new(cfg, |out: &Emitter<u64>| {
        for i in 1..=10 {
            out.emit(i);
        }
    })
    .expect("source build failed");

    let pipe = Pipe::new(cfg, square).expect("pipe build failed");

    let seen = Arc::new(Mutex::new(HashSet::new()));
    let sink_seen = Arc::clone(&seen);
    let sink = Sink::new(cfg, move |x: u64| {
        sink_seen.lock().unwrap().insert(x);
        Ok(())
    })
    .expect("sink build failed");

    let done = sink.receive(pipe.process(source.generate()));
    done.wait_timeout(Duration::from_secs(30)).expect("wait failed");

    let expected: HashSet<u64> = [1, 4, 9, 16, 25, 36, 49, 64, 81, 100].into_iter().collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

/// Every non-failing payload arrives downstream exactly once.
#[test]
fn test_sequence_completeness() {
    let cfg = Config::new(16, 4, 0, 16);

    let source = Source::new(cfg, |out: &Emitter<u64>| {
        for i in 1..=100 {
            out.emit(i);
        }
    })
    .unwrap();
    let pipe = Pipe::new(cfg, |x: u64| Ok(x)).unwrap();

    let out: Vec<u64> = pipe.process(source.generate()).iter().collect();

    assert_eq!(out.len(), 100, "no duplication, no loss");
    let distinct: HashSet<u64> = out.iter().copied().collect();
    assert_eq!(distinct, (1..=100).collect::<HashSet<u64>>());
}

/// With capacity-1 queues and a slow worker, the producer stalls after a
/// handful of emissions instead of running ahead.
#[test]
fn test_backpressure_stalls_producer() {
    init_logs();
    let src_cfg = Config::new(1, 1, 0, 1);
    let pipe_cfg = Config::new(1, 1, 0, 1);

    let emitted = Arc::new(AtomicUsize::new(0));
    let gen_emitted = Arc::clone(&emitted);
    let source = Source::new(src_cfg, move |out: &Emitter<u64>| {
        for i in 1..=100 {
            if !out.emit(i) {
                break;
            }
            gen_emitted.fetch_add(1, Ordering::Relaxed);
        }
    })
    .unwrap();

    let pipe = Pipe::new(pipe_cfg, |x: u64| {
        std::thread::sleep(Duration::from_millis(50));
        Ok(x)
    })
    .unwrap();

    let out = pipe.process(source.generate());

    // Nobody consumes the output yet: the whole chain should fill up and
    // stall the generator well short of 100 items.
    std::thread::sleep(Duration::from_millis(300));
    let stalled_at = emitted.load(Ordering::Relaxed);
    assert!(
        stalled_at < 15,
        "producer ran ahead of backpressure: {stalled_at} emitted"
    );

    // Draining the output releases the stall and everything flows through.
    let collected: Vec<u64> = out.iter().collect();
    assert_eq!(collected.len(), 100);
    assert_eq!(emitted.load(Ordering::Relaxed), 100);
}

/// Aggregate throughput never exceeds the configured ceiling, regardless of
/// how many workers share the pool.
#[test]
fn test_rate_limit_ceiling() {
    let src_cfg = Config::new(4, 1, 0, 20);
    let pipe_cfg = Config::new(20, 3, 5, 20);

    let source = Source::new(src_cfg, |out: &Emitter<u64>| {
        for i in 1..=20 {
            out.emit(i);
        }
    })
    .unwrap();
    let pipe = Pipe::new(pipe_cfg, |x: u64| Ok(x)).unwrap();

    let start = Instant::now();
    let out: Vec<u64> = pipe.process(source.generate()).iter().collect();
    let elapsed = start.elapsed();

    assert_eq!(out.len(), 20);
    // 20 items at 5/sec cannot drain in under ~3 seconds
    assert!(
        elapsed >= Duration::from_secs(3),
        "drained 20 items at 5/sec in {elapsed:?}"
    );
}

/// The completion signal resolves only after every payload has been handled.
#[test]
fn test_completion_fires_after_drain() {
    let cfg = Config::new(8, 3, 0, 8);

    let source = Source::new(cfg, |out: &Emitter<u64>| {
        for i in 1..=30 {
            out.emit(i);
        }
    })
    .unwrap();

    let handled = Arc::new(AtomicUsize::new(0));
    let sink_handled = Arc::clone(&handled);
    let sink = Sink::new(cfg, move |_: u64| {
        std::thread::sleep(Duration::from_millis(20));
        sink_handled.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })
    .unwrap();

    let done = sink.receive(source.generate());
    done.wait_timeout(Duration::from_secs(30)).expect("wait failed");

    assert_eq!(handled.load(Ordering::Relaxed), 30);
}

/// A multi-worker stage delivers the right set of outputs; their order is
/// deliberately not asserted.
#[test]
fn test_pool_output_is_set_equal() {
    let cfg = Config::new(10, 3, 0, 10);

    let source = Source::new(cfg, |out: &Emitter<u64>| {
        for i in 1..=10 {
            out.emit(i);
        }
    })
    .unwrap();
    let pipe = Pipe::new(cfg, |x: u64| {
        // Variable per-item latency shuffles completion order
        std::thread::sleep(Duration::from_millis((x % 4) * 10));
        Ok(x)
    })
    .unwrap();

    let out: Vec<u64> = pipe.process(source.generate()).iter().collect();

    let distinct: HashSet<u64> = out.iter().copied().collect();
    assert_eq!(distinct, (1..=10).collect::<HashSet<u64>>());
    assert_eq!(out.len(), 10);
}

/// A single-worker stage is a degenerate pool and preserves input order even
/// under variable latency.
#[test]
fn test_single_worker_preserves_order() {
    let cfg = Config::new(10, 1, 0, 10);

    let source = Source::new(cfg, |out: &Emitter<u64>| {
        for i in 1..=10 {
            out.emit(i);
        }
    })
    .unwrap();
    let pipe = Pipe::new(cfg, |x: u64| {
        std::thread::sleep(Duration::from_millis((x % 3) * 10));
        Ok(x)
    })
    .unwrap();

    let out: Vec<u64> = pipe.process(source.generate()).iter().collect();
    assert_eq!(out, (1..=10).collect::<Vec<u64>>());
}

/// A limiter injected into several stages caps their combined throughput.
#[test]
fn test_shared_limiter_spans_stages() {
    let cfg = Config::new(10, 2, 0, 10);
    let limiter: Arc<dyn RateLimiter> = Arc::new(Pacer::new(50));
    let handled = Arc::new(AtomicUsize::new(0));
    let sink_handled = Arc::clone(&handled);

    let start = Instant::now();

    let source = Source::new(cfg, |out: &Emitter<u64>| {
        for i in 1..=10 {
            out.emit(i);
        }
    })
    .unwrap();
    let stream = Pipeline::from_receiver(source.generate())
        .pipe_with_limiter(cfg, |x: u64| Ok(x + 1), Arc::clone(&limiter))
        .unwrap()
        .into_receiver();
    let sink = Sink::with_limiter(
        cfg,
        move |_: u64| {
            sink_handled.fetch_add(1, Ordering::Relaxed);
            Ok(())
        },
        limiter,
    )
    .unwrap();

    sink.receive(stream)
        .wait_timeout(Duration::from_secs(30))
        .expect("wait failed");
    let elapsed = start.elapsed();

    assert_eq!(handled.load(Ordering::Relaxed), 10);
    // 20 admissions across both stages at 50/sec take at least ~380ms
    assert!(
        elapsed >= Duration::from_millis(300),
        "shared ceiling not enforced: {elapsed:?}"
    );
}

/// Failures in the middle of the stream are dropped without aborting the
/// stage; everything else is delivered.
#[test]
fn test_per_item_failure_is_isolated() {
    init_logs();
    let cfg = Config::new(8, 3, 0, 8);

    let source = Source::new(cfg, |out: &Emitter<u64>| {
        for i in 1..=20 {
            out.emit(i);
        }
    })
    .unwrap();
    let pipe = Pipe::new(cfg, |x: u64| {
        if x % 5 == 0 {
            Err(conveyor::PipelineError::Process(format!(
                "multiple of five: {x}"
            )))
        } else {
            Ok(x)
        }
    })
    .unwrap();
    let metrics = pipe.metrics();

    let out: Vec<u64> = pipe.process(source.generate()).iter().collect();

    let distinct: HashSet<u64> = out.iter().copied().collect();
    let expected: HashSet<u64> = (1..=20).filter(|x| x % 5 != 0).collect();
    assert_eq!(distinct, expected);
    assert_eq!(metrics.total_failed(), 4);
}

/// The fluent assembly wires the same stages the manual API does.
#[test]
fn test_fluent_pipeline_end_to_end() {
    let cfg = Config::new(8, 2, 0, 8);

    let seen = Arc::new(Mutex::new(HashSet::new()));
    let sink_seen = Arc::clone(&seen);

    let done = Pipeline::source(cfg, |out: &Emitter<u64>| {
        for i in 1..=10 {
            out.emit(i);
        }
    })
    .expect("source build failed")
    .pipe(cfg, square)
    .expect("pipe build failed")
    .sink(cfg, move |x: u64| {
        sink_seen.lock().unwrap().insert(x);
        Ok(())
    })
    .expect("sink build failed");

    done.wait_timeout(Duration::from_secs(30)).expect("wait failed");

    let expected: HashSet<u64> = (1..=10).map(|x| x * x).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}
