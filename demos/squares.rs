//! Square a stream of generated numbers through a rate-limited worker pool.
//!
//! A source emits 1..=10, a pipe of three workers squares each value at no
//! more than 5 ops/sec, and a sink prints whatever arrives. With more than
//! one worker the printed order varies run to run; the set of values does
//! not.
//!
//! Usage: cargo run --example squares

use conveyor::{Config, Emitter, Pipe, Sink, Source};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // At most ten queued jobs, three workers, five jobs per second
    let cfg = Config::new(10, 3, 5, 5);

    let source = Source::new(cfg, |out: &Emitter<u64>| {
        for i in 1..=10 {
            out.emit(i);
        }
    })?;

    let pipe = Pipe::new(cfg, |x: u64| {
        // Uneven latency, so completion order differs from input order
        std::thread::sleep(Duration::from_millis((x % 4) * 25));
        Ok(x * x)
    })?;
    let metrics = pipe.metrics();

    let sink = Sink::new(cfg, |x: u64| {
        println!("{x}");
        Ok(())
    })?;

    let done = sink.receive(pipe.process(source.generate()));
    done.wait()?;

    println!("\n{}", metrics.snapshot().format());
    Ok(())
}
