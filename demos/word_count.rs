//! Word frequency counter pipeline
//!
//! Reads lines from stdin, splits and normalizes words in a transform
//! stage, counts frequencies in the sink, and prints the top-N words at the
//! end.
//!
//! Usage: cargo run --example word_count --release
//!        (Then type lines of text and press Ctrl-D to finish)

use conveyor::{Config, Emitter, Pipe, Sink, Source};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, BufRead};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Word Frequency Counter Pipeline");
    println!("================================");
    println!("Enter lines of text (Ctrl-D to finish):");
    println!();

    let cfg = Config::new(64, 4, 0, 64);

    // Source: one line per payload, straight off stdin
    let source = Source::new(cfg, |out: &Emitter<String>| {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if !out.emit(line) {
                break;
            }
        }
    })?;

    // Pipe: split a line into cleaned, lowercased words
    let pipe = Pipe::new(cfg, |line: String| {
        let words: Vec<String> = line
            .split_whitespace()
            .map(|w| {
                w.chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
                    .to_lowercase()
            })
            .filter(|w| w.len() > 2)
            .collect();
        Ok(words)
    })?;

    // Sink: merge word counts into a shared map
    let counts = Arc::new(Mutex::new(HashMap::<String, usize>::new()));
    let sink_counts = Arc::clone(&counts);
    let sink = Sink::new(cfg, move |words: Vec<String>| {
        let mut counts = sink_counts.lock();
        for word in words {
            *counts.entry(word).or_insert(0) += 1;
        }
        Ok(())
    })?;

    let done = sink.receive(pipe.process(source.generate()));
    done.wait()?;

    let counts = counts.lock();
    let mut items: Vec<_> = counts.iter().collect();
    items.sort_by(|a, b| b.1.cmp(a.1));

    println!("\n=== Top 10 Words ({} distinct) ===", items.len());
    for (i, (word, count)) in items.iter().take(10).enumerate() {
        println!("{:2}. {} ({})", i + 1, word, count);
    }

    Ok(())
}
