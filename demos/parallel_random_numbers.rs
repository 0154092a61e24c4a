use genbod::random::{CounterEngine, Squares3};
use rand::distributions::Standard;
use rand::Rng;
use rand_pcg::Pcg64;
use rayon::prelude::*;
use std::time::Instant;

fn main() {
    // The number of batches
    const BATCHES: usize = 4;
    // The number of random numbers per batch
    const NUMBERS: usize = 10_000;

    // A conventional engine has to step through the whole stream to reach a position, so every
    // parallel task skips `batch * NUMBERS + number` values.
    let rng = Pcg64::new(0xcafe_f00d_d15e_a5e5, 0x0a02_bdbf_7bb3_c0a7_ac28_fa16_a64a_bf96);
    let sequential: Vec<f64> = rng
        .clone()
        .sample_iter(&Standard)
        .take(BATCHES * NUMBERS)
        .collect();

    let start = Instant::now();
    let skipped: Vec<f64> = (0..BATCHES)
        .flat_map(|batch| {
            (0..NUMBERS)
                .into_par_iter()
                .map(|number| {
                    rng.clone()
                        .sample_iter(&Standard)
                        .nth(batch * NUMBERS + number)
                        .unwrap_or_default()
                })
                .collect::<Vec<f64>>()
        })
        .collect();
    println!("Pcg64 with skipping:       {:?}", start.elapsed());
    assert_eq!(sequential, skipped);

    // A counter-based engine jumps to any position in constant time.
    let engine = Squares3::with_seed(0xcafe_f00d);
    let mut sequential_engine = engine.clone();
    let sequential: Vec<f64> = (0..BATCHES * NUMBERS)
        .map(|_| sequential_engine.uniform_f64())
        .collect();

    let start = Instant::now();
    let discarded: Vec<f64> = (0..BATCHES)
        .flat_map(|batch| {
            (0..NUMBERS)
                .into_par_iter()
                .map(|number| {
                    let mut engine = engine.clone();
                    engine.discard(((batch * NUMBERS + number) as u64) * Squares3::WORDS_PER_F64);
                    engine.uniform_f64()
                })
                .collect::<Vec<f64>>()
        })
        .collect();
    println!("Squares3 with discarding:  {:?}", start.elapsed());
    assert_eq!(sequential, discarded);
}
