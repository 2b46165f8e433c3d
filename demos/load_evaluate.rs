use recsplit::{ByteOrder, DefaultSettings, RecSplitError, RecSplitEvaluator, StringHash};
use std::time::Instant;

#[path = "../tests/common/mod.rs"]
mod common;

const N_KEYS: usize = 200_000;
const GEN_SEED: u64 = 42;
const AVERAGE_BUCKET_SIZE: u16 = 100;

fn main() -> Result<(), RecSplitError> {
    println!("--- recsplit load and evaluate ---");
    println!("n = {N_KEYS}");

    // 1) Build an index with the test writer and serialize it
    let keys = common::random_strings(N_KEYS, GEN_SEED);
    let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let settings = DefaultSettings::default();
    let t0 = Instant::now();
    let bytes = common::build_index(&refs, &StringHash, &settings, AVERAGE_BUCKET_SIZE)
        .encode(ByteOrder::Little);
    let build_s = t0.elapsed().as_secs_f64();
    println!(
        "build:  {:>8.3} s   ({} bytes, {:.2} bits/key)",
        build_s,
        bytes.len(),
        bytes.len() as f64 * 8.0 / N_KEYS as f64
    );

    // 2) Load
    let t1 = Instant::now();
    let ev: RecSplitEvaluator<str, StringHash> =
        RecSplitEvaluator::with_settings(&bytes, ByteOrder::Little, StringHash, settings)?;
    println!("load:   {:>8.3} s   ({} buckets)", t1.elapsed().as_secs_f64(), ev.bucket_count());

    // 3) Evaluate every key
    let t2 = Instant::now();
    let mut acc = 0usize;
    for k in &refs {
        acc ^= ev.evaluate(k);
    }
    let eval_s = t2.elapsed().as_secs_f64();
    println!(
        "eval:   {:>8.3} s   ({:.1} M keys/s)  acc={acc}",
        eval_s,
        N_KEYS as f64 / eval_s / 1e6
    );

    // 4) Check the slots form a permutation
    ev.verify(refs.iter().copied())?;
    println!("verify: ok");
    Ok(())
}
