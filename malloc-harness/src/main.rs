//! A host binary that replays an allocation trace against `malloc-core`
//! and reports throughput and utilization, the two axes spec.md measures
//! the allocator on.
//!
//! Usage: `malloc-harness <trace-file> [heap-capacity-bytes]`

mod trace;

use std::collections::HashMap;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::time::Instant;

use malloc_core::Allocator;
use malloc_memsim::{DEFAULT_CAPACITY, MemSim};
use trace::Op;

#[allow(clippy::cast_precision_loss)]
fn main() {
    let mut args = std::env::args().skip(1);
    let Some(trace_path) = args.next() else {
        eprintln!("usage: malloc-harness <trace-file> [heap-capacity-bytes]");
        std::process::exit(2);
    };
    let capacity = args
        .next()
        .map_or(DEFAULT_CAPACITY, |s| s.parse().unwrap_or(DEFAULT_CAPACITY));
    let verify = args.any(|a| a == "--check");

    let ops = match trace::load(&PathBuf::from(&trace_path)) {
        Ok(ops) => ops,
        Err(err) => {
            eprintln!("malloc-harness: {err}");
            std::process::exit(1);
        }
    };

    let mut alloc = Allocator::new(MemSim::with_capacity(capacity));
    if alloc.init().is_err() {
        eprintln!("malloc-harness: failed to initialize a {capacity}-byte arena");
        std::process::exit(1);
    }

    let mut live: HashMap<String, (NonNull<u8>, usize)> = HashMap::new();
    let mut peak_extent = 0usize;
    let mut peak_payload = 0usize;
    let mut live_payload = 0usize;
    let mut ops_run = 0usize;
    let mut failures = 0usize;

    let started = Instant::now();
    for op in &ops {
        match op {
            Op::Alloc { id, size } => {
                if let Some(p) = alloc.malloc(*size) {
                    live.insert(id.clone(), (p, *size));
                    live_payload += size;
                } else {
                    failures += 1;
                }
            }
            Op::Realloc { id, size } => {
                if let Some((old, old_size)) = live.remove(id) {
                    live_payload -= old_size;
                    // SAFETY: `old` was returned by a prior `malloc`/`realloc`
                    // on this allocator and has not been freed since.
                    match unsafe { alloc.realloc(Some(old), *size) } {
                        Some(p) => {
                            live.insert(id.clone(), (p, *size));
                            live_payload += size;
                        }
                        None => failures += 1,
                    }
                } else {
                    failures += 1;
                }
            }
            Op::Free { id } => {
                if let Some((p, size)) = live.remove(id) {
                    // SAFETY: `p` was returned by a prior `malloc`/`realloc`
                    // on this allocator and has not been freed since.
                    unsafe { alloc.free(Some(p)) };
                    live_payload -= size;
                } else {
                    failures += 1;
                }
            }
        }
        ops_run += 1;
        peak_extent = peak_extent.max(alloc.heap_extent());
        peak_payload = peak_payload.max(live_payload);

        if verify {
            if let Err(err) = alloc.check_heap() {
                eprintln!("malloc-harness: invariant violation after op {ops_run}: {err}");
                std::process::exit(1);
            }
        }
    }
    let elapsed = started.elapsed();

    let throughput = ops_run as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    let utilization = if peak_extent == 0 {
        0.0
    } else {
        peak_payload as f64 / peak_extent as f64
    };

    println!("ops:         {ops_run}");
    println!("failures:    {failures}");
    println!("elapsed:     {elapsed:?}");
    println!("throughput:  {throughput:.1} ops/sec");
    println!("peak extent: {peak_extent} bytes");
    println!("peak payload:{peak_payload} bytes");
    println!("utilization: {utilization:.4}");
}
