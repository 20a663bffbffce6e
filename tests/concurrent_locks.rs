use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::Result;
use serde_json::json;

use optlock::{MemoryStore, OptionKind, OptionLockController, OptionSpec, OverrideSet};

const THREADS: usize = 8;
const ROUNDS: usize = 200;

#[test]
fn concurrent_lock_unlock_never_leaks_overrides() -> Result<()> {
    let store = MemoryStore::new();
    for k in ["a", "b", "c", "d"] {
        store.declare(k, OptionSpec::new(OptionKind::Int, json!(0)))?;
    }
    let store = Arc::new(store);
    let baseline = store.snapshot();
    let ctl = Arc::new(OptionLockController::new(store.clone()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let ctl = ctl.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || -> Result<()> {
            barrier.wait();
            for r in 0..ROUNDS {
                // overlapping key sets between neighbouring threads
                let mut o = OverrideSet::new();
                o.insert(["a", "b", "c", "d"][t % 4].to_string(), json!(1 + t * ROUNDS + r));
                o.insert(["a", "b", "c", "d"][(t + 1) % 4].to_string(), json!(-1 - r as i64));
                ctl.lock(&o)?;

                // snapshot values must always be baseline values: an interleaved
                // read of another lock's override would show up here
                for v in ctl.status().saved.values() {
                    assert_eq!(v, &json!(0), "snapshot captured an overridden value");
                }
                if r % 3 == 0 {
                    ctl.unlock()?;
                }
            }
            Ok(())
        }));
    }
    for h in handles {
        h.join().expect("worker panicked")?;
    }

    ctl.unlock()?;
    assert!(!ctl.is_locked());
    assert_eq!(store.snapshot(), baseline);

    let m = ctl.metrics().snapshot();
    assert_eq!(m.locks_total, (THREADS * ROUNDS) as u64);
    assert_eq!(m.lock_failures, 0);
    Ok(())
}
