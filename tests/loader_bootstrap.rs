use bdui::loader::registry::{LoaderRegistry, StrictJsonLoader};
use bdui::register_loaders;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_registration_installs_exactly_once() {
    const CALLERS: usize = 8;

    let registry = Arc::new(LoaderRegistry::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let runs = Arc::clone(&runs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.register_with(|| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    // Hold the in-flight window open so the other callers
                    // actually have to wait on it.
                    thread::sleep(Duration::from_millis(50));
                    Ok(vec![StrictJsonLoader::install()?])
                })
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(registry.is_registered());
    registry.load_value(r#"{"ok": true}"#).unwrap();
}

#[test]
fn global_bootstrap_is_safe_from_many_threads() {
    let handles: Vec<_> = (0..4).map(|_| thread::spawn(register_loaders)).collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    // Repeat calls after settling are no-ops.
    register_loaders().unwrap();
}
