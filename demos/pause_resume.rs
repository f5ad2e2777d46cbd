//! Pause, resume, cancel and deadline walkthrough
//!
//! Demonstrates a driver loop over two pools, pausing it mid-flight, resuming
//! it and finally letting a deadline cancel it.
//!
//! Run with: RUST_LOG=debug cargo run --example pause_resume

use rust_task_control::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Rust Task Control - Pause/Resume Example ===\n");

    let config = ControllerConfig::new(&[2, 3]).with_name("demo");
    let controller = Controller::with_config(config)?;
    println!(
        "1. Controller '{}' with {} pools, capacities {:?}",
        controller.name(),
        controller.pool_count(),
        (0..controller.pool_count())
            .filter_map(|p| controller.capacity(p))
            .collect::<Vec<_>>()
    );

    let steps = Arc::new(AtomicUsize::new(0));

    // Drive tasks in the background until the controller is cancelled
    let driver = {
        let controller = controller.clone();
        let steps = Arc::clone(&steps);
        thread::spawn(move || {
            controller.run(move |task| {
                for _ in 0..10 {
                    if task.check_continue().is_err() {
                        return;
                    }
                    steps.fetch_add(1, Ordering::Relaxed);
                    thread::sleep(Duration::from_millis(20));
                }
            })
        })
    };

    thread::sleep(Duration::from_millis(200));
    println!("\n2. Running: {} steps so far", steps.load(Ordering::Relaxed));

    controller.pause();
    thread::sleep(Duration::from_millis(50));
    let frozen = steps.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(200));
    println!(
        "\n3. Paused: {} steps before, {} after 200ms",
        frozen,
        steps.load(Ordering::Relaxed)
    );
    print_stats(&controller);

    controller.resume();
    thread::sleep(Duration::from_millis(200));
    println!(
        "\n4. Resumed: {} steps so far",
        steps.load(Ordering::Relaxed)
    );

    println!("\n5. Arming a 150ms deadline");
    let armed = Instant::now();
    controller.set_timeout(Duration::from_millis(150))?;

    let outcome = driver.join().expect("Driver thread panicked");
    println!(
        "   Driver stopped after {:?}: {:?}",
        armed.elapsed(),
        outcome
    );
    println!("   Cause: {:?}", controller.cause());
    print_stats(&controller);

    controller.close();
    println!("\n=== Example completed successfully ===");
    Ok(())
}

fn print_stats(controller: &Controller) {
    let stats = controller.stats();
    println!("   Outstanding: {}", stats.outstanding);
    for (i, pool) in stats.pools.iter().enumerate() {
        println!(
            "   Pool {}: capacity {}, outstanding {}, available {}, drained {}",
            i, pool.capacity, pool.outstanding, pool.available, pool.drained
        );
    }
}
