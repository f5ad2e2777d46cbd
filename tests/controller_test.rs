//! End-to-end tests for controller lifecycle behavior

use crossbeam_channel::unbounded;
use rand::Rng;
use rust_task_control::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_wait_covers_every_launched_task() {
    // Two slots, five tasks holding their permit for 100ms each: at least
    // three rounds must elapse before the controller goes idle
    let controller = Controller::new(&[2]).expect("Failed to create controller");
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let permit = controller.acquire().expect("Failed to acquire permit");
        let ctl = controller.clone();
        handles.push(thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            ctl.release(permit);
        }));
    }

    controller.wait();
    let elapsed = start.elapsed();

    assert!(
        elapsed >= Duration::from_millis(300),
        "wait returned after {:?}",
        elapsed
    );
    assert_eq!(controller.outstanding(), 0);
    assert_eq!(controller.stats().pools[0].available, 2);

    for handle in handles {
        handle.join().expect("Task thread panicked");
    }
}

#[test]
fn test_run_until_end_to_end() {
    let controller = Controller::new(&[2]).expect("Failed to create controller");
    let start = Instant::now();

    let launched = controller
        .run_until(
            |seq| seq < 5,
            |_| thread::sleep(Duration::from_millis(100)),
        )
        .expect("Driver loop failed");

    assert_eq!(launched, 5);
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(controller.outstanding(), 0);
}

#[test]
fn test_release_while_paused_stays_withheld() {
    let controller = Controller::new(&[1]).expect("Failed to create controller");
    let permit = controller.acquire().expect("Failed to acquire permit");

    controller.pause();
    controller.release(permit);

    let acquired = Arc::new(AtomicBool::new(false));
    let handle = {
        let controller = controller.clone();
        let acquired = Arc::clone(&acquired);
        thread::spawn(move || {
            let permit = controller.acquire();
            acquired.store(true, Ordering::SeqCst);
            permit
        })
    };

    // Second acquire must stay blocked while paused
    thread::sleep(Duration::from_millis(150));
    assert!(!acquired.load(Ordering::SeqCst));

    let resumed_at = Instant::now();
    controller.resume();
    let permit = handle
        .join()
        .expect("Acquirer panicked")
        .expect("Acquire failed after resume");

    assert!(resumed_at.elapsed() < Duration::from_millis(500));
    assert_eq!(permit.pool(), 0);
    controller.release(permit);
}

#[test]
fn test_acquire_started_after_pause_blocks() {
    let controller = Controller::new(&[3, 3]).expect("Failed to create controller");
    controller.pause();

    let (tx, rx) = unbounded();
    for _ in 0..4 {
        let controller = controller.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let _ = tx.send(controller.acquire());
        });
    }

    assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

    controller.resume();
    for _ in 0..4 {
        let permit = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("Acquirer did not wake")
            .expect("Acquire failed");
        controller.release(permit);
    }
}

#[test]
fn test_cancel_wakes_blocked_acquirers_on_saturated_pools() {
    let controller = Controller::new(&[2, 1, 3]).expect("Failed to create controller");

    // Saturate every pool
    let held: Vec<_> = (0..6)
        .map(|_| controller.acquire().expect("Failed to acquire permit"))
        .collect();
    assert_eq!(controller.stats().total_available(), 0);

    let (tx, rx) = unbounded();
    let blocked = 8;
    for i in 0..blocked {
        let controller = controller.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let result = if i % 2 == 0 {
                controller.acquire()
            } else {
                controller.acquire_from(i % 3)
            };
            let _ = tx.send(result);
        });
    }

    thread::sleep(Duration::from_millis(50));
    let reason = CancelReason::Error("upstream failed".to_string());
    controller.cancel_with_reason(reason.clone());

    for _ in 0..blocked {
        let result = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("Blocked acquirer was not woken by cancel");
        assert_eq!(
            result.unwrap_err(),
            ControlError::Cancelled {
                reason: reason.clone()
            }
        );
    }

    for permit in held {
        controller.release(permit);
    }
    controller.wait();
}

#[test]
fn test_sticky_cause_seen_by_every_caller() {
    let controller = Controller::new(&[1]).expect("Failed to create controller");
    let first = CancelReason::Custom("first".to_string());

    controller.cancel_with_reason(first.clone());
    controller.cancel_with_reason(CancelReason::Custom("second".to_string()));
    controller.cancel();

    let expected = ControlError::Cancelled { reason: first };
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let controller = controller.clone();
            thread::spawn(move || (controller.acquire().unwrap_err(), controller.check_continue()))
        })
        .collect();

    for handle in handles {
        let (acquire_err, check) = handle.join().expect("Checker panicked");
        assert_eq!(acquire_err, expected);
        assert_eq!(check.unwrap_err(), expected);
    }
}

#[test]
fn test_timeout_never_fires_early() {
    let timeout = Duration::from_millis(80);
    let controller = Controller::new(&[2]).expect("Failed to create controller");

    let armed_at = Instant::now();
    controller.set_timeout(timeout).expect("Failed to arm timeout");

    let observed_at = loop {
        if let Err(err) = controller.check_continue() {
            assert_eq!(err, ControlError::TimedOut { after: timeout });
            break Instant::now();
        }
        assert!(
            armed_at.elapsed() < Duration::from_secs(2),
            "timeout never fired"
        );
        thread::sleep(Duration::from_millis(2));
    };

    assert!(observed_at.duration_since(armed_at) >= timeout);
    assert_eq!(
        controller.acquire().unwrap_err(),
        ControlError::TimedOut { after: timeout }
    );
    assert_eq!(controller.cause(), Some(CancelReason::Timeout(timeout)));
}

#[test]
fn test_timeout_wakes_blocked_acquirer() {
    let controller = Controller::new(&[1]).expect("Failed to create controller");
    let permit = controller.acquire().expect("Failed to acquire permit");
    controller
        .set_timeout(Duration::from_millis(50))
        .expect("Failed to arm timeout");

    let start = Instant::now();
    let err = controller.acquire().unwrap_err();
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert!(matches!(err, ControlError::TimedOut { .. }));
    assert!(err.is_cancellation());

    controller.release(permit);
}

#[test]
fn test_uncancel_keeps_disarmed_timeout_quiet() {
    let controller = Controller::new(&[1]).expect("Failed to create controller");
    controller
        .set_timeout(Duration::from_millis(20))
        .expect("Failed to arm timeout");
    thread::sleep(Duration::from_millis(100));
    assert!(controller.is_cancelled());

    controller.uncancel();
    controller.un_timeout();
    thread::sleep(Duration::from_millis(50));

    assert!(!controller.is_cancelled());
    let permit = controller.acquire().expect("Failed to acquire after uncancel");
    controller.release(permit);
}

#[test]
fn test_wait_stress_with_random_hold_times() {
    let controller = Controller::new(&[3, 2, 4]).expect("Failed to create controller");
    let mut rng = rand::thread_rng();

    for _round in 0..5 {
        let finished = Arc::new(AtomicUsize::new(0));
        let tasks = rng.gen_range(5..25);

        let mut handles = Vec::new();
        for _ in 0..tasks {
            let hold = Duration::from_millis(rng.gen_range(0..15));
            let permit = controller.acquire().expect("Failed to acquire permit");
            let ctl = controller.clone();
            let finished = Arc::clone(&finished);
            handles.push(thread::spawn(move || {
                thread::sleep(hold);
                finished.fetch_add(1, Ordering::SeqCst);
                ctl.release(permit);
            }));
        }

        controller.wait();

        // Every release happens after the counter bump, so idle implies done
        assert_eq!(controller.outstanding(), 0);
        assert_eq!(finished.load(Ordering::SeqCst), tasks);
        assert_eq!(controller.stats().total_available(), 9);

        for handle in handles {
            handle.join().expect("Task thread panicked");
        }
    }
}

#[test]
fn test_close_during_run_stops_driver() {
    let controller = Controller::new(&[2]).expect("Failed to create controller");
    let closer = controller.clone();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(60));
        closer.close();
    });

    let result = controller.run(|_| thread::sleep(Duration::from_millis(10)));
    handle.join().expect("Closer panicked");

    assert_eq!(result, Err(ControlError::Closed));
    assert_eq!(controller.outstanding(), 0);
    assert!(controller.is_closed());
}

#[test]
fn test_checkpoints_pause_running_tasks() {
    let controller = Controller::new(&[2]).expect("Failed to create controller");
    let progress = Arc::new(AtomicUsize::new(0));

    let driver = {
        let controller = controller.clone();
        let progress = Arc::clone(&progress);
        thread::spawn(move || {
            controller.run_until(
                |seq| seq < 2,
                move |task| {
                    while task.check_continue().is_ok() {
                        progress.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                    }
                },
            )
        })
    };

    thread::sleep(Duration::from_millis(50));
    controller.pause();
    // Let in-flight iterations reach their next checkpoint
    thread::sleep(Duration::from_millis(30));
    let frozen = progress.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(progress.load(Ordering::SeqCst), frozen);

    controller.resume();
    thread::sleep(Duration::from_millis(40));
    assert!(progress.load(Ordering::SeqCst) > frozen);

    controller.cancel();
    let launched = driver
        .join()
        .expect("Driver panicked")
        .expect("Driver loop failed");
    assert_eq!(launched, 2);
    assert_eq!(controller.outstanding(), 0);
}

#[test]
fn test_context_done_composes_with_select() {
    let controller = Controller::new(&[1]).expect("Failed to create controller");
    let ctx = controller.context();
    let (work_tx, work_rx) = unbounded::<u32>();

    let consumer = thread::spawn(move || {
        let mut received = 0;
        let done = ctx.done();
        loop {
            crossbeam_channel::select! {
                recv(work_rx) -> msg => match msg {
                    Ok(_) => received += 1,
                    Err(_) => break,
                },
                recv(done) -> _ => break,
            }
        }
        (received, ctx.err())
    });

    for i in 0..3 {
        work_tx.send(i).expect("Consumer hung up");
    }
    thread::sleep(Duration::from_millis(30));
    controller.cancel();

    let (received, err) = consumer.join().expect("Consumer panicked");
    assert_eq!(received, 3);
    assert_eq!(
        err,
        Some(ControlError::Cancelled {
            reason: CancelReason::Manual
        })
    );
}

#[test]
fn test_close_while_paused_releases_waiters() {
    let controller = Controller::new(&[1]).expect("Failed to create controller");
    let permit = controller.acquire().expect("Failed to acquire permit");
    controller.pause();

    let acquirer = {
        let controller = controller.clone();
        thread::spawn(move || controller.acquire())
    };
    let checker = {
        let controller = controller.clone();
        thread::spawn(move || controller.check_continue())
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!acquirer.is_finished());
    assert!(!checker.is_finished());

    controller.close();
    assert_eq!(
        acquirer.join().expect("Acquirer panicked").unwrap_err(),
        ControlError::Closed
    );
    assert_eq!(
        checker.join().expect("Checker panicked"),
        Err(ControlError::Closed)
    );

    controller.release(permit);
    assert!(controller.wait_timeout(Duration::from_millis(200)));
    assert_eq!(controller.outstanding(), 0);
}
