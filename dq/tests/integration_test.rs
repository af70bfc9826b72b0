//! Integration tests for DispatchQ
//!
//! These tests drive the public API from several threads at once and check
//! ordering, error routing and shutdown behaviour end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use dispatchq::{
    Dispatcher, ErrorPolicy, IdleStrategy, OrderedQueue, QueueConfig, SubscriptionState, TaskError, TaskQueue, Worker,
};

/// Env var that turns the fatal-default tests into the aborting child process
const ABORT_CHILD_ENV: &str = "DISPATCHQ_ABORT_CHILD";

fn rerun_as_child(test_name: &str) -> assert_cmd::assert::Assert {
    let exe = std::env::current_exe().expect("Failed to locate test binary");
    Command::new(exe)
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(ABORT_CHILD_ENV, "1")
        .timeout(Duration::from_secs(30))
        .assert()
}

/// Send the child's diagnostics to stderr so the parent can check them
fn init_child_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .try_init();
}

// =============================================================================
// OrderedQueue Tests
// =============================================================================

#[test]
fn test_ordered_queue_producers_and_consumer_thread() {
    let mut queue = OrderedQueue::new();
    let producers: Vec<_> = (0..100usize)
        .map(|p| {
            let sender = queue.sender();
            thread::spawn(move || {
                for i in 0..100usize {
                    sender.push((p, i));
                }
            })
        })
        .collect();

    let consumer = thread::spawn(move || {
        let mut next = vec![0usize; 100];
        let mut total = 0;
        while total < 100 * 100 {
            match queue.pop() {
                Some((p, i)) => {
                    assert_eq!(next[p], i, "producer {} out of order", p);
                    next[p] += 1;
                    total += 1;
                }
                None => thread::yield_now(),
            }
        }
        assert!(queue.pop().is_none());
        next
    });

    for p in producers {
        p.join().expect("producer panicked");
    }
    let next = consumer.join().expect("consumer panicked");
    assert!(next.iter().all(|&n| n == 100));
}

// =============================================================================
// TaskQueue Tests
// =============================================================================

#[test]
fn test_task_queue_total_order_across_producers() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let queue = Arc::new(TaskQueue::new(ErrorPolicy::default()).expect("Failed to create queue"));

    let producers: Vec<_> = (0..10u32)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..500u32 {
                    let log = Arc::clone(&log);
                    queue.push(move || {
                        log.lock().unwrap().push((p, i));
                        Ok(())
                    });
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    queue.flush().expect("flush failed");

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 5000);
    for p in 0..10u32 {
        let seq: Vec<u32> = log.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
        assert_eq!(seq, (0..500).collect::<Vec<_>>());
    }
}

#[test]
fn test_task_queue_park_strategy_under_load() {
    let count = Arc::new(AtomicUsize::new(0));
    {
        let config = QueueConfig::named("parked-load").with_idle(IdleStrategy::Park { timeout_ms: 50 });
        let queue = TaskQueue::with_config(config, ErrorPolicy::default()).unwrap();
        for _ in 0..1000 {
            let c = Arc::clone(&count);
            queue.push(move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
    }
    assert_eq!(count.load(Ordering::SeqCst), 1000);
}

#[test]
fn test_invalid_worker_name_rejected() {
    let err = TaskQueue::with_config(QueueConfig::named("bad\0name"), ErrorPolicy::default()).unwrap_err();
    assert!(err.to_string().contains("NUL"));
}

// =============================================================================
// Dispatcher Tests
// =============================================================================

#[test]
fn test_dispatcher_subscribe_from_many_threads() {
    let dispatcher: Dispatcher<u32> = Dispatcher::new(ErrorPolicy::default()).unwrap();
    let total = Arc::new(AtomicUsize::new(0));

    let subscriptions: Vec<_> = (0..8)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let total = Arc::clone(&total);
            thread::spawn(move || {
                dispatcher.subscribe(move |_| {
                    total.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .join()
            .unwrap()
        })
        .collect();

    for i in 0..10 {
        dispatcher.push(i);
    }
    dispatcher.flush().unwrap();
    assert_eq!(total.load(Ordering::SeqCst), 80);

    for s in &subscriptions {
        assert_eq!(s.state(), SubscriptionState::Active);
    }
    drop(subscriptions);
    dispatcher.push(99);
    dispatcher.flush().unwrap();
    assert_eq!(total.load(Ordering::SeqCst), 80);
}

#[test]
fn test_dispatcher_release_on_other_thread() {
    let dispatcher: Dispatcher<String> = Dispatcher::new(ErrorPolicy::default()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = dispatcher.subscribe(move |s: &String| {
        sink.lock().unwrap().push(s.clone());
        Ok(())
    });
    dispatcher.push("before".to_string());

    let moved = subscription.clone();
    drop(subscription);
    thread::spawn(move || moved.release()).join().unwrap();

    dispatcher.push("after".to_string());
    dispatcher.flush().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["before"]);
}

#[test]
fn test_dispatcher_handler_escalation_is_reported_by_shutdown() {
    let dispatcher: Dispatcher<u32> =
        Dispatcher::new(ErrorPolicy::handler(|err| Err(TaskError::msg(format!("escalated: {}", err))))).unwrap();
    let _sub = dispatcher.subscribe(|_| Err(TaskError::msg("bad payload")));
    dispatcher.push(1);
    let err = dispatcher.shutdown().unwrap_err();
    assert!(err.to_string().contains("escalated"));
}

// =============================================================================
// Fatal default
// =============================================================================

#[test]
fn test_unretrieved_task_failure_aborts_process() {
    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        init_child_logging();
        let queue = TaskQueue::new(ErrorPolicy::Abort).unwrap();
        queue.push(|| Err(TaskError::msg("nobody handles this")));
        drop(queue);
        // Not reached: dropping the queue aborts.
        return;
    }
    rerun_as_child("test_unretrieved_task_failure_aborts_process")
        .failure()
        .stderr(predicate::str::contains("Worker::drop: unhandled worker failure, aborting"))
        .stderr(predicate::str::contains("nobody handles this"));
}

#[test]
fn test_unretrieved_consumer_failure_aborts_process() {
    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        init_child_logging();
        let dispatcher: Dispatcher<u32> = Dispatcher::new(ErrorPolicy::default()).unwrap();
        let _sub = dispatcher.subscribe(|_| panic!("consumer blew up"));
        dispatcher.push(7);
        let _ = dispatcher.flush();
        drop(dispatcher);
        return;
    }
    rerun_as_child("test_unretrieved_consumer_failure_aborts_process")
        .failure()
        .stderr(predicate::str::contains("unhandled worker failure, aborting"))
        .stderr(predicate::str::contains("consumer blew up"));
}

#[test]
fn test_worker_failure_without_wait_aborts_process() {
    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        init_child_logging();
        let worker = Worker::spawn("doomed", || Err(TaskError::msg("worker failed"))).unwrap();
        drop(worker);
        return;
    }
    rerun_as_child("test_worker_failure_without_wait_aborts_process")
        .failure()
        .stderr(predicate::str::contains("worker failed"));
}

#[test]
fn test_detached_worker_failure_aborts_process() {
    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        init_child_logging();
        let slot: Arc<Mutex<Option<Worker>>> = Arc::new(Mutex::new(None));
        let inner_slot = Arc::clone(&slot);
        let worker = Worker::spawn("self-dropping", move || {
            let own = loop {
                if let Some(own) = inner_slot.lock().unwrap().take() {
                    break own;
                }
                thread::yield_now();
            };
            drop(own);
            Err(TaskError::msg("failed after detach"))
        })
        .unwrap();
        *slot.lock().unwrap() = Some(worker);
        // The worker thread aborts the process before this returns
        thread::sleep(Duration::from_secs(20));
        return;
    }
    rerun_as_child("test_detached_worker_failure_aborts_process")
        .failure()
        .stderr(predicate::str::contains("unhandled failure after detach, aborting"))
        .stderr(predicate::str::contains("failed after detach"));
}

#[test]
fn test_retrieved_failure_does_not_abort() {
    let queue = TaskQueue::new(ErrorPolicy::Abort).unwrap();
    queue.push(|| Err(TaskError::msg("retrieved")));
    assert!(queue.shutdown().is_err());
}
