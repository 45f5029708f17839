use kernel_sync::{SpinMutex, WaitQueue};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Spin until `cond` holds or panic after a generous timeout.
fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

struct Shared {
    lock: SpinMutex<u32>,
    queue: WaitQueue,
}

#[test]
fn notify_without_waiters_is_dropped() {
    let m = SpinMutex::new(());
    let q = WaitQueue::new();

    let g = m.lock();
    assert!(!q.notify_one(&g));
    assert_eq!(q.notify_all(&g), 0);
    assert_eq!(q.waiters(), 0);
}

#[test]
fn waiter_spins_until_notified_and_reacquires_lock() {
    let shared = Arc::new(Shared {
        lock: SpinMutex::new(0),
        queue: WaitQueue::new(),
    });
    let done = Arc::new(AtomicBool::new(false));

    let t = {
        let shared = Arc::clone(&shared);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut g = shared.lock.lock();
            while *g == 0 {
                g = shared.queue.wait(g);
            }
            let seen = *g;
            drop(g);
            done.store(true, Ordering::SeqCst);
            seen
        })
    };

    wait_until("waiter to park", || shared.queue.waiters() == 1);
    thread::sleep(Duration::from_millis(20));
    assert!(!done.load(Ordering::SeqCst), "waiter must not run unnotified");

    {
        let mut g = shared.lock.lock();
        *g = 7;
        assert!(shared.queue.notify_one(&g));
    }

    assert_eq!(t.join().unwrap(), 7);
    assert_eq!(shared.queue.waiters(), 0);
}

#[test]
fn notify_one_wakes_exactly_one_in_fifo_order() {
    let shared = Arc::new(Shared {
        lock: SpinMutex::new(0),
        queue: WaitQueue::new(),
    });
    let order = Arc::new(SpinMutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..3_u32 {
        let s = Arc::clone(&shared);
        let order = Arc::clone(&order);
        handles.push(thread::spawn(move || {
            let g = s.lock.lock();
            let g = s.queue.wait(g);
            order.with_lock(|o| o.push(id));
            drop(g);
        }));
        // park them one after another so the ticket order is known
        wait_until("waiter to park", || shared.queue.waiters() == id as usize + 1);
    }

    for expected in 0..3_u32 {
        {
            let g = shared.lock.lock();
            assert!(shared.queue.notify_one(&g));
        }
        wait_until("one waiter to finish", || {
            order.with_lock(|o| o.len()) == expected as usize + 1
        });
        assert_eq!(shared.queue.waiters(), 2 - expected as usize);
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(order.with_lock(|o| o.clone()), vec![0, 1, 2]);
}

#[test]
fn notify_all_releases_everyone() {
    let shared = Arc::new(Shared {
        lock: SpinMutex::new(0),
        queue: WaitQueue::new(),
    });

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let g = shared.lock.lock();
                let mut g = shared.queue.wait(g);
                *g += 1;
            })
        })
        .collect();

    wait_until("all waiters to park", || shared.queue.waiters() == 4);
    {
        let g = shared.lock.lock();
        assert_eq!(shared.queue.notify_all(&g), 4);
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(shared.lock.with_lock(|v| *v), 4);
}

#[test]
fn no_lost_wakeup_under_ping_pong() {
    // One producer hands out tokens, one consumer waits for each one. A lost
    // wakeup would leave the consumer parked forever.
    let shared = Arc::new(Shared {
        lock: SpinMutex::new(0),
        queue: WaitQueue::new(),
    });
    let rounds = 2_000;

    let consumer = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for _ in 0..rounds {
                let mut g = shared.lock.lock();
                while *g == 0 {
                    g = shared.queue.wait(g);
                }
                *g -= 1;
            }
        })
    };

    for _ in 0..rounds {
        let mut g = shared.lock.lock();
        *g += 1;
        shared.queue.notify_one(&g);
        drop(g);
        thread::yield_now();
    }

    consumer.join().unwrap();
    assert_eq!(shared.lock.with_lock(|v| *v), 0);
}
