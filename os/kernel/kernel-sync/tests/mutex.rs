use kernel_sync::{Mutex, RawSpin, SpinMutex};
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn guard_unlocks_on_drop() {
    let m = SpinMutex::new(0_u32);

    *m.lock() = 41;
    let mut g = m.lock();
    *g += 1;
    assert_eq!(*g, 42);
}

#[test]
fn try_lock_fails_only_while_held() {
    let m = SpinMutex::new('x');

    let g = m.try_lock().expect("fresh mutex is free");
    assert_eq!(*g, 'x');
    assert!(m.try_lock().is_none());

    drop(g);
    assert!(m.try_lock().is_some());
}

#[test]
fn with_lock_returns_closure_result() {
    let m = SpinMutex::new(vec![1_u8]);
    let len = m.with_lock(|v| {
        v.push(2);
        v.len()
    });
    assert_eq!(len, 2);
    assert!(m.try_lock().is_some(), "with_lock must unlock");
}

#[test]
fn exclusive_access_without_locking() {
    let mut m = Mutex::from_raw(RawSpin::new(), [0_u8; 4]);
    m.get_mut()[2] = 7;
    assert_eq!(m.into_inner(), [0, 0, 7, 0]);
}

#[test]
fn contended_counter_is_exact() {
    const THREADS: usize = 8;
    const ITERS: usize = 5_000;

    let m = Arc::new(SpinMutex::new(0_usize));
    let inside = Arc::new(AtomicBool::new(false));
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let m = Arc::clone(&m);
            let inside = Arc::clone(&inside);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..ITERS {
                    let mut g = m.lock();
                    assert!(!inside.swap(true, Ordering::SeqCst), "two holders at once");
                    *g += 1;
                    inside.store(false, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(*m.lock(), THREADS * ITERS);
}

#[test]
fn panicking_holder_releases_the_lock() {
    let m = SpinMutex::new(0_u32);
    let hits = AtomicUsize::new(0);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        m.with_lock(|v| {
            *v = 9;
            hits.fetch_add(1, Ordering::SeqCst);
            panic!("holder died");
        });
    }));

    assert!(res.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(*m.try_lock().expect("unwinding unlocked"), 9);
}

#[test]
fn spin_mutex_is_send_and_sync() {
    fn assert_send_sync<S: Send + Sync>() {}
    assert_send_sync::<SpinMutex<Vec<u8>>>();
}
