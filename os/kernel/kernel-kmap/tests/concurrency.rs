use kernel_kmap::{PageAddressTable, Pkmap, PkmapConfig};
use kernel_memory_addresses::PhysicalPage;
use kernel_vmem::{KernelMapper, PkmapPageTable, RecordingFlush};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

type TestPkmap<const N: usize> = Pkmap<PkmapPageTable<RecordingFlush>, PageAddressTable<N>, N>;

const SLOTS: usize = 4;
const THREADS: usize = 8;
const ROUNDS: u64 = 200;
const NOBODY: usize = usize::MAX;

fn pkmap<const N: usize>() -> Arc<TestPkmap<N>> {
    Arc::new(TestPkmap::<N>::with_flush(PkmapConfig::default(), RecordingFlush::default()).unwrap())
}

#[test]
fn more_threads_than_slots_all_make_progress() {
    let p = pkmap::<SLOTS>();
    let owners: Arc<Vec<AtomicUsize>> = Arc::new((0..SLOTS).map(|_| AtomicUsize::new(NOBODY)).collect());
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let p = Arc::clone(&p);
            let owners = Arc::clone(&owners);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for round in 0..ROUNDS {
                    // frames are private to this thread, so nobody else may share the slot
                    let frame = PhysicalPage::from_number(0x20_0000 + tid as u64 * 0x1000 + round % 3);
                    let va = p.acquire(frame);
                    let nr = p.slot_of(va).unwrap();

                    let prev = owners[nr].swap(tid, Ordering::SeqCst);
                    assert_eq!(prev, NOBODY, "slot {nr} handed to {tid} while owned by {prev}");
                    assert_eq!(p.with_mapper(|t| t.lookup(va)), Some(frame));
                    assert_eq!(p.page_address(frame), Some(va));

                    thread::yield_now();

                    owners[nr].store(NOBODY, Ordering::SeqCst);
                    p.release(va);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let stats = p.stats();
    assert_eq!(stats.held, 0);
    assert_eq!(stats.waiting, 0);
    assert_eq!(stats.free + stats.stale, SLOTS);
    p.check_invariants();
}

#[test]
fn concurrent_mappers_of_one_frame_share_its_slot() {
    let p = pkmap::<SLOTS>();
    let frame = PhysicalPage::from_number(0x30_0000);
    let held = Arc::new(Barrier::new(THREADS + 1));
    let done = Arc::new(Barrier::new(THREADS + 1));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let p = Arc::clone(&p);
            let held = Arc::clone(&held);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let va = p.acquire(frame);
                held.wait();
                done.wait();
                p.release(va);
                va
            })
        })
        .collect();

    held.wait();
    let stats = p.stats();
    assert_eq!(stats.held, 1);
    assert_eq!(stats.holders, THREADS);
    p.check_invariants();
    done.wait();

    let addrs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(addrs.iter().all(|&va| va == addrs[0]));
    assert!(p.slot_state(p.slot_of(addrs[0]).unwrap()).is_stale());
}

#[test]
fn single_slot_serializes_distinct_frames() {
    let p = pkmap::<1>();
    let inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4_u64)
        .map(|tid| {
            let p = Arc::clone(&p);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                for round in 0..50 {
                    let g = p.map(PhysicalPage::from_number(0x40_0000 + tid * 100 + round));
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                    drop(g);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert!(p.stats().flushes >= 200);
    p.check_invariants();
}
