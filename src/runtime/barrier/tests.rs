use super::*;
use crate::assert_errors;
use crate::types::Field;
use crossbeam::channel::{unbounded, Receiver};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// A barrier whose continuation sends the merged record down a channel.
fn observed_barrier(arrivals: usize) -> (Accumulator, Receiver<Record>) {
    let (tx, rx) = unbounded();
    let accumulator = JoinBarrier::new(arrivals, move |record| {
        tx.send(record).unwrap();
    })
    .unwrap();
    (accumulator, rx)
}

#[test]
fn test_two_branches_scenario() {
    let (accumulator, rx) = observed_barrier(2);

    let handles = [Record::new().with("x", 1), Record::new().with("y", 2)]
        .into_iter()
        .map(|partial| {
            let accumulator = accumulator.clone();
            thread::spawn(move || accumulator.arrive(partial).unwrap())
        })
        .collect::<Vec<_>>();
    let arrivals = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(arrivals.iter().filter(|a| **a == Arrival::Fired).count(), 1);
    assert!(arrivals.contains(&Arrival::Pending { remaining: 1 }));

    let record = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(record.get("x"), Some(&Field::from(1)));
    assert_eq!(record.get("y"), Some(&Field::from(2)));
    assert_eq!(record.len(), 2);
    // exactly once
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_zero_arrivals_rejected() {
    assert_errors!(JoinBarrier::new(0, |_| {}));
}

#[test]
fn test_single_arrival_fires_immediately() {
    let (accumulator, rx) = observed_barrier(1);
    assert_eq!(accumulator.arrive(Record::new().with("only", true)), Ok(Arrival::Fired));
    assert_eq!(rx.try_recv().unwrap(), Record::new().with("only", true));
}

#[test]
fn test_fewer_arrivals_never_fire() {
    let (accumulator, rx) = observed_barrier(3);
    assert_eq!(
        accumulator.arrive(Record::new().with("a", 1)),
        Ok(Arrival::Pending { remaining: 2 })
    );
    assert_eq!(
        accumulator.arrive(Record::new().with("b", 2)),
        Ok(Arrival::Pending { remaining: 1 })
    );
    assert_eq!(accumulator.remaining(), 1);
    assert!(!accumulator.has_fired());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_over_arrival_is_reported_and_does_not_refire() {
    let (accumulator, rx) = observed_barrier(1);
    accumulator.arrive(Record::new().with("a", 1)).unwrap();

    assert_eq!(
        accumulator.arrive(Record::new().with("b", 2)),
        Err(Error::BarrierExhausted { expected: 1 })
    );
    assert_eq!(rx.try_recv().unwrap(), Record::new().with("a", 1));
    assert!(rx.try_recv().is_err());
    assert!(accumulator.has_fired());
}

#[test]
fn test_empty_partials_still_count() {
    let (accumulator, rx) = observed_barrier(2);
    accumulator.arrive(Record::new()).unwrap();
    accumulator.arrive(Record::new().with("z", 0)).unwrap();
    assert_eq!(rx.try_recv().unwrap(), Record::new().with("z", 0));
}

#[test]
fn test_conflicting_fields_last_writer_wins() {
    let (accumulator, rx) = observed_barrier(2);
    accumulator.arrive(Record::new().with("v", 1).with("a", true)).unwrap();
    accumulator.arrive(Record::new().with("v", 2)).unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        Record::new().with("v", 2).with("a", true)
    );
}

#[test]
fn test_many_concurrent_branches_fire_once_with_union() {
    const BRANCHES: usize = 64;

    let fired = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = unbounded();
    let accumulator = {
        let fired = fired.clone();
        JoinBarrier::new(BRANCHES, move |record| {
            fired.fetch_add(1, Ordering::SeqCst);
            tx.send(record).unwrap();
        })
        .unwrap()
    };

    // shuffle the spawn order so arrivals interleave differently per seed
    let mut order: Vec<usize> = (0..BRANCHES).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(339));

    let handles = order
        .into_iter()
        .map(|i| {
            let accumulator = accumulator.clone();
            thread::spawn(move || {
                accumulator
                    .arrive(Record::new().with(format!("branch{i}"), i as i64))
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();
    let fired_arrivals = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|arrival| *arrival == Arrival::Fired)
        .count();

    assert_eq!(fired_arrivals, 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let record = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(record.len(), BRANCHES);
    for i in 0..BRANCHES {
        assert_eq!(
            record.get(&format!("branch{i}")),
            Some(&Field::from(i as i64))
        );
    }
}

#[test]
fn test_continuation_may_arrive_at_another_barrier() {
    let (outer, rx) = observed_barrier(2);
    let inner = {
        let outer = outer.clone();
        JoinBarrier::new(2, move |record| {
            outer.arrive(record).unwrap();
        })
        .unwrap()
    };

    inner.arrive(Record::new().with("a", 1)).unwrap();
    outer.arrive(Record::new().with("c", 3)).unwrap();
    inner.arrive(Record::new().with("b", 2)).unwrap();

    let record = rx.try_recv().unwrap();
    assert_eq!(record.len(), 3);
    assert!(outer.has_fired());
}

#[test]
fn test_continuation_may_reenter_its_own_barrier() {
    // the lock is released before the continuation runs
    let (tx, rx) = unbounded();
    let accumulator = Arc::new(Mutex::new(None::<Accumulator>));
    let handle = {
        let accumulator = accumulator.clone();
        JoinBarrier::new(1, move |_| {
            let this = accumulator.lock().unwrap().clone().unwrap();
            tx.send(this.arrive(Record::new())).unwrap();
        })
        .unwrap()
    };
    *accumulator.lock().unwrap() = Some(handle.clone());

    handle.arrive(Record::new()).unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        Err(Error::BarrierExhausted { expected: 1 })
    );
}
