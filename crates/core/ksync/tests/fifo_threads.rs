//! Real-thread stress for the fifo.

#![cfg(not(any(loom, shuttle)))]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use ksync::kfifo::Kfifo;
use ksync::lock::BareMetal;

const COUNT: u32 = 200_000;

#[test]
fn spsc_unlocked_preserves_order() {
    let mut storage = [0u8; 256];
    let mut fifo = Kfifo::<BareMetal>::new(&mut storage, 4).unwrap();
    let (mut tx, mut rx) = fifo.split();

    thread::scope(|s| {
        s.spawn(move || {
            let mut next = 0u32;
            while next < COUNT {
                let burst: Vec<u8> = (next..COUNT.min(next + 7))
                    .flat_map(u32::to_le_bytes)
                    .collect();
                let wrote = tx.produce(&burst);
                next += u32::try_from(wrote).unwrap();
                if wrote == 0 {
                    thread::yield_now();
                }
            }
        });

        s.spawn(move || {
            let mut expect = 0u32;
            let mut buf = [0u8; 4 * 11];
            while expect < COUNT {
                let got = if expect % 3 == 0 {
                    // Zero-copy path.
                    let slice = rx.linear_slice(5);
                    for c in slice.chunks_exact(4) {
                        assert_eq!(u32::from_le_bytes(c.try_into().unwrap()), expect);
                        expect += 1;
                    }
                    let n = slice.len() / 4;
                    rx.skip(n)
                } else {
                    let n = rx.consume(&mut buf);
                    for c in buf[..n * 4].chunks_exact(4) {
                        assert_eq!(u32::from_le_bytes(c.try_into().unwrap()), expect);
                        expect += 1;
                    }
                    n
                };
                if got == 0 {
                    thread::yield_now();
                }
            }
        });
    });
}

#[test]
fn locked_multi_producer_multi_consumer() {
    const PRODUCERS: u32 = 4;
    const PER_PRODUCER: u32 = 20_000;

    let mut storage = [0u8; 64];
    let fifo = Kfifo::<BareMetal>::new(&mut storage, 4).unwrap();
    let consumed = AtomicU32::new(0);

    let seen = thread::scope(|s| {
        for p in 0..PRODUCERS {
            let fifo = &fifo;
            s.spawn(move || {
                let mut i = 0;
                while i < PER_PRODUCER {
                    let v = (p << 24) | i;
                    if fifo.produce_locked(&v.to_le_bytes()) == 1 {
                        i += 1;
                    } else {
                        thread::yield_now();
                    }
                }
            });
        }

        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let (fifo, consumed) = (&fifo, &consumed);
                s.spawn(move || {
                    let mut last = [None::<u32>; PRODUCERS as usize];
                    let mut count = 0u32;
                    let mut buf = [0u8; 4 * 3];
                    while consumed.load(Ordering::Acquire) < PRODUCERS * PER_PRODUCER {
                        let n = fifo.consume_locked(&mut buf);
                        for c in buf[..n * 4].chunks_exact(4) {
                            let v = u32::from_le_bytes(c.try_into().unwrap());
                            let (p, i) = ((v >> 24) as usize, v & 0x00FF_FFFF);
                            // Each consumer sees any one producer's values in order.
                            assert!(last[p].is_none_or(|prev| prev < i));
                            last[p] = Some(i);
                        }
                        let n32 = u32::try_from(n).unwrap();
                        count += n32;
                        consumed.fetch_add(n32, Ordering::AcqRel);
                        if n == 0 {
                            thread::yield_now();
                        }
                    }
                    count
                })
            })
            .collect();

        consumers
            .into_iter()
            .map(|h| h.join().unwrap())
            .sum::<u32>()
    });

    assert_eq!(seen, PRODUCERS * PER_PRODUCER);
    assert!(fifo.is_empty());
}

#[test]
fn locked_producers_feed_unlocked_consumer() {
    const PRODUCERS: u32 = 3;
    const PER_PRODUCER: u32 = 20_000;

    let mut storage = [0u8; 32];
    let mut fifo = Kfifo::<BareMetal>::new(&mut storage, 4).unwrap();
    let (tx, mut rx) = fifo.split_consumer();

    thread::scope(|s| {
        for p in 0..PRODUCERS {
            s.spawn(move || {
                let mut i = 0;
                while i < PER_PRODUCER {
                    if tx.produce(&((p << 24) | i).to_le_bytes()) == 1 {
                        i += 1;
                    } else {
                        thread::yield_now();
                    }
                }
            });
        }

        s.spawn(move || {
            let mut next = [0u32; PRODUCERS as usize];
            let mut buf = [0u8; 4 * 5];
            let mut total = 0;
            while total < PRODUCERS * PER_PRODUCER {
                let n = rx.consume(&mut buf);
                for c in buf[..n * 4].chunks_exact(4) {
                    let v = u32::from_le_bytes(c.try_into().unwrap());
                    let p = (v >> 24) as usize;
                    assert_eq!(v & 0x00FF_FFFF, next[p]);
                    next[p] += 1;
                }
                total += u32::try_from(n).unwrap();
                if n == 0 {
                    thread::yield_now();
                }
            }
            assert!(rx.is_empty());
        });
    });
}

#[test]
fn len_and_avail_stay_bounded_under_locked_transfers() {
    let mut storage = [0u8; 4];
    let fifo = Kfifo::<BareMetal>::new(&mut storage, 1).unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let (fifo, done) = (&fifo, &done);
        s.spawn(move || {
            let mut buf = [0u8; 4];
            for _ in 0..COUNT {
                assert_eq!(fifo.produce_locked(&[1, 2, 3, 4]), 4);
                assert_eq!(fifo.consume_locked(&mut buf), 4);
            }
            done.store(true, Ordering::Release);
        });
        s.spawn(move || {
            let capacity = fifo.capacity();
            while !done.load(Ordering::Acquire) {
                let len = fifo.len();
                assert!(len <= capacity, "len {len} over capacity {capacity}");
                let avail = fifo.avail();
                assert!(avail <= capacity, "avail {avail} over capacity {capacity}");
            }
        });
    });
}
