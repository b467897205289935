//! Randomized schedules of the IRQ-masked fifo variants.
//!
//! Run with `RUSTFLAGS="--cfg shuttle" cargo test --release --test shuttle_fifo`.

#![cfg(shuttle)]

use ksync::kfifo::Kfifo;
use ksync::lock::BareMetal;
use shuttle::thread;

const ITERATIONS: usize = 1_000;

fn leak_fifo(bytes: usize, esize: usize) -> &'static Kfifo<'static, BareMetal> {
    let storage: &'static mut [u8] = Box::leak(vec![0u8; bytes].into_boxed_slice());
    Box::leak(Box::new(Kfifo::new(storage, esize).unwrap()))
}

#[test]
fn two_producers_one_consumer_locked() {
    shuttle::check_random(
        || {
            let fifo = leak_fifo(4, 1);

            let producers: Vec<_> = [0x10u8, 0x20]
                .into_iter()
                .map(|base| {
                    thread::spawn(move || {
                        let mut i = 0;
                        while i < 3 {
                            if fifo.produce_locked(&[base + i]) == 1 {
                                i += 1;
                            } else {
                                thread::yield_now();
                            }
                        }
                    })
                })
                .collect();

            let mut got = Vec::new();
            while got.len() < 6 {
                let mut b = [0u8; 3];
                let n = fifo.consume_locked(&mut b);
                if n == 0 {
                    thread::yield_now();
                }
                got.extend_from_slice(&b[..n]);
            }
            for p in producers {
                p.join().unwrap();
            }

            for base in [0x10u8, 0x20] {
                let mine: Vec<u8> = got.iter().copied().filter(|v| v & 0xF0 == base).collect();
                assert_eq!(mine, [base, base + 1, base + 2]);
            }
        },
        ITERATIONS,
    );
}

#[test]
fn locked_peek_and_skip_agree_with_consume() {
    shuttle::check_random(
        || {
            let fifo = leak_fifo(8, 2);

            let producer = thread::spawn(move || {
                let mut i = 0u8;
                while i < 4 {
                    if fifo.produce_locked(&[i, !i]) == 1 {
                        i += 1;
                    } else {
                        thread::yield_now();
                    }
                }
            });

            let mut seen = 0u8;
            while seen < 4 {
                let mut b = [0u8; 2];
                if fifo.peek_locked(&mut b) == 1 {
                    assert_eq!(b, [seen, !seen]);
                    assert_eq!(fifo.skip_locked(1), 1);
                    seen += 1;
                } else {
                    thread::yield_now();
                }
            }
            producer.join().unwrap();
            assert!(fifo.is_empty());
        },
        ITERATIONS,
    );
}
