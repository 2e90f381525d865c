//! Concurrency behavior of the scan driver: ascending hand-out, disjoint
//! slices, and a monotone low-water mark under parallel completion.

use h5db_scan::{RowRange, ScanDriver, ScanPhase, Slice};
use std::sync::Mutex;

fn r(start: u64, end: u64) -> RowRange {
    RowRange {
        start_row: start,
        end_row: end,
    }
}

#[test]
fn parallel_workers_cover_the_ranges_exactly_once() {
    let ranges = vec![r(5, 1000), r(1500, 2000)];
    let driver = ScanDriver::new(ranges.clone(), 2500, 64);
    let delivered: Mutex<Vec<Slice>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                loop {
                    let Some(slice) = driver.next_slice() else {
                        break;
                    };
                    // The mark never overtakes the oldest in-flight slice.
                    assert!(driver.position_done() <= slice.position);
                    delivered.lock().unwrap().push(slice);
                    driver.complete(slice);
                }
            });
        }
    });

    let mut slices = delivered.into_inner().unwrap();
    slices.sort_by_key(|s| s.position);

    // Slices are disjoint and cover exactly the valid ranges.
    let mut covered: Vec<(u64, u64)> = Vec::new();
    for slice in &slices {
        let end = slice.position + slice.length;
        match covered.last_mut() {
            Some(last) if last.1 == slice.position => last.1 = end,
            Some(last) => {
                assert!(slice.position > last.1, "overlapping slices");
                covered.push((slice.position, end));
            }
            None => covered.push((slice.position, end)),
        }
    }
    let expected: Vec<(u64, u64)> = ranges.iter().map(|r| (r.start_row, r.end_row)).collect();
    assert_eq!(covered, expected);

    assert_eq!(driver.position_done(), 2500);
    assert_eq!(driver.phase(), ScanPhase::Done);
}

#[test]
fn out_of_order_completion_from_threads_converges() {
    let driver = ScanDriver::new(vec![r(0, 4096)], 4096, 32);
    let mut handed = Vec::new();
    while let Some(slice) = driver.next_slice() {
        handed.push(slice);
    }
    assert_eq!(handed.len(), 128);
    assert_eq!(driver.phase(), ScanPhase::Draining);

    // Complete from many threads in reversed order.
    std::thread::scope(|scope| {
        for chunk in handed.chunks(16) {
            scope.spawn(|| {
                for slice in chunk.iter().rev() {
                    driver.complete(*slice);
                }
            });
        }
    });

    assert_eq!(driver.position_done(), 4096);
    assert_eq!(driver.phase(), ScanPhase::Done);
}
