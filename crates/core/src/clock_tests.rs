// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_is_shared_between_clones() {
    let clock = FakeClock::new();
    let start = clock.now();
    clock.clone().advance(Duration::from_secs(30));
    assert_eq!(clock.since(start), Duration::from_secs(30));
}

#[test]
fn since_saturates_for_future_start() {
    let clock = FakeClock::new();
    let later = clock.now() + Duration::from_secs(5);
    assert_eq!(clock.since(later), Duration::ZERO);
}

#[test]
fn system_clock_moves_forward() {
    let clock = SystemClock;
    let start = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    assert!(clock.since(start) > Duration::ZERO);
}
