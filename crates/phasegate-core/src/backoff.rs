/// Bounded retry policy for acquiring the state lock.
///
/// Attempt 1: immediate
/// Attempt 2-7: 10ms, 25ms, 50ms, 100ms, 250ms, 500ms
/// Attempt 8+: give up (caller reports a lock timeout instead of hanging).
pub fn lock_retry_delay_ms(attempt_number: u32) -> Option<u64> {
    match attempt_number {
        0 | 1 => Some(0),
        2 => Some(10),
        3 => Some(25),
        4 => Some(50),
        5 => Some(100),
        6 => Some(250),
        7 => Some(500),
        _ => None,
    }
}
