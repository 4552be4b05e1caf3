// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for bounded polling.

#[cfg(test)]
mod tests {
    use crate::reconcilers::failover::poll::{poll_until, PollPolicy, PollResult};
    use std::ops::ControlFlow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, 120);
    }

    #[tokio::test]
    async fn test_ready_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<PollResult<&str, ()>, ()> =
            poll_until(&PollPolicy::immediate(5), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ControlFlow::Break("done")) }
            })
            .await;

        assert_eq!(
            result,
            Ok(PollResult::Ready {
                value: "done",
                attempts: 1
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<PollResult<u32, u32>, ()> =
            poll_until(&PollPolicy::immediate(10), "test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 3 {
                        Ok(ControlFlow::Break(n))
                    } else {
                        Ok(ControlFlow::Continue(n))
                    }
                }
            })
            .await;

        assert_eq!(
            result,
            Ok(PollResult::Ready {
                value: 3,
                attempts: 3
            })
        );
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_observation() {
        let calls = AtomicU32::new(0);
        let result: Result<PollResult<(), u32>, ()> =
            poll_until(&PollPolicy::immediate(4), "test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(ControlFlow::Continue(n * 10)) }
            })
            .await;

        assert_eq!(
            result,
            Ok(PollResult::Exhausted {
                last: 40,
                attempts: 4
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_checks_once() {
        let calls = AtomicU32::new(0);
        let result: Result<PollResult<(), ()>, ()> =
            poll_until(&PollPolicy::immediate(0), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ControlFlow::Continue(())) }
            })
            .await;

        assert!(matches!(
            result,
            Ok(PollResult::Exhausted { attempts: 1, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_stops_polling() {
        let calls = AtomicU32::new(0);
        let result: Result<PollResult<(), ()>, &str> =
            poll_until(&PollPolicy::immediate(10), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("gateway down") }
            })
            .await;

        assert_eq!(result, Err("gateway down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interval_is_applied_between_attempts() {
        let start = std::time::Instant::now();
        let result: Result<PollResult<(), ()>, ()> =
            poll_until(&PollPolicy::new(Duration::from_millis(20), 3), "test", || async {
                Ok(ControlFlow::Continue(()))
            })
            .await;

        assert!(matches!(
            result,
            Ok(PollResult::Exhausted { attempts: 3, .. })
        ));
        // Two sleeps: none after the final attempt
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
