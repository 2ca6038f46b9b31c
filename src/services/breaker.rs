//! Circuit breaker for the poll loop.
//!
//! Failures and successes are tallied in a bounded rolling window; a
//! window of nothing but failures opens the circuit. After `wait_time`
//! the breaker half-opens and lets one command probe the upstream: a
//! clean window closes the circuit again, another all-failure window is a
//! terminal system failure.
//!
//! The window is mutated by a single polling task; sharing one breaker
//! across concurrent callers requires external synchronization.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Capacity-bounded FIFO of success/failure booleans. Starts empty;
/// `all` inspects only the stored slots, so an empty or partially-filled
/// window matches both `true` and `false`.
#[derive(Debug)]
pub struct RollingWindow {
    values: VecDeque<bool>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        RollingWindow {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn add(&mut self, value: bool) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn all(&self, value: bool) -> bool {
        self.values.iter().all(|&v| v == value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError {
    #[error("circuit is open")]
    OpenCircuit,

    #[error("poor recovery - half-open circuit reverted back to failure")]
    SystemFailure,
}

pub struct CircuitBreaker {
    state: CircuitState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    wait_time: Duration,
}

impl CircuitBreaker {
    pub fn new(wait_time: Duration, window_size: usize) -> Self {
        CircuitBreaker {
            state: CircuitState::Closed,
            window: RollingWindow::new(window_size),
            opened_at: None,
            wait_time,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Run one command through the breaker.
    ///
    /// Ordinary command failures are absorbed (logged, window tallied) —
    /// only circuit-level outcomes surface: `OpenCircuit` when the command
    /// was rejected or its failure opened the circuit, `SystemFailure`
    /// when a half-open probe failed.
    pub async fn run<F, Fut>(&mut self, cmd: F) -> Result<(), BreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(), AppError>>,
    {
        if self.state == CircuitState::Open {
            let waited_out = self
                .opened_at
                .map(|at| at.elapsed() >= self.wait_time)
                .unwrap_or(true);
            if !waited_out {
                return Err(BreakerError::OpenCircuit);
            }
            tracing::info!("circuit half-open, probing upstream");
            self.state = CircuitState::HalfOpen;
        }

        match cmd().await {
            Err(err) => {
                tracing::warn!("command failed: {}", err);
                self.window.add(true);
                if self.window.all(true) {
                    if self.state == CircuitState::HalfOpen {
                        return Err(BreakerError::SystemFailure);
                    }
                    self.state = CircuitState::Open;
                    self.opened_at = Some(Instant::now());
                    return Err(BreakerError::OpenCircuit);
                }
                Ok(())
            }
            Ok(()) => {
                self.window.add(false);
                if self.state == CircuitState::HalfOpen && self.window.all(false) {
                    tracing::info!("circuit closed");
                    self.state = CircuitState::Closed;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail() -> Result<(), AppError> {
        Err(AppError::Sink("boom".into()))
    }

    #[test]
    fn test_window_empty_matches_both() {
        let window = RollingWindow::new(3);
        assert!(window.all(true));
        assert!(window.all(false));
    }

    #[test]
    fn test_window_partial_matches_stored_only() {
        let mut window = RollingWindow::new(3);
        window.add(true);
        assert!(window.all(true));
        assert!(!window.all(false));
    }

    #[test]
    fn test_window_wraps_at_capacity() {
        let mut window = RollingWindow::new(2);
        window.add(true);
        window.add(true);
        window.add(false);
        assert_eq!(window.values, [true, false]);
    }

    #[tokio::test]
    async fn test_first_failure_on_fresh_breaker_opens() {
        // The window starts empty, so a single failure is an all-failure
        // window.
        let mut cb = CircuitBreaker::new(Duration::from_secs(3600), 3);
        let err = cb.run(|| async { fail() }).await.unwrap_err();
        assert!(matches!(err, BreakerError::OpenCircuit));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_mixed_window_absorbs_failures() {
        let mut cb = CircuitBreaker::new(Duration::from_secs(3600), 3);
        cb.run(|| async { Ok::<(), AppError>(()) }).await.unwrap();
        // One failure amid successes is absorbed and the circuit stays
        // closed.
        cb.run(|| async { fail() }).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let mut cb = CircuitBreaker::new(Duration::from_secs(3600), 1);
        cb.run(|| async { fail() }).await.unwrap_err();

        let mut invoked = false;
        let err = cb
            .run(|| {
                invoked = true;
                async { Ok::<(), AppError>(()) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BreakerError::OpenCircuit));
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_half_open_recovery_closes() {
        let mut cb = CircuitBreaker::new(Duration::ZERO, 2);
        cb.run(|| async { fail() }).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        // wait_time elapsed immediately; successes refill the window until
        // it is clean.
        cb.run(|| async { Ok::<(), AppError>(()) }).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.run(|| async { Ok::<(), AppError>(()) }).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_is_system_failure() {
        let mut cb = CircuitBreaker::new(Duration::ZERO, 1);
        cb.run(|| async { fail() }).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        let err = cb.run(|| async { fail() }).await.unwrap_err();
        assert!(matches!(err, BreakerError::SystemFailure));
    }
}
