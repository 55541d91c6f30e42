use crate::resilience::{BackoffPolicy, ErrorFilter, FilterError, NoBackoff, SuccessFilter};
use crate::time::{Clock, RealClock};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What to do when the retry budget runs out while the success filter still rejects the value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OnExhausted {
    /// Hand back the last value anyway.
    AcceptLastResult,
    Fail,
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("Operation failed after {attempts} attempt(s): {source}")]
    Failed { attempts: u32, source: E },
    #[error("Retry filter raised after {attempts} attempt(s): {source}")]
    FilterFailed { attempts: u32, source: FilterError },
    #[error("Operation timed out after {timeout:?} ({attempts} attempt(s) started)")]
    TimedOut { timeout: Duration, attempts: u32 },
    #[error("No acceptable result after {attempts} attempt(s)")]
    NotAccepted { attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Failed { attempts, .. }
            | RetryError::FilterFailed { attempts, .. }
            | RetryError::TimedOut { attempts, .. }
            | RetryError::NotAccepted { attempts } => *attempts,
        }
    }

    /// The error returned by the final attempt, if that is what ended the operation.
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Failed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Retrier runs an async operation up to `max_retries + 1` times.
///
/// Each attempt receives its zero-based index. A failed attempt is retried only while budget
/// remains and the error filter agrees; a successful attempt is retried only while budget remains
/// and the success filter (if any) says the value is not final yet. Between attempts the matching
/// backoff policy is consulted. An overall timeout, if set, cancels whatever attempt is in flight.
///
/// The error filter is consulted only while budget remains. The success filter is also asked
/// about the last value when `OnExhausted::Fail` is set, since that decides success or failure.
pub struct Retrier<T, E> {
    max_retries: u32,
    error_filter: Arc<dyn ErrorFilter<E>>,
    success_filter: Option<Arc<dyn SuccessFilter<T>>>,
    error_backoff: Arc<dyn BackoffPolicy>,
    success_backoff: Arc<dyn BackoffPolicy>,
    overall_timeout: Option<Duration>,
    on_exhausted: OnExhausted,
}

impl<T, E> Clone for Retrier<T, E> {
    fn clone(&self) -> Self {
        Retrier {
            max_retries: self.max_retries,
            error_filter: self.error_filter.clone(),
            success_filter: self.success_filter.clone(),
            error_backoff: self.error_backoff.clone(),
            success_backoff: self.success_backoff.clone(),
            overall_timeout: self.overall_timeout,
            on_exhausted: self.on_exhausted,
        }
    }
}

impl<T, E> Retrier<T, E>
where
    T: Send,
    E: Send + 'static,
{
    /// Retries every error, without delay, and accepts the first successful value.
    pub fn new(max_retries: u32) -> Self {
        Retrier {
            max_retries,
            error_filter: Arc::new(|_: &E, _: u32| Ok::<bool, FilterError>(true)),
            success_filter: None,
            error_backoff: Arc::new(NoBackoff),
            success_backoff: Arc::new(NoBackoff),
            overall_timeout: None,
            on_exhausted: OnExhausted::AcceptLastResult,
        }
    }

    pub fn retry_if<F>(self, filter: F) -> Self
    where
        F: Fn(&E, u32) -> Result<bool, FilterError> + Send + Sync + 'static,
    {
        self.with_error_filter(filter)
    }

    pub fn with_error_filter(mut self, filter: impl ErrorFilter<E> + 'static) -> Self {
        self.error_filter = Arc::new(filter);
        self
    }

    pub fn accept_if<F>(self, filter: F) -> Self
    where
        F: Fn(&T, u32) -> Result<bool, FilterError> + Send + Sync + 'static,
        T: 'static,
    {
        self.with_success_filter(filter)
    }

    pub fn with_success_filter(mut self, filter: impl SuccessFilter<T> + 'static) -> Self {
        self.success_filter = Some(Arc::new(filter));
        self
    }

    /// Delay applied after a failed attempt.
    pub fn with_backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.error_backoff = Arc::new(backoff);
        self
    }

    /// Delay applied after a successful attempt whose value was not accepted. Independent of the
    /// error backoff, and none unless set.
    pub fn with_success_backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.success_backoff = Arc::new(backoff);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = Some(timeout);
        self
    }

    pub fn on_exhausted(mut self, on_exhausted: OnExhausted) -> Self {
        self.on_exhausted = on_exhausted;
        self
    }

    pub async fn operate<F, Fut>(&self, func: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        self.operate_with_clock(RealClock, func).await
    }

    pub async fn operate_with_clock<C, F, Fut>(&self, clock: C, func: F) -> Result<T, RetryError<E>>
    where
        C: Clock,
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let attempts_started = AtomicU32::new(0);

        match self.overall_timeout {
            None => self.run_attempts(clock, func, &attempts_started).await,
            Some(timeout) => {
                let mut deadline_clock = clock.clone();
                let deadline = clock.now() + timeout;

                tokio::select! {
                    result = self.run_attempts(clock, func, &attempts_started) => result,
                    _ = deadline_clock.sleep_until(deadline) => Err(RetryError::TimedOut {
                        timeout,
                        attempts: attempts_started.load(Ordering::Relaxed),
                    }),
                }
            }
        }
    }

    async fn run_attempts<C, F, Fut>(
        &self,
        mut clock: C,
        mut func: F,
        attempts_started: &AtomicU32,
    ) -> Result<T, RetryError<E>>
    where
        C: Clock,
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let mut attempt = 0u32;
        loop {
            attempts_started.store(attempt + 1, Ordering::Relaxed);
            let budget_left = attempt < self.max_retries;

            let backoff = match func(attempt).await {
                Ok(value) => {
                    let filter = match &self.success_filter {
                        Some(filter) => filter,
                        None => return Ok(value),
                    };

                    if !budget_left && self.on_exhausted == OnExhausted::AcceptLastResult {
                        return Ok(value);
                    }

                    let is_final = filter
                        .is_final(&value, attempt)
                        .map_err(|source| RetryError::FilterFailed {
                            attempts: attempt + 1,
                            source,
                        })?;
                    if is_final {
                        return Ok(value);
                    }
                    if !budget_left {
                        return Err(RetryError::NotAccepted { attempts: attempt + 1 });
                    }

                    &self.success_backoff
                }
                Err(error) => {
                    if !budget_left {
                        return Err(RetryError::Failed {
                            attempts: attempt + 1,
                            source: error,
                        });
                    }

                    let retry = self
                        .error_filter
                        .should_retry(&error, attempt)
                        .map_err(|source| RetryError::FilterFailed {
                            attempts: attempt + 1,
                            source,
                        })?;
                    if !retry {
                        return Err(RetryError::Failed {
                            attempts: attempt + 1,
                            source: error,
                        });
                    }

                    &self.error_backoff
                }
            };

            if let Some(delay) = backoff.next_delay(attempt) {
                clock.sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
