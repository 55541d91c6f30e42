/// Raised by a filter that could not make up its mind. Always ends the operation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct FilterError(pub String);

/// Decides whether a failed attempt is worth another try.
pub trait ErrorFilter<E>: Send + Sync {
    fn should_retry(&self, error: &E, attempt: u32) -> Result<bool, FilterError>;
}

impl<E, F> ErrorFilter<E> for F
where
    F: Fn(&E, u32) -> Result<bool, FilterError> + Send + Sync,
{
    fn should_retry(&self, error: &E, attempt: u32) -> Result<bool, FilterError> {
        self(error, attempt)
    }
}

/// Decides whether a successful attempt's value is the final answer.
pub trait SuccessFilter<T>: Send + Sync {
    fn is_final(&self, value: &T, attempt: u32) -> Result<bool, FilterError>;
}

impl<T, F> SuccessFilter<T> for F
where
    F: Fn(&T, u32) -> Result<bool, FilterError> + Send + Sync,
{
    fn is_final(&self, value: &T, attempt: u32) -> Result<bool, FilterError> {
        self(value, attempt)
    }
}
