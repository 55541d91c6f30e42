//! Bounded retries with pluggable backoff and error/success filters.
mod backoff;
mod executor;
mod filters;

pub use backoff::BackoffPolicy;
pub use backoff::ExponentialBackoff;
pub use backoff::FixedBackoff;
pub use backoff::NoBackoff;
pub use executor::OnExhausted;
pub use executor::RetryError;
pub use executor::Retrier;
pub use filters::ErrorFilter;
pub use filters::FilterError;
pub use filters::SuccessFilter;
