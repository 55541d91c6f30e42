use crate::directory::{DirectoryStore, StoreError};
use crate::options::DirectoryOptionsValidated;
use crate::resilience::{FixedBackoff, OnExhausted, RetryError, Retrier};
use crate::types::{GrainAddress, GrainId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Result of a registration attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RegisterOutcome {
    /// The candidate is now the authoritative entry.
    Registered(GrainAddress),
    /// Another activation got there first. The caller must deactivate its candidate.
    RaceLost { winner: GrainAddress },
}

impl RegisterOutcome {
    pub fn authoritative(&self) -> &GrainAddress {
        match self {
            RegisterOutcome::Registered(entry) => entry,
            RegisterOutcome::RaceLost { winner } => winner,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, RegisterOutcome::Registered(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The backing store's own error, after any transient retries were spent.
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Directory operation timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Entry kept changing underneath us for {rounds} round(s)")]
    Contended { rounds: u32 },
    #[error("Retry filter failed: {0}")]
    Filter(String),
}

impl From<RetryError<StoreError>> for DirectoryError {
    fn from(e: RetryError<StoreError>) -> Self {
        match e {
            RetryError::Failed { source, .. } => DirectoryError::Store(source),
            RetryError::TimedOut { timeout, .. } => DirectoryError::TimedOut(timeout),
            RetryError::NotAccepted { attempts } => DirectoryError::Contended { rounds: attempts },
            RetryError::FilterFailed { source, .. } => DirectoryError::Filter(source.0),
        }
    }
}

pub struct DirectoryConfig {
    pub logger: slog::Logger,
    pub options: DirectoryOptionsValidated,
}

/// GrainDirectory maps grain ids to their one authoritative activation.
///
/// Every operation is a read of the current entry followed, if needed, by a conditional write
/// that only succeeds if nobody touched the entry since the read. A conditional write that loses
/// to a concurrent writer doesn't decide anything by itself: the round is re-run against a fresh
/// read. Transient store errors re-run the round too, after a fixed backoff.
pub struct GrainDirectory<S: DirectoryStore> {
    logger: slog::Logger,
    options: DirectoryOptionsValidated,
    store: S,
}

impl<S: DirectoryStore> GrainDirectory<S> {
    pub fn new(config: DirectoryConfig, store: S) -> Self {
        GrainDirectory {
            logger: config.logger.new(slog::o!("component" => "grain_directory")),
            options: config.options,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Makes `candidate` the authoritative entry for its grain, if it may.
    ///
    /// - No entry: `candidate` is stored.
    /// - Entry equal to `previous`: replaced by `candidate`.
    /// - Any other entry: left unchanged and returned as the race winner.
    pub async fn register(
        &self,
        candidate: &GrainAddress,
        previous: Option<&GrainAddress>,
    ) -> Result<RegisterOutcome, DirectoryError> {
        let outcome = self
            .rounds()
            .operate(|_| self.register_round(candidate, previous))
            .await?
            .ok_or(DirectoryError::Contended {
                rounds: self.options.max_store_retries + 1,
            })?;

        match &outcome {
            RegisterOutcome::Registered(entry) => {
                slog::debug!(self.logger, "Registered {} as {:?}", entry.grain_id, entry.activation_id)
            }
            RegisterOutcome::RaceLost { winner } => slog::info!(
                self.logger,
                "Registration of {:?} for {} lost to {:?} on {}",
                candidate.activation_id,
                candidate.grain_id,
                winner.activation_id,
                winner.silo_address
            ),
        }

        Ok(outcome)
    }

    pub async fn lookup(&self, grain_id: &GrainId) -> Result<Option<GrainAddress>, DirectoryError> {
        let current = self
            .store_calls()
            .operate(|_| self.store.read(grain_id))
            .await?;

        Ok(current.map(|(entry, _)| entry))
    }

    /// Removes `entry` iff the stored entry is exactly equal to it. Returns whether it was removed.
    ///
    /// If a delete failed transiently and the entry is gone on the next round, that delete is
    /// taken to be what removed it.
    pub async fn unregister(&self, entry: &GrainAddress) -> Result<bool, DirectoryError> {
        let delete_unconfirmed = AtomicBool::new(false);
        let removed = self
            .rounds()
            .operate(|_| self.unregister_round(entry, &delete_unconfirmed))
            .await?
            .ok_or(DirectoryError::Contended {
                rounds: self.options.max_store_retries + 1,
            })?;

        if !removed {
            slog::debug!(
                self.logger,
                "Left {} in place, stored entry is not {:?}",
                entry.grain_id,
                entry.activation_id
            );
        }

        Ok(removed)
    }

    /// Unregisters every entry independently and concurrently. Stale entries are skipped without
    /// affecting the rest. Returns how many were removed; if any failed, the first error is
    /// returned once all of them have been attempted.
    pub async fn unregister_many(&self, entries: &[GrainAddress]) -> Result<usize, DirectoryError> {
        let results = futures::future::join_all(entries.iter().map(|entry| self.unregister(entry))).await;

        let mut removed = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    slog::warn!(self.logger, "Batch unregister failed for one entry: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        slog::debug!(self.logger, "Batch unregister removed {} of {}", removed, entries.len());
        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// `Ok(None)` means a conditional write lost to a concurrent writer and the round must re-run.
    async fn register_round(
        &self,
        candidate: &GrainAddress,
        previous: Option<&GrainAddress>,
    ) -> Result<Option<RegisterOutcome>, StoreError> {
        let (existing, version) = match self.store.read(&candidate.grain_id).await? {
            Some(current) => current,
            None => {
                return Ok(if self.store.insert_if_absent(candidate).await? {
                    Some(RegisterOutcome::Registered(candidate.clone()))
                } else {
                    None
                });
            }
        };

        if existing == *candidate {
            // Already ours, e.g. an earlier round's write landed but reported an error.
            return Ok(Some(RegisterOutcome::Registered(existing)));
        }

        if previous != Some(&existing) {
            return Ok(Some(RegisterOutcome::RaceLost { winner: existing }));
        }

        Ok(if self.store.replace_if_version(candidate, version).await? {
            Some(RegisterOutcome::Registered(candidate.clone()))
        } else {
            None
        })
    }

    async fn unregister_round(
        &self,
        entry: &GrainAddress,
        delete_unconfirmed: &AtomicBool,
    ) -> Result<Option<bool>, StoreError> {
        match self.store.read(&entry.grain_id).await? {
            Some((existing, version)) if existing == *entry => {
                match self.store.delete_if_version(&entry.grain_id, version).await {
                    Ok(true) => Ok(Some(true)),
                    Ok(false) => Ok(None),
                    Err(e) => {
                        // The delete may still have landed.
                        delete_unconfirmed.store(true, Ordering::Relaxed);
                        Err(e)
                    }
                }
            }
            _ => Ok(Some(delete_unconfirmed.load(Ordering::Relaxed))),
        }
    }

    fn store_calls<T: Send + 'static>(&self) -> Retrier<T, StoreError> {
        Retrier::new(self.options.max_store_retries)
            .retry_if(|e: &StoreError, _| Ok(e.is_transient()))
            .with_backoff(FixedBackoff::new(self.options.store_backoff))
            .with_timeout(self.options.operation_timeout)
    }

    fn rounds<T: Send + 'static>(&self) -> Retrier<Option<T>, StoreError> {
        self.store_calls()
            .accept_if(|outcome: &Option<T>, _| Ok(outcome.is_some()))
            .on_exhausted(OnExhausted::Fail)
    }
}
