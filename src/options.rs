use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid options: {0}")]
pub struct OptionsError(&'static str);

/// Tuning knobs for a silo-to-silo link. Anything left as `None` gets a default.
#[derive(Clone, Debug, Default)]
pub struct LinkOptions {
    pub handshake_timeout: Option<Duration>,
    /// How many times a message may be resubmitted for routing after a transient send failure.
    pub max_retry_count: Option<u32>,
    pub outbound_queue_size: Option<usize>,
    pub max_frame_length: Option<usize>,
    pub connect_retries: Option<u32>,
    pub connect_backoff_base: Option<Duration>,
    pub connect_backoff_max: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct LinkOptionsValidated {
    pub handshake_timeout: Duration,
    pub max_retry_count: u32,
    pub outbound_queue_size: usize,
    pub max_frame_length: usize,
    pub connect_retries: u32,
    pub connect_backoff_base: Duration,
    pub connect_backoff_max: Duration,
}

impl LinkOptionsValidated {
    fn fill_defaults(options: LinkOptions) -> Self {
        LinkOptionsValidated {
            handshake_timeout: options.handshake_timeout.unwrap_or(Duration::from_secs(5)),
            max_retry_count: options.max_retry_count.unwrap_or(2),
            outbound_queue_size: options.outbound_queue_size.unwrap_or(256),
            max_frame_length: options.max_frame_length.unwrap_or(8 * 1024 * 1024),
            connect_retries: options.connect_retries.unwrap_or(3),
            connect_backoff_base: options.connect_backoff_base.unwrap_or(Duration::from_millis(100)),
            connect_backoff_max: options.connect_backoff_max.unwrap_or(Duration::from_secs(2)),
        }
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.handshake_timeout == Duration::from_secs(0) {
            return Err(OptionsError("Handshake timeout must be non-zero"));
        }
        if self.outbound_queue_size == 0 {
            return Err(OptionsError("Outbound queue must hold at least one message"));
        }
        if self.max_frame_length < 1024 {
            return Err(OptionsError("Max frame length must be at least 1 KiB"));
        }
        if self.connect_backoff_base > self.connect_backoff_max {
            return Err(OptionsError("Connect backoff base must not exceed its maximum"));
        }

        Ok(())
    }
}

impl TryFrom<LinkOptions> for LinkOptionsValidated {
    type Error = OptionsError;

    fn try_from(options: LinkOptions) -> Result<Self, Self::Error> {
        let values = LinkOptionsValidated::fill_defaults(options);
        values.validate()?;
        Ok(values)
    }
}

impl Default for LinkOptionsValidated {
    fn default() -> Self {
        LinkOptionsValidated::fill_defaults(LinkOptions::default())
    }
}

#[derive(Clone, Debug, Default)]
pub struct DirectoryOptions {
    /// Retries of a single store call that failed transiently. Also bounds how many
    /// read-then-write rounds one register/unregister may take.
    pub max_store_retries: Option<u32>,
    pub store_backoff: Option<Duration>,
    pub operation_timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct DirectoryOptionsValidated {
    pub max_store_retries: u32,
    pub store_backoff: Duration,
    pub operation_timeout: Duration,
}

impl DirectoryOptionsValidated {
    fn fill_defaults(options: DirectoryOptions) -> Self {
        DirectoryOptionsValidated {
            max_store_retries: options.max_store_retries.unwrap_or(3),
            store_backoff: options.store_backoff.unwrap_or(Duration::from_millis(50)),
            operation_timeout: options.operation_timeout.unwrap_or(Duration::from_secs(10)),
        }
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.operation_timeout == Duration::from_secs(0) {
            return Err(OptionsError("Directory operation timeout must be non-zero"));
        }
        if self.store_backoff >= self.operation_timeout {
            return Err(OptionsError("Store backoff must be less than the operation timeout"));
        }

        Ok(())
    }
}

impl TryFrom<DirectoryOptions> for DirectoryOptionsValidated {
    type Error = OptionsError;

    fn try_from(options: DirectoryOptions) -> Result<Self, Self::Error> {
        let values = DirectoryOptionsValidated::fill_defaults(options);
        values.validate()?;
        Ok(values)
    }
}

impl Default for DirectoryOptionsValidated {
    fn default() -> Self {
        DirectoryOptionsValidated::fill_defaults(DirectoryOptions::default())
    }
}
