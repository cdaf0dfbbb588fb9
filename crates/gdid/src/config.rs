use core::time::Duration;

use crate::{
    atom::Atom,
    error::{Error, Result},
    gdid::{DEFAULT_VICINITY, Gdid},
};

/// Tuning for [`crate::GdidAllocator`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AllocatorConfig {
    /// Hard cap on a single allocation and on any block requested. Should not
    /// exceed what the authority is willing to issue.
    pub max_block_size: u64,
    /// Block size requested on refill when the caller asks for fewer ids.
    pub default_block_size: u64,
    /// Locality hint forwarded with every block request.
    pub vicinity: u64,
    /// Deadline for one refill in milliseconds. Every caller attached to a
    /// refill that times out fails with the same error.
    pub refill_timeout_ms: Option<u64>,
}

impl AllocatorConfig {
    pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 16_384;
    pub const DEFAULT_BLOCK_SIZE: u64 = 1_024;

    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if either size is zero, the default
    /// exceeds the cap, or the cap exceeds the counter space.
    pub fn validate(&self) -> Result<()> {
        if self.max_block_size == 0 || self.max_block_size > Gdid::MAX_COUNTER {
            return Err(Error::invalid_request(format!(
                "max block size must be in 1..={}",
                Gdid::MAX_COUNTER
            )));
        }
        if self.default_block_size == 0 || self.default_block_size > self.max_block_size {
            return Err(Error::invalid_request(format!(
                "default block size must be in 1..={}",
                self.max_block_size
            )));
        }
        Ok(())
    }

    pub fn refill_timeout(&self) -> Option<Duration> {
        self.refill_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_block_size: Self::DEFAULT_MAX_BLOCK_SIZE,
            default_block_size: Self::DEFAULT_BLOCK_SIZE,
            vicinity: DEFAULT_VICINITY,
            refill_timeout_ms: None,
        }
    }
}

/// Selects how [`crate::AuthorityAccessor`] obtains blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum AccessorConfig {
    /// Ask a sharded remote authority over the service client.
    Remote {
        remote_address: String,
        contract: String,
        network: Atom,
        binding: Atom,
        /// Deadline for one remote call in milliseconds, failover included.
        #[cfg_attr(feature = "serde", serde(default))]
        call_timeout_ms: Option<u64>,
    },
    /// Serve blocks from an in-process ledger. Not unique across processes.
    Local {
        authority: u8,
        era: u32,
        #[cfg_attr(feature = "serde", serde(default = "default_local_max_block_size"))]
        max_block_size: u64,
    },
}

impl AccessorConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        match self {
            Self::Remote { call_timeout_ms, .. } => call_timeout_ms.map(Duration::from_millis),
            Self::Local { .. } => None,
        }
    }
}

#[cfg(feature = "serde")]
const fn default_local_max_block_size() -> u64 {
    AllocatorConfig::DEFAULT_MAX_BLOCK_SIZE
}
