//! gRPC service implementation for block allocation.
//!
//! [`AuthorityService`] implements the [`GdidAuthority`] service from the
//! protobuf definition on top of an in-memory [`BlockLedger`]. Every call
//! reserves the next block of a `(scope, sequence)` counter; blocks for the
//! same sequence never overlap within one era.

use crate::server::{
    config::ServerConfig,
    telemetry::{
        increment_blocks_issued, increment_counters_issued, increment_request_errors,
        record_request_duration,
    },
};
use gdid_tonic_core::{
    error_to_status,
    gdid::{BlockLedger, BlockRequest},
    proto::{AllocateBlockRequest, AllocateBlockResponse, gdid_authority_server::GdidAuthority},
};
use std::{sync::Arc, time::Instant};
use tonic::{Request, Response, Status};

/// Block-issuing authority backed by a [`BlockLedger`].
///
/// Cloning shares the ledger.
#[derive(Clone)]
pub struct AuthorityService {
    ledger: Arc<BlockLedger>,
}

impl AuthorityService {
    /// Creates a service with an empty ledger for the configured authority
    /// and era.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let ledger = BlockLedger::new(
            config.authority_id,
            config.authority_host.as_str(),
            config.era,
            config.max_block_size,
        )?;
        Ok(Self {
            ledger: Arc::new(ledger),
        })
    }

    pub fn ledger(&self) -> &BlockLedger {
        &self.ledger
    }
}

#[tonic::async_trait]
impl GdidAuthority for AuthorityService {
    /// Reserves the next block for the requested sequence.
    ///
    /// If `metrics` is enabled, emits telemetry for:
    /// - blocks issued
    /// - counters issued
    /// - request errors
    /// - request duration
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            skip_all,
            fields(
                scope = %req.get_ref().scope_name,
                sequence = %req.get_ref().sequence_name,
                size = req.get_ref().block_size,
            )
        )
    )]
    async fn allocate_block(
        &self,
        req: Request<AllocateBlockRequest>,
    ) -> Result<Response<AllocateBlockResponse>, Status> {
        let start = Instant::now();
        let request = BlockRequest::from(req.into_inner());

        match self.ledger.issue(&request) {
            Ok(block) => {
                increment_blocks_issued();
                increment_counters_issued(block.block_size);
                record_request_duration(start.elapsed().as_secs_f64() * 1000.0);

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    start = block.start_counter_inclusive,
                    size = block.block_size,
                    "Block issued"
                );

                Ok(Response::new(AllocateBlockResponse::from(&block)))
            }
            Err(e) => {
                increment_request_errors();

                #[cfg(feature = "tracing")]
                tracing::warn!("Error: {}", e);

                Err(error_to_status(&e))
            }
        }
    }
}
