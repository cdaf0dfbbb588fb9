//! Conversions between wire messages and core types.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gdid::{BlockRequest, Error, GdidBlock};

use crate::proto::{AllocateBlockRequest, AllocateBlockResponse};

impl From<&BlockRequest> for AllocateBlockRequest {
    fn from(request: &BlockRequest) -> Self {
        Self {
            scope_name: request.scope_name.clone(),
            sequence_name: request.sequence_name.clone(),
            block_size: request.block_size,
            vicinity: request.vicinity,
        }
    }
}

impl From<AllocateBlockRequest> for BlockRequest {
    fn from(request: AllocateBlockRequest) -> Self {
        Self::new(request.scope_name, request.sequence_name, request.block_size)
            .with_vicinity(request.vicinity)
    }
}

impl From<&GdidBlock> for AllocateBlockResponse {
    fn from(block: &GdidBlock) -> Self {
        let server_utc_millis = block
            .server_utc
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

        Self {
            scope_name: block.scope_name.clone(),
            sequence_name: block.sequence_name.clone(),
            authority: u32::from(block.authority),
            authority_host: block.authority_host.clone(),
            era: block.era,
            start_counter_inclusive: block.start_counter_inclusive,
            block_size: block.block_size,
            server_utc_millis,
        }
    }
}

impl TryFrom<AllocateBlockResponse> for GdidBlock {
    type Error = Error;

    /// Rebuilds a block from the wire and validates it.
    fn try_from(response: AllocateBlockResponse) -> Result<Self, Error> {
        let authority = u8::try_from(response.authority).map_err(|_| Error::MalformedBlock {
            reason: format!("authority {} out of range", response.authority),
        })?;
        let server_utc = UNIX_EPOCH
            .checked_add(Duration::from_millis(response.server_utc_millis))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let block = Self {
            scope_name: response.scope_name,
            sequence_name: response.sequence_name,
            authority,
            authority_host: response.authority_host,
            era: response.era,
            start_counter_inclusive: response.start_counter_inclusive,
            block_size: response.block_size,
            server_utc,
        };
        block.validate()?;
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdid::{DEFAULT_VICINITY, Gdid};

    fn response() -> AllocateBlockResponse {
        AllocateBlockResponse {
            scope_name: "orders".into(),
            sequence_name: "line".into(),
            authority: 3,
            authority_host: "auth-3".into(),
            era: 2,
            start_counter_inclusive: 5000,
            block_size: 100,
            server_utc_millis: 1_700_000_000_123,
        }
    }

    #[test]
    fn request_keeps_vicinity() {
        let wire = AllocateBlockRequest::from(&BlockRequest::new("s", "q", 10));
        assert_eq!(wire.vicinity, DEFAULT_VICINITY);

        let back = BlockRequest::from(AllocateBlockRequest { vicinity: 4, ..wire });
        assert_eq!(back, BlockRequest::new("s", "q", 10).with_vicinity(4));
    }

    #[test]
    fn response_decodes_into_a_valid_block() {
        let block = GdidBlock::try_from(response()).unwrap();
        assert_eq!(block.authority, 3);
        assert_eq!(block.end_exclusive(), 5100);
        assert_eq!(
            block.server_utc.duration_since(UNIX_EPOCH).unwrap(),
            Duration::from_millis(1_700_000_000_123)
        );
        assert_eq!(AllocateBlockResponse::from(&block), response());
    }

    #[test]
    fn malformed_responses_are_rejected() {
        let zero = AllocateBlockResponse {
            block_size: 0,
            ..response()
        };
        let authority = AllocateBlockResponse {
            authority: 300,
            ..response()
        };
        let overflow = AllocateBlockResponse {
            start_counter_inclusive: Gdid::MAX_COUNTER,
            block_size: 2,
            ..response()
        };

        for bad in [zero, authority, overflow] {
            assert!(matches!(
                GdidBlock::try_from(bad),
                Err(Error::MalformedBlock { .. })
            ));
        }
    }
}
