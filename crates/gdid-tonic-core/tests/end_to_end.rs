use std::{collections::HashSet, net::SocketAddr, sync::Arc, time::Duration};

use gdid_tonic_core::{
    TonicConnector,
    gdid::{
        AllocatorConfig, Atom, BlockLedger, Endpoint, EndpointRegistry, Error, Gdid,
        GdidAllocator, RemoteBlockSource, RequestKey, ServiceClient,
    },
    error_to_status,
    proto::{
        AllocateBlockRequest, AllocateBlockResponse,
        gdid_authority_server::{GdidAuthority, GdidAuthorityServer},
    },
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status, transport::Server};

struct LedgerAuthority {
    ledger: BlockLedger,
}

#[tonic::async_trait]
impl GdidAuthority for LedgerAuthority {
    async fn allocate_block(
        &self,
        request: Request<AllocateBlockRequest>,
    ) -> Result<Response<AllocateBlockResponse>, Status> {
        let request = request.into_inner().into();
        let block = self.ledger.issue(&request).map_err(|e| error_to_status(&e))?;
        Ok(Response::new(AllocateBlockResponse::from(&block)))
    }
}

fn ledger(authority: u8) -> BlockLedger {
    BlockLedger::new(authority, format!("authority-{authority}"), 1, 100).unwrap()
}

async fn spawn_authority(ledger: BlockLedger) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = LedgerAuthority { ledger };
    tokio::spawn(
        Server::builder()
            .add_service(GdidAuthorityServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    addr
}

fn atom(s: &str) -> Atom {
    s.parse().unwrap()
}

fn endpoint(shard: u32, order: i32, node: String) -> Endpoint {
    Endpoint::new("sky://*", "gdid", atom("noc"), atom("grpc"), shard, order, node).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn allocates_across_sharded_authorities_with_failover() {
    let a = spawn_authority(ledger(0)).await;
    let b = spawn_authority(ledger(1)).await;

    let registry = EndpointRegistry::with_endpoints([
        // Nothing listens on port 1; the client must fail over to `a`.
        endpoint(0, 0, "http://127.0.0.1:1".to_owned()),
        endpoint(0, 1, format!("http://{a}")),
        endpoint(1, 0, format!("http://{b}")),
    ]);
    let connector = TonicConnector::new().with_connect_timeout(Duration::from_secs(1));
    let client = Arc::new(ServiceClient::new(Arc::new(registry), connector));
    let source = RemoteBlockSource::new(
        client,
        RequestKey::new("sky://gdid", "gdid", atom("noc"), atom("grpc")),
    )
    .with_call_timeout(Duration::from_secs(10));

    let config = AllocatorConfig {
        max_block_size: 100,
        default_block_size: 100,
        ..AllocatorConfig::default()
    };
    let allocator = GdidAllocator::with_config(source, config).unwrap();

    let mut ids = HashSet::new();
    let mut authorities = HashSet::new();
    for _ in 0..250 {
        let id = allocator.allocate_one("orders", "line").await.unwrap();
        authorities.insert(id.authority());
        assert!(ids.insert(id), "duplicate id {id}");
    }

    // Three refills rotate over shard 0, shard 1, shard 0.
    assert_eq!(authorities, HashSet::from([0, 1]));
    assert_eq!(ids.len(), 250);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exhausted_authority_is_not_failed_over() {
    let exhausted = ledger(0);
    exhausted.seed("orders", "line", Gdid::MAX_COUNTER + 1);
    let a = spawn_authority(exhausted).await;
    let b = spawn_authority(ledger(0)).await;

    // Both replicas serve shard 0; only a transient failure would reach `b`.
    let registry = EndpointRegistry::with_endpoints([
        endpoint(0, 0, format!("http://{a}")),
        endpoint(0, 1, format!("http://{b}")),
    ]);
    let client = Arc::new(ServiceClient::new(Arc::new(registry), TonicConnector::new()));
    let source = RemoteBlockSource::new(
        client,
        RequestKey::new("sky://gdid", "gdid", atom("noc"), atom("grpc")),
    );
    let allocator = GdidAllocator::new(source);

    let err = allocator.allocate_one("orders", "line").await.unwrap_err();
    assert_eq!(
        err,
        Error::EraExhausted {
            scope: "orders".into(),
            sequence: "line".into(),
        }
    );
    assert_eq!(allocator.cursor_remaining("orders", "line"), None);

    // Other sequences on the same authority are unaffected.
    let id = allocator.allocate_one("orders", "header").await.unwrap();
    assert_eq!(id.counter(), 0);
}
