#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use futures::Stream;
use gdid_tonic_core::proto::{FILE_DESCRIPTOR_SET, gdid_authority_server::GdidAuthorityServer};
use server::config::{CliArgs, ServerConfig};
use server::service::handler::AuthorityService;
use server::telemetry::{TelemetryProviders, init_telemetry};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = ServerConfig::try_from(CliArgs::parse())?;

    let providers = init_telemetry()?;
    let service = AuthorityService::new(&config)?;

    if config.uds {
        #[cfg(unix)]
        {
            use tokio::net::UnixListener;
            use tokio_stream::wrappers::UnixListenerStream;

            let uds_path = config.server_addr.clone();
            let incoming = UnixListenerStream::new(UnixListener::bind(&uds_path)?);
            log_startup_info(&uds_path, &config);
            let res = serve(service, providers, incoming).await;
            let _ = std::fs::remove_file(&uds_path);
            res
        }
        #[cfg(not(unix))]
        {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    } else {
        let tcp = TcpListener::bind(&config.server_addr).await?;
        log_startup_info(&config.server_addr, &config);
        serve(service, providers, TcpListenerStream::new(tcp)).await
    }
}

async fn serve<I, IO, IE>(
    service: AuthorityService,
    providers: TelemetryProviders,
    incoming: I,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<GdidAuthorityServer<AuthorityService>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(authority_server(service))
        .serve_with_incoming_shutdown(incoming, shutdown_signal(health_reporter, providers))
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("Authority shut down successfully");
    Ok(())
}

fn log_startup_info(_addr: &str, _config: &ServerConfig) {
    #[cfg(feature = "tracing")]
    tracing::info!(
        authority = _config.authority_id,
        host = %_config.authority_host,
        era = _config.era,
        max_block_size = _config.max_block_size,
        "Starting GDID authority on {}",
        _addr
    );
}

fn authority_server(service: AuthorityService) -> GdidAuthorityServer<AuthorityService> {
    GdidAuthorityServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

async fn shutdown_signal(health_reporter: HealthReporter, providers: TelemetryProviders) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to install SIGTERM handler: {:?}", _e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to install Ctrl+C handler: {:?}", _e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    health_reporter
        .set_not_serving::<GdidAuthorityServer<AuthorityService>>()
        .await;

    providers.shutdown();
}
