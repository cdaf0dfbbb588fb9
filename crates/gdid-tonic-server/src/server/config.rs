use anyhow::bail;
use clap::Parser;
use gdid_tonic_core::gdid::Gdid;

/// Runtime configuration for the `gdid-tonic-server` binary.
///
/// The authority keeps its counters in memory only. Every restart must come
/// up with a higher `ERA` than the previous run, otherwise it will hand out
/// blocks it already issued.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gdid-tonic-server",
    version,
    about = "A gRPC authority issuing non-overlapping GDID counter blocks"
)]
pub struct CliArgs {
    /// Authority id stamped into every block and id (0..=15).
    ///
    /// Authorities serving the same scopes must have distinct ids.
    ///
    /// Environment variable: `AUTHORITY_ID`
    #[arg(long, env = "AUTHORITY_ID", default_value_t = 0)]
    pub authority_id: u8,

    /// Host name reported back in every block.
    ///
    /// Environment variable: `AUTHORITY_HOST`
    #[arg(long, env = "AUTHORITY_HOST", default_value_t = String::from("gdid-authority"))]
    pub authority_host: String,

    /// Generation of this authority's counter space. Required; bump it on
    /// every restart.
    ///
    /// Environment variable: `ERA`
    #[arg(long, env = "ERA")]
    pub era: u32,

    /// Largest block handed out per request. Larger requests are capped.
    ///
    /// Environment variable: `MAX_BLOCK_SIZE`
    #[arg(long, env = "MAX_BLOCK_SIZE", default_value_t = 16_384)]
    pub max_block_size: u64,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/gdid.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    ///
    /// Environment variable: `UDS`
    #[arg(short, long, env = "UDS", default_value_t = false)]
    pub uds: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub authority_id: u8,
    pub authority_host: String,
    pub era: u32,
    pub max_block_size: u64,
    pub server_addr: String,
    pub uds: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.authority_id > Gdid::MAX_AUTHORITY {
            bail!(
                "AUTHORITY_ID ({}) exceeds the authority id space (max = {})",
                args.authority_id,
                Gdid::MAX_AUTHORITY
            );
        }

        if args.max_block_size == 0 || args.max_block_size > Gdid::MAX_COUNTER {
            bail!(
                "MAX_BLOCK_SIZE ({}) must be in 1..={}",
                args.max_block_size,
                Gdid::MAX_COUNTER
            );
        }

        if args.authority_host.trim().is_empty() {
            bail!("AUTHORITY_HOST must not be blank");
        }

        Ok(Self {
            authority_id: args.authority_id,
            authority_host: args.authority_host,
            era: args.era,
            max_block_size: args.max_block_size,
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}
