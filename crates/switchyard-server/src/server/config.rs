use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use switchyard_core::types::DEFAULT_TOKEN_HEADER;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};

/// Runtime configuration for the `switchyard-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first when present). They are resolved once at startup and
/// handed to the components that need them; nothing reads the environment
/// after that.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "switchyard-server",
    version,
    about = "A gRPC record store and streaming service behind an auth, logging and recovery chain"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:8080" or "/tmp/switchyard.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Shared secret every call must present in the token header.
    ///
    /// Environment variable: `SECRET_TOKEN`
    #[arg(long, env = "SECRET_TOKEN", hide_env_values = true)]
    pub secret_token: String,

    /// Name of the request header carrying the secret.
    ///
    /// Environment variable: `TOKEN_HEADER`
    #[arg(long, env = "TOKEN_HEADER", default_value_t = String::from(DEFAULT_TOKEN_HEADER))]
    pub token_header: String,

    /// Deployment flavor. Selects human-readable or JSON log output.
    ///
    /// Environment variable: `ENVIRONMENT`
    #[arg(long, env = "ENVIRONMENT", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// Capacity of the outbound buffer of a bidirectional stream.
    ///
    /// Once this many responses are queued and unread by the client, the
    /// handler waits before receiving the next inbound message.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub environment: Environment,
    pub stream_buffer_size: usize,
    pub auth: AuthConfig,
}

/// Header name and expected value for the auth interceptor.
#[derive(Clone)]
pub struct AuthConfig {
    pub header: AsciiMetadataKey,
    pub secret: AsciiMetadataValue,
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("header", &self.header)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl core::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("server_addr", &self.server_addr)
            .field("uds", &self.uds)
            .field("environment", &self.environment)
            .field("stream_buffer_size", &self.stream_buffer_size)
            .field("auth", &self.auth)
            .finish()
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.secret_token.is_empty() {
            bail!("SECRET_TOKEN must not be empty");
        }

        // Header values also admit obs-text (0x80..=0xFF); the secret may not.
        if !args.secret_token.is_ascii() {
            bail!("SECRET_TOKEN must be printable ASCII");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        let header = AsciiMetadataKey::from_bytes(args.token_header.as_bytes())
            .with_context(|| format!("TOKEN_HEADER ({}) is not a valid header name", args.token_header))?;
        let secret = AsciiMetadataValue::try_from(args.secret_token.as_str())
            .context("SECRET_TOKEN must be printable ASCII")?;

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            environment: args.environment,
            stream_buffer_size: args.stream_buffer_size,
            auth: AuthConfig { header, secret },
        })
    }
}
