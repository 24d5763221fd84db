use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "deskgate-core",
    version,
    about = "Deskgate Core (webhook ingestion and reconciliation for support channels)"
)]
pub struct Args {
    #[arg(long, env = "DESKGATE_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, env = "DESKGATE_PORT", default_value_t = 8787)]
    pub port: u16,

    #[arg(long, env = "DESKGATE_WHATSAPP_VERIFY_TOKEN")]
    pub whatsapp_verify_token: Option<String>,

    #[arg(long, env = "DESKGATE_DESK_WEBHOOK_SECRET")]
    pub desk_webhook_secret: Option<String>,

    #[arg(long, env = "DESKGATE_DEDUP_WINDOW_SECS", default_value_t = 5)]
    pub dedup_window_secs: u64,

    #[arg(long, env = "DESKGATE_MAX_PAYLOAD_BYTES", default_value_t = 2 * 1024 * 1024)]
    pub max_payload_bytes: usize,

    #[arg(
        long,
        env = "DESKGATE_DB_PATH",
        default_value = "./.deskgate-core/deskgate.db"
    )]
    pub db_path: PathBuf,

    #[arg(long, env = "DESKGATE_RUNTIME_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub runtime_version: String,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,

    #[arg(long, env = "DESKGATE_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

/// How inbound desk webhook deliveries are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskVerification {
    Insecure,
    Secret(String),
}

impl DeskVerification {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Insecure => "insecure-unsigned",
            Self::Secret(_) => "hmac-sha256",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host: IpAddr,
    pub port: u16,
    pub whatsapp_verify_token: Option<String>,
    pub desk_verification: DeskVerification,
    pub dedup_window: Duration,
    pub max_payload_bytes: usize,
    pub db_path: PathBuf,
    pub runtime_version: String,
    pub log_filter: String,
    pub json_logs: bool,
}

impl RuntimeConfig {
    pub fn from_args(args: Args) -> Result<Self, String> {
        let whatsapp_verify_token = normalize_secret(args.whatsapp_verify_token);
        let desk_verification = resolve_desk_verification(args.desk_webhook_secret);

        if args.port == 0 {
            return Err("port must be greater than 0".to_owned());
        }
        if args.dedup_window_secs == 0 {
            return Err("dedup_window_secs must be at least 1".to_owned());
        }
        if args.max_payload_bytes == 0 {
            return Err("max_payload_bytes must be greater than 0".to_owned());
        }

        Ok(Self {
            host: args.host,
            port: args.port,
            whatsapp_verify_token,
            desk_verification,
            dedup_window: Duration::from_secs(args.dedup_window_secs),
            max_payload_bytes: args.max_payload_bytes,
            db_path: args.db_path,
            runtime_version: args.runtime_version,
            log_filter: args.log_filter,
            json_logs: args.json_logs,
        })
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    #[must_use]
    pub fn dedup_window_ms(&self) -> u64 {
        u64::try_from(self.dedup_window.as_millis()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn for_test(host: IpAddr, port: u16, db_path: PathBuf) -> Self {
        Self {
            host,
            port,
            whatsapp_verify_token: Some("test-verify-token".to_owned()),
            desk_verification: DeskVerification::Insecure,
            dedup_window: Duration::from_secs(5),
            max_payload_bytes: 512 * 1024,
            db_path,
            runtime_version: "test".to_owned(),
            log_filter: "warn".to_owned(),
            json_logs: false,
        }
    }
}

fn normalize_secret(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn resolve_desk_verification(secret: Option<String>) -> DeskVerification {
    match normalize_secret(secret) {
        Some(secret) => DeskVerification::Secret(secret),
        None => DeskVerification::Insecure,
    }
}
