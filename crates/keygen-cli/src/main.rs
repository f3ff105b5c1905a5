//! LitLayer Keygen
//!
//! Creates trading-key sessions for LitLayer agents and inspects the ones
//! already stored.

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use litlayer_core::config::Config;
use litlayer_core::signing::{recover_address, Environment};
use litlayer_core::types::SessionRecord;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trading_session::{
    parse_address, unix_now, FileSessionStore, MemorySessionStore, SessionManager, SessionStore,
};

#[derive(Parser)]
#[command(name = "litlayer-keygen")]
#[command(about = "Create and inspect LitLayer trading-key sessions")]
struct Cli {
    /// Session store directory (overrides SESSION_STORE_DIR)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a trading key and sign an agent registration
    Create {
        /// Wallet delegating authority
        #[arg(long)]
        wallet: String,

        /// Agent address to authorize
        #[arg(long)]
        agent: String,

        /// Platform identifier (defaults to LITLAYER_PLATFORM)
        #[arg(long)]
        platform: Option<String>,

        /// Devnet, Testnet or Mainnet (defaults to LITLAYER_ENVIRONMENT)
        #[arg(long)]
        environment: Option<String>,

        /// Validity window in seconds (defaults to SESSION_VALIDITY_SECS)
        #[arg(long)]
        validity_secs: Option<u64>,

        /// Print the full record instead of storing it
        #[arg(long)]
        no_save: bool,
    },

    /// Print a stored session
    Show {
        #[arg(long)]
        wallet: String,

        #[arg(long)]
        session_id: String,

        /// Include the private trading key
        #[arg(long)]
        reveal_key: bool,
    },

    /// Recompute the digest and check the stored signature
    Verify {
        #[arg(long)]
        wallet: String,

        #[arg(long)]
        session_id: String,
    },

    /// List session ids stored for a wallet
    List {
        #[arg(long)]
        wallet: String,
    },

    /// Remove a stored session
    Delete {
        #[arg(long)]
        wallet: String,

        #[arg(long)]
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "litlayer_keygen=info,trading_session=info,litlayer_core=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(dir) = cli.store_dir {
        config.storage.dir = dir;
    }

    match cli.command {
        Command::Create {
            wallet,
            agent,
            platform,
            environment,
            validity_secs,
            no_save,
        } => {
            if let Some(validity_secs) = validity_secs {
                config.session.validity_secs = validity_secs;
            }
            let environment = match environment {
                Some(raw) => raw.parse::<Environment>()?,
                None => config.session.environment,
            };
            let platform = platform.unwrap_or_else(|| config.session.platform.clone());

            create(
                &config,
                address_arg("wallet", &wallet)?,
                address_arg("agent", &agent)?,
                &platform,
                environment,
                no_save,
            )
            .await
        }
        Command::Show {
            wallet,
            session_id,
            reveal_key,
        } => {
            let manager = open_manager(&config).await?;
            let record = require(&manager, address_arg("wallet", &wallet)?, &session_id).await?;
            print_json(&record_json(&record, reveal_key)?)
        }
        Command::Verify { wallet, session_id } => {
            let manager = open_manager(&config).await?;
            let record = require(&manager, address_arg("wallet", &wallet)?, &session_id).await?;
            verify(&record)
        }
        Command::List { wallet } => {
            let manager = open_manager(&config).await?;
            for id in manager.list_sessions(address_arg("wallet", &wallet)?).await? {
                println!("{id}");
            }
            Ok(())
        }
        Command::Delete { wallet, session_id } => {
            let manager = open_manager(&config).await?;
            manager
                .delete(address_arg("wallet", &wallet)?, &session_id)
                .await
                .context("Failed to delete session")?;
            Ok(())
        }
    }
}

async fn create(
    config: &Config,
    wallet: Address,
    agent: Address,
    platform: &str,
    environment: Environment,
    no_save: bool,
) -> Result<()> {
    let store: Arc<dyn SessionStore> = if no_save {
        Arc::new(MemorySessionStore::new())
    } else {
        Arc::new(open_store(config).await?)
    };
    let manager = SessionManager::from_config(store, config);

    let record = manager
        .create_session(wallet, agent, platform, environment)
        .context("Failed to create session")?;

    if no_save {
        // The record exists nowhere else, so the key has to be shown
        return print_json(&record_json(&record, true)?);
    }

    manager
        .persist(&record)
        .await
        .context("Failed to persist session")?;
    info!(
        session_id = %record.session_id,
        dir = %config.storage.dir.display(),
        "Session saved"
    );

    print_json(&json!({
        "session_id": record.session_id,
        "wallet_address": record.wallet_address,
        "agent_address": record.agent_address,
        "trading_key_address": record.signing_key()?.address(),
        "exchange_request": record.exchange_request()?,
    }))
}

fn verify(record: &SessionRecord) -> Result<()> {
    let digest = record.digest()?;
    let signer = record.signing_key()?.address();
    let recovered = recover_address(&digest, &record.signature)?;
    let expiry_time = record.expiry_time()?;

    print_json(&json!({
        "session_id": record.session_id,
        "digest": digest,
        "signer": signer,
        "recovered": recovered,
        "valid": recovered == signer,
        "expiry_time": expiry_time,
        "expired": record.is_expired_at(unix_now())?,
    }))?;

    if recovered != signer {
        bail!("signature does not match the session's trading key");
    }
    Ok(())
}

async fn open_store(config: &Config) -> Result<FileSessionStore> {
    FileSessionStore::open(&config.storage)
        .await
        .with_context(|| format!("Failed to open session store at {}", config.storage.dir.display()))
}

async fn open_manager(config: &Config) -> Result<SessionManager> {
    let store = open_store(config).await?;
    Ok(SessionManager::from_config(Arc::new(store), config))
}

async fn require(manager: &SessionManager, wallet: Address, session_id: &str) -> Result<SessionRecord> {
    match manager.load(wallet, session_id).await? {
        Some(record) => Ok(record),
        None => bail!("session {session_id} not found for wallet {wallet}"),
    }
}

fn address_arg(name: &str, raw: &str) -> Result<Address> {
    parse_address(raw).with_context(|| format!("Invalid --{name}"))
}

fn record_json(record: &SessionRecord, reveal_key: bool) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if !reveal_key {
        value["trading_key"] = Value::String("<redacted>".to_string());
    }
    Ok(value)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
