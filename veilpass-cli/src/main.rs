//! Developer command-line for the vault core.
//!
//! Not a password manager UI: a workbench for exercising the core
//! against an in-memory store and for inspecting field envelopes while
//! debugging a real deployment.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, Level};

use veilpass_core::crypto::cipher::{decrypt_to_string, encrypt_string, is_envelope};
use veilpass_core::crypto::kdf::{derive_vault_key, generate_key_bytes};
use veilpass_core::escrow::{Authenticator, Enrollment, EscrowService};
use veilpass_core::store::record_types;
use veilpass_core::{
    AutoLockPolicy, DocumentStore, Fields, MemoryStore, SecureStorageProxy, VaultError,
    VaultKeyManager, VaultSession, VaultSettings, WrappingKey,
};

#[derive(Parser)]
#[command(name = "veilpass", version, about = "Vault encryption core workbench")]
struct Cli {
    /// Show the core's own log output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the full vault lifecycle against an in-memory store
    Demo,
    /// Derive a key and seal one value into an envelope
    Encrypt {
        /// Account identifier the salt is derived from
        #[arg(short, long)]
        user: String,
        /// Master password to derive with
        #[arg(short, long)]
        password: String,
        /// Plaintext value to seal
        value: String,
    },
    /// Open an envelope sealed by `encrypt`
    Decrypt {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        password: String,
        /// The vp1: envelope string
        envelope: String,
    },
    /// Check whether a value is an encrypted field envelope
    Inspect { value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Demo => run_demo().await,
        Commands::Encrypt {
            user,
            password,
            value,
        } => run_encrypt(&user, &password, &value),
        Commands::Decrypt {
            user,
            password,
            envelope,
        } => run_decrypt(&user, &password, &envelope),
        Commands::Inspect { value } => {
            run_inspect(&value);
            Ok(())
        }
    }
}

fn run_encrypt(user: &str, password: &str, value: &str) -> Result<()> {
    let key = derive_vault_key(password, user)?;
    println!("{}", encrypt_string(&key, value)?);
    Ok(())
}

fn run_decrypt(user: &str, password: &str, envelope: &str) -> Result<()> {
    let key = derive_vault_key(password, user)?;
    println!("{}", decrypt_to_string(&key, envelope)?);
    Ok(())
}

fn run_inspect(value: &str) {
    if is_envelope(value) {
        println!("encrypted field envelope ({} chars)", value.len());
    } else {
        println!("not an envelope: this value would be stored as plaintext");
    }
}

/// In-process stand-in for a platform authenticator ceremony, so the
/// demo can show escrow end to end without real hardware.
#[derive(Default)]
struct DemoAuthenticator {
    enrolled: Mutex<Option<([u8; 32], String)>>,
}

#[async_trait]
impl Authenticator for DemoAuthenticator {
    async fn register(&self) -> veilpass_core::Result<Enrollment> {
        let bytes = generate_key_bytes()?;
        let credential_id = "demo-credential".to_string();
        *self.enrolled.lock() = Some((bytes, credential_id.clone()));
        Ok(Enrollment {
            credential_id,
            wrapping_key: WrappingKey::from_bytes(bytes),
        })
    }

    async fn authenticate(&self, credential_id: &str) -> veilpass_core::Result<WrappingKey> {
        match &*self.enrolled.lock() {
            Some((bytes, id)) if id == credential_id => Ok(WrappingKey::from_bytes(*bytes)),
            _ => Err(VaultError::Escrow("no enrolled credential".to_string())),
        }
    }
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

fn preview(value: &str) -> String {
    let mut out: String = value.chars().take(44).collect();
    if value.chars().count() > 44 {
        out.push_str("...");
    }
    out
}

async fn run_demo() -> Result<()> {
    const USER: &str = "demo-user";
    const MASTER: &str = "correct horse battery staple";

    let store = Arc::new(MemoryStore::new());
    let keys = Arc::new(VaultKeyManager::new(AutoLockPolicy::from_minutes(15)));
    let session = VaultSession::new(Arc::clone(&store), Arc::clone(&keys));
    let proxy = SecureStorageProxy::new(Arc::clone(&store), Arc::clone(&keys));

    println!("== setup ==");
    session.setup(MASTER, USER).await?;
    println!("vault initialized and unlocked for {}", USER);

    println!();
    println!("== store a credential ==");
    let doc = proxy
        .create(
            record_types::CREDENTIAL,
            fields(json!({
                "name": "github",
                "username": "octocat",
                "password": "hunter2",
                "url": "https://github.com/login",
                "user_id": USER,
            })),
        )
        .await?;
    debug!(id = %doc.id, "credential created");

    let raw = store.get(record_types::CREDENTIAL, &doc.id).await?;
    println!("what the caller stored:   password = hunter2");
    println!(
        "what the backend received: password = {}",
        preview(raw.get_str("password").unwrap_or(""))
    );

    println!();
    println!("== locked reads ==");
    session.lock();
    let sealed = proxy.get(record_types::CREDENTIAL, &doc.id).await?;
    println!(
        "vault locked; reads still work, fields stay sealed: {}",
        preview(sealed.get_str("password").unwrap_or(""))
    );

    println!();
    println!("== unlock with the master password ==");
    session.unlock(MASTER, USER).await?;
    let open = proxy.get(record_types::CREDENTIAL, &doc.id).await?;
    println!(
        "password decrypts to: {}",
        open.get_str("password").unwrap_or("")
    );

    println!();
    println!("== key escrow ==");
    let escrow = EscrowService::new(
        Arc::clone(&store),
        Arc::clone(&keys),
        DemoAuthenticator::default(),
    );
    escrow.enable(USER).await?;
    println!("escrow enabled: vault key wrapped under a ceremony-held key");
    session.lock();
    escrow.recover(USER).await?;
    println!(
        "recovered without the password: unlocked = {}",
        session.is_unlocked()
    );

    println!();
    println!("== settings ==");
    VaultSettings {
        auto_lock_minutes: 30,
    }
    .save(store.as_ref(), USER)
    .await?;
    let settings = VaultSettings::apply(store.as_ref(), USER, &keys).await?;
    println!("auto-lock timeout now {} minutes", settings.auto_lock_minutes);

    Ok(())
}
