use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, LevelFilter};
use textbook_rsa::store::read_public_key;
use textbook_rsa::{decrypt_from_text, encrypt_to_text, KeyStore, RsaPublicKey, StoreConfig};

#[derive(Parser)]
#[command(
    name = "textbook-rsa",
    author,
    version,
    about = "Textbook RSA key store and message codec"
)]
struct Cli {
    #[arg(long, global = true)]
    debug: bool,
    /// Identity whose key pair is used or created
    #[arg(long, global = true, env = "USER_ID", default_value = "A")]
    user_id: String,
    /// Directory holding the key files
    #[arg(long, global = true, env = "KEYS_DIR", default_value = "keys")]
    keys_dir: PathBuf,
    /// Modulus size used when a new key pair is generated
    #[arg(long, global = true, env = "KEY_BITS", default_value_t = 64)]
    bits: u64,
    /// Seconds to wait for another process holding the key lock
    #[arg(long, global = true, default_value_t = 5)]
    lock_timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load or create the local key pair and show its public half.
    Init,
    /// Print the local public key as two decimal lines (n, e).
    PublicKey,
    /// Encrypt a message for a peer and print the Base64 ciphertext.
    Encrypt {
        /// Peer modulus, decimal
        #[arg(long, requires = "e", conflicts_with = "peer_key")]
        n: Option<String>,
        /// Peer public exponent, decimal
        #[arg(long, requires = "n")]
        e: Option<String>,
        /// Peer public key file ("n\ne\n")
        #[arg(long, value_name = "FILE")]
        peer_key: Option<PathBuf>,
        message: String,
    },
    /// Decrypt a Base64 ciphertext with the local private key.
    Decrypt { ciphertext: String },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let store = KeyStore::new(
        StoreConfig::default()
            .with_directory(&cli.keys_dir)
            .with_lock_timeout(Duration::from_secs(cli.lock_timeout)),
    );
    debug!(
        "user_id={} keys_dir={} bits={}",
        cli.user_id,
        cli.keys_dir.display(),
        cli.bits
    );

    match cli.command {
        Commands::Init => cmd_init(&store, &cli.user_id, cli.bits),
        Commands::PublicKey => cmd_public_key(&store, &cli.user_id, cli.bits),
        Commands::Encrypt {
            n,
            e,
            peer_key,
            message,
        } => cmd_encrypt(n, e, peer_key, &message),
        Commands::Decrypt { ciphertext } => {
            cmd_decrypt(&store, &cli.user_id, cli.bits, &ciphertext)
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default));
    builder.format_timestamp(None);
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn cmd_init(store: &KeyStore, user_id: &str, bits: u64) -> Result<()> {
    let keypair = store
        .get_or_create(user_id, bits)
        .with_context(|| format!("failed to load or create keys for user '{}'", user_id))?;

    println!("User: {}", user_id);
    println!("Key size: {} bits", keypair.bit_length());
    println!("Public key: {}", keypair.public_key);
    println!(
        "Max message: {} bytes",
        keypair.public_key.max_message_bytes()
    );
    Ok(())
}

fn cmd_public_key(store: &KeyStore, user_id: &str, bits: u64) -> Result<()> {
    let keypair = store
        .get_or_create(user_id, bits)
        .with_context(|| format!("failed to load or create keys for user '{}'", user_id))?;

    println!("{}", keypair.public_key.n);
    println!("{}", keypair.public_key.e);
    Ok(())
}

fn cmd_encrypt(
    n: Option<String>,
    e: Option<String>,
    peer_key: Option<PathBuf>,
    message: &str,
) -> Result<()> {
    let peer = match (n, e, peer_key) {
        (Some(n), Some(e), None) => {
            RsaPublicKey::from_decimal(&n, &e).context("invalid peer public key")?
        }
        (None, None, Some(path)) => read_public_key(&path)
            .with_context(|| format!("failed to read peer key {}", path.display()))?,
        _ => bail!("a peer public key is required: pass --n and --e, or --peer-key"),
    };
    debug!("encrypting {} bytes for modulus {}", message.len(), peer.fingerprint());

    let ciphertext = encrypt_to_text(message, &peer).context("encryption failed")?;
    println!("{}", ciphertext);
    Ok(())
}

fn cmd_decrypt(store: &KeyStore, user_id: &str, bits: u64, ciphertext: &str) -> Result<()> {
    let keypair = store
        .get_or_create(user_id, bits)
        .with_context(|| format!("failed to load or create keys for user '{}'", user_id))?;

    let plaintext =
        decrypt_from_text(ciphertext, &keypair.private_key).context("decryption failed")?;
    println!("{}", plaintext);
    Ok(())
}
