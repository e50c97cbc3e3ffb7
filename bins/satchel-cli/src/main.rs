//! satchel: command-line interface for the Satchel agent wallet.
//!
//! Manages encrypted wallet records, queries balances, signs payments into
//! x402 envelopes and inspects envelopes received from elsewhere.
//!
//! Passphrases are prompted without echo. Non-interactive callers may set
//! `SATCHEL_PASSPHRASE` (and `SATCHEL_NEW_PASSPHRASE` for `wallet rotate`)
//! instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use zeroize::Zeroizing;

use satchel_chain::{BroadcastOutcome, ChainClient};
use satchel_core::address::Network;
use satchel_core::constants::SATOSHIS_PER_BSV;
use satchel_proof::Accessibility;
use satchel_wallet::{
    PaymentContext, PaymentRequest, PaymentResult, SatchelConfig, WalletError, WalletStore,
};

/// Passphrase source for non-interactive callers.
const PASSPHRASE_ENV: &str = "SATCHEL_PASSPHRASE";

/// Replacement passphrase for `wallet rotate` when running non-interactively.
const NEW_PASSPHRASE_ENV: &str = "SATCHEL_NEW_PASSPHRASE";

/// Satchel agent wallet.
#[derive(Parser)]
#[command(name = "satchel")]
#[command(version, about = "BSV wallet that pays with x402 proofs")]
struct Cli {
    /// Root directory for wallet records (overrides SATCHEL_HOME).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Indexer base URL (overrides SATCHEL_CHAIN_API).
    #[arg(long, global = true)]
    chain_api: Option<String>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json").
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet management subcommands.
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Query a wallet's spendable balance.
    Balance(BalanceArgs),
    /// Sign a payment and print its x402 envelope.
    Pay(PayArgs),
    /// Inspect x402 payment envelopes.
    Proof {
        #[command(subcommand)]
        action: ProofAction,
    },
}

#[derive(Subcommand)]
enum WalletAction {
    /// Generate a new key and store it encrypted.
    Create(NewWalletArgs),
    /// Store an existing WIF key encrypted (the key is prompted).
    Import(NewWalletArgs),
    /// List stored wallets, newest first.
    List,
    /// Show one wallet and its local payment history.
    Show(WalletIdArgs),
    /// Irreversibly delete a wallet.
    Delete(DeleteArgs),
    /// Re-encrypt a wallet under a new passphrase.
    Rotate(WalletIdArgs),
}

#[derive(Subcommand)]
enum ProofAction {
    /// Decode an envelope and print its JSON.
    Decode(EnvelopeArgs),
    /// Check an envelope against the x402 "exact" rules.
    Validate(EnvelopeArgs),
}

#[derive(Args)]
struct NewWalletArgs {
    /// Human-readable label.
    #[arg(long)]
    name: String,

    /// Network (mainnet or testnet). Defaults to SATCHEL_NETWORK.
    #[arg(long)]
    network: Option<String>,
}

#[derive(Args)]
struct WalletIdArgs {
    /// Wallet id.
    id: String,
}

#[derive(Args)]
struct DeleteArgs {
    /// Wallet id.
    id: String,

    /// Confirm deletion. The key is lost unless backed up elsewhere.
    #[arg(long)]
    yes: bool,
}

#[derive(Args)]
struct BalanceArgs {
    /// Wallet id.
    id: String,
}

#[derive(Args)]
struct PayArgs {
    /// Wallet id.
    id: String,

    /// Destination address.
    #[arg(long)]
    to: String,

    /// Amount in satoshis.
    #[arg(long)]
    amount: u64,

    /// Fee rate in satoshis per byte (overrides SATCHEL_FEE_RATE).
    #[arg(long)]
    fee_rate: Option<f64>,

    /// Send change here instead of back to the wallet.
    #[arg(long)]
    change_address: Option<String>,

    /// Also broadcast the transaction.
    #[arg(long)]
    broadcast: bool,

    /// Accessibility hint: language of the payee-facing description.
    #[arg(long)]
    language: Option<String>,

    /// Accessibility hint: cognitive level, "standard" when omitted
    /// (requires --language).
    #[arg(long, requires = "language")]
    cognitive_level: Option<String>,

    /// Accessibility hint: output is suitable for audio (requires --language).
    #[arg(long, requires = "language")]
    audio_friendly: bool,
}

#[derive(Args)]
struct EnvelopeArgs {
    /// Base64 envelope text.
    envelope: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let mut config = SatchelConfig::from_env().context("Invalid environment configuration")?;
    if let Some(home) = cli.home {
        config.home = home;
    }
    if let Some(api) = cli.chain_api {
        config.chain_api = api;
    }

    match cli.command {
        Commands::Wallet { action } => match action {
            WalletAction::Create(args) => wallet_create(&config, args).await,
            WalletAction::Import(args) => wallet_import(&config, args).await,
            WalletAction::List => wallet_list(&config),
            WalletAction::Show(args) => wallet_show(&config, args),
            WalletAction::Delete(args) => wallet_delete(&config, args),
            WalletAction::Rotate(args) => wallet_rotate(&config, args).await,
        },
        Commands::Balance(args) => balance(&config, args).await,
        Commands::Pay(args) => pay(&config, args).await,
        Commands::Proof { action } => match action {
            ProofAction::Decode(args) => proof_decode(args),
            ProofAction::Validate(args) => proof_validate(args),
        },
    }
}

/// Generate and store a new wallet.
async fn wallet_create(config: &SatchelConfig, args: NewWalletArgs) -> Result<()> {
    let network = resolve_network(config, args.network.as_deref())?;
    let ctx = context(config, network)?;
    let passphrase = new_passphrase(PASSPHRASE_ENV)?;

    let summary = ctx
        .create_wallet(&args.name, passphrase)
        .await
        .context("Failed to create wallet")?;

    println!("\n=== WALLET CREATED ===");
    println!("Id:      {}", summary.id);
    println!("Name:    {}", summary.name);
    println!("Network: {}", summary.network);
    println!("Address: {}", summary.address);
    println!("\nThe key exists only in encrypted form. Losing the passphrase loses the funds.");
    Ok(())
}

/// Import a WIF key as a new wallet.
async fn wallet_import(config: &SatchelConfig, args: NewWalletArgs) -> Result<()> {
    let network = resolve_network(config, args.network.as_deref())?;
    let ctx = context(config, network)?;
    let wif = read_secret("WIF key")?;
    let passphrase = new_passphrase(PASSPHRASE_ENV)?;

    let summary = ctx
        .import_wallet(&args.name, wif, passphrase)
        .await
        .context("Failed to import wallet")?;

    println!("\n=== WALLET IMPORTED ===");
    println!("Id:      {}", summary.id);
    println!("Network: {}", summary.network);
    println!("Address: {}", summary.address);
    Ok(())
}

fn wallet_list(config: &SatchelConfig) -> Result<()> {
    let store = open_store(config)?;
    let wallets = store.list().context("Failed to list wallets")?;
    if wallets.is_empty() {
        println!("No wallets in {}", store.dir().display());
        return Ok(());
    }
    for w in wallets {
        println!(
            "{}  {:<8} {}  {}  {}",
            w.id,
            w.network,
            w.address,
            w.created_at.format("%Y-%m-%d %H:%M"),
            w.name
        );
    }
    Ok(())
}

fn wallet_show(config: &SatchelConfig, args: WalletIdArgs) -> Result<()> {
    let store = open_store(config)?;
    let record = store.load(&args.id).context("Failed to load wallet")?;
    println!("Id:      {}", record.id);
    println!("Name:    {}", record.name);
    println!("Network: {}", record.network);
    println!("Address: {}", record.address);
    println!("Created: {}", record.created_at.to_rfc3339());

    let history = store.history(&record.id).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read payment history");
        Vec::new()
    });
    if !history.is_empty() {
        println!("\nPayments:");
        for h in history {
            println!(
                "  {}  {:>12} sats  fee {:>6}  {:<17} -> {}",
                h.created_at.format("%Y-%m-%d %H:%M"),
                h.amount,
                h.fee,
                serde_json::to_value(h.status)?.as_str().unwrap_or_default(),
                h.destination
            );
            println!("    {}", h.txid);
        }
    }
    Ok(())
}

fn wallet_delete(config: &SatchelConfig, args: DeleteArgs) -> Result<()> {
    if !args.yes {
        bail!("Refusing to delete {} without --yes", args.id);
    }
    let store = open_store(config)?;
    store.delete(&args.id).context("Failed to delete wallet")?;
    println!("Deleted wallet {}", args.id);
    Ok(())
}

async fn wallet_rotate(config: &SatchelConfig, args: WalletIdArgs) -> Result<()> {
    let network = wallet_network(config, &args.id)?;
    let ctx = context(config, network)?;
    let old = prompt_passphrase("Current passphrase")?;
    let new = new_passphrase(NEW_PASSPHRASE_ENV)?;
    ctx.rotate_passphrase(&args.id, old, new)
        .await
        .context("Failed to rotate passphrase")?;
    println!("Passphrase changed for {}", args.id);
    Ok(())
}

async fn balance(config: &SatchelConfig, args: BalanceArgs) -> Result<()> {
    let network = wallet_network(config, &args.id)?;
    let ctx = context(config, network)?;
    let balance = ctx.balance(&args.id).await.context("Failed to query balance")?;

    println!("\n=== WALLET BALANCE ===");
    println!("Network:     {network}");
    println!("Outputs:     {}", balance.utxo_count);
    println!("Confirmed:   {} sats", balance.confirmed);
    println!("Unconfirmed: {} sats", balance.unconfirmed);
    println!(
        "Total:       {} sats ({:.8} BSV)",
        balance.total(),
        balance.total() as f64 / SATOSHIS_PER_BSV as f64
    );
    Ok(())
}

async fn pay(config: &SatchelConfig, args: PayArgs) -> Result<()> {
    let network = wallet_network(config, &args.id)?;
    let ctx = context(config, network)?;
    let passphrase = prompt_passphrase("Wallet passphrase")?;

    let mut request = PaymentRequest::new(&args.id, passphrase, &args.to, args.amount)
        .context("Invalid payment request")?;
    if let Some(rate) = args.fee_rate {
        request = request.with_fee_rate(rate).context("Invalid fee rate")?;
    }
    if let Some(change) = &args.change_address {
        request = request
            .with_change_address(change)
            .context("Invalid change address")?;
    }
    if let Some(language) = args.language {
        request = request.with_accessibility(Accessibility {
            language,
            cognitive_level: args.cognitive_level.unwrap_or_else(|| "standard".to_string()),
            audio_friendly: args.audio_friendly,
        });
    }

    let result = ctx.pay(&request).await;
    let Some(proof) = result.proof.as_ref() else {
        print_result(&result)?;
        bail!("{}", result.message);
    };

    if args.broadcast {
        let outcome = ctx
            .broadcast(&args.id, &proof.tx_hex)
            .await
            .context("Broadcast failed")?;
        match outcome.outcome {
            BroadcastOutcome::Accepted => eprintln!("Broadcast accepted: {}", proof.txid),
            BroadcastOutcome::AlreadyBroadcast => {
                eprintln!("Transaction {} was already on the network", proof.txid)
            }
            BroadcastOutcome::StaleInputs => {
                print_result(&result)?;
                bail!(
                    "Broadcast rejected, inputs are spent or missing: {}",
                    outcome.error.unwrap_or_default()
                );
            }
        }
    }

    print_result(&result)
}

fn proof_decode(args: EnvelopeArgs) -> Result<()> {
    let envelope = satchel_proof::decode(&args.envelope).context("Failed to decode envelope")?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn proof_validate(args: EnvelopeArgs) -> Result<()> {
    let report = satchel_proof::validate(&args.envelope);
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.valid {
        bail!("Envelope is invalid");
    }
    Ok(())
}

fn print_result(result: &PaymentResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn open_store(config: &SatchelConfig) -> Result<WalletStore> {
    let dir = config.wallets_dir();
    WalletStore::open(&dir).with_context(|| format!("Failed to open wallet store {}", dir.display()))
}

fn context(config: &SatchelConfig, network: Network) -> Result<PaymentContext> {
    let store = Arc::new(open_store(config)?);
    let chain = ChainClient::new(config.chain_config(network)).context("Failed to build HTTP client")?;
    PaymentContext::new(store, Arc::new(chain), config.fee_rate).context("Invalid fee rate")
}

/// Network of a stored wallet, so the chain client matches it.
fn wallet_network(config: &SatchelConfig, id: &str) -> Result<Network> {
    let store = open_store(config)?;
    match store.load(id) {
        Ok(record) => Ok(record.network),
        Err(e @ WalletError::NotFound(_)) => Err(e).context("No such wallet (see `satchel wallet list`)"),
        Err(e) => Err(e).context("Failed to load wallet"),
    }
}

fn resolve_network(config: &SatchelConfig, flag: Option<&str>) -> Result<Network> {
    match flag {
        Some(s) => s
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid network (must be 'mainnet' or 'testnet')")),
        None => Ok(config.network),
    }
}

/// Prompt for a passphrase securely (no echo), or take it from the
/// environment.
fn prompt_passphrase(prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(p) = std::env::var(PASSPHRASE_ENV) {
        return Ok(Zeroizing::new(p));
    }
    read_secret(prompt)
}

/// Prompt twice and require a match, unless `env` supplies the passphrase.
fn new_passphrase(env: &str) -> Result<Zeroizing<String>> {
    let first = match std::env::var(env) {
        Ok(p) => Zeroizing::new(p),
        Err(_) => {
            let first = read_secret("New passphrase")?;
            let confirm = read_secret("Confirm passphrase")?;
            if *first != *confirm {
                bail!("Passphrases do not match");
            }
            first
        }
    };
    if first.is_empty() {
        bail!("Passphrase must not be empty");
    }
    Ok(first)
}

fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    let p = rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read passphrase")?;
    Ok(Zeroizing::new(p))
}

/// Initialize tracing on stderr so stdout stays machine-readable.
///
/// `format = "json"` emits structured JSON; anything else is text.
fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
