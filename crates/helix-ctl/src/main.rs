//! helix-ctl: command-line interface for a Helix node.

use anyhow::{bail, Context, Result};

use helix_core::config::{DEFAULT_BALANCES_THRESHOLD, HelixConfig};
use helix_core::crypto::Seed;
use helix_core::{Hash, Transaction, Transfer};
use helix_services::{
    allows_remote_pow, is_node_healthy, promote_transaction, queries, replay_bundle,
    send_transfer, ApiError, Gateway, Input, LocalSigner, PrepareOptions, RemoteSigner, Signer,
};

/// Seed addresses scanned for funds when sending value.
const INPUT_SCAN_LIMIT: u64 = 20;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_hashes(args: &[&str]) -> Result<Vec<Hash>> {
    args.iter()
        .map(|a| Hash::from_hex(a).with_context(|| format!("invalid hash: {a}")))
        .collect()
}

fn seed() -> Result<Seed> {
    let hex = std::env::var("HELIX_SEED").context("HELIX_SEED is not set")?;
    Seed::from_hex(&hex).context("HELIX_SEED must be 64 hex characters")
}

fn signer(config: &HelixConfig) -> Result<Box<dyn Signer>> {
    let seed = seed()?;
    Ok(if config.attachment.remote_pow {
        Box::new(RemoteSigner::new(seed))
    } else {
        Box::new(LocalSigner::new(seed))
    })
}

fn print_records(records: &[Transaction]) {
    for tx in records {
        println!("  ┌─ {}", tx.hash);
        println!("  │  index   : {}/{}", tx.current_index, tx.last_index);
        println!("  │  address : {}", tx.address);
        println!("  │  value   : {}", tx.value);
        println!("  └─ bundle  : {}", tx.bundle);
    }
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_info(gateway: &Gateway) -> Result<()> {
    let info = queries::get_node_info(gateway, None).await?;

    println!("═══════════════════════════════════════");
    println!("  Helix Node {}", gateway.default_settings().url);
    println!("═══════════════════════════════════════");
    println!("  App            : {} {}", info.app_name, info.app_version);
    println!("  Current round  : {}", info.current_round_index);
    println!("  Solid round    : {}", info.latest_solid_round_index);
    match &info.features {
        Some(features) if !features.is_empty() => {
            println!("  Features       : {}", features.join(", "))
        }
        Some(_) => println!("  Features       : none"),
        None => println!("  Features       : not advertised"),
    }
    Ok(())
}

async fn cmd_health(gateway: &Gateway) -> Result<()> {
    is_node_healthy(gateway, None).await?;
    println!("Node is healthy.");
    Ok(())
}

async fn cmd_remote_pow(gateway: &Gateway) -> Result<()> {
    if allows_remote_pow(gateway, None).await? {
        println!("Node accepts remote proof-of-work.");
    } else {
        println!("Node does not accept remote proof-of-work.");
    }
    Ok(())
}

async fn cmd_balances(gateway: &Gateway, config: &HelixConfig, args: &[&str]) -> Result<()> {
    let addresses = parse_hashes(args)?;
    let balances = queries::get_balances(
        gateway,
        None,
        config.quorum.enabled,
        &addresses,
        DEFAULT_BALANCES_THRESHOLD,
    )
    .await?;
    for (address, balance) in addresses.iter().zip(balances) {
        println!("{address}  {balance}");
    }
    Ok(())
}

async fn cmd_spent(gateway: &Gateway, config: &HelixConfig, args: &[&str]) -> Result<()> {
    let addresses = parse_hashes(args)?;
    let states =
        queries::were_addresses_spent_from(gateway, None, config.quorum.enabled, &addresses)
            .await?;
    for (address, spent) in addresses.iter().zip(states) {
        println!("{address}  {}", if spent { "spent" } else { "unspent" });
    }
    Ok(())
}

async fn cmd_bundle(gateway: &Gateway, tail: &str) -> Result<()> {
    let tail = Hash::from_hex(tail).context("invalid tail hash")?;
    let records = queries::get_bundle(gateway, None, &tail).await?;
    println!("Bundle of {} transactions:", records.len());
    print_records(&records);
    Ok(())
}

async fn cmd_promote(gateway: &Gateway, config: &HelixConfig, hash: &str) -> Result<()> {
    let hash = Hash::from_hex(hash).context("invalid transaction hash")?;
    let signer = signer(config)?;
    let promoted = promote_transaction(
        gateway,
        None,
        signer.as_ref(),
        hash,
        config.attachment.depth,
        config.attachment.min_weight_magnitude,
        None,
    )
    .await?;
    println!("Promoted {promoted}.");
    Ok(())
}

async fn cmd_replay(gateway: &Gateway, config: &HelixConfig, tail: &str) -> Result<()> {
    let tail = Hash::from_hex(tail).context("invalid tail hash")?;
    let signer = signer(config)?;
    let records = replay_bundle(
        gateway,
        None,
        signer.as_ref(),
        tail,
        config.attachment.depth,
        config.attachment.min_weight_magnitude,
    )
    .await?;
    println!("Replayed bundle:");
    print_records(&records);
    Ok(())
}

/// Unspent seed addresses with funds, lowest index first, until `value` is
/// covered.
async fn collect_inputs(gateway: &Gateway, config: &HelixConfig, value: u64) -> Result<Vec<Input>> {
    let seed = seed()?;
    let addresses: Vec<Hash> = (0..INPUT_SCAN_LIMIT).map(|i| seed.address(i)).collect();
    let balances = queries::get_balances(
        gateway,
        None,
        config.quorum.enabled,
        &addresses,
        DEFAULT_BALANCES_THRESHOLD,
    )
    .await?;
    let spent =
        queries::were_addresses_spent_from(gateway, None, config.quorum.enabled, &addresses)
            .await?;

    let mut inputs = Vec::new();
    let mut covered: u64 = 0;
    let candidates = addresses.iter().zip(balances).zip(spent).enumerate();
    for (index, ((address, balance), spent)) in candidates {
        if covered >= value {
            break;
        }
        if balance == 0 || spent {
            continue;
        }
        covered = covered.saturating_add(balance);
        inputs.push(Input {
            address: *address,
            balance,
            key_index: index as u64,
        });
    }
    if covered < value {
        bail!("insufficient funds: {covered} available, {value} needed");
    }
    Ok(inputs)
}

async fn cmd_send(gateway: &Gateway, config: &HelixConfig, args: &[&str]) -> Result<()> {
    let (address, value, tag) = match args {
        [address, value] => (address, value, None),
        [address, value, tag] => (address, value, Some(tag)),
        _ => bail!("usage: send <address> <value> [tag]"),
    };
    let address = Hash::from_hex(address).context("invalid address")?;
    let value: u64 = value.parse().context("value must be a whole number")?;
    let mut transfer = Transfer::new(address, value);
    if let Some(tag) = tag {
        transfer = transfer.with_tag(tag.as_bytes().to_vec());
    }

    let options = PrepareOptions {
        inputs: if value > 0 {
            collect_inputs(gateway, config, value).await?
        } else {
            Vec::new()
        },
        remainder_address: None,
    };
    let signer = signer(config)?;
    let records = send_transfer(
        gateway,
        None,
        signer.as_ref(),
        &[transfer],
        &options,
        config.attachment.depth,
        config.attachment.min_weight_magnitude,
    )
    .await?;
    println!("Sent bundle:");
    print_records(&records);
    Ok(())
}

fn print_usage() {
    println!("Usage: helix-ctl [--node <url>] <command>");
    println!();
    println!("Commands:");
    println!("  info                       Show node information");
    println!("  health                     Check version and sync state");
    println!("  remote-pow                 Check whether the node does proof-of-work");
    println!("  balances <addr>...         Confirmed balances");
    println!("  spent <addr>...            Whether addresses were spent from");
    println!("  bundle <tail>              Fetch and validate a bundle");
    println!("  promote <hash>             Promote a stalled transaction");
    println!("  replay <tail>              Re-attach a bundle on fresh tips");
    println!("  send <addr> <value> [tag]  Send a transfer");
    println!();
    println!("Options:");
    println!("  --node <url>   Node URL (default from config)");
    println!();
    println!("Commands that sign read the seed from HELIX_SEED.");
}

/// User-facing alert. Pipeline failures name the stage that failed.
fn alert(err: &anyhow::Error) {
    match err.downcast_ref::<ApiError>() {
        Some(api) => match api.stage() {
            Some(stage) => eprintln!("Alert: {stage} failed: {}", api.root()),
            None => eprintln!("Alert: {api}"),
        },
        None => eprintln!("Alert: {err:#}"),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        alert(&e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = HelixConfig::load().context("failed to load config")?;

    // Parse --node option
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--node" {
            i += 1;
            config.node.url = args.get(i).context("--node requires a value")?.clone();
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    let gateway = Gateway::from_config(&config);
    tracing::debug!(url = %config.node.url, quorum = config.quorum.enabled, "gateway ready");

    match remaining.as_slice() {
        ["info"] | [] => cmd_info(&gateway).await,
        ["health"] => cmd_health(&gateway).await,
        ["remote-pow"] => cmd_remote_pow(&gateway).await,
        ["balances", rest @ ..] if !rest.is_empty() => cmd_balances(&gateway, &config, rest).await,
        ["spent", rest @ ..] if !rest.is_empty() => cmd_spent(&gateway, &config, rest).await,
        ["bundle", tail] => cmd_bundle(&gateway, tail).await,
        ["promote", hash] => cmd_promote(&gateway, &config, hash).await,
        ["replay", tail] => cmd_replay(&gateway, &config, tail).await,
        ["send", rest @ ..] => cmd_send(&gateway, &config, rest).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
