//! tapspend: build a Taproot output from a config file and spend it through
//! one of its script leaves.
//!
//! # Usage
//!
//! ```bash
//! tapspend --config regtest-demo.toml            # address + signed spend
//! tapspend --config regtest-demo.toml --address  # address only
//! tapspend --config regtest-demo.toml --json
//! tapspend --config regtest-demo.toml --validate
//! ```

mod config;

use anyhow::{Context, Result};
use bitcoin::{Network, TxOut};
use serde::Serialize;
use std::path::PathBuf;
use tapspend_core::{
    build_leaf, sweep_output, Curve, FundingUtxo, KeypairSigner, Leaf, SignedTransaction,
    TaprootOutput, TaprootOutputBuilder, UnsignedSpend,
};

use config::SpendConfig;

#[derive(Debug, Serialize)]
struct Report {
    network: String,
    internal_key: String,
    leaves: Vec<LeafReport>,
    merkle_root: String,
    output_key: String,
    script_pubkey: String,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    spend: Option<SpendReport>,
}

#[derive(Debug, Serialize)]
struct LeafReport {
    asm: String,
    hex: String,
    leaf_version: u8,
}

#[derive(Debug, Serialize)]
struct SpendReport {
    leaf: usize,
    control_block: String,
    txid: String,
    vsize: usize,
    hex: String,
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("tapspend.toml");
    let mut validate_only = false;
    let mut address_only = false;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--validate" => {
                validate_only = true;
            }
            "--address" => {
                address_only = true;
            }
            "--json" => {
                json = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("tapspend {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let mut config = SpendConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env_overrides();
    config
        .validate()
        .context("Configuration validation failed")?;

    // RUST_LOG, when set, takes precedence over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.general.log_level.as_str()),
    )
    .init();

    if validate_only {
        println!("Configuration is valid.");
        println!("  Network:      {}", config.bitcoin.network);
        println!("  Leaves:       {}", config.tree.leaves.len());
        println!("  Spend leaf:   {}", config.spend.leaf);
        println!("  Signer:       {}", config.spend.signer);
        println!("  Funding:      {}", config.funding.is_some());
        return Ok(());
    }

    let curve = Curve::new();
    let network = config.network()?;
    let output = build_output(&curve, &config)?;

    let spend = if address_only {
        None
    } else {
        match config.funding_outpoint()? {
            Some((outpoint, amount)) => {
                let funding = FundingUtxo {
                    outpoint,
                    txout: TxOut {
                        value: amount,
                        script_pubkey: output.script_pubkey(),
                    },
                };
                Some(build_spend(&curve, &config, &output, funding)?)
            }
            None => {
                log::info!("No [funding] section; stopping after the address");
                None
            }
        }
    };

    let report = build_report(&config, network, &output, spend.as_ref())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn build_output(curve: &Curve, config: &SpendConfig) -> Result<TaprootOutput> {
    let internal_key = config.x_only_key(curve, &config.tree.internal_key)?;

    let leaves = config
        .leaf_policies(curve)?
        .iter()
        .map(|policy| build_leaf(curve, policy))
        .collect::<tapspend_core::Result<Vec<Leaf>>>()?;

    if leaves
        .iter()
        .any(|leaf| leaf.kind().signing_key() == Some(&internal_key))
    {
        log::warn!(
            "internal key {} also signs a leaf; its holder can spend via the key path",
            internal_key
        );
    }

    Ok(TaprootOutputBuilder::new()
        .internal_key(internal_key)
        .leaves(leaves)
        .finalize(curve)?)
}

fn build_spend(
    curve: &Curve,
    config: &SpendConfig,
    output: &TaprootOutput,
    funding: FundingUtxo,
) -> Result<SignedTransaction> {
    let destination = config.destination()?;
    let out = sweep_output(&destination, funding.txout.value, config.fee())?;

    let mut spend = UnsignedSpend::new(output, config.spend.leaf, funding, vec![out])?;

    let secret = config.secret_key(&config.spend.signer)?;
    let signer = KeypairSigner::new(curve, &secret);
    spend
        .sign(&signer)
        .with_context(|| format!("Signing with \"{}\" failed", config.spend.signer))?;

    if let Some(preimage) = config.preimage()? {
        spend.set_preimage(preimage);
    }

    Ok(spend.finalize()?)
}

fn build_report(
    config: &SpendConfig,
    network: Network,
    output: &TaprootOutput,
    spend: Option<&SignedTransaction>,
) -> Result<Report> {
    let spend = match spend {
        Some(signed) => Some(SpendReport {
            leaf: config.spend.leaf,
            control_block: hex::encode(output.control_block(config.spend.leaf)?.serialize()),
            txid: signed.txid().to_string(),
            vsize: signed.vsize(),
            hex: signed.raw_hex(),
        }),
        None => None,
    };

    Ok(Report {
        network: network.to_string(),
        internal_key: output.internal_key().to_string(),
        leaves: output
            .tree()
            .leaves()
            .iter()
            .map(|leaf| LeafReport {
                asm: leaf.script().to_asm_string(),
                hex: hex::encode(leaf.script().as_bytes()),
                leaf_version: leaf.version(),
            })
            .collect(),
        merkle_root: hex::encode(output.merkle_root()),
        output_key: output.output_key().key.to_string(),
        script_pubkey: hex::encode(output.script_pubkey().as_bytes()),
        address: output.address(network).to_string(),
        spend,
    })
}

fn print_report(report: &Report) {
    println!("Network:        {}", report.network);
    println!("Internal key:   {}", report.internal_key);
    for (i, leaf) in report.leaves.iter().enumerate() {
        println!("Leaf {}:         {}", i, leaf.asm);
        println!("                {}", leaf.hex);
    }
    println!("Merkle root:    {}", report.merkle_root);
    println!("Output key:     {}", report.output_key);
    println!("scriptPubKey:   {}", report.script_pubkey);
    println!("Address:        {}", report.address);

    if let Some(spend) = &report.spend {
        println!();
        println!("Spending leaf:  {}", spend.leaf);
        println!("Control block:  {}", spend.control_block);
        println!("Txid:           {}", spend.txid);
        println!("Vsize:          {}", spend.vsize);
        println!("Tx hex:");
        println!("{}", spend.hex);
    }
}

fn print_help() {
    println!(
        r#"tapspend: Taproot script-path spend builder

USAGE:
    tapspend [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Config file path (default: tapspend.toml)
    --validate            Validate config file and exit
    --address             Print the output and address only
    --json                Print a JSON report
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    TAPSPEND_LOG_LEVEL    Log level (error/warn/info/debug/trace)
    TAPSPEND_NETWORK      Bitcoin network (bitcoin/testnet/signet/regtest)
    TAPSPEND_PREIMAGE     Hash-lock preimage (hex)
    TAPSPEND_FEE_SAT      Fee in satoshis

EXAMPLES:
    # Derive the address to fund
    tapspend --config regtest-demo.toml --address

    # Build the signed spend once [funding] is filled in
    tapspend --config regtest-demo.toml
"#
    );
}
