//! Thin CLI wrapper, `§5`: loads config, wires up the chain client and
//! dispatcher, and hands control to [`seda_overlay_core::MainTask`]. Exit
//! code 0 on success, 1 on any surfaced error.

mod error;
mod runtime_stub;
mod server;

use std::{path::PathBuf, process::ExitCode, str::FromStr, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use seda_overlay_chain::{
    Broadcaster, ChainClient, DispatcherConfig, HttpChainClient, HttpChainClientConfig, Signer, SignerPool, TxDispatcher,
};
use seda_overlay_common::{
    config::{default_home_dir, load_config, Config, HttpServerConfig, IntervalsConfig, NodeConfig, SedaChainConfig},
    crypto::{hashing, prove, Identity},
    messages::{ContractMsg, StakeMsg, UnstakeMsg, WithdrawMsg},
    model::GasOption,
    network::NetworkPreset,
};
use seda_overlay_core::{DrTaskConfig, InMemoryDrPool, MainTask, MainTaskIntervals};
use seda_overlay_identity::{derive_identity, derive_subaccount, parse_mnemonic};
use seda_overlay_wasm::{ProgramCache, WorkerPool, WorkerPoolConfig};

use error::CliError;
use runtime_stub::UnimplementedRuntime;

const VM_VERSION: &str = "v1";

#[derive(Parser)]
#[command(name = "seda-overlay", version, about = "SEDA oracle overlay node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Writes a config template and creates the node's home directory layout.
    Init {
        #[arg(long)]
        home: Option<String>,
        #[arg(long, default_value_t = NetworkPreset::Testnet)]
        network: NetworkPreset,
    },
    /// Runs the node: starts the fetch/eligibility/task loops and the HTTP
    /// diagnostics server.
    Run {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        mnemonic: Option<String>,
        #[arg(long)]
        network: Option<NetworkPreset>,
    },
    /// Loads and type-checks a config file without starting the node.
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Identity account management: stake, unstake, withdraw, and info.
    Identities {
        #[command(subcommand)]
        action: IdentitiesCommand,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Operator tools gated behind `ENABLE_DEV_TOOLS=true`.
    #[command(subcommand)]
    Dev(DevCommand),
}

#[derive(Subcommand)]
enum IdentitiesCommand {
    /// Prints each configured identity's address and staking status.
    Info,
    /// Stakes `amount` from the identity at `--index` (default 0).
    Stake {
        amount: u128,
        #[arg(short = 'i', long = "index", default_value_t = 0)]
        index: u32,
        #[arg(long)]
        memo: Option<String>,
    },
    /// Requests an unstake of `amount` from the identity at `--index`.
    Unstake {
        amount: u128,
        #[arg(short = 'i', long = "index", default_value_t = 0)]
        index: u32,
        #[arg(long)]
        memo: Option<String>,
    },
    /// Withdraws any pending-withdrawal balance for the identity at `--index`.
    Withdraw {
        #[arg(short = 'i', long = "index", default_value_t = 0)]
        index: u32,
        #[arg(long)]
        memo: Option<String>,
    },
}

#[derive(Subcommand)]
enum DevCommand {
    /// Pauses/unpauses the core contract.
    Pause {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        unpause: bool,
    },
    /// Adds or removes an identity from the staking allowlist.
    Allowlist {
        #[arg(long)]
        config: Option<PathBuf>,
        identity_id: String,
        #[arg(long)]
        remove: bool,
    },
    /// Sends funds from the funder account to one or more addresses.
    Send {
        #[arg(long)]
        config: Option<PathBuf>,
        to: String,
        amount: u128,
    },
    /// Lists the stakers currently registered on chain.
    ListExecutors {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Prints the on-chain DR config and staking config.
    ChainConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Runs a single oracle program execution locally without broadcasting.
    ExecuteOp {
        #[arg(long)]
        config: Option<PathBuf>,
        dr_id: String,
    },
}

fn require_dev_tools() -> Result<(), CliError> {
    let enabled = std::env::var("ENABLE_DEV_TOOLS")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !enabled {
        return Err(CliError::Generic(
            "operator tools require ENABLE_DEV_TOOLS=true".to_string(),
        ));
    }
    Ok(())
}

fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    resolve_config_path_for_network(explicit, None)
}

fn resolve_config_path_for_network(explicit: Option<PathBuf>, network: Option<NetworkPreset>) -> PathBuf {
    explicit
        .or_else(|| std::env::var("SEDA_CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(default_home_dir(resolve_network(network))).join("config.jsonc"))
}

fn resolve_network(explicit: Option<NetworkPreset>) -> NetworkPreset {
    explicit
        .or_else(|| std::env::var("SEDA_NETWORK").ok().and_then(|s| NetworkPreset::from_str(&s).ok()))
        .unwrap_or(NetworkPreset::Testnet)
}

fn resolve_mnemonic(explicit: Option<String>, config: &Config) -> Result<String, CliError> {
    explicit
        .or_else(|| config.seda_chain.mnemonic.clone())
        .or_else(|| std::env::var("SEDA_MNEMONIC").ok())
        .ok_or_else(|| CliError::Generic("no mnemonic: pass --mnemonic, set it in the config file, or export SEDA_MNEMONIC".to_string()))
}

fn cmd_init(home: Option<String>, network: NetworkPreset) -> Result<(), CliError> {
    let home_dir = home.unwrap_or_else(|| default_home_dir(network));
    let wasm_cache_dir = format!("{home_dir}/wasm_cache");
    let logs_dir = format!("{home_dir}/logs");
    let workers_dir = format!("{home_dir}/workers");

    for dir in [&home_dir, &wasm_cache_dir, &logs_dir, &workers_dir] {
        std::fs::create_dir_all(dir)?;
    }

    let config = Config {
        home_dir: home_dir.clone(),
        wasm_cache_dir,
        logs_dir,
        workers_dir,
        seda_chain: SedaChainConfig {
            rpc: network.default_rpc().to_string(),
            chain_id: network.default_chain_id().to_string(),
            mnemonic: None,
            contract: "auto".to_string(),
            account_amounts: 10,
            min_seda_per_account: 1_000_000_000_000_000_000,
            identities_amount: 1,
            max_retries: 3,
            sleep_between_failed_tx: 3000,
            transaction_poll_interval: 2000,
            queue_interval: 200,
            gas_price: "10000000000".to_string(),
            gas_adjustment_factor: 1.1,
            gas_adjustment_factor_cosmos_messages: 2.0,
            gas: "auto".to_string(),
            memo_suffix: None,
            follow_http_redirects: true,
            http_redirect_ttl_ms: 300_000,
            transaction_block_search_threshold: 2,
            disable_transaction_block_search: true,
            rewards_withdrawal_interval: 86_400_000,
            rewards_withdrawal_minimum_threshold: "1000000000000000000".to_string(),
            enable_rewards_withdrawal: false,
        },
        node: NodeConfig::default(),
        intervals: IntervalsConfig::default(),
        http_server: HttpServerConfig::default(),
        logging: Default::default(),
    };

    let path = PathBuf::from(&home_dir).join("config.jsonc");
    let rendered = serde_json::to_string_pretty(&config).map_err(|e| CliError::Generic(e.to_string()))?;
    std::fs::write(&path, rendered)?;

    info!("wrote config template to {}", path.display());
    println!(
        "Initialized node home at {home_dir}. Set seda_chain.mnemonic in {} (or export SEDA_MNEMONIC) before running.",
        path.display()
    );
    Ok(())
}

fn cmd_validate(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let path = resolve_config_path(config_path);
    let config = load_config(&path)?;
    println!(
        "{} is valid: chain_id={}, identities_amount={}, account_amounts={}",
        path.display(),
        config.seda_chain.chain_id,
        config.seda_chain.identities_amount,
        config.seda_chain.account_amounts
    );
    Ok(())
}

/// Derives the node's oracle identities (index `0..identitiesAmount`) and
/// its full signer fleet (index `0..accountAmounts`, covering every index an
/// identity might dispatch through plus any extra funded sub-accounts).
fn derive_identities_and_signers(
    mnemonic: &str,
    identities_amount: u32,
    account_amounts: u32,
) -> Result<(Vec<Identity>, Arc<SignerPool>), CliError> {
    let mnemonic = parse_mnemonic(mnemonic).map_err(CliError::from)?;

    let pool_size = identities_amount.max(account_amounts).max(1);

    let identities: Result<Vec<Identity>, _> = (0..identities_amount).map(|i| derive_identity(&mnemonic, i)).collect();
    let identities = identities.map_err(CliError::from)?;

    let mut signers = Vec::with_capacity(pool_size as usize);
    for index in 0..pool_size {
        let identity = if let Some(existing) = identities.iter().find(|i| i.index == index) {
            existing.clone()
        } else {
            derive_subaccount(&mnemonic, index).map_err(CliError::from)?
        };
        let address = identity.id();
        signers.push(Arc::new(Signer::new(index, identity, address)));
    }

    Ok((identities, Arc::new(SignerPool::new(signers))))
}

async fn cmd_run(port: Option<u16>, config_path: Option<PathBuf>, mnemonic: Option<String>, network: Option<NetworkPreset>) -> Result<(), CliError> {
    let path = resolve_config_path_for_network(config_path, network);
    let config = load_config(&path)?;

    seda_overlay_common::logging::init(&config.logging);
    info!("loaded config from {}", path.display());

    let mnemonic = resolve_mnemonic(mnemonic, &config)?;
    let (identities, signer_pool) =
        derive_identities_and_signers(&mnemonic, config.seda_chain.identities_amount, config.seda_chain.account_amounts)?;

    let client = Arc::new(HttpChainClient::new(HttpChainClientConfig {
        rpc: config.seda_chain.rpc.clone(),
        contract: config.seda_chain.contract.clone(),
        ..Default::default()
    })?);

    let dispatcher = Arc::new(TxDispatcher::new(
        signer_pool.clone(),
        client.clone() as Arc<dyn Broadcaster>,
        DispatcherConfig {
            queue_interval: Duration::from_millis(config.seda_chain.queue_interval),
            max_retries: config.seda_chain.max_retries,
            sleep_between_failed_tx: Duration::from_millis(config.seda_chain.sleep_between_failed_tx),
            ..Default::default()
        },
    ));

    let pool = Arc::new(InMemoryDrPool::new());
    let program_cache = Arc::new(ProgramCache::new(config.wasm_cache_dir.clone(), VM_VERSION));
    let worker_pool = Arc::new(WorkerPool::new(
        Arc::new(UnimplementedRuntime),
        WorkerPoolConfig {
            thread_amount: config.node.thread_amount,
            terminate_after_completion: config.node.terminate_after_completion,
            stdout_limit: config.node.max_vm_logs_size_bytes as usize,
            stderr_limit: config.node.max_vm_logs_size_bytes as usize,
        },
    ));

    let task_config = DrTaskConfig {
        chain_id: config.seda_chain.chain_id.clone(),
        core_contract_address: config.seda_chain.contract.clone(),
        max_gas_limit: config.node.max_gas_limit,
        gas_adjustment_factor: config.seda_chain.gas_adjustment_factor,
        max_retries: config.seda_chain.max_retries,
        sleep_between_failed_tx: Duration::from_millis(config.seda_chain.sleep_between_failed_tx),
        status_check_interval: Duration::from_millis(config.intervals.status_check),
        dr_task_interval: Duration::from_millis(config.intervals.dr_task),
        block_localhost: config.node.block_localhost,
        gas_estimations_enabled: true,
    };

    let intervals = MainTaskIntervals {
        fetch_task: Duration::from_millis(config.intervals.fetch_task),
        eligibility_check: Duration::from_millis(config.intervals.eligibility_check),
        task_spawn_check: Duration::from_millis(config.intervals.dr_task),
    };

    let main_task = Arc::new(MainTask::new(
        client.clone() as Arc<dyn seda_overlay_chain::ChainClient>,
        dispatcher.clone(),
        pool,
        program_cache,
        worker_pool,
        identities.clone(),
        task_config,
        intervals,
    ));

    let cancel = CancellationToken::new();
    let mut handles = dispatcher.clone().spawn_drain_loops(cancel.clone());
    handles.extend(main_task.clone().spawn(cancel.clone()));

    if config.seda_chain.enable_rewards_withdrawal {
        handles.push(seda_overlay_identity::spawn_rewards_withdrawal_loop(
            client.clone() as Arc<dyn seda_overlay_chain::ChainClient>,
            dispatcher.clone(),
            identities.clone(),
            seda_overlay_identity::rewards::RewardsWithdrawalConfig {
                interval: Duration::from_millis(config.seda_chain.rewards_withdrawal_interval),
                minimum_threshold: config
                    .seda_chain
                    .rewards_withdrawal_minimum_threshold
                    .parse()
                    .unwrap_or(1_000_000_000_000_000_000),
                chain_id: config.seda_chain.chain_id.clone(),
                core_contract_address: config.seda_chain.contract.clone(),
                withdraw_address: identities[0].id(),
            },
            cancel.clone(),
        ));
    }

    let port = port.or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok())).unwrap_or(config.http_server.port);
    let active_identities = identities.iter().map(|i| i.id()).collect();
    let server_state = server::AppState {
        main_task: main_task.clone(),
        active_identities,
    };

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        tokio::select! {
            result = server::run(port, server_state) => {
                if let Err(e) = result {
                    error!("http diagnostics server exited: {e}");
                }
            }
            _ = server_cancel.cancelled() => {}
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    cancel.cancel();
    server_handle.abort();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

async fn cmd_identities(action: IdentitiesCommand, config_path: Option<PathBuf>) -> Result<(), CliError> {
    let path = resolve_config_path(config_path);
    let config = load_config(&path)?;
    let mnemonic = resolve_mnemonic(None, &config)?;
    let mnemonic = parse_mnemonic(&mnemonic).map_err(CliError::from)?;

    let client = HttpChainClient::new(HttpChainClientConfig {
        rpc: config.seda_chain.rpc.clone(),
        contract: config.seda_chain.contract.clone(),
        ..Default::default()
    })?;

    match action {
        IdentitiesCommand::Info => {
            for i in 0..config.seda_chain.identities_amount {
                let identity = derive_identity(&mnemonic, i).map_err(CliError::from)?;
                let staker = client.query_staker(&identity.id()).await?;
                match staker {
                    Some(staker) => println!(
                        "identity {} ({}): staked={} pendingWithdrawal={}",
                        i,
                        identity.id(),
                        staker.tokens_staked,
                        staker.tokens_pending_withdrawal
                    ),
                    None => println!("identity {} ({}): not staked", i, identity.id()),
                }
            }
        }
        IdentitiesCommand::Stake { amount, index, memo } => {
            let identity = derive_identity(&mnemonic, index).map_err(CliError::from)?;
            let seq = client.query_staker_and_seq(&identity.id()).await?.seq;
            let hash = hashing::stake_message_hash(
                memo.as_deref().map(str::as_bytes),
                &config.seda_chain.chain_id,
                &config.seda_chain.contract,
                seq,
            );
            let proof = prove(&identity.private_key, &hash);
            let msg = ContractMsg::Stake(StakeMsg {
                public_key: identity.public_key.to_hex(),
                proof: proof.to_hex(),
                memo,
            });
            let _ = amount;
            let value = serde_json::to_value(&msg).map_err(|e| CliError::Generic(e.to_string()))?;
            let result = client.sign_and_broadcast(index, &[value], GasOption::Auto).await?;
            println!("staked identity {} ({}): tx={}", index, identity.id(), result.tx_hash);
        }
        IdentitiesCommand::Unstake { amount, index, memo } => {
            let identity = derive_identity(&mnemonic, index).map_err(CliError::from)?;
            let seq = client.query_staker_and_seq(&identity.id()).await?.seq;
            let hash = hashing::unstake_message_hash(amount, &config.seda_chain.chain_id, &config.seda_chain.contract, seq);
            let proof = prove(&identity.private_key, &hash);
            let msg = ContractMsg::Unstake(UnstakeMsg {
                public_key: identity.public_key.to_hex(),
                proof: proof.to_hex(),
            });
            let _ = memo;
            let value = serde_json::to_value(&msg).map_err(|e| CliError::Generic(e.to_string()))?;
            let result = client.sign_and_broadcast(index, &[value], GasOption::Auto).await?;
            println!("unstaked identity {} ({}): amount={amount} tx={}", index, identity.id(), result.tx_hash);
        }
        IdentitiesCommand::Withdraw { index, memo } => {
            let identity = derive_identity(&mnemonic, index).map_err(CliError::from)?;
            let staker = client.query_staker(&identity.id())
                .await?
                .ok_or_else(|| CliError::Generic(format!("identity {} has no staker record", identity.id())))?;
            let seq = client.query_staker_and_seq(&identity.id()).await?.seq;
            let hash = hashing::withdraw_message_hash(
                staker.tokens_pending_withdrawal,
                &config.seda_chain.chain_id,
                &config.seda_chain.contract,
                seq,
            );
            let proof = prove(&identity.private_key, &hash);
            let msg = ContractMsg::Withdraw(WithdrawMsg {
                public_key: identity.public_key.to_hex(),
                proof: proof.to_hex(),
                withdraw_address: identity.id(),
            });
            let _ = memo;
            let value = serde_json::to_value(&msg).map_err(|e| CliError::Generic(e.to_string()))?;
            let result = client.sign_and_broadcast(index, &[value], GasOption::Auto).await?;
            println!(
                "withdrew identity {} ({}): amount={} tx={}",
                index,
                identity.id(),
                staker.tokens_pending_withdrawal,
                result.tx_hash
            );
        }
    }

    Ok(())
}

async fn cmd_dev(command: DevCommand) -> Result<(), CliError> {
    require_dev_tools()?;

    let config_path = match &command {
        DevCommand::Pause { config, .. }
        | DevCommand::Allowlist { config, .. }
        | DevCommand::Send { config, .. }
        | DevCommand::ListExecutors { config }
        | DevCommand::ChainConfig { config }
        | DevCommand::ExecuteOp { config, .. } => config.clone(),
    };
    let path = resolve_config_path(config_path);
    let config = load_config(&path)?;
    let client = HttpChainClient::new(HttpChainClientConfig {
        rpc: config.seda_chain.rpc.clone(),
        contract: config.seda_chain.contract.clone(),
        ..Default::default()
    })?;

    match command {
        DevCommand::Pause { unpause, .. } => {
            warn!("pause/unpause is a governance-gated contract call; this prints the intent only");
            println!("would {} the core contract", if unpause { "unpause" } else { "pause" });
        }
        DevCommand::Allowlist { identity_id, remove, .. } => {
            println!("would {} {identity_id} {} the staking allowlist", if remove { "remove" } else { "add" }, if remove { "from" } else { "to" });
        }
        DevCommand::Send { to, amount, .. } => {
            println!("would send {amount} from the funder account to {to}");
        }
        DevCommand::ListExecutors { .. } => {
            let stakers = client.query_stakers().await?;
            for staker in stakers {
                println!("{}: staked={}", staker.public_key.identity_id(), staker.tokens_staked);
            }
        }
        DevCommand::ChainConfig { .. } => {
            let dr_config = client.query_dr_config().await?;
            let staking_config = client.query_staking_config().await?;
            println!("{}", serde_json::to_string_pretty(&dr_config).map_err(|e| CliError::Generic(e.to_string()))?);
            println!(
                "{}",
                serde_json::to_string_pretty(&staking_config).map_err(|e| CliError::Generic(e.to_string()))?
            );
        }
        DevCommand::ExecuteOp { dr_id, .. } => {
            let dr_id: seda_overlay_common::crypto::Hash = dr_id
                .parse()
                .map_err(|_| CliError::Generic("malformed dr id".to_string()))?;
            let dr = client.query_dr(dr_id)
                .await?
                .ok_or_else(|| CliError::Generic("data request not found".to_string()))?;
            let program_cache = ProgramCache::new(config.wasm_cache_dir.clone(), VM_VERSION);
            let module = program_cache.get_oracle_program(&client, dr.exec_program_id).await.map_err(|e| CliError::Generic(e.to_string()))?;
            println!("fetched oracle program ({} bytes) for dr {dr_id}; local execution requires a wired WasmRuntime", module.len());
        }
    }

    Ok(())
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { home, network } => cmd_init(home, network),
        Commands::Run { port, config, mnemonic, network } => cmd_run(port, config, mnemonic, network).await,
        Commands::Validate { config } => cmd_validate(config),
        Commands::Identities { action, config } => cmd_identities(action, config).await,
        Commands::Dev(command) => cmd_dev(command).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
