//! carbonfi: command-line client for the CarbonFi staking contract.
//!
//! Configuration is layered: a TOML file (`--config`) provides the base and
//! any flag or `CARBONFI_*` environment variable overrides it.

mod output;

use anyhow::{bail, Context};
use carbonfi_gateway::{ChainGateway, HttpGateway};
use carbonfi_staking::{
    EngineConfig, EngineMetrics, PendingTransaction, SessionContext, SessionOptions, StakeAction,
    StakingSession, TxState,
};
use carbonfi_types::{parse_units, AccountAddress, ChainId, PeriodId, SystemClock, TokenAmount};
use carbonfi_utils::{init_logging, parse_period, LogFormat};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "carbonfi", version, about = "CarbonFi multi-period staking client")]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, env = "CARBONFI_CONFIG")]
    config: Option<PathBuf>,

    /// Gateway relay URL.
    #[arg(long, env = "CARBONFI_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Staking contract address.
    #[arg(long, env = "CARBONFI_STAKING_CONTRACT")]
    staking_contract: Option<AccountAddress>,

    /// Staked token address.
    #[arg(long, env = "CARBONFI_TOKEN_CONTRACT")]
    token_contract: Option<AccountAddress>,

    /// Network the contracts are deployed on (name or numeric id).
    #[arg(long, env = "CARBONFI_CHAIN", value_parser = parse_chain)]
    chain: Option<ChainId>,

    /// Network the wallet is connected to. Defaults to the contract network.
    #[arg(long, env = "CARBONFI_CONNECTED_CHAIN", value_parser = parse_chain)]
    connected_chain: Option<ChainId>,

    /// Account whose positions are tracked and on whose behalf actions are sent.
    #[arg(long, env = "CARBONFI_ACCOUNT")]
    account: Option<AccountAddress>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CARBONFI_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (human, json).
    #[arg(long, env = "CARBONFI_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// How long to wait for a confirming event, e.g. "90s" or "5m".
    #[arg(long, env = "CARBONFI_CONFIRMATION_TIMEOUT", value_parser = parse_secs)]
    confirmation_timeout: Option<u64>,

    /// Print Prometheus metrics after the command.
    #[arg(long)]
    metrics: bool,

    /// Emit JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// List staking periods with their parameters.
    Periods,
    /// Show the account's balance and positions.
    Positions,
    /// Show TVL and the account's totals.
    Summary,
    /// Stake tokens into a period and wait for confirmation.
    Stake {
        /// Period duration, e.g. "30d".
        #[arg(long, value_parser = parse_period_id)]
        period: PeriodId,
        /// Amount in whole tokens, e.g. "1.5".
        #[arg(long, value_parser = parse_amount)]
        amount: TokenAmount,
    },
    /// Withdraw staked tokens from a period and wait for confirmation.
    Withdraw {
        #[arg(long, value_parser = parse_period_id)]
        period: PeriodId,
        #[arg(long, value_parser = parse_amount)]
        amount: TokenAmount,
    },
    /// Claim rewards from a period and wait for confirmation.
    Claim {
        #[arg(long, value_parser = parse_period_id)]
        period: PeriodId,
    },
    /// Follow staking events and print every snapshot change until Ctrl-C.
    Watch,
    /// Print the effective configuration as TOML.
    Config,
}

fn parse_chain(s: &str) -> Result<ChainId, String> {
    ChainId::from_name_or_id(s).ok_or_else(|| format!("unknown network {s:?}"))
}

fn parse_secs(s: &str) -> Result<u64, String> {
    parse_period(s).map_err(|e| e.to_string())
}

fn parse_period_id(s: &str) -> Result<PeriodId, String> {
    let secs = parse_secs(s)?;
    PeriodId::new(secs).map_err(|e| e.to_string())
}

fn parse_amount(s: &str) -> Result<TokenAmount, String> {
    parse_units(s).map_err(|e| e.to_string())
}

impl Cli {
    /// Build the effective config: file base, flags and env on top.
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(url) = &self.gateway_url {
            config.gateway.url = url.clone();
        }
        if let Some(addr) = self.staking_contract {
            config.staking_contract = addr;
        }
        if let Some(addr) = self.token_contract {
            config.token_contract = addr;
        }
        if let Some(chain) = self.chain {
            config.chain_id = chain;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(secs) = self.confirmation_timeout {
            config.confirmation_timeout_secs = secs;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.engine_config()?;

    init_logging(config.log_format, &config.log_level);

    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let gateway: Arc<dyn ChainGateway> =
        Arc::new(HttpGateway::new(&config.gateway).context("creating gateway client")?);
    let metrics = Arc::new(EngineMetrics::new()?);
    let context = SessionContext::new(cli.account, cli.connected_chain.unwrap_or(config.chain_id));
    let options = SessionOptions {
        clock: Arc::new(SystemClock),
        metrics: Some(Arc::clone(&metrics)),
    };

    let session = StakingSession::open_with(gateway, &config, context, options).await?;
    if !session.is_correct_network() {
        warn!(
            connected = %context.chain_id,
            expected = %config.chain_id,
            "wallet is on the wrong network; submissions will be rejected"
        );
    }

    let result = run(&cli, &session).await;
    session.close().await;

    if cli.metrics {
        print!("{}", metrics.encode_text()?);
    }
    result
}

async fn run(cli: &Cli, session: &StakingSession) -> anyhow::Result<()> {
    match &cli.command {
        Command::Periods => {
            let periods = session.refresh_periods().await;
            if cli.json {
                println!("{}", output::periods_json(&periods));
            } else {
                output::print_periods(&periods);
            }
        }
        Command::Positions => {
            let (_, positions) = session.refresh_all().await;
            if cli.json {
                println!("{}", output::positions_json(&positions));
            } else {
                output::print_positions(&positions);
            }
        }
        Command::Summary => {
            session.refresh_all().await;
            let totals = session.totals();
            if cli.json {
                println!("{}", output::totals_json(&totals));
            } else {
                output::print_totals(&totals);
            }
        }
        Command::Stake { period, amount } => {
            let action = StakeAction::Stake {
                period: *period,
                amount: *amount,
            };
            submit_and_wait(cli, session, action).await?;
        }
        Command::Withdraw { period, amount } => {
            let action = StakeAction::Withdraw {
                period: *period,
                amount: *amount,
            };
            submit_and_wait(cli, session, action).await?;
        }
        Command::Claim { period } => {
            submit_and_wait(cli, session, StakeAction::Claim { period: *period }).await?;
        }
        Command::Watch => watch(cli, session).await?,
        Command::Config => {}
    }
    Ok(())
}

fn print_transaction(cli: &Cli, tx: &PendingTransaction) {
    if cli.json {
        println!("{}", output::transaction_json(tx));
    } else {
        output::print_transaction(tx);
    }
}

/// Submit `action` and block until its record reaches a terminal state.
async fn submit_and_wait(
    cli: &Cli,
    session: &StakingSession,
    action: StakeAction,
) -> anyhow::Result<()> {
    // Validation needs current periods, positions and balance.
    session.refresh_all().await;

    let kind = action.kind();
    let mut updates = session.updates();
    let pending = session.submit(action).await?;
    print_transaction(cli, &pending);

    let last = loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(tx) if tx.kind == kind && tx.state.is_terminal() => break tx,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed transaction updates");
                    let current = session.transaction(kind);
                    if let Some(tx) = current.filter(|tx| tx.state.is_terminal()) {
                        break tx;
                    }
                }
                Err(RecvError::Closed) => bail!("session closed before {kind} resolved"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!(%kind, "interrupted; the transaction may still confirm on-chain");
                return Ok(());
            }
        }
    };

    print_transaction(cli, &last);
    session.acknowledge(kind);
    if !matches!(last.state, TxState::Confirmed) {
        bail!("{kind} did not confirm");
    }
    Ok(())
}

async fn watch(cli: &Cli, session: &StakingSession) -> anyhow::Result<()> {
    let mut periods = session.watch_periods();
    let mut positions = session.watch_positions();
    let mut updates = session.updates();

    session.refresh_all().await;
    info!("watching staking events, press Ctrl-C to stop");

    loop {
        tokio::select! {
            changed = periods.changed() => {
                changed.context("period snapshot closed")?;
                let snapshot = periods.borrow_and_update().clone();
                if cli.json {
                    println!("{}", output::periods_json(&snapshot));
                } else {
                    output::print_periods(&snapshot);
                }
            }
            changed = positions.changed() => {
                changed.context("position snapshot closed")?;
                let snapshot = positions.borrow_and_update().clone();
                if cli.json {
                    println!("{}", output::positions_json(&snapshot));
                } else {
                    output::print_positions(&snapshot);
                }
            }
            update = updates.recv() => match update {
                Ok(tx) => print_transaction(cli, &tx),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed transaction updates"),
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                return Ok(());
            }
        }
    }
}
