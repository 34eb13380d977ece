use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dao_client_core::{
    address::parse_address,
    ethers_wallet::SignerClient,
    units::short_address,
    ControllerEvent, EthersWallet, GovernanceController, ProposalRequest, StatusLevel,
    WalletProvider,
};
use dao_shared::{error::ErrorReport, protocol::Proposal};
use ethers::{
    providers::{Http, Provider},
    types::{Bytes, U256},
};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "dao", about = "DAO governance client")]
struct Cli {
    /// Config file; `governance.toml` in the working directory is used when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured JSON-RPC endpoint.
    #[arg(long)]
    rpc_url: Option<String>,
    /// Print results as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and show the account and token balance.
    Status,
    /// Delegate the account's voting power to itself.
    Delegate,
    /// Submit a proposal. Without targets it is a text-only proposal.
    Propose {
        description: String,
        #[arg(long = "target")]
        targets: Vec<String>,
        /// Wei amount per target, in decimal.
        #[arg(long = "value")]
        values: Vec<String>,
        /// Hex calldata per target.
        #[arg(long = "calldata")]
        calldatas: Vec<String>,
    },
    /// List every proposal the governor has recorded.
    Proposals,
    Vote {
        proposal_id: String,
        #[arg(value_enum)]
        support: SupportArg,
    },
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
    /// Stay connected and print session and proposal changes.
    Watch,
}

#[derive(Subcommand, Debug)]
enum AgentCommand {
    Show,
    Link { agent_address: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SupportArg {
    For,
    Against,
}

enum Wallet {
    Node(Arc<EthersWallet<Provider<Http>>>),
    LocalKey(Arc<EthersWallet<SignerClient>>),
}

impl Wallet {
    fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let Some(endpoint) = settings.wallet_endpoint() else {
            return Ok(None);
        };
        let wallet = match &settings.private_key {
            Some(key) => Self::LocalKey(
                EthersWallet::local_key(endpoint, key, settings.chain_id)
                    .context("failed to build local-key wallet")?,
            ),
            None => Self::Node(EthersWallet::node(endpoint).context("failed to build wallet")?),
        };
        Ok(Some(wallet))
    }

    fn provider(&self) -> Arc<dyn WalletProvider> {
        match self {
            Self::Node(wallet) => wallet.clone(),
            Self::LocalKey(wallet) => wallet.clone(),
        }
    }

    fn spawn_change_poller(&self, interval: Duration) -> JoinHandle<()> {
        match self {
            Self::Node(wallet) => wallet.spawn_change_poller(interval),
            Self::LocalKey(wallet) => wallet.spawn_change_poller(interval),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(rpc_url) = cli.rpc_url.clone() {
        settings.rpc_url = rpc_url;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let wallet = Wallet::from_settings(&settings)?;
    let controller = GovernanceController::with_addresses(
        wallet.as_ref().map(Wallet::provider),
        settings.contract_addresses()?,
    );
    info!(
        rpc_url = %settings.rpc_url,
        chain_id = settings.chain_id,
        local_key = settings.private_key.is_some(),
        "governance client starting"
    );

    let connected = controller.connect().await;
    print_status(&controller, cli.json).await;
    let session = connected.context("wallet connection failed")?;
    if !cli.json {
        println!(
            "Connected: {}  balance: {}",
            short_address(session.wallet_address),
            session.balance
        );
    }

    debug!(command = ?cli.command, "dispatching command");
    match cli.command {
        Command::Status => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            }
        }
        Command::Delegate => {
            let result = controller.delegate_votes().await;
            print_status(&controller, cli.json).await;
            result?;
        }
        Command::Propose {
            description,
            targets,
            values,
            calldatas,
        } => {
            let request = build_proposal_request(description, &targets, &values, &calldatas)?;
            let result = controller.create_proposal(request).await;
            print_status(&controller, cli.json).await;
            result?;
            print_proposals(&controller.proposals().await, cli.json)?;
        }
        Command::Proposals => {
            let result = controller.fetch_proposals().await;
            print_status(&controller, cli.json).await;
            print_proposals(&result?, cli.json)?;
        }
        Command::Vote {
            proposal_id,
            support,
        } => {
            let result = controller
                .vote_on_proposal(&proposal_id, matches!(support, SupportArg::For))
                .await;
            print_status(&controller, cli.json).await;
            result?;
        }
        Command::Agent { command } => {
            let result = match command {
                AgentCommand::Show => controller.lookup_agent().await.map(|_| ()),
                AgentCommand::Link { agent_address } => {
                    controller.connect_agent(&agent_address).await.map(|_| ())
                }
            };
            print_status(&controller, cli.json).await;
            result?;
        }
        Command::Watch => {
            let wallet = wallet.ok_or_else(|| anyhow!("watch requires a wallet endpoint"))?;
            watch(&controller, &wallet, settings.poll_interval(), cli.json).await?;
        }
    }

    Ok(())
}

fn build_proposal_request(
    description: String,
    targets: &[String],
    values: &[String],
    calldatas: &[String],
) -> Result<ProposalRequest> {
    if values.len() != targets.len() || calldatas.len() != targets.len() {
        return Err(anyhow!(
            "--target, --value and --calldata must be given the same number of times"
        ));
    }

    let targets = targets
        .iter()
        .map(|target| parse_address(target).map_err(|err| anyhow!("target '{target}': {err}")))
        .collect::<Result<Vec<_>>>()?;
    let values = values
        .iter()
        .map(|value| {
            U256::from_dec_str(value.trim()).map_err(|err| anyhow!("value '{value}': {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let calldatas = calldatas
        .iter()
        .map(|data| Bytes::from_str(data.trim()).map_err(|err| anyhow!("calldata '{data}': {err}")))
        .collect::<Result<Vec<_>>>()?;

    Ok(ProposalRequest {
        targets,
        values,
        calldatas,
        description,
    })
}

async fn print_status(controller: &GovernanceController, json: bool) {
    let Some(status) = controller.status().await else {
        return;
    };
    if json {
        if let Some(code) = status.code {
            if let Ok(line) = serde_json::to_string(&ErrorReport::new(code, status.message)) {
                eprintln!("{line}");
            }
        }
        return;
    }
    match status.level {
        StatusLevel::Error => eprintln!("error: {}", status.message),
        StatusLevel::Info | StatusLevel::Success => println!("{}", status.message),
    }
}

fn print_proposals(proposals: &[Proposal], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(proposals)?);
        return Ok(());
    }
    for proposal in proposals {
        println!("Proposal ID: {}", proposal.id);
        println!("Description: {}", proposal.description);
        println!();
    }
    Ok(())
}

async fn watch(
    controller: &Arc<GovernanceController>,
    wallet: &Wallet,
    interval: Duration,
    json: bool,
) -> Result<()> {
    let mut events = controller.subscribe_events();
    let poller = wallet.spawn_change_poller(interval);
    let watcher = controller.watch_wallet_events();

    let initial = controller.fetch_proposals().await;
    print_status(controller, json).await;
    print_proposals(&initial?, json)?;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = events.recv() => match event {
                Ok(ControllerEvent::SessionEnded { reason }) => {
                    break Err(anyhow!("session ended: {reason}"));
                }
                Ok(ControllerEvent::ProposalsUpdated(proposals)) => {
                    print_proposals(&proposals, json)?;
                }
                Ok(_) => {}
                Err(err) => break Err(anyhow!("controller event stream failed: {err}")),
            },
        }
    };

    poller.abort();
    if let Some(watcher) = watcher {
        watcher.abort();
    }
    outcome
}
