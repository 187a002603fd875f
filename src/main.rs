use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::runtime::Builder;
use tracing::{Level, info};

use routesim::config::NodeConfig;
use routesim::network::{UdpTransport, discover_neighbors, discover_self_address};
use routesim::protocol::{Host, Monitor, MonitorCommand, Router};
use routesim::runtime::{MonitorService, dispatch, run_host, run_router};

#[derive(Parser)]
#[command(name = "routesim", about = "Distance-vector and link-state routing nodes")]
struct Cli {
    #[arg(long, default_value = "info", global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Forward packets and answer monitor commands
    Router {
        #[arg(long)]
        config: String,
    },
    /// Send or receive data packets
    Host {
        #[arg(long)]
        config: String,

        #[command(subcommand)]
        action: HostAction,
    },
    /// Coordinate link-state rounds and administer routers
    Monitor {
        #[arg(long)]
        config: String,

        #[command(subcommand)]
        action: MonitorAction,
    },
}

#[derive(Subcommand)]
enum HostAction {
    /// Announce ourselves and print every packet we receive
    Listen,
    Send {
        dst: String,
        #[arg(default_value = "")]
        payload: String,
    },
    Broadcast {
        #[arg(default_value = "")]
        payload: String,
    },
}

#[derive(Subcommand)]
enum MonitorAction {
    /// Run a single collection round
    Collect,
    /// Run collection rounds forever, every `collect_interval_secs`
    Watch,
    RipOn(Target),
    RipOff(Target),
    /// Make routers send a ttl-0 broadcast to their neighbors
    Broadcast(Target),
    Clear(Target),
    /// Fetch and print one router's table
    Snapshot {
        #[arg(long)]
        router: String,
    },
    /// Make routers log their own table
    Print(Target),
}

#[derive(Args)]
struct Target {
    /// Only this router instead of all of them
    #[arg(long)]
    router: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    let rt = Builder::new_multi_thread().enable_all().build()?;

    rt.block_on(async {
        match cli.command {
            Command::Router { config } => router(&config).await,
            Command::Host { config, action } => host(&config, action).await,
            Command::Monitor { config, action } => monitor(&config, action).await,
        }
    })
}

async fn router(path: &str) -> Result<()> {
    let config = NodeConfig::load(path).with_context(|| format!("loading {}", path))?;
    let address = discover_self_address(&config)?;
    let router = Router::new(address.clone(), discover_neighbors(&config, &address)).with_rip(config.rip_enabled);

    let transport = UdpTransport::bind(address, config.bind, config.peers.clone()).await?;
    run_router(router, transport).await?;
    Ok(())
}

async fn host(path: &str, action: HostAction) -> Result<()> {
    let config = NodeConfig::load(path).with_context(|| format!("loading {}", path))?;
    let address = discover_self_address(&config)?;
    let host = Host::new(address.clone(), discover_neighbors(&config, &address))
        .with_broadcast_radius(config.broadcast_radius);

    let transport = UdpTransport::bind(address, config.bind, config.peers.clone()).await?;

    match action {
        HostAction::Listen => {
            run_host(host, transport, |packet| {
                println!("{} -> {} (ttl {}): {}", packet.src, packet.dst, packet.ttl, packet.payload);
            })
            .await?
        }
        HostAction::Send { dst, payload } => dispatch(&transport, host.send(&dst, payload)).await,
        HostAction::Broadcast { payload } => dispatch(&transport, host.broadcast(payload)).await,
    }
    Ok(())
}

async fn monitor(path: &str, action: MonitorAction) -> Result<()> {
    let config = NodeConfig::load(path).with_context(|| format!("loading {}", path))?;
    let address = discover_self_address(&config)?;
    let routers = if config.routers.is_empty() {
        discover_neighbors(&config, &address).into_iter().collect()
    } else {
        config.routers.clone()
    };
    if routers.is_empty() {
        bail!("no routers configured for monitor {}", address);
    }

    let transport = UdpTransport::bind(address.clone(), config.bind, config.peers.clone()).await?;
    let mut service = MonitorService::new(Monitor::new(address, routers), transport)
        .with_collect_timeout(config.collect_timeout());

    match action {
        MonitorAction::Collect => {
            let round = service.collect_round().await?;
            for (router, table) in &round.tables {
                println!("{}:\n{}", router, table);
            }
        }
        MonitorAction::Watch => {
            info!("Collecting every {:?}", config.collect_interval());
            service.watch(config.collect_interval()).await?;
        }
        MonitorAction::RipOn(target) => service.command(target.router.as_deref(), MonitorCommand::RipOn).await,
        MonitorAction::RipOff(target) => service.command(target.router.as_deref(), MonitorCommand::RipOff).await,
        MonitorAction::Broadcast(target) => {
            service.command(target.router.as_deref(), MonitorCommand::BroadcastTtl0).await
        }
        MonitorAction::Clear(target) => service.command(target.router.as_deref(), MonitorCommand::ClearTable).await,
        MonitorAction::Snapshot { router } => {
            let snapshot = service.snapshot(&router).await?;
            println!("{}:\n{}", router, snapshot.table);
        }
        MonitorAction::Print(target) => service.command(target.router.as_deref(), MonitorCommand::PrintTable).await,
    }
    Ok(())
}
