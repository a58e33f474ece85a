use clap::Parser;
use monkey_agent::{
    AGENT_VERSION,
    agent::Agent,
    config::{AGENT_SERVICE, AgentConfig},
    providers::{HostProvider, Providers, SystemProvider},
    supervisor::{Supervisor, install_panic_hook},
    util::get_log_level,
};
use tracing::{error, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(disable_version_flag = true)]
struct Args {
    /// Display agent version
    #[arg(long)]
    version: bool,

    /// Display agent status
    #[arg(long)]
    status: bool,
}

fn init() {
    dotenv::dotenv().ok();

    let level = get_log_level();
    let filter = filter::Targets::new().with_target("monkey_agent", level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn print_status() {
    let host = SystemProvider::new();
    let details = host.host_details().await;

    println!("Monitor Monkey Agent Status");
    println!("==========================");
    println!("Version:  {AGENT_VERSION}");
    println!("Hostname: {}", details.hostname);
    println!("Host ID:  {}", details.hostid);
    println!("IP:       {}", details.ip);
    println!("OS:       {} {}", details.os, details.platform);
    println!("Uptime:   {} seconds", details.uptime);
    println!("Service:  {}", host.service_status(AGENT_SERVICE).await);
}

#[tokio::main]
async fn main() {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    if args.version {
        println!("Monitor Monkey Agent version {AGENT_VERSION}");
        return;
    }

    if args.status {
        print_status().await;
        return;
    }

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    install_panic_hook();

    Supervisor::default()
        .run(|| {
            let config = config.clone();
            async move {
                Agent::new(config, Providers::system())?.run().await
            }
        })
        .await;
}
