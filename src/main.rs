use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use tokio::net::UdpSocket;

use zonedns::address_family::bind_listener;
use zonedns::resolver::{DEFAULT_MAX_CNAME_CHAIN, DEFAULT_MAX_REFERRALS};
use zonedns::upstream::{DEFAULT_ATTEMPTS, DEFAULT_TIMEOUT};
use zonedns::{
    MatchPolicy, Resolver, ResolverConfig, Server, UdpUpstream, ZoneTable, DEFAULT_LISTEN_PORT,
    DNS_PORT,
};

#[derive(Parser)]
#[command(name = "zonedns")]
#[command(version)]
#[command(about = "Recursive DNS resolver that tags A answers with their network zone")]
struct Cli {
    /// Root name server every lookup starts from
    #[arg(short = 'r', long, value_name = "IP")]
    root: IpAddr,

    /// Zone file with one `<prefix>/<length>,<zone>` entry per line
    #[arg(short = 'e', long, value_name = "FILE")]
    zones: PathBuf,

    /// Address to serve clients on
    #[arg(long, default_value_t = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_LISTEN_PORT))]
    listen: SocketAddr,

    /// Port of the root and of every name server it refers to
    #[arg(long, default_value_t = DNS_PORT)]
    upstream_port: u16,

    /// Seconds to wait for each upstream reply
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Times an upstream query is sent before giving up
    #[arg(long, default_value_t = DEFAULT_ATTEMPTS)]
    attempts: u32,

    #[arg(long, default_value_t = DEFAULT_MAX_REFERRALS)]
    max_referrals: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_CNAME_CHAIN)]
    max_cname_chain: usize,

    /// Pick the most specific zone instead of the first one listed
    #[arg(long)]
    longest_prefix: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("couldn't start runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(serve(cli))
}

async fn serve(cli: Cli) -> ExitCode {
    let policy = if cli.longest_prefix {
        MatchPolicy::LongestPrefix
    } else {
        MatchPolicy::FirstMatch
    };
    let zones = match ZoneTable::load(&cli.zones) {
        Ok(zones) => zones.with_policy(policy),
        Err(err) => {
            error!("couldn't load zones from {}: {}", cli.zones.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let socket = match bind_listener(cli.listen).and_then(UdpSocket::from_std) {
        Ok(socket) => socket,
        Err(err) => {
            error!("couldn't bind {}: {}", cli.listen, err);
            return ExitCode::FAILURE;
        }
    };

    let mut config = ResolverConfig::new(cli.root).with_upstream_port(cli.upstream_port);
    config.max_referrals = cli.max_referrals;
    config.max_cname_chain = cli.max_cname_chain;

    let upstream = UdpUpstream::new(Duration::from_secs(cli.timeout), cli.attempts);
    let resolver = Resolver::new(upstream, zones, config);

    info!(
        "listening on {} with {} zones, root server {}",
        cli.listen,
        resolver.zones().len(),
        cli.root
    );
    Server::new(socket, resolver).run().await;
    ExitCode::SUCCESS
}
