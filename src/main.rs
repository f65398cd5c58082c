use clap::{Parser, Subcommand};
use position_resolver::config::Settings;
use position_resolver::server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// positiond: device position resolution service
///
/// Resolves coordinates, address and timezone from a GPS fix, a public IP,
/// GSM cell towers or WiFi access points, caching results and enforcing a
/// daily limit on billable provider calls.
///
/// Examples:
///   positiond serve --port 8080
///   positiond resolve '{"gpsPosition": {"latitude": 45.4774536, "longitude": 9.1906932}}'
///   positiond resolve '{"ipAddress": {"ipv4": "8.8.8.8"}}'
///   positiond quota
#[derive(Parser)]
#[command(name = "positiond", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long, env = "POSITION_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, short = 'p', env = "POSITION_PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Resolve a single JSON request and print the response.
    Resolve {
        /// Request body, e.g. '{"ipAddress": {"ipv4": "8.8.8.8"}}'
        request: String,
    },
    /// Show today's quota usage.
    Quota,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "position_resolver=info,positiond=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Quota => {
            let quota = cli.settings.quota_counter().unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });
            let state = quota.snapshot();
            let out = serde_json::json!({
                "count": state.count,
                "day": state.day,
                "limit": cli.settings.daily_limit,
            });
            println!("{}", out);
        }
        Command::Resolve { request } => {
            let raw: serde_json::Value = serde_json::from_str(&request).unwrap_or_else(|e| {
                eprintln!("Error: request is not valid JSON: {}", e);
                std::process::exit(1);
            });
            let resolver = build(&cli.settings);
            let response = resolver.resolve(&raw);
            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Serve { host, port } => {
            let resolver = build(&cli.settings);
            let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
                eprintln!("Error: cannot start runtime: {}", e);
                std::process::exit(1);
            });
            if let Err(e) = runtime.block_on(server::start(resolver, &host, port)) {
                eprintln!("Error: server failed on {}:{}: {}", host, port, e);
                std::process::exit(1);
            }
        }
    }
}

fn build(settings: &Settings) -> position_resolver::position::PositionResolver {
    settings.build_resolver().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}
