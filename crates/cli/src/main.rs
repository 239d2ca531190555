use clap::{Parser, Subcommand};
use lib::reply::Reply;

#[derive(Parser)]
#[command(name = "tripbot")]
#[command(about = "Tripbot CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: TRIPBOT_CONFIG_PATH or ~/.tripbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the LINE webhook gateway.
    Serve {
        /// Config file path (default: TRIPBOT_CONFIG_PATH or ~/.tripbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (overrides PORT env and config; default 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run one message through the assistant and print the reply.
    Ask {
        /// Config file path (default: TRIPBOT_CONFIG_PATH or ~/.tripbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Print the reply and places as JSON.
        #[arg(long)]
        json: bool,

        /// Message text, e.g. "推薦台北景點".
        message: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("tripbot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask {
            config,
            json,
            message,
        }) => {
            if let Err(e) = run_ask(config, json, &message).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    log::debug!("loaded config from {}", path.display());
    config.gateway.port_override = port;
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        lib::config::resolve_gateway_port(&config)
    );
    lib::gateway::run_gateway(config).await
}

async fn run_ask(
    config_path: Option<std::path::PathBuf>,
    json: bool,
    message: &str,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let agent = lib::agent::Agent::from_config(&config)?;
    let outcome = agent.run(message).await?;
    log::info!(
        "keyword {:?}, {} place(s), {} completion turn(s)",
        outcome.context.keyword,
        outcome.context.search.records.len(),
        outcome.context.llm_turns
    );
    if json {
        let out = serde_json::json!({
            "text": outcome.reply.text(),
            "places": outcome.reply.places(),
            "keyword": outcome.context.keyword,
            "rewritten": outcome.context.rewritten,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    println!("{}", outcome.reply.text().trim());
    if let Reply::Places { places, .. } = &outcome.reply {
        for place in places {
            println!("- {} ({}) {}", place.name, place.display_nickname(), place.detail_url);
        }
    }
    Ok(())
}
