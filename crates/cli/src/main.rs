use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taskman")]
#[command(about = "TaskMan Messenger webhook relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json (existing config is kept).
    Init {
        /// Config file path (default: TASKMAN_CONFIG_PATH or ~/.taskman/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook server. Secrets may come from VERIFY_TOKEN and PAGE_ACCESS_TOKEN.
    Serve {
        /// Config file path (default: TASKMAN_CONFIG_PATH or ~/.taskman/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default: PORT env, then config, then 1337)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("taskman {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("server failed: {:#}", e);
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
    let (config, path) = lib::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    let mut settings = lib::config::Settings::resolve(&config);
    if let Some(p) = port {
        settings.port = p;
    }
    log::info!("starting webhook server on {}:{}", settings.bind, settings.port);
    lib::gateway::run_gateway(settings).await
}
