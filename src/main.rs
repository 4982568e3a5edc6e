use clap::{Parser, Subcommand};
use nvpn::config::{ConfigError, ConfigStore};
use nvpn::prompt::{TerminalPrompter, collect_config};
use nvpn::toggle::Action;
use nvpn::{Controller, NetworkManager, SystemRunner, ToggleError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "nvpn")]
#[command(about = "Toggle a NetworkManager VPN connection using a static password plus TOTP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Connect if disconnected, disconnect if connected (default)
    Toggle,
    /// Create the config file interactively
    Init,
    /// Connect, warn if already connected
    Connect,
    /// Disconnect, warn if not connected
    Disconnect,
    /// Show whether the connection is active
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they don't mix with nmcli's forwarded stdout
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = cli.command.unwrap_or(Commands::Toggle);
    if let Err(e) = run(command).await {
        error!("Something went wrong: {}", e);
        debug!("{:?}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands) -> Result<(), ToggleError> {
    let store = ConfigStore::new(ConfigStore::default_path()?);

    let action = match command {
        Commands::Init => {
            if store.exists() {
                warn!("Overwriting existing config {}", store.path().display());
            }
            let config = collect_config(&TerminalPrompter).map_err(ConfigError::Prompt)?;
            store.create(config)?;
            println!("Created config: {}", store.path().display());
            return Ok(());
        }
        Commands::Toggle => Action::Toggle,
        Commands::Connect => Action::Connect,
        Commands::Disconnect => Action::Disconnect,
        Commands::Status => Action::Status,
    };

    let config = store.load(action.load_mode(&TerminalPrompter))?;
    let name = config.connection_name.clone();
    let controller = controller(config);
    match action {
        Action::Toggle => {
            controller.toggle().await?;
        }
        Action::Connect => {
            controller.connect().await?;
        }
        Action::Disconnect => {
            controller.disconnect().await?;
        }
        Action::Status => {
            info!("Checking VPN status...");
            println!("{}: {}", name, controller.status().await);
        }
    }

    Ok(())
}

fn controller(config: nvpn::Config) -> Controller<SystemRunner> {
    Controller::new(NetworkManager::new(SystemRunner::new()), config)
}
