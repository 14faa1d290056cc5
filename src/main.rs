use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use storefront_session::config::ConfigError;
use storefront_session::router::NavigationError;
use storefront_session::{
    ApiError, ClientConfig, Credentials, FetchMode, Navigator, ProfileUpdate, Registration, RouteTable, SessionManager,
};

const WATCH_POLL_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("output encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("nothing to update; pass --username, --email or --phone")]
    EmptyProfileUpdate,
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "storefront-session", about = "Storefront session client")]
struct Cli {
    /// Overrides `STOREFRONT_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `STOREFRONT_SESSION_FILE`.
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "STOREFRONT_PASSWORD")]
        password: String,
    },
    Logout,
    Whoami,
    Register {
        #[arg(long)]
        username: String,
        #[arg(long, env = "STOREFRONT_PASSWORD")]
        password: String,
        #[arg(long)]
        phone: String,
        /// SMS verification code.
        #[arg(long)]
        code: String,
        #[arg(long)]
        email: Option<String>,
    },
    UpdateProfile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    ChangePassword {
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
    },
    /// Resolve a path through the route guard and print where it lands.
    Navigate { path: String },
    /// Restore the session and keep it refreshed until Ctrl-C.
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config = ClientConfig::new(base_url, config.timeouts, config.refresh_period, config.session_file)?;
    }
    if let Some(session_file) = cli.session_file {
        config.session_file = session_file;
    }

    let manager = SessionManager::from_config(&config)?;
    run(cli.command, manager).await
}

async fn run(command: Command, manager: SessionManager) -> Result<(), CliError> {
    match command {
        Command::Login { username, password } => {
            let auth = manager.login(&Credentials { username, password }).await?;
            println!("{}", serde_json::to_string_pretty(&auth.user)?);
        }
        Command::Logout => {
            manager.logout().await;
            println!("logged out");
        }
        Command::Whoami => {
            let user = manager.fetch_profile(FetchMode::Interactive).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Register { username, password, phone, code, email } => {
            let data = manager
                .register(&Registration { username, password, phone, code, email })
                .await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Command::UpdateProfile { username, email, phone } => {
            let update = ProfileUpdate { username, email, phone }.sanitized();
            if update.is_empty() {
                return Err(CliError::EmptyProfileUpdate);
            }
            manager.update_profile(&update).await?;
            println!("{}", serde_json::to_string_pretty(&manager.current_user())?);
        }
        Command::ChangePassword { old_password, new_password } => {
            manager.change_password(&old_password, &new_password).await?;
            println!("password changed");
        }
        Command::Navigate { path } => {
            let mut navigator = Navigator::new(manager, RouteTable::default());
            println!("{}", navigator.navigate(&path).await?);
        }
        Command::Watch => watch(manager).await?,
    }
    Ok(())
}

async fn watch(manager: SessionManager) -> Result<(), CliError> {
    if !manager.initialize().await {
        println!("no active session");
        return Ok(());
    }
    let mut redirects = manager.redirects();
    let mut liveness = tokio::time::interval(Duration::from_secs(WATCH_POLL_SECS));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    tracing::info!("watching session; press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = liveness.tick() => {}
            signal = &mut ctrl_c => {
                signal?;
                break;
            }
            changed = redirects.changed() => {
                if changed.is_err() {
                    break;
                }
                let target = redirects.borrow_and_update().clone();
                if let Some(target) = target {
                    println!("session ended; redirect to {target}");
                }
            }
        }
        if !manager.is_authenticated() {
            println!("session ended");
            break;
        }
    }
    manager.cancel_session_refresh();
    Ok(())
}
