use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};

use bandportal_auth::roles::display_order;
use bandportal_client::{
    AuthStateStore, ClientConfig, CredentialStore, FileStorage, GuardDecision, HttpAuthApi, LoginRequest,
    ReqwestTransport, RouteGuard, RouteTable, Session, SessionError,
};

#[derive(Parser, Debug)]
#[command(name = "bandportal", about = "Sign in to the band portal and inspect the session")]
struct Cli {
    /// Session file; defaults to the platform data directory.
    #[arg(long, env = "BANDPORTAL_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate and store the session.
    Login {
        /// Username or email.
        username: String,
        #[arg(long, env = "BANDPORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Show the signed-in user, re-read from the profile endpoint.
    Whoami,
    /// Renew the access token with the stored refresh token.
    Refresh,
    /// Check whether the stored session may open a portal path.
    CanVisit { path: String },
}

fn user_facing(err: SessionError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

fn print_user(profile: &bandportal_auth::UserProfile) {
    let roles: Vec<&str> = display_order(profile.roles()).iter().map(|r| r.display_name()).collect();
    println!("{} <{}> (id {})", profile.display_name(), profile.email(), profile.id());
    println!("roles: {}", roles.join(", "));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bandportal_observability::init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();

    let path = cli
        .session_file
        .or_else(FileStorage::default_location)
        .ok_or_else(|| anyhow!("no data directory on this platform; pass --session-file"))?;
    tracing::debug!(path = %path.display(), "using session file");

    let credentials = CredentialStore::new(Arc::new(FileStorage::new(path)), config.storage_keys());
    let api = HttpAuthApi::new(Arc::new(ReqwestTransport::new()), config.clone());
    let session = Session::new(Arc::new(api), credentials, AuthStateStore::new());
    session.restore();

    match cli.command {
        Command::Login { username, password } => {
            let profile = session
                .login(&LoginRequest::new(username, password))
                .await
                .map_err(user_facing)?;
            print_user(&profile);
        }
        Command::Logout => {
            session.logout().await;
            println!("signed out");
        }
        Command::Whoami => {
            if !session.state().is_authenticated() {
                println!("not signed in");
                return Ok(());
            }
            let profile = session.fetch_profile().await.map_err(user_facing)?;
            print_user(&profile);
        }
        Command::Refresh => {
            let profile = session.refresh().await.map_err(user_facing)?;
            print_user(&profile);
        }
        Command::CanVisit { path } => {
            let guard = RouteGuard::new(session.state().clone());
            match guard.navigate(&RouteTable::portal(), &path) {
                GuardDecision::Allow => println!("allowed"),
                GuardDecision::Deny(redirect) => {
                    bail!("access to {path} denied; redirect to {}", redirect.location(&config.navigation));
                }
            }
        }
    }

    Ok(())
}
