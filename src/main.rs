use anyhow::Context;
use authkit::config::DEFAULT_CONFIG_FILE;
use authkit::storage::{FileStore, KvSessionStorage};
use authkit::utils::logging::{init_tracing, LogFormat};
use authkit::{
    AnonymousProvider, AuthConfig, AuthContext, AuthEngine, AuthSettings, Credentials,
    SessionState, StaticCredentialsProvider, User,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "authkit")]
#[command(about = "Inspect and drive a locally persisted auth session")]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(short, long, env = "AUTHKIT_CONFIG")]
    config: Option<String>,
    /// Session store directory, overrides the settings file
    #[arg(short, long, env = "AUTHKIT_STORE")]
    store: Option<String>,
    /// Accounts for the static provider, as `email=password`, comma separated
    #[arg(long, env = "AUTHKIT_ACCOUNTS", value_delimiter = ',')]
    accounts: Vec<String>,
    /// Log level
    #[arg(short, long, env = "AUTHKIT_LOG")]
    log_level: Option<String>,
    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the restored session
    Status,
    /// Sign in
    Login {
        #[command(subcommand)]
        method: LoginMethod,
    },
    /// Exchange the current token for a new one
    Refresh,
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Subcommand, Debug)]
enum LoginMethod {
    /// Throwaway anonymous identity
    Anonymous,
    /// Email and password checked against `--accounts`
    Static {
        #[arg(long)]
        email: String,
        #[arg(long, env = "AUTHKIT_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
        None => dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("authkit")
            .join(DEFAULT_CONFIG_FILE),
    };
    let settings = AuthSettings::load_or_default(&config_path)
        .await
        .context("loading settings")?;

    let log_level = cli.log_level.as_deref().or(settings.log_level.as_deref());
    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    init_tracing(log_level, format);
    debug!(config = %config_path.display(), "Settings resolved");

    let engine = AuthEngine::new(AuthContext::shared());
    engine
        .configure(build_config(&cli, &settings)?)
        .await
        .context("restoring stored session")?;

    match cli.command {
        Command::Status => {}
        Command::Login { method } => {
            let (provider_id, credentials) = match method {
                LoginMethod::Anonymous => ("anonymous", Credentials::new()),
                LoginMethod::Static { email, password } => (
                    "static",
                    Credentials::new()
                        .with("email", email)
                        .with("password", password),
                ),
            };
            let session = engine.login_with_provider(provider_id, credentials).await?;
            info!(user_id = %session.user.id(), "Signed in");
        }
        Command::Refresh => match engine.refresh_session().await? {
            Some(_) => info!("Token refreshed"),
            None => println!("Provider did not issue a new token"),
        },
        Command::Logout => engine.logout().await?,
    }

    print_session(&engine.snapshot());
    Ok(())
}

fn build_config(cli: &Cli, settings: &AuthSettings) -> anyhow::Result<AuthConfig> {
    let mut static_provider = StaticCredentialsProvider::new();
    for entry in &cli.accounts {
        let (email, password) = entry
            .split_once('=')
            .with_context(|| format!("account `{}` is not email=password", entry))?;
        static_provider = static_provider.with_account(email.trim(), password);
    }

    let providers: Vec<authkit::SharedProvider> = vec![
        Arc::new(AnonymousProvider::new()),
        Arc::new(static_provider),
    ];
    let mut config = AuthConfig::from_settings(settings, providers);

    if let Some(dir) = &cli.store {
        let dir = shellexpand::tilde(dir).into_owned();
        let store = FileStore::new(dir);
        config = config.with_storage(Arc::new(KvSessionStorage::with_prefix(
            store,
            &settings.storage.key_prefix,
        )));
    }
    Ok(config)
}

fn print_session(state: &SessionState) {
    println!("status: {}", state.status());
    if let SessionState::Authenticated {
        user,
        token,
        provider_id,
    } = state
    {
        println!("user: {}", user.id());
        if let Some(email) = user.email() {
            println!("email: {}", email);
        }
        println!("anonymous: {}", user.is_anonymous());
        println!("provider: {}", provider_id.as_deref().unwrap_or("-"));
        match token.expires_at {
            Some(at) => println!("expires: {}", at.to_rfc3339()),
            None => println!("expires: never"),
        }
    }
}
