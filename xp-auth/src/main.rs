//! xp-auth - Authorize Crosspost against social platforms
//!
//! Walks a user through the OAuth flow of a platform and manages the stored
//! tokens.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use libcrosspost::logging::{LogFormat, LoggingConfig};
use libcrosspost::{
    AuthorizationCallback, Config, Connector, CrosspostError, OAuthHelper, Result,
    SocialPlatform, SqliteTokenStore, TokenRecord,
};

#[derive(Parser, Debug)]
#[command(name = "xp-auth")]
#[command(version)]
#[command(about = "Authorize Crosspost against social platforms")]
#[command(long_about = "\
xp-auth - Authorize Crosspost against social platforms

COMMANDS:
    url       Print the authorization URL for a platform
    exchange  Trade an authorization code for tokens and store them
    login     Print the URL, then read the code or redirect URL from stdin
    refresh   Refresh a stored token
    show      Show a stored token with secrets redacted

PLATFORMS:
    facebook, instagram, linkedin, x, youtube

USAGE EXAMPLES:
    # Interactive authorization
    xp-auth login linkedin --user alice

    # Two-step authorization (e.g. from a web callback)
    xp-auth url youtube
    xp-auth exchange youtube --user alice --code 4/0AX4XfWh...

    # X hands back oauth_token and oauth_verifier
    xp-auth exchange x --user alice --code VERIFIER --state OAUTH_TOKEN

CONFIGURATION:
    Configuration file: ~/.config/crosspost/config.toml
    Override with CROSSPOST_CONFIG or --config.

EXIT CODES:
    0 - Success
    1 - Platform, store or configuration error
    2 - Missing or rejected credentials
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Send every vendor request to this base URL
    #[arg(long, global = true, env = "CROSSPOST_API_BASE", hide = true)]
    api_base: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the authorization URL
    Url {
        platform: SocialPlatform,

        /// Override the configured redirect URI
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Exchange an authorization code for tokens
    Exchange {
        platform: SocialPlatform,

        #[arg(short, long)]
        user: String,

        /// Authorization code (X: oauth_verifier), or the full redirect URL
        #[arg(long)]
        code: String,

        /// X: the oauth_token from the callback
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Authorize interactively
    Login {
        platform: SocialPlatform,

        #[arg(short, long)]
        user: String,

        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Refresh a stored token
    Refresh {
        platform: SocialPlatform,

        #[arg(short, long)]
        user: String,
    },

    /// Show a stored token (secrets redacted)
    Show {
        platform: SocialPlatform,

        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = LoggingConfig::from_env(cli.verbose);
    match cli.log_format {
        Some(format) => logging.with_format(format).init(),
        None => logging.init(),
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    tracing::debug!(command = ?cli.command, "xp-auth starting");

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let store = SqliteTokenStore::new(&config.store.path).await?;
    let mut connector = Connector::new(config, Arc::new(store))?;
    if let Some(base) = cli.api_base {
        connector = connector.with_base_url(base);
    }

    match cli.command {
        Commands::Url {
            platform,
            redirect_uri,
        } => {
            let helper = connector.oauth_helper(platform)?;
            cmd_url(helper.as_ref(), redirect_uri.as_deref()).await
        }
        Commands::Exchange {
            platform,
            user,
            code,
            state,
            redirect_uri,
        } => {
            let mut callback = AuthorizationCallback::parse(&code)?;
            if let Some(state) = state {
                callback = callback.with_state(state);
            }
            let helper = connector.oauth_helper(platform)?;
            let record = helper
                .complete_authorization(&user, &callback, redirect_uri.as_deref())
                .await?;
            print_authorized(&user, &record);
            Ok(())
        }
        Commands::Login {
            platform,
            user,
            redirect_uri,
        } => {
            let helper = connector.oauth_helper(platform)?;
            cmd_login(helper.as_ref(), &user, redirect_uri.as_deref()).await
        }
        Commands::Refresh { platform, user } => {
            let helper = connector.oauth_helper(platform)?;
            helper.refresh_token(&user).await?;
            println!("Refreshed {} token for '{}'", platform.display_name(), user);
            Ok(())
        }
        Commands::Show { platform, user } => {
            let helper = connector.oauth_helper(platform)?;
            let record = helper.require_token(&user).await?;
            let view = serde_json::to_string_pretty(&record.redacted_json()).map_err(|e| {
                CrosspostError::InvalidInput(format!("Failed to render token: {}", e))
            })?;
            println!("{}", view);
            Ok(())
        }
    }
}

async fn cmd_url(helper: &dyn OAuthHelper, redirect_uri: Option<&str>) -> Result<()> {
    let request = helper.authorization_url(redirect_uri).await?;
    println!("{}", request.url);
    if let Some(state) = request.state {
        eprintln!("State: {}", state);
    }
    Ok(())
}

async fn cmd_login(helper: &dyn OAuthHelper, user: &str, redirect_uri: Option<&str>) -> Result<()> {
    let request = helper.authorization_url(redirect_uri).await?;

    eprintln!(
        "Open this URL to authorize Crosspost on {}:",
        helper.platform().display_name()
    );
    println!("{}", request.url);
    eprint!("Paste the redirect URL or code: ");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CrosspostError::InvalidInput(format!("Failed to read from stdin: {}", e)))?;

    let mut callback = AuthorizationCallback::parse(&line)?;
    if callback.state.is_none() {
        callback.state = request.state;
    }

    let record = helper
        .complete_authorization(user, &callback, redirect_uri)
        .await?;
    print_authorized(user, &record);
    Ok(())
}

fn print_authorized(user: &str, record: &TokenRecord) {
    println!(
        "Authorized {} for '{}'",
        record.platform.display_name(),
        user
    );
    if let Some(subject) = &record.subject {
        println!("  Account: {}", subject);
    }
    for page in &record.pages {
        println!("  Page: {} ({})", page.name, page.id);
    }
    if let Some(expires_in) = record.expires_in {
        println!("  Expires in: {}s", expires_in);
    }
}
