//! xp-post - Publish content to a social platform

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser};
use libcrosspost::logging::{LogFormat, LoggingConfig};
use libcrosspost::{
    Attachment, Config, Connector, Content, CrosspostError, MediaKind, PublishReceipt, Result,
    SocialPlatform, SqliteTokenStore,
};

#[derive(Parser, Debug)]
#[command(name = "xp-post")]
#[command(version)]
#[command(about = "Publish content to a social platform")]
#[command(group(ArgGroup::new("media").multiple(false)))]
#[command(long_about = "\
xp-post - Publish content to a social platform

Posts text, optionally with one image, video or document, on behalf of a user
previously authorized with xp-auth.

USAGE EXAMPLES:
    # Text post
    xp-post linkedin --user alice \"Hello LinkedIn\"

    # Text from stdin
    echo \"Hello X\" | xp-post x --user alice

    # With media
    xp-post instagram --user alice \"Sunset\" --image sunset.jpg
    xp-post youtube --user alice \"Launch recap\" --video recap.mp4
    xp-post linkedin --user alice \"Q3 deck\" --document deck.pdf

    # Share a link (Facebook)
    xp-post facebook --user alice \"Read this\" --link https://example.com/post

OUTPUT:
    text - platform:post_id (default)
    json - the full receipt including the vendor response

EXIT CODES:
    0 - Success
    1 - Posting failed
    2 - Missing or rejected credentials
    3 - Invalid input or content rejected by validation
")]
struct Cli {
    /// Target platform (facebook, instagram, linkedin, x, youtube)
    platform: SocialPlatform,

    /// Text to post (reads from stdin if not provided)
    text: Option<String>,

    /// User whose stored token is used
    #[arg(short, long)]
    user: String,

    /// Attach an image
    #[arg(long, value_name = "PATH", group = "media")]
    image: Option<PathBuf>,

    /// Attach a video
    #[arg(long, value_name = "PATH", group = "media")]
    video: Option<PathBuf>,

    /// Attach a document
    #[arg(long, value_name = "PATH", group = "media")]
    document: Option<PathBuf>,

    /// Share a URL alongside the text
    #[arg(long, value_name = "URL", conflicts_with = "media")]
    link: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Send every vendor request to this base URL
    #[arg(long, env = "CROSSPOST_API_BASE", hide = true)]
    api_base: Option<String>,
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
    let attachment = attachment(&cli);
    let text = read_text(cli.text.clone())?;
    if text.trim().is_empty() && attachment.is_none() {
        return Err(CrosspostError::InvalidInput(
            "Content cannot be empty".to_string(),
        ));
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let store = SqliteTokenStore::new(&config.store.path).await?;
    let mut connector = Connector::new(config, Arc::new(store))?;
    if let Some(base) = &cli.api_base {
        connector = connector.with_base_url(base.clone());
    }

    let publisher = connector.publisher(cli.platform)?;
    tracing::debug!(
        platform = %cli.platform,
        user = %cli.user,
        attachment = ?attachment,
        "Publishing"
    );

    let receipt = match &cli.link {
        Some(link) => publisher.post_link(&cli.user, &text, link).await?,
        None => {
            let content = match attachment {
                Some(attachment) => Content::with_attachment(text, attachment),
                None => Content::text(text),
            };
            publisher.publish(&cli.user, &content).await?
        }
    };

    print_receipt(&receipt, &cli.format)
}

fn attachment(cli: &Cli) -> Option<Attachment> {
    [
        (&cli.image, MediaKind::Image),
        (&cli.video, MediaKind::Video),
        (&cli.document, MediaKind::Document),
    ]
    .into_iter()
    .find_map(|(path, kind)| path.as_ref().map(|p| Attachment::new(p, kind)))
}

/// Use the argument, or stdin when it is piped
fn read_text(arg: Option<String>) -> Result<String> {
    if let Some(text) = arg {
        return Ok(text);
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }

    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .map_err(|e| CrosspostError::InvalidInput(format!("Failed to read from stdin: {}", e)))?;
    Ok(buffer.trim_end_matches(['\n', '\r']).to_string())
}

fn print_receipt(receipt: &PublishReceipt, format: &str) -> Result<()> {
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(receipt).map_err(|e| {
                CrosspostError::InvalidInput(format!("Failed to render receipt: {}", e))
            })?;
            println!("{}", json);
        }
        _ => println!(
            "{}:{}",
            receipt.platform,
            receipt.post_id.as_deref().unwrap_or("")
        ),
    }
    Ok(())
}
