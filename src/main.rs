use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use thumbgen_lib::generate::{self, GenerateRequest};
use thumbgen_lib::local_server::{self, AppState};
use thumbgen_lib::{gallery, Config, FormFields, Placement};

#[derive(Parser, Debug)]
#[command(name = "thumbgen", version)]
struct Cli {
    /// Thumbnail service endpoint (overrides THUMBGEN_ENDPOINT).
    #[arg(long, global = true)]
    endpoint: Option<Url>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the thumbnail form to a browser.
    Serve(ServeArgs),
    /// Submit one photo and save the results.
    Generate(GenerateArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Address to listen on (overrides THUMBGEN_BIND).
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Photo to upload.
    #[arg(long)]
    photo: PathBuf,

    #[arg(long, default_value = "")]
    video_type: String,

    #[arg(long, default_value = "")]
    style: String,

    #[arg(long, default_value = "")]
    mood: String,

    /// left, center or right.
    #[arg(long, default_value_t = Placement::Center)]
    placement: Placement,

    /// Save each thumbnail into this directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Bundle all thumbnails into this zip file.
    #[arg(long)]
    zip: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load().context("load configuration")?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    match cli.cmd {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Generate(args) => cmd_generate(config, args).await,
    }
}

async fn cmd_serve(mut config: Config, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    config.validate()?;

    let state = AppState::new(config).context("create HTTP client")?;
    local_server::start_server(state).await?;
    Ok(())
}

async fn cmd_generate(config: Config, args: GenerateArgs) -> anyhow::Result<()> {
    let request = GenerateRequest {
        photo: args.photo,
        fields: FormFields {
            video_type: args.video_type,
            style: args.style,
            mood: args.mood,
            placement: args.placement,
        },
        out_dir: args.out_dir,
        zip: args.zip,
    };

    let report = match generate::run(&config, &request).await {
        Ok(report) => report,
        Err(e) => anyhow::bail!("{} ({e})", e.user_message()),
    };
    print!("{}", gallery::render_text(&report.thumbnails));

    if !report.missing.is_empty() {
        warn!("Not saved: {}", report.missing.join(", "));
    }
    if let (Some(zip_path), Some(outcomes)) = (&request.zip, &report.archive) {
        let written = outcomes.iter().filter(|o| o.result.is_ok()).count();
        info!("{} holds {written} of {} thumbnails", zip_path.display(), outcomes.len());
    }
    Ok(())
}
