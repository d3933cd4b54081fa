//! Smart Ledger CLI - recognize payment screenshots from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ledger_batch::{
    content_type_for_path, CategoryCache, CategoryService, Config, ImageSource, MemoryCatalog,
    MemoryLedger, RateLimiter, RecognitionService,
};
use ledger_core::UserId;
use ledger_vision::{build_prompt, default_prompt, OpenAiRecognizer, VisionConfig};

/// Smart Ledger CLI - batch receipt recognition
#[derive(Parser)]
#[command(name = "smart-ledger")]
#[command(about = "Recognize payment screenshots into ledger bills", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize images and print the batch result as JSON
    Recognize {
        /// Image files, in the order results are reported
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Save a bill for every recognized image
        #[arg(long)]
        save: bool,

        /// User whose categories guide the recognition
        #[arg(long, env = "LEDGER_USER_ID", default_value_t = 1)]
        user_id: u64,

        #[command(flatten)]
        vision: VisionArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Print the recognition prompt for the built-in categories
    Prompt {
        /// Print the generic prompt used when categories are unavailable
        #[arg(long)]
        default: bool,
    },

    /// Print the rate limit derived from a requests-per-minute budget
    Limits {
        #[arg(long, env = "LEDGER_RPM", default_value_t = 60)]
        rpm: u32,
    },
}

#[derive(Args)]
struct VisionArgs {
    /// API key for the recognition service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "")]
    base_url: String,

    /// Vision model name
    #[arg(long, env = "OPENAI_MODEL", default_value = "")]
    model: String,
}

#[derive(Args)]
struct BatchArgs {
    /// Concurrent recognition workers
    #[arg(long, env = "LEDGER_WORKER_COUNT", default_value_t = 1)]
    workers: usize,

    /// Recognition requests per minute
    #[arg(long, env = "LEDGER_RPM", default_value_t = 60)]
    rpm: u32,

    /// Per-image timeout in seconds
    #[arg(long, env = "LEDGER_TASK_TIMEOUT_SECS", default_value_t = 60)]
    task_timeout_secs: u64,

    /// Maximum images per batch
    #[arg(long, env = "LEDGER_MAX_IMAGES", default_value_t = 20)]
    max_images: usize,

    /// Maximum image size in bytes
    #[arg(long, env = "LEDGER_MAX_IMAGE_BYTES", default_value_t = ledger_batch::config::DEFAULT_MAX_IMAGE_BYTES)]
    max_image_bytes: u64,
}

impl From<BatchArgs> for Config {
    fn from(args: BatchArgs) -> Self {
        Config {
            max_images: args.max_images,
            worker_count: args.workers,
            rpm: args.rpm,
            task_timeout_secs: args.task_timeout_secs,
            max_image_bytes: args.max_image_bytes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ledger_batch=info".parse()?)
                .add_directive("ledger_vision=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Recognize {
            files,
            save,
            user_id,
            vision,
            batch,
        } => {
            recognize(files, save, UserId::new(user_id), vision, batch.into()).await?;
        }
        Commands::Prompt { default } => {
            print_prompt(default).await?;
        }
        Commands::Limits { rpm } => {
            print_limits(rpm)?;
        }
    }

    Ok(())
}

async fn recognize(
    files: Vec<PathBuf>,
    save: bool,
    user_id: UserId,
    vision: VisionArgs,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let vision_config = VisionConfig::default()
        .with_api_key(vision.api_key)
        .with_base_url(vision.base_url)
        .with_model(vision.model);
    if vision_config.api_key.is_empty() {
        warn!("No API key configured; set OPENAI_API_KEY");
    }
    let recognizer = Arc::new(OpenAiRecognizer::new(&vision_config)?);

    let catalog = Arc::new(MemoryCatalog::new());
    let cache = Arc::new(CategoryCache::new(catalog.clone()));
    CategoryService::new(catalog.clone(), cache.clone())
        .init_from_templates(user_id)
        .await?;
    let ledger = Arc::new(MemoryLedger::new(catalog));
    let service = RecognitionService::new(config, recognizer, cache, ledger.clone())?;

    let mut images = Vec::with_capacity(files.len());
    for path in files {
        // An unreadable file still takes its place in the batch and fails there.
        let size = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot stat image");
                0
            }
        };
        let content_type = content_type_for_path(&path);
        images.push(ImageSource::from_file(path, content_type, size));
    }

    let ctx = CancellationToken::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling batch");
            interrupt.cancel();
        }
    });

    info!(
        model = %vision_config.model,
        images = images.len(),
        workers = service.config().worker_count,
        rpm = service.limiter().rpm(),
        burst = service.limiter().burst(),
        save,
        "Recognizing images"
    );

    let output = if save {
        let result = service.batch_recognize_and_save(&ctx, user_id, images).await?;
        let bills = ledger.bills_for_user(user_id).await;
        json!({ "result": result, "bills": bills })
    } else {
        serde_json::to_value(service.batch_recognize(&ctx, user_id, images).await?)?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn print_prompt(default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        println!("{}", default_prompt());
        return Ok(());
    }

    let catalog = Arc::new(MemoryCatalog::new());
    let cache = Arc::new(CategoryCache::new(catalog.clone()));
    let categories = CategoryService::new(catalog, cache);
    let user_id = UserId::new(1);
    categories.init_from_templates(user_id).await?;

    println!("{}", build_prompt(&categories.list(user_id).await?));
    Ok(())
}

fn print_limits(rpm: u32) -> Result<(), Box<dyn std::error::Error>> {
    let limiter = RateLimiter::new(rpm);
    let limits = json!({
        "rpm": limiter.rpm(),
        "tokens_per_second": limiter.rate(),
        "burst": limiter.burst(),
    });
    println!("{}", serde_json::to_string_pretty(&limits)?);
    Ok(())
}
