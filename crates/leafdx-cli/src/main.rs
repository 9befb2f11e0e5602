mod display;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use leafdx_ai::{
    DEFAULT_LABELS_PATH, DEFAULT_MODEL_PATH, ModelConfig, TensorLayout, check_advisories,
};
use leafdx_server::{DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Plant leaf disease diagnosis
#[derive(Parser, Debug)]
#[command(name = "leafdx", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve {
        #[command(flatten)]
        model: ModelArgs,

        /// Address to bind
        #[arg(long, env = "LEAFDX_HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, env = "LEAFDX_PORT", default_value_t = 5000)]
        port: u16,

        /// Start without a classifier if the model or label file is absent
        #[arg(long, env = "LEAFDX_ALLOW_MISSING_MODEL")]
        allow_missing_model: bool,

        /// Largest accepted request body in bytes
        #[arg(long, env = "LEAFDX_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,
    },

    /// Diagnose one image and print the result
    Diagnose {
        #[command(flatten)]
        model: ModelArgs,

        /// Image file (JPEG, PNG, ...)
        image: PathBuf,

        /// Print a readable card instead of JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Load model, labels and advisories, and report advisory coverage
    Check {
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// ONNX classifier
    #[arg(long, env = "LEAFDX_MODEL", default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// Category labels in model output order (JSON array or one per line)
    #[arg(long, env = "LEAFDX_LABELS", default_value = DEFAULT_LABELS_PATH)]
    labels: PathBuf,

    /// Advisory JSON replacing the built-in knowledge base
    #[arg(long, env = "LEAFDX_ADVISORIES")]
    advisories: Option<PathBuf>,

    /// Model input layout: nhwc or nchw
    #[arg(long, env = "LEAFDX_LAYOUT", default_value_t = TensorLayout::Nhwc)]
    layout: TensorLayout,

    /// Fail if any label has no curated advisory
    #[arg(long, env = "LEAFDX_STRICT_ADVISORIES")]
    strict_advisories: bool,
}

impl From<ModelArgs> for ModelConfig {
    fn from(args: ModelArgs) -> Self {
        Self {
            model_path: args.model,
            labels_path: args.labels,
            advisories_path: args.advisories,
            layout: args.layout,
            strict_advisories: args.strict_advisories,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            model,
            host,
            port,
            allow_missing_model,
            max_upload_bytes,
        } => {
            let config = ModelConfig::from(model);
            info!("leafdx v{}", env!("CARGO_PKG_VERSION"));
            info!(
                model = %config.model_path.display(),
                labels = %config.labels_path.display(),
                layout = %config.layout,
                "loading classifier"
            );
            let service = config
                .load_service(allow_missing_model)
                .context("loading classifier")?;

            let server = ServerConfig {
                addr: SocketAddr::new(host, port),
                max_upload_bytes,
            };
            leafdx_server::serve(service, &server)
                .await
                .with_context(|| format!("serving on {}", server.addr))?;
        }

        Command::Diagnose {
            model,
            image,
            pretty,
        } => {
            let config = ModelConfig::from(model);
            let service = config.load_service(false).context("loading classifier")?;
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let result = service
                .predict(&bytes)
                .with_context(|| format!("diagnosing {}", image.display()))?;

            if pretty {
                display::print_diagnosis_card(&result);
            } else {
                let json = serde_json::to_string_pretty(&result.to_diagnosis())?;
                println!("{json}");
            }
        }

        Command::Check { model } => {
            let config = ModelConfig::from(model);
            let knowledge = config.load_knowledge().context("loading advisories")?;
            let context = config.load_context().context("loading classifier")?;
            let coverage = check_advisories(&knowledge, context.labels(), config.strict_advisories)
                .context("checking advisory coverage")?;

            display::print_check_report(&config, context.labels(), knowledge.len(), &coverage);
        }
    }

    Ok(())
}
