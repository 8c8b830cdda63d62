use clap::Parser;
use forgemail::agent::{Agent, AgentStep};
use forgemail::config::AppConfig;
use forgemail::llm::{LLMFactory, build_model};
use forgemail::mail::{GmailMailService, MailService, RetryingMailService};
use forgemail::shutdown::CtrlCShutdown;
use forgemail::tools::ToolRegistry;
use forgemail::utils::context_hub::ContextHub;
use forgemail::utils::google_auth::GConf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Read and send Gmail by asking in plain words.
#[derive(Parser, Debug)]
#[command(name = "forgemail", version)]
struct Cli {
    /// What to do, e.g. "summarize my emails from yesterday".
    #[arg(required = true, num_args = 1..)]
    instruction: Vec<String>,

    /// Maximum number of model round-trips.
    #[arg(long)]
    max_steps: Option<usize>,

    /// Log at debug level. `RUST_LOG` takes precedence when set.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(cli.verbose, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install the logger: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "forgemail failed");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` directives if they parse, else `debug` or `info` by `verbose`.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    match rust_log.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|e| {
            eprintln!("Ignoring invalid {}: {e}", EnvFilter::DEFAULT_ENV);
            EnvFilter::new(fallback)
        }),
        None => EnvFilter::new(fallback),
    }
}

/// Waits for the step printer to drain. Returns false if it panicked or was
/// cancelled.
async fn finish_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Step printer task failed");
            false
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env()?;
    if let Some(max_steps) = cli.max_steps {
        config.max_steps = max_steps;
    }
    info!(?config, "Configuration loaded");

    let ctx = ContextHub::new(GConf::new(
        config.auth.credentials_path.clone(),
        config.auth.token_path.clone(),
    ))
    .with_static_token(config.auth.access_token.clone());
    let gmail = GmailMailService::connect(&ctx).await?;
    let mail: Arc<dyn MailService> = Arc::new(RetryingMailService::new(gmail, config.retry.clone()));

    let planner = LLMFactory::create(build_model(&config.model, ""), Some(config.retry.clone()));
    let summary_model =
        LLMFactory::create(build_model(&config.model, ""), Some(config.retry.clone()));
    let registry = ToolRegistry::for_mailbox(mail, summary_model);

    let (tx, mut rx) = mpsc::channel::<AgentStep>(32);
    let printer = tokio::spawn(async move {
        while let Some(step) = rx.recv().await {
            println!("{step}");
        }
    });

    let mut agent = Agent::builder(planner, registry)
        .with_max_steps(config.max_steps)
        .with_shutdown_handler(CtrlCShutdown::new())
        .with_step_sink(tx)
        .build()
        .await?;

    let result = agent.run(&cli.instruction.join(" ")).await;
    drop(agent);
    finish_printer(printer).await;

    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_flag_picks_the_default_level() {
        assert_eq!(log_filter(false, None).to_string(), "info");
        assert_eq!(log_filter(true, None).to_string(), "debug");
        assert_eq!(log_filter(true, Some("  ")).to_string(), "debug");
    }

    #[test]
    fn rust_log_overrides_the_flag() {
        let filter = log_filter(false, Some("forgemail=trace")).to_string();
        assert!(filter.contains("forgemail=trace"), "{filter}");
    }

    #[tokio::test]
    async fn printer_panic_is_reported_not_swallowed() {
        let printer: JoinHandle<()> = tokio::spawn(async {
            panic!("stdout closed");
        });
        assert!(!finish_printer(printer).await);

        let printer = tokio::spawn(async {});
        assert!(finish_printer(printer).await);
    }
}
