use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use carbot::chat;
use carbot::constants;
use carbot::query_client::{QueryBackend, QueryClient};
use carbot::render::message_to_terminal;
use carbot::web_server::{self, Sessions};
use carbot::{Conversation, SubmitOutcome};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the car bot service (defaults to CARBOT_API_URL or LOCAL_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the chat web UI.
    Serve {
        #[arg(long, default_value_t = constants::DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
    },
    /// Chat with the car bot in the terminal.
    Chat,
    /// Ask a single question and print the answer.
    Ask {
        #[arg(required = true, help = "The question, e.g. \"toyota vios\".")]
        question: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (CARBOT_API_URL etc.)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,carbot=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let api_url = cli.api_url.as_deref().unwrap_or(constants::API_URL.as_str());
    let client = QueryClient::new(api_url).context("Invalid car bot URL")?;
    info!("Using car bot at {}", client.ask_url());
    let backend: Arc<dyn QueryBackend> = Arc::new(client);

    match cli.command {
        Commands::Serve { port } => {
            info!("Starting web UI on port {}...", port);

            let sessions = Arc::new(Sessions::new(backend, *constants::MAX_SESSIONS));
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(
                    port,
                    sessions,
                    &constants::TEMPLATES_DIR,
                    &constants::STATIC_DIR,
                )
                .await
                {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat => {
            info!("Starting interactive chat session...");
            let conversation = Conversation::new(backend);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            chat::run_chat(&conversation, stdin, &mut std::io::stdout())
                .await
                .context("Chat session failed")?;
        }
        Commands::Ask { question } => {
            let question = question.join(" ");
            let conversation = Conversation::new(backend);
            match conversation.submit(&question).await {
                SubmitOutcome::Answered(reply) => println!("{}", message_to_terminal(&reply)),
                SubmitOutcome::Rejected(reason) => {
                    anyhow::bail!("Question not sent ({:?}): it must not be blank", reason)
                }
            }
        }
    }

    Ok(())
}
