use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use ticketdesk::{
    api,
    config::Config,
    models::{CreateTicketInput, ListTicketsQuery, TicketStatus},
    service::TicketService,
};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND: &str = "127.0.0.1";

#[derive(Parser)]
#[command(name = "ticketdesk")]
#[command(about = "Support tickets with a status workflow and agent notes")]
struct Cli {
    /// Database file (overrides TICKETDESK_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Address to bind
        #[arg(short, long, default_value = DEFAULT_BIND)]
        bind: String,
    },
    /// Submit a new ticket
    Create {
        #[arg(long)]
        customer_id: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        message: String,
    },
    /// Move a ticket to another status (new, triaged, closed)
    Status { id: Uuid, new_status: String },
    /// Append an agent note to a ticket
    Note { id: Uuid, note: String },
    /// Print a ticket
    Show { id: Uuid },
    /// List tickets, most recently updated first
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<TicketStatus>,
        #[arg(long)]
        has_note: Option<bool>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        skip: Option<u32>,
    },
    /// Print ticket counts per status
    Dashboard,
}

fn parse_status(s: &str) -> Result<TicketStatus, String> {
    TicketStatus::from_str(s).ok_or_else(|| format!("unknown status '{}'", s))
}

/// Initialize tracing with output to stderr (one-shot commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "ticketdesk=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // Keep stdout clean for JSON output
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(config: Config, bind: &str, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting ticketdesk server on port {}", port);

    let service = TicketService::new(config.open_database()?);
    let app = api::create_router_with_config(service, config.security());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind, port)).await?;
    tracing::info!("ticketdesk listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(!serving);

    let mut config = Config::from_env();
    if let Some(path) = cli.db {
        config.database_path = Some(path);
    }

    let command = cli.command.unwrap_or(Commands::Serve {
        port: DEFAULT_PORT,
        bind: DEFAULT_BIND.to_string(),
    });

    match command {
        Commands::Serve { port, bind } => serve(config, &bind, port).await,
        command => {
            let service = TicketService::new(config.open_database()?);
            run(&service, command)
        }
    }
}

/// Runs a one-shot command and prints its result as JSON.
fn run(service: &TicketService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve { .. } => anyhow::bail!("serve is not a one-shot command"),
        Commands::Create {
            customer_id,
            subject,
            message,
        } => print_json(&service.create_ticket(CreateTicketInput {
            customer_id,
            subject,
            message,
        })?),
        Commands::Status { id, new_status } => print_json(&service.update_status(id, &new_status)?),
        Commands::Note { id, note } => print_json(&service.add_note(id, &note)?),
        Commands::Show { id } => print_json(&service.get_ticket(id)?),
        Commands::List {
            status,
            has_note,
            limit,
            skip,
        } => print_json(&service.list_tickets(&ListTicketsQuery {
            status,
            has_note,
            limit,
            skip,
        })?),
        Commands::Dashboard => print_json(&service.dashboard()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_flags_default_to_the_shared_address() {
        let cli = Cli::try_parse_from(["ticketdesk", "serve"]).unwrap();

        match cli.command {
            Some(Commands::Serve { port, bind }) => {
                assert_eq!(port, DEFAULT_PORT);
                assert_eq!(bind, DEFAULT_BIND);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn serve_flags_can_be_overridden() {
        let cli =
            Cli::try_parse_from(["ticketdesk", "serve", "--port", "8080", "--bind", "0.0.0.0"])
                .unwrap();

        match cli.command {
            Some(Commands::Serve { port, bind }) => {
                assert_eq!(port, 8080);
                assert_eq!(bind, "0.0.0.0");
            }
            _ => panic!("expected serve"),
        }
    }
}
