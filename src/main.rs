use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use opslevel_webhook_verifier::logging::{init_logging, LoggingConfig};
use opslevel_webhook_verifier::signature::{
    build_content, compute_signature, HeaderSet, Secret, HEADER_ACTION_ID, HEADER_TIMING,
};
use opslevel_webhook_verifier::webhooks::{curl_example, run_server, AppState, WebhookConfig};

#[derive(Parser, Debug)]
#[command(name = "opslevel-webhook-verifier")]
#[command(version)]
#[command(about = "Verify the signatures of OpsLevel webhook deliveries")]
struct Cli {
    /// Suppress all output except errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v shows signed content, -vv traces everything)
    #[arg(long, short, action = ArgAction::Count, conflicts_with = "quiet", global = true)]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server and verify incoming deliveries
    Serve {
        /// Port to listen on
        #[arg(long, short)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long, value_name = "ADDRESS")]
        bind: Option<String>,

        /// Webhook signing secret
        #[arg(long, env = "OPSLEVEL_SIGNING_SECRET", hide_env_values = true)]
        secret: Option<String>,

        /// Extra header included in the signed content (repeatable)
        #[arg(long = "header", value_name = "NAME")]
        headers: Vec<String>,

        /// Accept deliveries with a mismatched signature and only log them
        #[arg(long)]
        report_only: bool,
    },
    /// Compute the signature OpsLevel would send for a delivery
    Sign {
        /// Webhook signing secret
        #[arg(long, env = "OPSLEVEL_SIGNING_SECRET", hide_env_values = true)]
        secret: String,

        /// Value of the X-OpsLevel-Timing header
        #[arg(long)]
        timing: String,

        /// Value of the X-OpsLevel-Action-Id header
        #[arg(long)]
        action_id: Option<String>,

        /// Extra signed header as NAME:VALUE (repeatable)
        #[arg(long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the request body from a file
        #[arg(long, value_name = "PATH")]
        body_file: Option<PathBuf>,

        /// Also print the signed content to stderr
        #[arg(long)]
        show_content: bool,
    },
}

/// Parse a `NAME:VALUE` header argument
///
/// The timing and action id headers have their own flags and are rejected.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{}'", raw));
    }
    let reserved_headers = [(HEADER_TIMING, "--timing"), (HEADER_ACTION_ID, "--action-id")];
    for (reserved, flag) in reserved_headers {
        if name.eq_ignore_ascii_case(reserved) {
            return Err(format!("header '{}' is set with {}", reserved, flag));
        }
    }
    Ok((name.to_string(), value.trim_start().to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LoggingConfig::from_flags(cli.verbose, cli.quiet)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Serve {
            port,
            bind,
            secret,
            headers,
            report_only,
        } => run_serve(cli.config, port, bind, secret, headers, report_only, cli.quiet).await,
        Commands::Sign {
            secret,
            timing,
            action_id,
            headers,
            body,
            body_file,
            show_content,
        } => run_sign(secret, timing, action_id, headers, body, body_file, show_content),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load configuration, apply command-line overrides and run the server
async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
    secret: Option<String>,
    headers: Vec<String>,
    report_only: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = WebhookConfig::load(config_path.as_deref())?;

    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(bind) = bind {
        config = config.with_bind_address(bind);
    }
    if let Some(secret) = secret {
        config = config.with_secret(secret);
    }
    if !headers.is_empty() {
        config = config.with_additional_headers(headers);
    }
    if report_only {
        config = config.with_report_only(true);
    }

    let state = AppState::new(config)?;
    tracing::debug!(config = ?state.config, "Loaded configuration");

    if !quiet {
        eprintln!("Server listening on http://{}/webhook", state.config.socket_addr());
        eprintln!("Execute this for testing:\n\n{}\n", curl_example(&state)?);
    }

    run_server(state).await?;
    Ok(())
}

/// Print the signature of a delivery built from the command-line arguments
fn run_sign(
    secret: String,
    timing: String,
    action_id: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<String>,
    body_file: Option<PathBuf>,
    show_content: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let body = match (body, body_file) {
        (_, Some(path)) => std::fs::read(&path)
            .map_err(|e| format!("failed to read body file {}: {}", path.display(), e))?,
        (Some(body), None) => body.into_bytes(),
        (None, None) => Vec::new(),
    };

    let mut header_set = HeaderSet::new().with(HEADER_TIMING, timing);
    if let Some(action_id) = action_id {
        header_set.insert(HEADER_ACTION_ID, action_id);
    }
    let mut names = Vec::with_capacity(headers.len());
    for (name, value) in headers {
        header_set.insert(&name, value);
        names.push(name);
    }

    let content = build_content(&header_set, &names, &body)?;
    if show_content {
        eprintln!("{}", content);
    }

    println!("{}", compute_signature(content.as_bytes(), &Secret::from(secret)));
    Ok(())
}
