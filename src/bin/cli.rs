//! tn5250 CLI - Command-line interface
//!
//! Scripted sign-on and screen capture against a TN5250 host, plus offline
//! code-page and key-sequence tools.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tn5250_automate::cli::{init_logging, level_for, print_exit_codes};
use tn5250_automate::core::keyboard::KeyToken;
use tn5250_automate::utils::parse_hex;
use tn5250_automate::{
    AutomationConfig, CliResult, Dimensions, Error, ExitCodes, KeySequence, SessionController,
    TelnetConnector, WaitFor,
};

/// CLI output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format for scripting
    Json,
}

/// tn5250 CLI
#[derive(Parser, Debug)]
#[command(
    name = "tn5250-cli",
    version,
    about = "Headless TN5250 session automation",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Configuration file (defaults to the per-user config.toml)
    #[arg(short, long, global = true, env = "TN5250_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available code pages
    Codepages,

    /// Decode host bytes to text
    Decode {
        /// Code page id (e.g. 37, 273, 930)
        #[arg(short = 'p', long = "code-page")]
        code_page: Option<String>,

        /// Hex bytes, e.g. "C8 C5 D3 D3 D6"
        hex: String,
    },

    /// Encode text to host bytes
    Encode {
        /// Code page id
        #[arg(short = 'p', long = "code-page")]
        code_page: Option<String>,

        /// Text to encode
        text: String,
    },

    /// Show how a key sequence is parsed and encoded
    Keys {
        /// Code page id
        #[arg(short = 'p', long = "code-page")]
        code_page: Option<String>,

        /// Key sequence, e.g. "MYUSER[tab]MYPASS[enter]"
        sequence: String,
    },

    /// Connect, send key sequences and print the resulting screen
    Run {
        /// Host address
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port number
        #[arg(short = 'P', long)]
        port: Option<u16>,

        /// Screen size as ROWSxCOLS (24x80 or 27x132)
        #[arg(short, long)]
        screen: Option<String>,

        /// Code page id
        #[arg(short = 'p', long = "code-page")]
        code_page: Option<String>,

        /// Key sequence to send; repeat for several screens
        #[arg(short, long = "keys")]
        keys: Vec<String>,

        /// What to wait for after each sequence (none, unlock, cycle)
        #[arg(short, long, default_value = "cycle")]
        wait: WaitFor,

        /// Wait deadline in milliseconds (defaults per wait kind)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Print the exit code table
    ExitCodes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match execute(&cli).await {
        Ok(result) => result,
        Err(err) => classify(&err),
    };

    match &result {
        CliResult::Success(Some(output)) => println!("{output}"),
        CliResult::Success(None) => {}
        CliResult::Error(code, msg) => {
            if matches!(cli.format, OutputFormat::Json) {
                println!("{}", serde_json::json!({ "error": msg, "code": code }));
            } else {
                eprintln!("Error: {msg}");
            }
        }
    }

    result.to_exit_code()
}

/// Typed errors keep their own exit code; anything else is a general error
fn classify(err: &anyhow::Error) -> CliResult {
    match err.downcast_ref::<Error>() {
        Some(typed) => CliResult::error(CliResult::from(typed).code(), format!("{err:#}")),
        None => CliResult::error(ExitCodes::ERROR, format!("{err:#}")),
    }
}

async fn execute(cli: &Cli) -> anyhow::Result<CliResult> {
    let config = match &cli.config {
        Some(path) => AutomationConfig::load(path)?,
        None => AutomationConfig::load_default()?,
    };

    let _guard = init_logging(&config.logging, level_for(cli.verbose, cli.quiet))?;

    match &cli.command {
        Commands::Codepages => list_codepages(cli, &config),
        Commands::Decode { code_page, hex } => decode(cli, &config, code_page.as_deref(), hex),
        Commands::Encode { code_page, text } => encode(cli, &config, code_page.as_deref(), text),
        Commands::Keys { code_page, sequence } => keys(cli, &config, code_page.as_deref(), sequence),
        Commands::Run {
            host,
            port,
            screen,
            code_page,
            keys,
            wait,
            timeout,
        } => {
            let Some(host) = host.clone().or_else(|| config.session.host.clone()) else {
                return Ok(CliResult::invalid_args("No host given (use --host or [session] host)"));
            };
            let options = RunOptions {
                host,
                port: port.unwrap_or(config.session.port),
                screen: screen.clone().unwrap_or_else(|| config.session.screen.clone()),
                code_page: code_page.clone().unwrap_or_else(|| config.session.codepage.clone()),
                keys: keys.clone(),
                wait: *wait,
                timeout: timeout.map(Duration::from_millis),
            };
            run_session(cli, &config, options).await
        }
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(CliResult::success())
        }
    }
}

fn selected_codepage<'a>(config: &'a AutomationConfig, code_page: Option<&'a str>) -> &'a str {
    code_page.unwrap_or(&config.session.codepage)
}

fn list_codepages(cli: &Cli, config: &AutomationConfig) -> anyhow::Result<CliResult> {
    let registry = config.build_registry()?;
    let pages: Vec<_> = registry
        .available()
        .into_iter()
        .filter_map(|id| registry.descriptor(id))
        .collect();

    let output = match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = pages
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "id": d.id,
                        "name": d.name,
                        "description": d.description,
                        "double_byte": d.double_byte,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&json)?
        }
        OutputFormat::Text => pages
            .iter()
            .map(|d| {
                let marker = if d.double_byte { " [DBCS]" } else { "" };
                format!("{:>6}  {}{}", d.id, d.description, marker)
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };

    Ok(CliResult::success_with_message(output))
}

fn decode(cli: &Cli, config: &AutomationConfig, code_page: Option<&str>, hex: &str) -> anyhow::Result<CliResult> {
    let bytes = match parse_hex(hex) {
        Ok(bytes) => bytes,
        Err(e) => return Ok(CliResult::invalid_args(format!("Invalid hex '{hex}': {e}"))),
    };
    let id = selected_codepage(config, code_page);
    let mut converter = config.build_registry()?.converter(id)?;
    let text = converter.decode(&bytes);

    let output = match cli.format {
        OutputFormat::Json => serde_json::json!({
            "codepage": converter.id(),
            "bytes": hex::encode_upper(&bytes),
            "text": text,
        })
        .to_string(),
        OutputFormat::Text => text,
    };
    Ok(CliResult::success_with_message(output))
}

fn encode(cli: &Cli, config: &AutomationConfig, code_page: Option<&str>, text: &str) -> anyhow::Result<CliResult> {
    let id = selected_codepage(config, code_page);
    let converter = config.build_registry()?.converter(id)?;
    let bytes = converter.encode(text).map_err(Error::from)?;

    let output = match cli.format {
        OutputFormat::Json => serde_json::json!({
            "codepage": converter.id(),
            "text": text,
            "bytes": hex::encode_upper(&bytes),
        })
        .to_string(),
        OutputFormat::Text => spaced_hex(&bytes),
    };
    Ok(CliResult::success_with_message(output))
}

fn keys(cli: &Cli, config: &AutomationConfig, code_page: Option<&str>, sequence: &str) -> anyhow::Result<CliResult> {
    let id = selected_codepage(config, code_page);
    let converter = config.build_registry()?.converter(id)?;
    let parsed = KeySequence::parse(sequence)?;
    let bytes = parsed.encode(&converter)?;

    let output = match cli.format {
        OutputFormat::Json => {
            let tokens: Vec<serde_json::Value> = parsed
                .tokens()
                .iter()
                .map(|token| match token {
                    KeyToken::Char(c) => serde_json::json!({ "char": c.to_string() }),
                    KeyToken::Key(k) => serde_json::json!({
                        "key": k.to_string(),
                        "code": format!("{:02X}", k.key_code()),
                        "submit": k.is_submit(),
                    }),
                })
                .collect();
            serde_json::json!({
                "sequence": parsed.to_string(),
                "submit": parsed.has_submit(),
                "tokens": tokens,
                "bytes": hex::encode_upper(&bytes),
            })
            .to_string()
        }
        OutputFormat::Text => {
            let mut lines: Vec<String> = parsed
                .tokens()
                .iter()
                .map(|token| match token {
                    KeyToken::Char(c) => format!("  char  {c:?}"),
                    KeyToken::Key(k) => {
                        let submit = if k.is_submit() { "  (submit)" } else { "" };
                        format!("  key   [{k}] {:02X}{submit}", k.key_code())
                    }
                })
                .collect();
            lines.push(format!("bytes: {}", spaced_hex(&bytes)));
            lines.join("\n")
        }
    };
    Ok(CliResult::success_with_message(output))
}

struct RunOptions {
    host: String,
    port: u16,
    screen: String,
    code_page: String,
    keys: Vec<String>,
    wait: WaitFor,
    timeout: Option<Duration>,
}

async fn run_session(cli: &Cli, config: &AutomationConfig, options: RunOptions) -> anyhow::Result<CliResult> {
    let dims: Dimensions = options.screen.parse()?;
    let registry = Arc::new(config.build_registry()?);
    let connector = Arc::new(TelnetConnector::new(config.telnet_config()));
    let session = SessionController::new(connector, registry)
        .with_timeouts(config.timeouts.to_session_timeouts())
        .with_request_handler(config.request_handler()?);

    session
        .connect(&options.host, options.port, dims, &options.code_page)
        .await
        .with_context(|| format!("Connecting to {}:{}", options.host, options.port))?;

    let outcome = drive(&session, &options).await;
    let snapshot = session.snapshot();
    session.disconnect().await;
    outcome?;
    let snapshot = snapshot?;

    let output = match cli.format {
        OutputFormat::Json => {
            let rows: Vec<String> = (0..snapshot.dimensions.rows)
                .filter_map(|r| snapshot.row_text(r))
                .collect();
            serde_json::to_string_pretty(&serde_json::json!({
                "host": options.host,
                "port": options.port,
                "codepage": options.code_page,
                "dimensions": snapshot.dimensions,
                "cursor": snapshot.cursor,
                "captured_at": snapshot.captured_at,
                "screen": rows,
            }))?
        }
        OutputFormat::Text => snapshot.as_text(),
    };
    Ok(CliResult::success_with_message(output))
}

async fn drive(session: &SessionController, options: &RunOptions) -> anyhow::Result<()> {
    session
        .wait_for_unlock(options.timeout)
        .await
        .context("Waiting for the sign-on screen")?;

    for (i, keys) in options.keys.iter().enumerate() {
        session
            .send_keys_and_wait(keys, options.wait, options.timeout)
            .await
            .with_context(|| format!("Key sequence {}", i + 1))?;
    }
    Ok(())
}

fn spaced_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
