use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use folio_ingest::{
    ExtractionCollaborator, FileKind, HttpCollaborator, ParseResult, RawInput, StatementParser, GENERIC, PROFILES,
    classify, validate,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod state;

#[derive(Parser, Debug)]
#[command(name = "folio", version, about = "Normalize bank statements into signed transactions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a statement (CSV, XLSX/XLS or PDF) and print the result as JSON
    Parse {
        file: PathBuf,

        /// Bank name or key, skips header-based detection (e.g. gtbank, "Access Bank")
        #[arg(long)]
        bank: Option<String>,

        /// Declared media type; guessed from the extension when omitted
        #[arg(long)]
        media_type: Option<String>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Report how a file would be routed, without parsing it
    Classify { file: PathBuf },

    /// List the known bank statement layouts
    Profiles,

    /// Manage ~/.folio/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOLIO_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("folio=info,folio_ingest=info"));

    // stdout carries the JSON result, so logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_input(file: &Path, media_type: Option<String>) -> Result<RawInput> {
    let bytes = std::fs::read(file).with_context(|| format!("read {}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let mut input = RawInput::from_bytes(name, media_type.unwrap_or_default(), bytes);
    if input.media_type.is_empty() {
        if let Some(kind) = classify(&input) {
            input.media_type = kind.media_type().to_string();
        }
    }
    Ok(input)
}

async fn run_parse<C: ExtractionCollaborator>(
    parser: &StatementParser<C>,
    input: &RawInput,
    bank: Option<&str>,
) -> ParseResult {
    parser.parse_statement(input, bank).await
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Parse {
            file,
            bank,
            media_type,
            pretty,
        } => {
            let cfg = config::load_config()?;
            let input = read_input(&file, media_type)?;

            let kind = classify(&input);
            let result = match cfg.llm_config_for(kind)? {
                Some(llm) => {
                    let parser =
                        StatementParser::with_collaborator(HttpCollaborator::new(llm), cfg.document_options());
                    run_parse(&parser, &input, bank.as_deref()).await
                }
                None => {
                    if kind == Some(FileKind::Pdf) {
                        tracing::warn!(
                            "no API key in ${}; PDF extraction is unavailable",
                            cfg.llm.api_key_env
                        );
                    }
                    run_parse(&StatementParser::new(), &input, bank.as_deref()).await
                }
            };

            print_json(&result, pretty)?;
            if !result.success {
                std::process::exit(1);
            }
        }

        Command::Classify { file } => {
            let input = read_input(&file, None)?;
            let v = validate(&input);
            println!(
                "{}: kind={} size={} valid={}",
                file.display(),
                classify(&input).map_or("unknown".to_string(), |k| format!("{k:?}").to_lowercase()),
                input.size,
                v.valid
            );
            if let Some(e) = v.error {
                bail!(e);
            }
        }

        Command::Profiles => {
            for p in PROFILES.iter().chain(std::iter::once(&GENERIC)) {
                println!(
                    "{:<10} {:<12} date: {} | description: {}",
                    p.key,
                    p.name,
                    p.header_patterns.date.join(", "),
                    p.header_patterns.description.join(", ")
                );
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg)?);
            }
        },
    }

    Ok(())
}
