//! kvchain CLI
//!
//! Builds the stores and chains described by a configuration file and runs
//! commands against one of them. Stores live in-process, so data only
//! persists for the lifetime of one invocation; `script` runs many commands
//! against the same registry.

use std::io::{BufRead, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kvchain::{KvConfig, Store, TTL_INFINITE};

// =============================================================================
// CLI Arguments
// =============================================================================

/// kvchain - tiered key/value store chains
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML store configuration
    #[arg(long, env = "KVCHAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Store or chain to run commands against
    #[arg(long, env = "KVCHAIN_STORE", default_value = "default")]
    store: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Put, read back and inspect the TTL of a sample key
    Demo,
    /// Store a value
    Put {
        key: String,
        value: String,
        /// Time to live in seconds (0 = never expires)
        #[arg(long, default_value = "0")]
        ttl: u64,
    },
    /// Read a value
    Get { key: String },
    /// Delete a key
    Delete { key: String },
    /// Check whether a key exists
    Exist { key: String },
    /// Show the remaining time to live of a key
    Ttl { key: String },
    /// List keys in a [prefix, limit) window
    Keys {
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long, default_value = "")]
        limit: String,
        #[arg(long, default_value = "100")]
        max: usize,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read commands from stdin, one per line
    Script,
}

/// One line of a script, parsed with the same grammar as the CLI
#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct ScriptLine {
    #[command(subcommand)]
    command: Command,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = match &args.config {
        Some(path) => KvConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => KvConfig::default(),
    };
    let registry = config.build_registry()?;
    let store = registry
        .require(&args.store)
        .with_context(|| format!("available stores: {}", registry.names().join(", ")))?;

    info!(store = %args.store, "running command");
    let outcome = run(store.as_ref(), &args.command);

    registry.close_all();
    outcome
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// =============================================================================
// Commands
// =============================================================================

fn run(store: &dyn Store, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Demo => demo(store),
        Command::Put { key, value, ttl } => {
            store.put_ttl(key, value.as_bytes(), Duration::from_secs(*ttl))?;
            println!("OK");
            Ok(())
        }
        Command::Get { key } => {
            match store.get(key) {
                Ok(Some(value)) => println!("{}", String::from_utf8_lossy(&value)),
                Ok(None) => println!("(nil)"),
                Err(e) if e.is_not_found() => println!("(not found)"),
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        Command::Delete { key } => {
            store.delete(key)?;
            println!("OK");
            Ok(())
        }
        Command::Exist { key } => {
            println!("{}", store.exist(key)?);
            Ok(())
        }
        Command::Ttl { key } => {
            match store.ttl(key) {
                Ok(ttl) => println!("{}", format_ttl(ttl)),
                Err(e) if e.is_not_found() => println!("(not found)"),
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        Command::Keys {
            prefix,
            limit,
            max,
            json,
        } => {
            let keys = store.range_keys(prefix, limit, *max)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&keys)?);
            } else {
                for info in keys.iter() {
                    println!("{}\t{}", info.key, info.size);
                }
            }
            Ok(())
        }
        Command::Script => script(store, std::io::stdin().lock()),
    }
}

fn script(store: &dyn Store, input: impl BufRead) -> anyhow::Result<()> {
    for (lineno, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = ScriptLine::try_parse_from(line.split_whitespace())
            .with_context(|| format!("line {}: {}", lineno + 1, line))?;
        if matches!(parsed.command, Command::Script) {
            bail!("line {}: scripts cannot nest", lineno + 1);
        }
        run(store, &parsed.command).with_context(|| format!("line {}: {}", lineno + 1, line))?;
    }
    Ok(())
}

fn demo(store: &dyn Store) -> anyhow::Result<()> {
    let key = "hello";

    store.put(key, &[6, 6, 6])?;
    println!("get {} -> {:?}", key, store.get(key)?.map(|v| v.to_vec()));

    let mut input: &[u8] = &[1, 2, 3];
    store.put_reader_ttl(key, &mut input, 3, Duration::from_secs(10))?;

    std::thread::sleep(Duration::from_secs(1));
    println!("ttl {} -> {}", key, format_ttl(store.ttl(key)?));

    if let Some(mut reader) = store.get_reader(key)? {
        let mut value = Vec::new();
        reader.read_to_end(&mut value)?;
        println!("stream {} -> {:?}", key, value);
    }
    Ok(())
}

fn format_ttl(ttl: Duration) -> String {
    if ttl == TTL_INFINITE {
        "never expires".to_string()
    } else {
        format!("{}s", ttl.as_secs())
    }
}

// =============================================================================
// Tests
// =============================================================================
