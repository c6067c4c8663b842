use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use libris::DatabaseManager;
use libris::config::{AppConfig, Overrides};
use libris::logging::{self, MemorySink};
use libris::shell::{Outcome, Shell};

/// Lines kept for `\log`.
const LOG_PANE_LINES: usize = 200;

/// Interactive request builder for the library database
#[derive(Parser, Debug)]
#[command(name = "libris_shell")]
#[command(about = "Build and run SELECT statements against the library database", long_about = None)]
struct Args {
    /// Server host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Server port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Database user
    #[arg(short = 'U', long)]
    user: Option<String>,

    /// Database name
    #[arg(short = 'd', long)]
    database: Option<String>,

    #[arg(short = 'W', long)]
    password: Option<String>,

    /// Config file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,
}

fn banner(text: &str) {
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║{text:^58}║");
    println!("╚══════════════════════════════════════════════════════════╝");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let overrides = Overrides {
        host: args.host,
        port: args.port,
        database: args.database,
        user: args.user,
        password: args.password,
        log_level: args.log_level,
        ..Overrides::default()
    };
    let config = AppConfig::load(args.config.as_deref(), &overrides)?;
    let log = logging::init(&config.log)?;
    let pane = match &config.log.file {
        Some(path) => MemorySink::with_history(LOG_PANE_LINES, path).unwrap_or_else(|e| {
            log.warning(format!("Could not load log history from {}: {e}", path.display()));
            MemorySink::new(LOG_PANE_LINES)
        }),
        None => MemorySink::new(LOG_PANE_LINES),
    };
    let pane = Arc::new(pane);
    log.subscribe(pane.clone());

    banner(concat!("libris shell v", env!("CARGO_PKG_VERSION")));
    println!("Connecting to {}...", config.connection);

    let mut db = DatabaseManager::new();
    db.set_connection_params(config.connection);
    if let Err(e) = db.connect().await {
        eprintln!("✗ {e}");
        eprintln!("\nCheck host, port and credentials (flags, LIBRIS_* variables or libris.toml).");
        return Err(e.into());
    }
    println!("✓ Connected!\n");

    let mut rl = DefaultEditor::new()?;
    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".libris_history");
        p
    });
    if let Some(ref path) = history_file {
        let _ = rl.load_history(path);
    }

    println!("Type 'help' for commands, '\\log' for recent log lines, 'quit' to leave.\n");

    let mut shell = Shell::new();
    loop {
        let prompt = if shell.builder.table().is_empty() {
            "libris> ".to_string()
        } else {
            format!("libris:{}> ", shell.builder.table())
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line == "\\log" {
                    for entry in pane.lines() {
                        println!("{entry}");
                    }
                    continue;
                }

                match shell.handle(&mut db, line).await {
                    Ok(Outcome::Output(text)) => println!("{text}\n"),
                    Ok(Outcome::Quit) => break,
                    Err(e) => eprintln!("✗ {e}\n"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("✗ {e}");
                break;
            }
        }
    }

    if let Some(ref path) = history_file {
        let _ = rl.save_history(path);
    }
    db.disconnect().await?;
    banner("Session closed");
    Ok(())
}
