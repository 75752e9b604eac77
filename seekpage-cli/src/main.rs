use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::token::TokenCommands;

/// seekpage - check list requests and inspect cursor tokens
#[derive(Parser)]
#[command(name = "seekpage")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to the standard search path)
    #[arg(short, long, global = true, value_name = "FILE", env = "SEEKPAGE_CONFIG")]
    config: Option<String>,

    /// Emit JSON debug logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured entities and their field whitelists
    Entities,

    /// Validate a list request and show the query it produces
    Check {
        /// Entity name
        #[arg(short, long)]
        entity: String,

        /// Sort terms, e.g. "created_at DESC"
        #[arg(long)]
        sort: Option<String>,

        /// Filter expression, e.g. "status = 'active'"
        #[arg(long)]
        filter: Option<String>,

        /// Comma-separated projection
        #[arg(long)]
        fields: Option<String>,

        /// Page size
        #[arg(long)]
        limit: Option<String>,

        /// Cursor for the following page
        #[arg(long, value_name = "TOKEN")]
        next_token: Option<String>,

        /// Cursor for the preceding page
        #[arg(long, value_name = "TOKEN")]
        prev_token: Option<String>,

        /// Render PostgreSQL for this table (defaults to the entity name)
        #[arg(long)]
        table: Option<String>,
    },

    /// Cursor token commands
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Execute command
    let result = commands::load_config(cli.config.as_deref(), cli.verbose).and_then(|config| {
        match cli.command {
            Commands::Entities => commands::entities::execute(&config),
            Commands::Check {
                entity,
                sort,
                filter,
                fields,
                limit,
                next_token,
                prev_token,
                table,
            } => {
                let params = commands::check::request(
                    sort, filter, fields, limit, next_token, prev_token,
                );
                commands::check::execute(&config, &entity, &params, table.as_deref())
            }
            Commands::Token { command } => commands::token::execute(&config, command),
        }
    });

    // Handle result
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            // Show context if available
            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
