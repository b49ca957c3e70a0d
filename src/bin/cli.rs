//! FineDB CLI Client
//!
//! Command-line interface for interacting with FineDB.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use finedb::{Client, Result};

/// FineDB CLI
#[derive(Parser, Debug)]
#[command(name = "finedb-cli")]
#[command(about = "CLI for the FineDB key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11138")]
    server: String,

    /// Sub-database to work in (default database if omitted)
    #[arg(long)]
    db: Option<String>,

    /// Do not wait for writes to be applied
    #[arg(long = "async")]
    asynchronous: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Set a key-value pair if the key does not exist yet
    Add {
        key: String,
        value: String,
    },

    /// Overwrite the value of an existing key
    Update {
        key: String,
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List the keys of the sub-database
    List,

    /// Delete the sub-database with all its keys
    Drop,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(args.server.as_str())?;
    client.set_sync(!args.asynchronous);
    if args.db.is_some() {
        client.setdb(args.db.as_deref())?;
    }

    match args.command {
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
        Commands::Get { key } => match client.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            client.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Add { key, value } => {
            client.add(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Update { key, value } => {
            client.update(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            client.del(key.as_bytes())?;
            println!("OK");
        }
        Commands::List => {
            for key in client.list()? {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Drop => {
            client.drop_db()?;
            println!("OK");
        }
    }

    Ok(())
}
