use std::{path::PathBuf, sync::Arc};

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sharee::{
    Search, ShareType,
    backend::ReqwestHttpClient,
    plugin::{Services, UserSession},
};
use sharee_cli::{load_directory, load_settings, parse_share_type, results_table};

#[derive(Parser)]
#[command(version, about, long_about)]
struct Cli {
    /// Path to the sharing config, instead of the default one
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// TOML file describing the users, groups and contacts of the server
    #[arg(short, long, global = true, value_name = "FIXTURE")]
    directory: Option<PathBuf>,

    /// Address of the local server, used to recognize the cloud ids of local users
    #[arg(short, long, global = true, default_value = "http://localhost")]
    server: String,

    /// Print debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the recipients matching a query
    #[command(
        after_help = "TYPE can be any of: users, groups, emails, remotes, remote-groups, circles"
    )]
    Search {
        query: String,

        /// The user performing the search
        #[arg(long = "as", value_name = "UID")]
        uid: String,

        /// Only search these kinds of recipients. Defaults to all of them.
        #[arg(short = 't', long = "type", value_name = "TYPE", value_parser = parse_share_type)]
        share_types: Vec<ShareType>,

        /// Also query the lookup server
        #[arg(long)]
        lookup: bool,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective sharing config
    Config {},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    let config = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Search {
            query,
            uid,
            share_types,
            lookup,
            limit,
            offset,
            json,
        } => {
            let directory_path = cli
                .directory
                .ok_or_else(|| anyhow!("A directory fixture is required to search"))?;
            let directory = load_directory(&directory_path)?;

            let http = ReqwestHttpClient::with_connect_timeout(config.lookup.connect_timeout())?;
            let services = Services::from_directory(Arc::new(directory), &cli.server)
                .with_http_client(Arc::new(http));
            let search = Search::with_default_plugins(&services, Arc::new(config));

            let share_types = if share_types.is_empty() {
                ShareType::ALL.to_vec()
            } else {
                share_types
            };
            debug!("Searching {share_types:?} as {uid}");

            let outcome = search
                .search(
                    &UserSession::new(&uid),
                    &query,
                    &share_types,
                    lookup,
                    limit,
                    offset,
                )
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", results_table(&outcome));
                if outcome.has_more_results {
                    println!("More results available with --offset {}", offset + limit);
                }
            }
        }
        Commands::Config {} => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
