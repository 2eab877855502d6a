// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Proxy Runner - command line interface
//!
//! Lists, inspects, adds and removes identities and proxy upstreams.
//! Every command prints JSON to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use proxy_runner::config::Config;
use proxy_runner::migrations;
use proxy_runner::model::{
    IdentityFilter, NewIdentity, Pagination, ProxyFilter, ProxyStatus, RunnerFilter,
    RunnerService, SortDirection,
};
use proxy_runner::outgoing::{HttpOutgoingAddress, OutgoingAddress, StaticOutgoingAddress};
use proxy_runner::provider::HttpProviderApi;
use proxy_runner::runtime::docker::DockerCli;
use proxy_runner::store::PgIdentityStore;
use proxy_runner::ProxyRunner;

#[derive(Parser)]
#[command(name = "proxy-runner", version, about = "VPN exit proxy provisioning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Identity operations.
    #[command(subcommand)]
    Identity(IdentityCommand),
    /// Proxy upstream operations.
    #[command(subcommand)]
    Proxy(ProxyCommand),
    /// Runner operations.
    #[command(subcommand)]
    Runner(RunnerCommand),
    /// Apply database migrations.
    Migrate,
}

#[derive(Clone, clap::Args)]
struct PageArgs {
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Page size.
    #[arg(long, default_value_t = 100)]
    limit: usize,
    /// Return every item.
    #[arg(long)]
    all: bool,
}

impl From<PageArgs> for Pagination {
    fn from(args: PageArgs) -> Self {
        Pagination {
            page: args.page,
            limit: args.limit,
            skip: args.all,
        }
    }
}

#[derive(Subcommand)]
enum IdentityCommand {
    /// List identities.
    List {
        /// Exact identity string.
        #[arg(long)]
        identity: Option<String>,
        /// Only identities (not) bound to a session.
        #[arg(long)]
        is_use: Option<bool>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one identity.
    Get { id: Uuid },
    /// Register a key file and start its runner.
    Add {
        key_file: PathBuf,
        #[arg(long, env = "PROXY_RUNNER_IDENTITY_PASSPHRASE")]
        passphrase: String,
    },
    /// Remove an identity, its runner and key file.
    Remove { id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Online,
    Offline,
    Disable,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Asc,
    Desc,
}

#[derive(Subcommand)]
enum ProxyCommand {
    /// List proxy upstreams.
    List {
        /// Published port.
        #[arg(long)]
        listen_port: Option<u16>,
        /// Downstream status.
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Provider id.
        #[arg(long)]
        ref_id: Option<String>,
        /// Order by insert date.
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one upstream.
    Get { id: String },
    /// Publish an upstream for a registered provider.
    Create {
        /// Provider id.
        provider_id: String,
        /// Public port; the first free one is picked when omitted.
        #[arg(long)]
        listen_port: Option<u16>,
    },
    /// Remove an upstream and its edge runners.
    Remove { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ServiceArg {
    Identity,
    Session,
    Relay,
    Edge,
}

#[derive(Subcommand)]
enum RunnerCommand {
    /// List managed runners.
    List {
        #[arg(long, value_enum)]
        service: Option<ServiceArg>,
    },
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_page<T: Serialize>(items: Vec<T>, total: usize) -> anyhow::Result<()> {
    print(&serde_json::json!({ "items": items, "total": total }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proxy_runner=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    if let Command::Migrate = cli.command {
        migrations::run(&pool).await?;
        info!("Migrations applied");
        return Ok(());
    }

    let outgoing: Arc<dyn OutgoingAddress> = match &config.listen_addr {
        Some(addr) => Arc::new(StaticOutgoingAddress(addr.clone())),
        None => Arc::new(HttpOutgoingAddress::default()),
    };
    let app = ProxyRunner::new(
        &config,
        Arc::new(DockerCli::new()),
        Arc::new(PgIdentityStore::new(pool)),
        Arc::new(HttpProviderApi::new(&config.provider_api_url)),
        outgoing,
    );

    match cli.command {
        Command::Identity(command) => match command {
            IdentityCommand::List {
                identity,
                is_use,
                page,
            } => {
                let filter = IdentityFilter {
                    identity,
                    is_use,
                    pagination: page.into(),
                };
                let (items, total) = app.identities().list(&filter).await?;
                print_page(items, total)?;
            }
            IdentityCommand::Get { id } => print(&app.identities().get(id).await?)?,
            IdentityCommand::Add {
                key_file,
                passphrase,
            } => {
                let identity = app
                    .identities()
                    .add(&NewIdentity {
                        key_file,
                        passphrase,
                    })
                    .await?;
                print(&identity)?;
            }
            IdentityCommand::Remove { id } => {
                app.identities().remove(id).await?;
                print(&serde_json::json!({ "removed": id }))?;
            }
        },
        Command::Proxy(command) => match command {
            ProxyCommand::List {
                listen_port,
                status,
                ref_id,
                sort,
                page,
            } => {
                let filter = ProxyFilter {
                    listen_port,
                    status: status.map(|s| match s {
                        StatusArg::Online => ProxyStatus::Online,
                        StatusArg::Offline => ProxyStatus::Offline,
                        StatusArg::Disable => ProxyStatus::Disable,
                    }),
                    ref_id,
                    sort_insert_date: sort.map(|s| match s {
                        SortArg::Asc => SortDirection::Asc,
                        SortArg::Desc => SortDirection::Desc,
                    }),
                    pagination: page.into(),
                };
                let (items, total) = app.proxies().list(&filter).await?;
                print_page(items, total)?;
            }
            ProxyCommand::Get { id } => print(&app.proxies().get(&id).await?)?,
            ProxyCommand::Create {
                provider_id,
                listen_port,
            } => print(&app.proxies().create(&provider_id, listen_port).await?)?,
            ProxyCommand::Remove { id } => {
                app.proxies().remove(&id).await?;
                print(&serde_json::json!({ "removed": id }))?;
            }
        },
        Command::Runner(RunnerCommand::List { service }) => {
            let filter = RunnerFilter {
                service: service.map(|s| match s {
                    ServiceArg::Identity => RunnerService::Identity,
                    ServiceArg::Session => RunnerService::Session,
                    ServiceArg::Relay => RunnerService::Relay,
                    ServiceArg::Edge => RunnerService::Edge,
                }),
                ..RunnerFilter::default()
            };
            print(&app.runners().list(&filter).await?)?;
        }
        Command::Migrate => {}
    }

    Ok(())
}
