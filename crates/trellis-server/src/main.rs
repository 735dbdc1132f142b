use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use trellis_core::user::{normalize_roles, NewUser, Role};
use trellis_server::auth;
use trellis_server::config::{ServeArgs, StorageArgs, WorkerArgs};
use trellis_server::sweeper::run_sweeper;
use trellis_server::worker::Worker;

#[derive(Parser)]
#[command(name = "trellis-server", args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(flatten)]
    storage: StorageArgs,

    /// Used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web app (the default)
    Serve(ServeArgs),
    /// Run the thumbnail worker
    Worker(WorkerArgs),
    /// Create a user account
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRELLIS_NEW_USER_PASSWORD")]
        password: String,
        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },
    /// List all users
    ListUsers,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let backends = trellis_server::open_backends(&cli.storage)?;

    match cli.command.unwrap_or(Commands::Serve(cli.serve)) {
        Commands::Serve(args) => {
            tokio::spawn(run_sweeper(backends.db.clone(), args.sweep_interval));

            let addr = args.addr();
            let state = trellis_server::app_state(backends, args.server_config());
            let listener = TcpListener::bind(addr).await?;
            info!("trellis-server listening on http://{addr}");
            trellis_server::serve(listener, state).await?;
        }
        Commands::Worker(args) => {
            Worker::new(backends.db, backends.store, args.worker_config())
                .run()
                .await;
        }
        Commands::CreateUser {
            name,
            email,
            password,
            admin,
        } => {
            if password.len() < 6 {
                bail!("password must be at least 6 characters");
            }
            let mut roles = vec![Role::User];
            if admin {
                roles.push(Role::Admin);
            }
            let user = backends
                .db
                .create_user(&NewUser {
                    name,
                    email,
                    password_hash: auth::hash_password(&password).await?,
                    roles: normalize_roles(roles),
                })
                .await?;
            eprintln!("Created user {} (id: {})", user.email, user.id);
        }
        Commands::ListUsers => {
            let users = backends.db.list_users().await?;
            if users.is_empty() {
                eprintln!("No users found.");
            } else {
                println!("{:<38} {:<28} {:<20} ROLES", "ID", "EMAIL", "NAME");
                for user in users {
                    let roles: Vec<&str> = user.roles.iter().map(Role::as_str).collect();
                    println!(
                        "{:<38} {:<28} {:<20} {}",
                        user.id,
                        user.email,
                        user.name,
                        roles.join(",")
                    );
                }
            }
        }
    }

    Ok(())
}
