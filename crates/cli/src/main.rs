//! Savers CLI - Database migrations and user management.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! savers-cli migrate
//!
//! # Create the first admin user
//! savers-cli admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//!
//! # Promote an existing user
//! savers-cli admin promote -e someone@example.com
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin create` - Create a user with a password (admin by default)
//! - `admin promote` - Give an existing user the admin role

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "savers-cli")]
#[command(author, version, about = "Savers CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users from the command line
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new user with a password
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (at least 8 characters)
        #[arg(short, long, env = "SAVERS_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Role (`admin` or `user`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
    /// Give an existing user the admin role
    Promote {
        /// Email address of the user
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
                role,
            } => {
                commands::admin::create_user(&email, &name, &password, &role).await?;
            }
            AdminAction::Promote { email } => {
                commands::admin::promote(&email).await?;
            }
        },
    }
    Ok(())
}
