//! the `apps` subcommand - application bootstrap.

use base64::prelude::*;
use chrono::Utc;
use clap::{Args, Subcommand};
use color_eyre::eyre::{Context, Result};

use signet_crypto::keys;
use signet_db::{Database, SignetDb};
use signet_types::{Application, ApplicationVersion, Config, MasterKeyPair};

/// manage applications
#[derive(Subcommand, Debug)]
pub enum AppsCommand {
    /// create an application with a default version and a master keypair
    Create(CreateArgs),
}

/// arguments for `apps create`
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// application name
    #[arg(long)]
    name: String,

    /// database connection string
    #[arg(long, env = "SIGNET_DATABASE_URL")]
    database_url: Option<String>,
}

impl AppsCommand {
    /// run the subcommand.
    pub async fn run(self) -> Result<()> {
        match self {
            AppsCommand::Create(args) => create(args).await,
        }
    }
}

async fn create(args: CreateArgs) -> Result<()> {
    let mut config = Config::default();
    if let Some(url) = args.database_url {
        config.database.connection_string = url;
    }
    let db = SignetDb::new(&config)
        .await
        .context("failed to connect to database")?;

    let application = db
        .create_application(&Application {
            id: 0,
            name: args.name.clone(),
        })
        .await
        .context("failed to create application")?;

    let (application_key, application_secret) = ApplicationVersion::generate_credentials();
    let version = db
        .create_application_version(&ApplicationVersion {
            id: 0,
            application_id: application.id,
            name: "default".to_string(),
            application_key: application_key.clone(),
            application_secret: application_secret.clone(),
            supported: true,
        })
        .await
        .context("failed to create application version")?;

    let (master_private, master_public) = keys::generate_keypair();
    let pair = db
        .create_master_key_pair(&MasterKeyPair {
            id: 0,
            application_id: application.id,
            master_key_private: BASE64_STANDARD.encode(keys::private_key_to_bytes(&master_private)),
            master_key_public: BASE64_STANDARD.encode(keys::public_key_to_bytes(&master_public)),
            timestamp_created: Utc::now(),
        })
        .await
        .context("failed to create master keypair")?;

    println!("application:        {} (id {})", args.name, application.id);
    println!("version:            {} (id {})", version.name, version.id);
    println!("application key:    {}", application_key);
    println!("application secret: {}", application_secret);
    println!("master public key:  {}", pair.master_key_public);
    println!();
    println!("the application secret is shown once; store it safely.");
    Ok(())
}
