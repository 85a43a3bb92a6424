//! the `serve` subcommand - runs the server.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use signet_db::SignetDb;
use signet_types::Config;

use crate::callback::sink_from_config;
use crate::sweep::ExpirationSweeper;
use crate::AppState;

/// run the signet server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// path to a json config file
    #[arg(long, env = "SIGNET_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// database connection string (overrides config)
    #[arg(long, env = "SIGNET_DATABASE_URL")]
    database_url: Option<String>,

    /// address to listen on (overrides config)
    #[arg(long, env = "SIGNET_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// webhook url for status change callbacks (overrides config)
    #[arg(long, env = "SIGNET_CALLBACK_URL")]
    callback_url: Option<String>,

    /// log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "SIGNET_LOG_LEVEL")]
    log_level: Level,
}

impl ServeCommand {
    /// load config, connect the database and run the server until shutdown.
    pub async fn run(self) -> Result<()> {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(self.log_level)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to install tracing subscriber")?;

        let mut config = match &self.config_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                serde_json::from_str::<Config>(&raw).context("failed to parse config file")?
            }
            None => Config::default(),
        };
        if let Some(url) = self.database_url {
            // accept both bare paths and full connection urls
            if let Some(rest) = url.strip_prefix("postgres://") {
                config.database.db_type = "postgres".to_string();
                config.database.connection_string = format!("postgres://{}", rest);
            } else {
                config.database.db_type = "sqlite".to_string();
                config.database.connection_string = url;
            }
        }
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(url) = self.callback_url {
            config.callback.url = Some(url);
        }

        let db = SignetDb::new(&config)
            .await
            .context("failed to connect to database")?;
        let callbacks = sink_from_config(&config.callback);

        let sweeper = ExpirationSweeper::new(
            db.clone(),
            callbacks.clone(),
            config.activation.sweep_interval_secs,
        );
        sweeper.spawn_sweeper();

        let listen_addr = config.listen_addr.clone();
        let state = AppState::new(db, config, callbacks)
            .context("failed to build application state")?;
        let app = crate::create_app(state);

        let listener = TcpListener::bind(&listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", listen_addr))?;
        info!(addr = %listen_addr, "signet listening");

        axum::serve(listener, app).await.context("server error")?;
        Ok(())
    }
}
