//! iamdir - IAM to LDAP bridge daemon
//!
//! `iamdir-server` runs the scheduled sync until Ctrl-C.
//! `iamdir-server check-bind <uid>` reads a `<password>,<code>` secret from
//! stdin and replays the web sign-in for the mirrored user.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::Settings;
use iamdir_auth::WebSignInVerifier;
use iamdir_core::{DirectoryAdapter, DirectoryLayout};
use iamdir_sync::{
    AwsIamClient, DirectoryIdStore, IdAllocator, LdapDirectory, ReconciliationEngine,
    SyncScheduler,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let settings = Settings::load().context("Failed to load configuration")?;

    info!("Starting iamdir v{}", env!("CARGO_PKG_VERSION"));
    info!(root = %settings.directory.root_dn, "Configuration loaded successfully");

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => run_sync(&settings).await,
        Some("check-bind") => {
            let uid = args.next().context("usage: iamdir-server check-bind <uid>")?;
            check_bind(&settings, &uid).await
        }
        Some(other) => bail!("unknown command '{}'", other),
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,iamdir=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn connect_directory(settings: &Settings) -> Result<Arc<LdapDirectory>> {
    info!("Connecting to LDAP at {}...", settings.directory.url);
    let directory = LdapDirectory::connect(&settings.directory.connection())
        .await
        .context("Failed to connect to the directory")?;
    Ok(Arc::new(directory))
}

async fn run_sync(settings: &Settings) -> Result<()> {
    // Without usable credentials there is nothing to mirror
    let iam = match AwsIamClient::new(settings.aws.region.clone()).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to initialize the IAM client: {}", e);
            return Err(e).context("IAM client initialization failed");
        }
    };

    let directory = connect_directory(settings).await?;
    let layout = DirectoryLayout::new(settings.directory.root_dn.clone());
    let counter_path = settings
        .directory
        .id_counter_dn
        .clone()
        .unwrap_or_else(|| layout.default_counter_path());
    let allocator = IdAllocator::new(Arc::new(DirectoryIdStore::new(
        directory.clone(),
        counter_path,
    )));

    let engine = ReconciliationEngine::new(
        directory,
        iam,
        allocator,
        layout,
        settings.sync.engine(),
    );
    let scheduler =
        SyncScheduler::new(&settings.sync.scheduler()).context("Invalid sync schedule")?;

    let handle = scheduler.start(engine);
    handle
        .stop_on(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Sync stopped")?;

    info!("iamdir stopped");
    Ok(())
}

async fn check_bind(settings: &Settings, uid: &str) -> Result<()> {
    let directory = connect_directory(settings).await?;
    let layout = DirectoryLayout::new(settings.directory.root_dn.clone());
    let path = layout.user_path(uid);
    let entry = directory
        .lookup(&path)
        .await?
        .with_context(|| format!("no mirrored user at {}", path))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let presented = lines
        .next_line()
        .await
        .context("Failed to read the secret from stdin")?
        .unwrap_or_default();

    let verifier = WebSignInVerifier::new(settings.signin.clone());
    if verifier.verify_entry(&entry, &presented).await? {
        info!(uid, "Bind accepted");
        Ok(())
    } else {
        bail!("bind denied for {}", uid)
    }
}
