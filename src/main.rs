use mimalloc::MiMalloc;
use obsmirror::{
    CarefulClient, Credentials, INaturalistClient, Mirror, MirrorError, MushroomObserverClient,
    ServiceIdentity,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = &obsmirror::config::CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let source = cfg.source();
    let destination = cfg.destination();
    info!(
        source_api = %source.api_url,
        source_user = %source.username,
        destination_api = %destination.api_url,
        destination_user = %destination.username,
        loglevel = %cfg.basic.loglevel,
        count = cfg.mirror.count,
        diagnostic_dir = %cfg.basic.diagnostic_dir.display()
    );

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(MirrorError::Request(err)) => {
            error!(service = %err.service(), error = %err, "Mirror run stopped");
            err.exit_code()
        }
        Err(err) => {
            error!(error = %err, "Mirror run stopped");
            err.exit_code()
        }
    }
}

async fn run() -> Result<(), MirrorError> {
    let cfg = &obsmirror::config::CONFIG;
    let careful = Arc::new(CarefulClient::from_config(cfg)?);
    let source = MushroomObserverClient::new(careful.clone(), &cfg.source())?;
    let destination = INaturalistClient::new(careful, &cfg.destination())?;
    let credentials = Credentials::from_config(cfg);

    if !source
        .confirm_api_key(&credentials.source_username, &credentials.source_api_key)
        .await?
    {
        return Err(MirrorError::BadApiKey {
            service: ServiceIdentity::SourcePlatform,
        });
    }
    info!("Source username and API key worked");

    if !destination
        .confirm_jwt(&credentials.jwt, &credentials.destination_username)
        .await?
    {
        return Err(MirrorError::Unauthorized {
            service: ServiceIdentity::DestinationPlatform,
        });
    }
    info!("Destination username and JWT worked");

    let mirror = Mirror::new(
        source,
        destination,
        credentials,
        cfg.mirror.clone(),
        cfg.platforms.source.page_size,
    );
    let summary = mirror.run(cfg.mirror.count, shutdown_signal()).await?;

    for record in &summary.mirrored {
        info!(
            source_id = record.source_id,
            destination_id = record.destination_id,
            images = record.images,
            "Mirrored"
        );
    }
    if summary.interrupted {
        warn!(done = summary.mirrored.len(), "Run ended early on request");
    }
    info!(done = summary.mirrored.len(), "Goodbye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
