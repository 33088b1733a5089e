use anyhow::{anyhow, Result};
use is_terminal::IsTerminal;
use routecrab::workflow::Settings;
use routecrab::{Config, Provisioner, SharedConfig};
use std::path::Path;
use std::sync::Arc;
use time::macros::format_description;
use tokio::signal;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("routecrab".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;
    let _log_guard = tracing_init(config.log_file.as_deref())?;

    if config.acl.is_empty() {
        tracing::warn!("acl is empty, every API request will be rejected");
    }

    let zones = config.zone_table()?;
    if zones.is_empty() {
        tracing::info!("no managed zones configured, every domain is manual");
    }
    for zone in zones.iter() {
        tracing::info!("managing zone \"{}\" ({})", zone.parent_domain, zone.zone_id);
    }

    let provisioner = Provisioner::new(
        zones,
        Settings::from(&*config),
        routecrab::collaborators(&config)?,
    );

    tracing::info!("API listening on {}", &config.api_bind_addr);
    routecrab::new_http(config.clone(), provisioner, shutdown_signal()).await?;

    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let timer = UtcTime::new(format_description!(
        "[year].[month].[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let (file_layer, guard) = match log_file {
        None => (None, None),
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("log_file {} has no file name", path.display()))?;
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(timer.clone())
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_ansi(std::io::stdout().is_terminal()),
        )
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "routecrab=info,tower_http=info".into()),
        )
        .init();
    Ok(guard)
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)
                .map_err(|err| anyhow!("loading {config_file}: {err}"))?;
            Ok(Arc::new(config))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("quitting from signal");
}
