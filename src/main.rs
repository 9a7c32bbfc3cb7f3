use std::{process, sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::watch, task};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vitrine::{
    application::error::AppError,
    cache::CacheStore,
    config::{self, Settings},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry, tls,
    },
    watch::{NotifySource, WatchWorker},
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Inspect(_) => run_inspect(settings).await,
    }
}

/// Scan and ingest the asset root off the async runtime.
async fn build_store(settings: &Settings) -> Result<CacheStore, AppError> {
    let root = settings.assets.root.clone();
    let extensions = settings.assets.extensions.clone();

    let store = task::spawn_blocking(move || CacheStore::scan_and_build(root, &extensions))
        .await
        .map_err(|err| AppError::unexpected(format!("cache build task failed: {err}")))??;

    Ok(store)
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let store = Arc::new(build_store(&settings).await?);

    if !settings.tls.domains.is_empty()
        && let Some(dir) = settings.tls.certificate_dir.as_ref()
    {
        let provider = tls::dir_provider(&settings.tls.domains, dir);
        let available = tls::check_certificates(&provider);
        info!(
            target = "vitrine::tls",
            domains = settings.tls.domains.len(),
            available,
            "Certificate check complete"
        );
    }

    let (watch_source, events) = NotifySource::start(store.root())?;
    let worker = tokio::spawn(
        WatchWorker::new(store.clone(), settings.assets.extensions.clone(), events).run(),
    );

    let result = serve_http(&settings, store).await;

    // Dropping the source closes the event channel and ends the worker.
    drop(watch_source);
    if let Err(err) = worker.await {
        warn!(target = "vitrine::watch", error = %err, "Watch worker ended abnormally");
    }

    result
}

async fn run_inspect(settings: Settings) -> Result<(), AppError> {
    let store = build_store(&settings).await?;

    for path in store.paths() {
        let Some(entry) = store.lookup(&path) else {
            continue;
        };
        println!(
            "{}\traw={}\tgzip={}\tbrotli={}\tetag={}",
            entry.canonical_path,
            entry.raw.len(),
            size_or_dash(entry.gzip.as_ref().map(|b| b.len())),
            size_or_dash(entry.brotli.as_ref().map(|b| b.len())),
            entry.validator,
        );
    }

    Ok(())
}

fn size_or_dash(size: Option<usize>) -> String {
    size.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())
}

async fn serve_http(settings: &Settings, store: Arc<CacheStore>) -> Result<(), AppError> {
    let router = http::build_router(
        HttpState { store },
        &settings.assets.route_prefix,
        &settings.pages,
    );

    let public_listener = TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(InfraError::from)?;
    let redirect_listener = match settings.server.redirect_addr {
        Some(addr) => Some(TcpListener::bind(addr).await.map_err(InfraError::from)?),
        None => None,
    };

    info!(
        target = "vitrine::http",
        public_addr = %settings.server.public_addr,
        redirect_addr = ?settings.server.redirect_addr,
        route_prefix = %settings.assets.route_prefix,
        pages = settings.pages.len(),
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let public = {
        let shutdown = shutdown_rx.clone();
        async move {
            axum::serve(public_listener, router.into_make_service())
                .with_graceful_shutdown(wait_for_shutdown(shutdown))
                .await
        }
    };

    let redirect = {
        let shutdown = shutdown_rx.clone();
        async move {
            match redirect_listener {
                Some(listener) => {
                    axum::serve(listener, http::build_redirect_router().into_make_service())
                        .with_graceful_shutdown(wait_for_shutdown(shutdown))
                        .await
                }
                None => Ok(()),
            }
        }
    };

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = async { tokio::try_join!(public, redirect) } => {
            result.map_err(InfraError::from)?;
        }
        _ = drain_deadline(shutdown_rx, grace) => {
            warn!(
                target = "vitrine::http",
                grace_seconds = grace.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "vitrine::http", "Server stopped");
    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn drain_deadline(shutdown: watch::Receiver<bool>, grace: Duration) {
    wait_for_shutdown(shutdown).await;
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "vitrine::http", error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "vitrine::http", error = %err, "Failed to listen for SIGTERM");
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

    info!(target = "vitrine::http", "Shutdown signal received");
}
