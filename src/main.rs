use anyhow::Result;
use mactrace::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

/// Audit channel depth; events beyond this are dropped, never awaited.
const AUDIT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on the final audit flush after the server has stopped.
const AUDIT_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,russh::client=info,russh::sshbuffer=info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        version = %version::describe(),
        groups = app_config.groups.len(),
        "Starting"
    );

    let limiter = device_limits::DeviceLimiter::new(app_config.device_limits.clone());
    let load_guard = load::LoadGuard::new(app_config.load.clone());
    let (audit_sink, audit_rx) = audit::ChannelAudit::new(AUDIT_CHANNEL_CAPACITY);
    let audit_sink: Arc<dyn audit::AuditSink> = Arc::new(audit_sink);
    let audit_handle = audit::spawn_audit_writer(audit_rx);

    let connector = Arc::new(transport::SshConnector::new(&app_config.ssh));
    let access = Arc::new(orchestrator::DeviceAccess::new(
        connector,
        app_config.credentials.clone(),
        limiter.clone(),
        transport::ReadTiming::from(&app_config.ssh),
    ));
    let tracer = Arc::new(orchestrator::Tracer::new(
        access.clone(),
        load_guard.clone(),
        audit_sink.clone(),
        app_config.trace.clone(),
    ));
    let vlan_workflow = Arc::new(vlan::VlanWorkflow::new(access, audit_sink));
    let inventory: Arc<dyn inventory::Inventory> =
        Arc::new(inventory::StaticInventory::from_config(&app_config.groups));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sampler_handle = load::spawn_sampler(
        Arc::new(load::CpuSampler::new()),
        load_guard.clone(),
        app_config.load.sample_interval_ms,
        shutdown_rx.clone(),
    );
    let evaluator_handle = device_limits::spawn_evaluator(limiter.clone(), shutdown_rx);

    let app = routes::app(routes::Services {
        tracer,
        vlan: vlan_workflow,
        inventory,
        load: load_guard,
        limiter,
    });
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    routes::serve(listener, app, shutdown_signal()).await?;
    tracing::info!("HTTP connections drained");
    let _ = shutdown_tx.send(true);
    let _ = sampler_handle.await;
    let _ = evaluator_handle.await;

    // The router owned every audit sender; the writer drains what is left and exits.
    if tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, audit_handle).await.is_err() {
        tracing::warn!("audit writer did not finish draining, exiting anyway");
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received shutdown signal");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Received shutdown signal");
}
