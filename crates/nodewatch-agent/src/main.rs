use anyhow::Result;
use nodewatch_agent::api;
use nodewatch_agent::config::AgentConfig;
use nodewatch_agent::monitor::process::ProcessMonitor;
use nodewatch_agent::monitor::system::SystemMonitor;
use nodewatch_agent::monitor::tenant::TenantMonitor;
use nodewatch_agent::monitor::Alerter;
use nodewatch_agent::state::AppState;
use nodewatch_collector::process::SysinfoProcessTable;
use nodewatch_collector::system::SysinfoStats;
use nodewatch_notify::log::LogSink;
use nodewatch_notify::notifier::Notifier;
use nodewatch_notify::webhook::WebhookSink;
use nodewatch_notify::NotificationSink;
use nodewatch_tenant::directory::HttpTenantDirectory;
use nodewatch_tenant::supervisor::InfoDirSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

fn build_notifier(config: &AgentConfig) -> Result<Notifier> {
    let sink: Arc<dyn NotificationSink> = match &config.notify.webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Alerts will be posted to webhook");
            Arc::new(WebhookSink::new(
                url,
                Duration::from_secs(config.notify.timeout_secs),
            )?)
        }
        None => {
            tracing::warn!("No webhook configured, alerts go to the log only");
            Arc::new(LogSink)
        }
    };
    Ok(Notifier::new(vec![sink]))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nodewatch=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = AgentConfig::load(&config_path)?;
    tracing::info!(node_id = %config.node_id, config = %config_path, "nodewatch-agent starting");

    let state = AppState::new(&config.node_id);
    let alerter = Alerter::new(&config.node_id, build_notifier(&config)?);

    let mounts = config.disks.iter().map(|d| d.mount.clone()).collect();
    let system = SystemMonitor::new(
        Box::new(SysinfoStats::new(mounts)),
        config.system.metrics.clone(),
        config.disks.clone(),
        state.registries.clone(),
        alerter.clone(),
    );
    tokio::spawn(system.run(Duration::from_secs(config.intervals.system_secs)));

    if config.processes.is_empty() {
        tracing::info!("No processes configured, process monitor disabled");
    } else {
        let processes = ProcessMonitor::new(
            Box::new(SysinfoProcessTable::new()),
            config.processes.clone(),
            state.registries.clone(),
            alerter.clone(),
        );
        tokio::spawn(processes.run(Duration::from_secs(config.intervals.process_secs)));
    }

    match &config.directory {
        Some(dir) => {
            let directory =
                HttpTenantDirectory::new(&dir.url, Duration::from_secs(dir.timeout_secs))?;
            let tenants = TenantMonitor::new(
                Box::new(directory),
                Box::new(InfoDirSupervisor::new(&config.supervisor.records_dir)),
                Box::new(SysinfoProcessTable::new()),
                config.tenant.clone(),
                state.clone(),
                alerter.clone(),
            );
            tokio::spawn(tenants.run(Duration::from_secs(config.intervals.tenant_secs)));
        }
        None => tracing::warn!("No tenant directory configured, tenant monitor disabled"),
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "Status API listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully");
        })
        .await?;

    Ok(())
}
