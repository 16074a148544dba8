use std::sync::Arc;

use tracing::info;

use capacity_ledger::config::Config;
use capacity_ledger::{AllocationService, InMemoryDirectory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    capacity_ledger::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;

    let directory = Arc::new(InMemoryDirectory::load_json(&config.directory_path())?);
    info!("capacity-ledger starting");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  engineers: {}", directory.engineer_count());
    info!("  projects: {}", directory.project_count());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let (service, report) = AllocationService::open(directory, &config.snapshot_path()).await?;
    info!("loaded {} assignments ({} skipped)", report.loaded, report.skipped.len());
    for (id, reason) in &report.skipped {
        tracing::warn!("  skipped {id}: {reason}");
    }

    let date = config.report_date;
    let counts = service.team_utilization(date).await;
    println!("utilization on {date} ({} engineers)", counts.total());
    println!(
        "  available={} partially_allocated={} fully_allocated={}",
        counts.available, counts.partially_allocated, counts.fully_allocated
    );
    let statuses = service.project_status_counts();
    println!(
        "  projects: planning={} active={} completed={}",
        statuses.planning, statuses.active, statuses.completed
    );

    for row in service.engineers_with_capacity(date).await {
        println!(
            "  {:<24} used={:>3}% free={:>3}% {}",
            row.name,
            row.used_percent,
            row.available_capacity,
            row.bucket.label()
        );
    }

    Ok(())
}
