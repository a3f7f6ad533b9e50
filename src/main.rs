use clap::Parser;
use nfl_etl::config::cli::{merge_partitions, seasons_arg, Cli, Commands};
use nfl_etl::domain::ports::ObjectStore;
use nfl_etl::utils::error::{ErrorSeverity, EtlError};
use nfl_etl::utils::monitor::ResourceMonitor;
use nfl_etl::utils::{logger, validation::Validate};
use nfl_etl::{
    AppConfig, BigQueryWarehouse, DatasetRegistry, Extractor, GcsObjectStore, LocalObjectStore,
    PipelineDriver, RawObjectStore, RunReport, WarehouseLoader,
};
use std::future::Future;

type Driver<S> = PipelineDriver<S, BigQueryWarehouse>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting nfl-etl");

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    if cli.verbose {
        tracing::debug!("Configuration: {:?}", config);
    }

    let access_token = if needs_cloud(&cli.command) {
        match config.resolve_access_token().await {
            Ok(token) => token,
            Err(e) => exit_with(&e),
        }
    } else {
        None
    };

    let monitor = ResourceMonitor::new(cli.monitor);
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let outcome = match &cli.command {
        Commands::Extract {
            local_dir: Some(dir),
            ..
        } => match build_driver(&config, LocalObjectStore::new(dir), None) {
            Ok(driver) => execute(&cli.command, &driver, &config, &monitor).await,
            Err(e) => Err(e),
        },
        _ => {
            let store = GcsObjectStore::with_endpoint(
                config.storage.endpoint.clone(),
                config.storage.raw_bucket.clone(),
                access_token.clone(),
            );
            match build_driver(&config, store, access_token) {
                Ok(driver) => execute(&cli.command, &driver, &config, &monitor).await,
                Err(e) => Err(e),
            }
        }
    };

    monitor.log_final();

    if let Err(e) = outcome {
        exit_with(&e);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig, EtlError> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    if needs_cloud(&cli.command) {
        config.validate()?;
    }
    Ok(config)
}

// 只列出資料集或寫到本機時不需要雲端設定
fn needs_cloud(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::Datasets
            | Commands::Extract {
                local_dir: Some(_),
                ..
            }
    )
}

fn build_driver<S: ObjectStore>(
    config: &AppConfig,
    store: S,
    access_token: Option<String>,
) -> Result<Driver<S>, EtlError> {
    let registry = DatasetRegistry::nflverse(reqwest::Client::new(), &config.sources)?;
    let extractor = Extractor::new(registry, &config.sources.source, config.current_season());
    let store = RawObjectStore::new(store).with_row_group_size(config.ingestion.batch_size);
    let warehouse = BigQueryWarehouse::new(
        &config.gcp.project_id,
        &config.gcp.location,
        access_token,
    )
    .with_endpoint(&config.warehouse.endpoint);

    Ok(PipelineDriver::new(
        extractor,
        store,
        WarehouseLoader::new(warehouse),
        &config.gcp.project_id,
        &config.warehouse.raw_dataset,
    ))
}

async fn execute<S: ObjectStore>(
    command: &Commands,
    driver: &Driver<S>,
    config: &AppConfig,
    monitor: &ResourceMonitor,
) -> Result<(), EtlError> {
    match command {
        Commands::Datasets => {
            for descriptor in driver.extractor().registry().descriptors() {
                println!(
                    "{:<16} seasons: {:<5} {}",
                    descriptor.id, descriptor.accepts_seasons, descriptor.expected_extension
                );
            }
        }
        Commands::Extract {
            data_type,
            seasons,
            partitions,
            ..
        } => {
            let keys = merge_partitions(partitions);
            let artifact = with_retry(config, data_type, || {
                driver.run_extract_partitioned(data_type, seasons_arg(seasons), &keys)
            })
            .await?;
            monitor.log_phase(data_type, "extract");
            println!("✅ Wrote {}", artifact.uri);
        }
        Commands::Load {
            data_type,
            uri,
            partitions,
            write_mode,
        } => {
            let keys = merge_partitions(partitions);
            let keys = (!keys.is_empty()).then_some(&keys);
            let rows = with_retry(config, data_type, move || async move {
                match uri {
                    Some(uri) => driver.load_uri(data_type, uri, *write_mode).await,
                    None => driver.run_load(data_type, keys, *write_mode).await,
                }
            })
            .await?;
            monitor.log_phase(data_type, "load");
            println!("✅ {} now has {} rows", driver.table_for(data_type), rows);
        }
        Commands::Run {
            data_type,
            seasons,
            write_mode,
        } => {
            let report = with_retry(config, data_type, || {
                driver.run_with_mode(data_type, seasons_arg(seasons), *write_mode)
            })
            .await?;
            monitor.log_phase(data_type, "run");
            print_report(&report);
        }
        Commands::RunAll { seasons, datasets } => {
            let ids = if datasets.is_empty() {
                driver.extractor().registry().ids()
            } else {
                datasets.clone()
            };
            run_all(driver, config, monitor, &ids, seasons_arg(seasons)).await?;
        }
    }
    Ok(())
}

/// Runs each dataset in turn; one failure does not stop the batch.
async fn run_all<S: ObjectStore>(
    driver: &Driver<S>,
    config: &AppConfig,
    monitor: &ResourceMonitor,
    ids: &[String],
    seasons: Option<&[u16]>,
) -> Result<(), EtlError> {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for data_type in ids {
        match with_retry(config, data_type, || driver.run(data_type, seasons)).await {
            Ok(report) => {
                print_report(&report);
                succeeded.push(data_type.clone());
            }
            Err(e) => {
                tracing::error!("❌ {} failed: {}", data_type, e);
                eprintln!("❌ {}: {}", data_type, e);
                failed.push(data_type.clone());
            }
        }
        monitor.log_phase(data_type, "run");
    }

    println!();
    println!("Summary: {} succeeded, {} failed", succeeded.len(), failed.len());
    if !failed.is_empty() {
        println!("Failed: {}", failed.join(", "));
        return Err(EtlError::processing(format!(
            "{} of {} datasets failed: {}",
            failed.len(),
            ids.len(),
            failed.join(", ")
        )));
    }
    Ok(())
}

/// Retries retryable failures up to `max_retries` times, `retry_delay` apart.
async fn with_retry<T, F, Fut>(config: &AppConfig, data_type: &str, mut op: F) -> Result<T, EtlError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EtlError>>,
{
    let max_retries = config.ingestion.max_retries;
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "🔁 {} failed (retry {}/{}): {}",
                    data_type,
                    attempt,
                    max_retries,
                    e
                );
                tokio::time::sleep(config.retry_delay()).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn print_report(report: &RunReport) {
    println!(
        "✅ {}: extracted {} rows → {} (table rows: {})",
        report.data_type, report.rows_extracted, report.artifact_uri, report.rows_loaded
    );
}

fn exit_with(e: &EtlError) -> ! {
    tracing::error!("❌ nfl-etl failed: {} (Severity: {:?})", e, e.severity());
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e);
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
