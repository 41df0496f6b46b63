// ABOUTME: Entry point for the auditlog binary.
// ABOUTME: Loads configuration, wires the storage backend, and runs the HTTP server or the function runtime.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use auditlog_core::{TracingTelemetry, describe_counters};
use auditlog_server::{AppState, AuditlogConfig, Backend, FunctionHandler, FunctionRequest, SharedState};
use auditlog_store::{
    AwsTableClient, DynamoConfig, DynamoRepository, MemoryRepository, OpContext, SharedRepository,
};
use clap::{Parser, Subcommand};
use lambda_runtime::{LambdaEvent, service_fn};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "auditlog")]
#[command(about = "Audit log of status events with TTL, over HTTP or as a serverless function", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Run inside a serverless function runtime, one request per invocation
    Function,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let function_mode = matches!(cli.command, Some(Commands::Function));

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("auditlog=debug,tower_http=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!function_mode)
        .init();

    let config = AuditlogConfig::from_env().context("loading configuration")?;
    tracing::info!(backend = ?config.backend, table = %config.table, "auditlog starting up");

    if let Some(addr) = config.metrics_bind {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing metrics exporter")?;
        describe_counters();
        tracing::info!("metrics exported on {}", addr);
    }

    let repository = build_repository(&config).await?;
    repository
        .create(&OpContext::background())
        .await
        .context("initializing storage")?;

    let state: SharedState = Arc::new(
        AppState::new(repository)
            .with_telemetry(Arc::new(TracingTelemetry::new("auditlog")))
            .with_request_timeout(config.request_timeout),
    );

    if function_mode {
        run_function(state).await
    } else {
        run_server(&config, state).await
    }
}

async fn build_repository(config: &AuditlogConfig) -> anyhow::Result<SharedRepository> {
    match config.backend {
        Backend::Memory => Ok(Arc::new(
            MemoryRepository::new(config.record_ttl)
                .with_telemetry(Arc::new(TracingTelemetry::new("memorydb"))),
        )),
        Backend::DynamoDb => {
            let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
            if let Some(endpoint) = &config.dynamodb_endpoint {
                tracing::info!(%endpoint, "using DynamoDB endpoint override");
                builder = builder.endpoint_url(endpoint);
            }
            let client = aws_sdk_dynamodb::Client::from_conf(builder.build());

            let dynamo_config = DynamoConfig {
                table: config.table.clone(),
                ttl: config.record_ttl,
                ..DynamoConfig::default()
            };
            Ok(Arc::new(
                DynamoRepository::new(Arc::new(AwsTableClient::new(client)), dynamo_config)
                    .with_telemetry(Arc::new(TracingTelemetry::new("dynamodb"))),
            ))
        }
    }
}

async fn run_server(config: &AuditlogConfig, state: SharedState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!("listening on {}", config.bind);

    auditlog_server::serve(listener, state, shutdown_signal(), config.shutdown_grace)
        .await
        .context("serving HTTP")?;

    tracing::info!("auditlog stopped");
    Ok(())
}

async fn run_function(state: SharedState) -> anyhow::Result<()> {
    let handler = FunctionHandler::new(state);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<FunctionRequest>| {
        let handler = handler.clone();
        async move {
            let ctx = invocation_context(event.context.deadline);
            Ok::<_, lambda_runtime::Error>(handler.handle(event.payload, &ctx).await)
        }
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
}

/// Bound an invocation's storage work by the runtime deadline (epoch millis).
fn invocation_context(deadline_ms: u64) -> OpContext {
    let ctx = OpContext::background();
    if deadline_ms == 0 {
        return ctx;
    }
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    ctx.with_timeout(Duration::from_millis(deadline_ms.saturating_sub(now_ms)))
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
