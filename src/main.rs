use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;

use voice_dispatch::config::{DispatchConfig, WorkflowConfig};
use voice_dispatch::dispatch::DispatchChannel;
use voice_dispatch::pipeline::Pipeline;
use voice_dispatch::workflow::WorkflowClient;

/// How long queued events get to reach the bus before the process exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let dispatch_config = DispatchConfig::from_env()?;
    let workflow_config = WorkflowConfig::from_env()?;

    eprintln!("🎙 voice-dispatch v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Event bus: {}", dispatch_config.endpoint);
    eprintln!(
        "   Workflow: {}",
        workflow_config
            .as_ref()
            .map(|c| c.url.as_str())
            .unwrap_or("disabled (stdin is treated as workflow output)")
    );

    let channel = DispatchChannel::new(dispatch_config);
    if let Err(e) = channel.connect().await {
        tracing::warn!(error = %e, "Event bus unreachable; records will be reported as undelivered");
    }

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;

    let text = match workflow_config {
        Some(config) => WorkflowClient::new(config).run(input.trim()).await?,
        None => input,
    };

    let pipeline = Pipeline::new(Arc::new(channel.clone()));
    let summary = pipeline.run(&text).await;
    println!("{}", summary.render());

    // Queued events only count once they reach the bus.
    let undelivered = channel.drain(DRAIN_TIMEOUT).await;
    if undelivered > 0 {
        tracing::warn!(undelivered, "Exiting with events still in the offline backlog");
        println!("\nNot delivered: {undelivered} queued event(s) never reached the event bus.");
    }
    channel.disconnect().await;

    if summary.transport_failed() || undelivered > 0 {
        std::process::exit(2);
    }
    Ok(())
}
