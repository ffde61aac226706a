//! JSON-lines RPC server: one request per stdin line, one response per
//! stdout line. Logs go to stderr.

use confdesk::{
    api::ConferenceApi,
    config::AppConfig,
    core::store::EntityStore,
    persist::{sqlite::SqliteOpSink, OpSink},
    rpc,
    runtime::handle::spawn_store,
    telemetry,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env();
    telemetry::init_tracing(&config.log_filter);

    let (store, sink): (EntityStore, Option<Box<dyn OpSink>>) = match &config.database_path {
        Some(path) => {
            let sink = SqliteOpSink::open(path)?;
            let store = sink.load_store()?;
            info!(path = %path.display(), "journal opened");
            let sink: Box<dyn OpSink> = Box::new(sink);
            (store, Some(sink))
        }
        None => {
            info!("running without a journal; state is lost on exit");
            (EntityStore::new(), None)
        }
    };

    let handle = spawn_store(store, sink, config.runtime.clone());
    let (api, worker) = ConferenceApi::start(handle.clone(), &config);

    let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let api = api.clone();
        let out = out_tx.clone();
        tokio::spawn(async move {
            let response = rpc::handle_line(&api, &line).await;
            match serde_json::to_string(&response) {
                Ok(json) => {
                    let _ = out.send(json).await;
                }
                Err(err) => warn!(error = %err, "response encode failed"),
            }
        });
    }

    // The writer finishes once every in-flight request has replied.
    drop(out_tx);
    drop(api);
    writer.await??;

    worker.abort();
    handle.shutdown().await?;
    info!("shutdown complete");
    Ok(())
}
