//! Line-oriented command transport.
//!
//! Reads one JSON command per line, e.g.
//! `{"methodName": "MoveJControlCommand", "payload": "[0, 0, 0, 0, 0, 0]"}`,
//! and writes one JSON response per line. Every command is handled on its own
//! task, so a slow session operation does not hold up later lines.

use std::future::Future;
use std::sync::Arc;

use cobotlink_control::{CommandAcknowledgement, CommandRouter, ControlError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Inbound command line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundCommand {
    pub method_name: String,
    #[serde(default)]
    pub payload: Value,
}

/// Outbound response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub method_name: String,
    pub status: u16,
    pub payload: Value,
}

impl CommandResponse {
    /// Build the response for a handled command.
    pub fn from_result(
        method_name: String,
        result: Result<CommandAcknowledgement, ControlError>,
    ) -> Self {
        match result {
            Ok(ack) => Self {
                method_name,
                status: 200,
                payload: ack.to_json(),
            },
            Err(e) => Self {
                method_name,
                status: status_for(&e),
                payload: json!({ "Error": e.to_string() }),
            },
        }
    }

    fn bad_request(error: String) -> Self {
        Self {
            method_name: String::new(),
            status: 400,
            payload: json!({ "Error": error }),
        }
    }
}

fn status_for(error: &ControlError) -> u16 {
    match error {
        ControlError::UnknownMethod(_) => 404,
        ControlError::SessionNotReady { .. } => 409,
        ControlError::DriverUnavailable(_) => 503,
        // The router acknowledges every other kind
        _ => 500,
    }
}

/// Serve commands from `input` until it ends or `shutdown` resolves, then
/// wait for handlers that are still running.
pub async fn serve<R, W, S>(
    router: Arc<CommandRouter>,
    input: R,
    output: W,
    shutdown: S,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Future<Output = ()>,
{
    let (tx, rx) = mpsc::channel::<CommandResponse>(64);
    let writer = tokio::spawn(write_responses(output, rx));
    let mut handlers = JoinSet::new();

    let received = receive(router, input, &tx, shutdown, &mut handlers).await;

    while let Some(joined) = handlers.join_next().await {
        log_handler_exit(joined);
    }
    drop(tx);
    writer.await??;
    received
}

/// Read command lines and spawn a handler per command. Finished handlers are
/// reaped as they complete; the ones still running are left in `handlers`.
async fn receive<R, S>(
    router: Arc<CommandRouter>,
    input: R,
    tx: &mpsc::Sender<CommandResponse>,
    shutdown: S,
    handlers: &mut JoinSet<()>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Command reception stopping");
                return Ok(());
            }
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                log_handler_exit(joined);
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Command input closed");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }

                let inbound: InboundCommand = match serde_json::from_str(&line) {
                    Ok(inbound) => inbound,
                    Err(e) => {
                        warn!(error = %e, "Discarding malformed command line");
                        let _ = tx.send(CommandResponse::bad_request(e.to_string())).await;
                        continue;
                    }
                };

                let router = router.clone();
                let tx = tx.clone();
                handlers.spawn(async move {
                    debug!(method = %inbound.method_name, "Command received");
                    let result = router.handle(&inbound.method_name, &inbound.payload).await;
                    let response = CommandResponse::from_result(inbound.method_name, result);
                    if tx.send(response).await.is_err() {
                        error!("Response writer gone, dropping response");
                    }
                });
            }
        }
    }
}

fn log_handler_exit(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Command handler task failed");
    }
}

async fn write_responses<W>(mut output: W, mut rx: mpsc::Receiver<CommandResponse>) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobotlink_control::{ControlEventBus, ControlSession, SimulatedConnector};
    use std::time::Duration;

    fn router() -> Arc<CommandRouter> {
        let connector = Arc::new(SimulatedConnector::new("127.0.0.1", Duration::from_millis(5)));
        let events = Arc::new(ControlEventBus::default());
        Arc::new(CommandRouter::new(Arc::new(ControlSession::new(connector, events))))
    }

    async fn run(router: Arc<CommandRouter>, input: &str) -> Vec<CommandResponse> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        serve(router, input.as_bytes(), server, std::future::pending())
            .await
            .unwrap();

        let mut out = String::new();
        let mut reader = tokio::io::BufReader::new(client);
        let mut line = String::new();
        while reader.read_line(&mut line).await.unwrap() > 0 {
            out.push_str(&line);
            line.clear();
        }
        out.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_enable_line_acknowledged() {
        let router = router();
        let responses = run(
            router.clone(),
            "{\"methodName\": \"EnableControlCommand\", \"payload\": null}\n",
        )
        .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].method_name, "EnableControlCommand");
        assert_eq!(responses[0].status, 200);
        assert!(responses[0].payload["StartTime"].is_string());
        assert!(router.session().has_driver());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let responses = run(
            router(),
            concat!(
                "not json\n",
                "\n",
                "{\"methodName\": \"StopCobotCommand\"}\n",
            ),
        )
        .await;

        let mut statuses: Vec<u16> = responses.iter().map(|r| r.status).collect();
        statuses.sort_unstable();
        assert_eq!(statuses, vec![400, 404]);
    }

    #[tokio::test]
    async fn test_motion_without_session_is_conflict() {
        let responses = run(
            router(),
            "{\"methodName\": \"MoveJControlCommand\", \"payload\": \"[0,0,0,0,0,0]\"}\n",
        )
        .await;

        assert_eq!(responses[0].status, 409);
        assert!(responses[0].payload["Error"].as_str().unwrap().contains("not ready"));
    }

    #[tokio::test]
    async fn test_finished_handlers_reaped_while_running() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let (tx, mut rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let mut handlers = JoinSet::new();

        let received = receive(
            router(),
            tokio::io::BufReader::new(server),
            &tx,
            async {
                let _ = stop_rx.await;
            },
            &mut handlers,
        );
        let feed = async {
            for _ in 0..20 {
                client
                    .write_all(b"{\"methodName\": \"StartIotCommand\"}\n")
                    .await
                    .unwrap();
            }
            for _ in 0..20 {
                let response: CommandResponse = rx.recv().await.unwrap();
                assert_eq!(response.status, 404);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop_tx.send(()).unwrap();
        };

        let (result, ()) = tokio::join!(received, feed);
        result.unwrap();
        // Nothing left for the final drain
        assert!(handlers.is_empty());
    }

    #[test]
    fn test_status_mapping() {
        use cobotlink_control::{DriverError, PayloadError, SessionState};

        let cases = [
            (ControlError::UnknownMethod("x".into()), 404),
            (
                ControlError::SessionNotReady {
                    operation: "pause",
                    state: SessionState::Disabled,
                },
                409,
            ),
            (ControlError::DriverUnavailable(DriverError::Closed), 503),
            (ControlError::InvalidPayload(PayloadError::WrongArity(3)), 500),
            (ControlError::GuardBusy { method: "MoveJControlCommand" }, 500),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{}", error);
        }
    }
}
