//! Monitor Pipeline (C8): poller, consumer, and optional server tasks sharing a
//! cancellation signal.

use std::time::Duration;

use futures::future::join_all;
use log::{error, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::PiclError;
use crate::node::Node;

use super::client::TelemetryClient;
use super::display::DisplayHandler;

use super::AgentResponse;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const CHANNEL_CAPACITY: usize = 32;

/// One telemetry client bound to a node, paired with the node's display index/name.
struct PolledNode {
    index: usize,
    name: String,
    client: TelemetryClient,
}

/// Builds one [`TelemetryClient`] per node with an agent configured, logging in
/// synchronously where the node declares agent credentials. A login failure aborts
/// initialization, per §4.8.
async fn build_clients(nodes: &[Node]) -> Result<Vec<PolledNode>, PiclError> {
    let mut polled = Vec::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        let Some(base_url) = node.agent_base_url() else {
            continue;
        };
        let mut client = TelemetryClient::new(base_url);
        if let Some(agent) = node.agent.as_ref() {
            if let Some(auth) = agent.auth_data.as_ref() {
                client.login(auth).await?;
            }
        }
        polled.push(PolledNode {
            index,
            name: node.name.clone(),
            client,
        });
    }
    Ok(polled)
}

/// Runs the poller/consumer task group until `token` is cancelled or the handler
/// reports an error. Returns `Ok(())` on a clean (including cancelled) shutdown.
pub async fn run(
    nodes: &[Node],
    handler: &mut DisplayHandler,
    token: CancellationToken,
) -> Result<(), PiclError> {
    let polled = build_clients(nodes).await?;
    let (tx, mut rx) = mpsc::channel::<AgentResponse>(CHANNEL_CAPACITY);
    let key_watcher = handler.watch_keys(token.clone());

    let poller = poll_loop(polled, tx, token.clone());
    let consumer = async {
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                msg = rx.recv() => {
                    match msg {
                        Some(response) => {
                            if let Err(err) = handler.handle(&response) {
                                error!("display handler error: {err}");
                                token.cancel();
                                return Err(err);
                            }
                        }
                        None => return Ok(()),
                    }
                }
            }
        }
    };

    let (_, consumer_result) = tokio::join!(poller, consumer);
    if let Some(key_watcher) = key_watcher {
        key_watcher.abort();
    }
    handler.close();
    consumer_result
}

async fn poll_loop(
    polled: Vec<PolledNode>,
    tx: mpsc::Sender<AgentResponse>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        join_all(polled.iter().map(|node| poll_one(node, &tx))).await;
    }
}

async fn poll_one(node: &PolledNode, tx: &mpsc::Sender<AgentResponse>) {
    let result = node.client.cur().await.map_err(|e| e.to_string());
    let response = AgentResponse {
        index: node.index,
        name: node.name.clone(),
        result,
    };
    if tx.send(response).await.is_err() {
        warn!("telemetry channel closed; dropping sample for {}", node.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::display::SilentHandler;

    #[tokio::test]
    async fn pipeline_with_no_agent_nodes_shuts_down_on_cancel() {
        let token = CancellationToken::new();
        let mut handler = DisplayHandler::Silent(SilentHandler::default());
        token.cancel();
        let result = run(&[], &mut handler, token).await;
        assert!(result.is_ok());
    }
}
