//! Connection manager
//!
//! Owns the physical websocket and its lifecycle. Only this module touches
//! the socket and only this module decides when to retry. Connection failures
//! are never fatal to the process: every close schedules another attempt with
//! a capped, linearly growing delay, indefinitely, so the client survives
//! arbitrary backend restarts.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::correlator::Correlator;
use crate::queue::OutboundQueue;
use crate::types::LinkState;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;

/// Reconnect delay for the given retry count: `min(base * retries, max)`.
fn reconnect_delay(config: &Config, retry_count: u32) -> Duration {
    config
        .base_delay
        .saturating_mul(retry_count)
        .min(config.max_delay)
}

/// Publish a state change. `send_if_modified` keeps repeat transitions (and
/// the UI's reconnecting indicator) idempotent.
fn set_state(state: &watch::Sender<LinkState>, next: LinkState) {
    state.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

/// Long-running connection task. Runs until the owning
/// [`Client`](crate::Client) is dropped.
pub(crate) async fn connection_loop(
    config: Config,
    queue: Arc<OutboundQueue>,
    correlator: Arc<Correlator>,
    state: watch::Sender<LinkState>,
) {
    let mut retry_count: u32 = 0;

    loop {
        set_state(&state, LinkState::Connecting);
        info!(endpoint = %config.endpoint, "connecting");

        match connect_async(config.endpoint.as_str()).await {
            Ok((socket, _)) => {
                retry_count = 0;
                set_state(&state, LinkState::Open);
                info!("channel open");

                if let Err(e) = run_channel(socket, &queue, &correlator).await {
                    warn!("channel error: {e}");
                }
                info!("channel closed");
            }
            Err(e) => {
                error!("connect failed: {e}");
            }
        }

        set_state(&state, LinkState::Closed);
        retry_count += 1;
        let delay = reconnect_delay(&config, retry_count);
        warn!(?delay, retry_count, "reconnecting");
        tokio::time::sleep(delay).await;
    }
}

/// Drive one open channel epoch: flush the backlog first, then shuttle frames
/// until the socket dies.
async fn run_channel(
    socket: Socket,
    queue: &OutboundQueue,
    correlator: &Correlator,
) -> Result<(), WsError> {
    let (mut sink, mut stream) = socket.split();

    // Everything queued while disconnected goes out before any other work
    flush_queued(&mut sink, queue).await?;

    loop {
        tokio::select! {
            _ = queue.wait() => flush_queued(&mut sink, queue).await?,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => correlator.receive(&text),
                Some(Ok(Message::Ping(payload))) => sink.send(Message::Pong(payload)).await?,
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "close frame received");
                    return Ok(());
                }
                Some(Ok(_)) => debug!("ignoring non-text frame"),
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
        }
    }
}

/// Send every frame queued before this flush began, in submission order. On a
/// send error the unsent remainder goes back to the head of the queue for the
/// next epoch.
async fn flush_queued(sink: &mut SocketSink, queue: &OutboundQueue) -> Result<(), WsError> {
    let mut batch = queue.take_batch();
    while let Some(frame) = batch.pop_front() {
        if let Err(e) = sink.send(Message::Text(frame.clone())).await {
            batch.push_front(frame);
            queue.requeue_front(batch);
            return Err(e);
        }
    }
    Ok(())
}
