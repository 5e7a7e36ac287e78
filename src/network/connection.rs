//! Per-client connection handling.
//!
//! Reads newline-delimited JSON requests, answers each in order, and
//! interleaves events from the channels the client subscribed to.

use super::protocol::{
    CallError, GET_HISTORY, HistoryArgs, Reply, Request, SEND_MESSAGE, SUBSCRIBE, SendArgs,
    SubscribeArgs, parse_args,
};
use crate::history::ChannelId;
use crate::metrics;
use crate::relay::Relay;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Events queued for one client before forwarders start waiting.
const EVENT_QUEUE: usize = 64;

pub struct Connection {
    addr: SocketAddr,
    relay: Arc<Relay>,
    max_line_length: usize,
    subscriptions: HashSet<ChannelId>,
    forwarders: JoinSet<()>,
}

impl Connection {
    pub fn new(addr: SocketAddr, relay: Arc<Relay>, max_line_length: usize) -> Self {
        Self {
            addr,
            relay,
            max_line_length,
            subscriptions: HashSet::new(),
            forwarders: JoinSet::new(),
        }
    }

    /// Serve the client until it disconnects.
    pub async fn run(mut self, stream: TcpStream) -> anyhow::Result<()> {
        let framed = Framed::new(stream, LinesCodec::new_with_max_length(self.max_line_length));
        let (mut sink, mut lines) = framed.split::<String>();
        let (event_tx, mut event_rx) = mpsc::channel::<Reply>(EVENT_QUEUE);

        metrics::client_connected();
        info!(addr = %self.addr, "Client connected");

        let outcome = async {
            loop {
                tokio::select! {
                    line = lines.next() => {
                        let reply = match line {
                            None => break,
                            Some(Ok(line)) if line.trim().is_empty() => continue,
                            Some(Ok(line)) => self.handle_line(&line, &event_tx).await,
                            // The framed stream ends after a decode error.
                            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                                warn!(addr = %self.addr, "Request line too long, closing");
                                let reply = Reply::error(None, &CallError::LineTooLong);
                                sink.send(serde_json::to_string(&reply)?).await?;
                                break;
                            }
                            Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
                        };
                        sink.send(serde_json::to_string(&reply)?).await?;
                    }
                    Some(event) = event_rx.recv() => {
                        sink.send(serde_json::to_string(&event)?).await?;
                    }
                }
            }
            Ok::<(), anyhow::Error>(())
        }
        .await;

        self.forwarders.shutdown().await;
        for channel in &self.subscriptions {
            self.relay.release(channel);
        }
        metrics::client_disconnected();
        info!(addr = %self.addr, "Client disconnected");
        outcome
    }

    async fn handle_line(&mut self, line: &str, events: &mpsc::Sender<Reply>) -> Reply {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => return Reply::error(None, &CallError::Parse(e)),
        };

        let id = request.id;
        debug!(id, procedure = %request.procedure, "Call");
        match self.dispatch(request, events).await {
            Ok(result) => Reply::result(id, result),
            Err(e) => {
                debug!(id, code = e.code(), error = %e, "Call failed");
                Reply::error(Some(id), &e)
            }
        }
    }

    async fn dispatch(
        &mut self,
        request: Request,
        events: &mpsc::Sender<Reply>,
    ) -> Result<Value, CallError> {
        match request.procedure.as_str() {
            SEND_MESSAGE => {
                let args: SendArgs = parse_args(request.args)?;
                self.relay
                    .send_message(&args.channel, &args.author, &args.message)
                    .await?;
                Ok(Value::Null)
            }
            GET_HISTORY => {
                let args: HistoryArgs = parse_args(request.args)?;
                let records = self
                    .relay
                    .get_history(&args.channel, args.lines, args.offset)
                    .await?;
                serde_json::to_value(records).map_err(CallError::Encode)
            }
            SUBSCRIBE => {
                let args: SubscribeArgs = parse_args(request.args)?;
                if self.subscriptions.insert(args.channel.clone()) {
                    self.spawn_forwarder(args.channel, events.clone());
                }
                Ok(Value::Null)
            }
            other => Err(CallError::UnknownProcedure(other.to_string())),
        }
    }

    fn spawn_forwarder(&mut self, channel: ChannelId, events: mpsc::Sender<Reply>) {
        let mut rx = self.relay.subscribe(&channel);
        let addr = self.addr;
        self.forwarders.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(published) => {
                        if events.send(Reply::event(&published)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%addr, %channel, skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
