//! Test JSON-lines client.
//!
//! Sends gateway requests and separates replies from subscription events.

use serde_json::{Value, json};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A test gateway client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    next_id: u64,
    /// Events that arrived while waiting for a reply.
    pending_events: VecDeque<Value>,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(address: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            next_id: 1,
            pending_events: VecDeque::new(),
        })
    }

    /// Send a raw line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single JSON document from the server.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a JSON document with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Value> {
        let mut line = String::new();
        let read = timeout(dur, self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }

    /// Issue a call and wait for its reply, buffering any events seen meanwhile.
    pub async fn call(&mut self, procedure: &str, args: Value) -> anyhow::Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        let request = json!({"id": id, "procedure": procedure, "args": args});
        self.send_raw(&request.to_string()).await?;

        loop {
            let doc = self.recv().await?;
            if doc.get("event").is_some() {
                self.pending_events.push_back(doc);
                continue;
            }
            anyhow::ensure!(doc["id"] == json!(id), "reply for unexpected id: {doc}");
            return Ok(doc);
        }
    }

    /// Issue a call that must succeed and return its `result`.
    pub async fn call_ok(&mut self, procedure: &str, args: Value) -> anyhow::Result<Value> {
        let reply = self.call(procedure, args).await?;
        if let Some(error) = reply.get("error") {
            anyhow::bail!("{procedure} failed: {error}");
        }
        Ok(reply["result"].clone())
    }

    /// Next subscription event.
    pub async fn recv_event(&mut self) -> anyhow::Result<Value> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(event);
        }
        loop {
            let doc = self.recv().await?;
            if doc.get("event").is_some() {
                return Ok(doc);
            }
        }
    }

    /// Send a message to a channel.
    pub async fn send_message(
        &mut self,
        channel: impl Into<Value>,
        author: &str,
        message: &str,
    ) -> anyhow::Result<()> {
        self.call_ok(
            "message.send",
            json!({"channel": channel.into(), "author": author, "message": message}),
        )
        .await?;
        Ok(())
    }

    /// Fetch history as (author, message) pairs, newest first.
    pub async fn history(
        &mut self,
        channel: impl Into<Value>,
        lines: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<(String, String)>> {
        let result = self
            .call_ok(
                "history.get",
                json!({"channel": channel.into(), "lines": lines, "offset": offset}),
            )
            .await?;
        let records: Vec<Value> = serde_json::from_value(result)?;
        Ok(records
            .into_iter()
            .map(|r| {
                (
                    r["author"].as_str().unwrap_or_default().to_string(),
                    r["message"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect())
    }

    /// Subscribe to a channel's live messages.
    pub async fn subscribe(&mut self, channel: impl Into<Value>) -> anyhow::Result<()> {
        self.call_ok("channel.subscribe", json!({"channel": channel.into()}))
            .await?;
        Ok(())
    }
}
