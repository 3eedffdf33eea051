//! QLC+ websocket sink
//!
//! Talks to the QLC+ virtual console over its websocket API. Button presses
//! go out as text frames shaped `"<widgetId>|<value>"`.
//!
//! The connection is a lazy singleton: nothing is dialed until the first
//! fire, and a dead connection is noticed and cleared so the next fire dials
//! again. There is deliberately no retry inside a single fire; a cue that
//! cannot reach QLC+ right now is stale by the time a retry would land.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::ActionSink;
use crate::events::ActionId;

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// One live websocket connection plus its reader task
struct QlcConn {
    /// Which connect this is; the reader checks it before clearing the slot
    /// so a stale reader never drops a newer connection
    generation: u64,
    writer: WsWriter,
    reader: JoinHandle<()>,
}

/// Lazily connected QLC+ websocket client.
///
/// All fires share one connection. The slot mutex serializes
/// check-then-connect, so concurrent fires during a cold start produce a
/// single dial instead of a thundering herd.
pub struct QlcSink {
    url: RwLock<String>,
    slot: Arc<Mutex<Option<QlcConn>>>,
    generation: AtomicU64,
    shutdown: AtomicBool,
    connect_attempts: AtomicU64,
}

impl QlcSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: RwLock::new(url.into()),
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            connect_attempts: AtomicU64::new(0),
        }
    }

    /// Point the sink at a different QLC+ endpoint (config reload). The
    /// current connection, if any, is dropped; the next fire dials the new
    /// address.
    pub async fn update_endpoint(&self, url: &str) {
        let changed = {
            let mut current = self.url.write();
            if *current == url {
                false
            } else {
                *current = url.to_string();
                true
            }
        };
        if !changed {
            return;
        }
        info!("🔄 QLC+ endpoint changed to {}", url);
        let mut slot = self.slot.lock().await;
        if let Some(conn) = slot.take() {
            conn.reader.abort();
        }
    }

    /// Total connection attempts so far (successful or not)
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Dial QLC+ once. Failure is logged and yields `None`; the caller drops
    /// whatever it wanted to send.
    async fn open_connection(&self) -> Option<QlcConn> {
        let url = self.url.read().clone();
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        info!("🔌 Connecting to QLC+ at {}", url);

        let (ws, _) = match connect_async(url.as_str()).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("⚠️ QLC+ connection failed: {}", e);
                return None;
            },
        };
        let (writer, mut inbound) = ws.split();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Reader drains inbound frames (QLC+ echoes widget state) and clears
        // the slot when the peer goes away, so the next fire reconnects.
        let slot = Arc::clone(&self.slot);
        let reader = tokio::spawn(async move {
            while let Some(msg) = inbound.next().await {
                match msg {
                    Ok(Message::Text(text)) => debug!("QLC+ says: {}", text),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {},
                    Err(e) => {
                        debug!("QLC+ read error: {}", e);
                        break;
                    },
                }
            }
            warn!("🔌 QLC+ connection closed");
            let mut guard = slot.lock().await;
            if guard.as_ref().is_some_and(|c| c.generation == generation) {
                *guard = None;
            }
        });

        info!("✅ QLC+ websocket connected");
        Some(QlcConn {
            generation,
            writer,
            reader,
        })
    }
}

#[async_trait]
impl ActionSink for QlcSink {
    fn name(&self) -> &str {
        "qlc"
    }

    /// Send one `"<id>|<value>"` frame, connecting first if needed.
    ///
    /// Transport trouble never propagates: an unreachable or freshly dead
    /// QLC+ costs this one fire (logged) and nothing else.
    async fn fire(&self, action: ActionId, value: u8) -> Result<()> {
        let mut slot = self.slot.lock().await;
        // Checked under the slot lock: a fire that was waiting while
        // shutdown ran must not dial a fresh connection.
        if self.shutdown.load(Ordering::SeqCst) {
            debug!("QLC+ sink shut down, dropping action {}", action);
            return Ok(());
        }
        if slot.is_none() {
            *slot = self.open_connection().await;
        }
        let Some(conn) = slot.as_mut() else {
            warn!("⚠️ QLC+ unavailable, dropping action {}", action);
            return Ok(());
        };

        let frame = format!("{}|{}", action, value);
        if let Err(e) = conn.writer.send(Message::Text(frame)).await {
            warn!("⚠️ QLC+ send failed: {} (dropping connection)", e);
            if let Some(dead) = slot.take() {
                dead.reader.abort();
            }
            return Ok(());
        }
        debug!("💡 QLC+ fire {} -> {}", action, value);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Stop the sink: further fires become no-ops, and both halves of the
    /// current connection are released. The reader abort happens even when
    /// the close frame cannot be delivered.
    async fn shutdown(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        let mut slot = self.slot.lock().await;
        if let Some(mut conn) = slot.take() {
            if let Err(e) = conn.writer.send(Message::Close(None)).await {
                debug!("QLC+ close frame not delivered: {}", e);
            }
            conn.reader.abort();
            info!("👋 QLC+ connection released");
        }
        Ok(())
    }
}
