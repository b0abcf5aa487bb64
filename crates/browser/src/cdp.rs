//! Minimal Chrome DevTools Protocol client over WebSocket.
//!
//! One reader task dispatches command responses to their waiters and events
//! to subscribers; one writer task owns the sink.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;
type Listeners = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>;

pub struct CdpClient {
    ws_tx: mpsc::Sender<String>,
    pending: Pending,
    next_id: AtomicU64,
    event_listeners: Listeners,
    reader_handle: tokio::task::JoinHandle<()>,
    writer_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a page target's debugger WebSocket.
    pub async fn connect(ws_url: &str) -> Result<Self, String> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| format!("Failed to connect to CDP endpoint {}: {}", ws_url, e))?;

        let (mut ws_sink, mut ws_read) = ws_stream.split();
        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let pending_reader = pending.clone();
        let event_listeners: Listeners = Arc::new(Mutex::new(HashMap::new()));
        let events_reader = event_listeners.clone();

        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(msg)).await {
                    error!("CDP WebSocket write error: {}", e);
                    break;
                }
            }
        });

        let reader_handle = tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let Ok(val) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        if let Some(id) = val.get("id").and_then(|v| v.as_u64()) {
                            if let Some(tx) = pending_reader.lock().await.remove(&id) {
                                let _ = tx.send(val);
                            }
                        } else if let Some(method) = val.get("method").and_then(|v| v.as_str()) {
                            let listeners = events_reader.lock().await;
                            if let Some(senders) = listeners.get(method) {
                                let params = val.get("params").cloned().unwrap_or(Value::Null);
                                for tx in senders {
                                    let _ = tx.try_send(params.clone());
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by browser");
                        break;
                    }
                    Err(e) => {
                        warn!("CDP WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            event_listeners,
            reader_handle,
            writer_handle,
        })
    }

    /// Send a command and wait for its result.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let msg = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        self.ws_tx
            .send(msg.to_string())
            .await
            .map_err(|e| format!("Failed to send CDP command: {}", e))?;

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.get("error") {
                    Err(format!("CDP error: {}", error))
                } else {
                    Ok(response.get("result").cloned().unwrap_or(Value::Null))
                }
            }
            Ok(Err(_)) => Err("CDP response channel closed".to_string()),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(format!(
                    "CDP command '{}' timed out after {}s",
                    method,
                    COMMAND_TIMEOUT.as_secs()
                ))
            }
        }
    }

    pub async fn subscribe_event(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(64);
        add_listener(&mut *self.event_listeners.lock().await, method, tx);
        rx
    }

    pub async fn enable_domain(&self, domain: &str) -> Result<(), String> {
        self.send_command(&format!("{}.enable", domain), json!({}))
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<Value, String> {
        let result = self.send_command("Page.navigate", json!({"url": url})).await?;
        if let Some(err) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(format!("navigation to {} failed: {}", url, err));
        }
        Ok(result)
    }

    /// Evaluate an expression and return its JSON value.
    ///
    /// Script exceptions are reported as errors rather than as values.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, String> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .or_else(|| details.get("text").and_then(|t| t.as_str()))
                .unwrap_or("script exception");
            return Err(format!("JS: {}", text));
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Insert text into the focused element.
    pub async fn insert_text(&self, text: &str) -> Result<(), String> {
        self.send_command("Input.insertText", json!({"text": text}))
            .await?;
        Ok(())
    }

    /// Press and release Enter on the focused element.
    pub async fn press_enter(&self) -> Result<(), String> {
        for event_type in ["keyDown", "keyUp"] {
            let mut params = json!({
                "type": event_type,
                "key": "Enter",
                "code": "Enter",
                "windowsVirtualKeyCode": 13,
            });
            if event_type == "keyDown" {
                params["text"] = json!("\r");
            }
            self.send_command("Input.dispatchKeyEvent", params).await?;
        }
        Ok(())
    }

    /// Returns (current index, entry ids) of the session history.
    pub async fn navigation_history(&self) -> Result<(usize, Vec<i64>), String> {
        let result = self
            .send_command("Page.getNavigationHistory", json!({}))
            .await?;
        let current = result
            .get("currentIndex")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| "navigation history has no currentIndex".to_string())?;
        let ids = result
            .get("entries")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|e| e.get("id").and_then(|v| v.as_i64()))
                    .collect()
            })
            .unwrap_or_default();
        Ok((current as usize, ids))
    }

    pub async fn navigate_to_history_entry(&self, entry_id: i64) -> Result<(), String> {
        self.send_command(
            "Page.navigateToHistoryEntry",
            json!({"entryId": entry_id}),
        )
        .await?;
        Ok(())
    }

    pub async fn close_browser(&self) -> Result<(), String> {
        self.send_command("Browser.close", json!({})).await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

/// Register `tx` for `method`, dropping senders whose receivers are gone.
fn add_listener(
    listeners: &mut HashMap<String, Vec<mpsc::Sender<Value>>>,
    method: &str,
    tx: mpsc::Sender<Value>,
) {
    let senders = listeners.entry(method.to_string()).or_default();
    senders.retain(|s| !s.is_closed());
    senders.push(tx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_listener_prunes_dropped_receivers() {
        let mut listeners = HashMap::new();
        for _ in 0..5 {
            let (tx, rx) = mpsc::channel(1);
            add_listener(&mut listeners, "Page.loadEventFired", tx);
            drop(rx);
        }
        let (tx, _rx) = mpsc::channel(1);
        add_listener(&mut listeners, "Page.loadEventFired", tx);

        let senders = &listeners["Page.loadEventFired"];
        assert_eq!(senders.len(), 1);
        assert!(!senders[0].is_closed());
    }

    #[test]
    fn test_add_listener_keeps_live_receivers() {
        let mut listeners = HashMap::new();
        let (tx_a, _rx_a) = mpsc::channel(1);
        let (tx_b, _rx_b) = mpsc::channel(1);
        add_listener(&mut listeners, "Page.loadEventFired", tx_a);
        add_listener(&mut listeners, "Page.loadEventFired", tx_b);
        assert_eq!(listeners["Page.loadEventFired"].len(), 2);
    }
}
