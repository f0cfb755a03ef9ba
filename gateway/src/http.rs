//! JSON-RPC gateway client over HTTP.
//!
//! Talks to a gateway relay that fronts the chain node: it executes batched
//! view calls, signs and submits writes for the connected account, and keeps
//! a cursor-addressed log of confirmed staking events. Each request is a JSON
//! object carrying an `action` field; responses put the payload under
//! `result` or report `error`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    AbiValue, ChainEvent, ChainGateway, EventFilter, EventSubscription, GatewayError, ReadCall,
    ReadResult, TxHandle, WriteCall,
};

/// Buffered events per subscription before the poller waits on the consumer.
const SUBSCRIPTION_BUFFER: usize = 64;

/// Connection settings for [`HttpGateway`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Relay endpoint URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Interval between event polls for each subscription.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_url() -> String {
    "http://127.0.0.1:8645".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum CallOutcome {
    Ok(AbiValue),
    Error(String),
}

#[derive(Deserialize)]
struct WriteResult {
    hash: String,
}

#[derive(Deserialize)]
struct EventPage {
    #[serde(default)]
    events: Vec<ChainEvent>,
    cursor: u64,
}

/// HTTP client for a gateway relay.
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    url: String,
    poll_interval: Duration,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        if config.url.trim().is_empty() {
            return Err(GatewayError::Config("gateway url is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: config.url.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        })
    }

    /// The configured relay URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one request and return its `result` field.
    async fn rpc_call(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut body = params;
        body.as_object_mut()
            .ok_or_else(|| GatewayError::Decode("params must be a JSON object".into()))?
            .insert("action".to_string(), serde_json::json!(action));

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("{action}: request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::Transport(format!(
                "{action}: gateway returned HTTP {}",
                response.status()
            )));
        }

        let mut json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("{action}: invalid JSON response: {e}")))?;

        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            return Err(GatewayError::Transport(format!("{action}: {err}")));
        }

        json.get_mut("result")
            .map(serde_json::Value::take)
            .ok_or_else(|| GatewayError::Decode(format!("{action}: response has no result")))
    }

    async fn poll_events(
        &self,
        filter: &EventFilter,
        cursor: Option<u64>,
    ) -> Result<EventPage, GatewayError> {
        let result = self
            .rpc_call(
                "poll_events",
                serde_json::json!({ "filter": filter, "cursor": cursor }),
            )
            .await?;
        serde_json::from_value(result)
            .map_err(|e| GatewayError::Decode(format!("invalid poll_events response: {e}")))
    }

    /// Poll loop feeding one subscription until its receiver is dropped.
    /// Starts after `cursor`, the relay head seen at subscribe time.
    async fn run_poller(self, filter: EventFilter, cursor: u64, tx: mpsc::Sender<ChainEvent>) {
        let mut cursor = Some(cursor);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = ticker.tick() => {}
            }
            match self.poll_events(&filter, cursor).await {
                Ok(page) => {
                    cursor = Some(page.cursor);
                    for event in page.events.into_iter().filter(|e| filter.matches(e)) {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!(event = %filter.kind, error = %e, "event poll failed"),
            }
        }
        debug!(event = %filter.kind, "event poller stopped");
    }
}

#[async_trait]
impl ChainGateway for HttpGateway {
    async fn read_batch(&self, calls: Vec<ReadCall>) -> Result<Vec<ReadResult>, GatewayError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let expected = calls.len();
        let functions: Vec<String> = calls.iter().map(|c| c.function.clone()).collect();

        let result = self
            .rpc_call("read_batch", serde_json::json!({ "calls": calls }))
            .await?;
        let outcomes: Vec<CallOutcome> = serde_json::from_value(result)
            .map_err(|e| GatewayError::Decode(format!("invalid read_batch response: {e}")))?;

        if outcomes.len() != expected {
            return Err(GatewayError::Decode(format!(
                "read_batch returned {} results for {expected} calls",
                outcomes.len()
            )));
        }

        Ok(outcomes
            .into_iter()
            .zip(functions)
            .map(|(outcome, function)| match outcome {
                CallOutcome::Ok(value) => Ok(value),
                CallOutcome::Error(reason) => Err(GatewayError::Call { function, reason }),
            })
            .collect())
    }

    async fn write(&self, call: WriteCall) -> Result<TxHandle, GatewayError> {
        let function = call.function.clone();
        let result = self
            .rpc_call("send_transaction", serde_json::json!({ "call": call }))
            .await
            .map_err(|e| match e {
                GatewayError::Transport(msg) => GatewayError::Rejected(msg),
                other => other,
            })?;
        let written: WriteResult = serde_json::from_value(result)
            .map_err(|e| GatewayError::Decode(format!("invalid send_transaction response: {e}")))?;
        debug!(%function, hash = %written.hash, "transaction dispatched");
        Ok(TxHandle::new(written.hash))
    }

    /// Only events logged after this call are delivered. The first page
    /// (no cursor) is history and is read just for its cursor.
    async fn subscribe(&self, filter: EventFilter) -> Result<EventSubscription, GatewayError> {
        let head = self.poll_events(&filter, None).await?;
        debug!(
            event = %filter.kind,
            cursor = head.cursor,
            skipped = head.events.len(),
            "event subscription anchored"
        );
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let producer = tokio::spawn(self.clone().run_poller(filter.clone(), head.cursor, tx));
        Ok(EventSubscription::with_producer(filter, rx, producer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;
    use carbonfi_types::{AccountAddress, PeriodId, TokenAmount};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn staking() -> AccountAddress {
        AccountAddress::new([0xAA; 20])
    }

    fn account() -> AccountAddress {
        AccountAddress::new([0x01; 20])
    }

    fn staked(block: u64) -> ChainEvent {
        ChainEvent {
            contract: staking(),
            kind: EventKind::Staked,
            account: account(),
            period: PeriodId::new(60).unwrap(),
            amount: TokenAmount::new(100),
            tx: None,
            block_number: Some(block),
        }
    }

    /// Body of one HTTP/1.1 request.
    async fn read_body(socket: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return Vec::new();
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return buf[end + 4..end + 4 + len].to_vec();
            }
        }
    }

    /// A relay answering every request with `respond(request)`.
    /// Returns its URL and the log of requests received.
    async fn serve_relay(respond: fn(&Value) -> Value) -> (String, Arc<Mutex<Vec<Value>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let request: Value = serde_json::from_slice(&read_body(&mut socket).await).unwrap();
                let reply = serde_json::to_vec(&respond(&request)).unwrap();
                log.lock().unwrap().push(request);
                let head = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n",
                    reply.len()
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                socket.write_all(&reply).await.unwrap();
            }
        });
        (url, requests)
    }

    #[test]
    fn config_defaults_apply_to_empty_toml() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.url, "http://127.0.0.1:8645");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.poll_interval_ms, 2_000);
    }

    #[test]
    fn empty_url_is_a_config_error() {
        let config = GatewayConfig {
            url: "  ".into(),
            ..GatewayConfig::default()
        };
        assert!(matches!(HttpGateway::new(&config), Err(GatewayError::Config(_))));
    }

    #[test]
    fn call_outcomes_decode_per_entry() {
        let json = serde_json::json!([
            { "ok": { "uint": "5" } },
            { "error": "execution reverted" }
        ]);
        let outcomes: Vec<CallOutcome> = serde_json::from_value(json).unwrap();
        assert!(matches!(outcomes[0], CallOutcome::Ok(AbiValue::Uint(5))));
        assert!(matches!(&outcomes[1], CallOutcome::Error(r) if r == "execution reverted"));
    }

    #[tokio::test]
    async fn empty_batch_skips_the_round_trip() {
        let gateway = HttpGateway::new(&GatewayConfig {
            url: "http://127.0.0.1:1".into(),
            ..GatewayConfig::default()
        })
        .unwrap();
        assert!(gateway.read_batch(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_relay_is_a_transport_error() {
        let gateway = HttpGateway::new(&GatewayConfig {
            url: "http://127.0.0.1:1".into(),
            request_timeout_secs: 2,
            ..GatewayConfig::default()
        })
        .unwrap();
        let call = ReadCall::new(AccountAddress::ZERO, "getAvailablePeriods", Vec::new());
        let err = gateway.read_batch(vec![call]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn subscription_skips_events_logged_before_subscribe() {
        fn relay(request: &Value) -> Value {
            let page = match request["cursor"].as_u64() {
                None => json!({ "events": [staked(1)], "cursor": 7 }),
                Some(7) => json!({ "events": [staked(2)], "cursor": 8 }),
                Some(_) => json!({ "events": [], "cursor": 8 }),
            };
            json!({ "result": page })
        }
        let (url, requests) = serve_relay(relay).await;
        let gateway = HttpGateway::new(&GatewayConfig {
            url,
            request_timeout_secs: 5,
            poll_interval_ms: 10,
        })
        .unwrap();

        let filter = EventFilter::new(staking(), EventKind::Staked, Some(account()));
        let mut subscription = gateway.subscribe(filter).await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), subscription.next_event())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.block_number, Some(2));

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0]["action"], "poll_events");
        assert!(requests[0]["cursor"].is_null());
        assert_eq!(requests[1]["cursor"], 7);
    }
}
