//! Nullable gateway: scripted reads and events, recorded writes.

use async_trait::async_trait;
use carbonfi_gateway::{
    AbiValue, ChainEvent, ChainGateway, EventFilter, EventSubscription, GatewayError, ReadCall,
    ReadResult, TxHandle, WriteCall,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};

const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Default)]
struct State {
    responses: HashMap<ReadCall, ReadResult>,
    batch_failure: Option<GatewayError>,
    write_failure: Option<GatewayError>,
    batches: Vec<Vec<ReadCall>>,
    writes: Vec<WriteCall>,
    subscribers: Vec<(EventFilter, mpsc::Sender<ChainEvent>)>,
    next_tx: u64,
}

/// Which batches [`NullGateway`] holds back.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ReadGate {
    Open,
    Closed,
    /// Only batches containing a call to this function are held.
    ClosedFor(String),
}

impl ReadGate {
    fn holds(&self, calls: &[ReadCall]) -> bool {
        match self {
            Self::Open => false,
            Self::Closed => true,
            Self::ClosedFor(function) => calls.iter().any(|c| c.function == *function),
        }
    }
}

/// An in-memory [`ChainGateway`] for tests.
///
/// Read results are looked up from a response table keyed by the exact
/// call; an unscripted call fails with [`GatewayError::Call`]. Responses are
/// resolved when the batch arrives, so a test can change the table while a
/// paused batch is still waiting.
pub struct NullGateway {
    state: Mutex<State>,
    gate: watch::Sender<ReadGate>,
    reads_waiting: AtomicUsize,
}

impl NullGateway {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(ReadGate::Open);
        Self {
            state: Mutex::new(State::default()),
            gate,
            reads_waiting: AtomicUsize::new(0),
        }
    }

    /// Script the result of a read call.
    pub fn set_response(&self, call: ReadCall, result: ReadResult) {
        self.state.lock().unwrap().responses.insert(call, result);
    }

    /// Script a successful read.
    pub fn set_value(&self, call: ReadCall, value: AbiValue) {
        self.set_response(call, Ok(value));
    }

    /// Script a per-call failure (e.g. a revert).
    pub fn fail_call(&self, call: ReadCall, reason: &str) {
        let function = call.function.clone();
        self.set_response(
            call,
            Err(GatewayError::Call {
                function,
                reason: reason.to_string(),
            }),
        );
    }

    /// Make every batch fail as a whole (`None` restores normal behaviour).
    pub fn fail_batches(&self, error: Option<GatewayError>) {
        self.state.lock().unwrap().batch_failure = error;
    }

    /// Make the next write fail with `error`.
    pub fn fail_next_write(&self, error: GatewayError) {
        self.state.lock().unwrap().write_failure = Some(error);
    }

    /// Every batch received, in order.
    pub fn batches(&self) -> Vec<Vec<ReadCall>> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn batch_count(&self) -> usize {
        self.state.lock().unwrap().batches.len()
    }

    /// Every write dispatched, in order.
    pub fn writes(&self) -> Vec<WriteCall> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Deliver an event to every live subscription whose filter matches.
    /// Returns how many subscriptions received it.
    pub fn emit(&self, event: ChainEvent) -> usize {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state
            .subscribers
            .iter()
            .filter(|(filter, _)| filter.matches(&event))
            .filter(|(_, tx)| tx.try_send(event.clone()).is_ok())
            .count()
    }

    /// Number of subscriptions still held by a consumer.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state.subscribers.len()
    }

    /// Hold every subsequent batch until [`resume_reads`](Self::resume_reads).
    pub fn pause_reads(&self) {
        self.gate.send_replace(ReadGate::Closed);
    }

    /// Hold only subsequent batches that call `function`.
    pub fn pause_reads_of(&self, function: &str) {
        self.gate.send_replace(ReadGate::ClosedFor(function.to_string()));
    }

    pub fn resume_reads(&self) {
        self.gate.send_replace(ReadGate::Open);
    }

    /// Batches currently held by a pause.
    pub fn reads_waiting(&self) -> usize {
        self.reads_waiting.load(Ordering::SeqCst)
    }
}

impl Default for NullGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainGateway for NullGateway {
    async fn read_batch(&self, calls: Vec<ReadCall>) -> Result<Vec<ReadResult>, GatewayError> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.batches.push(calls.clone());
            match &state.batch_failure {
                Some(err) => Err(err.clone()),
                None => Ok(calls
                    .iter()
                    .map(|call| {
                        state.responses.get(call).cloned().unwrap_or_else(|| {
                            Err(GatewayError::Call {
                                function: call.function.clone(),
                                reason: "no response scripted".into(),
                            })
                        })
                    })
                    .collect()),
            }
        };

        let mut gate = self.gate.subscribe();
        if gate.borrow().holds(&calls) {
            self.reads_waiting.fetch_add(1, Ordering::SeqCst);
            let _ = gate.wait_for(|gate| !gate.holds(&calls)).await;
            self.reads_waiting.fetch_sub(1, Ordering::SeqCst);
        }
        outcome
    }

    async fn write(&self, call: WriteCall) -> Result<TxHandle, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.write_failure.take() {
            return Err(err);
        }
        state.writes.push(call);
        state.next_tx += 1;
        Ok(TxHandle::new(format!("0x{:064x}", state.next_tx)))
    }

    async fn subscribe(&self, filter: EventFilter) -> Result<EventSubscription, GatewayError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.state
            .lock()
            .unwrap()
            .subscribers
            .push((filter.clone(), tx));
        Ok(EventSubscription::new(filter, rx))
    }
}
