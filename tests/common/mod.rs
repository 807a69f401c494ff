//! Shared test utilities and fixtures
//!
//! A scripted native engine that answers calls from its own OS threads, the
//! way a real native runtime reports completions.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use hostbridge_engine::codec;
use hostbridge_engine::types::{ErrorCode, NativeError, TaggedValue};
use hostbridge_engine::{
    Bridge, BridgeConfig, Completion, CompletionSink, MissPolicy, NativeCall, NativeSurface,
};
use tokio::sync::mpsc;

/// Native engine double.
///
/// Methods:
/// - `echo`: completes once with the request payload.
/// - `count`: payload `UInt32(n)`; emits `0..n` as partial events, then a
///   final event without payload.
/// - `fail`: completes once with an `InvalidArgument` error.
/// - `slow`: blocks inside `submit` for `delay`, then behaves like `echo`.
/// - `hold`: accepted and never completed.
/// - anything else: refused at submit time.
#[derive(Default)]
pub struct ScriptedEngine {
    sink: OnceLock<CompletionSink>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn attach(&self, sink: CompletionSink) {
        assert!(self.sink.set(sink).is_ok(), "sink attached twice");
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn seen_methods(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn sink(&self) -> CompletionSink {
        self.sink.get().cloned().expect("sink not attached")
    }
}

impl NativeSurface for ScriptedEngine {
    fn submit(&self, call: NativeCall) -> Result<(), NativeError> {
        self.seen.lock().unwrap().push(call.method.clone());
        let sink = self.sink();
        match call.method.as_str() {
            "echo" => {
                thread::spawn(move || {
                    sink.on_completion_bytes(call.handle, Ok(call.payload.as_deref()), true);
                });
            }
            "count" => {
                let payload = call.payload.as_deref().ok_or_else(|| {
                    NativeError::new(ErrorCode::InvalidArgument, "count needs a payload")
                })?;
                let n = codec::deserialize_exact(payload)
                    .ok()
                    .and_then(|value| value.as_u32().ok())
                    .ok_or_else(|| NativeError::new(ErrorCode::InvalidType, "expected uint32"))?;
                thread::spawn(move || {
                    for i in 0..n {
                        sink.on_completion(call.handle, Ok(Some(TaggedValue::UInt32(i))), false);
                    }
                    sink.on_completion(call.handle, Ok(None), true);
                });
            }
            "fail" => {
                thread::spawn(move || {
                    sink.on_completion(
                        call.handle,
                        Err(NativeError::new(ErrorCode::InvalidArgument, "bad property path")),
                        true,
                    );
                });
            }
            "slow" => {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(self.delay);
                self.active.fetch_sub(1, Ordering::SeqCst);
                thread::spawn(move || {
                    sink.on_completion_bytes(call.handle, Ok(call.payload.as_deref()), true);
                });
            }
            "hold" => {}
            other => {
                return Err(NativeError::generic(format!("unknown method {other}")));
            }
        }
        Ok(())
    }
}

pub fn config(capacity: usize) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.limiter.capacity = capacity;
    config.handles.miss_policy = MissPolicy::LogAndDrop;
    config
}

/// Start a bridge over `engine` and wire up its sink.
pub fn start_bridge(
    engine: ScriptedEngine,
    config: &BridgeConfig,
) -> (Bridge, Arc<ScriptedEngine>) {
    let engine = Arc::new(engine);
    let bridge = Bridge::start(engine.clone(), config).expect("bridge start");
    engine.attach(bridge.sink());
    (bridge, engine)
}

/// Handler that forwards every completion into a channel.
pub fn collector() -> (
    impl FnMut(Completion) + Send + 'static,
    mpsc::UnboundedReceiver<Completion>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |completion| {
            let _ = tx.send(completion);
        },
        rx,
    )
}

/// Receive until the final event, with a generous timeout.
pub async fn collect_until_final(
    rx: &mut mpsc::UnboundedReceiver<Completion>,
) -> anyhow::Result<Vec<Completion>> {
    let mut events = Vec::new();
    loop {
        let completion = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("handler dropped before the final event"))?;
        let done = completion.is_final;
        events.push(completion);
        if done {
            return Ok(events);
        }
    }
}
