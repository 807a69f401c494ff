//! Correlates native completions with host handlers.
//!
//! A call is registered in a [`HandleTable`] before it is handed to the
//! [`NativeSurface`]; the native side later reports results through a
//! [`CompletionSink`] by handle id. Handlers never run on the reporting thread:
//! each resolved completion is queued to a single dispatcher task, which keeps
//! the events of one streaming call in emission order.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hostbridge_codec::{Codec, CodecError};
use hostbridge_types::{ErrorCode, HandleId, NativeError, TaggedValue};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::{BridgeConfig, ConfigError};
use crate::handle_table::HandleTable;
use crate::limiter::{ConcurrencyLimiter, LimiterError};
use crate::miss::MissPolicy;
use crate::panic_message;

/// Result of one native completion event.
pub type Outcome = Result<Option<TaggedValue>, NativeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub handle: HandleId,
    pub outcome: Outcome,
    pub is_final: bool,
}

/// A call as handed to the native side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCall {
    pub handle: HandleId,
    pub method: String,
    /// Request payload, already encoded with the bridge codec.
    pub payload: Option<Vec<u8>>,
}

/// The native call surface.
///
/// `submit` runs on Tokio's blocking pool under the bridge limiter and may
/// block. It must not report the call's result itself; results go through the
/// [`CompletionSink`], from any thread, at any later time.
pub trait NativeSurface: Send + Sync + 'static {
    fn submit(&self, call: NativeCall) -> Result<(), NativeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub method: String,
    pub payload: Option<TaggedValue>,
}

impl CallRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            payload: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: TaggedValue) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to encode request payload: {0}")]
    Codec(#[from] CodecError),
    #[error("native submit failed: {0}")]
    Submit(#[from] NativeError),
    #[error(transparent)]
    Limiter(#[from] LimiterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bridge is shut down")]
    Closed,
    #[error("bridge must be started inside a Tokio runtime")]
    NoRuntime,
}

type Handler = Box<dyn FnMut(Completion) + Send>;

struct PendingCall {
    method: String,
    handler: Mutex<Handler>,
}

struct Delivery {
    call: Arc<PendingCall>,
    completion: Completion,
}

impl Delivery {
    fn run(self) {
        let Delivery { call, completion } = self;
        let handle = completion.handle;
        let mut handler = call.handler.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (*handler)(completion))) {
            error!(
                %handle,
                method = %call.method,
                panic = %panic_message(&*payload),
                "completion handler panicked"
            );
        }
    }
}

struct Shared {
    calls: HandleTable<Arc<PendingCall>>,
    /// Dispatcher queue. `None` once shut down. The lock also sequences
    /// resolve-and-enqueue so events for one handle keep their order.
    queue: Mutex<Option<mpsc::UnboundedSender<Delivery>>>,
    /// Set under the `queue` lock when shutdown begins; no call registers
    /// after it.
    closing: AtomicBool,
    miss_policy: MissPolicy,
    codec: Codec,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Delivery>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `call` unless shutdown has begun.
    fn register(&self, call: Arc<PendingCall>, streaming: bool) -> Option<HandleId> {
        let queue = self.queue();
        if queue.is_none() || self.closing.load(Ordering::Acquire) {
            return None;
        }
        let handle = if streaming {
            self.calls.register_persistent(call)
        } else {
            self.calls.register_once(call)
        };
        drop(queue);
        Some(handle)
    }

    fn complete(&self, id: HandleId, outcome: Outcome, is_final: bool) {
        let queue = self.queue();
        let call = match self.calls.resolve(id, is_final) {
            Ok(call) => call,
            Err(err) => {
                drop(queue);
                self.miss_policy.apply(&err, is_final);
                return;
            }
        };
        let completion = Completion {
            handle: id,
            outcome,
            is_final,
        };
        let sent = queue
            .as_ref()
            .is_some_and(|tx| tx.send(Delivery { call, completion }).is_ok());
        drop(queue);
        if !sent {
            self.miss_policy.apply_closed(id, is_final);
        }
    }
}

/// Cloneable completion entry point for native threads.
#[derive(Clone)]
pub struct CompletionSink {
    shared: Arc<Shared>,
}

impl CompletionSink {
    /// Report an event for `id`. A final event (or any event of a one-shot
    /// call) releases the handle.
    pub fn on_completion(&self, id: HandleId, outcome: Outcome, is_final: bool) {
        self.shared.complete(id, outcome, is_final);
    }

    /// Report an event whose payload is still in wire form.
    ///
    /// An undecodable payload reaches the handler as an `InvalidArgument`
    /// error; the event itself is never dropped.
    pub fn on_completion_bytes(
        &self,
        id: HandleId,
        outcome: Result<Option<&[u8]>, NativeError>,
        is_final: bool,
    ) {
        let codec = self.shared.codec;
        let outcome = outcome.and_then(|payload| {
            payload
                .map(|bytes| codec.deserialize_exact(bytes))
                .transpose()
                .map_err(|err| {
                    NativeError::new(
                        ErrorCode::InvalidArgument,
                        format!("undecodable completion payload: {err}"),
                    )
                })
        });
        self.on_completion(id, outcome, is_final);
    }
}

impl std::fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSink")
            .field("outstanding", &self.shared.calls.len())
            .finish_non_exhaustive()
    }
}

pub struct Bridge {
    shared: Arc<Shared>,
    surface: Arc<dyn NativeSurface>,
    limiter: ConcurrencyLimiter,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Build a bridge and spawn its dispatcher on the current runtime.
    pub fn start(
        surface: Arc<dyn NativeSurface>,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
        let limiter = ConcurrencyLimiter::new(config.limiter.capacity)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = runtime.spawn(dispatch(rx));
        let shared = Arc::new(Shared {
            calls: HandleTable::new(),
            queue: Mutex::new(Some(tx)),
            closing: AtomicBool::new(false),
            miss_policy: config.handles.miss_policy,
            codec: Codec::new(config.codec_limits()),
        });
        debug!(
            capacity = limiter.capacity(),
            miss_policy = ?shared.miss_policy,
            "bridge started"
        );

        Ok(Self {
            shared,
            surface,
            limiter,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    #[must_use]
    pub fn sink(&self) -> CompletionSink {
        CompletionSink {
            shared: Arc::clone(&self.shared),
        }
    }

    #[must_use]
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn codec(&self) -> Codec {
        self.shared.codec
    }

    /// Calls registered and not yet finally completed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.shared.calls.len()
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Issue a native call and return its handle once the native side has
    /// accepted it. Completion is reported later to `handler`.
    ///
    /// A streaming call may complete many times; its handle lives until the
    /// final event. A non-streaming call is resolved by its first event.
    ///
    /// The handle is registered only once a limiter slot is held, and the
    /// submission then runs to the end even if this future is dropped. On any
    /// error nothing stays registered and `handler` is never called.
    pub async fn invoke<F>(
        &self,
        request: CallRequest,
        handler: F,
        streaming: bool,
    ) -> Result<HandleId, BridgeError>
    where
        F: FnMut(Completion) + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(BridgeError::Closed);
        }
        let payload = request
            .payload
            .as_ref()
            .map(|value| self.shared.codec.serialize(value))
            .transpose()?;

        let slot = self.limiter.acquire().await.map_err(|err| match err {
            LimiterError::Closed => BridgeError::Closed,
            other => BridgeError::Limiter(other),
        })?;

        let handler: Handler = Box::new(handler);
        let call = Arc::new(PendingCall {
            method: request.method.clone(),
            handler: Mutex::new(handler),
        });
        let handle = self
            .shared
            .register(call, streaming)
            .ok_or(BridgeError::Closed)?;

        let native_call = NativeCall {
            handle,
            method: request.method,
            payload,
        };
        let method = native_call.method.clone();
        let surface = Arc::clone(&self.surface);
        let shared = Arc::clone(&self.shared);
        let submitted = slot
            .run_blocking(move || {
                surface.submit(native_call).map_err(|native| {
                    let unregistered = shared.calls.lookup_and_consume(handle).err();
                    (native, unregistered)
                })
            })
            .await;

        let err = match submitted {
            Ok(Ok(())) => {
                debug!(%handle, %method, streaming, "call submitted");
                return Ok(handle);
            }
            Ok(Err((native, miss))) => {
                if let Some(miss) = miss {
                    // The native side completed a call it also refused.
                    self.shared.miss_policy.apply(&miss, false);
                }
                BridgeError::Submit(native)
            }
            Err(limiter) => {
                if self.shared.calls.lookup_and_consume(handle).is_err() {
                    debug!(%handle, "handle already resolved after a failed submit");
                }
                BridgeError::Limiter(limiter)
            }
        };
        warn!(%handle, %method, %err, "submit failed; call unregistered");
        Err(err)
    }

    /// Same as [`CompletionSink::on_completion`].
    pub fn on_completion(&self, id: HandleId, outcome: Outcome, is_final: bool) {
        self.shared.complete(id, outcome, is_final);
    }

    /// Stop accepting calls, let in-flight submissions and queued deliveries
    /// finish, and abandon every outstanding call. Abandoned handlers are
    /// dropped without being called. Returns the abandoned handles in id
    /// order.
    ///
    /// An `invoke` still waiting for a limiter slot fails with
    /// [`BridgeError::Closed`]; every handle an `invoke` returned `Ok` for is
    /// either completed or in the returned list.
    pub async fn shutdown(&self) -> Vec<HandleId> {
        {
            let _queue = self.shared.queue();
            self.shared.closing.store(true, Ordering::Release);
        }
        self.limiter.close_when_idle().await;

        let abandoned = {
            let mut queue = self.shared.queue();
            queue.take();
            self.shared.calls.drain()
        };

        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = dispatcher
            && let Err(err) = task.await
        {
            warn!(%err, "dispatcher task ended abnormally");
        }

        for (handle, call) in &abandoned {
            warn!(%handle, method = %call.method, "abandoned outstanding call");
        }
        abandoned.into_iter().map(|(handle, _)| handle).collect()
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = rx.recv().await {
        delivery.run();
    }
    debug!("dispatcher stopped");
}
