//! Typed signals for loose coupling between bundles.
//!
//! A signal is a marker type naming an event and the payload receivers get
//! to inspect or modify. Receivers are called synchronously, in the order
//! they were connected; the first error stops delivery and is returned to
//! the sender.
//!
//! ```ignore
//! app.dispatcher().connect::<RequestReady, _>(|cx| {
//!     tracing::debug!(path = cx.request().path(), "request is ready");
//!     Ok(())
//! });
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tool_shared::Result;
use tracing::trace;

use crate::context::{Context, RequestContext};

/// An event type with the payload delivered to its receivers.
pub trait Signal: 'static {
    type Payload: Any;

    /// Name used in logs.
    const NAME: &'static str;
}

/// Fired once all configured bundles are set up. Payload: the application
/// [`Context`].
pub struct AppManagerReady;

impl Signal for AppManagerReady {
    type Payload = Context;
    const NAME: &'static str = "app_manager_ready";
}

/// Fired for every routed request right before the view is called.
pub struct RequestReady;

impl Signal for RequestReady {
    type Payload = RequestContext;
    const NAME: &'static str = "request_ready";
}

/// Handle returned by [`Dispatcher::connect`], used to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

type Callback = Arc<dyn Fn(&mut dyn Any) -> Result<()> + Send + Sync>;

struct Receiver {
    id: ReceiverId,
    callback: Callback,
}

/// Registry of signal receivers.
#[derive(Default)]
pub struct Dispatcher {
    next_id: AtomicU64,
    receivers: RwLock<HashMap<TypeId, Vec<Receiver>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `receiver` to signal `S`.
    pub fn connect<S, F>(&self, receiver: F) -> ReceiverId
    where
        S: Signal,
        F: Fn(&mut S::Payload) -> Result<()> + Send + Sync + 'static,
    {
        let id = ReceiverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let callback: Callback = Arc::new(move |payload: &mut dyn Any| {
            match payload.downcast_mut::<S::Payload>() {
                Some(payload) => receiver(payload),
                None => Ok(()),
            }
        });
        self.receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(TypeId::of::<S>())
            .or_default()
            .push(Receiver { id, callback });
        trace!(signal = S::NAME, ?id, "receiver connected");
        id
    }

    /// Remove a receiver. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: ReceiverId) -> bool {
        let mut receivers = self
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for list in receivers.values_mut() {
            if let Some(pos) = list.iter().position(|r| r.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `payload` to every receiver of `S`; returns how many ran.
    pub fn send<S: Signal>(&self, payload: &mut S::Payload) -> Result<usize> {
        // snapshot so receivers may connect or disconnect while running
        let callbacks: Vec<Callback> = self
            .receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<S>())
            .map(|list| list.iter().map(|r| Arc::clone(&r.callback)).collect())
            .unwrap_or_default();

        trace!(signal = S::NAME, receivers = callbacks.len(), "sending signal");
        for callback in &callbacks {
            callback(&mut *payload)?;
        }
        Ok(callbacks.len())
    }

    pub fn receiver_count<S: Signal>(&self) -> usize {
        self.receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<S>())
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tool_shared::ToolError;

    struct Saved;

    impl Signal for Saved {
        type Payload = Vec<&'static str>;
        const NAME: &'static str = "saved";
    }

    #[test]
    fn receivers_run_in_order() {
        let dispatcher = Dispatcher::new();
        dispatcher.connect::<Saved, _>(|log| {
            log.push("first");
            Ok(())
        });
        dispatcher.connect::<Saved, _>(|log| {
            log.push("second");
            Ok(())
        });

        let mut log = Vec::new();
        let delivered = dispatcher.send::<Saved>(&mut log).expect("send");
        assert_eq!(delivered, 2);
        assert_eq!(log, ["first", "second"]);
    }

    #[test]
    fn disconnect_and_errors() {
        let dispatcher = Dispatcher::new();
        let id = dispatcher.connect::<Saved, _>(|_| Err(ToolError::config("nope")));
        let mut log = Vec::new();
        assert!(dispatcher.send::<Saved>(&mut log).is_err());

        assert!(dispatcher.disconnect(id));
        assert!(!dispatcher.disconnect(id));
        assert_eq!(dispatcher.receiver_count::<Saved>(), 0);
        assert_eq!(dispatcher.send::<Saved>(&mut log).expect("send"), 0);
    }

    #[test]
    fn signals_are_isolated() {
        let dispatcher = Dispatcher::new();
        dispatcher.connect::<AppManagerReady, _>(|_| Ok(()));
        assert_eq!(dispatcher.receiver_count::<Saved>(), 0);
        assert_eq!(dispatcher.receiver_count::<AppManagerReady>(), 1);
    }
}
