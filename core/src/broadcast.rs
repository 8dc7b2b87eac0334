//! Cross-context broadcast channel.
//!
//! A mutation made in one browsing context must be observed by its siblings
//! as a local state overwrite, never as a trigger for another network call
//! or another persisted write (that would close a write -> broadcast ->
//! write loop). The mechanism is abstracted behind [`ContextBroadcast`] so
//! the storage-watcher transport can be swapped for an in-process bus (used
//! by tests and single-process embedders) without touching engine logic.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tavolo_protocol::{Cart, SessionRecord};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;
use uuid::Uuid;

use crate::storage::{BROADCAST_KEY, StorageDir};

/// Typed event re-emitted to sibling contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BroadcastEvent {
    CartUpdated { cart: Cart },
    SessionUpdated { record: SessionRecord },
    UserLoggedOut,
}

/// One physical broadcast write: a fresh frame id (so identical payloads
/// still count as distinct writes) plus the publishing context's origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastFrame {
    pub id: Uuid,
    pub origin: Uuid,
    pub event: BroadcastEvent,
}

/// A broadcast endpoint owned by one browsing context.
///
/// Subscribers may observe frames from any origin, including their own;
/// consumers must drop frames whose origin matches their endpoint's.
pub trait ContextBroadcast: Send + Sync {
    fn origin(&self) -> Uuid;

    /// Publish an event to sibling contexts. Best-effort: transport
    /// failures are logged, never surfaced.
    fn publish(&self, event: BroadcastEvent);

    fn subscribe(&self) -> broadcast::Receiver<BroadcastFrame>;
}

/// Decide whether a frame read from storage should reach local subscribers.
///
/// Deduplicates by frame id (at most one dispatch per physical write) and
/// suppresses frames this context published itself.
fn should_dispatch(frame: &BroadcastFrame, last_seen: &mut Option<Uuid>, origin: Uuid) -> bool {
    if *last_seen == Some(frame.id) {
        return false;
    }
    *last_seen = Some(frame.id);
    frame.origin != origin
}

/// Broadcast transport backed by the shared storage directory, watched with
/// a filesystem watcher.
pub struct StorageBroadcast {
    origin: Uuid,
    storage: StorageDir,
    tx: broadcast::Sender<BroadcastFrame>,
    _watcher: RecommendedWatcher,
}

impl StorageBroadcast {
    /// Start watching the storage origin. Must be called inside a tokio
    /// runtime; the dispatch task exits when the endpoint is dropped.
    pub fn spawn(storage: StorageDir) -> Result<Self, notify::Error> {
        std::fs::create_dir_all(storage.root())?;
        let origin = Uuid::new_v4();
        let (tx, _) = broadcast::channel(32);

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = raw_tx.send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(storage.root(), RecursiveMode::NonRecursive)?;

        let task_tx = tx.clone();
        let task_storage = storage.clone();
        tokio::spawn(async move {
            let mut last_seen = None;
            while let Some(res) = raw_rx.recv().await {
                let Ok(event) = res else { continue };
                if !is_broadcast_write(&event) {
                    continue;
                }
                match task_storage.read_json::<BroadcastFrame>(BROADCAST_KEY) {
                    Ok(Some(frame)) => {
                        if should_dispatch(&frame, &mut last_seen, origin) {
                            let _ = task_tx.send(frame);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("unreadable broadcast frame: {e}"),
                }
            }
        });

        Ok(Self {
            origin,
            storage,
            tx,
            _watcher: watcher,
        })
    }
}

fn is_broadcast_write(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|n| n == "broadcast.json"))
}

impl ContextBroadcast for StorageBroadcast {
    fn origin(&self) -> Uuid {
        self.origin
    }

    fn publish(&self, event: BroadcastEvent) {
        let frame = BroadcastFrame {
            id: Uuid::new_v4(),
            origin: self.origin,
            event,
        };
        if let Err(e) = self.storage.write_json(BROADCAST_KEY, &frame) {
            warn!("failed to publish broadcast frame: {e}");
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<BroadcastFrame> {
        self.tx.subscribe()
    }
}

/// In-process broadcast bus connecting endpoints directly.
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<BroadcastFrame>,
}

impl LocalBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    /// Mint an endpoint for one context.
    pub fn endpoint(&self) -> LocalBroadcast {
        LocalBroadcast {
            origin: Uuid::new_v4(),
            tx: self.tx.clone(),
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Endpoint on a [`LocalBus`].
#[derive(Debug, Clone)]
pub struct LocalBroadcast {
    origin: Uuid,
    tx: broadcast::Sender<BroadcastFrame>,
}

impl ContextBroadcast for LocalBroadcast {
    fn origin(&self) -> Uuid {
        self.origin
    }

    fn publish(&self, event: BroadcastEvent) {
        let frame = BroadcastFrame {
            id: Uuid::new_v4(),
            origin: self.origin,
            event,
        };
        let _ = self.tx.send(frame);
    }

    fn subscribe(&self) -> broadcast::Receiver<BroadcastFrame> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(id: Uuid, origin: Uuid) -> BroadcastFrame {
        BroadcastFrame {
            id,
            origin,
            event: BroadcastEvent::UserLoggedOut,
        }
    }

    #[test]
    fn dispatch_suppresses_own_origin() {
        let origin = Uuid::new_v4();
        let mut last_seen = None;

        assert!(!should_dispatch(
            &frame(Uuid::new_v4(), origin),
            &mut last_seen,
            origin
        ));
    }

    #[test]
    fn dispatch_at_most_once_per_physical_write() {
        let origin = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut last_seen = None;
        let f = frame(Uuid::new_v4(), other);

        assert!(should_dispatch(&f, &mut last_seen, origin));
        assert!(!should_dispatch(&f, &mut last_seen, origin));

        let next = frame(Uuid::new_v4(), other);
        assert!(should_dispatch(&next, &mut last_seen, origin));
    }

    #[tokio::test]
    async fn local_bus_delivers_between_endpoints() {
        let bus = LocalBus::new();
        let a = bus.endpoint();
        let b = bus.endpoint();
        let mut rx = b.subscribe();

        a.publish(BroadcastEvent::UserLoggedOut);

        let received = rx.recv().await.expect("frame delivered");
        assert_eq!(a.origin(), received.origin);
        assert_eq!(BroadcastEvent::UserLoggedOut, received.event);
        assert_ne!(b.origin(), received.origin);
    }
}
