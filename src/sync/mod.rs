//! In-memory mirrors of the signed-in user's collections, kept in step with
//! the store by reloading after every write and on every change notification.

pub mod shared;
pub mod tasks;

use crate::access::Subscription;
use crate::error::{Result, TaskError};
use crate::session::SessionContext;
use crate::store::ChangeEvent;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub use shared::SharedTaskSync;
pub use tasks::TaskSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Loading,
    Ready,
}

/// Snapshot of a mirrored collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub phase: SyncPhase,
    pub items: Vec<T>,
    /// User the mirror is bound to; `None` when signed out.
    pub user_id: Option<String>,
    /// Bumped on every applied change, including clears.
    pub revision: u64,
    epoch: u64,
    /// Ticket of the load whose result is currently installed.
    applied: u64,
}

impl<T> ListState<T> {
    fn initial() -> Self {
        Self {
            phase: SyncPhase::Loading,
            items: Vec::new(),
            user_id: None,
            revision: 0,
            epoch: 0,
            applied: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase == SyncPhase::Ready
    }
}

/// Holder of one `ListState`, written only by its owning hook.
pub(crate) struct Mirror<T> {
    tx: watch::Sender<ListState<T>>,
    tickets: AtomicU64,
}

impl<T: Clone> Mirror<T> {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ListState::initial());
        Self {
            tx,
            tickets: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ListState<T>> {
        self.tx.subscribe()
    }

    pub(crate) fn snapshot(&self) -> ListState<T> {
        self.tx.borrow().clone()
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.tx.borrow().items.clone()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    /// Number a load before it reads from the store. Later tickets read later.
    pub(crate) fn ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn bound_user(&self) -> Option<String> {
        self.tx.borrow().user_id.clone()
    }

    /// Start a new session epoch: drop the previous user's items.
    pub(crate) fn rebind(&self, user_id: Option<String>) {
        self.tx.send_modify(|state| {
            state.epoch += 1;
            state.revision += 1;
            state.items.clear();
            state.phase = if user_id.is_some() {
                SyncPhase::Loading
            } else {
                SyncPhase::Ready
            };
            state.user_id = user_id;
        });
    }

    /// Install a freshly loaded list unless the session moved on meanwhile
    /// or a load that read later has already been installed.
    pub(crate) fn replace(&self, epoch: u64, ticket: u64, items: Vec<T>) -> bool {
        self.tx.send_if_modified(|state| {
            if state.epoch != epoch || ticket <= state.applied {
                return false;
            }
            state.applied = ticket;
            state.items = items;
            state.phase = SyncPhase::Ready;
            state.revision += 1;
            true
        })
    }

    /// Leave items alone but stop reporting `Loading` (after a failed load).
    pub(crate) fn settle(&self, epoch: u64) {
        self.tx.send_if_modified(|state| {
            if state.epoch != epoch || state.phase == SyncPhase::Ready {
                return false;
            }
            state.phase = SyncPhase::Ready;
            true
        });
    }

    /// Edit the items in place, only within `epoch`.
    pub(crate) fn modify_current(&self, epoch: u64, edit: impl FnOnce(&mut Vec<T>)) -> bool {
        self.tx.send_if_modified(|state| {
            if state.epoch != epoch {
                return false;
            }
            edit(&mut state.items);
            state.revision += 1;
            true
        })
    }

    /// Wait until the mirror is `Ready` for whoever is signed in on `session`.
    pub(crate) async fn ready(&self, session: &SessionContext) -> Result<ListState<T>> {
        let expected = session.user_id();
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|state| state.is_ready() && state.user_id == expected)
            .await
            .map_err(|_| TaskError::Store("synchronization stopped".to_string()))?;
        Ok(state.clone())
    }
}

/// What the background driver needs from a hook.
#[async_trait]
pub(crate) trait SyncSource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn session(&self) -> &SessionContext;

    fn bind(&self, user_id: Option<String>);

    fn subscribe(&self, tx: mpsc::UnboundedSender<ChangeEvent>) -> Subscription;

    async fn reload(&self);
}

async fn next_event(events: &mut Option<mpsc::UnboundedReceiver<ChangeEvent>>) -> Option<ChangeEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

/// Per-hook event loop.
///
/// Rebinds on every change of signed-in user: the previous subscription is
/// disposed before a new one is made, then the collection is loaded in full.
/// Each change notification is a bare reload trigger, so duplicates and
/// reordering only cost extra fetches. The subscription lives in this
/// future, so aborting the driver tears it down on every exit path.
pub(crate) async fn drive<R: SyncSource>(source: Arc<R>) {
    let mut auth = source.session().subscribe();
    let mut bound: Option<Option<String>> = None;
    let mut subscription: Option<Subscription> = None;
    let mut events: Option<mpsc::UnboundedReceiver<ChangeEvent>> = None;

    loop {
        let user_id = auth.borrow_and_update().user_id();

        if bound.as_ref() != Some(&user_id) {
            drop(subscription.take());
            events = None;
            source.bind(user_id.clone());
            crate::log_sync_event!(source.name(), "rebind", user_id.as_deref().unwrap_or("-"));

            if user_id.is_some() {
                let (tx, rx) = mpsc::unbounded_channel();
                subscription = Some(source.subscribe(tx));
                events = Some(rx);
                source.reload().await;
            }
            bound = Some(user_id);
        }

        tokio::select! {
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(event) = next_event(&mut events) => {
                tracing::debug!(
                    hook = source.name(),
                    table = %event.table,
                    operation = ?event.operation,
                    "Change notification, reloading"
                );
                source.reload().await;
            }
        }
    }

    tracing::debug!(hook = source.name(), "Sync driver stopped");
}
