//! # Seatline Runtime
//!
//! The [`Store`] drives a [`Reducer`]: it owns the reducer's state behind a
//! single write guard, dispatches actions through the reducer while holding
//! that guard, and executes the returned effects on background tasks.
//!
//! The write guard is the linearization point for every state transition.
//! Two tasks racing to dispatch against the same store are serialized by the
//! guard, so conditional updates inside a reduction (a compare-and-decrement
//! on a capacity counter, for example) can never interleave with each other.
//! Nothing slow ever runs under the guard: effects are spawned after the
//! transition is applied, and actions they produce re-enter the store
//! through a feedback channel.

use seatline_core::SmallVec;
use seatline_core::effect::Effect;
use seatline_core::reducer::Reducer;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use tokio::sync::{RwLock, mpsc};

/// A store that owns reducer state and executes effects.
///
/// Cloning a `Store` is cheap and yields a handle to the same state.
///
/// # Example
///
/// ```ignore
/// let store = Store::new(AllocationReducer::new(), env, AllocationState::new());
/// store.send(AllocationAction::OpenEvent { event_id, total_slots: 100 }).await;
/// let available = store.with_state(|s| s.ledger.available(&event_id)).await;
/// ```
pub struct Store<R: Reducer> {
    inner: Arc<StoreInner<R>>,
    feedback: mpsc::UnboundedSender<R::Action>,
}

impl<R: Reducer> Clone for Store<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            feedback: self.feedback.clone(),
        }
    }
}

struct StoreInner<R: Reducer> {
    state: RwLock<R::State>,
    reducer: R,
    env: R::Environment,
}

impl<R> Store<R>
where
    R: Reducer + Send + Sync + 'static,
    R::State: Send + Sync + 'static,
    R::Action: Send + 'static,
    R::Environment: Send + Sync + 'static,
{
    /// Create a new store and start its feedback worker.
    ///
    /// Must be called within a Tokio runtime: the store spawns a background
    /// task that re-dispatches actions produced by effects.
    pub fn new(reducer: R, env: R::Environment, initial_state: R::State) -> Self {
        let inner = Arc::new(StoreInner {
            state: RwLock::new(initial_state),
            reducer,
            env,
        });
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(feedback_worker(Arc::downgrade(&inner), rx, tx.clone()));
        Self { inner, feedback: tx }
    }

    /// Dispatch an action: run the reducer under the write guard, then
    /// execute the returned effects in the background.
    pub async fn send(&self, action: R::Action) {
        let effects = {
            let mut state = self.inner.state.write().await;
            self.inner.reducer.reduce(&mut state, action, &self.inner.env)
        };
        spawn_effects(&self.feedback, effects);
    }

    /// Dispatch an action and read a result from the state *under the same
    /// write guard*, so the read observes exactly the transition this action
    /// produced and nothing later.
    pub async fn send_then<T>(&self, action: R::Action, read: impl FnOnce(&R::State) -> T) -> T {
        let (effects, out) = {
            let mut state = self.inner.state.write().await;
            let effects = self.inner.reducer.reduce(&mut state, action, &self.inner.env);
            let out = read(&state);
            (effects, out)
        };
        spawn_effects(&self.feedback, effects);
        out
    }

    /// Read a snapshot of the current state.
    pub async fn with_state<T>(&self, read: impl FnOnce(&R::State) -> T) -> T {
        let state = self.inner.state.read().await;
        read(&state)
    }
}

/// Drains feedback actions produced by effects and re-dispatches them.
///
/// Holds only a weak handle to the store so a dropped store does not stay
/// alive just because effects are still in flight.
async fn feedback_worker<R>(
    inner: Weak<StoreInner<R>>,
    mut rx: mpsc::UnboundedReceiver<R::Action>,
    tx: mpsc::UnboundedSender<R::Action>,
) where
    R: Reducer + Send + Sync + 'static,
    R::State: Send + Sync + 'static,
    R::Action: Send + 'static,
    R::Environment: Send + Sync + 'static,
{
    while let Some(action) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            tracing::debug!("store dropped; discarding feedback action");
            break;
        };
        let effects = {
            let mut state = inner.state.write().await;
            inner.reducer.reduce(&mut state, action, &inner.env)
        };
        spawn_effects(&tx, effects);
    }
}

fn spawn_effects<A: Send + 'static>(
    tx: &mpsc::UnboundedSender<A>,
    effects: SmallVec<[Effect<A>; 4]>,
) {
    for effect in effects {
        if !effect.is_none() {
            tokio::spawn(run_effect(tx.clone(), effect));
        }
    }
}

/// Execute a single effect, sending any feedback action back to the store.
///
/// Boxed so `Sequential`/`Parallel` can nest without a recursive future type.
fn run_effect<A: Send + 'static>(
    tx: mpsc::UnboundedSender<A>,
    effect: Effect<A>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        match effect {
            Effect::None => {},
            Effect::Future(future) => {
                if let Some(action) = future.await {
                    feed_back(&tx, action);
                }
            },
            Effect::Delay { duration, action } => {
                tokio::time::sleep(duration).await;
                feed_back(&tx, *action);
            },
            Effect::Parallel(effects) => {
                for effect in effects {
                    tokio::spawn(run_effect(tx.clone(), effect));
                }
            },
            Effect::Sequential(effects) => {
                for effect in effects {
                    run_effect(tx.clone(), effect).await;
                }
            },
        }
    })
}

fn feed_back<A>(tx: &mpsc::UnboundedSender<A>, action: A) {
    if tx.send(action).is_err() {
        tracing::debug!("store dropped; feedback action discarded");
    }
}
