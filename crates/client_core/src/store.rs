use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::BoardState;
use tokio::sync::watch;
use tracing::debug;

/// Owner of the rendered [`BoardState`].
///
/// Cloning yields another handle to the same store. `replace` is the only
/// mutator and notifies subscribers only when the value actually changes.
#[derive(Clone)]
pub struct ViewStateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: watch::Sender<BoardState>,
    loaded: AtomicBool,
    closed: AtomicBool,
}

impl Default for ViewStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStateStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(BoardState::default());
        Self {
            inner: Arc::new(StoreInner {
                state,
                loaded: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn current(&self) -> BoardState {
        self.inner.state.borrow().clone()
    }

    /// Swaps in `new` wholesale. Returns whether observers saw a change.
    pub fn replace(&self, new: BoardState) -> bool {
        if self.is_closed() {
            debug!("store closed; dropping board state replacement");
            return false;
        }
        self.inner.loaded.store(true, Ordering::Release);
        self.inner.state.send_if_modified(|current| {
            if *current == new {
                false
            } else {
                *current = new;
                true
            }
        })
    }

    /// True once any read batch has been merged.
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.inner.state.subscribe()
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}
