use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::detection::domain::errors::ModelLoadError;
use crate::detection::domain::face_detector::{DetectionModel, ModelBackend};
use crate::detection::domain::model_state::ModelState;

type LoadResult = Result<Arc<dyn DetectionModel>, ModelLoadError>;
type LoadFuture = Shared<BoxFuture<'static, LoadResult>>;

enum Slot {
    Empty { failed: bool },
    Loading { flight: u64, future: LoadFuture },
    Ready(Arc<dyn DetectionModel>),
}

/// Loads a detection model on first use, at most once at a time.
///
/// Concurrent callers share one in-flight load. A successful load is kept
/// for the life of the process; a failed one clears the slot so the next
/// caller retries. Every flight carries an id so that a waiter finishing
/// late cannot overwrite the outcome of a newer flight.
pub struct LazyModel {
    backend: Arc<dyn ModelBackend>,
    slot: Mutex<Slot>,
    flights: AtomicU64,
    attempts: AtomicUsize,
}

impl LazyModel {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            slot: Mutex::new(Slot::Empty { failed: false }),
            flights: AtomicU64::new(0),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> ModelState {
        match &*self.lock() {
            Slot::Empty { failed: false } => ModelState::NotLoaded,
            Slot::Empty { failed: true } => ModelState::FailedToLoad,
            Slot::Loading { .. } => ModelState::Loading,
            Slot::Ready(_) => ModelState::Ready,
        }
    }

    /// Number of loads started so far.
    pub fn load_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns the model, starting or joining a load if needed.
    pub async fn get(&self) -> LoadResult {
        let (flight, future) = {
            let mut slot = self.lock();
            match &*slot {
                Slot::Ready(model) => return Ok(model.clone()),
                Slot::Loading { flight, future } => (*flight, future.clone()),
                Slot::Empty { .. } => {
                    let flight = self.flights.fetch_add(1, Ordering::SeqCst) + 1;
                    self.attempts.fetch_add(1, Ordering::SeqCst);
                    log::debug!("Starting model load (flight {flight})");
                    let future = self.spawn_load();
                    *slot = Slot::Loading {
                        flight,
                        future: future.clone(),
                    };
                    (flight, future)
                }
            }
        };

        let result = future.await;
        self.settle(flight, &result);
        result
    }

    fn spawn_load(&self) -> LoadFuture {
        let backend = self.backend.clone();
        async move {
            tokio::task::spawn_blocking(move || backend.load_model())
                .await
                .map_err(|e| ModelLoadError::Task(e.to_string()))?
        }
        .boxed()
        .shared()
    }

    fn settle(&self, flight: u64, result: &LoadResult) {
        let mut slot = self.lock();
        let Slot::Loading { flight: current, .. } = &*slot else {
            return;
        };
        if *current != flight {
            return;
        }
        *slot = match result {
            Ok(model) => {
                log::info!("Face detection model loaded");
                Slot::Ready(model.clone())
            }
            Err(e) => {
                log::warn!("Face detection model failed to load: {e}");
                Slot::Empty { failed: true }
            }
        };
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
