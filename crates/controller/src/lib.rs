//! Reactive selection controller: one computation in flight at a time,
//! cancel-and-replace on new input, whole-triple publication.

use std::sync::Arc;

use chrono::Utc;
use pipeline::{compute_charts, CategoryCatalog};
use provider::DataProvider;
use shared::{
    error::ApiError,
    protocol::{ControllerPhase, Publication, SelectionOutcome, StatusSummary},
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    Published(Arc<Publication>),
    Failed { species: String, error: ApiError },
    Superseded { species: String, generation: u64 },
}

struct InFlight {
    generation: u64,
    species: String,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct ControllerState {
    generation: u64,
    /// Latest selection that is either published or being computed.
    requested: Option<String>,
    in_flight: Option<InFlight>,
    last_error: Option<ApiError>,
}

pub struct ReactiveController {
    provider: Arc<dyn DataProvider>,
    catalog: Arc<CategoryCatalog>,
    published: watch::Sender<Option<Arc<Publication>>>,
    events: broadcast::Sender<ControllerEvent>,
    inner: Mutex<ControllerState>,
}

impl ReactiveController {
    pub fn new(provider: Arc<dyn DataProvider>, catalog: Arc<CategoryCatalog>) -> Arc<Self> {
        let (published, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            provider,
            catalog,
            published,
            events,
            inner: Mutex::new(ControllerState::default()),
        })
    }

    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    /// The held publication. All three charts always come from one pass.
    pub fn current(&self) -> Option<Arc<Publication>> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Publication>>> {
        self.published.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> StatusSummary {
        let state = self.inner.lock().await;
        StatusSummary {
            phase: if state.in_flight.is_some() {
                ControllerPhase::Computing
            } else {
                ControllerPhase::Idle
            },
            generation: state.generation,
            requested_species: state.requested.clone(),
            published_species: self.published_species(),
            last_error: state.last_error.clone(),
        }
    }

    /// Handles a selection change. Any computation in flight is cancelled;
    /// its result can no longer be published.
    pub async fn select(self: &Arc<Self>, species: impl Into<String>) -> SelectionOutcome {
        let species = species.into();
        let mut state = self.inner.lock().await;
        if state.requested.as_deref() == Some(species.as_str()) {
            debug!(%species, "selection unchanged");
            return SelectionOutcome::Unchanged;
        }

        state.generation += 1;
        let generation = state.generation;
        if let Some(previous) = state.in_flight.take() {
            previous.task.abort();
            info!(
                species = %previous.species,
                generation = previous.generation,
                "superseded in-flight chart pass"
            );
            let _ = self.events.send(ControllerEvent::Superseded {
                species: previous.species,
                generation: previous.generation,
            });
        }
        state.requested = Some(species.clone());

        if self.published_species().as_deref() == Some(species.as_str()) {
            debug!(%species, "held charts already match selection");
            return SelectionOutcome::Restored;
        }

        info!(%species, generation, "selection accepted");
        let controller = Arc::clone(self);
        let task_species = species.clone();
        let task = tokio::spawn(async move {
            controller.run_pass(generation, task_species).await;
        });
        state.in_flight = Some(InFlight {
            generation,
            species,
            task,
        });
        SelectionOutcome::Started
    }

    async fn run_pass(self: Arc<Self>, generation: u64, species: String) {
        let result = compute_charts(self.provider.as_ref(), &self.catalog, &species).await;

        let mut state = self.inner.lock().await;
        if state.generation != generation {
            debug!(%species, generation, "discarding superseded chart pass result");
            return;
        }
        state.in_flight = None;

        match result {
            Ok(charts) => {
                let publication = Arc::new(Publication {
                    generation,
                    species,
                    published_at: Utc::now(),
                    charts,
                });
                self.published.send_replace(Some(Arc::clone(&publication)));
                state.last_error = None;
                info!(
                    species = %publication.species,
                    generation,
                    "published chart triple"
                );
                let _ = self.events.send(ControllerEvent::Published(publication));
            }
            Err(err) => {
                let error = ApiError::from(&err);
                warn!(%species, generation, %err, "chart pass failed; keeping previous charts");
                state.requested = self.published_species();
                state.last_error = Some(error.clone());
                let _ = self.events.send(ControllerEvent::Failed { species, error });
            }
        }
    }

    fn published_species(&self) -> Option<String> {
        self.published
            .borrow()
            .as_ref()
            .map(|publication| publication.species.clone())
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
