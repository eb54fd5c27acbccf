use super::*;
use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use async_trait::async_trait;
use provider::{CountFilter, Dimension, ProviderError};
use shared::{domain::RawCountRow, error::ErrorCode};
use tokio::{sync::Notify, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct TestProvider {
    rows: HashMap<String, Vec<RawCountRow>>,
    gates: HashMap<String, Arc<Notify>>,
    failing: HashSet<String>,
    calls: std::sync::Mutex<Vec<String>>,
}

impl TestProvider {
    fn with_rows(mut self, species: &str, rows: Vec<RawCountRow>) -> Self {
        self.rows.insert(species.to_string(), rows);
        self
    }

    fn gated(mut self, species: &str, gate: Arc<Notify>) -> Self {
        self.gates.insert(species.to_string(), gate);
        self
    }

    fn failing(mut self, species: &str) -> Self {
        self.failing.insert(species.to_string());
        self
    }

    fn calls_for(&self, species: &str) -> usize {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|call| call.as_str() == species)
            .count()
    }
}

#[async_trait]
impl DataProvider for TestProvider {
    async fn fetch_grouped_counts(
        &self,
        filter: &CountFilter,
        _group_by: &[Dimension],
    ) -> Result<Vec<RawCountRow>, ProviderError> {
        let species = filter.species.clone().unwrap_or_default();
        self.calls.lock().expect("calls").push(species.clone());
        if let Some(gate) = self.gates.get(&species) {
            gate.notified().await;
        }
        if self.failing.contains(&species) {
            return Err(ProviderError::Status {
                status: 504,
                body: format!("timed out fetching {species}"),
            });
        }
        Ok(self.rows.get(&species).cloned().unwrap_or_default())
    }

    async fn fetch_distinct_values(
        &self,
        _dimension: Dimension,
    ) -> Result<Vec<Option<String>>, ProviderError> {
        Ok(Vec::new())
    }
}

fn catalog() -> Arc<CategoryCatalog> {
    Arc::new(
        CategoryCatalog::from_listings(
            vec![
                Some("American elm".into()),
                Some("ginkgo".into()),
                Some("pin oak".into()),
            ],
            vec![Some("None".into())],
        )
        .expect("catalog"),
    )
}

fn rows(health: &str, count: u64) -> Vec<RawCountRow> {
    vec![RawCountRow::new("Bronx", "None", health, count)]
}

async fn wait_for_species(controller: &ReactiveController, species: &str) -> Arc<Publication> {
    let mut published = controller.subscribe();
    timeout(WAIT, async {
        loop {
            if let Some(current) = published.borrow_and_update().clone() {
                if current.species == species {
                    return current;
                }
            }
            published.changed().await.expect("controller dropped");
        }
    })
    .await
    .expect("publication timed out")
}

async fn wait_for_failure(
    events: &mut broadcast::Receiver<ControllerEvent>,
) -> (String, ApiError) {
    timeout(WAIT, async {
        loop {
            if let ControllerEvent::Failed { species, error } = events.recv().await.expect("event") {
                return (species, error);
            }
        }
    })
    .await
    .expect("failure timed out")
}

#[tokio::test]
async fn first_selection_publishes_a_full_triple() {
    let provider = Arc::new(TestProvider::default().with_rows("ginkgo", rows("Good", 3)));
    let controller = ReactiveController::new(provider, catalog());

    assert_eq!(controller.select("ginkgo").await, SelectionOutcome::Started);
    let publication = wait_for_species(&controller, "ginkgo").await;

    assert_eq!(publication.generation, 1);
    assert_eq!(publication.charts.city.species, "ginkgo");
    assert_eq!(publication.charts.city.total, 3);
    assert_eq!(publication.charts.boroughs.pies[0].total, 3);
    assert_eq!(publication.charts.steward.facets[0].bars.len(), 1);

    let status = controller.status().await;
    assert_eq!(status.phase, ControllerPhase::Idle);
    assert_eq!(status.published_species.as_deref(), Some("ginkgo"));
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn identical_selection_is_a_no_op() {
    let provider = Arc::new(TestProvider::default().with_rows("ginkgo", rows("Good", 3)));
    let controller = ReactiveController::new(provider.clone(), catalog());

    controller.select("ginkgo").await;
    wait_for_species(&controller, "ginkgo").await;
    assert_eq!(controller.select("ginkgo").await, SelectionOutcome::Unchanged);

    assert_eq!(provider.calls_for("ginkgo"), 1);
    assert_eq!(controller.status().await.generation, 1);
}

#[tokio::test]
async fn newer_selection_supersedes_slow_one() {
    let gate = Arc::new(Notify::new());
    let provider = Arc::new(
        TestProvider::default()
            .with_rows("American elm", rows("Poor", 1))
            .with_rows("ginkgo", rows("Good", 2))
            .gated("American elm", gate.clone()),
    );
    let controller = ReactiveController::new(provider, catalog());
    let mut events = controller.subscribe_events();

    assert_eq!(controller.select("American elm").await, SelectionOutcome::Started);
    assert_eq!(controller.status().await.phase, ControllerPhase::Computing);
    assert_eq!(controller.select("ginkgo").await, SelectionOutcome::Started);

    let publication = wait_for_species(&controller, "ginkgo").await;
    assert_eq!(publication.generation, 2);

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let current = controller.current().expect("publication");
    assert_eq!(current.species, "ginkgo");
    assert_eq!(current.generation, 2);

    let first = events.recv().await.expect("event");
    assert!(matches!(
        first,
        ControllerEvent::Superseded { ref species, generation: 1 } if species == "American elm"
    ));
}

#[tokio::test]
async fn returning_to_held_selection_cancels_without_refetch() {
    let gate = Arc::new(Notify::new());
    let provider = Arc::new(
        TestProvider::default()
            .with_rows("ginkgo", rows("Good", 2))
            .with_rows("pin oak", rows("Fair", 4))
            .gated("pin oak", gate.clone()),
    );
    let controller = ReactiveController::new(provider.clone(), catalog());

    controller.select("ginkgo").await;
    wait_for_species(&controller, "ginkgo").await;

    assert_eq!(controller.select("pin oak").await, SelectionOutcome::Started);
    assert_eq!(controller.select("ginkgo").await, SelectionOutcome::Restored);
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = controller.status().await;
    assert_eq!(status.phase, ControllerPhase::Idle);
    assert_eq!(status.requested_species.as_deref(), Some("ginkgo"));
    assert_eq!(controller.current().expect("publication").species, "ginkgo");
    assert_eq!(provider.calls_for("ginkgo"), 1);
}

#[tokio::test]
async fn unknown_category_keeps_previous_triple() {
    let provider = Arc::new(
        TestProvider::default()
            .with_rows("ginkgo", rows("Good", 2))
            .with_rows("American elm", rows("Dead", 1)),
    );
    let controller = ReactiveController::new(provider.clone(), catalog());
    let mut events = controller.subscribe_events();

    controller.select("ginkgo").await;
    let before = wait_for_species(&controller, "ginkgo").await;

    assert_eq!(controller.select("American elm").await, SelectionOutcome::Started);
    let (species, error) = wait_for_failure(&mut events).await;
    assert_eq!(species, "American elm");
    assert_eq!(error.code, ErrorCode::UnknownCategory);

    let current = controller.current().expect("publication");
    assert_eq!(current.species, "ginkgo");
    assert_eq!(current.charts, before.charts);

    let status = controller.status().await;
    assert_eq!(status.phase, ControllerPhase::Idle);
    assert_eq!(status.requested_species.as_deref(), Some("ginkgo"));
    assert_eq!(
        status.last_error.map(|e| e.code),
        Some(ErrorCode::UnknownCategory)
    );

    // The failed selection can be retried.
    assert_eq!(controller.select("American elm").await, SelectionOutcome::Started);
    wait_for_failure(&mut events).await;
    assert_eq!(provider.calls_for("American elm"), 2);
}

#[tokio::test]
async fn provider_failure_is_surfaced_and_selection_stays_changeable() {
    let provider = Arc::new(
        TestProvider::default()
            .with_rows("ginkgo", rows("Good", 2))
            .failing("pin oak"),
    );
    let controller = ReactiveController::new(provider, catalog());
    let mut events = controller.subscribe_events();

    controller.select("pin oak").await;
    let (species, error) = wait_for_failure(&mut events).await;
    assert_eq!(species, "pin oak");
    assert_eq!(error.code, ErrorCode::Provider);
    assert!(controller.current().is_none());
    assert!(controller.status().await.requested_species.is_none());

    controller.select("ginkgo").await;
    let publication = wait_for_species(&controller, "ginkgo").await;
    assert!(controller.status().await.last_error.is_none());
    assert_eq!(publication.charts.city.total, 2);
}

#[tokio::test]
async fn species_without_data_publishes_placeholders() {
    let provider = Arc::new(TestProvider::default());
    let controller = ReactiveController::new(provider, catalog());

    controller.select("pin oak").await;
    let publication = wait_for_species(&controller, "pin oak").await;
    assert!(publication.charts.city.is_empty());
    assert!(publication.charts.boroughs.is_empty());
    assert!(publication.charts.steward.is_empty());
}
