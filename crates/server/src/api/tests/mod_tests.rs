use super::*;
use std::time::Duration;

use axum::{body, body::Body, http::Request};
use controller::ReactiveController;
use pipeline::CategoryCatalog;
use provider::FixtureProvider;
use shared::domain::RawCountRow;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn test_app(select_initial: bool) -> (Router, Arc<ReactiveController>) {
    let provider = FixtureProvider::new()
        .with_rows(
            "American elm",
            vec![
                RawCountRow::new("Bronx", "1or2", "Good", 10),
                RawCountRow::new("Bronx", "1or2", "Poor", 5),
            ],
        )
        .with_rows("ginkgo", vec![RawCountRow::new("Queens", "None", "Fair", 3)])
        .with_rows("pin oak", vec![RawCountRow::new("Bronx", "None", "Dead", 2)])
        .with_steward_listing(vec![Some("None".into()), Some("1or2".into()), None]);
    let catalog = CategoryCatalog::bootstrap(&provider).await.expect("catalog");
    let controller = ReactiveController::new(Arc::new(provider), Arc::new(catalog));

    if select_initial {
        let initial = controller.catalog().default_species().to_string();
        controller.select(initial.clone()).await;
        wait_for(&controller, &initial).await;
    }

    let app = build_router(Arc::new(AppState {
        controller: controller.clone(),
    }));
    (app, controller)
}

async fn wait_for(controller: &ReactiveController, species: &str) {
    let mut published = controller.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        published.wait_for(|current| {
            current
                .as_ref()
                .map(|publication| publication.species == species)
                .unwrap_or(false)
        }),
    )
    .await
    .expect("publication timed out")
    .expect("controller dropped");
}

async fn get_json<T: serde::de::DeserializeOwned>(app: &Router, uri: &str) -> (StatusCode, T) {
    let request = Request::get(uri).body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

async fn serve_ws(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("ws://{addr}/ws")
}

async fn next_event(socket: &mut WsClient) -> DashboardEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("frame timed out")
            .expect("socket closed")
            .expect("frame");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).expect("event json");
        }
    }
}

fn select_request(species: &str) -> Request<Body> {
    Request::post("/selection")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "species": species }).to_string(),
        ))
        .expect("request")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _controller) = test_app(false).await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn catalog_lists_species_and_canonical_sets() {
    let (app, _controller) = test_app(false).await;
    let (status, catalog): (_, CatalogSummary) = get_json(&app, "/catalog").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(catalog.species, ["American elm", "ginkgo", "pin oak"]);
    assert_eq!(catalog.stewards, ["None", "1or2", "Unknown"]);
    assert_eq!(catalog.default_species, "American elm");
    assert_eq!(catalog.health_levels, ["Good", "Fair", "Poor"]);
    assert_eq!(catalog.colors.unknown, "#696463");
}

#[tokio::test]
async fn charts_are_not_found_before_first_publication() {
    let (app, _controller) = test_app(false).await;
    let (status, error): (_, ApiError) = get_json(&app, "/charts").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn charts_route_serves_the_published_triple() {
    let (app, _controller) = test_app(true).await;
    let (status, publication): (_, Publication) = get_json(&app, "/charts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(publication.species, "American elm");
    assert_eq!(publication.charts.city.total, 15);
    assert_eq!(publication.charts.boroughs.pies.len(), 5);

    let (status, spec): (_, ChartSpec) = get_json(&app, "/charts/steward").await;
    assert_eq!(status, StatusCode::OK);
    let ChartSpec::StewardBarFacet(facet) = spec else {
        panic!("expected steward facet");
    };
    let bar = &facet.facets[0].bars[0];
    assert_eq!(bar.steward, "1or2");
    assert!((bar.segments[0].percent - 66.666_666_7).abs() < 1e-6);
}

#[tokio::test]
async fn unknown_species_selection_is_rejected() {
    let (app, controller) = test_app(true).await;
    let response = app
        .oneshot(select_request("baobab"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        controller.current().expect("publication").species,
        "American elm"
    );
}

#[tokio::test]
async fn selection_route_starts_a_new_pass() {
    let (app, controller) = test_app(true).await;

    let response = app
        .clone()
        .oneshot(select_request("ginkgo"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let dto: SelectionResponse = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(dto.outcome, SelectionOutcome::Started);

    wait_for(&controller, "ginkgo").await;
    let (_, status): (_, StatusSummary) = get_json(&app, "/status").await;
    assert_eq!(status.published_species.as_deref(), Some("ginkgo"));
    assert_eq!(status.generation, 2);

    let response = app
        .oneshot(select_request("ginkgo"))
        .await
        .expect("response");
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let dto: SelectionResponse = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(dto.outcome, SelectionOutcome::Unchanged);
}

#[tokio::test]
async fn oversized_selection_body_is_rejected() {
    let (app, _controller) = test_app(false).await;
    let species = "x".repeat(MAX_REQUEST_BODY_BYTES * 2);
    let response = app
        .oneshot(select_request(&species))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn unknown_chart_kind_is_a_validation_error() {
    let (app, _controller) = test_app(true).await;
    let (status, error): (_, ApiError) = get_json(&app, "/charts/radar").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.code, ErrorCode::Validation);
    assert!(error.message.contains("radar"));
}

#[tokio::test]
async fn websocket_sends_held_charts_then_failure_banner() {
    let (app, controller) = test_app(true).await;
    let url = serve_ws(app.clone()).await;
    let (mut socket, _) = connect_async(url).await.expect("connect");

    match next_event(&mut socket).await {
        DashboardEvent::Published { publication } => {
            assert_eq!(publication.species, "American elm");
            assert_eq!(publication.charts.city.total, 15);
        }
        other => panic!("expected held publication, got {other:?}"),
    }

    assert_eq!(controller.select("pin oak").await, SelectionOutcome::Started);
    match next_event(&mut socket).await {
        DashboardEvent::Failed { species, error } => {
            assert_eq!(species, "pin oak");
            assert_eq!(error.code, ErrorCode::UnknownCategory);
            assert!(error.message.contains("Dead"));
        }
        other => panic!("expected failure banner, got {other:?}"),
    }

    let (status, publication): (_, Publication) = get_json(&app, "/charts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(publication.species, "American elm");
    assert_eq!(publication.charts.city.total, 15);
}
