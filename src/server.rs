//! Web server for the map UI.
//!
//! Serves a single Leaflet page and a small JSON API over the session:
//! - Axum for HTTP server
//! - SSE (Server-Sent Events) to tell the page when markers changed
//! - Plain `fetch` calls from the page for the three user controls

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::client::{FeedSource, Timeframe, UsgsClient};
use crate::filters::FilterState;
use crate::session::Session;
use crate::view_model::Snapshot;

/// Shortest accepted auto-refresh period, in seconds.
pub const MIN_AUTO_REFRESH_SECS: u64 = 30;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub filter: FilterState,
    pub auto_refresh: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            filter: FilterState::default(),
            auto_refresh: None,
        }
    }
}

/// Shared application state.
pub struct AppState<S> {
    session: Arc<Session<S>>,
}

impl<S> AppState<S> {
    pub fn new(session: Arc<Session<S>>) -> Self {
        Self { session }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimeframeRequest {
    timeframe: Timeframe,
}

#[derive(Debug, Deserialize)]
struct MinMagnitudeRequest {
    min_magnitude: f64,
}

/// Create the Axum router with all routes.
pub fn create_router<S: FeedSource>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(sse_handler::<S>))
        .route("/api/markers", get(markers_handler::<S>))
        .route("/api/timeframe", post(timeframe_handler::<S>))
        .route("/api/min-magnitude", post(min_magnitude_handler::<S>))
        .route("/api/refresh", post(refresh_handler::<S>))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the web server.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let client = UsgsClient::new()?;
    let session = Arc::new(Session::new(client, config.filter));

    // Initial load for the configured timeframe
    session.refresh().await;

    if let Some(secs) = config.auto_refresh {
        let period = Duration::from_secs(secs.max(MIN_AUTO_REFRESH_SECS));
        tracing::info!("auto-refresh every {}s", period.as_secs());
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; the initial load already ran.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                session.refresh().await;
            }
        });
    }

    let app = create_router(AppState::new(session));

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("🌍 quakemap starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the map.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// SSE stream telling the page to re-read markers.
async fn sse_handler<S: FeedSource>(
    State(state): State<AppState<S>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.session.subscribe();
    // A lagged receiver missed some updates; one reload covers all of them.
    let stream = BroadcastStream::new(rx).map(|result| {
        let data = result.map_or_else(|_| "lagged".to_string(), |token| token.to_string());
        Ok::<_, Infallible>(Event::default().event("update").data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Current filter, status and markers.
async fn markers_handler<S: FeedSource>(State(state): State<AppState<S>>) -> Json<Snapshot> {
    Json(state.session.snapshot().await)
}

/// Timeframe selector changed.
async fn timeframe_handler<S: FeedSource>(
    State(state): State<AppState<S>>,
    Json(request): Json<TimeframeRequest>,
) -> Json<Snapshot> {
    Json(state.session.set_timeframe(request.timeframe).await)
}

/// Magnitude input changed.
async fn min_magnitude_handler<S: FeedSource>(
    State(state): State<AppState<S>>,
    Json(request): Json<MinMagnitudeRequest>,
) -> Result<Json<Snapshot>, (StatusCode, String)> {
    if !request.min_magnitude.is_finite() {
        return Err((
            StatusCode::BAD_REQUEST,
            "min_magnitude must be a finite number".to_string(),
        ));
    }
    Ok(Json(
        state.session.set_min_magnitude(request.min_magnitude).await,
    ))
}

/// Update button.
async fn refresh_handler<S: FeedSource>(State(state): State<AppState<S>>) -> Json<Snapshot> {
    Json(state.session.refresh().await)
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>quakemap</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <style>
        html, body { margin: 0; height: 100%; font-family: -apple-system, BlinkMacSystemFont, sans-serif; }
        #map { height: 100vh; width: 100%; }
        .controls {
            position: absolute; top: 10px; left: 50px; z-index: 1000;
            padding: 10px; background: white; border-radius: 8px;
            box-shadow: 0 2px 5px rgba(0,0,0,0.3); line-height: 1.9;
        }
        .status { font-size: 0.85em; color: #475569; }
        .status.unavailable { color: #b91c1c; font-weight: 600; }
    </style>
</head>
<body>
    <div class="controls">
        <label>Timeframe:
            <select id="timeframe">
                <option value="all_hour">Past Hour</option>
                <option value="all_day">Past Day</option>
                <option value="all_week">Past Week</option>
            </select>
        </label><br>
        <label>Min Magnitude:
            <input id="min-mag" type="number" step="0.1" value="0">
        </label><br>
        <button id="refresh">Update</button>
        <div id="status" class="status"></div>
    </div>
    <div id="map"></div>

    <script>
    const map = L.map('map').setView([20, 0], 2);
    L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
        attribution: '&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors'
    }).addTo(map);
    const layer = L.layerGroup().addTo(map);

    function popup(text) {
        const el = document.createElement('div');
        text.split('\n').forEach((line, i) => {
            const node = i === 0 ? document.createElement('b') : document.createElement('span');
            node.textContent = line;
            if (i > 0) el.appendChild(document.createElement('br'));
            el.appendChild(node);
        });
        return el;
    }

    function render(snapshot) {
        document.getElementById('timeframe').value = snapshot.filter.timeframe;
        const input = document.getElementById('min-mag');
        if (document.activeElement !== input) input.value = snapshot.filter.min_magnitude;

        layer.clearLayers();
        for (const m of snapshot.markers) {
            L.circleMarker([m.position.lat, m.position.lon], {
                radius: m.radius,
                fillColor: m.fill_color,
                color: '#000',
                weight: 1,
                fillOpacity: 0.7
            }).bindPopup(popup(m.popup_text)).addTo(layer);
        }

        const status = document.getElementById('status');
        status.className = 'status ' + snapshot.status;
        if (snapshot.failure) {
            status.textContent = 'Feed unavailable, showing last known data (' + snapshot.failure.message + ')';
        } else if (snapshot.status === 'loading') {
            status.textContent = 'Loading…';
        } else {
            status.textContent = snapshot.markers.length + ' of ' + snapshot.event_count + ' events shown';
        }
    }

    async function call(method, path, body) {
        const res = await fetch(path, {
            method,
            headers: body ? { 'Content-Type': 'application/json' } : {},
            body: body ? JSON.stringify(body) : undefined
        });
        if (res.ok) render(await res.json());
    }

    document.getElementById('timeframe').addEventListener('change', e =>
        call('POST', '/api/timeframe', { timeframe: e.target.value }));
    document.getElementById('min-mag').addEventListener('input', e => {
        const value = parseFloat(e.target.value);
        if (Number.isFinite(value)) call('POST', '/api/min-magnitude', { min_magnitude: value });
    });
    document.getElementById('refresh').addEventListener('click', () =>
        call('POST', '/api/refresh'));

    new EventSource('/stream').addEventListener('update', () => call('GET', '/api/markers'));
    call('GET', '/api/markers');
    </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::testing::{ScriptedSource, record};

    const FAST: Duration = Duration::from_millis(5);

    async fn spawn_app() -> (String, Arc<Session<ScriptedSource>>) {
        let source = ScriptedSource::default();
        source.respond(
            Timeframe::AllDay,
            FAST,
            vec![record("a", Some(1.0), 10.0), record("b", Some(4.5), 60.0)],
        );
        source.respond(Timeframe::AllWeek, FAST, vec![record("w", Some(6.2), 180.0)]);
        let session = Arc::new(Session::new(source, FilterState::default()));

        let app = create_router(AppState::new(Arc::clone(&session)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("no local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), session)
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let (base, _session) = spawn_app().await;
        let http = reqwest::Client::new();

        let health = http.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "OK");

        let page = http.get(&base).send().await.unwrap().text().await.unwrap();
        assert!(page.contains("leaflet"));
        assert!(page.contains("/api/min-magnitude"));
    }

    #[tokio::test]
    async fn test_refresh_then_markers() {
        let (base, session) = spawn_app().await;
        let http = reqwest::Client::new();

        let loading: Value = http
            .post(format!("{base}/api/refresh"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(loading["status"], "loading");

        session.settle().await;
        let snapshot: Value = http
            .get(format!("{base}/api/markers"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["status"], "ready");
        assert_eq!(snapshot["markers"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_timeframe_change_fetches() {
        let (base, session) = spawn_app().await;
        let http = reqwest::Client::new();

        let response: Value = http
            .post(format!("{base}/api/timeframe"))
            .json(&json!({ "timeframe": "all_week" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["filter"]["timeframe"], "all_week");

        session.settle().await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.shown_timeframe, Some(Timeframe::AllWeek));
        assert_eq!(snapshot.markers.len(), 1);
        assert_eq!(snapshot.markers[0].fill_color.as_str(), "red");
    }

    #[tokio::test]
    async fn test_min_magnitude_filters_locally() {
        let (base, session) = spawn_app().await;
        let http = reqwest::Client::new();
        session.refresh().await;
        session.settle().await;

        let snapshot: Value = http
            .post(format!("{base}/api/min-magnitude"))
            .json(&json!({ "min_magnitude": 4.0 }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let markers = snapshot["markers"].as_array().unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0]["id"], "b");
        assert_eq!(snapshot["event_count"], 2);
    }

    #[tokio::test]
    async fn test_rejects_unknown_timeframe() {
        let (base, _session) = spawn_app().await;
        let http = reqwest::Client::new();

        let response = http
            .post(format!("{base}/api/timeframe"))
            .json(&json!({ "timeframe": "all_month" }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
