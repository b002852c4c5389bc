//! In-process SimpleTSDB stand-in used by the client tests.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use simpletsdb::{
    DeleteDownsamplerRequest, DeletePointsRequest, Downsampler, Point, PointValue,
    QueryPointsRequest, Tags,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub metric: String,
    pub tags: Tags,
    pub point: Point,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub points: Vec<StoredPoint>,
    pub downsamplers: Vec<Downsampler>,
    pub next_id: i64,
    pub insert_bodies: Vec<String>,
    pub insert_content_types: Vec<String>,
}

pub type SharedState = Arc<Mutex<MockState>>;

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: SharedState,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = SharedState::default();
        let app = Router::new()
            .route("/insert_points", post(insert_points))
            .route("/query_points", post(query_points))
            .route("/delete_points", delete(delete_points))
            .route("/add_downsampler", post(add_downsampler))
            .route("/add_downsamplers", post(add_downsamplers))
            .route("/list_downsamplers", get(list_downsamplers))
            .route("/delete_downsampler", delete(delete_downsampler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).into_inner())
            .with_state(state.clone());

        let addr = serve(app).await;
        Self { addr, state }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// A server answering every request with the same status and body.
pub async fn fixed_response(status: StatusCode, body: &'static str) -> SocketAddr {
    let app = Router::new().fallback(move || async move {
        (status, [(header::CONTENT_TYPE, "application/json")], body)
    });
    serve(app).await
}

/// A server that answers only after `delay`.
pub async fn slow_response(delay: Duration) -> SocketAddr {
    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        (StatusCode::OK, "[]")
    });
    serve(app).await
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() }))).into_response()
}

fn parse_line(line: &str) -> Result<StoredPoint, String> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("malformed line: {}", line));
    }
    if parts[0].is_empty() {
        return Err("bad metric".to_string());
    }

    let mut tags = Tags::new();
    for pair in parts[1].split(' ').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("malformed tag: {}", pair))?;
        tags.insert(key.to_string(), value.to_string());
    }

    let (value, timestamp) = parts[2]
        .split_once(' ')
        .ok_or_else(|| format!("malformed point: {}", parts[2]))?;
    let value = if let Ok(v) = value.parse::<i64>() {
        PointValue::Integer(v)
    } else if let Ok(v) = value.parse::<f64>() {
        PointValue::Float(v)
    } else {
        PointValue::Text(value.to_string())
    };
    let timestamp = timestamp
        .parse::<i64>()
        .map_err(|e| format!("bad timestamp: {}", e))?;

    Ok(StoredPoint {
        metric: parts[0].to_string(),
        tags,
        point: Point::new(value, timestamp),
    })
}

fn tags_match(stored: &Tags, filter: Option<&Tags>) -> bool {
    filter.map_or(true, |filter| {
        filter.iter().all(|(k, v)| stored.get(k) == Some(v))
    })
}

async fn insert_points(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut parsed = Vec::new();
    for line in body.lines().filter(|l| !l.is_empty()) {
        match parse_line(line) {
            Ok(point) => parsed.push(point),
            Err(message) => return bad_request(message),
        }
    }

    let mut state = state.lock().unwrap();
    state.insert_bodies.push(body);
    state.insert_content_types.push(content_type);
    state.points.extend(parsed);
    StatusCode::OK.into_response()
}

async fn query_points(
    State(state): State<SharedState>,
    Json(query): Json<QueryPointsRequest>,
) -> Response {
    if query.metric.is_empty() {
        return bad_request("bad metric");
    }

    let state = state.lock().unwrap();
    let end = query.end.unwrap_or(i64::MAX);
    let mut points: Vec<Point> = state
        .points
        .iter()
        .filter(|p| p.metric == query.metric)
        .filter(|p| p.point.timestamp >= query.start && p.point.timestamp <= end)
        .filter(|p| tags_match(&p.tags, query.tags.as_ref()))
        .map(|p| p.point.clone())
        .collect();
    points.sort_by_key(|p| std::cmp::Reverse(p.timestamp));
    if let Some(n) = query.n.filter(|n| *n > 0) {
        points.truncate(n as usize);
    }

    Json(points).into_response()
}

async fn delete_points(
    State(state): State<SharedState>,
    Json(request): Json<DeletePointsRequest>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.points.retain(|p| {
        !(p.metric == request.metric
            && p.point.timestamp >= request.start
            && p.point.timestamp <= request.end
            && tags_match(&p.tags, request.tags.as_ref()))
    });
    StatusCode::OK.into_response()
}

fn register(state: &mut MockState, mut downsampler: Downsampler) -> Result<(), String> {
    if downsampler.out_metric.is_empty() {
        return Err("out_metric is required".to_string());
    }
    downsampler.id = Some(state.next_id);
    state.next_id += 1;
    state.downsamplers.push(downsampler);
    Ok(())
}

async fn add_downsampler(
    State(state): State<SharedState>,
    Json(downsampler): Json<Downsampler>,
) -> Response {
    let mut state = state.lock().unwrap();
    match register(&mut state, downsampler) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(message) => bad_request(message),
    }
}

async fn add_downsamplers(
    State(state): State<SharedState>,
    Json(downsamplers): Json<Vec<Downsampler>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if downsamplers.iter().any(|d| d.out_metric.is_empty()) {
        return bad_request("out_metric is required");
    }
    for downsampler in downsamplers {
        if let Err(message) = register(&mut state, downsampler) {
            return bad_request(message);
        }
    }
    StatusCode::OK.into_response()
}

async fn list_downsamplers(State(state): State<SharedState>) -> Json<Vec<Downsampler>> {
    Json(state.lock().unwrap().downsamplers.clone())
}

async fn delete_downsampler(
    State(state): State<SharedState>,
    Json(request): Json<DeleteDownsamplerRequest>,
) -> Response {
    let mut state = state.lock().unwrap();
    let before = state.downsamplers.len();
    state.downsamplers.retain(|d| d.id != Some(request.id));
    if state.downsamplers.len() == before {
        return bad_request(format!("downsampler {} not found", request.id));
    }
    StatusCode::OK.into_response()
}
