//! API Service - Tourism & Culture Funding Insights
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /pages - List dashboard pages
//! - GET /pages/:page/regions - Region filter options for a page
//! - GET /pages/:page?state= - Render a page, optionally for one region

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use insights::region::ALL;
use insights::telemetry::init_tracing;
use insights::tourism::{self, Datasets};
use insights::{Dashboard, Filter, Page, PageView, PgWarehouse, Settings, Warehouse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

// ============================================================================
// State
// ============================================================================

struct AppState<W> {
    warehouse: W,
    dashboard: Dashboard,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct PageSummary {
    id: String,
    title: String,
}

#[derive(Serialize)]
struct PageResponse {
    #[serde(flatten)]
    view: PageView,
    generated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct PageQuery {
    state: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn pages_handler<W: Warehouse + 'static>(
    State(state): State<Arc<AppState<W>>>,
) -> Json<Vec<PageSummary>> {
    Json(
        state
            .dashboard
            .pages()
            .iter()
            .map(|p| PageSummary {
                id: p.id.clone(),
                title: p.title.clone(),
            })
            .collect(),
    )
}

fn find_page<'a, W>(state: &'a AppState<W>, id: &str) -> Result<&'a Page, Response> {
    state
        .dashboard
        .page(id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("Unknown page: {id}")))
}

async fn regions_handler<W: Warehouse + 'static>(
    State(state): State<Arc<AppState<W>>>,
    Path(page_id): Path<String>,
) -> Response {
    let page = match find_page(&state, &page_id) {
        Ok(page) => page,
        Err(resp) => return resp,
    };

    match page.regions(&state.warehouse).await {
        Ok(regions) => {
            let options: Vec<String> = std::iter::once(ALL.to_string())
                .chain(regions.iter().map(|r| r.as_str().to_string()))
                .collect();
            Json(options).into_response()
        }
        Err(e) => {
            warn!(page = %page_id, error = %e, "region catalog unavailable");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn page_handler<W: Warehouse + 'static>(
    State(state): State<Arc<AppState<W>>>,
    Path(page_id): Path<String>,
    Query(params): Query<PageQuery>,
) -> Response {
    let page = match find_page(&state, &page_id) {
        Ok(page) => page,
        Err(resp) => return resp,
    };

    // the selection must be one of the options the page offers
    let regions = match page.regions(&state.warehouse).await {
        Ok(regions) => regions,
        Err(e) => {
            warn!(page = %page_id, error = %e, "region catalog unavailable");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
        }
    };
    let filter = Filter::parse(params.state.as_deref());
    if let Some(region) = filter.region() {
        if !regions.contains(region) {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Unknown state for {page_id}: {region}"),
            );
        }
    }

    let view = page.render(&state.warehouse, &filter).await;
    Json(PageResponse {
        view,
        generated_at: Utc::now(),
    })
    .into_response()
}

// ============================================================================
// Router
// ============================================================================

fn build_router<W: Warehouse + 'static>(warehouse: W, dashboard: Dashboard) -> Router {
    let state = Arc::new(AppState {
        warehouse,
        dashboard,
    });

    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/pages", get(pages_handler::<W>))
        .route("/pages/:page", get(page_handler::<W>))
        .route("/pages/:page/regions", get(regions_handler::<W>))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env().context("Invalid configuration")?;
    init_tracing(settings.log_json);

    info!(bind = %settings.api_bind, "starting tourism insights api");

    let warehouse = PgWarehouse::connect(&settings)
        .await
        .context("Failed to connect to database")?;
    info!("database connected");

    let dashboard = tourism::dashboard(&Datasets::standard());
    let pages: Vec<&str> = dashboard.pages().iter().map(|p| p.id.as_str()).collect();
    info!(?pages, "dashboard configured");

    let app = build_router(warehouse, dashboard);

    let listener = tokio::net::TcpListener::bind(&settings.api_bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.api_bind))?;
    info!(addr = %settings.api_bind, "api listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use insights::{MemoryWarehouse, Table, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn warehouse() -> MemoryWarehouse {
        let row = |state: &str, base: f64| -> Vec<Value> {
            std::iter::once(Value::from(state))
                .chain((0..10).map(|i| Value::Float(base + i as f64)))
                .collect()
        };
        let visits = Table::new(
            ["STATE"]
                .into_iter()
                .chain(["DTV19", "DTV20", "DTV21", "DTV22", "DTV23"])
                .chain(["FTV19", "FTV20", "FTV21", "FTV22", "FTV23"]),
        )
        .with_rows(vec![
            row("Goa", 10.0),
            row("Kerala", 20.0),
            row("Total", 30.0),
        ]);
        let experiences = Table::new(["STATE", "DESTINATION", "NAME_OF_EXPERIENCE"]).with_rows(vec![
            vec!["KERALA".into(), "Munnar".into(), "Tea Trails".into()],
        ]);
        MemoryWarehouse::new()
            .with_table(tourism::VISITS, visits)
            .with_table(tourism::EXPERIENCES, experiences)
    }

    async fn serve() -> std::net::SocketAddr {
        let app = build_router(warehouse(), tourism::dashboard(&Datasets::standard()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
        addr
    }

    /// One-shot GET over a fresh connection; the server closes it after the
    /// response, so reading to EOF yields the whole message.
    async fn get_json(addr: std::net::SocketAddr, path: &str) -> (u16, serde_json::Value) {
        let mut stream = tokio::net::TcpStream::connect(addr)
            .await
            .expect("connect server");
        stream
            .write_all(format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n").as_bytes())
            .await
            .expect("write request");
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.expect("read response");
        let raw = String::from_utf8(raw).expect("utf8 response");

        let status: u16 = raw
            .strip_prefix("HTTP/1.1 ")
            .and_then(|rest| rest.get(..3))
            .and_then(|code| code.parse().ok())
            .expect("status line");
        let body_start = raw.find("\r\n\r\n").expect("end of headers") + 4;
        (status, serde_json::from_str(&raw[body_start..]).expect("json body"))
    }

    #[tokio::test]
    async fn health_and_page_list() {
        let addr = serve().await;

        let (status, health) = get_json(addr, "/health").await;
        assert_eq!(status, 200);
        assert_eq!(health["ok"], true);

        let (status, pages) = get_json(addr, "/pages").await;
        assert_eq!(status, 200);
        let ids: Vec<&str> = pages
            .as_array()
            .expect("page list")
            .iter()
            .filter_map(|p| p["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["festivals", "adventure", "visitors"]);
    }

    #[tokio::test]
    async fn regions_start_with_all() {
        let addr = serve().await;
        let (status, regions) = get_json(addr, "/pages/visitors/regions").await;
        assert_eq!(status, 200);
        assert_eq!(regions, serde_json::json!(["All", "Goa", "Kerala"]));
    }

    #[tokio::test]
    async fn page_renders_for_all_and_for_one_region() {
        let addr = serve().await;

        let (status, all) = get_json(addr, "/pages/visitors").await;
        assert_eq!(status, 200);
        assert_eq!(all["scope"], "All States");
        assert!(all["generated_at"].is_string());
        let section = &all["sections"][0];
        assert_eq!(section["id"], "visitor_trends");
        assert_eq!(section["status"], "ok");
        assert_eq!(section["tables"][0]["name"], "domestic");
        assert_eq!(section["tables"][0]["rows"].as_array().map(Vec::len), Some(10));

        let (status, goa) = get_json(addr, "/pages/visitors?state=Goa").await;
        assert_eq!(status, 200);
        assert_eq!(goa["scope"], "Goa");
        assert_eq!(
            goa["sections"][0]["tables"][1]["rows"][0],
            serde_json::json!(["Goa", "2019", 15.0])
        );
    }

    #[tokio::test]
    async fn unknown_page_and_state_are_rejected() {
        let addr = serve().await;

        let (status, body) = get_json(addr, "/pages/nowhere").await;
        assert_eq!(status, 404);
        assert!(body["error"].is_string());

        let (status, body) = get_json(addr, "/pages/visitors?state=Atlantis").await;
        assert_eq!(status, 400);
        assert!(body["error"]
            .as_str()
            .is_some_and(|e| e.contains("Atlantis")));
    }

    #[tokio::test]
    async fn unreachable_catalog_is_service_unavailable() {
        let addr = serve().await;
        // MOUNTAINSPORTS is not loaded
        let (status, body) = get_json(addr, "/pages/adventure?state=Kerala").await;
        assert_eq!(status, 503);
        assert!(body["error"]
            .as_str()
            .is_some_and(|e| e.contains("MOUNTAINSPORTS")));
    }
}
