//! Read-only HTTP query for non-moving drones

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::Uri;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::store::PositionTable;

struct QueryState<K: Eq + Hash> {
    table: Arc<PositionTable<K>>,
    default_age_ms: u64,
}

impl<K: Eq + Hash> Clone for QueryState<K> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            default_age_ms: self.default_age_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgeQuery {
    #[serde(rename = "olderThanMs")]
    older_than_ms: Option<u64>,
}

/// Build the query router
///
/// - `GET /nonMovingDrones[?olderThanMs=N]` → sorted JSON array of ids
/// - anything else → `Request ignored: <path>`
pub fn router<K>(table: Arc<PositionTable<K>>, default_age_ms: u64) -> Router
where
    K: Eq + Hash + Ord + Clone + Debug + Serialize + Send + Sync + 'static,
{
    Router::new()
        .route("/nonMovingDrones", get(non_moving_drones::<K>))
        .fallback(ignored)
        .with_state(QueryState {
            table,
            default_age_ms,
        })
}

/// Serve `router` on `listener` until the server fails
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
    info!("HTTP query server listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn non_moving_drones<K>(
    State(state): State<QueryState<K>>,
    Query(query): Query<AgeQuery>,
) -> Json<Vec<K>>
where
    K: Eq + Hash + Ord + Clone + Debug + Serialize + Send + Sync + 'static,
{
    let age_ms = query.older_than_ms.unwrap_or(state.default_age_ms);
    let mut ids = state.table.ids_older_than(age_ms);
    ids.sort_unstable();
    Json(ids)
}

async fn ignored(uri: Uri) -> String {
    format!("Request ignored: {}", uri.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ManualClock;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use fleetgeo_shared::PositionReport;
    use tower::ServiceExt;

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn six_drone_table() -> Arc<PositionTable<u32>> {
        let clock = Arc::new(ManualClock::new(0));
        let table = Arc::new(PositionTable::with_clock(clock.clone()));
        let stamps = [
            1522951209000,
            1522951211000,
            1522951202000,
            1522951212000,
            1522951204000,
            1522951200500,
        ];
        for (i, stamp) in stamps.into_iter().enumerate() {
            clock.set(stamp);
            table.insert_report(i as u32 + 1, PositionReport::new(31.9724315 + i as f64, 23.7573327));
        }
        clock.set(1522951212500);
        table
    }

    #[tokio::test]
    async fn test_unrecognized_path_ignored() {
        let app = router(Arc::new(PositionTable::<u32>::new()), 10_000);
        let (status, body) = get_text(app, "/test").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Request ignored: /test");
    }

    #[tokio::test]
    async fn test_empty_table_yields_empty_list() {
        let app = router(Arc::new(PositionTable::<u32>::new()), 10_000);
        let (status, body) = get_text(app, "/nonMovingDrones").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");
    }

    #[tokio::test]
    async fn test_non_moving_drones_found() {
        let app = router(six_drone_table(), 10_000);
        let (status, body) = get_text(app, "/nonMovingDrones").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[3,6]");
    }

    #[tokio::test]
    async fn test_age_override() {
        let app = router(six_drone_table(), 10_000);
        let (_, body) = get_text(app, "/nonMovingDrones?olderThanMs=3000").await;
        assert_eq!(body, "[1,3,5,6]");
    }
}
