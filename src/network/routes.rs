//! HTTP Routes
//!
//! Thin axum handlers over [`ScoreService`]. Each handler parses its path and
//! query, calls one service operation and maps the error taxonomy onto
//! status codes.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::core::player::PlayerRecord;
use crate::leaderboard::LeaderboardEntry;
use crate::network::protocol::{
    CreatePlayerParams, CurrentGameParams, ErrorBody, ErrorCode, HealthResponse,
    LeaderboardParams, RenameParams, ScoreParams,
};
use crate::service::{ScoreService, ServiceError};

/// Shared handler state.
pub type AppState = Arc<ScoreService>;

/// HTTP-facing error.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            ServiceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidInput),
            ServiceError::StoreUnavailable(_) => {
                warn!(error = %self.0, "store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::StoreUnavailable)
            }
            ServiceError::IndexWriteFailed(_) => {
                error!(error = %self.0, "leaderboard index failure");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::IndexWriteFailed)
            }
        };

        let body = ErrorBody {
            error: code,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Query string extractor that rejects with an [`ApiError`].
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError(ServiceError::InvalidInput(rejection.body_text())))?;
        Ok(Self(params))
    }
}

/// Build the application router.
pub fn router(service: Arc<ScoreService>) -> Router {
    Router::new()
        .route("/players/:id", post(create_player).get(get_player))
        .route("/players/:id/score", post(report_score))
        .route("/players/:id/rank", get(player_rank))
        .route("/players/:id/username", put(rename_player))
        .route("/players/:id/game", put(set_current_game))
        .route("/leaderboard", get(leaderboard))
        .route("/health", get(health))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

async fn create_player(
    State(service): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<CreatePlayerParams>,
) -> Result<Json<PlayerRecord>, ApiError> {
    let record = service.create_player(&id, params.username.as_deref()).await?;
    Ok(Json(record))
}

async fn get_player(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlayerRecord>, ApiError> {
    Ok(Json(service.get_player(&id).await?))
}

async fn report_score(
    State(service): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<ScoreParams>,
) -> Result<Json<PlayerRecord>, ApiError> {
    Ok(Json(service.report_score(&id, params.score).await?))
}

async fn player_rank(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LeaderboardEntry>, ApiError> {
    Ok(Json(service.rank_of(&id)?))
}

async fn rename_player(
    State(service): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<RenameParams>,
) -> Result<Json<PlayerRecord>, ApiError> {
    Ok(Json(service.rename_player(&id, &params.username).await?))
}

async fn set_current_game(
    State(service): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<CurrentGameParams>,
) -> Result<Json<PlayerRecord>, ApiError> {
    Ok(Json(service.set_current_game(&id, params.game_id).await?))
}

async fn leaderboard(
    State(service): State<AppState>,
    ApiQuery(params): ApiQuery<LeaderboardParams>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(service.leaderboard(params.limit)))
}

async fn health(State(service): State<AppState>) -> Json<HealthResponse> {
    let stored_players = match service.stored_players().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "health check could not count stored players");
            None
        }
    };
    let status = if stored_players.is_none() || service.index_stale() {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        players: service.ranked_players(),
        stored_players,
        version: crate::VERSION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::leaderboard::LeaderboardEngine;
    use crate::service::ServiceConfig;
    use crate::store::MemoryScoreStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let store = Arc::new(MemoryScoreStore::with_clock(clock.clone()));
        let service = ScoreService::new(store, LeaderboardEngine::new(), ServiceConfig::default());
        (router(Arc::new(service)), clock)
    }

    async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_create_and_get_player() {
        let (app, _) = test_app();

        let (status, body) = call(&app, Method::POST, "/players/p1?username=Alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["playerId"], "p1");
        assert_eq!(body["username"], "Alice");
        assert_eq!(body["totalScore"], 0);

        let (status, body) = call(&app, Method::GET, "/players/p1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "Alice");
        assert_eq!(body["lastSeen"], 1_700_000_000i64);
    }

    #[tokio::test]
    async fn test_missing_player_is_404() {
        let (app, _) = test_app();

        let (status, body) = call(&app, Method::GET, "/players/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = call(&app, Method::GET, "/players/ghost/rank").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_report_score_and_leaderboard() {
        let (app, clock) = test_app();

        call(&app, Method::POST, "/players/A/score?score=100").await;
        clock.advance(1);
        call(&app, Method::POST, "/players/B/score?score=100").await;
        clock.advance(1);
        let (status, body) = call(&app, Method::POST, "/players/C/score?score=50").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "C");
        assert_eq!(body["gameCount"], 1);

        let (status, body) = call(&app, Method::GET, "/leaderboard?limit=3").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r["playerId"].as_str().unwrap()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(rows[2]["rank"], 3);

        let (_, body) = call(&app, Method::GET, "/players/B/rank").await;
        assert_eq!(body["rank"], 2);
        assert_eq!(body["totalScore"], 100);
    }

    #[tokio::test]
    async fn test_negative_score_is_400() {
        let (app, _) = test_app();
        let (status, body) = call(&app, Method::POST, "/players/p1/score?score=-5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_bad_query_params_are_invalid_input() {
        let (app, _) = test_app();

        for (method, uri) in [
            (Method::POST, "/players/p1/score"),
            (Method::POST, "/players/p1/score?score=abc"),
            (Method::GET, "/leaderboard?limit=x"),
            (Method::PUT, "/players/p1/username"),
        ] {
            let (status, body) = call(&app, method, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], "invalid_input", "{uri}");
            assert!(body["message"].is_string(), "{uri}");
        }

        let (status, _) = call(&app, Method::GET, "/players/p1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rename_and_current_game_routes() {
        let (app, _) = test_app();
        call(&app, Method::POST, "/players/p1").await;

        let (status, body) = call(&app, Method::PUT, "/players/p1/username?username=Zed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "Zed");

        let (_, body) = call(&app, Method::PUT, "/players/p1/game?gameId=g42").await;
        assert_eq!(body["currentGameId"], "g42");

        let (_, body) = call(&app, Method::PUT, "/players/p1/game").await;
        assert!(body["currentGameId"].is_null());
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        call(&app, Method::POST, "/players/p1/score?score=1").await;

        let (status, body) = call(&app, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["players"], 1);
        assert_eq!(body["storedPlayers"], 1);
    }
}
