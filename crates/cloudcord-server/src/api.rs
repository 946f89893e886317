use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use cloudcord_shared::UserId;
use cloudcord_store::{Conversation, User};

use crate::chat::ConversationService;
use crate::error::ServiceError;
use crate::social::{Recommendation, SocialGraphService};

#[derive(Clone)]
pub struct AppState {
    pub conversations: ConversationService,
    pub social: SocialGraphService,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Conversations
        .route("/send", post(send_message))
        .route("/chat", get(get_chat))
        // Users
        .route("/users", post(provision_user).get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/name", put(rename_user))
        .route("/users/:id/friends", get(list_friends))
        .route("/identities/:external_identity", get(get_user_by_identity))
        // Friendships
        .route("/friends", post(add_friend))
        .route("/friends/check", get(are_friends))
        .route("/recommendations", get(recommendations))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Deserialize)]
struct SendRequest {
    sender: String,
    receiver: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatQuery {
    user1: String,
    user2: String,
}

#[derive(Deserialize)]
struct ProvisionRequest {
    external_identity: String,
    display_name: String,
}

#[derive(Deserialize)]
struct RenameRequest {
    display_name: String,
}

#[derive(Deserialize)]
struct FriendRequest {
    user_id: UserId,
    friend_id: UserId,
}

#[derive(Deserialize)]
struct FriendCheckQuery {
    user_id: UserId,
    other_id: UserId,
}

#[derive(Serialize)]
struct FriendCheckResponse {
    are_friends: bool,
}

#[derive(Deserialize)]
struct RecommendationQuery {
    user_id: UserId,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Conversations ───

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state
        .conversations
        .send_message(&req.sender, &req.receiver, &req.content)
        .await?;
    Ok(Json(MessageResponse {
        message: "message sent",
    }))
}

/// Returns the conversation, creating an empty one on first read.
async fn get_chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<Conversation>, ServiceError> {
    let conversation = state
        .conversations
        .get_or_create(&query.user1, &query.user2)
        .await?;
    Ok(Json(conversation))
}

// ─── Users ───

async fn provision_user(
    State(state): State<AppState>,
    Json(req): Json<ProvisionRequest>,
) -> Result<Json<User>, ServiceError> {
    let user = state
        .social
        .provision_user(&req.external_identity, &req.display_name)
        .await?;
    Ok(Json(user))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ServiceError> {
    Ok(Json(state.social.list_users().await?))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, ServiceError> {
    Ok(Json(state.social.get_user(id).await?))
}

async fn get_user_by_identity(
    State(state): State<AppState>,
    Path(external_identity): Path<String>,
) -> Result<Json<User>, ServiceError> {
    Ok(Json(
        state
            .social
            .get_user_by_external_identity(&external_identity)
            .await?,
    ))
}

async fn rename_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<User>, ServiceError> {
    Ok(Json(state.social.rename_user(id, &req.display_name).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, ServiceError> {
    let user = state.social.delete_user(id).await?;
    info!(user_id = %id, "User deleted via API");
    Ok(Json(user))
}

async fn list_friends(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Vec<UserId>>, ServiceError> {
    Ok(Json(state.social.list_friends(id).await?))
}

// ─── Friendships ───

async fn add_friend(
    State(state): State<AppState>,
    Json(req): Json<FriendRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ServiceError> {
    state.social.add_friend(req.user_id, req.friend_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "friendship created",
        }),
    ))
}

async fn are_friends(
    State(state): State<AppState>,
    Query(query): Query<FriendCheckQuery>,
) -> Result<Json<FriendCheckResponse>, ServiceError> {
    let are_friends = state
        .social
        .are_friends(query.user_id, query.other_id)
        .await?;
    Ok(Json(FriendCheckResponse { are_friends }))
}

async fn recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<Vec<Recommendation>>, ServiceError> {
    Ok(Json(state.social.get_recommendations(query.user_id).await?))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use cloudcord_store::Stores;

    use super::*;
    use crate::events::testing::RecordingPublisher;

    fn app() -> Router {
        let stores = Stores::in_memory();
        let publisher = Arc::new(RecordingPublisher::default());
        build_router(AppState {
            conversations: ConversationService::new(
                stores.conversations.clone(),
                publisher.clone(),
            ),
            social: SocialGraphService::new(&stores, publisher),
        })
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn provision(app: &Router, name: &str) -> i64 {
        let (status, user) = call(
            app,
            Method::POST,
            "/users",
            Some(json!({ "external_identity": format!("auth0|{name}"), "display_name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        user["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_send_then_read_chat() {
        let app = app();

        let (status, body) = call(
            &app,
            Method::POST,
            "/send",
            Some(json!({ "sender": "B", "receiver": "A", "content": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "message sent");

        let (status, chat) = call(&app, Method::GET, "/chat?user1=A&user2=B", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(chat["pair_key"], json!(["A", "B"]));
        assert_eq!(chat["messages"][0]["content"], "hello");
        assert_eq!(chat["messages"][0]["sent_by_user"], "B");
    }

    #[tokio::test]
    async fn test_chat_read_creates_empty_conversation() {
        let (status, chat) = call(&app(), Method::GET, "/chat?user1=X&user2=Y", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(chat["messages"], json!([]));
    }

    #[tokio::test]
    async fn test_self_conversation_is_bad_request() {
        let (status, body) = call(
            &app(),
            Method::POST,
            "/send",
            Some(json!({ "sender": "A", "receiver": "A", "content": "me" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_friendship_flow() {
        let app = app();
        let a = provision(&app, "a").await;
        let b = provision(&app, "b").await;
        let c = provision(&app, "c").await;

        for (user_id, friend_id) in [(a, b), (b, c)] {
            let (status, _) = call(
                &app,
                Method::POST,
                "/friends",
                Some(json!({ "user_id": user_id, "friend_id": friend_id })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, check) = call(
            &app,
            Method::GET,
            &format!("/friends/check?user_id={b}&other_id={a}"),
            None,
        )
        .await;
        assert_eq!(check, json!({ "are_friends": true }));

        let (_, friends) = call(&app, Method::GET, &format!("/users/{b}/friends"), None).await;
        assert_eq!(friends, json!([a, c]));

        let (status, recs) = call(
            &app,
            Method::GET,
            &format!("/recommendations?user_id={a}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            recs,
            json!([{ "user_id": c, "display_name": "c", "mutual_friend_count": 1 }])
        );
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let app = app();
        let id = provision(&app, "alice").await;

        let (status, user) = call(
            &app,
            Method::PUT,
            &format!("/users/{id}/name"),
            Some(json!({ "display_name": "Alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["display_name"], "Alice");

        let (status, user) = call(&app, Method::GET, "/identities/auth0%7Calice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["id"], id);

        let (_, users) = call(&app, Method::GET, "/users", None).await;
        assert_eq!(users.as_array().map(Vec::len), Some(1));

        let (status, _) = call(&app, Method::DELETE, &format!("/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("Not found"));
    }

    #[tokio::test]
    async fn test_recommendations_for_unknown_user() {
        let (status, _) = call(&app(), Method::GET, "/recommendations?user_id=41", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
