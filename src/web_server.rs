use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Form, Json, Router,
};
use lru::LruCache;
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    net::SocketAddr,
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::conversation::{Conversation, Rejection, Snapshot, SubmitOutcome};
use crate::models::Message;
use crate::query_client::QueryBackend;
use crate::render::MessageView;

/// One conversation per browser session, least recently used dropped first.
pub struct Sessions {
    backend: Arc<dyn QueryBackend>,
    conversations: Mutex<LruCache<Uuid, Arc<Conversation>>>,
}

impl Sessions {
    pub fn new(backend: Arc<dyn QueryBackend>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            conversations: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<Uuid, Arc<Conversation>>> {
        self.conversations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Conversation>> {
        self.lock().get(id).cloned()
    }

    pub fn get_or_create(&self, id: Uuid) -> Arc<Conversation> {
        let mut conversations = self.lock();
        if let Some(conversation) = conversations.get(&id) {
            return conversation.clone();
        }
        debug!(%id, "starting conversation");
        let conversation = Arc::new(Conversation::new(self.backend.clone()));
        conversations.put(id, conversation.clone());
        conversation
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    sessions: Arc<Sessions>,
}

impl AppState {
    pub fn new(templates_dir: &str, sessions: Arc<Sessions>) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir)),
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub session: Option<String>,
}

impl SessionQuery {
    fn id(&self) -> Option<Uuid> {
        self.session.as_deref().and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// Form and JSON body for a question. Without a session a new one is started.
#[derive(Debug, Serialize, Deserialize)]
pub struct AskPayload {
    #[serde(default)]
    pub session: Option<Uuid>,
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskReply {
    pub session: Uuid,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Message>,
}

impl AskReply {
    fn new(session: Uuid, outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Answered(message) => Self {
                session,
                accepted: true,
                reason: None,
                reply: Some(message),
            },
            SubmitOutcome::Rejected(rejection) => Self {
                session,
                accepted: false,
                reason: Some(
                    match rejection {
                        Rejection::Blank => "blank",
                        Rejection::InFlight => "in_flight",
                    }
                    .to_string(),
                ),
                reply: None,
            },
        }
    }
}

fn create_minijinja_env(templates_dir: &str) -> AutoReloader {
    let dir = templates_dir.to_string();
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&dir));
        notifier.watch_path(&dir, true);
        Ok(env)
    })
}

fn empty_snapshot() -> Snapshot {
    Snapshot {
        messages: Vec::new(),
        in_flight: false,
    }
}

// A plain `/` always starts a fresh session, so reloading clears the chat.
async fn index_handler(State(state): State<AppState>, Query(query): Query<SessionQuery>) -> Response {
    let (session, snapshot) = match query
        .id()
        .and_then(|id| state.sessions.get(&id).map(|c| (id, c.snapshot())))
    {
        Some(found) => found,
        None => (Uuid::new_v4(), empty_snapshot()),
    };
    let messages: Vec<MessageView> = snapshot.messages.iter().map(MessageView::from).collect();

    let rendered = state.templates.acquire_env().and_then(|env| {
        env.get_template("index.html").and_then(|tmpl| {
            tmpl.render(minijinja::context! {
                title => "Car Sales Chatbot",
                session => session.to_string(),
                messages => messages,
                in_flight => snapshot.in_flight,
            })
        })
    });

    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        }
    }
}

// Script-less fallback: wait on the POST, then show the session's transcript.
async fn ask_form_handler(
    State(state): State<AppState>,
    Form(payload): Form<AskPayload>,
) -> Redirect {
    let session = payload.session.unwrap_or_else(Uuid::new_v4);
    let outcome = state
        .sessions
        .get_or_create(session)
        .submit(&payload.question)
        .await;
    if let SubmitOutcome::Rejected(reason) = outcome {
        info!(%session, ?reason, "form submission ignored");
    }
    Redirect::to(&format!("/?session={}", session))
}

async fn transcript_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<Snapshot> {
    let snapshot = query
        .id()
        .and_then(|id| state.sessions.get(&id))
        .map(|c| c.snapshot())
        .unwrap_or_else(empty_snapshot);
    Json(snapshot)
}

async fn api_ask_handler(
    State(state): State<AppState>,
    Json(payload): Json<AskPayload>,
) -> Json<AskReply> {
    let session = payload.session.unwrap_or_else(Uuid::new_v4);
    let outcome = state
        .sessions
        .get_or_create(session)
        .submit(&payload.question)
        .await;
    Json(AskReply::new(session, outcome))
}

pub fn build_router(state: AppState, static_dir: &str) -> Router {
    let static_files_service = ServeDir::new(static_dir).not_found_service(tower::service_fn(|_| async {
        Ok::<_, Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
    }));

    Router::new()
        .route("/", get(index_handler))
        .route("/ask", post(ask_form_handler))
        .route("/api/transcript", get(transcript_handler))
        .route("/api/ask", post(api_ask_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(
    port: u16,
    sessions: Arc<Sessions>,
    templates_dir: &str,
    static_dir: &str,
) -> Result<()> {
    let state = AppState::new(templates_dir, sessions);
    let app = build_router(state, static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryResult;
    use async_trait::async_trait;

    struct Apology;

    #[async_trait]
    impl QueryBackend for Apology {
        async fn ask(&self, _question: &str) -> QueryResult {
            QueryResult::fallback()
        }
    }

    #[test]
    fn test_sessions_are_separate() {
        let sessions = Sessions::new(Arc::new(Apology), 8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = sessions.get_or_create(a);
        assert!(Arc::ptr_eq(&first, &sessions.get_or_create(a)));
        assert!(!Arc::ptr_eq(&first, &sessions.get_or_create(b)));
        assert_eq!(sessions.len(), 2);
        assert!(sessions.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_sessions_evict_least_recently_used() {
        let sessions = Sessions::new(Arc::new(Apology), 2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        sessions.get_or_create(a);
        sessions.get_or_create(b);
        sessions.get(&a);
        sessions.get_or_create(c);

        assert_eq!(sessions.len(), 2);
        assert!(sessions.get(&a).is_some());
        assert!(sessions.get(&b).is_none());
        assert!(sessions.get(&c).is_some());
    }

    #[test]
    fn test_zero_capacity_keeps_one_session() {
        let sessions = Sessions::new(Arc::new(Apology), 0);
        assert!(sessions.is_empty());
        sessions.get_or_create(Uuid::new_v4());
        sessions.get_or_create(Uuid::new_v4());
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_session_query_parsing() {
        let id = Uuid::new_v4();
        let query = SessionQuery {
            session: Some(id.to_string()),
        };
        assert_eq!(query.id(), Some(id));
        assert_eq!(SessionQuery { session: Some("nope".to_string()) }.id(), None);
        assert_eq!(SessionQuery::default().id(), None);
    }
}
