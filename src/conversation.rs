use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::models::{Message, QueryResult};
use crate::query_client::QueryBackend;

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Blank,
    InFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The bot message appended for this submission.
    Answered(Message),
    Rejected(Rejection),
}

impl SubmitOutcome {
    pub fn reply(&self) -> Option<&Message> {
        match self {
            SubmitOutcome::Answered(message) => Some(message),
            SubmitOutcome::Rejected(_) => None,
        }
    }
}

/// What a renderer needs to draw the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub in_flight: bool,
}

#[derive(Debug, Default)]
struct ConversationState {
    transcript: Vec<Message>,
    in_flight: bool,
}

/// Owns the transcript and the in-flight flag. Only `submit` mutates them.
pub struct Conversation {
    state: Mutex<ConversationState>,
    backend: Arc<dyn QueryBackend>,
}

impl Conversation {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            state: Mutex::new(ConversationState::default()),
            backend,
        }
    }

    // Never held across an await, so a poisoned lock still has consistent data.
    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.lock().transcript.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            messages: state.transcript.clone(),
            in_flight: state.in_flight,
        }
    }

    /// Appends the question, asks the backend, then appends exactly one bot
    /// message. Blank questions and submissions made while another is pending
    /// are ignored.
    pub async fn submit(&self, question: &str) -> SubmitOutcome {
        if question.trim().is_empty() {
            debug!("ignoring blank question");
            return SubmitOutcome::Rejected(Rejection::Blank);
        }

        {
            let mut state = self.lock();
            if state.in_flight {
                debug!("ignoring question while another is in flight");
                return SubmitOutcome::Rejected(Rejection::InFlight);
            }
            state.transcript.push(Message::user(question));
            state.in_flight = true;
        }
        let pending = PendingReply {
            conversation: self,
            reply: None,
        };

        info!(%question, "asking car bot");
        let result = AssertUnwindSafe(self.backend.ask(question))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!("car bot backend panicked, answering with fallback");
                QueryResult::fallback()
            });

        SubmitOutcome::Answered(pending.settle(result))
    }
}

/// Appends the bot message and clears the in-flight flag when dropped. If
/// the submission is dropped before the backend answers, the fallback is
/// appended so every user message keeps its bot reply.
struct PendingReply<'a> {
    conversation: &'a Conversation,
    reply: Option<Message>,
}

impl PendingReply<'_> {
    fn settle(mut self, result: QueryResult) -> Message {
        let reply = Message::bot(result);
        self.reply = Some(reply.clone());
        reply
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        let reply = self.reply.take().unwrap_or_else(|| {
            warn!("submission dropped before the car bot answered, appending fallback");
            Message::bot(QueryResult::fallback())
        });
        let mut state = self.conversation.lock();
        state.transcript.push(reply);
        state.in_flight = false;
    }
}
