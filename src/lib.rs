pub mod chat;
pub mod constants;
pub mod conversation;
pub mod models;
pub mod query_client;
pub mod render;
pub mod web_server;

pub use conversation::{Conversation, Rejection, Snapshot, SubmitOutcome};
pub use models::{CarRecord, Message, QueryResult, Role};
pub use query_client::{QueryBackend, QueryClient, QueryError};
