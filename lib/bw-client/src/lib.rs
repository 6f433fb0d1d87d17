//! bw-client - typed, retrying client for Bitwarden vault objects
//!
//! Two interchangeable transports implement [`ObjectClient`]:
//! 1. `BW_SERVE_URL` set → [`RestClient`] against `bw serve`
//! 2. Otherwise → [`CliClient`] driving the local `bw` binary

mod client;
mod config;
mod envelope;
mod error;
mod filter;
mod models;
mod reconcile;
mod retry;

pub use client::{
    BwProcess, CLI_PATH_ENV, CliClient, CliClientBuilder, CommandOutput, CommandRunner,
    DEBUG_HTTP_ENV, ENDPOINT_ENV, HttpExchange, LoggingExchange, ObjectClient, RestClient,
    RestClientBuilder, SESSION_ENV, TransportCapabilities, create_attachment_reconciled,
    delete_object_ignore_missing, file_digest, find_attachment, get_object_ignore_missing,
};
pub use config::client_from_env;
pub use envelope::{decode, decode_ack, decode_list, decode_status};
pub use error::{BwError, NOT_FOUND_MESSAGE};
pub use filter::{ListFilter, append_args, to_query};
pub use models::{
    Attachment, Card, Field, Identity, ItemType, Login, LoginUri, MessageResult, Object,
    ObjectType, PasswordHistory, SecureNote, Status, VaultStatus,
};
pub use reconcile::AttachmentDiff;
pub use retry::RetryPolicy;
