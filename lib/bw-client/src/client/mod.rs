mod cli;
mod exchange;
mod rest;
mod workflow;

pub use cli::{
    BwProcess, CLI_PATH_ENV, CliClient, CliClientBuilder, CommandOutput, CommandRunner, SESSION_ENV,
};
pub use exchange::{HttpExchange, LoggingExchange};
pub use rest::{DEBUG_HTTP_ENV, ENDPOINT_ENV, RestClient, RestClientBuilder};
pub use workflow::{
    create_attachment_reconciled, delete_object_ignore_missing, file_digest, find_attachment,
    get_object_ignore_missing,
};

use crate::error::BwError;
use crate::filter::ListFilter;
use crate::models::{Object, ObjectType, Status};
use async_trait::async_trait;
use std::path::Path;

/// Behaviors on which the two transports knowingly differ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    /// `delete_object` reports a missing object as [`BwError::NotFound`]
    pub delete_reports_not_found: bool,
    /// `get_attachment` reports a missing attachment as [`BwError::AttachmentNotFound`]
    pub distinguishes_missing_attachment: bool,
}

/// Operations on vault objects, implemented by every transport.
///
/// Implementations hold no object state; every call is one exchange with the
/// backend (plus bounded retries where the operation allows them).
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Short transport name for logs and errors
    fn transport(&self) -> &'static str;

    fn capabilities(&self) -> TransportCapabilities;

    async fn create_object(&self, object: &Object) -> Result<Object, BwError>;

    /// Replace the object with the given ID; omitted fields are cleared.
    async fn edit_object(&self, object: &Object) -> Result<Object, BwError>;

    /// Fetch the full object for a stub carrying type and ID.
    async fn get_object(&self, object: &Object) -> Result<Object, BwError>;

    async fn delete_object(&self, object: &Object) -> Result<(), BwError>;

    async fn list_objects(
        &self,
        object_type: ObjectType,
        filters: &[ListFilter],
    ) -> Result<Vec<Object>, BwError>;

    /// Upload a file to an item, returning the updated item.
    async fn create_attachment(&self, item_id: &str, file_path: &Path)
    -> Result<Object, BwError>;

    async fn get_attachment(&self, item_id: &str, attachment_id: &str)
    -> Result<Vec<u8>, BwError>;

    async fn delete_attachment(&self, item_id: &str, attachment_id: &str) -> Result<(), BwError>;

    async fn unlock(&self, password: &str) -> Result<(), BwError>;

    async fn login_with_password(&self, username: &str, password: &str) -> Result<(), BwError>;

    async fn login_with_api_key(
        &self,
        password: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<(), BwError>;

    async fn logout(&self) -> Result<(), BwError>;

    async fn set_server(&self, url: &str) -> Result<(), BwError>;

    async fn sync(&self) -> Result<(), BwError>;

    async fn status(&self) -> Result<Status, BwError>;

    /// Current session key; empty when the transport has none.
    fn session_key(&self) -> String;

    fn set_session_key(&self, key: &str);
}

pub(crate) fn require_id(object: &Object) -> Result<&str, BwError> {
    if object.has_id() {
        Ok(&object.id)
    } else {
        Err(BwError::InvalidObject(format!(
            "{} has no ID; it must be created first",
            object.object
        )))
    }
}
