//! Multi-step operations built on top of [`ObjectClient`].

use super::ObjectClient;
use crate::error::BwError;
use crate::models::{Attachment, Object, ObjectType};
use crate::reconcile::AttachmentDiff;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Fetch an object, treating its absence as `None` rather than an error.
pub async fn get_object_ignore_missing<C>(
    client: &C,
    stub: &Object,
) -> Result<Option<Object>, BwError>
where
    C: ObjectClient + ?Sized,
{
    match client.get_object(stub).await {
        Ok(object) => Ok(Some(object)),
        Err(BwError::NotFound) => {
            tracing::debug!(object_id = %stub.id, "Object no longer exists");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Delete an object, treating an already-missing object as deleted.
///
/// Only transports whose delete reports [`BwError::NotFound`] can tell the two
/// apart; on the others a missing object surfaces as a backend error.
pub async fn delete_object_ignore_missing<C>(client: &C, stub: &Object) -> Result<(), BwError>
where
    C: ObjectClient + ?Sized,
{
    match client.delete_object(stub).await {
        Err(BwError::NotFound) => Ok(()),
        other => other,
    }
}

/// Look up attachment metadata through its parent item.
///
/// A missing parent is an error: there is nothing left to attach to. A parent
/// without the attachment yields `None`.
pub async fn find_attachment<C>(
    client: &C,
    item_id: &str,
    attachment_id: &str,
) -> Result<Option<Attachment>, BwError>
where
    C: ObjectClient + ?Sized,
{
    let item = client
        .get_object(&Object::stub(ObjectType::Item, item_id))
        .await?;
    Ok(item.attachments.into_iter().find(|a| a.id == attachment_id))
}

/// Upload a file and return the attachment it created.
///
/// The backend answers with the whole parent item, so the new attachment is
/// found by diffing the item's attachments before and after the upload.
/// Concurrent uploads to the same item show up as a consistency violation.
pub async fn create_attachment_reconciled<C>(
    client: &C,
    item_id: &str,
    file_path: &Path,
) -> Result<Attachment, BwError>
where
    C: ObjectClient + ?Sized,
{
    let before = client
        .get_object(&Object::stub(ObjectType::Item, item_id))
        .await?
        .attachments;

    let after = client.create_attachment(item_id, file_path).await?;

    let diff = AttachmentDiff::between(&before, &after.attachments);
    if diff.added.len() != 1 || !diff.removed.is_empty() {
        tracing::error!(
            item_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "Attachment list changed unexpectedly"
        );
    }
    diff.into_single_added()
}

/// Hex SHA-256 of a local file, for detecting changes to uploaded content.
pub async fn file_digest(path: &Path) -> Result<String, BwError> {
    let content = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&content)))
}
