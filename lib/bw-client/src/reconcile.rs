use crate::error::BwError;
use crate::models::Attachment;

/// Attachments that appeared or disappeared between two snapshots of an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentDiff {
    pub added: Vec<Attachment>,
    pub removed: Vec<Attachment>,
}

impl AttachmentDiff {
    /// Compare by attachment ID; order follows the snapshot each entry comes from.
    pub fn between(before: &[Attachment], after: &[Attachment]) -> Self {
        Self {
            added: only_in_second(before, after),
            removed: only_in_second(after, before),
        }
    }

    /// The single attachment a create must have produced.
    ///
    /// Anything other than exactly one added and none removed means the
    /// client and backend disagree about the item's attachments.
    pub fn into_single_added(self) -> Result<Attachment, BwError> {
        if !self.removed.is_empty() {
            return Err(BwError::ConsistencyViolation(format!(
                "{} attachment(s) removed during creation",
                self.removed.len()
            )));
        }

        let mut added = self.added;
        match added.len() {
            0 => Err(BwError::ConsistencyViolation(
                "no attachment found after creation".to_string(),
            )),
            1 => Ok(added.remove(0)),
            n => Err(BwError::ConsistencyViolation(format!(
                "{n} attachments created, expected one"
            ))),
        }
    }
}

fn only_in_second(first: &[Attachment], second: &[Attachment]) -> Vec<Attachment> {
    second
        .iter()
        .filter(|b| !first.iter().any(|a| a.id == b.id))
        .cloned()
        .collect()
}
