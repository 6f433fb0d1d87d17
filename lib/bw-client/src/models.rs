use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Top-level tag carried in the `object` field of every vault object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    Item,
    Folder,
    OrgCollection,
    Organization,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Folder => "folder",
            Self::OrgCollection => "org-collection",
            Self::Organization => "organization",
        }
    }

    /// Name used by `list` on both transports
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Item => "items",
            Self::Folder => "folders",
            Self::OrgCollection => "org-collections",
            Self::Organization => "organizations",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an item, encoded as an integer by the backend.
///
/// Kinds added by newer servers decode as [`ItemType::Other`] and keep their
/// numeric value on the way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ItemType {
    Login,
    SecureNote,
    Card,
    Identity,
    Other(u8),
}

impl From<ItemType> for u8 {
    fn from(t: ItemType) -> u8 {
        match t {
            ItemType::Login => 1,
            ItemType::SecureNote => 2,
            ItemType::Card => 3,
            ItemType::Identity => 4,
            ItemType::Other(value) => value,
        }
    }
}

impl From<u8> for ItemType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Login,
            2 => Self::SecureNote,
            3 => Self::Card,
            4 => Self::Identity,
            other => Self::Other(other),
        }
    }
}

/// A persisted vault entity (item, folder, collection or organization).
///
/// Every optional field is serialised, including `null`s: edits replace the
/// whole object, so a field left as `None` is cleared on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub object: ObjectType,
    #[serde(rename = "type", default)]
    pub item_type: Option<ItemType>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub reprompt: u8,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub collection_ids: Vec<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub login: Option<Login>,
    #[serde(default)]
    pub secure_note: Option<SecureNote>,
    #[serde(default)]
    pub card: Option<Card>,
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub password_history: Vec<PasswordHistory>,
    #[serde(default)]
    pub revision_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_date: Option<DateTime<Utc>>,
}

impl Object {
    /// Empty object of the given type, ready to be filled and created
    pub fn new(object: ObjectType) -> Self {
        Self {
            id: String::new(),
            object,
            item_type: None,
            name: String::new(),
            notes: None,
            favorite: false,
            reprompt: 0,
            folder_id: None,
            organization_id: None,
            collection_ids: Vec::new(),
            external_id: None,
            fields: Vec::new(),
            login: None,
            secure_note: None,
            card: None,
            identity: None,
            attachments: Vec::new(),
            password_history: Vec::new(),
            revision_date: None,
            creation_date: None,
            deleted_date: None,
        }
    }

    pub fn item(item_type: ItemType, name: impl Into<String>) -> Self {
        let mut obj = Self::new(ObjectType::Item);
        obj.item_type = Some(item_type);
        obj.name = name.into();
        obj
    }

    /// Identity-only stub used for lookups and deletes
    pub fn stub(object: ObjectType, id: impl Into<String>) -> Self {
        let mut obj = Self::new(object);
        obj.id = id.into();
        obj
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: u8,
    #[serde(default)]
    pub linked_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub totp: Option<String>,
    #[serde(default)]
    pub uris: Vec<LoginUri>,
    #[serde(default)]
    pub password_revision_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginUri {
    #[serde(rename = "match", default)]
    pub match_type: Option<u8>,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecureNote {
    #[serde(rename = "type", default)]
    pub note_type: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub cardholder_name: Option<String>,
    pub brand: Option<String>,
    pub number: Option<String>,
    pub exp_month: Option<String>,
    pub exp_year: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub address3: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub ssn: Option<String>,
    pub username: Option<String>,
    pub passport_number: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordHistory {
    pub last_used_date: Option<DateTime<Utc>>,
    pub password: String,
}

/// File attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub file_name: String,
    /// Size in bytes; the backend sends it as a string
    #[serde(
        deserialize_with = "size_from_string_or_number",
        serialize_with = "size_as_string",
        default
    )]
    pub size: u64,
    #[serde(default)]
    pub size_name: String,
    #[serde(default)]
    pub url: String,
}

fn size_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn size_as_string<S>(size: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&size.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    Unauthenticated,
    Locked,
    Unlocked,
}

/// Session and server state reported by `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub status: VaultStatus,
}

/// Message payload returned by `unlock` and `login`; `raw` carries the session key
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageResult {
    pub title: Option<String>,
    pub message: Option<String>,
    pub raw: Option<String>,
}
