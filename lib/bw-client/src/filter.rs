//! List filters with one logical value and two wire renderings.
//!
//! The REST transport renders filters as query parameters (last write wins
//! per key), the CLI transport as `--flag value` pairs (repeats accumulate).

/// A single list predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    Collection(String),
    Folder(String),
    Organization(String),
    Search(String),
    Url(String),
}

impl ListFilter {
    pub fn collection(id: impl Into<String>) -> Self {
        Self::Collection(id.into())
    }

    pub fn folder(id: impl Into<String>) -> Self {
        Self::Folder(id.into())
    }

    pub fn organization(id: impl Into<String>) -> Self {
        Self::Organization(id.into())
    }

    pub fn search(text: impl Into<String>) -> Self {
        Self::Search(text.into())
    }

    pub fn url(uri: impl Into<String>) -> Self {
        Self::Url(uri.into())
    }

    fn value(&self) -> &str {
        match self {
            Self::Collection(v)
            | Self::Folder(v)
            | Self::Organization(v)
            | Self::Search(v)
            | Self::Url(v) => v,
        }
    }

    /// Query parameter as `bw serve` expects it. Key casing is not uniform on the backend.
    pub fn query_pair(&self) -> (&'static str, &str) {
        let key = match self {
            Self::Collection(_) => "collectionId",
            Self::Folder(_) => "folderid",
            Self::Organization(_) => "organizationId",
            Self::Search(_) => "search",
            Self::Url(_) => "url",
        };
        (key, self.value())
    }

    /// Argument pair for `bw list`
    pub fn cli_args(&self) -> [&str; 2] {
        let flag = match self {
            Self::Collection(_) => "--collectionid",
            Self::Folder(_) => "--folderid",
            Self::Organization(_) => "--organizationid",
            Self::Search(_) => "--search",
            Self::Url(_) => "--url",
        };
        [flag, self.value()]
    }
}

/// Render filters as query parameters, keeping the first position of each key and the last value.
pub fn to_query(filters: &[ListFilter]) -> Vec<(&'static str, String)> {
    let mut query: Vec<(&'static str, String)> = Vec::with_capacity(filters.len());
    for filter in filters {
        let (key, value) = filter.query_pair();
        match query.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value.to_string(),
            None => query.push((key, value.to_string())),
        }
    }
    query
}

/// Append filters to a CLI argument list in order, without deduplication.
pub fn append_args(filters: &[ListFilter], args: &mut Vec<String>) {
    for filter in filters {
        args.extend(filter.cli_args().iter().map(|s| s.to_string()));
    }
}
