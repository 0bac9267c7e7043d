use tasksync_core::{SyncError, SyncResult};

pub const DEFAULT_API_URL: &str = "https://api.airtable.com";
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:tasksync.sqlite3?mode=rwc";

/// Connection settings for the remote table plus local storage location.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub token: String,
    pub base_id: String,
    pub table_name: String,
    pub upload_endpoint: Option<String>,
    pub page_size: usize,
    pub database_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: String::new(),
            base_id: String::new(),
            table_name: String::new(),
            upload_endpoint: None,
            page_size: DEFAULT_PAGE_SIZE,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn new(
        token: impl Into<String>,
        base_id: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            base_id: base_id.into(),
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    /// Reads `AIRTABLE_TOKEN`, `AIRTABLE_BASE`, `AIRTABLE_TABLE`,
    /// `AIRTABLE_API_URL`, `UPLOAD_ENDPOINT`, `TASKSYNC_PAGE_SIZE` and
    /// `TASKSYNC_DATABASE_URL`. Unset variables keep their defaults, as does
    /// a page size that is not a positive number.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_url: lookup("AIRTABLE_API_URL").unwrap_or(defaults.api_url),
            token: lookup("AIRTABLE_TOKEN").unwrap_or_default(),
            base_id: lookup("AIRTABLE_BASE").unwrap_or_default(),
            table_name: lookup("AIRTABLE_TABLE").unwrap_or_default(),
            upload_endpoint: lookup("UPLOAD_ENDPOINT").filter(|url| !url.is_empty()),
            page_size: lookup("TASKSYNC_PAGE_SIZE")
                .and_then(|size| size.trim().parse().ok())
                .filter(|&size: &usize| size > 0)
                .unwrap_or(defaults.page_size),
            database_url: lookup("TASKSYNC_DATABASE_URL").unwrap_or(defaults.database_url),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.trim().is_empty()
            && !self.base_id.trim().is_empty()
            && !self.table_name.trim().is_empty()
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(SyncError::MissingConfiguration)
        }
    }
}
