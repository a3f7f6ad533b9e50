use crate::domain::model::ObjectMeta;
use crate::domain::ports::ObjectStore;
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<GcsObject>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GcsObject {
    name: String,
    updated: DateTime<Utc>,
}

/// Google Cloud Storage through the JSON API.
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    access_token: Option<String>,
}

impl GcsObjectStore {
    pub fn new(bucket: impl Into<String>, access_token: Option<String>) -> Self {
        Self::with_endpoint(DEFAULT_GCS_ENDPOINT, bucket, access_token)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            access_token,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl GcsObjectStore {
    /// `/storage/v1/b/{bucket}/o/{name}`, with the object name as one encoded segment.
    fn object_url(&self, name: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/storage/v1/b/{}/o", self.endpoint, self.bucket))
            .map_err(|e| EtlError::config(format!("invalid GCS endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| EtlError::config(format!("GCS endpoint {} cannot be a base", self.endpoint)))?
            .push(name);
        Ok(url)
    }
}

impl ObjectStore for GcsObjectStore {
    fn uri(&self, name: &str) -> String {
        format!("gs://{}/{}", self.bucket, name)
    }

    fn name_from_uri(&self, uri: &str) -> Option<String> {
        uri.strip_prefix("gs://")?
            .strip_prefix(self.bucket.as_str())?
            .strip_prefix('/')
            .map(str::to_string)
    }

    async fn put(&self, name: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let uri = self.uri(name);
        let url = format!("{}/upload/storage/v1/b/{}/o", self.endpoint, self.bucket);

        tracing::debug!("📤 Uploading {} bytes to {}", data.len(), uri);
        let request = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", name)])
            .header(CONTENT_TYPE, content_type)
            .body(data);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| EtlError::WriteError {
                uri: uri.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::WriteError {
                uri,
                message: format!("GCS responded {}: {}", status, body),
            });
        }

        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.object_url(name)?;
        let request = self.client.get(url).query(&[("alt", "media")]);
        let response = self.authorize(request).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let url = format!("{}/storage/v1/b/{}/o", self.endpoint, self.bucket);
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let request = self.client.get(&url).query(&query);
            let page: ListResponse = self
                .authorize(request)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            objects.extend(page.items.into_iter().map(|o| ObjectMeta {
                name: o.name,
                updated_at: o.updated,
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_uri_round_trip() {
        let store = GcsObjectStore::new("nfl-raw", None);
        let uri = store.uri("raw/nfl/teams/2025-09-05_05-00-07.parquet");
        assert_eq!(uri, "gs://nfl-raw/raw/nfl/teams/2025-09-05_05-00-07.parquet");
        assert_eq!(
            store.name_from_uri(&uri).unwrap(),
            "raw/nfl/teams/2025-09-05_05-00-07.parquet"
        );
        assert!(store.name_from_uri("gs://other-bucket/raw/x").is_none());
    }

    #[test]
    fn test_object_url_encodes_name_as_one_segment() {
        let store = GcsObjectStore::new("nfl-raw", None);
        let url = store
            .object_url("raw/nfl/pbp/season=2025/a b.parquet")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/nfl-raw/o/raw%2Fnfl%2Fpbp%2Fseason=2025%2Fa%20b.parquet"
        );
    }

    #[tokio::test]
    async fn test_put_uploads_media() {
        let server = MockServer::start();
        let upload = server.mock(|when, then| {
            when.method(POST)
                .path("/upload/storage/v1/b/nfl-raw/o")
                .query_param("uploadType", "media")
                .query_param("name", "raw/nfl/teams/2025-09-05_05-00-07.parquet")
                .header("authorization", "Bearer token-123");
            then.status(200)
                .json_body(serde_json::json!({"name": "raw/nfl/teams/2025-09-05_05-00-07.parquet"}));
        });

        let store =
            GcsObjectStore::with_endpoint(server.base_url(), "nfl-raw", Some("token-123".into()));
        store
            .put(
                "raw/nfl/teams/2025-09-05_05-00-07.parquet",
                b"PAR1".to_vec(),
                "application/octet-stream",
            )
            .await
            .unwrap();

        upload.assert();
    }

    #[tokio::test]
    async fn test_put_failure_is_write_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/upload/storage/v1/b/nfl-raw/o");
            then.status(403).body("quota exceeded");
        });

        let store = GcsObjectStore::with_endpoint(server.base_url(), "nfl-raw", None);
        let err = store
            .put("raw/nfl/teams/x.parquet", b"PAR1".to_vec(), "application/octet-stream")
            .await
            .unwrap_err();

        match err {
            EtlError::WriteError { uri, message } => {
                assert_eq!(uri, "gs://nfl-raw/raw/nfl/teams/x.parquet");
                assert!(message.contains("403"));
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_follows_pagination() {
        let server = MockServer::start();
        // registered first so requests carrying pageToken match it before the generic page
        let second_page = server.mock(|when, then| {
            when.method(GET)
                .path("/storage/v1/b/nfl-raw/o")
                .query_param("prefix", "raw/nfl/teams/")
                .query_param("pageToken", "page-2");
            then.status(200).json_body(serde_json::json!({
                "items": [
                    {"name": "raw/nfl/teams/2025-09-06_05-00-00.parquet", "updated": "2025-09-06T05:00:01.120Z"}
                ]
            }));
        });
        let first_page = server.mock(|when, then| {
            when.method(GET)
                .path("/storage/v1/b/nfl-raw/o")
                .query_param("prefix", "raw/nfl/teams/");
            then.status(200).json_body(serde_json::json!({
                "items": [
                    {"name": "raw/nfl/teams/2025-09-05_05-00-00.parquet", "updated": "2025-09-05T05:00:01.120Z"}
                ],
                "nextPageToken": "page-2"
            }));
        });

        let store = GcsObjectStore::with_endpoint(server.base_url(), "nfl-raw", None);
        let objects = store.list("raw/nfl/teams/").await.unwrap();

        first_page.assert();
        second_page.assert();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].name, "raw/nfl/teams/2025-09-06_05-00-00.parquet");
        assert!(objects[1].updated_at > objects[0].updated_at);
    }
}
