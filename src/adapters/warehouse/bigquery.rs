use crate::domain::model::{SourceFormat, TableTarget};
use crate::domain::ports::{LoadJob, Warehouse};
use crate::utils::error::{EtlError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    error_result: Option<JobError>,
    #[serde(default)]
    errors: Vec<JobError>,
}

#[derive(Debug, Deserialize)]
struct JobError {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResource {
    num_rows: Option<String>,
}

/// BigQuery through the REST v2 API.
#[derive(Debug, Clone)]
pub struct BigQueryWarehouse {
    client: Client,
    endpoint: String,
    project_id: String,
    location: String,
    access_token: Option<String>,
    poll_interval: Duration,
}

impl BigQueryWarehouse {
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_BIGQUERY_ENDPOINT.to_string(),
            project_id: project_id.into(),
            location: location.into(),
            access_token,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn table_url(&self, table: &TableTarget) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables/{}",
            self.endpoint, table.project, table.warehouse_dataset, table.table_name
        )
    }

    fn job_body(&self, job: &LoadJob) -> Value {
        let create_disposition = if job.create_if_needed {
            "CREATE_IF_NEEDED"
        } else {
            "CREATE_NEVER"
        };
        let mut load = json!({
            "sourceUris": [job.source_uri],
            "destinationTable": {
                "projectId": job.destination.project,
                "datasetId": job.destination.warehouse_dataset,
                "tableId": job.destination.table_name,
            },
            "sourceFormat": job.format.warehouse_name(),
            "writeDisposition": job.write_mode.write_disposition(),
            "createDisposition": create_disposition,
            "autodetect": job.autodetect,
            "ignoreUnknownValues": job.ignore_unknown_values,
        });

        if let (SourceFormat::Csv, Some(csv)) = (job.format, &job.csv) {
            load["fieldDelimiter"] = json!(csv.field_delimiter.to_string());
            load["skipLeadingRows"] = json!(csv.skip_leading_rows);
            load["quote"] = json!(csv.quote.to_string());
        }

        json!({
            "jobReference": { "projectId": self.project_id, "location": self.location },
            "configuration": { "load": load },
        })
    }

    async fn send_job_request(&self, request: RequestBuilder, table: &str) -> Result<JobResource> {
        let load_error = |message: String| EtlError::LoadError {
            table: table.to_string(),
            message,
        };

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| load_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(load_error(format!("BigQuery responded {}: {}", status, body)));
        }

        response
            .json::<JobResource>()
            .await
            .map_err(|e| load_error(format!("unreadable job resource: {}", e)))
    }
}

fn describe_failure(status: &JobStatus, primary: &JobError) -> String {
    let mut message = format!("{} ({})", primary.message, primary.reason);
    let details: Vec<&str> = status
        .errors
        .iter()
        .map(|e| e.message.as_str())
        .filter(|m| *m != primary.message)
        .collect();
    if !details.is_empty() {
        message.push_str(": ");
        message.push_str(&details.join("; "));
    }
    message
}

impl Warehouse for BigQueryWarehouse {
    async fn run_load_job(&self, job: &LoadJob) -> Result<()> {
        let table = job.destination.to_string();
        let jobs_url = format!(
            "{}/bigquery/v2/projects/{}/jobs",
            self.endpoint, self.project_id
        );

        let request = self.client.post(&jobs_url).json(&self.job_body(job));
        let mut resource = self.send_job_request(request, &table).await?;
        tracing::debug!(
            "🏗️ Load job {} submitted for {}",
            resource.job_reference.job_id,
            table
        );

        while resource.status.state != "DONE" {
            tokio::time::sleep(self.poll_interval).await;

            let location = resource
                .job_reference
                .location
                .clone()
                .unwrap_or_else(|| self.location.clone());
            let request = self
                .client
                .get(format!("{}/{}", jobs_url, resource.job_reference.job_id))
                .query(&[("location", location)]);
            resource = self.send_job_request(request, &table).await?;
        }

        if let Some(error) = &resource.status.error_result {
            return Err(EtlError::LoadError {
                table,
                message: describe_failure(&resource.status, error),
            });
        }

        Ok(())
    }

    async fn table_row_count(&self, table: &TableTarget) -> Result<Option<u64>> {
        let request = self.client.get(self.table_url(table));
        let response = self.authorize(request).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resource: TableResource = response.error_for_status()?.json().await?;
        let rows = match resource.num_rows {
            Some(n) => n.parse::<u64>().map_err(|e| {
                EtlError::processing(format!("invalid numRows '{}' for {}: {}", n, table, e))
            })?,
            None => 0,
        };
        Ok(Some(rows))
    }

    async fn delete_table(&self, table: &TableTarget) -> Result<bool> {
        let request = self.client.delete(self.table_url(table));
        let response = self.authorize(request).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        response.error_for_status()?;
        Ok(true)
    }
}
