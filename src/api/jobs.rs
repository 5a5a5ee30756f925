//! Job listing, claiming, and template fetch.

use serde::Deserialize;

use super::{ApiClient, ApiError};
use crate::template::InspectionTemplate;

/// List response for technician jobs.
#[derive(Debug, Deserialize)]
pub struct JobListResp {
    pub jobs: Vec<JobDto>,
}

/// Minimal job metadata needed by the app.
#[derive(Debug, Clone, Deserialize)]
pub struct JobDto {
    /// Backend id; canonical format is 24 hex characters.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    pub status: String,
}

/// List jobs visible to the technician, optionally filtered by status.
pub async fn list_jobs(client: &ApiClient, status: Option<&str>) -> Result<Vec<JobDto>, ApiError> {
    let mut url = client.url("/api/technician/jobs");
    if let Some(s) = status {
        url = format!("{}?status={}", url, urlencoding::encode(s));
    }
    let resp = client
        .http
        .get(url)
        .bearer_auth(client.bearer())
        .send()
        .await?;
    let resp = ApiClient::check(resp).await?;
    Ok(resp.json::<JobListResp>().await?.jobs)
}

/// Claim an available job for this technician.
pub async fn claim_job(client: &ApiClient, job_id: &str) -> Result<JobDto, ApiError> {
    let resp = client
        .http
        .post(client.url(&format!("/api/jobs/{job_id}/claim")))
        .bearer_auth(client.bearer())
        .send()
        .await?;
    let resp = ApiClient::check(resp).await?;
    Ok(resp.json::<JobDto>().await?)
}

/// Fetch the inspection template describing a job's completion form.
pub async fn fetch_template(
    client: &ApiClient,
    job_id: &str,
) -> Result<InspectionTemplate, ApiError> {
    let resp = client
        .http
        .get(client.url(&format!("/api/jobs/{job_id}/template")))
        .bearer_auth(client.bearer())
        .send()
        .await?;
    let resp = ApiClient::check(resp).await?;
    Ok(resp.json::<InspectionTemplate>().await?)
}
