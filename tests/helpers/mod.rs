//! Test helper utilities for E2E testing

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use crate::fixtures::PromptFixture;

/// Response from POST /api/v1/jobs
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// Response from GET /api/v1/jobs/{job_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: String,
    pub prompt: String,
    pub seed: Option<u64>,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

/// Submit a fixture to the jobs endpoint
pub async fn submit_prompt(
    client: &reqwest::Client,
    base_url: &str,
    fixture: &PromptFixture,
) -> Result<SubmitResponse, Box<dyn std::error::Error>> {
    let mut body = json!({ "prompt": fixture.prompt });
    if let Some(length) = fixture.video_length {
        body["video_length"] = json!(length);
    }
    if let Some(steps) = fixture.infer_steps {
        body["infer_steps"] = json!(steps);
    }
    if let Some(seed) = fixture.seed {
        body["seed"] = json!(seed);
    }

    let response = client
        .post(format!("{}/api/v1/jobs", base_url))
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Submit failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<SubmitResponse>().await?)
}

/// Poll job status until completed or failed (with timeout)
pub async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/api/v1/jobs/{}", base_url, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status_response = response.json::<JobStatusResponse>().await?;

        match status_response.status.as_str() {
            "completed" | "failed" => return Ok(status_response),
            "pending" | "processing" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!("  ... still waiting (attempt {}/{})", attempt, max_attempts);
                }
                sleep(Duration::from_millis(500)).await;
            }
            _ => {
                return Err(format!("Unknown job status: {}", status_response.status).into());
            }
        }
    }

    Err(format!("Job did not complete within {} seconds", timeout_secs).into())
}

/// Wait for the background worker to finish a job
pub async fn wait_for_job_completion(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
) -> Result<JobStatusResponse, Box<dyn std::error::Error>> {
    poll_job_status(client, base_url, job_id, 120).await
}

/// Download a finished artifact, returning its file name and bytes
pub async fn download_artifact(
    client: &reqwest::Client,
    base_url: &str,
    download_url: &str,
) -> Result<(String, Vec<u8>), Box<dyn std::error::Error>> {
    let response = client
        .get(format!("{}{}", base_url, download_url))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("Download failed with status {}", status).into());
    }

    let disposition = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .ok_or("No content-disposition header")?
        .to_str()?
        .to_string();
    let file_name = disposition
        .split("filename=")
        .nth(1)
        .map(|name| name.trim_matches('"').to_string())
        .ok_or("No filename in content-disposition")?;

    Ok((file_name, response.bytes().await?.to_vec()))
}
