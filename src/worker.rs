//! Background worker handling dispatch API calls.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    api::{self, ApiClient, ApiError, completion::CompletionRequest},
    auth::TokenStore,
    config::Config,
    jobs::{Job, JobStatus},
    template::InspectionTemplate,
};

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Re-fetch the technician's job list.
    RefreshJobs,
    /// Persist and apply updated settings.
    SaveSettings(Config),
    /// Claim an available job.
    ClaimJob { job_id: Uuid, remote_id: String },
    /// Fetch the inspection template for a job's completion form.
    OpenJob { job_id: Uuid, remote_id: String },
    /// Validate and submit a completion.
    SubmitCompletion {
        job_id: Uuid,
        request: CompletionRequest,
    },
}

/// Events emitted by the worker for UI updates.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    /// Full job list loaded from the backend.
    JobsLoaded(Vec<Job>),
    /// Single job status update.
    JobUpdated { job_id: Uuid, status: JobStatus },
    /// Template ready for a job that was opened.
    TemplateLoaded {
        job_id: Uuid,
        template: InspectionTemplate,
    },
    /// Informational log message.
    Log(String),
    /// User-visible error message.
    Error(String),
    /// The session token was rejected; the UI must force re-auth.
    AuthExpired,
}

/// Main worker loop: resolve the token once, then handle commands
/// sequentially. One command at a time keeps state transitions consistent.
pub async fn run(mut rx: mpsc::Receiver<WorkerCmd>, tx: mpsc::Sender<WorkerEvent>, mut cfg: Config) {
    tracing::info!("worker started");

    let mut client = match build_client(&cfg).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("client init failed: {e}");
            let _ = tx
                .send(WorkerEvent::Error(format!("client init failed: {e}")))
                .await;
            return;
        }
    };

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::SaveSettings(new_cfg) => {
                tracing::info!("settings updated");
                cfg = new_cfg;
                // Rebuild the client so the new base URL and token apply.
                match build_client(&cfg).await {
                    Ok(c) => {
                        client = c;
                        let _ = tx.send(WorkerEvent::Log("settings updated".into())).await;
                    }
                    Err(e) => {
                        tracing::error!("client rebuild failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::Error(format!("client rebuild failed: {e}")))
                            .await;
                    }
                }
            }

            WorkerCmd::RefreshJobs => {
                tracing::info!("refresh jobs");
                if cfg.backend.base_url.is_empty() {
                    tracing::warn!("refresh aborted: base_url missing");
                    let _ = tx
                        .send(WorkerEvent::Error("backend base_url is not set".into()))
                        .await;
                    continue;
                }
                match api::jobs::list_jobs(&client, None).await {
                    Ok(dtos) => {
                        tracing::info!("job list success: {} jobs", dtos.len());
                        let jobs = dtos.into_iter().map(Job::from_dto).collect::<Vec<_>>();
                        let _ = tx.send(WorkerEvent::JobsLoaded(jobs)).await;
                    }
                    Err(e) => report_api_error(&tx, "list failed", e).await,
                }
            }

            WorkerCmd::ClaimJob { job_id, remote_id } => {
                tracing::info!("claim job: {remote_id}");
                let _ = tx
                    .send(WorkerEvent::JobUpdated {
                        job_id,
                        status: JobStatus::Claiming,
                    })
                    .await;
                match api::jobs::claim_job(&client, &remote_id).await {
                    Ok(_) => {
                        tracing::info!("claim success: {remote_id}");
                        let _ = tx
                            .send(WorkerEvent::JobUpdated {
                                job_id,
                                status: JobStatus::Assigned,
                            })
                            .await;
                    }
                    Err(e) => {
                        let _ = tx
                            .send(WorkerEvent::JobUpdated {
                                job_id,
                                status: JobStatus::Available,
                            })
                            .await;
                        report_api_error(&tx, "claim failed", e).await;
                    }
                }
            }

            WorkerCmd::OpenJob { job_id, remote_id } => {
                tracing::info!("fetch template: {remote_id}");
                match api::jobs::fetch_template(&client, &remote_id).await {
                    Ok(template) => {
                        let _ = tx
                            .send(WorkerEvent::TemplateLoaded { job_id, template })
                            .await;
                    }
                    Err(e) => report_api_error(&tx, "template fetch failed", e).await,
                }
            }

            WorkerCmd::SubmitCompletion { job_id, request } => {
                tracing::info!("submit completion: {}", request.job_id);
                // Show local validation as its own phase before the wire.
                let _ = tx
                    .send(WorkerEvent::JobUpdated {
                        job_id,
                        status: JobStatus::Validating,
                    })
                    .await;
                if let Err(e) = api::completion::validate(&request) {
                    tracing::warn!("validation failed: {e}");
                    let _ = tx
                        .send(WorkerEvent::JobUpdated {
                            job_id,
                            status: JobStatus::Failed(e.to_string()),
                        })
                        .await;
                    let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                    continue;
                }
                let _ = tx
                    .send(WorkerEvent::JobUpdated {
                        job_id,
                        status: JobStatus::Submitting,
                    })
                    .await;
                // Single attempt, no retry; the user may resubmit manually.
                match api::completion::submit(&client, &request).await {
                    Ok(()) => {
                        tracing::info!("completion accepted: {}", request.job_id);
                        let _ = tx
                            .send(WorkerEvent::JobUpdated {
                                job_id,
                                status: JobStatus::Completed,
                            })
                            .await;
                        let _ = tx.send(WorkerEvent::Log("job completed".into())).await;
                    }
                    Err(e) => {
                        tracing::error!("completion failed: {}: {e}", request.job_id);
                        let _ = tx
                            .send(WorkerEvent::JobUpdated {
                                job_id,
                                status: JobStatus::Failed(e.to_string()),
                            })
                            .await;
                        report_api_error(&tx, "submit failed", e).await;
                    }
                }
            }
        }
    }
}

/// Build an authenticated client from the config and token cache.
async fn build_client(cfg: &Config) -> anyhow::Result<ApiClient> {
    let token = TokenStore::new(&cfg.backend.token_path)
        .load()
        .await?
        .unwrap_or_default();
    Ok(ApiClient::new(cfg.backend.base_url.clone(), token))
}

/// Route an API error to the UI, keeping AuthExpired distinct so the app
/// can force re-authentication instead of suggesting a retry.
async fn report_api_error(tx: &mpsc::Sender<WorkerEvent>, what: &str, e: ApiError) {
    tracing::error!("{what}: {e}");
    if e.is_auth_expired() {
        let _ = tx.send(WorkerEvent::AuthExpired).await;
    } else {
        let _ = tx.send(WorkerEvent::Error(format!("{what}: {e}"))).await;
    }
}
