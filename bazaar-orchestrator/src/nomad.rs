use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::OrchestratorError;
use crate::types::{
    AllocationLog, Job, JobInfo, JobPayload, JobStatus, ServiceAllocation, ServiceInfo,
};
use crate::Orchestrator;

/// Bound on every scheduler HTTP call; retries live in the service layer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a Nomad-like scheduler HTTP API.
///
/// Jobs arrive as HCL; the client posts them to the scheduler's parse
/// endpoint and submits the canonicalized result, so the scheduler itself is
/// the single source of truth for HCL semantics.
pub struct NomadClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    ingress_hostname: String,
}

impl NomadClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        ingress_hostname: impl Into<String>,
    ) -> Result<Self, OrchestratorError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(OrchestratorError::from_reqwest)?;
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        Ok(Self {
            http,
            endpoint,
            token,
            ingress_hostname: ingress_hostname.into(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.endpoint));
        if let Some(token) = &self.token {
            builder = builder.header("X-Nomad-Token", token);
        }
        builder
    }

    /// Execute a request, mapping 404 onto `JobNotFound` for `job_name` when
    /// given, and any other non-success status onto `Api`.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        job_name: Option<&str>,
    ) -> Result<reqwest::Response, OrchestratorError> {
        let response = builder
            .send()
            .await
            .map_err(OrchestratorError::from_reqwest)?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(name) = job_name {
                return Err(OrchestratorError::JobNotFound(name.to_string()));
            }
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn json(
        &self,
        builder: reqwest::RequestBuilder,
        job_name: Option<&str>,
    ) -> Result<Value, OrchestratorError> {
        self.send(builder, job_name)
            .await?
            .json()
            .await
            .map_err(OrchestratorError::from_reqwest)
    }
}

/// Map the scheduler's job status string plus summary counts onto [`JobStatus`].
fn map_status(status: &str, failed_allocs: u64) -> JobStatus {
    match status {
        "pending" => JobStatus::Pending,
        "running" => JobStatus::Running,
        _ => JobStatus::Dead {
            failed: failed_allocs > 0,
        },
    }
}

/// Sum `Failed` and `Lost` counts across the job summary's task groups.
fn summary_failed_count(summary: &Value) -> u64 {
    summary["Summary"]
        .as_object()
        .map(|groups| {
            groups
                .values()
                .map(|g| {
                    g["Failed"].as_u64().unwrap_or(0) + g["Lost"].as_u64().unwrap_or(0)
                })
                .sum()
        })
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl Orchestrator for NomadClient {
    async fn start_job(&self, job: &Job) -> Result<(), OrchestratorError> {
        let JobPayload::Hcl(hcl) = &job.payload else {
            return Err(OrchestratorError::InvalidJob(format!(
                "nomad backend requires an HCL payload for job {}",
                job.name
            )));
        };

        let parsed = self
            .json(
                self.request(reqwest::Method::POST, "/v1/jobs/parse")
                    .json(&serde_json::json!({ "JobHCL": hcl, "Canonicalize": true })),
                None,
            )
            .await?;

        self.send(
            self.request(reqwest::Method::POST, "/v1/jobs")
                .json(&serde_json::json!({ "Job": parsed })),
            None,
        )
        .await?;
        debug!(job = %job.name, "job submitted");
        Ok(())
    }

    async fn stop_job(&self, name: &str) -> Result<(), OrchestratorError> {
        self.send(
            self.request(reqwest::Method::DELETE, &format!("/v1/job/{name}?purge=true")),
            Some(name),
        )
        .await?;
        debug!(job = %name, "job stopped");
        Ok(())
    }

    async fn job_info(&self, name: &str) -> Result<JobInfo, OrchestratorError> {
        let job = self
            .json(
                self.request(reqwest::Method::GET, &format!("/v1/job/{name}")),
                Some(name),
            )
            .await?;
        let status_str = job["Status"].as_str().unwrap_or("dead").to_string();

        // Outcome of a finished job comes from the allocation summary.
        let failed = if status_str == "dead" {
            let summary = self
                .json(
                    self.request(reqwest::Method::GET, &format!("/v1/job/{name}/summary")),
                    Some(name),
                )
                .await?;
            summary_failed_count(&summary)
        } else {
            0
        };

        Ok(JobInfo {
            name: name.to_string(),
            status: map_status(&status_str, failed),
        })
    }

    async fn job_logs(&self, name: &str) -> Result<Vec<AllocationLog>, OrchestratorError> {
        let allocations = self
            .json(
                self.request(reqwest::Method::GET, &format!("/v1/job/{name}/allocations")),
                Some(name),
            )
            .await?;
        let Some(entries) = allocations.as_array() else {
            return Ok(Vec::new());
        };

        let mut logs = Vec::new();
        for entry in entries {
            let Some(alloc_id) = entry["ID"].as_str() else {
                continue;
            };
            let mut log = AllocationLog {
                alloc_id: alloc_id.to_string(),
                ..Default::default()
            };
            for (kind, target) in [("stdout", &mut log.stdout), ("stderr", &mut log.stderr)] {
                let path =
                    format!("/v1/client/fs/logs/{alloc_id}?task={name}&type={kind}&plain=true");
                // A gone allocation is not an error for log collection.
                match self.send(self.request(reqwest::Method::GET, &path), None).await {
                    Ok(response) => {
                        *target = response
                            .text()
                            .await
                            .map_err(OrchestratorError::from_reqwest)?;
                    }
                    Err(OrchestratorError::Api { status: 404, .. }) => {}
                    Err(other) => return Err(other),
                }
            }
            logs.push(log);
        }
        Ok(logs)
    }

    async fn list_services(&self) -> Result<Vec<ServiceInfo>, OrchestratorError> {
        let namespaces = self
            .json(self.request(reqwest::Method::GET, "/v1/services"), None)
            .await?;

        let mut services = Vec::new();
        let entries = namespaces
            .as_array()
            .into_iter()
            .flatten()
            .flat_map(|ns| ns["Services"].as_array().cloned().unwrap_or_default());
        for entry in entries {
            let Some(service_name) = entry["ServiceName"].as_str() else {
                continue;
            };
            let detail = self
                .json(
                    self.request(
                        reqwest::Method::GET,
                        &format!("/v1/service/{service_name}"),
                    ),
                    None,
                )
                .await?;
            let allocations = detail
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|reg| {
                    Some(ServiceAllocation {
                        address: reg["Address"].as_str()?.to_string(),
                        port: reg["Port"].as_u64()? as u16,
                        alloc_id: reg["AllocID"].as_str().unwrap_or_default().to_string(),
                        node_id: reg["NodeID"].as_str().unwrap_or_default().to_string(),
                    })
                })
                .collect();
            services.push(ServiceInfo {
                name: service_name.to_string(),
                allocations,
            });
        }
        Ok(services)
    }

    async fn total_cpu_usage(&self) -> Result<u64, OrchestratorError> {
        let allocations = self
            .json(
                self.request(reqwest::Method::GET, "/v1/allocations?resources=true"),
                None,
            )
            .await?;
        let total = allocations
            .as_array()
            .into_iter()
            .flatten()
            .filter(|alloc| alloc["ClientStatus"].as_str() == Some("running"))
            .map(allocation_cpu_shares)
            .sum();
        Ok(total)
    }

    fn ingress_hostname(&self) -> &str {
        &self.ingress_hostname
    }
}

/// CPU shares (MHz) requested by one allocation across its tasks.
fn allocation_cpu_shares(alloc: &Value) -> u64 {
    alloc["AllocatedResources"]["Tasks"]
        .as_object()
        .map(|tasks| {
            tasks
                .values()
                .map(|task| task["Cpu"]["CpuShares"].as_u64().unwrap_or(0))
                .sum()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_lifecycle() {
        assert_eq!(map_status("pending", 0), JobStatus::Pending);
        assert_eq!(map_status("running", 0), JobStatus::Running);
        assert_eq!(map_status("dead", 0), JobStatus::Dead { failed: false });
        assert_eq!(map_status("dead", 2), JobStatus::Dead { failed: true });
    }

    #[test]
    fn summary_counts_failed_and_lost() {
        let summary = serde_json::json!({
            "Summary": {
                "train": { "Complete": 1, "Failed": 0, "Lost": 0 },
                "sidecar": { "Failed": 1, "Lost": 2 }
            }
        });
        assert_eq!(summary_failed_count(&summary), 3);
        assert_eq!(summary_failed_count(&serde_json::json!({})), 0);
    }

    #[test]
    fn allocation_cpu_shares_sums_tasks() {
        let alloc = serde_json::json!({
            "AllocatedResources": {
                "Tasks": {
                    "server": { "Cpu": { "CpuShares": 500 } },
                    "sidecar": { "Cpu": { "CpuShares": 200 } }
                }
            }
        });
        assert_eq!(allocation_cpu_shares(&alloc), 700);
        assert_eq!(allocation_cpu_shares(&serde_json::json!({})), 0);
    }
}
