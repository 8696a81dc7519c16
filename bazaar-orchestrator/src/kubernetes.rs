use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::OrchestratorError;
use crate::types::{
    AllocationLog, Job, JobInfo, JobPayload, JobStatus, ServiceAllocation, ServiceInfo,
};
use crate::Orchestrator;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Label every control-plane-owned resource carries; job lookup and log
/// collection select on it.
const MANAGED_LABEL: &str = "bazaar.job";

/// Client for a Kubernetes-like API server.
///
/// Rendered manifests are applied imperatively: create, and on a name
/// conflict replace. Long-lived jobs become deployments, one-shot jobs become
/// batch jobs, and routing rules become ingresses.
pub struct KubernetesClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    namespace: String,
    ingress_hostname: String,
}

impl KubernetesClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        namespace: impl Into<String>,
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
            namespace: namespace.into(),
            ingress_hostname: ingress_hostname.into(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.endpoint));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, OrchestratorError> {
        let response = builder
            .send()
            .await
            .map_err(OrchestratorError::from_reqwest)?;
        let status = response.status();
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
    ) -> Result<Value, OrchestratorError> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(OrchestratorError::from_reqwest)
    }

    /// Create the resource, replacing it if one of the same name exists.
    async fn apply(&self, manifest: &Value) -> Result<(), OrchestratorError> {
        let collection = collection_path(manifest, &self.namespace)?;
        let name = manifest["metadata"]["name"].as_str().ok_or_else(|| {
            OrchestratorError::InvalidJob("manifest missing metadata.name".into())
        })?;

        let created = self
            .send(self.request(reqwest::Method::POST, &collection).json(manifest))
            .await;
        match created {
            Ok(_) => Ok(()),
            Err(OrchestratorError::Api { status: 409, .. }) => {
                self.send(
                    self.request(reqwest::Method::PUT, &format!("{collection}/{name}"))
                        .json(manifest),
                )
                .await?;
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    async fn delete_resource(&self, path: &str) -> Result<bool, OrchestratorError> {
        match self.send(self.request(reqwest::Method::DELETE, path)).await {
            Ok(_) => Ok(true),
            Err(OrchestratorError::Api { status: 404, .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    async fn pods_for_job(&self, name: &str) -> Result<Vec<String>, OrchestratorError> {
        let path = format!(
            "/api/v1/namespaces/{}/pods?labelSelector={MANAGED_LABEL}%3D{name}",
            self.namespace
        );
        let pods = self.json(self.request(reqwest::Method::GET, &path)).await?;
        Ok(pods["items"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|pod| pod["metadata"]["name"].as_str().map(String::from))
            .collect())
    }
}

/// API collection path for a manifest's kind, namespaced.
fn collection_path(manifest: &Value, namespace: &str) -> Result<String, OrchestratorError> {
    let kind = manifest["kind"].as_str().unwrap_or_default();
    let path = match kind {
        "Deployment" => format!("/apis/apps/v1/namespaces/{namespace}/deployments"),
        "Job" => format!("/apis/batch/v1/namespaces/{namespace}/jobs"),
        "CronJob" => format!("/apis/batch/v1/namespaces/{namespace}/cronjobs"),
        "Service" => format!("/api/v1/namespaces/{namespace}/services"),
        "ConfigMap" => format!("/api/v1/namespaces/{namespace}/configmaps"),
        "Ingress" => format!("/apis/networking.k8s.io/v1/namespaces/{namespace}/ingresses"),
        "HorizontalPodAutoscaler" => {
            format!("/apis/autoscaling/v2/namespaces/{namespace}/horizontalpodautoscalers")
        }
        other => {
            return Err(OrchestratorError::InvalidJob(format!(
                "unsupported manifest kind: '{other}'"
            )))
        }
    };
    Ok(path)
}

/// Derive a [`JobStatus`] from a batch job's status block.
fn batch_job_status(status: &Value) -> JobStatus {
    if status["succeeded"].as_u64().unwrap_or(0) > 0 {
        JobStatus::Dead { failed: false }
    } else if status["failed"].as_u64().unwrap_or(0) > 0 {
        JobStatus::Dead { failed: true }
    } else if status["active"].as_u64().unwrap_or(0) > 0 {
        JobStatus::Running
    } else {
        JobStatus::Pending
    }
}

/// Derive a [`JobStatus`] from a deployment's status block.
fn deployment_status(status: &Value) -> JobStatus {
    if status["availableReplicas"].as_u64().unwrap_or(0) > 0 {
        JobStatus::Running
    } else {
        JobStatus::Pending
    }
}

/// Parse a CPU quantity ("500m", "2") into MHz-equivalent shares.
///
/// Millicores map one-to-one onto the MHz ledger the license check uses, the
/// same convention the Nomad-like backend gets from CPU shares.
fn cpu_quantity_to_mhz(quantity: &str) -> u64 {
    if let Some(millis) = quantity.strip_suffix('m') {
        millis.parse().unwrap_or(0)
    } else {
        quantity.parse::<u64>().map(|cores| cores * 1000).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Orchestrator for KubernetesClient {
    async fn start_job(&self, job: &Job) -> Result<(), OrchestratorError> {
        let JobPayload::Manifests(manifests) = &job.payload else {
            return Err(OrchestratorError::InvalidJob(format!(
                "kubernetes backend requires manifests for job {}",
                job.name
            )));
        };
        for manifest in manifests {
            self.apply(manifest).await?;
        }
        debug!(job = %job.name, manifests = manifests.len(), "manifests applied");
        Ok(())
    }

    async fn stop_job(&self, name: &str) -> Result<(), OrchestratorError> {
        let ns = &self.namespace;
        let mut deleted = false;
        deleted |= self
            .delete_resource(&format!("/apis/apps/v1/namespaces/{ns}/deployments/{name}"))
            .await?;
        deleted |= self
            .delete_resource(&format!(
                "/apis/batch/v1/namespaces/{ns}/jobs/{name}?propagationPolicy=Background"
            ))
            .await?;
        // Routing and autoscaling resources ride along with the deployment.
        self.delete_resource(&format!(
            "/apis/networking.k8s.io/v1/namespaces/{ns}/ingresses/{name}"
        ))
        .await?;
        self.delete_resource(&format!("/api/v1/namespaces/{ns}/services/{name}"))
            .await?;

        if !deleted {
            return Err(OrchestratorError::JobNotFound(name.to_string()));
        }
        debug!(job = %name, "job stopped");
        Ok(())
    }

    async fn job_info(&self, name: &str) -> Result<JobInfo, OrchestratorError> {
        let ns = &self.namespace;
        let deployment = self
            .json(self.request(
                reqwest::Method::GET,
                &format!("/apis/apps/v1/namespaces/{ns}/deployments/{name}"),
            ))
            .await;
        match deployment {
            Ok(manifest) => {
                return Ok(JobInfo {
                    name: name.to_string(),
                    status: deployment_status(&manifest["status"]),
                })
            }
            Err(OrchestratorError::Api { status: 404, .. }) => {}
            Err(other) => return Err(other),
        }

        let batch = self
            .json(self.request(
                reqwest::Method::GET,
                &format!("/apis/batch/v1/namespaces/{ns}/jobs/{name}"),
            ))
            .await;
        match batch {
            Ok(manifest) => Ok(JobInfo {
                name: name.to_string(),
                status: batch_job_status(&manifest["status"]),
            }),
            Err(OrchestratorError::Api { status: 404, .. }) => {
                Err(OrchestratorError::JobNotFound(name.to_string()))
            }
            Err(other) => Err(other),
        }
    }

    async fn job_logs(&self, name: &str) -> Result<Vec<AllocationLog>, OrchestratorError> {
        let mut logs = Vec::new();
        for pod in self.pods_for_job(name).await? {
            let path = format!("/api/v1/namespaces/{}/pods/{pod}/log", self.namespace);
            let stdout = match self.send(self.request(reqwest::Method::GET, &path)).await {
                Ok(response) => response
                    .text()
                    .await
                    .map_err(OrchestratorError::from_reqwest)?,
                // Pod may have been reaped between list and read.
                Err(OrchestratorError::Api { status: 404, .. }) => continue,
                Err(other) => return Err(other),
            };
            // The API server interleaves both streams into one log.
            logs.push(AllocationLog {
                alloc_id: pod,
                stdout,
                stderr: String::new(),
            });
        }
        Ok(logs)
    }

    async fn list_services(&self) -> Result<Vec<ServiceInfo>, OrchestratorError> {
        let ns = &self.namespace;
        let services = self
            .json(self.request(
                reqwest::Method::GET,
                &format!("/api/v1/namespaces/{ns}/services"),
            ))
            .await?;

        let mut out = Vec::new();
        for service in services["items"].as_array().into_iter().flatten() {
            let Some(name) = service["metadata"]["name"].as_str() else {
                continue;
            };
            let endpoints = self
                .json(self.request(
                    reqwest::Method::GET,
                    &format!("/api/v1/namespaces/{ns}/endpoints/{name}"),
                ))
                .await;
            let endpoints = match endpoints {
                Ok(value) => value,
                Err(OrchestratorError::Api { status: 404, .. }) => continue,
                Err(other) => return Err(other),
            };

            let mut allocations = Vec::new();
            for subset in endpoints["subsets"].as_array().into_iter().flatten() {
                let ports: Vec<u16> = subset["ports"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|p| p["port"].as_u64().map(|p| p as u16))
                    .collect();
                for address in subset["addresses"].as_array().into_iter().flatten() {
                    let Some(ip) = address["ip"].as_str() else {
                        continue;
                    };
                    for port in &ports {
                        allocations.push(ServiceAllocation {
                            address: ip.to_string(),
                            port: *port,
                            alloc_id: address["targetRef"]["name"]
                                .as_str()
                                .unwrap_or_default()
                                .to_string(),
                            node_id: address["nodeName"].as_str().unwrap_or_default().to_string(),
                        });
                    }
                }
            }
            out.push(ServiceInfo {
                name: name.to_string(),
                allocations,
            });
        }
        Ok(out)
    }

    async fn total_cpu_usage(&self) -> Result<u64, OrchestratorError> {
        let pods = self
            .json(self.request(
                reqwest::Method::GET,
                &format!(
                    "/api/v1/namespaces/{}/pods?fieldSelector=status.phase%3DRunning",
                    self.namespace
                ),
            ))
            .await?;

        let total = pods["items"]
            .as_array()
            .into_iter()
            .flatten()
            .flat_map(|pod| pod["spec"]["containers"].as_array().cloned().unwrap_or_default())
            .map(|container| {
                container["resources"]["requests"]["cpu"]
                    .as_str()
                    .map(cpu_quantity_to_mhz)
                    .unwrap_or(0)
            })
            .sum();
        Ok(total)
    }

    fn ingress_hostname(&self) -> &str {
        &self.ingress_hostname
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_quantities_parse_to_mhz() {
        assert_eq!(cpu_quantity_to_mhz("500m"), 500);
        assert_eq!(cpu_quantity_to_mhz("2"), 2000);
        assert_eq!(cpu_quantity_to_mhz("garbage"), 0);
    }

    #[test]
    fn batch_status_maps_outcomes() {
        assert_eq!(
            batch_job_status(&serde_json::json!({"succeeded": 1})),
            JobStatus::Dead { failed: false }
        );
        assert_eq!(
            batch_job_status(&serde_json::json!({"failed": 2})),
            JobStatus::Dead { failed: true }
        );
        assert_eq!(
            batch_job_status(&serde_json::json!({"active": 1})),
            JobStatus::Running
        );
        assert_eq!(batch_job_status(&serde_json::json!({})), JobStatus::Pending);
    }

    #[test]
    fn deployment_status_requires_available_replicas() {
        assert_eq!(
            deployment_status(&serde_json::json!({"availableReplicas": 2})),
            JobStatus::Running
        );
        assert_eq!(deployment_status(&serde_json::json!({})), JobStatus::Pending);
    }

    #[test]
    fn collection_path_rejects_unknown_kinds() {
        let manifest = serde_json::json!({"kind": "Deployment"});
        assert_eq!(
            collection_path(&manifest, "bazaar").unwrap(),
            "/apis/apps/v1/namespaces/bazaar/deployments"
        );
        assert!(collection_path(&serde_json::json!({"kind": "Widget"}), "bazaar").is_err());
    }
}
