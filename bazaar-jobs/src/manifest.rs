//! Manifest rendering for the Kubernetes-like backend.
//!
//! Each job kind maps onto the obvious resource set: training runs become
//! batch jobs, deployments become deployment + service + ingress (+ HPA when
//! autoscaling is on), the recovery snapshot becomes a cron job. Manifests
//! are plain JSON documents applied in the order returned.

use serde_json::{json, Value};

use crate::params::{
    DeployJobParams, JobContext, RecoveryJobParams, ResourceRequest, SingletonService,
    TrainJobParams,
};

/// Label selecting every resource the control plane owns for one job.
fn labels(job_name: &str) -> Value {
    json!({ "bazaar.job": job_name })
}

fn image(context: &JobContext, name: &str) -> String {
    format!("{}/{name}:{}", context.registry, context.tag)
}

fn env_entries(context: &JobContext, extra: &[(&str, String)]) -> Value {
    let mut entries = vec![
        json!({ "name": "MODEL_BAZAAR_ENDPOINT", "value": context.private_endpoint }),
        json!({ "name": "SHARE_DIR", "value": "/share" }),
    ];
    for (key, value) in &context.cloud_env {
        entries.push(json!({ "name": key, "value": value }));
    }
    for (key, value) in extra {
        entries.push(json!({ "name": key, "value": value }));
    }
    Value::Array(entries)
}

fn resources(resources: &ResourceRequest) -> Value {
    json!({
        "requests": {
            "cpu": format!("{}m", resources.cpu_mhz),
            "memory": format!("{}Mi", resources.memory_mb),
        }
    })
}

fn share_volume(context: &JobContext) -> (Value, Value) {
    (
        json!([{ "name": "share", "hostPath": { "path": context.share_dir } }]),
        json!([{ "name": "share", "mountPath": "/share" }]),
    )
}

fn pod_spec(
    context: &JobContext,
    job_name: &str,
    image_name: &str,
    args: &[String],
    extra_env: &[(&str, String)],
    request: &ResourceRequest,
    restart_policy: Option<&str>,
) -> Value {
    let (volumes, mounts) = share_volume(context);
    let mut spec = json!({
        "containers": [{
            "name": job_name,
            "image": image(context, image_name),
            "args": args,
            "env": env_entries(context, extra_env),
            "resources": resources(request),
            "volumeMounts": mounts,
        }],
        "volumes": volumes,
    });
    if let Some(policy) = restart_policy {
        spec["restartPolicy"] = json!(policy);
    }
    spec
}

pub(crate) fn render_train(
    context: &JobContext,
    params: &TrainJobParams,
    namespace: &str,
) -> Vec<Value> {
    let image_name = if params.datagen { "datagen-train" } else { "train" };
    vec![json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": params.job_name,
            "namespace": namespace,
            "labels": labels(&params.job_name),
        },
        "spec": {
            "backoffLimit": 0,
            "template": {
                "metadata": { "labels": labels(&params.job_name) },
                "spec": pod_spec(
                    context,
                    &params.job_name,
                    image_name,
                    &["--config".to_string(), format!("/share/{}", params.config_path)],
                    &[
                        ("MODEL_ID", params.model_id.clone()),
                        ("JOB_TOKEN", params.job_token.clone()),
                    ],
                    &params.resources,
                    Some("Never"),
                ),
            },
        },
    })]
}

pub(crate) fn render_deploy(
    context: &JobContext,
    params: &DeployJobParams,
    namespace: &str,
) -> Vec<Value> {
    let name = &params.job_name;
    let mut extra = vec![
        ("MODEL_ID", params.model_id.clone()),
        ("JOB_TOKEN", params.job_token.clone()),
    ];
    if let Some(alias) = &params.deployment_name {
        extra.push(("DEPLOYMENT_NAME", alias.clone()));
    }

    let mut manifests = vec![
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels(name),
            },
            "spec": {
                "replicas": params.autoscaling.min_allocations.max(1),
                "selector": { "matchLabels": labels(name) },
                "template": {
                    "metadata": { "labels": labels(name) },
                    "spec": pod_spec(
                        context,
                        name,
                        "deploy",
                        &["--model-id".to_string(), params.model_id.clone()],
                        &extra,
                        &params.resources,
                        None,
                    ),
                },
            },
        }),
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels(name),
            },
            "spec": {
                "selector": labels(name),
                "ports": [{ "port": 80, "targetPort": 8000 }],
            },
        }),
        json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels(name),
            },
            "spec": {
                "rules": [{
                    "http": {
                        "paths": params.route_prefixes().iter().map(|prefix| json!({
                            "path": prefix,
                            "pathType": "Prefix",
                            "backend": {
                                "service": { "name": name, "port": { "number": 80 } }
                            }
                        })).collect::<Vec<_>>(),
                    },
                }],
            },
        }),
    ];

    if params.autoscaling.enabled {
        manifests.push(json!({
            "apiVersion": "autoscaling/v2",
            "kind": "HorizontalPodAutoscaler",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels(name),
            },
            "spec": {
                "scaleTargetRef": {
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "name": name,
                },
                "minReplicas": params.autoscaling.min_allocations,
                "maxReplicas": params.autoscaling.max_allocations,
                "metrics": [{
                    "type": "Resource",
                    "resource": {
                        "name": "cpu",
                        "target": {
                            "type": "Utilization",
                            "averageUtilization": params.autoscaling.target_cpu_percent,
                        },
                    },
                }],
                "behavior": {
                    "scaleDown": {
                        "stabilizationWindowSeconds": params.autoscaling.cooldown_secs,
                    },
                },
            },
        }));
    }
    manifests
}

pub(crate) fn render_recovery(
    context: &JobContext,
    params: &RecoveryJobParams,
    namespace: &str,
) -> Vec<Value> {
    vec![json!({
        "apiVersion": "batch/v1",
        "kind": "CronJob",
        "metadata": {
            "name": params.job_name,
            "namespace": namespace,
            "labels": labels(&params.job_name),
        },
        "spec": {
            "schedule": params.schedule,
            "concurrencyPolicy": "Forbid",
            "jobTemplate": {
                "spec": {
                    "template": {
                        "metadata": { "labels": labels(&params.job_name) },
                        "spec": pod_spec(
                            context,
                            &params.job_name,
                            "recovery",
                            &[],
                            &[],
                            &params.resources,
                            Some("Never"),
                        ),
                    },
                },
            },
        },
    })]
}

pub(crate) fn render_singleton(
    context: &JobContext,
    service: SingletonService,
    namespace: &str,
) -> Vec<Value> {
    let name = service.job_name();
    let mut extra = Vec::new();
    if service.needs_genai_key() {
        if let Some(key) = &context.genai_key {
            extra.push(("GENAI_KEY", key.clone()));
        }
    }
    vec![
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels(name),
            },
            "spec": {
                "replicas": 1,
                "selector": { "matchLabels": labels(name) },
                "template": {
                    "metadata": { "labels": labels(name) },
                    "spec": pod_spec(
                        context,
                        name,
                        service.image(),
                        &[],
                        &extra,
                        &ResourceRequest::default(),
                        None,
                    ),
                },
            },
        }),
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels(name),
            },
            "spec": {
                "selector": labels(name),
                "ports": [{ "port": service.port() }],
            },
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AutoscalingPolicy;

    fn context() -> JobContext {
        JobContext {
            registry: "registry.local".into(),
            tag: "stable".into(),
            driver: "docker".into(),
            share_dir: "/mnt/share".into(),
            private_endpoint: "http://bazaar.internal:8000".into(),
            cloud_env: vec![],
            genai_key: None,
        }
    }

    #[test]
    fn deploy_renders_expected_resource_set() {
        let params = DeployJobParams {
            job_name: "deploy-m1".into(),
            model_id: "m1".into(),
            deployment_name: None,
            resources: ResourceRequest::default(),
            autoscaling: AutoscalingPolicy {
                enabled: true,
                max_allocations: 3,
                ..AutoscalingPolicy::default()
            },
            job_token: "tok".into(),
        };
        let manifests = render_deploy(&context(), &params, "bazaar");
        let kinds: Vec<&str> = manifests
            .iter()
            .map(|m| m["kind"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["Deployment", "Service", "Ingress", "HorizontalPodAutoscaler"]
        );
        assert_eq!(manifests[3]["spec"]["maxReplicas"], 3);
        assert_eq!(
            manifests[2]["spec"]["rules"][0]["http"]["paths"][0]["path"],
            "/m1/"
        );
    }

    #[test]
    fn autoscaling_disabled_drops_the_hpa() {
        let params = DeployJobParams {
            job_name: "deploy-m1".into(),
            model_id: "m1".into(),
            deployment_name: None,
            resources: ResourceRequest::default(),
            autoscaling: AutoscalingPolicy::default(),
            job_token: "tok".into(),
        };
        let manifests = render_deploy(&context(), &params, "bazaar");
        assert_eq!(manifests.len(), 3);
    }

    #[test]
    fn train_job_is_a_batch_job_with_config_arg() {
        let params = TrainJobParams {
            job_name: "train-m1".into(),
            model_id: "m1".into(),
            config_path: "data/m1/train_config.json".into(),
            resources: ResourceRequest {
                cpu_mhz: 1200,
                memory_mb: 2048,
            },
            datagen: false,
            job_token: "tok".into(),
        };
        let manifests = render_train(&context(), &params, "bazaar");
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0]["kind"], "Job");
        let container = &manifests[0]["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["args"][1], "/share/data/m1/train_config.json");
        assert_eq!(container["resources"]["requests"]["cpu"], "1200m");
    }

    #[test]
    fn singleton_renders_deployment_and_service() {
        let manifests = render_singleton(&context(), SingletonService::Frontend, "bazaar");
        assert_eq!(manifests[0]["kind"], "Deployment");
        assert_eq!(manifests[1]["kind"], "Service");
        assert_eq!(manifests[1]["spec"]["ports"][0]["port"], 3000);
    }
}
