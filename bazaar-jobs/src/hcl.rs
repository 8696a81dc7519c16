//! HCL rendering for the Nomad-like backend.
//!
//! Templates are assembled with `format!` from typed records, so a missing
//! parameter is a compile error. Output is deterministic: iteration orders
//! are fixed and every user-supplied value passes through [`escape_hcl`].

use std::fmt::Write;

use crate::escape::escape_hcl;
use crate::params::{
    DeployJobParams, JobContext, RecoveryJobParams, ResourceRequest, SingletonService,
    TrainJobParams,
};

/// Environment block common to all jobs: callback endpoint, shared dir, and
/// pass-through cloud credentials.
fn env_block(context: &JobContext, extra: &[(&str, String)]) -> String {
    let mut out = String::from("      env {\n");
    let _ = writeln!(
        out,
        "        MODEL_BAZAAR_ENDPOINT = \"{}\"",
        escape_hcl(&context.private_endpoint)
    );
    let _ = writeln!(out, "        SHARE_DIR = \"/share\"");
    for (key, value) in &context.cloud_env {
        let _ = writeln!(out, "        {key} = \"{}\"", escape_hcl(value));
    }
    for (key, value) in extra {
        let _ = writeln!(out, "        {key} = \"{}\"", escape_hcl(value));
    }
    out.push_str("      }\n");
    out
}

fn resources_block(resources: &ResourceRequest) -> String {
    format!(
        "      resources {{\n        cpu    = {}\n        memory = {}\n      }}\n",
        resources.cpu_mhz, resources.memory_mb
    )
}

fn docker_config(context: &JobContext, image: &str, args: &[String]) -> String {
    let mut out = String::from("      config {\n");
    let _ = writeln!(
        out,
        "        image = \"{}/{image}:{}\"",
        escape_hcl(&context.registry),
        escape_hcl(&context.tag)
    );
    if !args.is_empty() {
        let rendered: Vec<String> = args
            .iter()
            .map(|a| format!("\"{}\"", escape_hcl(a)))
            .collect();
        let _ = writeln!(out, "        args = [{}]", rendered.join(", "));
    }
    let _ = writeln!(
        out,
        "        volumes = [\"{}:/share\"]",
        escape_hcl(&context.share_dir)
    );
    out.push_str("      }\n");
    out
}

pub(crate) fn render_train(context: &JobContext, params: &TrainJobParams) -> String {
    let image = if params.datagen { "datagen-train" } else { "train" };
    let mut job = String::new();
    let _ = writeln!(job, "job \"{}\" {{", escape_hcl(&params.job_name));
    job.push_str("  datacenters = [\"dc1\"]\n  type = \"batch\"\n");
    let _ = writeln!(job, "  group \"{}\" {{", escape_hcl(&params.job_name));
    job.push_str("    count = 1\n");
    let _ = writeln!(job, "    task \"{}\" {{", escape_hcl(&params.job_name));
    let _ = writeln!(job, "      driver = \"{}\"", escape_hcl(&context.driver));
    job.push_str(&docker_config(
        context,
        image,
        &[
            "--config".to_string(),
            format!("/share/{}", params.config_path),
        ],
    ));
    job.push_str(&env_block(
        context,
        &[
            ("MODEL_ID", params.model_id.clone()),
            ("JOB_TOKEN", params.job_token.clone()),
        ],
    ));
    job.push_str(&resources_block(&params.resources));
    job.push_str("    }\n  }\n}\n");
    job
}

pub(crate) fn render_deploy(context: &JobContext, params: &DeployJobParams) -> String {
    let mut job = String::new();
    let _ = writeln!(job, "job \"{}\" {{", escape_hcl(&params.job_name));
    job.push_str("  datacenters = [\"dc1\"]\n  type = \"service\"\n");
    let _ = writeln!(job, "  group \"{}\" {{", escape_hcl(&params.job_name));
    let _ = writeln!(job, "    count = {}", params.autoscaling.min_allocations.max(1));

    if params.autoscaling.enabled {
        let _ = writeln!(
            job,
            "    scaling {{\n      enabled = true\n      min = {}\n      max = {}\n      policy {{\n        cooldown            = \"{}s\"\n        evaluation_interval = \"{}s\"\n        check \"cpu\" {{\n          source = \"nomad-apm\"\n          query  = \"avg_cpu\"\n          strategy \"target-value\" {{\n            target = {}\n          }}\n        }}\n      }}\n    }}",
            params.autoscaling.min_allocations,
            params.autoscaling.max_allocations,
            params.autoscaling.cooldown_secs,
            params.autoscaling.evaluation_interval_secs,
            params.autoscaling.target_cpu_percent,
        );
    }

    job.push_str("    network {\n      port \"http\" {}\n    }\n");

    // Service registration carries the routing tags; the ingress proxy routes
    // each prefix to this service.
    let _ = writeln!(job, "    service {{");
    let _ = writeln!(job, "      name = \"{}\"", escape_hcl(&params.job_name));
    job.push_str("      port = \"http\"\n      tags = [\n");
    for prefix in params.route_prefixes() {
        let _ = writeln!(job, "        \"route:{}\",", escape_hcl(&prefix));
    }
    job.push_str("      ]\n");
    let _ = writeln!(
        job,
        "      check {{\n        type     = \"http\"\n        path     = \"{}\"\n        interval = \"10s\"\n        timeout  = \"2s\"\n      }}",
        escape_hcl(&params.health_path())
    );
    job.push_str("    }\n");

    let _ = writeln!(job, "    task \"{}\" {{", escape_hcl(&params.job_name));
    let _ = writeln!(job, "      driver = \"{}\"", escape_hcl(&context.driver));
    job.push_str(&docker_config(
        context,
        "deploy",
        &["--model-id".to_string(), params.model_id.clone()],
    ));
    let mut extra = vec![
        ("MODEL_ID", params.model_id.clone()),
        ("JOB_TOKEN", params.job_token.clone()),
    ];
    if let Some(name) = &params.deployment_name {
        extra.push(("DEPLOYMENT_NAME", name.clone()));
    }
    job.push_str(&env_block(context, &extra));
    job.push_str(&resources_block(&params.resources));
    job.push_str("    }\n  }\n}\n");
    job
}

pub(crate) fn render_recovery(context: &JobContext, params: &RecoveryJobParams) -> String {
    let mut job = String::new();
    let _ = writeln!(job, "job \"{}\" {{", escape_hcl(&params.job_name));
    job.push_str("  datacenters = [\"dc1\"]\n  type = \"batch\"\n");
    let _ = writeln!(
        job,
        "  periodic {{\n    cron             = \"{}\"\n    prohibit_overlap = true\n  }}",
        escape_hcl(&params.schedule)
    );
    let _ = writeln!(job, "  group \"{}\" {{", escape_hcl(&params.job_name));
    job.push_str("    count = 1\n");
    let _ = writeln!(job, "    task \"{}\" {{", escape_hcl(&params.job_name));
    let _ = writeln!(job, "      driver = \"{}\"", escape_hcl(&context.driver));
    job.push_str(&docker_config(context, "recovery", &[]));
    job.push_str(&env_block(context, &[]));
    job.push_str(&resources_block(&params.resources));
    job.push_str("    }\n  }\n}\n");
    job
}

pub(crate) fn render_singleton(context: &JobContext, service: SingletonService) -> String {
    let name = service.job_name();
    let mut job = String::new();
    let _ = writeln!(job, "job \"{name}\" {{");
    job.push_str("  datacenters = [\"dc1\"]\n  type = \"service\"\n");
    let _ = writeln!(job, "  group \"{name}\" {{");
    job.push_str("    count = 1\n");
    let _ = writeln!(
        job,
        "    network {{\n      port \"http\" {{\n        static = {}\n      }}\n    }}",
        service.port()
    );
    let _ = writeln!(
        job,
        "    service {{\n      name = \"{name}\"\n      port = \"http\"\n    }}"
    );
    let _ = writeln!(job, "    task \"{name}\" {{");
    let _ = writeln!(job, "      driver = \"{}\"", escape_hcl(&context.driver));
    job.push_str(&docker_config(context, service.image(), &[]));
    let mut extra = Vec::new();
    if service.needs_genai_key() {
        if let Some(key) = &context.genai_key {
            extra.push(("GENAI_KEY", key.clone()));
        }
    }
    job.push_str(&env_block(context, &extra));
    job.push_str(&resources_block(&ResourceRequest::default()));
    job.push_str("    }\n  }\n}\n");
    job
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AutoscalingPolicy;

    fn context() -> JobContext {
        JobContext {
            registry: "docker.io/modelbazaar".into(),
            tag: "v1.2.3".into(),
            driver: "docker".into(),
            share_dir: "/mnt/share".into(),
            private_endpoint: "http://bazaar.internal:8000".into(),
            cloud_env: vec![("AWS_ACCESS_KEY_ID".into(), "AKIA123".into())],
            genai_key: Some("genai-key".into()),
        }
    }

    fn deploy_params() -> DeployJobParams {
        DeployJobParams {
            job_name: "deploy-abc123".into(),
            model_id: "abc123".into(),
            deployment_name: Some("My App".into()),
            resources: ResourceRequest::default(),
            autoscaling: AutoscalingPolicy {
                enabled: true,
                min_allocations: 1,
                max_allocations: 4,
                ..AutoscalingPolicy::default()
            },
            job_token: "tok".into(),
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let params = deploy_params();
        assert_eq!(
            render_deploy(&context(), &params),
            render_deploy(&context(), &params)
        );
    }

    #[test]
    fn deploy_routes_model_id_and_alias() {
        let hcl = render_deploy(&context(), &deploy_params());
        assert!(hcl.contains("\"route:/abc123/\""));
        assert!(hcl.contains("\"route:/my-app/\""));
        assert!(hcl.contains("path     = \"/abc123/health\""));
    }

    #[test]
    fn autoscaling_block_tracks_policy() {
        let mut params = deploy_params();
        let hcl = render_deploy(&context(), &params);
        assert!(hcl.contains("scaling {"));
        assert!(hcl.contains("max = 4"));

        params.autoscaling.enabled = false;
        let hcl = render_deploy(&context(), &params);
        assert!(!hcl.contains("scaling {"));
    }

    #[test]
    fn user_strings_cannot_escape_quotes() {
        let mut params = deploy_params();
        params.deployment_name = Some("evil\"}\njob \"pwn".into());
        let hcl = render_deploy(&context(), &params);
        // The sanitized alias keeps only slug characters.
        assert!(hcl.contains("\"route:/eviljob-pwn/\""));
        // The raw value is escaped where it appears as an env var.
        assert!(hcl.contains("DEPLOYMENT_NAME = \"evil\\\"}\\njob \\\"pwn\""));
    }

    #[test]
    fn train_job_references_config_on_shared_storage() {
        let params = TrainJobParams {
            job_name: "train-m1".into(),
            model_id: "m1".into(),
            config_path: "data/m1/train_config.json".into(),
            resources: ResourceRequest::default(),
            datagen: false,
            job_token: "tok".into(),
        };
        let hcl = render_train(&context(), &params);
        assert!(hcl.contains("type = \"batch\""));
        assert!(hcl.contains("/share/data/m1/train_config.json"));
        assert!(hcl.contains("AWS_ACCESS_KEY_ID = \"AKIA123\""));
    }

    #[test]
    fn recovery_job_is_periodic() {
        let params = RecoveryJobParams {
            job_name: "recovery-snapshot".into(),
            schedule: "0 3 * * *".into(),
            resources: ResourceRequest::default(),
        };
        let hcl = render_recovery(&context(), &params);
        assert!(hcl.contains("periodic {"));
        assert!(hcl.contains("cron             = \"0 3 * * *\""));
    }

    #[test]
    fn singleton_gets_genai_key_only_when_needed() {
        let hcl = render_singleton(&context(), SingletonService::LlmDispatch);
        assert!(hcl.contains("GENAI_KEY"));
        let hcl = render_singleton(&context(), SingletonService::Frontend);
        assert!(!hcl.contains("GENAI_KEY"));
    }
}
