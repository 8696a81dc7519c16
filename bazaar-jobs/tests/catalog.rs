//! Catalog-level rendering tests: one parameter record in, the right
//! backend payload out, for every job kind.

use bazaar_jobs::{
    AutoscalingPolicy, DeployJobParams, JobContext, JobTemplates, RecoveryJobParams,
    RenderBackend, ResourceRequest, SingletonService, TrainJobParams,
};
use bazaar_orchestrator::JobPayload;

fn context() -> JobContext {
    JobContext {
        registry: "registry.example.com/bazaar".into(),
        tag: "2.1.0".into(),
        driver: "docker".into(),
        share_dir: "/mnt/bazaar-share".into(),
        private_endpoint: "http://bazaar.internal:8000".into(),
        cloud_env: vec![
            ("AWS_ACCESS_KEY_ID".into(), "AKIAEXAMPLE".into()),
            ("AWS_SECRET_ACCESS_KEY".into(), "secret".into()),
        ],
        genai_key: Some("genai".into()),
    }
}

fn nomad() -> JobTemplates {
    JobTemplates::new(context(), RenderBackend::Nomad)
}

fn kubernetes() -> JobTemplates {
    JobTemplates::new(
        context(),
        RenderBackend::Kubernetes {
            namespace: "bazaar".into(),
        },
    )
}

fn train_params() -> TrainJobParams {
    TrainJobParams {
        job_name: "train-7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
        model_id: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
        config_path: "data/7c9e6679-7425-40de-944b-e07fc1f90ae7/train_config.json".into(),
        resources: ResourceRequest {
            cpu_mhz: 2000,
            memory_mb: 4096,
        },
        datagen: false,
        job_token: "train-token".into(),
    }
}

fn deploy_params() -> DeployJobParams {
    DeployJobParams {
        job_name: "deploy-7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
        model_id: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
        deployment_name: Some("my-app".into()),
        resources: ResourceRequest::default(),
        autoscaling: AutoscalingPolicy {
            enabled: true,
            min_allocations: 1,
            max_allocations: 4,
            ..AutoscalingPolicy::default()
        },
        job_token: "deploy-token".into(),
    }
}

#[test]
fn nomad_catalog_renders_hcl_for_every_kind() {
    let templates = nomad();
    let jobs = vec![
        templates.train_job(&train_params()),
        templates.deploy_job(&deploy_params()),
        templates.recovery_job(&RecoveryJobParams {
            job_name: "recovery-snapshot".into(),
            schedule: "0 3 * * *".into(),
            resources: ResourceRequest::default(),
        }),
    ];
    for job in &jobs {
        match &job.payload {
            JobPayload::Hcl(hcl) => {
                assert!(hcl.starts_with(&format!("job \"{}\"", job.name)), "{}", job.name);
                assert!(hcl.contains("/mnt/bazaar-share:/share"));
            }
            JobPayload::Manifests(_) => panic!("nomad backend produced manifests"),
        }
    }
}

#[test]
fn kubernetes_catalog_renders_manifests_for_every_kind() {
    let templates = kubernetes();
    let jobs = vec![
        templates.train_job(&train_params()),
        templates.deploy_job(&deploy_params()),
        templates.recovery_job(&RecoveryJobParams {
            job_name: "recovery-snapshot".into(),
            schedule: "0 3 * * *".into(),
            resources: ResourceRequest::default(),
        }),
    ];
    for job in &jobs {
        match &job.payload {
            JobPayload::Manifests(manifests) => {
                assert!(!manifests.is_empty(), "{}", job.name);
                for manifest in manifests {
                    assert_eq!(manifest["metadata"]["namespace"], "bazaar");
                    assert!(manifest["kind"].is_string());
                }
            }
            JobPayload::Hcl(_) => panic!("kubernetes backend produced HCL"),
        }
    }
}

#[test]
fn every_singleton_renders_on_both_backends() {
    for service in SingletonService::ALL {
        let job = nomad().singleton_job(service);
        assert_eq!(job.name, service.job_name());
        assert!(matches!(job.payload, JobPayload::Hcl(_)));

        let job = kubernetes().singleton_job(service);
        assert_eq!(job.name, service.job_name());
        let JobPayload::Manifests(manifests) = &job.payload else {
            panic!("expected manifests");
        };
        assert_eq!(manifests.len(), 2);
    }
}

#[test]
fn catalog_rendering_is_deterministic_across_instances() {
    let a = nomad().deploy_job(&deploy_params());
    let b = nomad().deploy_job(&deploy_params());
    match (&a.payload, &b.payload) {
        (JobPayload::Hcl(x), JobPayload::Hcl(y)) => assert_eq!(x, y),
        _ => panic!("expected HCL payloads"),
    }

    let a = kubernetes().deploy_job(&deploy_params());
    let b = kubernetes().deploy_job(&deploy_params());
    match (&a.payload, &b.payload) {
        (JobPayload::Manifests(x), JobPayload::Manifests(y)) => assert_eq!(x, y),
        _ => panic!("expected manifest payloads"),
    }
}

#[test]
fn deploy_routes_both_prefixes_on_both_backends() {
    let params = deploy_params();
    let JobPayload::Hcl(hcl) = nomad().deploy_job(&params).payload else {
        panic!("expected HCL");
    };
    assert!(hcl.contains("route:/7c9e6679-7425-40de-944b-e07fc1f90ae7/"));
    assert!(hcl.contains("route:/my-app/"));

    let JobPayload::Manifests(manifests) = kubernetes().deploy_job(&params).payload else {
        panic!("expected manifests");
    };
    let ingress = manifests
        .iter()
        .find(|m| m["kind"] == "Ingress")
        .expect("ingress manifest");
    let paths: Vec<&str> = ingress["spec"]["rules"][0]["http"]["paths"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["path"].as_str().unwrap())
        .collect();
    assert_eq!(
        paths,
        vec!["/7c9e6679-7425-40de-944b-e07fc1f90ae7/", "/my-app/"]
    );
}

#[test]
fn job_tokens_and_credentials_reach_the_environment() {
    let JobPayload::Hcl(hcl) = nomad().train_job(&train_params()).payload else {
        panic!("expected HCL");
    };
    assert!(hcl.contains("JOB_TOKEN = \"train-token\""));
    assert!(hcl.contains("AWS_SECRET_ACCESS_KEY = \"secret\""));

    let JobPayload::Manifests(manifests) = kubernetes().train_job(&train_params()).payload else {
        panic!("expected manifests");
    };
    let env = manifests[0]["spec"]["template"]["spec"]["containers"][0]["env"]
        .as_array()
        .unwrap()
        .clone();
    assert!(env
        .iter()
        .any(|e| e["name"] == "JOB_TOKEN" && e["value"] == "train-token"));
    assert!(env
        .iter()
        .any(|e| e["name"] == "MODEL_BAZAAR_ENDPOINT"
            && e["value"] == "http://bazaar.internal:8000"));
}
