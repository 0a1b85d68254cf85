//! End-to-end submission flows against an in-memory hub.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use url::Url;

use granary_branch::{BranchError, BranchSource};
use granary_build::{
    BuildError, BuildOptions, BuildOrchestrator, OrchestratorConfig, SourcePackage, Vcs,
};
use granary_command::ChoicePrompter;
use granary_hub::{HubClient, HubError, RpcTransport, TaskId};

#[derive(Debug, Clone)]
struct RecordedCall {
    method: String,
    params: Vec<Value>,
}

type Handler = Box<dyn Fn(&str, &[Value]) -> Result<Value, HubError> + Send + Sync>;

struct MockTransport {
    calls: Mutex<Vec<RecordedCall>>,
    handler: Handler,
}

impl MockTransport {
    fn new(
        handler: impl Fn(&str, &[Value]) -> Result<Value, HubError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.method.clone())
            .collect()
    }

    fn params_of(&self, method: &str) -> Option<Vec<Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.method == method)
            .map(|c| c.params.clone())
    }
}

// `RpcTransport` and `Arc` are both foreign to this crate, so the trait
// cannot be implemented for `Arc<MockTransport>` directly (orphan rule).
// A local newtype carries the shared handle and forwards every call
// unchanged.
#[derive(Clone)]
struct SharedMock(Arc<MockTransport>);

#[async_trait]
impl RpcTransport for SharedMock {
    async fn call(
        &self,
        _endpoint: &Url,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, HubError> {
        self.0.calls.lock().unwrap().push(RecordedCall {
            method: method.to_owned(),
            params: params.clone(),
        });
        (self.0.handler)(method, &params)
    }
}

fn default_handler(method: &str, _params: &[Value]) -> Result<Value, HubError> {
    match method {
        "getBuildTargets" => Ok(json!([
            { "name": "f21-candidate", "build_tag_name": "f21-build" },
            { "name": "rawhide", "build_tag_name": "f22-build" },
        ])),
        "login" => Ok(json!({ "sessionKey": "key", "sessionID": 5 })),
        "getBuild" => Ok(Value::Null),
        "build" => Ok(json!(555)),
        "chainBuild" => Ok(json!(556)),
        "uploadFile" => Ok(json!(true)),
        "logout" => Ok(Value::Null),
        other => panic!("unexpected RPC {other}"),
    }
}

struct FakeVcs {
    current: String,
    remote: Vec<String>,
    fetch_fails: bool,
    commits: HashMap<String, String>,
}

impl FakeVcs {
    fn in_sync(branch: &str) -> Self {
        Self {
            current: branch.to_owned(),
            remote: vec![format!("refs/heads/{branch}")],
            fetch_fails: false,
            commits: HashMap::from([
                (branch.to_owned(), "abc".to_owned()),
                (format!("origin/{branch}"), "abc".to_owned()),
            ]),
        }
    }

    fn diverged(branch: &str) -> Self {
        let mut vcs = Self::in_sync(branch);
        vcs.commits
            .insert(format!("origin/{branch}"), "def".to_owned());
        vcs
    }
}

#[async_trait]
impl BranchSource for FakeVcs {
    async fn current_branch(&self) -> Result<String, BranchError> {
        Ok(self.current.clone())
    }

    async fn remote_branches(&self) -> Result<Vec<String>, BranchError> {
        Ok(self.remote.clone())
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn fetch(&self, _remote: &str) -> Result<(), BranchError> {
        if self.fetch_fails {
            Err(BranchError::vcs("network down"))
        } else {
            Ok(())
        }
    }

    async fn commit_id(&self, refname: &str) -> Result<String, BranchError> {
        self.commits
            .get(refname)
            .cloned()
            .ok_or_else(|| BranchError::vcs(format!("unknown ref {refname}")))
    }
}

struct FixedPrompter {
    answer: Option<String>,
}

#[async_trait]
impl ChoicePrompter for FixedPrompter {
    async fn choose(&self, _prompt: &str, _options: &[String]) -> Option<String> {
        self.answer.clone()
    }
}

fn package_with_scm() -> SourcePackage {
    SourcePackage {
        name: "pkg".into(),
        version: "1.0".into(),
        release: "1%{?dist}".into(),
        scm_url: Some("git://pkgs.example.org/pkg?#abc123".into()),
    }
}

fn orchestrator(
    transport: Arc<MockTransport>,
    vcs: FakeVcs,
    prompter: FixedPrompter,
) -> BuildOrchestrator<SharedMock> {
    let client = HubClient::new(
        Url::parse("https://hub.example.org/rpc").unwrap(),
        SharedMock(transport),
    );
    BuildOrchestrator::new(
        OrchestratorConfig::default(),
        client,
        Arc::new(vcs),
        Arc::new(prompter),
    )
}

#[tokio::test]
async fn test_scm_submission_end_to_end() {
    let transport = MockTransport::new(default_handler);
    let orchestrator = orchestrator(
        transport.clone(),
        FakeVcs::in_sync("f21"),
        FixedPrompter { answer: None },
    );

    let tasks = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(tasks, [TaskId(555)]);
    assert_eq!(
        transport.methods(),
        ["getBuildTargets", "login", "getBuild", "build", "logout"]
    );
    // the duplicate check runs against the dist-resolved NVR
    assert_eq!(
        transport.params_of("getBuild").unwrap(),
        [json!("pkg-1.0-1.fc21")]
    );
    assert_eq!(
        transport.params_of("build").unwrap(),
        [json!("git://pkgs.example.org/pkg?#abc123"), json!("f21-candidate")]
    );
}

#[tokio::test]
async fn test_unpushed_changes_block_submission_before_login() {
    let transport = MockTransport::new(default_handler);
    let orchestrator = orchestrator(
        transport.clone(),
        FakeVcs::diverged("f21"),
        FixedPrompter { answer: None },
    );

    let err = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::UnpushedChanges { ref branch } if branch == "f21"));
    // target resolution happened, but nothing session-bound did
    assert_eq!(transport.methods(), ["getBuildTargets"]);
}

#[tokio::test]
async fn test_fetch_failure_is_treated_as_unpushed() {
    let transport = MockTransport::new(default_handler);
    let mut vcs = FakeVcs::in_sync("f21");
    vcs.fetch_fails = true;
    let orchestrator = orchestrator(transport.clone(), vcs, FixedPrompter { answer: None });

    let err = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::UnpushedChanges { .. }));
}

#[tokio::test]
async fn test_srpm_submission_uploads_then_builds() {
    let dir = tempfile::tempdir().unwrap();
    let srpm = dir.path().join("pkg-1.0-1.fc21.src.rpm");
    tokio::fs::write(&srpm, vec![7u8; 4096]).await.unwrap();

    let transport = MockTransport::new(default_handler);
    // a diverged tree does not matter for a pre-built SRPM
    let orchestrator = orchestrator(
        transport.clone(),
        FakeVcs::diverged("f21"),
        FixedPrompter { answer: None },
    );

    let tasks = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions {
                srpm: Some(srpm),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(tasks, [TaskId(555)]);
    assert_eq!(
        transport.methods(),
        ["getBuildTargets", "login", "uploadFile", "getBuild", "build", "logout"]
    );

    let upload_params = transport.params_of("uploadFile").unwrap();
    let remote_path = upload_params[0].as_str().unwrap();
    assert!(remote_path.starts_with("cli-build/"));

    let build_params = transport.params_of("build").unwrap();
    let location = build_params[0].as_str().unwrap();
    assert_eq!(
        location,
        format!("{remote_path}/pkg-1.0-1.fc21.src.rpm")
    );
}

#[tokio::test]
async fn test_chain_build_dispatch() {
    let transport = MockTransport::new(default_handler);
    let orchestrator = orchestrator(
        transport.clone(),
        FakeVcs::in_sync("f21"),
        FixedPrompter { answer: None },
    );

    let groups = vec![
        vec!["git://pkgs/one#a".to_owned()],
        vec!["git://pkgs/two#b".to_owned(), "git://pkgs/three#c".to_owned()],
    ];
    let tasks = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions {
                chain: Some(groups.clone()),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(tasks, [TaskId(556)]);
    let params = transport.params_of("chainBuild").unwrap();
    assert_eq!(params[0], json!(groups));
}

#[tokio::test]
async fn test_declined_target_prompt_fails_operation() {
    let transport = MockTransport::new(default_handler);
    let config = OrchestratorConfig {
        always_prompt_target: true,
        ..Default::default()
    };
    let client = HubClient::new(
        Url::parse("https://hub.example.org/rpc").unwrap(),
        SharedMock(transport.clone()),
    );
    let orchestrator = BuildOrchestrator::new(
        config,
        client,
        Arc::new(FakeVcs::in_sync("f21")),
        Arc::new(FixedPrompter { answer: None }),
    );

    let err = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::TargetNotChosen));
    assert_eq!(transport.methods(), ["getBuildTargets"]);
}

#[tokio::test]
async fn test_working_branch_falls_back_to_prompter() {
    let transport = MockTransport::new(default_handler);
    let mut vcs = FakeVcs::in_sync("feature/foo");
    vcs.remote = vec!["refs/heads/f21".into(), "refs/heads/master".into()];
    let orchestrator = orchestrator(
        transport.clone(),
        vcs,
        FixedPrompter {
            answer: Some("f21".into()),
        },
    );

    let tasks = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(tasks, [TaskId(555)]);
    // the picked branch's dist tag flows into the NVR
    assert_eq!(
        transport.params_of("getBuild").unwrap(),
        [json!("pkg-1.0-1.fc21")]
    );
}

#[tokio::test]
async fn test_working_branch_with_declined_prompt() {
    let transport = MockTransport::new(default_handler);
    let mut vcs = FakeVcs::in_sync("feature/foo");
    vcs.remote = vec!["refs/heads/f21".into()];
    let orchestrator = orchestrator(transport, vcs, FixedPrompter { answer: None });

    let err = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::BranchNotChosen));
}

#[tokio::test]
async fn test_logout_runs_even_when_submission_faults() {
    let transport = MockTransport::new(|method, params| match method {
        "build" => Err(HubError::Fault {
            code: 1,
            message: "policy violation".into(),
        }),
        other => default_handler(other, params),
    });
    let orchestrator = orchestrator(
        transport.clone(),
        FakeVcs::in_sync("f21"),
        FixedPrompter { answer: None },
    );

    let err = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Hub(HubError::Fault { .. })));
    assert_eq!(transport.methods().last().map(String::as_str), Some("logout"));
}

#[tokio::test]
async fn test_duplicate_build_surfaces_existing_task() {
    let transport = MockTransport::new(|method, params| match method {
        "getBuild" => Ok(json!({
            "state": 1,
            "task_id": 4242,
            "package_id": 1,
            "package_name": "pkg",
            "epoch": null,
            "version": "1.0",
            "release": "1.fc21",
            "nvr": params[0],
        })),
        other => default_handler(other, params),
    });
    let orchestrator = orchestrator(
        transport.clone(),
        FakeVcs::in_sync("f21"),
        FixedPrompter { answer: None },
    );

    let err = orchestrator
        .submit(
            PathBuf::from("/srv/pkg"),
            package_with_scm(),
            BuildOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        BuildError::Hub(HubError::BuildAlreadyExists { task_id, .. }) => {
            assert_eq!(task_id, Some(TaskId(4242)));
        }
        other => panic!("expected BuildAlreadyExists, got {other:?}"),
    }
    // the build RPC itself never fired, the session still closed
    assert!(!transport.methods().iter().any(|m| m == "build"));
    assert_eq!(transport.methods().last().map(String::as_str), Some("logout"));
}
