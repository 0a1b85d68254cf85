//! The hub client: session lifecycle, duplicate-build avoidance, build and
//! chain-build submission, chunked file upload, catalog queries.

use std::collections::BTreeSet;
use std::path::Path;

use data_encoding::BASE64;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use granary_utils_hash::digest_file;

use crate::error::{HubError, LoginFaultKind};
use crate::session::{Session, SessionAuth};
use crate::transport::{HttpTransport, RpcTransport};
use crate::types::{BuildInfo, BuildRequest, BuildTarget, RepoInfo, SourceLocations, TaskId};

/// Practical payload ceiling per `uploadFile` call; larger files go up in
/// sequential chunks at monotonically increasing offsets.
pub const UPLOAD_CHUNK_SIZE: usize = 1_000_000;

/// Client for the build-farm hub.
///
/// Holds exactly one [`Session`]. Not fork-safe: a logical operation owns
/// its client; concurrent operations each construct their own.
pub struct HubClient<T> {
    transport: T,
    session: Session,
}

impl HubClient<HttpTransport> {
    pub fn connect(server_url: Url) -> Result<Self, HubError> {
        Ok(Self::new(server_url, HttpTransport::new()?))
    }
}

impl<T: RpcTransport> HubClient<T> {
    pub fn new(server_url: Url, transport: T) -> Self {
        Self {
            transport,
            session: Session::new(server_url),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, HubError> {
        self.transport
            .call(&self.session.endpoint(), method, params)
            .await
    }

    // Session lifecycle

    /// Password-less login; the hub answers with session material that
    /// decorates every subsequent call.
    pub async fn login(&mut self) -> Result<(), HubError> {
        let result = self.call("login", vec![]).await.map_err(map_login_fault)?;
        let auth = parse_session_auth(&result)?;
        self.session.open(auth);
        Ok(())
    }

    /// Certificate-based login. The certificate must exist locally; the hub
    /// rejects expired or revoked ones with a discriminated fault.
    pub async fn ssl_login(&mut self, certificate: &Path) -> Result<(), HubError> {
        let present = tokio::fs::try_exists(certificate).await.map_err(|e| {
            HubError::client_with_source(
                format!("cannot inspect certificate {}", certificate.display()),
                e,
            )
        })?;
        if !present {
            return Err(HubError::Login {
                kind: LoginFaultKind::MissingCredentials,
            });
        }

        let result = self
            .call("sslLogin", vec![])
            .await
            .map_err(map_login_fault)?;
        let auth = parse_session_auth(&result)?;
        self.session.open(auth);
        Ok(())
    }

    /// Tell the hub the session is over, then revert to the bare URL.
    ///
    /// A no-op when already logged out, so cleanup paths can call it
    /// unconditionally.
    pub async fn logout(&mut self) -> Result<(), HubError> {
        if !self.session.is_logged_in() {
            return Ok(());
        }
        let result = self.call("logout", vec![]).await;
        self.session.close();
        result.map(|_| ())
    }

    // Build submission

    /// Submit the request, honoring the duplicate-build check and the
    /// shape-based method dispatch.
    ///
    /// Returns one task id per source entry for a flat request, exactly one
    /// for a chain build, in input order.
    pub async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<TaskId>, HubError> {
        // Scratch builds are throwaway; only real builds dedup against the
        // farm's ledger.
        if !request.scratch {
            for nvr in &request.nvrs {
                if let Some(existing) = self.get_build(nvr).await? {
                    if existing.is_complete() {
                        return Err(HubError::BuildAlreadyExists {
                            nvr: nvr.clone(),
                            task_id: existing.task_id,
                        });
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(HubError::Cancelled);
        }

        match &request.sources {
            SourceLocations::Single(locations) => {
                let mut tasks = Vec::with_capacity(locations.len());
                for location in locations {
                    if cancel.is_cancelled() {
                        return Err(HubError::Cancelled);
                    }
                    let mut params = vec![json!(location), json!(request.target)];
                    if request.scratch {
                        params.push(json!({ "scratch": true }));
                    }
                    let result = self.call("build", params).await?;
                    let task = parse_task_id(&result)?;
                    tracing::info!(%task, %location, target = %request.target, "build submitted");
                    tasks.push(task);
                }
                Ok(tasks)
            }
            SourceLocations::Chain(groups) => {
                let result = self
                    .call("chainBuild", vec![json!(groups), json!(request.target)])
                    .await?;
                let task = parse_task_id(&result)?;
                tracing::info!(%task, target = %request.target, "chain build submitted");
                Ok(vec![task])
            }
        }
    }

    /// Look up an existing build by NVR. `None` means the farm has never
    /// seen this NVR.
    pub async fn get_build(&self, nvr: &str) -> Result<Option<BuildInfo>, HubError> {
        let result = self.call("getBuild", vec![json!(nvr)]).await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| HubError::protocol(format!("malformed getBuild response: {e}")))
    }

    // Chunked upload

    /// Upload a local file to `remote_path` on the hub in sequential
    /// chunks.
    ///
    /// Every call carries the file's declared size and md5 so the server
    /// can validate the assembly after the final chunk. Offsets strictly
    /// increase; the protocol has no chunk identifiers and no resume — a
    /// rejected chunk fails the whole upload, which must restart at offset
    /// zero. Chunks already accepted before a cancellation stay orphaned at
    /// the remote path.
    pub async fn upload_file(
        &self,
        local: &Path,
        remote_path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), HubError> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HubError::client(format!("{} has no usable filename", local.display())))?
            .to_owned();

        let (md5sum, size) = digest_file(local)
            .await
            .map_err(|e| HubError::client_with_source(format!("cannot checksum {}", local.display()), e))?;

        let mut file = tokio::fs::File::open(local)
            .await
            .map_err(|e| HubError::client_with_source(format!("cannot open {}", local.display()), e))?;

        let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut offset = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(HubError::Cancelled);
            }

            let filled = read_chunk(&mut file, &mut buffer).await.map_err(|e| {
                HubError::client_with_source(format!("read of {} failed", local.display()), e)
            })?;
            if filled == 0 && offset > 0 {
                break;
            }

            let params = vec![
                json!(remote_path),
                json!(name.clone()),
                json!(size),
                json!(md5sum.to_string()),
                json!(offset),
                json!(BASE64.encode(&buffer[..filled])),
            ];
            let result = self.call("uploadFile", params).await?;
            if result.as_bool() != Some(true) {
                return Err(HubError::protocol(format!(
                    "hub rejected chunk of '{name}' at offset {offset}; restart the upload from offset 0"
                )));
            }

            tracing::debug!(%name, offset, chunk = filled, total = size, "chunk accepted");
            offset += filled as u64;
            if filled < UPLOAD_CHUNK_SIZE {
                break;
            }
        }

        if offset != size {
            return Err(HubError::protocol(format!(
                "'{name}' changed during upload: sent {offset} of {size} declared bytes"
            )));
        }

        Ok(())
    }

    // Catalog queries

    pub async fn get_repo(&self, tag: &str) -> Result<Option<RepoInfo>, HubError> {
        let result = self.call("getRepo", vec![json!(tag)]).await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| HubError::protocol(format!("malformed getRepo response: {e}")))
    }

    pub async fn list_build_targets(&self) -> Result<Vec<BuildTarget>, HubError> {
        let result = self.call("getBuildTargets", vec![]).await?;
        serde_json::from_value(result)
            .map_err(|e| HubError::protocol(format!("malformed getBuildTargets response: {e}")))
    }

    /// Distinct build-tag names, sorted descending for stable display.
    pub async fn list_build_tags(&self) -> Result<Vec<String>, HubError> {
        let targets = self.list_build_targets().await?;
        let tags: BTreeSet<String> = targets.into_iter().map(|t| t.build_tag_name).collect();
        Ok(tags.into_iter().rev().collect())
    }
}

/// Fill `buf` from the reader, tolerating short reads; a partial fill means
/// end of file.
async fn read_chunk<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn parse_session_auth(result: &Value) -> Result<SessionAuth, HubError> {
    let session_key = result
        .get("sessionKey")
        .or_else(|| result.get("session-key"))
        .and_then(Value::as_str)
        .ok_or_else(|| HubError::protocol("login response lacks a session key"))?
        .to_owned();
    let session_id = result
        .get("sessionID")
        .or_else(|| result.get("session-id"))
        .and_then(Value::as_i64)
        .ok_or_else(|| HubError::protocol("login response lacks a session id"))?;
    Ok(SessionAuth {
        session_key,
        session_id,
    })
}

/// Task ids arrive as a number or a numeric string; anything else is a
/// protocol violation.
fn parse_task_id(value: &Value) -> Result<TaskId, HubError> {
    match value {
        Value::Number(n) => n.as_i64().map(TaskId),
        Value::String(s) => s.parse::<i64>().ok().map(TaskId),
        _ => None,
    }
    .ok_or_else(|| HubError::protocol(format!("task id is not numeric: {value}")))
}

/// Faults raised while logging in are credential problems; discriminate
/// them so remediation messages differ.
fn map_login_fault(error: HubError) -> HubError {
    if let HubError::Fault { ref message, .. } = error {
        let lowered = message.to_lowercase();
        if lowered.contains("expired") {
            return HubError::Login {
                kind: LoginFaultKind::ExpiredCredentials,
            };
        }
        if lowered.contains("revoked") {
            return HubError::Login {
                kind: LoginFaultKind::RevokedCredentials,
            };
        }
    }
    error
}
