//! Client that shells out to the `bw` CLI.
//!
//! JSON commands run with `--response`, so their stdout carries the same
//! envelope `bw serve` returns. The session key travels in `BW_SESSION` and
//! secrets in environment variables, never on the command line.

use super::{ObjectClient, TransportCapabilities, require_id};
use crate::envelope::{decode, decode_ack, decode_list, decode_status};
use crate::error::BwError;
use crate::filter::{ListFilter, append_args};
use crate::models::{MessageResult, Object, ObjectType, Status};
use crate::retry::{RetryPolicy, once};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

const TRANSPORT: &str = "cli";
const DEFAULT_BINARY: &str = "bw";

/// Environment variable to explicitly set the path to the `bw` binary.
pub const CLI_PATH_ENV: &str = "BW_CLI_PATH";
pub const SESSION_ENV: &str = "BW_SESSION";

const PASSWORD_ENV: &str = "BW_PASSWORD";
const CLIENT_ID_ENV: &str = "BW_CLIENTID";
const CLIENT_SECRET_ENV: &str = "BW_CLIENTSECRET";

/// Captured result of one process run
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs the CLI with the given arguments and extra environment.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<CommandOutput, BwError>;
}

/// Runs the real `bw` binary
#[derive(Debug, Clone)]
pub struct BwProcess {
    path: PathBuf,
}

impl BwProcess {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checks `BW_CLI_PATH` first, then relies on `bw` being on PATH.
    pub fn from_env() -> Self {
        let path = std::env::var(CLI_PATH_ENV).unwrap_or_else(|_| DEFAULT_BINARY.to_string());
        Self::new(path)
    }
}

#[async_trait]
impl CommandRunner for BwProcess {
    async fn run(
        &self,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<CommandOutput, BwError> {
        let output = tokio::process::Command::new(&self.path)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // dropping the future on cancellation must not leave the process behind
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BwError::Config(format!(
                    "bw CLI not found at {} (install it or set {CLI_PATH_ENV})",
                    self.path.display()
                )),
                _ => BwError::Transport(format!("Failed to run bw: {e}")),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

pub struct CliClientBuilder {
    cli_path: Option<PathBuf>,
    session_key: Option<String>,
    retry_policy: RetryPolicy,
    cancellation: Option<CancellationToken>,
    runner: Option<Arc<dyn CommandRunner>>,
}

impl Default for CliClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CliClientBuilder {
    pub fn new() -> Self {
        Self {
            cli_path: None,
            session_key: None,
            retry_policy: RetryPolicy::default(),
            cancellation: None,
            runner: None,
        }
    }

    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = Some(path.into());
        self
    }

    pub fn session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Replace process execution, e.g. with a scripted runner in tests
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn build(self) -> CliClient {
        let runner = match (self.runner, self.cli_path) {
            (Some(runner), _) => runner,
            (None, Some(path)) => Arc::new(BwProcess::new(path)) as Arc<dyn CommandRunner>,
            (None, None) => Arc::new(BwProcess::from_env()),
        };

        let session_key = self
            .session_key
            .or_else(|| std::env::var(SESSION_ENV).ok())
            .unwrap_or_default();

        CliClient {
            runner,
            session_key: RwLock::new(session_key),
            retry: self.retry_policy,
            cancel: self.cancellation.unwrap_or_default(),
        }
    }
}

pub struct CliClient {
    runner: Arc<dyn CommandRunner>,
    session_key: RwLock<String>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl CliClient {
    pub fn builder() -> CliClientBuilder {
        CliClientBuilder::new()
    }

    pub fn from_env() -> Self {
        CliClientBuilder::new().build()
    }

    fn session_env(&self, mut env: Vec<(String, String)>) -> Vec<(String, String)> {
        let key = self.session_key();
        if !key.is_empty() {
            env.push((SESSION_ENV.to_string(), key));
        }
        env
    }

    /// Run a JSON command and return its envelope bytes.
    async fn exec(
        &self,
        mut args: Vec<String>,
        env: Vec<(String, String)>,
    ) -> Result<Vec<u8>, BwError> {
        tracing::debug!(command = ?args.iter().take(2).collect::<Vec<_>>(), "Running bw");
        args.push("--response".to_string());
        args.push("--nointeraction".to_string());

        let output = self.runner.run(&args, &self.session_env(env)).await?;
        if output.stdout.iter().all(u8::is_ascii_whitespace) && !output.success {
            return Err(BwError::backend(first_line(&output.stderr)));
        }
        Ok(output.stdout)
    }

    /// Run a command whose stdout is raw content rather than an envelope.
    async fn exec_raw(&self, args: Vec<String>) -> Result<Vec<u8>, BwError> {
        tracing::debug!(command = ?args.iter().take(2).collect::<Vec<_>>(), "Running bw");
        let output = self.runner.run(&args, &self.session_env(Vec::new())).await?;
        if !output.success {
            return Err(BwError::backend(first_line(&output.stderr)));
        }
        Ok(output.stdout)
    }

    fn store_session(&self, result: MessageResult) {
        if let Some(key) = result.raw.filter(|k| !k.is_empty()) {
            self.set_session_key(&key);
        }
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn encode(object: &Object) -> Result<String, BwError> {
    let json = serde_json::to_vec(object)?;
    Ok(STANDARD.encode(json))
}

/// First non-empty stderr line; full stderr may contain local paths
fn first_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("bw command failed")
        .to_string()
}

#[async_trait]
impl ObjectClient for CliClient {
    fn transport(&self) -> &'static str {
        TRANSPORT
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            delete_reports_not_found: true,
            distinguishes_missing_attachment: false,
        }
    }

    async fn create_object(&self, object: &Object) -> Result<Object, BwError> {
        tracing::debug!(object_type = %object.object, "Creating object");
        let payload = encode(object)?;

        self.retry
            .run("create_object", &self.cancel, || async {
                let body = self
                    .exec(args(["create", object.object.as_str(), payload.as_str()]), Vec::new())
                    .await?;
                decode(&body)
            })
            .await
    }

    async fn edit_object(&self, object: &Object) -> Result<Object, BwError> {
        tracing::debug!(object_type = %object.object, object_id = %object.id, "Editing object");
        let id = require_id(object)?;
        let payload = encode(object)?;

        self.retry
            .run("edit_object", &self.cancel, || async {
                let body = self
                    .exec(args(["edit", object.object.as_str(), id, payload.as_str()]), Vec::new())
                    .await?;
                decode(&body).map_err(BwError::recognize_not_found)
            })
            .await
    }

    async fn get_object(&self, object: &Object) -> Result<Object, BwError> {
        tracing::debug!(object_type = %object.object, object_id = %object.id, "Getting object");
        let id = require_id(object)?;

        self.retry
            .run("get_object", &self.cancel, || async {
                let body = self
                    .exec(args(["get", object.object.as_str(), id]), Vec::new())
                    .await?;
                decode(&body).map_err(BwError::recognize_not_found)
            })
            .await
    }

    async fn delete_object(&self, object: &Object) -> Result<(), BwError> {
        tracing::debug!(object_type = %object.object, object_id = %object.id, "Deleting object");
        let id = require_id(object)?;

        once(&self.cancel, async {
            let body = self
                .exec(args(["delete", object.object.as_str(), id]), Vec::new())
                .await?;
            decode_ack(&body).map_err(BwError::recognize_not_found)
        })
        .await
    }

    async fn list_objects(
        &self,
        object_type: ObjectType,
        filters: &[ListFilter],
    ) -> Result<Vec<Object>, BwError> {
        tracing::debug!(object_type = %object_type, filters = filters.len(), "Listing objects");
        let mut command = args(["list", object_type.plural()]);
        append_args(filters, &mut command);

        self.retry
            .run("list_objects", &self.cancel, || async {
                let body = self.exec(command.clone(), Vec::new()).await?;
                decode_list(&body)
            })
            .await
    }

    async fn create_attachment(
        &self,
        item_id: &str,
        file_path: &Path,
    ) -> Result<Object, BwError> {
        tracing::debug!(item_id, "Creating attachment");
        // fail on a missing file before involving the CLI
        tokio::fs::metadata(file_path).await?;
        let file = file_path.to_string_lossy().into_owned();

        self.retry
            .run("create_attachment", &self.cancel, || async {
                let body = self
                    .exec(
                        args([
                            "create",
                            "attachment",
                            "--file",
                            file.as_str(),
                            "--itemid",
                            item_id,
                        ]),
                        Vec::new(),
                    )
                    .await?;
                decode(&body)
            })
            .await
    }

    async fn get_attachment(
        &self,
        item_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, BwError> {
        tracing::debug!(item_id, attachment_id, "Getting attachment");

        self.retry
            .run("get_attachment", &self.cancel, || {
                self.exec_raw(args([
                    "get",
                    "attachment",
                    attachment_id,
                    "--itemid",
                    item_id,
                    "--raw",
                ]))
            })
            .await
    }

    async fn delete_attachment(&self, item_id: &str, attachment_id: &str) -> Result<(), BwError> {
        tracing::debug!(item_id, attachment_id, "Deleting attachment");

        once(&self.cancel, async {
            let body = self
                .exec(
                    args(["delete", "attachment", attachment_id, "--itemid", item_id]),
                    Vec::new(),
                )
                .await?;
            decode_ack(&body)
        })
        .await
    }

    async fn unlock(&self, password: &str) -> Result<(), BwError> {
        tracing::debug!("Unlocking vault");
        let env = vec![(PASSWORD_ENV.to_string(), password.to_string())];

        let result = once(&self.cancel, async {
            let body = self
                .exec(args(["unlock", "--passwordenv", PASSWORD_ENV]), env)
                .await?;
            decode::<MessageResult>(&body)
        })
        .await?;

        self.store_session(result);
        Ok(())
    }

    async fn login_with_password(&self, username: &str, password: &str) -> Result<(), BwError> {
        tracing::debug!("Logging in with password");
        let env = vec![(PASSWORD_ENV.to_string(), password.to_string())];

        let result = once(&self.cancel, async {
            let body = self
                .exec(args(["login", username, "--passwordenv", PASSWORD_ENV]), env)
                .await?;
            decode::<MessageResult>(&body)
        })
        .await?;

        self.store_session(result);
        Ok(())
    }

    async fn login_with_api_key(
        &self,
        password: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<(), BwError> {
        tracing::debug!("Logging in with API key");
        let env = vec![
            (CLIENT_ID_ENV.to_string(), client_id.to_string()),
            (CLIENT_SECRET_ENV.to_string(), client_secret.to_string()),
        ];

        once(&self.cancel, async {
            let body = self.exec(args(["login", "--apikey"]), env).await?;
            decode::<MessageResult>(&body).map(|_| ())
        })
        .await?;

        // API key login leaves the vault locked
        self.unlock(password).await
    }

    async fn logout(&self) -> Result<(), BwError> {
        tracing::debug!("Logging out");

        once(&self.cancel, async {
            let body = self.exec(args(["logout"]), Vec::new()).await?;
            decode_ack(&body)
        })
        .await?;

        self.set_session_key("");
        Ok(())
    }

    async fn set_server(&self, url: &str) -> Result<(), BwError> {
        tracing::debug!(server = url, "Setting server");

        once(&self.cancel, async {
            let body = self.exec(args(["config", "server", url]), Vec::new()).await?;
            decode_ack(&body)
        })
        .await
    }

    async fn sync(&self) -> Result<(), BwError> {
        tracing::debug!("Syncing vault");

        once(&self.cancel, async {
            let body = self.exec(args(["sync"]), Vec::new()).await?;
            decode_ack(&body)
        })
        .await
    }

    async fn status(&self) -> Result<Status, BwError> {
        tracing::debug!("Getting status");

        self.retry
            .run("status", &self.cancel, || async {
                let body = self.exec(args(["status"]), Vec::new()).await?;
                decode_status(&body)
            })
            .await
    }

    fn session_key(&self) -> String {
        match self.session_key.read() {
            Ok(key) => key.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_session_key(&self, key: &str) {
        let mut guard = match self.session_key.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = key.to_string();
    }
}
