//! Lifecycle management for the servers under test.
//!
//! Both the instructor sample solution and the student submission are
//! Node servers started with `node index.js` in their directory. A
//! launched server is held through a guard handle: `stop` is idempotent,
//! and dropping the handle kills the process so a panicking run cannot
//! leak servers into later phases.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::error::{Error, Result};

/// Interval between readiness probes.
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// A server process that is currently accepting requests.
#[async_trait]
pub trait RunningServer: Send {
    /// Stops the server. Safe to call more than once.
    async fn stop(&mut self) -> Result<()>;
}

/// Launches server implementations for a grading run.
#[async_trait]
pub trait ServerLifecycle: Send + Sync {
    /// The handle type for a launched server.
    type Handle: RunningServer;

    /// Starts the server rooted at `dir` and returns once it is ready to
    /// accept requests. `install_deps` runs `npm install` first.
    async fn launch(&self, dir: &Path, install_deps: bool) -> Result<Self::Handle>;
}

/// Launcher for Node servers.
pub struct NodeServerLauncher {
    /// Command used to start the server inside its directory.
    command: Vec<String>,
    /// Delay granted to servers with no readiness URL.
    settle_delay: Duration,
    /// Optional URL polled until it answers 200.
    readiness_url: Option<String>,
    /// How long to poll the readiness URL before giving up.
    readiness_timeout: Duration,
}

impl NodeServerLauncher {
    /// Creates a launcher that starts `node index.js` and then waits
    /// `settle_delay` before declaring the server ready.
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            command: vec!["node".to_string(), "index.js".to_string()],
            settle_delay,
            readiness_url: None,
            readiness_timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the command used to start the server.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Polls `url` until it answers 200 instead of sleeping a fixed
    /// delay. Only usable when the server's address is known up front.
    pub fn with_readiness_url(mut self, url: impl Into<String>) -> Self {
        self.readiness_url = Some(url.into());
        self
    }

    /// Overrides how long the readiness URL is polled before giving up.
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    async fn install_dependencies(&self, dir: &Path) -> Result<()> {
        tracing::info!(dir = %dir.display(), "installing server dependencies");
        let output = Command::new("npm")
            .current_dir(dir)
            .arg("install")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Server(format!("failed to run npm install: {}", e)))?;

        if !output.status.success() {
            // The server may still start without a fresh install.
            tracing::warn!(
                dir = %dir.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "npm install failed; launching anyway"
            );
        }
        Ok(())
    }

    async fn wait_ready(&self) -> Result<()> {
        let url = match &self.readiness_url {
            Some(url) => url,
            None => {
                tokio::time::sleep(self.settle_delay).await;
                return Ok(());
            }
        };

        let deadline = tokio::time::Instant::now() + self.readiness_timeout;
        loop {
            if probe(url).await {
                tracing::debug!(url = %url, "server answered readiness probe");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Server(format!(
                    "server did not become ready at {} within {:?}",
                    url, self.readiness_timeout
                )));
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }
}

/// One GET against the readiness URL; true on a 200.
async fn probe(url: &str) -> bool {
    let output = Command::new("curl")
        .args(["-s", "-o", "/dev/null", "-w", "%{http_code}", "--max-time", "5", url])
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim() == "200"
        }
        _ => false,
    }
}

#[async_trait]
impl ServerLifecycle for NodeServerLauncher {
    type Handle = NodeServerHandle;

    async fn launch(&self, dir: &Path, install_deps: bool) -> Result<Self::Handle> {
        if install_deps {
            self.install_dependencies(dir).await?;
        }

        let program = self
            .command
            .first()
            .ok_or_else(|| Error::Server("empty server command".to_string()))?;

        let child = Command::new(program)
            .args(&self.command[1..])
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Server(format!("failed to launch server in {}: {}", dir.display(), e))
            })?;

        tracing::info!(dir = %dir.display(), "launched server");

        let mut handle = NodeServerHandle {
            child,
            dir: dir.to_path_buf(),
            stopped: false,
        };
        if let Err(e) = self.wait_ready().await {
            let _ = handle.stop().await;
            return Err(e);
        }
        Ok(handle)
    }
}

/// Guard handle for a running server.
#[derive(Debug)]
pub struct NodeServerHandle {
    child: Child,
    dir: PathBuf,
    stopped: bool,
}

#[async_trait]
impl RunningServer for NodeServerHandle {
    async fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        // start_kill errors when the child already exited; wait() below
        // still reaps it either way.
        let _ = self.child.start_kill();
        self.child
            .wait()
            .await
            .map_err(|e| Error::Server(format!("failed to reap server: {}", e)))?;

        tracing::info!(dir = %self.dir.display(), "stopped server");
        Ok(())
    }
}

impl Drop for NodeServerHandle {
    fn drop(&mut self) {
        if !self.stopped {
            tracing::warn!(dir = %self.dir.display(), "server handle dropped while running; killing");
            let _ = self.child.start_kill();
        }
    }
}
