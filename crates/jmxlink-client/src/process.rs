//! Bridge child process.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::Join;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::client::JmxClient;
use crate::error::{ClientError, ClientResult};

/// Environment variable naming the bridge executable.
pub const BRIDGE_EXEC_ENV: &str = "JMXLINK_EXEC";

/// Executable used when [`BRIDGE_EXEC_ENV`] is unset.
pub const DEFAULT_BRIDGE_EXEC: &str = "jmxlink";

/// How long to wait for the first ping reply.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the process to exit after `disconnect`.
pub const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Stream type of a spawned bridge
pub type BridgeIo = Join<ChildStdout, ChildStdin>;

/// A spawned bridge process and the client talking to it.
///
/// The child's stderr is inherited so its logs land next to the caller's.
/// Dropping the value kills the child.
#[derive(Debug)]
pub struct BridgeProcess {
    child: Child,
    client: JmxClient<BridgeIo>,
}

impl BridgeProcess {
    /// Spawn the executable named by `JMXLINK_EXEC`, or `jmxlink` from `PATH`.
    ///
    /// # Errors
    ///
    /// See [`BridgeProcess::spawn`].
    pub async fn spawn_default() -> ClientResult<Self> {
        let exec = std::env::var(BRIDGE_EXEC_ENV).unwrap_or_else(|_| DEFAULT_BRIDGE_EXEC.to_string());
        Self::spawn(exec, std::iter::empty::<&str>()).await
    }

    /// Spawn `program` and wait until it answers a ping.
    ///
    /// # Errors
    ///
    /// [`ClientError::Process`] when the process cannot be started or does
    /// not answer within [`DEFAULT_PING_TIMEOUT`].
    pub async fn spawn<P, I, S>(program: P, args: I) -> ClientResult<Self>
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ClientError::Process(format!("failed to start {}: {e}", program.to_string_lossy()))
            })?;

        let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
            return Err(ClientError::Process(
                "bridge stdio pipes unavailable".to_string(),
            ));
        };

        let mut client = JmxClient::new(tokio::io::join(stdout, stdin));
        client.set_response_timeout(Some(DEFAULT_PING_TIMEOUT));
        let ping = client.ping().await;
        client.set_response_timeout(None);

        if let Err(e) = ping {
            let _ = child.start_kill();
            return Err(ClientError::Process(format!(
                "could not establish communication with bridge process: {e}"
            )));
        }

        info!(pid = child.id(), "bridge process started");
        Ok(Self { child, client })
    }

    /// The client bound to the bridge's stdio.
    pub fn client(&mut self) -> &mut JmxClient<BridgeIo> {
        &mut self.client
    }

    /// OS process id, while running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Send `disconnect`, then wait for the process to exit.
    ///
    /// A process still running after [`DEFAULT_EXIT_TIMEOUT`] is killed.
    ///
    /// # Errors
    ///
    /// The `disconnect` error if there was one, otherwise a process error when
    /// the bridge had to be killed.
    pub async fn close(mut self) -> ClientResult<ExitStatus> {
        let disconnect = if self.client.is_usable() {
            self.client.disconnect().await
        } else {
            Ok(())
        };
        if let Err(e) = &disconnect {
            debug!(error = %e, "disconnect before exit failed");
        }

        // Closing stdin lets a bridge that ignored `disconnect` hit EOF.
        drop(self.client);

        let status = match tokio::time::timeout(DEFAULT_EXIT_TIMEOUT, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("bridge process did not exit in time, killing it");
                self.child.kill().await?;
                return Err(ClientError::Process(format!(
                    "timeout exceeded while waiting for bridge process to exit ({DEFAULT_EXIT_TIMEOUT:?})"
                )));
            }
        };

        disconnect.map(|()| status)
    }
}
