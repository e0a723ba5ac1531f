//! STDIO transport for MCP servers
//!
//! Handles connecting to MCP servers that run as child processes
//! communicating over stdin/stdout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

#[cfg(windows)]
#[allow(unused_imports)] // Trait is used via method call in closure
use std::os::windows::process::CommandExt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mcpconn_core::TransportType;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::ServiceExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{finish_handshake, Transport};
use crate::connection::{McpClient, McpClientHandler};
use crate::error::ConnectionError;

/// STDIO transport for child process MCP servers
pub struct StdioTransport {
    server_name: String,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    handler: McpClientHandler,
    connect_timeout: Duration,
}

impl StdioTransport {
    pub fn new(
        server_name: String,
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        cwd: Option<PathBuf>,
        handler: McpClientHandler,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            server_name,
            command,
            args,
            env,
            cwd,
            handler,
            connect_timeout,
        }
    }

    /// Split a command string that may carry its own arguments.
    ///
    /// - "docker run -i --rm image" → ("docker", ["run", "-i", "--rm", "image"])
    /// - "node" with args ["server.js"] → ("node", ["server.js"])
    ///
    /// Separate args win: the command is then taken as the bare executable.
    fn parse_command(command: &str, args: &[String]) -> Result<(String, Vec<String>)> {
        if !args.is_empty() || !command.trim().contains(' ') {
            return Ok((command.trim().to_string(), args.to_vec()));
        }

        let mut parts = shell_words::split(command)
            .context("Failed to parse command string - check for unmatched quotes")?;
        if parts.is_empty() {
            return Err(anyhow::anyhow!("Empty command after parsing"));
        }
        let executable = parts.remove(0);
        Ok((executable, parts))
    }
}

/// Platform-specific child process isolation.
///
/// Windows: suppress the console window a GUI-subsystem parent would
/// otherwise allocate for each console child.
///
/// Unix: put the child in its own process group so terminal signals sent to
/// the parent (SIGINT, SIGTSTP) are not delivered to MCP servers.
pub fn configure_child_process_platform(cmd: &mut Command) {
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> Result<McpClient, ConnectionError> {
        let (executable, args) = Self::parse_command(&self.command, &self.args)
            .map_err(|e| ConnectionError::invalid_config(&self.server_name, format!("{:#}", e)))?;

        info!(
            server_name = %self.server_name,
            command = %executable,
            "[StdioTransport] Connecting to STDIO server"
        );

        // Validate command exists
        let command_path = which::which(&executable)
            .or_else(|_| which::which(format!("{}.exe", &executable)))
            .map_err(|_| {
                error!(
                    server_name = %self.server_name,
                    command = %executable,
                    "[StdioTransport] Command not found"
                );
                ConnectionError::CommandNotFound {
                    server: self.server_name.clone(),
                    command: executable.clone(),
                }
            })?;

        debug!(
            server_name = %self.server_name,
            path = ?command_path,
            "[StdioTransport] Found command"
        );

        let env = self.env.clone();
        let cwd = self.cwd.clone();
        let transport = TokioChildProcess::new(Command::new(&command_path).configure(move |cmd| {
            cmd.args(&args)
                .envs(&env)
                .stderr(Stdio::null())
                .kill_on_drop(true);
            if let Some(dir) = &cwd {
                cmd.current_dir(dir);
            }
            configure_child_process_platform(cmd);
        }))
        .map_err(|e| {
            error!(server_name = %self.server_name, error = %e, "[StdioTransport] Failed to spawn process");
            ConnectionError::Spawn {
                server: self.server_name.clone(),
                source: e,
            }
        })?;

        let connect_future = self.handler.clone().serve(transport);
        let outcome = tokio::time::timeout(self.connect_timeout, connect_future).await;
        let client = finish_handshake(&self.server_name, self.connect_timeout, outcome)?;

        info!(server_name = %self.server_name, "[StdioTransport] STDIO server connected");
        Ok(client)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn description(&self) -> String {
        format!("stdio:{}", self.command)
    }
}
