//! External process launcher: the declarative multi-process tool that brings
//! cluster nodes up and down (`docker-compose` by default).

#![allow(missing_docs)]

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::core::config::ClusterConfig;
use crate::core::errors::{Result, RfhError};

/// A lifecycle request sent to the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchAction {
    Up,
    Down,
    StopNode(String),
    StartNode(String),
}

impl LaunchAction {
    /// Launcher subcommand arguments for this action.
    #[must_use]
    pub fn args(&self) -> Vec<&str> {
        match self {
            Self::Up => vec!["up", "-d"],
            Self::Down => vec!["down"],
            Self::StopNode(id) => vec!["stop", id.as_str()],
            Self::StartNode(id) => vec!["start", id.as_str()],
        }
    }
}

impl fmt::Display for LaunchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("start cluster"),
            Self::Down => f.write_str("stop cluster"),
            Self::StopNode(id) => write!(f, "stop node {id}"),
            Self::StartNode(id) => write!(f, "start node {id}"),
        }
    }
}

/// Control surface over node processes. Accept/reject only: success means the
/// launcher accepted the request, not that the cluster converged.
pub trait Launcher: Send + Sync {
    fn execute(&self, action: &LaunchAction) -> Result<()>;
}

/// [`Launcher`] that shells out to a compose tool against one compose file.
#[derive(Debug, Clone)]
pub struct ComposeLauncher {
    program: String,
    leading_args: Vec<String>,
    compose_file: PathBuf,
}

impl ComposeLauncher {
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        let (program, leading) =
            config
                .compose_command
                .split_first()
                .ok_or_else(|| RfhError::InvalidConfig {
                    details: "cluster.compose_command must not be empty".to_string(),
                })?;
        Ok(Self {
            program: program.clone(),
            leading_args: leading.to_vec(),
            compose_file: config.compose_file.clone(),
        })
    }

    /// Full argument vector passed to the program.
    #[must_use]
    pub fn command_args(&self, action: &LaunchAction) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.push("-f".to_string());
        args.push(self.compose_file.to_string_lossy().into_owned());
        args.extend(action.args().into_iter().map(str::to_string));
        args
    }
}

impl Launcher for ComposeLauncher {
    fn execute(&self, action: &LaunchAction) -> Result<()> {
        let args = self.command_args(action);
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| RfhError::Launcher {
                action: action.to_string(),
                details: format!("failed to spawn {}: {e}", self.program),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RfhError::Launcher {
                action: action.to_string(),
                details: format!(
                    "{} {} failed (exit {}): {}",
                    self.program,
                    args.join(" "),
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(command: &[&str]) -> ComposeLauncher {
        let config = ClusterConfig {
            compose_command: command.iter().map(|s| (*s).to_string()).collect(),
            ..ClusterConfig::default()
        };
        ComposeLauncher::from_config(&config).expect("launcher")
    }

    #[test]
    fn compose_arguments_follow_action() {
        let l = launcher(&["docker", "compose"]);
        assert_eq!(
            l.command_args(&LaunchAction::StopNode("node2".to_string())),
            vec!["compose", "-f", "docker-compose.yml", "stop", "node2"]
        );
        assert_eq!(
            l.command_args(&LaunchAction::Up),
            vec!["compose", "-f", "docker-compose.yml", "up", "-d"]
        );
    }

    #[test]
    fn empty_command_rejected() {
        let config = ClusterConfig {
            compose_command: Vec::new(),
            ..ClusterConfig::default()
        };
        assert!(ComposeLauncher::from_config(&config).is_err());
    }

    #[test]
    fn missing_program_reports_launcher_error() {
        let l = launcher(&["rfh-definitely-not-a-real-program"]);
        let err = l.execute(&LaunchAction::Down).expect_err("spawn fails");
        assert_eq!(err.code(), "RFH-2004");
        assert!(err.to_string().contains("stop cluster"));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_reports_launcher_error() {
        let l = launcher(&["false"]);
        let err = l.execute(&LaunchAction::Up).expect_err("false exits 1");
        assert!(err.to_string().contains("exit 1"));
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_is_accepted() {
        let l = launcher(&["true"]);
        assert!(l.execute(&LaunchAction::StartNode("node1".to_string())).is_ok());
    }
}
