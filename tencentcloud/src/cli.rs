//! Command line of the `tencentcloud-wait` binary

use clap::{Parser, Subcommand};
use opwait::{Context, PollError};
use std::time::Duration;
use thiserror::Error;

use crate::api::{ApiError, Client};
use crate::config::READ_RETRY_TIMEOUT;
use crate::crs::{
    InstanceStatus, RedisService, DEAL_WAIT_TIMEOUT, ISOLATION_WAIT_TIMEOUT, UPDATE_WAIT_TIMEOUT,
};
use crate::rum::{RumError, RumService};

#[derive(Parser, Debug)]
#[command(
    name = "tencentcloud-wait",
    version,
    about = "Wait for an asynchronous Tencent Cloud operation to finish"
)]
pub struct WaitCli {
    #[command(subcommand)]
    pub command: WaitCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum WaitCommand {
    /// Wait for a CRS task to succeed
    Task {
        task_id: i64,
        #[arg(value_name = "TIMEOUT_SECS")]
        timeout: Option<u64>,
    },
    /// Wait for a CRS deal to be delivered and print the new instance ID
    Deal {
        deal_id: String,
        #[arg(value_name = "TIMEOUT_SECS")]
        timeout: Option<u64>,
    },
    /// Wait for a Redis instance to come online
    Online {
        instance_id: String,
        #[arg(value_name = "TIMEOUT_SECS")]
        timeout: Option<u64>,
    },
    /// Wait for a Redis change to start and settle
    Update {
        instance_id: String,
        #[arg(value_name = "TIMEOUT_SECS")]
        timeout: Option<u64>,
    },
    /// Wait for a Redis instance to be isolated or removed
    Isolated {
        instance_id: String,
        #[arg(value_name = "TIMEOUT_SECS")]
        timeout: Option<u64>,
    },
    /// Wait for a RUM instance to be running
    RumStart {
        instance_id: String,
        #[arg(value_name = "TIMEOUT_SECS")]
        timeout: Option<u64>,
    },
    /// Wait for a RUM instance to be stopped
    RumStop {
        instance_id: String,
        #[arg(value_name = "TIMEOUT_SECS")]
        timeout: Option<u64>,
    },
}

impl WaitCommand {
    /// The timeout given on the command line, or the default for this wait
    pub fn timeout(&self) -> Duration {
        let (explicit, default) = match self {
            WaitCommand::Task { timeout, .. } => (timeout, READ_RETRY_TIMEOUT),
            WaitCommand::Deal { timeout, .. } => (timeout, DEAL_WAIT_TIMEOUT),
            WaitCommand::Online { timeout, .. } => (timeout, READ_RETRY_TIMEOUT),
            WaitCommand::Update { timeout, .. } => (timeout, UPDATE_WAIT_TIMEOUT),
            WaitCommand::Isolated { timeout, .. } => (timeout, ISOLATION_WAIT_TIMEOUT),
            WaitCommand::RumStart { timeout, .. } | WaitCommand::RumStop { timeout, .. } => {
                (timeout, READ_RETRY_TIMEOUT)
            }
        };
        explicit.map(Duration::from_secs).unwrap_or(default)
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Wait(#[from] PollError<ApiError>),

    #[error(transparent)]
    Rum(#[from] RumError),
}

impl CommandError {
    /// Process exit code: 2 when the outcome is unknown, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        let timed_out = match self {
            CommandError::Wait(e) | CommandError::Rum(RumError::Wait(e)) => {
                e.is_timeout() || matches!(e, PollError::Cancelled { .. })
            }
            CommandError::Rum(_) => false,
        };
        if timed_out {
            2
        } else {
            1
        }
    }
}

/// Run one wait and return the line to print on success
pub async fn run(ctx: &Context, client: Client, command: &WaitCommand) -> Result<String, CommandError> {
    let timeout = command.timeout();
    let redis = RedisService::new(client.clone());

    let output = match command {
        WaitCommand::Task { task_id, .. } => {
            redis.wait_for_task(ctx, *task_id, timeout).await?;
            format!("task {} succeeded", task_id)
        }
        WaitCommand::Deal { deal_id, .. } => redis.wait_for_deal(ctx, deal_id, timeout).await?,
        WaitCommand::Online { instance_id, .. } => {
            let instance = redis.wait_until_online(ctx, instance_id, timeout).await?;
            format!("{} {}", instance.instance_id, InstanceStatus::from(instance.status))
        }
        WaitCommand::Update { instance_id, .. } => {
            let instance = redis.wait_for_update(ctx, instance_id, timeout).await?;
            format!("{} {}", instance.instance_id, InstanceStatus::from(instance.status))
        }
        WaitCommand::Isolated { instance_id, .. } => {
            redis.wait_for_isolation(ctx, instance_id, timeout).await?;
            format!("{} isolated", instance_id)
        }
        WaitCommand::RumStart { instance_id, .. } | WaitCommand::RumStop { instance_id, .. } => {
            let operate = if matches!(command, WaitCommand::RumStart { .. }) {
                "start"
            } else {
                "stop"
            };
            let instance = RumService::new(client)
                .wait_instance_operation(ctx, instance_id, operate, timeout)
                .await?;
            format!("{} status {}", instance.instance_id, instance.instance_status)
        }
    };

    Ok(output)
}
