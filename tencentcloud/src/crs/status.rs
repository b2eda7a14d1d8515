//! CRS status codes and how the waiters classify them

use opwait::{OperationStatus, Phase};
use std::fmt;

/// Status reported by `DescribeTaskInfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Preparing,
    Running,
    Succeed,
    Failed,
    Error,
    Unknown(String),
}

impl From<&str> for TaskStatus {
    fn from(value: &str) -> Self {
        match value {
            "preparing" => TaskStatus::Preparing,
            "running" => TaskStatus::Running,
            "succeed" => TaskStatus::Succeed,
            "failed" => TaskStatus::Failed,
            "error" => TaskStatus::Error,
            other => TaskStatus::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Preparing => write!(f, "preparing"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeed => write!(f, "succeed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Error => write!(f, "error"),
            TaskStatus::Unknown(other) => write!(f, "unknown status {:?}", other),
        }
    }
}

impl OperationStatus for TaskStatus {
    fn phase(&self) -> Phase {
        match self {
            TaskStatus::Preparing | TaskStatus::Running => Phase::InProgress,
            TaskStatus::Succeed => Phase::Succeeded,
            TaskStatus::Failed | TaskStatus::Error | TaskStatus::Unknown(_) => Phase::Failed,
        }
    }
}

/// Instance status reported by `DescribeInstances`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Init,
    Processing,
    Online,
    Isolated,
    ToDelete,
    Other(i64),
}

impl InstanceStatus {
    pub fn code(self) -> i64 {
        match self {
            InstanceStatus::Init => 0,
            InstanceStatus::Processing => 1,
            InstanceStatus::Online => 2,
            InstanceStatus::Isolated => -2,
            InstanceStatus::ToDelete => -3,
            InstanceStatus::Other(code) => code,
        }
    }

    /// Init or processing: a change is still being applied
    pub fn is_transitional(self) -> bool {
        matches!(self, InstanceStatus::Init | InstanceStatus::Processing)
    }

    /// Isolated, awaiting deletion or anything below
    pub fn is_isolated(self) -> bool {
        self.code() <= InstanceStatus::Isolated.code()
    }
}

impl From<i64> for InstanceStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => InstanceStatus::Init,
            1 => InstanceStatus::Processing,
            2 => InstanceStatus::Online,
            -2 => InstanceStatus::Isolated,
            -3 => InstanceStatus::ToDelete,
            other => InstanceStatus::Other(other),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceStatus::Init => "init",
            InstanceStatus::Processing => "processing",
            InstanceStatus::Online => "online",
            InstanceStatus::Isolated => "isolated",
            InstanceStatus::ToDelete => "to-delete",
            InstanceStatus::Other(_) => "unknown",
        };
        write!(f, "{} ({})", self.code(), name)
    }
}

/// Order status reported by `DescribeInstanceDealDetail`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealStatus {
    /// Unpaid, paid or being delivered
    Pending(i64),
    Delivered,
    Failed(i64),
}

impl DealStatus {
    pub const DELIVERED: i64 = 4;
}

impl From<i64> for DealStatus {
    fn from(code: i64) -> Self {
        match code {
            Self::DELIVERED => DealStatus::Delivered,
            code if code < Self::DELIVERED => DealStatus::Pending(code),
            code => DealStatus::Failed(code),
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DealStatus::Pending(code) => write!(f, "{} (pending)", code),
            DealStatus::Delivered => write!(f, "{} (delivered)", Self::DELIVERED),
            DealStatus::Failed(code) => write!(f, "{} (delivery failed)", code),
        }
    }
}

impl OperationStatus for DealStatus {
    fn phase(&self) -> Phase {
        match self {
            DealStatus::Pending(_) => Phase::InProgress,
            DealStatus::Delivered => Phase::Succeeded,
            DealStatus::Failed(_) => Phase::Failed,
        }
    }
}
