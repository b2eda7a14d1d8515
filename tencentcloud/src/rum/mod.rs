//! Instance status waits for RUM start/stop operations

use opwait::{fetch_fn, ClassifiedStatus, Context, Observation, Phase, PollConfig, PollError, Poller, StateSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::api::rum::RumInstance;
use crate::api::{ApiError, Client};

#[derive(Debug, Error)]
pub enum RumError {
    #[error("unknown instance operation {0:?}, expected start or stop")]
    UnknownOperation(String),

    #[error(transparent)]
    Wait(#[from] PollError<ApiError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RumOperation {
    Start,
    Stop,
}

impl RumOperation {
    /// Statuses the instance may report while the operation is applied,
    /// and the one it ends in
    pub fn states(self) -> StateSet {
        match self {
            RumOperation::Start => StateSet::new(["1", "4", "6"], ["2"]),
            RumOperation::Stop => StateSet::new(["2", "5"], ["6"]),
        }
    }
}

impl FromStr for RumOperation {
    type Err = RumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(RumOperation::Start),
            "stop" => Ok(RumOperation::Stop),
            other => Err(RumError::UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for RumOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RumOperation::Start => write!(f, "start"),
            RumOperation::Stop => write!(f, "stop"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RumObservation {
    pub instance: RumInstance,
    pub status: ClassifiedStatus,
}

impl Observation for RumObservation {
    fn phase(&self) -> Phase {
        self.status.phase
    }

    fn describe(&self) -> String {
        format!("instance status {}", self.status.label)
    }
}

#[derive(Clone)]
pub struct RumService {
    client: Client,
    poll: PollConfig,
}

impl RumService {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            poll: PollConfig::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poll = self.poll.with_interval(interval);
        self
    }

    /// Wait for a start or stop operation to settle
    pub async fn wait_instance_operation(
        &self,
        ctx: &Context,
        instance_id: &str,
        operate: &str,
        timeout: Duration,
    ) -> Result<RumInstance, RumError> {
        let operation: RumOperation = operate.parse()?;
        let states = operation.states();
        tracing::debug!(
            "[{}] waiting for rum instance {} to {}",
            ctx.log_id(),
            instance_id,
            operation
        );

        let client = self.client.clone();
        let fetcher = fetch_fn(move |id: &str| {
            let client = client.clone();
            let states = states.clone();
            let id = id.to_string();
            async move {
                let instance = client.rum().describe_taw_instance(&id).await?;
                Ok::<_, ApiError>(instance.map(|instance| RumObservation {
                    status: states.observe(instance.instance_status.to_string()),
                    instance,
                }))
            }
        });

        let observation = Poller::new("DescribeTawInstances", self.poll.with_timeout(timeout))
            .poll(ctx, instance_id, &fetcher)
            .await?;
        Ok(observation.instance)
    }
}
