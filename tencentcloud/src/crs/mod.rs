//! Completion waiters for CRS (Redis) operations

pub mod replicas;
pub mod status;

use async_trait::async_trait;
use opwait::{
    Backoff, Context, Observation, Phase, PollConfig, PollError, Poller, StatusFetcher,
    StatusSnapshot,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::api::crs::{ModifyInstanceAvailabilityZonesRequest, RedisInstance, RedisNodeInfo, UpgradeInstanceRequest};
use crate::api::{retry_error, ApiError, Client};
use crate::config::{READ_RETRY_TIMEOUT, WRITE_RETRY_TIMEOUT};

pub use replicas::{plan_replica_changes, PlanError, ReplicaPlan};
pub use status::{DealStatus, InstanceStatus, TaskStatus};

/// Budget for a shard or replica change to settle
pub const UPDATE_WAIT_TIMEOUT: Duration = Duration::from_secs(20 * 3 * 60);

/// Budget for an instance to be isolated after a destroy call
pub const ISOLATION_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 3 * 60);

/// Budget for a purchase deal to be delivered
pub const DEAL_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 3 * 60);

pub type WaitResult<T> = Result<T, PollError<ApiError>>;

const UPGRADE_RETRY_CODES: &[&str] = &["FailedOperation.Unknown", "FailedOperation.SystemError"];

/// When a single-AZ to multi-AZ switch takes effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SwitchOption {
    MaintenanceWindow,
    #[default]
    Immediately,
}

impl SwitchOption {
    pub fn code(self) -> i64 {
        match self {
            SwitchOption::MaintenanceWindow => 1,
            SwitchOption::Immediately => 2,
        }
    }
}

#[derive(Debug, Error)]
pub enum RedisError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Wait(#[from] PollError<ApiError>),

    #[error("instance {instance_id} does not report its {field}")]
    MissingField {
        instance_id: String,
        field: &'static str,
    },
}

/// One `DescribeInstances` record and the phase a waiter assigned to it
#[derive(Debug, Clone)]
pub struct InstanceObservation {
    pub instance: RedisInstance,
    phase: Phase,
    note: Option<&'static str>,
}

impl InstanceObservation {
    fn new(instance: RedisInstance, phase: Phase) -> Self {
        Self {
            instance,
            phase,
            note: None,
        }
    }

    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::from(self.instance.status)
    }
}

impl Observation for InstanceObservation {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn describe(&self) -> String {
        match self.note {
            Some(note) => format!("status {}, {}", self.status(), note),
            None => format!("status {}", self.status()),
        }
    }
}

/// A deal lookup; more than one record for one deal ID is a failure
#[derive(Debug, Clone)]
pub struct DealObservation {
    pub status: DealStatus,
    pub instance_ids: Vec<String>,
    records: usize,
}

impl DealObservation {
    /// The delivered instance, when exactly one was delivered
    pub fn instance_id(&self) -> Option<&str> {
        match (self.status, self.instance_ids.as_slice()) {
            (DealStatus::Delivered, [id]) => Some(id),
            _ => None,
        }
    }
}

impl Observation for DealObservation {
    fn phase(&self) -> Phase {
        if self.records != 1 {
            return Phase::Failed;
        }
        match self.status {
            DealStatus::Delivered if self.instance_ids.len() != 1 => Phase::Failed,
            status => opwait::OperationStatus::phase(&status),
        }
    }

    fn describe(&self) -> String {
        if self.records != 1 {
            format!("{} deal records returned", self.records)
        } else if matches!(self.status, DealStatus::Delivered) && self.instance_ids.len() != 1 {
            format!("{} with {} instance ids", self.status, self.instance_ids.len())
        } else {
            self.status.to_string()
        }
    }
}

/// Instance state while waiting for isolation; a vanished instance counts
#[derive(Debug, Clone)]
pub enum IsolationObservation {
    Gone,
    Present(InstanceStatus),
    /// More than one record came back for one instance ID
    Ambiguous(usize),
}

impl Observation for IsolationObservation {
    fn phase(&self) -> Phase {
        match self {
            IsolationObservation::Gone => Phase::Succeeded,
            IsolationObservation::Present(status) if status.is_isolated() => Phase::Succeeded,
            IsolationObservation::Present(_) => Phase::InProgress,
            IsolationObservation::Ambiguous(_) => Phase::Failed,
        }
    }

    fn describe(&self) -> String {
        match self {
            IsolationObservation::Gone => "gone".to_string(),
            IsolationObservation::Present(status) => format!("status {}", status),
            IsolationObservation::Ambiguous(records) => format!("{} instance records returned", records),
        }
    }
}

struct TaskFetcher<'a> {
    client: &'a Client,
}

#[async_trait]
impl<'a> StatusFetcher<i64> for TaskFetcher<'a> {
    type Output = StatusSnapshot<TaskStatus>;
    type Error = ApiError;

    async fn fetch(&self, task_id: &i64) -> Result<Option<Self::Output>, ApiError> {
        let info = self.client.redis().describe_task_info(*task_id).await?;
        let snapshot = StatusSnapshot::new(TaskStatus::from(info.status.as_str()));
        Ok(Some(match info.task_message.filter(|m| !m.is_empty()) {
            Some(message) => snapshot.with_detail(message),
            None => snapshot,
        }))
    }
}

struct DealFetcher<'a> {
    client: &'a Client,
}

#[async_trait]
impl<'a> StatusFetcher<str> for DealFetcher<'a> {
    type Output = DealObservation;
    type Error = ApiError;

    async fn fetch(&self, deal_id: &str) -> Result<Option<DealObservation>, ApiError> {
        let deals = self.client.redis().describe_instance_deal_detail(deal_id).await?;
        let records = deals.len();
        Ok(deals.into_iter().next().map(|deal| DealObservation {
            status: DealStatus::from(deal.status),
            instance_ids: deal.instance_ids,
            records,
        }))
    }
}

/// How a fetched instance status maps to a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceWait {
    Online,
    /// Online before anything else has been seen means the change has not started
    Update,
}

struct InstanceFetcher<'a> {
    client: &'a Client,
    wait: InstanceWait,
    started: AtomicBool,
}

impl<'a> InstanceFetcher<'a> {
    fn new(client: &'a Client, wait: InstanceWait) -> Self {
        Self {
            client,
            wait,
            started: AtomicBool::new(false),
        }
    }

    fn classify(&self, instance: RedisInstance) -> InstanceObservation {
        let status = InstanceStatus::from(instance.status);
        match self.wait {
            InstanceWait::Online => {
                let phase = match status {
                    InstanceStatus::Online => Phase::Succeeded,
                    s if s.is_transitional() => Phase::InProgress,
                    _ => Phase::Failed,
                };
                InstanceObservation::new(instance, phase)
            }
            InstanceWait::Update => {
                if status == InstanceStatus::Online && !self.started.load(Ordering::SeqCst) {
                    let mut observation = InstanceObservation::new(instance, Phase::InProgress);
                    observation.note = Some("waiting for the change to start");
                    return observation;
                }
                self.started.store(true, Ordering::SeqCst);
                let phase = if status.is_transitional() {
                    Phase::InProgress
                } else {
                    Phase::Succeeded
                };
                InstanceObservation::new(instance, phase)
            }
        }
    }
}

#[async_trait]
impl<'a> StatusFetcher<str> for InstanceFetcher<'a> {
    type Output = InstanceObservation;
    type Error = ApiError;

    async fn fetch(&self, instance_id: &str) -> Result<Option<InstanceObservation>, ApiError> {
        let instances = self.client.redis().describe_instances(instance_id).await?;
        Ok(instances.into_iter().next().map(|i| self.classify(i)))
    }
}

struct IsolationFetcher<'a> {
    client: &'a Client,
}

#[async_trait]
impl<'a> StatusFetcher<str> for IsolationFetcher<'a> {
    type Output = IsolationObservation;
    type Error = ApiError;

    async fn fetch(&self, instance_id: &str) -> Result<Option<IsolationObservation>, ApiError> {
        let instances = self.client.redis().describe_instances(instance_id).await?;
        Ok(Some(match instances.as_slice() {
            [] => IsolationObservation::Gone,
            [instance] => IsolationObservation::Present(InstanceStatus::from(instance.status)),
            many => IsolationObservation::Ambiguous(many.len()),
        }))
    }
}

/// Waiters and retried mutations for Redis instances
#[derive(Clone)]
pub struct RedisService {
    client: Client,
    poll: PollConfig,
    switch_option: SwitchOption,
}

impl RedisService {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            poll: PollConfig::sdk_style(READ_RETRY_TIMEOUT),
            switch_option: SwitchOption::default(),
        }
    }

    /// Replace the delay between attempts of every wait and retry
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.poll = self.poll.with_backoff(backoff);
        self
    }

    /// When `apply_replica_zones` switches a single-AZ instance to multi-AZ
    pub fn with_switch_option(mut self, switch_option: SwitchOption) -> Self {
        self.switch_option = switch_option;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn poller(&self, operation: &str, timeout: Duration) -> Poller {
        Poller::new(operation, self.poll.with_timeout(timeout))
    }

    /// Wait until an async task reports `succeed`
    pub async fn wait_for_task(&self, ctx: &Context, task_id: i64, timeout: Duration) -> WaitResult<()> {
        tracing::debug!("[{}] waiting for redis task {}", ctx.log_id(), task_id);
        let fetcher = TaskFetcher {
            client: &self.client,
        };
        self.poller("DescribeTaskInfo", timeout)
            .poll(ctx, &task_id, &fetcher)
            .await?;
        Ok(())
    }

    /// Wait until a deal is delivered and return the instance it created
    pub async fn wait_for_deal(&self, ctx: &Context, deal_id: &str, timeout: Duration) -> WaitResult<String> {
        tracing::debug!("[{}] waiting for redis deal {}", ctx.log_id(), deal_id);
        let fetcher = DealFetcher {
            client: &self.client,
        };
        let poller = self.poller("DescribeInstanceDealDetail", timeout);
        let observation = poller.poll(ctx, deal_id, &fetcher).await?;

        observation
            .instance_id()
            .map(str::to_string)
            .ok_or_else(|| PollError::Failed {
                target: format!("{} {}", poller.operation(), deal_id),
                status: observation.describe(),
            })
    }

    /// Wait until the instance is online
    pub async fn wait_until_online(
        &self,
        ctx: &Context,
        instance_id: &str,
        timeout: Duration,
    ) -> WaitResult<RedisInstance> {
        let fetcher = InstanceFetcher::new(&self.client, InstanceWait::Online);
        let observation = self
            .poller("DescribeInstances", timeout)
            .poll(ctx, instance_id, &fetcher)
            .await?;
        Ok(observation.instance)
    }

    /// Wait for a change to start and then settle
    ///
    /// Any status other than init or processing ends the wait once the
    /// instance has left the online state at least once.
    pub async fn wait_for_update(
        &self,
        ctx: &Context,
        instance_id: &str,
        timeout: Duration,
    ) -> WaitResult<RedisInstance> {
        let fetcher = InstanceFetcher::new(&self.client, InstanceWait::Update);
        let observation = self
            .poller("DescribeInstances", timeout)
            .poll(ctx, instance_id, &fetcher)
            .await?;
        Ok(observation.instance)
    }

    /// Wait until the instance is isolated or gone
    pub async fn wait_for_isolation(&self, ctx: &Context, instance_id: &str, timeout: Duration) -> WaitResult<()> {
        let fetcher = IsolationFetcher {
            client: &self.client,
        };
        self.poller("DescribeInstances", timeout)
            .poll(ctx, instance_id, &fetcher)
            .await?;
        Ok(())
    }

    /// Retry a mutating call until the control plane accepts it, then wait for
    /// the task it returned
    ///
    /// Errors carrying one of `retry_codes` or the common retryable codes are
    /// retried. A task ID of zero or below means there is nothing to wait for.
    pub async fn run_and_wait_task<F, Fut>(
        &self,
        ctx: &Context,
        action: &str,
        retry_codes: &[&str],
        mut mutate: F,
    ) -> WaitResult<i64>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<i64, ApiError>>,
    {
        let task_id = self
            .poller(action, WRITE_RETRY_TIMEOUT)
            .retry(ctx, || {
                let call = mutate();
                async move { call.await.map_err(|e| retry_error(e, retry_codes)) }
            })
            .await?;

        if task_id <= 0 {
            tracing::debug!("[{}] {} returned no task to wait for", ctx.log_id(), action);
            return Ok(task_id);
        }

        self.wait_for_task(ctx, task_id, self.poll.timeout).await?;
        Ok(task_id)
    }

    /// Move the replica nodes of an instance from `old_zone_ids` to `new_zone_ids`
    ///
    /// Replicas are added first, then removed, each step waiting for the
    /// instance to settle.
    pub async fn apply_replica_zones(
        &self,
        ctx: &Context,
        instance_id: &str,
        old_zone_ids: &[i64],
        new_zone_ids: &[i64],
    ) -> Result<ReplicaPlan, RedisError> {
        let instance = self.wait_until_online(ctx, instance_id, READ_RETRY_TIMEOUT).await?;
        let plan = plan_replica_changes(old_zone_ids, new_zone_ids, &instance.node_set)?;

        for zone in &plan.unmatched_zones {
            tracing::warn!(
                "[{}] redis {} has no replica in zone {} to remove",
                ctx.log_id(),
                instance_id,
                zone
            );
        }
        if plan.is_empty() {
            return Ok(plan);
        }

        let (mem_size, shard_num) = upgrade_sizing(&instance)?;

        if !plan.additions.is_empty() {
            if plan.enable_multi_az {
                let master_zone = instance.zone_id.ok_or_else(|| RedisError::MissingField {
                    instance_id: instance_id.to_string(),
                    field: "zone",
                })?;
                let request = ModifyInstanceAvailabilityZonesRequest {
                    instance_id: instance_id.to_string(),
                    switch_option: self.switch_option.code(),
                    node_set: plan
                        .additions
                        .iter()
                        .cloned()
                        .chain(std::iter::once(RedisNodeInfo::master_in(master_zone)))
                        .collect(),
                };
                let request = &request;
                self.retry_write(ctx, "ModifyInstanceAvailabilityZones", &["InternalError"], || async move {
                    self.client.redis().modify_instance_availability_zones(request).await
                })
                .await?;
            } else {
                let request = UpgradeInstanceRequest {
                    instance_id: instance_id.to_string(),
                    mem_size,
                    redis_shard_num: shard_num,
                    redis_replicas_num: plan.replicas_after_additions,
                    node_set: plan.additions.clone(),
                };
                self.upgrade(ctx, &request, &["FailedOperation.Unknown"]).await?;
            }
            self.wait_for_update(ctx, instance_id, UPDATE_WAIT_TIMEOUT).await?;
        }

        if !plan.removals.is_empty() {
            self.wait_until_online(ctx, instance_id, READ_RETRY_TIMEOUT).await?;
            let request = UpgradeInstanceRequest {
                instance_id: instance_id.to_string(),
                mem_size,
                redis_shard_num: shard_num,
                redis_replicas_num: plan.replicas_after_removals,
                node_set: plan.removals.clone(),
            };
            self.upgrade(ctx, &request, &["FailedOperation.Unknown"]).await?;
            self.wait_for_update(ctx, instance_id, UPDATE_WAIT_TIMEOUT).await?;
        }

        Ok(plan)
    }

    /// Change the replica count of an instance whose replicas are not pinned
    /// to zones
    ///
    /// Returns `false` without calling the API when the instance already has
    /// `replicas` replicas.
    pub async fn set_replica_count(
        &self,
        ctx: &Context,
        instance_id: &str,
        replicas: i64,
    ) -> Result<bool, RedisError> {
        let instance = self.wait_until_online(ctx, instance_id, READ_RETRY_TIMEOUT).await?;
        if instance.redis_replicas_num == Some(replicas) {
            return Ok(false);
        }

        let (mem_size, shard_num) = upgrade_sizing(&instance)?;
        tracing::info!(
            "[{}] changing redis {} replicas from {:?} to {}",
            ctx.log_id(),
            instance_id,
            instance.redis_replicas_num,
            replicas
        );
        let request = UpgradeInstanceRequest {
            instance_id: instance_id.to_string(),
            mem_size,
            redis_shard_num: shard_num,
            redis_replicas_num: replicas,
            node_set: Vec::new(),
        };
        self.upgrade(ctx, &request, UPGRADE_RETRY_CODES).await?;
        self.wait_for_update(ctx, instance_id, UPDATE_WAIT_TIMEOUT).await?;
        Ok(true)
    }

    async fn upgrade(
        &self,
        ctx: &Context,
        request: &UpgradeInstanceRequest,
        retry_codes: &[&str],
    ) -> WaitResult<String> {
        self.retry_write(ctx, "UpgradeInstance", retry_codes, || async move {
            self.client.redis().upgrade_instance(request).await
        })
        .await
    }

    async fn retry_write<T, F, Fut>(
        &self,
        ctx: &Context,
        action: &str,
        retry_codes: &[&str],
        mut call: F,
    ) -> WaitResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.poller(action, WRITE_RETRY_TIMEOUT)
            .retry(ctx, || {
                let attempt = call();
                async move { attempt.await.map_err(|e| retry_error(e, retry_codes)) }
            })
            .await
    }
}

/// Per-shard memory and shard count to resend with an `UpgradeInstance` that
/// only changes replicas
fn upgrade_sizing(instance: &RedisInstance) -> Result<(u64, i64), RedisError> {
    let missing = |field| RedisError::MissingField {
        instance_id: instance.instance_id.clone(),
        field,
    };
    let mem_size = instance
        .redis_shard_size
        .filter(|size| *size > 0)
        .ok_or_else(|| missing("shard size"))? as u64;
    let shard_num = instance
        .redis_shard_num
        .ok_or_else(|| missing("shard count"))?;
    Ok((mem_size, shard_num))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::crs::RedisNodeInfo;

    fn instance(status: i64) -> RedisInstance {
        RedisInstance {
            instance_id: "crs-1".to_string(),
            instance_name: None,
            status,
            zone_id: Some(100003),
            size: Some(4096.0),
            redis_shard_size: Some(1024),
            redis_shard_num: Some(4),
            redis_replicas_num: Some(1),
            node_set: vec![RedisNodeInfo::master_in(100003)],
        }
    }

    fn fetcher_for(wait: InstanceWait) -> InstanceFetcher<'static> {
        let client: &'static Client = Box::leak(Box::new(
            crate::api::Client::new(
                crate::config::ProviderConfig::builder()
                    .secret_id("id")
                    .secret_key("key")
                    .endpoint("http://127.0.0.1:1")
                    .build()
                    .unwrap(),
            )
            .unwrap(),
        ));
        InstanceFetcher::new(client, wait)
    }

    #[test]
    fn online_wait_classification() {
        let fetcher = fetcher_for(InstanceWait::Online);
        assert_eq!(fetcher.classify(instance(0)).phase(), Phase::InProgress);
        assert_eq!(fetcher.classify(instance(1)).phase(), Phase::InProgress);
        assert_eq!(fetcher.classify(instance(2)).phase(), Phase::Succeeded);
        assert_eq!(fetcher.classify(instance(-2)).phase(), Phase::Failed);
    }

    #[test]
    fn update_wait_ignores_online_until_change_starts() {
        let fetcher = fetcher_for(InstanceWait::Update);

        let first = fetcher.classify(instance(2));
        assert_eq!(first.phase(), Phase::InProgress);
        assert!(first.describe().contains("waiting for the change to start"));

        assert_eq!(fetcher.classify(instance(1)).phase(), Phase::InProgress);
        assert_eq!(fetcher.classify(instance(2)).phase(), Phase::Succeeded);
    }

    #[test]
    fn update_wait_accepts_any_settled_status_after_start() {
        let fetcher = fetcher_for(InstanceWait::Update);
        assert_eq!(fetcher.classify(instance(0)).phase(), Phase::InProgress);
        assert_eq!(fetcher.classify(instance(-2)).phase(), Phase::Succeeded);
    }

    #[test]
    fn deal_observation_requires_single_record_and_instance() {
        let delivered = DealObservation {
            status: DealStatus::Delivered,
            instance_ids: vec!["crs-new".to_string()],
            records: 1,
        };
        assert_eq!(delivered.phase(), Phase::Succeeded);
        assert_eq!(delivered.instance_id(), Some("crs-new"));

        let two_ids = DealObservation {
            instance_ids: vec!["a".to_string(), "b".to_string()],
            ..delivered.clone()
        };
        assert_eq!(two_ids.phase(), Phase::Failed);
        assert_eq!(two_ids.instance_id(), None);
        assert!(two_ids.describe().contains("2 instance ids"));

        let two_records = DealObservation {
            records: 2,
            ..delivered.clone()
        };
        assert_eq!(two_records.phase(), Phase::Failed);
        assert_eq!(two_records.describe(), "2 deal records returned");

        let pending = DealObservation {
            status: DealStatus::Pending(2),
            instance_ids: Vec::new(),
            records: 1,
        };
        assert_eq!(pending.phase(), Phase::InProgress);
    }

    #[test]
    fn isolation_observation_phases() {
        assert_eq!(IsolationObservation::Gone.phase(), Phase::Succeeded);
        assert_eq!(
            IsolationObservation::Present(InstanceStatus::Isolated).phase(),
            Phase::Succeeded
        );
        assert_eq!(
            IsolationObservation::Present(InstanceStatus::ToDelete).phase(),
            Phase::Succeeded
        );
        assert_eq!(
            IsolationObservation::Present(InstanceStatus::Online).phase(),
            Phase::InProgress
        );
        assert_eq!(IsolationObservation::Ambiguous(2).phase(), Phase::Failed);
        assert_eq!(
            IsolationObservation::Ambiguous(2).describe(),
            "2 instance records returned"
        );
    }

    #[test]
    fn upgrade_sizing_uses_per_shard_memory() {
        assert_eq!(upgrade_sizing(&instance(2)).unwrap(), (1024, 4));

        let mut unsized_instance = instance(2);
        unsized_instance.redis_shard_size = None;
        assert!(matches!(
            upgrade_sizing(&unsized_instance),
            Err(RedisError::MissingField { field: "shard size", .. })
        ));
    }

    #[test]
    fn switch_option_codes() {
        assert_eq!(SwitchOption::default(), SwitchOption::Immediately);
        assert_eq!(SwitchOption::Immediately.code(), 2);
        assert_eq!(SwitchOption::MaintenanceWindow.code(), 1);
    }
}
