//! CRS (Redis) API bindings

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::Service;
use super::error::ApiError;

pub struct RedisApi<'a> {
    client: &'a Client,
}

impl<'a> RedisApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn describe_task_info(&self, task_id: i64) -> Result<TaskInfo, ApiError> {
        self.client
            .call(
                Service::REDIS,
                "DescribeTaskInfo",
                &DescribeTaskInfoRequest { task_id },
            )
            .await
    }

    /// Instances matching `instance_id`; empty when it no longer exists
    pub async fn describe_instances(&self, instance_id: &str) -> Result<Vec<RedisInstance>, ApiError> {
        let response: DescribeInstancesResponse = self
            .client
            .call(
                Service::REDIS,
                "DescribeInstances",
                &DescribeInstancesRequest { instance_id },
            )
            .await?;
        Ok(response.instance_set)
    }

    pub async fn describe_instance_deal_detail(
        &self,
        deal_id: &str,
    ) -> Result<Vec<DealDetail>, ApiError> {
        let response: DescribeInstanceDealDetailResponse = self
            .client
            .call(
                Service::REDIS,
                "DescribeInstanceDealDetail",
                &DescribeInstanceDealDetailRequest {
                    deal_ids: [deal_id],
                },
            )
            .await?;
        Ok(response.deal_details)
    }

    /// Change shard size or replica layout; returns the deal ID
    pub async fn upgrade_instance(&self, request: &UpgradeInstanceRequest) -> Result<String, ApiError> {
        let response: DealIdResponse = self
            .client
            .call(Service::REDIS, "UpgradeInstance", request)
            .await?;
        Ok(response.deal_id)
    }

    /// Turn a single-AZ instance into a multi-AZ one; returns the task ID
    pub async fn modify_instance_availability_zones(
        &self,
        request: &ModifyInstanceAvailabilityZonesRequest,
    ) -> Result<i64, ApiError> {
        let response: TaskIdResponse = self
            .client
            .call(Service::REDIS, "ModifyInstanceAvailabilityZones", request)
            .await?;
        Ok(response.task_id)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTaskInfoRequest {
    task_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskInfo {
    pub status: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub task_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesRequest<'a> {
    instance_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    instance_set: Vec<RedisInstance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedisInstance {
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: Option<String>,
    pub status: i64,
    #[serde(default)]
    pub zone_id: Option<i64>,
    /// Total memory in MB across all shards
    #[serde(default)]
    pub size: Option<f64>,
    /// Memory per shard in MB; `UpgradeInstance` takes this as `MemSize`
    #[serde(default)]
    pub redis_shard_size: Option<i64>,
    #[serde(default)]
    pub redis_shard_num: Option<i64>,
    #[serde(default)]
    pub redis_replicas_num: Option<i64>,
    #[serde(default)]
    pub node_set: Vec<RedisNodeInfo>,
}

impl RedisInstance {
    pub fn replica_count(&self) -> usize {
        self.node_set.iter().filter(|node| !node.is_master()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedisNodeInfo {
    /// 0 is the master node, 1 a replica
    pub node_type: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<i64>,
    pub zone_id: i64,
}

impl RedisNodeInfo {
    pub const MASTER: i64 = 0;
    pub const REPLICA: i64 = 1;

    pub fn replica_in(zone_id: i64) -> Self {
        Self {
            node_type: Self::REPLICA,
            node_id: None,
            zone_id,
        }
    }

    pub fn master_in(zone_id: i64) -> Self {
        Self {
            node_type: Self::MASTER,
            node_id: None,
            zone_id,
        }
    }

    pub fn is_master(&self) -> bool {
        self.node_type == Self::MASTER
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstanceDealDetailRequest<'a> {
    deal_ids: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstanceDealDetailResponse {
    #[serde(default)]
    deal_details: Vec<DealDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DealDetail {
    pub deal_id: String,
    pub status: i64,
    #[serde(default)]
    pub instance_ids: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpgradeInstanceRequest {
    pub instance_id: String,
    pub mem_size: u64,
    pub redis_shard_num: i64,
    pub redis_replicas_num: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub node_set: Vec<RedisNodeInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyInstanceAvailabilityZonesRequest {
    pub instance_id: String,
    /// 1 switches in the maintenance window, 2 immediately
    pub switch_option: i64,
    pub node_set: Vec<RedisNodeInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DealIdResponse {
    deal_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskIdResponse {
    task_id: i64,
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::super::test_helpers::create_test_client;
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_describe_instances_parses_node_set() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeInstances")
            .match_body(Matcher::Json(json!({"InstanceId": "crs-abc"})))
            .with_body(
                json!({
                    "Response": {
                        "TotalCount": 1,
                        "InstanceSet": [{
                            "InstanceId": "crs-abc",
                            "InstanceName": "cache",
                            "Status": 2,
                            "ZoneId": 100003,
                            "Size": 2048.0,
                            "RedisShardSize": 1024,
                            "RedisShardNum": 2,
                            "RedisReplicasNum": 1,
                            "NodeSet": [
                                {"NodeType": 0, "NodeId": 10, "ZoneId": 100003},
                                {"NodeType": 1, "NodeId": 11, "ZoneId": 100004}
                            ]
                        }],
                        "RequestId": "r-1"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let instances = client.redis().describe_instances("crs-abc").await.unwrap();

        assert_eq!(instances.len(), 1);
        let instance = &instances[0];
        assert_eq!(instance.status, 2);
        assert_eq!(instance.redis_shard_size, Some(1024));
        assert_eq!(instance.redis_shard_num, Some(2));
        assert_eq!(instance.replica_count(), 1);
        assert!(instance.node_set[0].is_master());
        assert_eq!(instance.node_set[1].node_id, Some(11));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_describe_instance_deal_detail_sends_deal_ids() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeInstanceDealDetail")
            .match_body(Matcher::Json(json!({"DealIds": ["deal-1"]})))
            .with_body(
                r#"{"Response":{"TotalCount":1,"DealDetails":[{"DealId":"deal-1","Status":4,"InstanceIds":["crs-new"]}],"RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let deals = client
            .redis()
            .describe_instance_deal_detail("deal-1")
            .await
            .unwrap();

        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].status, 4);
        assert_eq!(deals[0].instance_ids, vec!["crs-new".to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upgrade_instance_omits_empty_node_set() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "UpgradeInstance")
            .match_body(Matcher::Json(json!({
                "InstanceId": "crs-abc",
                "MemSize": 1024,
                "RedisShardNum": 1,
                "RedisReplicasNum": 2
            })))
            .with_body(r#"{"Response":{"DealId":"deal-9","RequestId":"r"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let deal_id = client
            .redis()
            .upgrade_instance(&UpgradeInstanceRequest {
                instance_id: "crs-abc".to_string(),
                mem_size: 1024,
                redis_shard_num: 1,
                redis_replicas_num: 2,
                node_set: Vec::new(),
            })
            .await
            .unwrap();

        assert_eq!(deal_id, "deal-9");
        mock.assert_async().await;
    }

    #[test]
    fn test_new_replica_serializes_without_node_id() {
        let value = serde_json::to_value(RedisNodeInfo::replica_in(100004)).unwrap();
        assert_eq!(value, json!({"NodeType": 1, "ZoneId": 100004}));
    }
}
