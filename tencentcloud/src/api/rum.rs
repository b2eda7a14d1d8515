//! RUM API bindings

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::Service;
use super::error::ApiError;

pub struct RumApi<'a> {
    client: &'a Client,
}

impl<'a> RumApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Look up a single instance by ID
    pub async fn describe_taw_instance(&self, instance_id: &str) -> Result<Option<RumInstance>, ApiError> {
        let request = DescribeTawInstancesRequest {
            filters: vec![Filter {
                name: "InstanceId",
                values: vec![instance_id],
            }],
        };

        let response: DescribeTawInstancesResponse = self
            .client
            .call(Service::RUM, "DescribeTawInstances", &request)
            .await?;
        Ok(response.instance_set.into_iter().next())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Filter<'a> {
    name: &'a str,
    values: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTawInstancesRequest<'a> {
    filters: Vec<Filter<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTawInstancesResponse {
    #[serde(default)]
    instance_set: Vec<RumInstance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RumInstance {
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: Option<String>,
    /// 1 creating, 2 running, 3 abnormal, 4 restarting, 5 stopping, 6 stopped, 7 deleted
    pub instance_status: i64,
    #[serde(default)]
    pub area_id: Option<i64>,
}
