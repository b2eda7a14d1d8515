//! Reconcile the replica zones of a Redis instance

use opwait::{list_diff, take_first_matches};
use thiserror::Error;

use crate::api::crs::RedisNodeInfo;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("cannot delete replica {node} which is the only replica left ({remaining} would remain)")]
    LastReplica { node: String, remaining: i64 },
}

/// The node changes needed to move from one replica zone list to another
///
/// Additions are applied first, removals second; each step is followed by an
/// update wait.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaPlan {
    pub additions: Vec<RedisNodeInfo>,
    /// A single-AZ instance gaining its first replica switches availability
    /// zones instead of upgrading
    pub enable_multi_az: bool,
    pub replicas_after_additions: i64,
    pub removals: Vec<RedisNodeInfo>,
    pub replicas_after_removals: i64,
    /// Zones asked to be removed that no replica lives in
    pub unmatched_zones: Vec<i64>,
}

impl ReplicaPlan {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

pub fn plan_replica_changes(
    old_zone_ids: &[i64],
    new_zone_ids: &[i64],
    current_nodes: &[RedisNodeInfo],
) -> Result<ReplicaPlan, PlanError> {
    let diff = list_diff(old_zone_ids, new_zone_ids);
    let replica_count = current_nodes.iter().filter(|n| !n.is_master()).count() as i64;

    let additions: Vec<RedisNodeInfo> = diff
        .added
        .iter()
        .map(|zone| RedisNodeInfo::replica_in(*zone))
        .collect();
    let enable_multi_az = replica_count == 0 && additions.len() == 1;
    let replicas_after_additions = replica_count + additions.len() as i64;

    let (selected, unmatched_zones) = take_first_matches(&diff.removed, current_nodes, |node| {
        (!node.is_master()).then_some(node.zone_id)
    });
    let removals: Vec<RedisNodeInfo> = selected.into_iter().cloned().collect();
    let replicas_after_removals = replicas_after_additions - diff.removed.len() as i64;

    if !diff.removed.is_empty() && replicas_after_removals <= 0 {
        let node = removals
            .first()
            .and_then(|n| n.node_id)
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("in zone {}", diff.removed[0]));
        return Err(PlanError::LastReplica {
            node,
            remaining: replicas_after_removals,
        });
    }

    Ok(ReplicaPlan {
        additions,
        enable_multi_az,
        replicas_after_additions,
        removals,
        replicas_after_removals,
        unmatched_zones,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn node(node_type: i64, node_id: i64, zone_id: i64) -> RedisNodeInfo {
        RedisNodeInfo {
            node_type,
            node_id: Some(node_id),
            zone_id,
        }
    }

    fn two_replicas() -> Vec<RedisNodeInfo> {
        vec![
            node(0, 1, 100003),
            node(1, 2, 100004),
            node(1, 3, 100004),
        ]
    }

    #[test]
    fn unchanged_zones_plan_nothing() {
        let plan = plan_replica_changes(&[100004, 100004], &[100004, 100004], &two_replicas()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.replicas_after_removals, 2);
    }

    #[test]
    fn added_zones_become_replica_nodes() {
        let plan = plan_replica_changes(&[100004, 100004], &[100004, 100004, 100006], &two_replicas())
            .unwrap();

        assert_eq!(plan.additions, vec![RedisNodeInfo::replica_in(100006)]);
        assert!(!plan.enable_multi_az);
        assert_eq!(plan.replicas_after_additions, 3);
        assert!(plan.removals.is_empty());
    }

    #[test]
    fn single_az_instance_switches_to_multi_az() {
        let nodes = vec![node(0, 1, 100003)];
        let plan = plan_replica_changes(&[], &[100004], &nodes).unwrap();

        assert!(plan.enable_multi_az);
        assert_eq!(plan.replicas_after_additions, 1);

        let plan = plan_replica_changes(&[], &[100004, 100005], &nodes).unwrap();
        assert!(!plan.enable_multi_az);
    }

    #[test]
    fn duplicate_zone_removal_takes_first_replica() {
        let nodes = vec![
            node(0, 1, 100004),
            node(1, 2, 100004),
            node(1, 3, 100004),
            node(1, 4, 100005),
        ];
        let plan =
            plan_replica_changes(&[100004, 100004, 100005], &[100004, 100005], &nodes).unwrap();

        assert_eq!(plan.removals, vec![node(1, 2, 100004)]);
        assert_eq!(plan.replicas_after_removals, 2);
        assert!(plan.unmatched_zones.is_empty());
    }

    #[test]
    fn master_nodes_are_never_removed() {
        let nodes = vec![node(0, 1, 100003), node(1, 2, 100004), node(1, 3, 100004)];
        let plan = plan_replica_changes(&[100003, 100004], &[100004], &nodes).unwrap();

        assert!(plan.removals.is_empty());
        assert_eq!(plan.unmatched_zones, vec![100003]);
    }

    #[test]
    fn removing_the_last_replica_is_an_error() {
        let nodes = vec![node(0, 1, 100003), node(1, 7, 100004)];
        let err = plan_replica_changes(&[100004], &[], &nodes).unwrap_err();

        assert_eq!(
            err,
            PlanError::LastReplica {
                node: "7".to_string(),
                remaining: 0
            }
        );
        assert!(err.to_string().contains("cannot delete replica 7"));
    }

    #[test]
    fn swapping_zones_adds_before_removing() {
        let nodes = vec![node(0, 1, 100003), node(1, 2, 100004)];
        let plan = plan_replica_changes(&[100004], &[100006], &nodes).unwrap();

        assert_eq!(plan.additions, vec![RedisNodeInfo::replica_in(100006)]);
        assert_eq!(plan.replicas_after_additions, 2);
        assert_eq!(plan.removals, vec![node(1, 2, 100004)]);
        assert_eq!(plan.replicas_after_removals, 1);
    }
}
