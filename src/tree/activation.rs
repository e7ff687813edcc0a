//! Route activation: moving the active leaf from one node to another.
//!
//! When the active route changes, exit hooks run for the nodes of the previous path that
//! are not on the new path, leaf first. Entry hooks then run for the complete new path,
//! root first, so that persisting elements can refresh their parameter attributes.
//!
//! ```text
//!      _Root_
//!     /      \
//!    A        D
//!   / \        \
//!  B   C        E
//! ```
//!
//! With `B` active, activating `E` runs `B.exit, A.exit, Root.enter, D.enter, E.enter`;
//! activating `C` runs `B.exit, Root.enter, A.enter, C.enter`.

use super::RouteNode;
use crate::{context::Context, error::RouterError, routing::EnterOutcome};

/// Nodes to exit (leaf to root) and to enter (root to target) for one activation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivationPlan {
    pub exit: Vec<RouteNode>,
    pub entry: Vec<RouteNode>,
}

impl ActivationPlan {
    pub fn exit_keys(&self) -> Vec<&str> {
        self.exit.iter().map(RouteNode::key).collect()
    }

    pub fn entry_keys(&self) -> Vec<&str> {
        self.entry.iter().map(RouteNode::key).collect()
    }
}

impl RouteNode {
    /// Compute the exit and entry paths for activating this node after `previous_route_id`.
    ///
    /// The common ancestor search compares every node of the previous path against the
    /// entry path, O(depth²) in the worst case. An unknown `previous_route_id` is treated as
    /// a first activation.
    pub fn activation_plan(&self, previous_route_id: Option<&str>) -> ActivationPlan {
        let mut entry = vec![self.clone()];
        entry.extend(self.ancestors());
        entry.reverse();

        let mut exit = Vec::new();
        if let Some(previous_id) = previous_route_id {
            match self.root().node_by_key(previous_id) {
                Some(previous) => {
                    let mut previous_path = vec![previous.clone()];
                    previous_path.extend(previous.ancestors());
                    for (i, candidate) in previous_path.iter().enumerate() {
                        // Common ancestors keep their elements and are not exited.
                        if entry.iter().rev().any(|node| node == candidate) {
                            exit = previous_path[..i].to_vec();
                            break;
                        }
                    }
                }
                None => {
                    tracing::warn!(
                        "Previous route '{previous_id}' is not in the route tree; \
                         activating '{}' as a first activation",
                        self.key()
                    );
                }
            }
        }

        ActivationPlan { exit, entry }
    }

    /// Make this route the active route, running exit hooks for the nodes left behind and
    /// then entry hooks from the root down to this node.
    ///
    /// Exit and entry hooks are awaited one at a time. An entry hook returning
    /// [`EnterOutcome::Halt`] ends the entry phase. Errors abort the activation and leave the
    /// DOM as the completed steps made it.
    pub async fn activate(
        &self,
        previous_route_id: Option<&str>,
        ctx: &Context,
    ) -> Result<(), RouterError> {
        let route_id = self.key();
        let plan = self.activation_plan(previous_route_id);
        tracing::debug!(
            "Activating '{route_id}' from {previous_route_id:?}: exit {:?}, entry {:?}",
            plan.exit_keys(),
            plan.entry_keys()
        );

        for (idx, current) in plan.exit.iter().enumerate() {
            let next = plan.exit.get(idx + 1);
            if let Some(element) = current.element() {
                let routing = element.routing().ok_or_else(|| RouterError::MissingCapability {
                    tag_name: current.tag_name(),
                    hook: "routeExit".to_string(),
                })?;
                tracing::debug!("routeExit '{}'", current.key());
                routing.route_exit(current, next, route_id, ctx).await?;
            }
            current.set_element(None);
        }

        for (idx, current) in plan.entry.iter().enumerate() {
            let next = plan.entry.get(idx + 1);
            let Some(element) = current.element() else {
                continue;
            };
            let routing = element.routing().ok_or_else(|| RouterError::MissingCapability {
                tag_name: current.tag_name(),
                hook: "routeEnter".to_string(),
            })?;
            tracing::debug!("routeEnter '{}'", current.key());
            if routing.route_enter(current, next, route_id, ctx).await? == EnterOutcome::Halt {
                tracing::debug!("Entry halted at '{}'", current.key());
                break;
            }
        }

        Ok(())
    }
}
