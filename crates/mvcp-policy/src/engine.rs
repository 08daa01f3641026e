use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mvcp_domain::{Member, MemberStatus, Metrics, Policy, PolicyMode};
use tokio::sync::RwLock;

type ChangeCallback = Box<dyn Fn(&Policy) + Send + Sync>;

use crate::error::PolicyError;
use crate::scoring::{calculate_score, meets_constraints};

/// A workload-level spawn ask. Deliberately thin today — `CanSpawn` only
/// inspects the active `Policy`'s mode — but gives the surface a place to
/// grow per-workload hard constraints without an API break.
#[derive(Debug, Clone, Default)]
pub struct PlacementRequest {
    pub workload_id: String,
}

/// Holds the active placement `Policy` behind a reader-writer lock and
/// evaluates it against cluster membership telemetry.
///
/// `GetPolicy` hands back a snapshot `Arc` — callers see a consistent
/// policy for the lifetime of their evaluation even if it's replaced
/// concurrently by `SetPolicy` or a hot reload.
pub struct PolicyEngine {
    policy: RwLock<Arc<Policy>>,
    evaluations: AtomicU64,
    violations: AtomicU64,
    on_change: RwLock<Vec<ChangeCallback>>,
    metrics: Arc<Metrics>,
}

impl PolicyEngine {
    pub fn new(policy: Policy, metrics: Arc<Metrics>) -> Self {
        Self {
            policy: RwLock::new(Arc::new(policy)),
            evaluations: AtomicU64::new(0),
            violations: AtomicU64::new(0),
            on_change: RwLock::new(Vec::new()),
            metrics,
        }
    }

    pub async fn load_policy(&self, path: &Path) -> Result<(), PolicyError> {
        let policy = mvcp_config::load_policy(path)?;
        self.set_policy(policy).await;
        Ok(())
    }

    /// Registers a callback invoked synchronously, right after every
    /// `set_policy`/`load_policy`, with the newly active policy. Lets
    /// long-lived consumers react to a swap instead of polling `get_policy`.
    pub async fn on_change(&self, callback: impl Fn(&Policy) + Send + Sync + 'static) {
        self.on_change.write().await.push(Box::new(callback));
    }

    pub async fn set_policy(&self, policy: Policy) {
        let policy = Arc::new(policy);
        {
            let mut guard = self.policy.write().await;
            *guard = policy.clone();
        }
        for callback in self.on_change.read().await.iter() {
            callback(&policy);
        }
    }

    pub async fn get_policy(&self) -> Arc<Policy> {
        self.policy.read().await.clone()
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    /// Permissive mode always allows. Enforce mode currently allows too —
    /// hard constraints live at node selection, not at the spawn decision.
    pub async fn can_spawn(&self, _request: &PlacementRequest) -> (bool, String) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_policy_evaluation();
        let policy = self.get_policy().await;
        match policy.mode {
            PolicyMode::Permissive => (true, "permissive mode allows all spawns".to_string()),
            PolicyMode::Enforce => {
                (true, "hard constraints are applied at node selection, not here".to_string())
            }
        }
    }

    /// Rank alive members by descending score after filtering out anyone
    /// that violates a hard constraint. A member with no telemetry gets a
    /// neutral 0.5 score, but only in permissive mode — enforce mode has
    /// nothing to check it against, so it's excluded rather than trusted.
    pub async fn select_nodes(
        &self,
        _request: &PlacementRequest,
        members: &[Member],
    ) -> Result<Vec<String>, PolicyError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_policy_evaluation();
        let policy = self.get_policy().await;

        let mut scored: Vec<(String, f64)> = Vec::new();
        for member in members {
            if member.status != MemberStatus::Alive {
                continue;
            }
            match &member.metadata {
                None => {
                    if policy.mode == PolicyMode::Permissive {
                        scored.push((member.node_name.clone(), 0.5));
                    }
                }
                Some(meta) => {
                    if meets_constraints(&policy.rules, meta) {
                        scored.push((member.node_name.clone(), calculate_score(&policy.scoring, meta)));
                    } else {
                        self.violations.fetch_add(1, Ordering::Relaxed);
                        self.metrics.record_policy_violation();
                    }
                }
            }
        }

        if scored.is_empty() {
            return Err(PolicyError::NoViablePlacement);
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().map(|(name, _)| name).collect())
    }
}
