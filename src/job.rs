//! In-memory job store and the async solve-job lifecycle. Modeled on `solver.rs` `SolverService`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::info;

use crate::config::Config;
use crate::domain::{RoutePlanResult, RouteRequest};
use crate::orchestrator;
use crate::provider::MapProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub result: Option<RoutePlanResult>,
    pub error: Option<String>,
    stop_signal: Option<oneshot::Sender<()>>,
}

/// `RwLock<HashMap<String, Arc<RwLock<JobRecord>>>>`, written only once per
/// job at pipeline completion.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Arc<RwLock<JobRecord>>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self { jobs: RwLock::new(HashMap::new()) }
    }

    fn create(&self, id: String) -> Arc<RwLock<JobRecord>> {
        let job = Arc::new(RwLock::new(JobRecord {
            id: id.clone(),
            status: JobStatus::Running,
            result: None,
            error: None,
            stop_signal: None,
        }));
        self.jobs.write().insert(id, job.clone());
        job
    }

    pub fn get(&self, id: &str) -> Option<Arc<RwLock<JobRecord>>> {
        self.jobs.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<RwLock<JobRecord>>> {
        self.jobs.write().remove(id)
    }

    /// Creates a job, then spawns a task that drives the pipeline to
    /// completion. Returns the new job id immediately; the caller polls
    /// [`JobStore::get`] for completion.
    pub fn start(
        self: &Arc<Self>,
        request: RouteRequest,
        provider: Arc<dyn MapProvider>,
        config: Config,
    ) -> String {
        let id = format!("job_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let job = self.create(id.clone());

        let (tx, rx) = oneshot::channel();
        job.write().stop_signal = Some(tx);

        let job_id = id.clone();
        tokio::spawn(run_job(job, job_id, request, provider, config, rx));

        id
    }

    /// Signals cancellation; the running task discards partial state and
    /// never writes to the store.
    pub fn cancel(&self, id: &str) -> bool {
        if let Some(job) = self.get(id) {
            let mut guard = job.write();
            if let Some(signal) = guard.stop_signal.take() {
                let _ = signal.send(());
                guard.status = JobStatus::Cancelled;
                return true;
            }
        }
        false
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(
    job: Arc<RwLock<JobRecord>>,
    job_id: String,
    request: RouteRequest,
    provider: Arc<dyn MapProvider>,
    config: Config,
    mut stop_rx: oneshot::Receiver<()>,
) {
    info!(job_id = %job_id, "pipeline started");

    let pipeline = orchestrator::run_blocking(request, provider, config, job_id.clone());
    tokio::pin!(pipeline);

    tokio::select! {
        _ = &mut stop_rx => {
            info!(job_id = %job_id, "job cancelled before completion");
        }
        result = &mut pipeline => {
            let mut guard = job.write();
            match result {
                Ok(plan) => {
                    info!(job_id = %job_id, routes = plan.routes.len(), "pipeline completed");
                    guard.status = JobStatus::Completed;
                    guard.result = Some(plan);
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "pipeline failed");
                    guard.status = JobStatus::Failed;
                    guard.error = Some(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AreaSpec;
    use crate::geometry::LatLng;
    use crate::graph::{RawEdgeAttrs, RawGraph, RoadNode, TravelMode};
    use crate::partition::BalancePriority;
    use crate::provider::StaticProvider;
    use std::time::Duration;

    fn sample_graph() -> RawGraph {
        RawGraph {
            nodes: vec![RoadNode { x: -75.0, y: 40.0 }, RoadNode { x: -75.001, y: 40.0 }],
            edges: vec![(
                0,
                1,
                RawEdgeAttrs {
                    highway: Some("residential".into()),
                    length: Some(100.0),
                    name: Some("Test St".into()),
                    geometry: None,
                },
            )],
        }
    }

    fn sample_request() -> RouteRequest {
        RouteRequest {
            area: AreaSpec::Circle {
                center: LatLng::new(40.0, -75.0005),
                radius_m: 300.0,
            },
            num_routes: 1,
            total_flyers: 100,
            travel_mode: TravelMode::Walking,
            start_point: None,
            return_to_start: false,
            balance_priority: BalancePriority::Density,
        }
    }

    #[tokio::test]
    async fn job_completes_and_is_retrievable() {
        let store = Arc::new(JobStore::new());
        let provider: Arc<dyn MapProvider> = Arc::new(StaticProvider {
            graph: sample_graph(),
            buildings: vec![],
        });

        let id = store.start(sample_request(), provider, Config::default());

        let mut attempts = 0;
        loop {
            let job = store.get(&id).unwrap();
            let status = job.read().status;
            if status != JobStatus::Running || attempts > 50 {
                assert_eq!(status, JobStatus::Completed);
                break;
            }
            attempts += 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[test]
    fn missing_job_returns_none() {
        let store = JobStore::new();
        assert!(store.get("nonexistent").is_none());
    }
}
