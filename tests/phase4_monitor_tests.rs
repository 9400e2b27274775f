use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uig::engines::{StubEngine, StubIngress};
use uig::error::SubsystemError;
use uig::monitor::{HealthMonitor, HealthReport, Liveness, MonitorConfig};
use uig::supervisor::{StatusReport, Subsystem};
use uig::{ChannelController, Pipeline, PipelineSettings, Supervisor, SupervisorSettings};

// Liveness is fixed at construction; counts how often it was asked.
struct Probe {
    id: String,
    alive: Option<bool>,
    status: Option<&'static str>,
    asked: AtomicUsize,
    stopped: AtomicBool,
}

impl Probe {
    fn new(id: &str, alive: Option<bool>) -> Self {
        Self {
            id: id.to_string(),
            alive,
            status: None,
            asked: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    fn with_status(mut self, status: &'static str) -> Self {
        self.status = Some(status);
        self
    }
}

#[async_trait]
impl Subsystem for Probe {
    fn id(&self) -> &str {
        &self.id
    }

    async fn start(&self) -> Result<(), SubsystemError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), SubsystemError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> Option<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.alive
    }

    fn status(&self) -> Option<StatusReport> {
        self.status
            .map(|s| StatusReport::new(s).with_detail("queue_depth", 3))
    }
}

fn ten_second_config() -> MonitorConfig {
    MonitorConfig {
        period: Duration::from_secs(10),
        board_period: Duration::from_secs(30),
    }
}

fn drain(rx: &mut mpsc::Receiver<HealthReport>) -> Vec<HealthReport> {
    let mut reports = Vec::new();
    while let Ok(report) = rx.try_recv() {
        reports.push(report);
    }
    reports
}

#[test]
fn test_poll_classifies_liveness() {
    let targets: Vec<Arc<dyn Subsystem>> = vec![
        Arc::new(Probe::new("up", Some(true)).with_status("ok")),
        Arc::new(Probe::new("down", Some(false))),
        Arc::new(Probe::new("silent", None)),
    ];
    let mut monitor = HealthMonitor::new(targets, &ten_second_config());
    let report = monitor.poll();

    assert_eq!(report.poll, 1);
    assert_eq!(report.unhealthy_ids(), vec!["down"]);
    assert!(!report.is_healthy());

    assert_eq!(report.subsystem("up").unwrap().liveness, Liveness::Running);
    assert_eq!(report.subsystem("down").unwrap().liveness, Liveness::NotRunning);
    // No predicate is not a failure
    assert_eq!(report.subsystem("silent").unwrap().liveness, Liveness::NotReported);

    let status = report.subsystem("up").unwrap().status.as_ref().unwrap();
    assert_eq!(status.status, "ok");
    assert_eq!(status.details["queue_depth"], serde_json::json!(3));
    assert!(report.subsystem("down").unwrap().status.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_one_issue_per_period_without_termination() {
    let down = Arc::new(Probe::new("ENGINE_004", Some(false)));
    let targets: Vec<Arc<dyn Subsystem>> = vec![down.clone()];
    let (tx, mut rx) = mpsc::channel(16);
    let monitor = HealthMonitor::new(targets, &ten_second_config()).with_sink(tx);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(cancel.clone()));

    // Polls land at 10s, 20s, 30s
    tokio::time::sleep(Duration::from_secs(35)).await;
    cancel.cancel();
    let polls = handle.await.unwrap();
    assert_eq!(polls, 3);

    let reports = drain(&mut rx);
    assert_eq!(reports.len(), 3);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.poll, i as u64 + 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].id, "ENGINE_004");
    }

    // The monitor never touches the subsystem it watches
    assert!(!down.stopped.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_first_poll_waits_one_period() {
    let probe = Arc::new(Probe::new("A", Some(true)));
    let targets: Vec<Arc<dyn Subsystem>> = vec![probe.clone()];
    let monitor = HealthMonitor::new(targets, &ten_second_config());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(probe.asked.load(Ordering::SeqCst), 0);

    cancel.cancel();
    assert_eq!(handle.await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_full_sink_skips_reports() {
    let targets: Vec<Arc<dyn Subsystem>> = vec![Arc::new(Probe::new("A", Some(true)))];
    let (tx, mut rx) = mpsc::channel(1);
    let monitor = HealthMonitor::new(targets, &ten_second_config()).with_sink(tx);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(cancel.clone()));
    tokio::time::sleep(Duration::from_secs(45)).await;
    cancel.cancel();

    assert_eq!(handle.await.unwrap(), 4);
    let reports = drain(&mut rx);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].poll, 1);
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_publishes_reports() {
    let controller = Arc::new(ChannelController::new());
    let settings = SupervisorSettings {
        monitor: ten_second_config(),
        ..SupervisorSettings::default()
    };
    let mut sup = Supervisor::new(controller.clone(), settings);

    let healthy = Arc::new(StubEngine::new("ENGINE_003", "Perception"));
    let sleepy = Arc::new(Probe::new("ENGINE_006", Some(false)));
    sup.register(healthy.clone());
    sup.register(sleepy.clone());

    let (tx, mut rx) = mpsc::channel(16);
    sup.set_report_sink(tx);

    let pipeline = Pipeline::new(
        controller.clone(),
        Arc::new(StubIngress::discarding("sink")),
        &PipelineSettings::default(),
    );
    sup.start_all(pipeline).await.unwrap();

    tokio::time::sleep(Duration::from_secs(25)).await;
    let report = sup.shutdown().await;
    assert_eq!(report.monitor_polls, 2);

    let reports = drain(&mut rx);
    assert_eq!(reports.len(), 2);
    let last = &reports[1];
    assert_eq!(last.unhealthy_ids(), vec!["ENGINE_006"]);
    assert_eq!(last.subsystem("ENGINE_003").unwrap().liveness, Liveness::Running);

    // The pipeline reports itself under its engine source id
    let pipeline_health = last.subsystem("ENGINE_001").unwrap();
    assert_eq!(pipeline_health.liveness, Liveness::Running);
    let status = pipeline_health.status.as_ref().unwrap();
    assert_eq!(status.status, "running");
    assert!(status.details.contains_key("dropped"));
    assert!(status.details.contains_key("text"));
}

#[test]
fn test_liveness_labels() {
    assert_eq!(Liveness::from_probe(Some(true)).label(), "running");
    assert_eq!(Liveness::from_probe(Some(false)).label(), "NOT RUNNING");
    assert_eq!(Liveness::from_probe(None).label(), "not reported");
}
