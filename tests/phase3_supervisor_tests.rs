use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uig::channels::TextListener;
use uig::engines::{build_roster, standard_roster, StubEngine, StubIngress, MOTHER_ENGINE_ID};
use uig::error::{AdminError, SubsystemError, SupervisorError};
use uig::kernel::{AdminCommand, AdminEffect};
use uig::supervisor::{start_order, Subsystem};
use uig::{
    ChannelController, InputType, Payload, Pipeline, PipelineSettings, Supervisor, SupervisorSettings,
    UnifiedMessage,
};

type Log = Arc<Mutex<Vec<String>>>;

struct FakeSubsystem {
    id: String,
    deps: Vec<String>,
    log: Log,
    fail_start: bool,
    hang_stop: bool,
    running: AtomicBool,
}

impl FakeSubsystem {
    fn new(id: &str, log: &Log) -> Self {
        Self {
            id: id.to_string(),
            deps: Vec::new(),
            log: log.clone(),
            fail_start: false,
            hang_stop: false,
            running: AtomicBool::new(false),
        }
    }

    fn after(mut self, dep: &str) -> Self {
        self.deps.push(dep.to_string());
        self
    }

    fn failing(mut self) -> Self {
        self.fail_start = true;
        self
    }

    fn hanging(mut self) -> Self {
        self.hang_stop = true;
        self
    }

    fn record(&self, what: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", what, self.id));
    }
}

#[async_trait]
impl Subsystem for FakeSubsystem {
    fn id(&self) -> &str {
        &self.id
    }

    fn depends_on(&self) -> &[String] {
        &self.deps
    }

    async fn start(&self) -> Result<(), SubsystemError> {
        self.record("start");
        if self.fail_start {
            return Err(SubsystemError::new("port already in use"));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), SubsystemError> {
        self.record("stop");
        if self.hang_stop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> Option<bool> {
        Some(self.running.load(Ordering::SeqCst))
    }
}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn empty_pipeline(controller: &Arc<ChannelController>) -> Pipeline {
    Pipeline::new(
        controller.clone(),
        Arc::new(StubIngress::discarding("sink")),
        &PipelineSettings::default(),
    )
}

fn supervisor(controller: &Arc<ChannelController>) -> Supervisor {
    Supervisor::new(controller.clone(), SupervisorSettings::default())
}

#[test]
fn test_start_order_is_stable_topological() {
    let none: Vec<String> = Vec::new();
    let on_a = vec!["A".to_string()];
    let on_c = vec!["C".to_string()];

    // B needs A, declared before it; D needs C
    let decls: Vec<(&str, &[String])> = vec![
        ("B", on_a.as_slice()),
        ("A", none.as_slice()),
        ("D", on_c.as_slice()),
        ("C", none.as_slice()),
        ("E", none.as_slice()),
    ];
    let order = start_order(&decls).unwrap();
    let ids: Vec<&str> = order.iter().map(|&i| decls[i].0).collect();
    assert_eq!(ids, vec!["A", "B", "C", "D", "E"]);
}

#[test]
fn test_invalid_declarations_are_rejected() {
    let none: Vec<String> = Vec::new();
    let on_x = vec!["X".to_string()];
    let on_a = vec!["A".to_string()];
    let on_b = vec!["B".to_string()];

    let unknown: Vec<(&str, &[String])> = vec![("A", on_x.as_slice())];
    assert!(matches!(
        start_order(&unknown),
        Err(SupervisorError::UnknownDependency { ref id, ref dependency }) if id == "A" && dependency == "X"
    ));

    let cycle: Vec<(&str, &[String])> = vec![("C", none.as_slice()), ("A", on_b.as_slice()), ("B", on_a.as_slice())];
    match start_order(&cycle) {
        Err(SupervisorError::DependencyCycle { members }) => {
            assert_eq!(members, vec!["A".to_string(), "B".to_string()]);
        }
        other => panic!("expected cycle, got {:?}", other),
    }

    let duplicate: Vec<(&str, &[String])> = vec![("A", none.as_slice()), ("A", none.as_slice())];
    assert!(matches!(
        start_order(&duplicate),
        Err(SupervisorError::DuplicateSubsystem { .. })
    ));
}

#[tokio::test]
async fn test_cycle_rejected_before_anything_starts() {
    let log = new_log();
    let controller = Arc::new(ChannelController::new());
    let mut sup = supervisor(&controller);
    sup.register(Arc::new(FakeSubsystem::new("A", &log).after("B")));
    sup.register(Arc::new(FakeSubsystem::new("B", &log).after("A")));

    let err = sup.start_all(empty_pipeline(&controller)).await.unwrap_err();
    assert!(matches!(err, SupervisorError::DependencyCycle { .. }));
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_reverse_order_shutdown() {
    let log = new_log();
    let controller = Arc::new(ChannelController::new());
    let mut sup = supervisor(&controller);
    sup.register(Arc::new(FakeSubsystem::new("B", &log).after("A")));
    sup.register(Arc::new(FakeSubsystem::new("A", &log)));
    sup.register(Arc::new(FakeSubsystem::new("C", &log)));

    sup.start_all(empty_pipeline(&controller)).await.unwrap();
    assert!(sup.is_running());
    assert_eq!(sup.supervised(), vec!["A", "B", "C"]);

    let report = sup.shutdown().await;
    assert!(!controller.engine_on());
    assert_eq!(report.stopped, vec!["C", "B", "A"]);
    assert_eq!(
        entries(&log),
        vec!["start:A", "start:B", "start:C", "stop:C", "stop:B", "stop:A"]
    );
}

#[tokio::test]
async fn test_start_failure_rolls_back() {
    let log = new_log();
    let controller = Arc::new(ChannelController::new());
    let mut sup = supervisor(&controller);
    sup.register(Arc::new(FakeSubsystem::new("A", &log)));
    sup.register(Arc::new(FakeSubsystem::new("B", &log).failing()));
    sup.register(Arc::new(FakeSubsystem::new("C", &log).after("B")));
    sup.register(Arc::new(FakeSubsystem::new("D", &log)));

    let err = sup.start_all(empty_pipeline(&controller)).await.unwrap_err();
    match &err {
        SupervisorError::StartFailed { id, source } => {
            assert_eq!(id, "B");
            assert_eq!(source.to_string(), "port already in use");
        }
        other => panic!("expected StartFailed, got {:?}", other),
    }
    assert!(err.to_string().contains("B"));

    // Nothing after B started; A was stopped again
    assert_eq!(entries(&log), vec!["start:A", "start:B", "stop:A"]);
    assert!(!controller.engine_on());
    assert!(!sup.is_running());

    // Shutdown after a failed start is a no-op
    let report = sup.shutdown().await;
    assert!(report.stopped.is_empty());
    assert_eq!(entries(&log).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_stop_does_not_block_shutdown() {
    let log = new_log();
    let controller = Arc::new(ChannelController::new());
    let settings = SupervisorSettings {
        stop_timeout: Duration::from_millis(500),
        ..SupervisorSettings::default()
    };
    let mut sup = Supervisor::new(controller.clone(), settings);
    sup.register(Arc::new(FakeSubsystem::new("A", &log)));
    sup.register(Arc::new(FakeSubsystem::new("B", &log).hanging()));

    sup.start_all(empty_pipeline(&controller)).await.unwrap();
    let report = sup.shutdown().await;

    assert_eq!(report.timed_out, vec!["B"]);
    assert_eq!(report.stopped, vec!["A"]);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let log = new_log();
    let controller = Arc::new(ChannelController::new());
    let mut sup = supervisor(&controller);
    sup.register(Arc::new(FakeSubsystem::new("A", &log)));

    sup.start_all(empty_pipeline(&controller)).await.unwrap();
    let first = sup.shutdown().await;
    let second = sup.shutdown().await;

    assert_eq!(first.stopped, vec!["A"]);
    assert!(second.stopped.is_empty());
    assert_eq!(entries(&log), vec!["start:A", "stop:A"]);
}

#[tokio::test]
async fn test_second_start_is_refused() {
    let controller = Arc::new(ChannelController::new());
    let mut sup = supervisor(&controller);
    sup.start_all(empty_pipeline(&controller)).await.unwrap();

    let err = sup.start_all(empty_pipeline(&controller)).await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyStarted));
    sup.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_joins_listener_loops() {
    let controller = Arc::new(ChannelController::new());
    let (listener, feed) = TextListener::new("pc");
    let pipeline = empty_pipeline(&controller).with_listener(Box::new(listener));

    let mut sup = supervisor(&controller);
    sup.start_all(pipeline).await.unwrap();

    assert!(feed.push("hello"));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let report = sup.shutdown().await;
    assert!(report.pipeline.abandoned.is_empty());
    assert_eq!(report.pipeline.summaries.len(), 1);
    assert_eq!(report.pipeline.summaries[0].forwarded, 1);
}

#[tokio::test]
async fn test_queued_messages_reach_running_mother_on_shutdown() {
    let controller = Arc::new(ChannelController::new());
    let mother = Arc::new(StubEngine::new(MOTHER_ENGINE_ID, "Mother"));
    let pipeline = Pipeline::new(controller.clone(), mother.clone(), &PipelineSettings::default());
    let gateway = pipeline.gateway();
    let metrics = pipeline.metrics();

    let mut sup = supervisor(&controller);
    sup.register(mother.clone());
    sup.start_all(pipeline).await.unwrap();

    // Fill the queue without yielding, so the dispatcher has delivered nothing yet
    let queued = gateway.capacity();
    for i in 0..queued {
        let message =
            UnifiedMessage::create(InputType::Text, Payload::Text(format!("m{}", i)), "pc").unwrap();
        gateway.try_forward(message).unwrap();
    }

    let report = sup.shutdown().await;
    assert_eq!(report.stopped, vec![MOTHER_ENGINE_ID]);

    let snap = metrics.snapshot();
    assert_eq!(snap.gateway.forwarded, queued as u64);
    assert_eq!(snap.gateway.delivered + snap.gateway.failed, snap.gateway.forwarded);
    assert_eq!(snap.gateway.delivered, queued as u64);
    assert_eq!(snap.gateway.failed, 0);
    assert_eq!(mother.received_count(), queued as u64);
    assert_eq!(mother.is_running(), Some(false));
}

#[tokio::test]
async fn test_standard_roster_plan() {
    let controller = Arc::new(ChannelController::new());
    let mut sup = supervisor(&controller);
    let engines = build_roster(&standard_roster());
    for engine in &engines {
        sup.register(engine.clone());
    }

    let plan = sup.plan().unwrap();
    assert_eq!(
        plan,
        vec!["ENGINE_003", "ENGINE_004", "ENGINE_005", "ENGINE_006", MOTHER_ENGINE_ID]
    );

    sup.start_all(empty_pipeline(&controller)).await.unwrap();
    assert!(engines.iter().all(|e| e.is_running() == Some(true)));

    let report = sup.check_now();
    assert!(report.is_healthy());
    // Five engines plus the pipeline itself
    assert_eq!(report.subsystems.len(), 6);

    sup.shutdown().await;
    assert!(engines.iter().all(|e| e.is_running() == Some(false)));
}

#[test]
fn test_admin_command_parsing() {
    assert_eq!("engine off".parse::<AdminCommand>(), Ok(AdminCommand::Engine(false)));
    assert_eq!("TEXT on".parse::<AdminCommand>(), Ok(AdminCommand::Channel(InputType::Text, true)));
    assert_eq!("signals off".parse::<AdminCommand>(), Ok(AdminCommand::Channel(InputType::Signal, false)));
    assert_eq!(" stop-all ".parse::<AdminCommand>(), Ok(AdminCommand::StopAll));
    assert_eq!("start-all".parse::<AdminCommand>(), Ok(AdminCommand::StartAll));
    assert_eq!("status".parse::<AdminCommand>(), Ok(AdminCommand::Status));

    assert_eq!("".parse::<AdminCommand>(), Err(AdminError::Empty));
    assert_eq!(
        "audio maybe".parse::<AdminCommand>(),
        Err(AdminError::BadSwitch("maybe".into()))
    );
    assert!(matches!(
        "reboot now".parse::<AdminCommand>(),
        Err(AdminError::Unknown(_))
    ));
    assert!(matches!(
        "status please".parse::<AdminCommand>(),
        Err(AdminError::Unknown(_))
    ));
}

#[test]
fn test_admin_command_apply() {
    let controller = ChannelController::new();

    let effect = AdminCommand::Channel(InputType::Audio, false).apply(&controller);
    assert!(matches!(effect, AdminEffect::Applied(_)));
    assert!(!controller.is_enabled(InputType::Audio));
    assert!(controller.is_enabled(InputType::Text));

    AdminCommand::Engine(false).apply(&controller);
    assert!(!controller.engine_on());

    assert_eq!(AdminCommand::StopAll.apply(&controller), AdminEffect::StopAll);
    assert_eq!(AdminCommand::Status.apply(&controller), AdminEffect::Status);
    assert_eq!(AdminCommand::Channel(InputType::Event, true).to_string(), "event on");
}
