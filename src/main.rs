use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use ringbuf::{HeapCons, HeapProd};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use uig::audio::{sample_ring, AudioListener};
use uig::channels::{EventListener, SignalListener, SignalReading, SystemEvent, TextListener};
use uig::channels::event::DEFAULT_EVENT_DEVICE;
use uig::channels::signal::DEFAULT_SIGNAL_DEVICE;
use uig::channels::text::DEFAULT_TEXT_DEVICE;
use uig::config::AudioConfig;
use uig::engines::{build_roster, StubIngress, MOTHER_ENGINE_ID};
use uig::kernel::gateway::Ingress;
use uig::kernel::{AdminCommand, AdminEffect};
use uig::supervisor::Subsystem;
use uig::{ChannelController, HarnessConfig, InputType, Pipeline, Supervisor};

const HEARTBEAT_SECS: u64 = 5;

/// Unified input gateway harness.
#[derive(Debug, Parser)]
#[command(name = "uig", version, about)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, env = "UIG_CONFIG")]
    config: Option<PathBuf>,

    /// Do not open the microphone or run the audio channel.
    #[arg(long)]
    no_audio: bool,

    /// Start with a channel gated off (text, audio, events, signals).
    #[arg(long = "disable", value_name = "CHANNEL")]
    disable: Vec<InputType>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Setup Logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("uig=info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    // 2. Config + Controller
    let config = HarnessConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let mut flags = config.channels;
    for kind in &cli.disable {
        flags.set(*kind, false);
    }
    let controller = Arc::new(ChannelController::with_channels(flags));
    info!("UIG harness booting. Channels: {:?}", flags);

    // 3. Engines (the mother engine doubles as the gateway's ingress)
    let engines = build_roster(&config.engines);
    let ingress: Arc<dyn Ingress> = match engines
        .iter()
        .find(|e| Subsystem::id(&***e) == MOTHER_ENGINE_ID)
    {
        Some(mother) => mother.clone() as Arc<dyn Ingress>,
        None => {
            warn!("{} not in roster, forwarding to a discarding stub", MOTHER_ENGINE_ID);
            Arc::new(StubIngress::discarding(MOTHER_ENGINE_ID))
        }
    };

    let mut supervisor = Supervisor::new(controller.clone(), config.supervisor_settings());
    for engine in &engines {
        supervisor.register(engine.clone());
    }

    // 4. Listeners
    let mut pipeline = Pipeline::new(controller.clone(), ingress, &config.pipeline_settings());

    let (text_listener, text_feed) = TextListener::new(DEFAULT_TEXT_DEVICE);
    pipeline.add_listener(Box::new(text_listener));

    let (event_listener, event_tap) = EventListener::new(DEFAULT_EVENT_DEVICE);
    pipeline.add_listener(Box::new(event_listener));

    let (signal_listener, signal_tap) = SignalListener::new(DEFAULT_SIGNAL_DEVICE);
    pipeline.add_listener(Box::new(signal_listener));

    // Held for the whole run: dropping it ends the audio channel.
    let mut _audio_source = None;
    if !cli.no_audio {
        let (source, consumer, rate) = open_audio(&config.audio);
        _audio_source = Some(source);

        let audio = AudioListener::new(
            consumer,
            config.audio.source_device.clone(),
            rate,
            config.audio.window_secs,
        )
        .with_voice_gate(config.audio.voice_gate);
        pipeline.add_listener(Box::new(audio));
    }

    // 5. Start everything
    supervisor
        .start_all(pipeline)
        .await
        .context("harness startup failed")?;

    let started = SystemEvent::new("harness.started").with_attribute("engines", engines.len() as u64);
    if !event_tap.emit(started) {
        warn!("Startup event dropped");
    }

    // 6. Signal heartbeat
    let booted = Instant::now();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(HEARTBEAT_SECS));
        loop {
            ticker.tick().await;
            let uptime = booted.elapsed().as_secs_f64();
            // A full feed (signals gated off) just skips this beat.
            signal_tap.emit(SignalReading::new("harness.uptime", uptime).with_unit("s"));
        }
    });

    // 7. Stdin: plain lines are text input, `:` lines are admin commands
    let (admin_tx, mut admin_rx) = mpsc::channel::<AdminCommand>(16);
    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let mut lines = reader.lines();

        println!("Type to send text. Admin: ':status', ':text off', ':engine off', ':stop-all'.");

        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(command) = line.trim().strip_prefix(':') {
                match command.parse::<AdminCommand>() {
                    Ok(cmd) => {
                        if admin_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring admin command: {}", e),
                }
                continue;
            }
            if !text_feed.push(line) {
                warn!("Text input dropped, feed full or closed");
            }
        }
    });

    // 8. Run until Ctrl+C, `:stop-all` or the master switch goes off
    info!("UIG harness active. Press Ctrl+C to stop.");
    let mut check = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!("Ctrl+C handler failed: {}", e);
                }
                info!("Interrupt received");
                break;
            }
            Some(cmd) = admin_rx.recv() => match cmd.apply(&controller) {
                AdminEffect::Applied(change) => info!("Admin: {}", change),
                AdminEffect::StartAll => info!("Admin: already running"),
                AdminEffect::StopAll => {
                    info!("Admin: stop-all");
                    break;
                }
                AdminEffect::Status => {
                    let report = supervisor.check_now();
                    for sub in &report.subsystems {
                        info!("  {:<24} {}", sub.id, sub.liveness.label());
                    }
                }
            },
            _ = check.tick() => {
                if !controller.engine_on() {
                    info!("Master switch is off");
                    break;
                }
            }
        }
    }

    // 9. Orderly shutdown
    let report = supervisor.shutdown().await;
    for summary in &report.pipeline.summaries {
        info!(
            listener = %summary.listener,
            forwarded = summary.forwarded,
            forward_failures = summary.forward_failures,
            capture_errors = summary.capture_errors,
            "Listener summary"
        );
    }
    if !report.failed.is_empty() || !report.timed_out.is_empty() {
        warn!(failed = ?report.failed, timed_out = ?report.timed_out, "Some subsystems did not stop cleanly");
    }
    Ok(())
}

/// Whatever feeds the audio ring. Only held, never read.
#[allow(dead_code)]
enum AudioSource {
    #[cfg(feature = "mic")]
    Mic(uig::audio::MicCapture),
    Idle(HeapProd<f32>),
}

#[cfg(feature = "mic")]
fn open_audio(audio: &AudioConfig) -> (AudioSource, HeapCons<f32>, u32) {
    match uig::audio::MicCapture::open(audio.sample_rate, audio.buffer_secs) {
        Ok((mic, consumer)) => {
            let rate = mic.sample_rate;
            (AudioSource::Mic(mic), consumer, rate)
        }
        Err(e) => {
            warn!("Microphone unavailable, audio channel stays silent: {}", e);
            idle_audio(audio)
        }
    }
}

#[cfg(not(feature = "mic"))]
fn open_audio(audio: &AudioConfig) -> (AudioSource, HeapCons<f32>, u32) {
    info!("Built without the `mic` feature, audio channel stays silent");
    idle_audio(audio)
}

fn idle_audio(audio: &AudioConfig) -> (AudioSource, HeapCons<f32>, u32) {
    let (producer, consumer) = sample_ring(audio.sample_rate, audio.buffer_secs);
    (AudioSource::Idle(producer), consumer, audio.sample_rate)
}
