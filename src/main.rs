// src/main.rs
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{debug, error, info, warn};

use rewind_node::api::start_file_server;
use rewind_node::config::{self, Config, SourceKind};
use rewind_node::recorder::{FlushTrigger, Recorder, flush_channel};
use rewind_node::sink::FfmpegSink;
use rewind_node::source::{FfmpegSource, FrameSource, PatternSource};
use rewind_node::storage::StorageManager;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".into());

    let cfg: Config = config::load(&cfg_path)?;
    info!("[rewind] loaded {}", cfg_path);

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("[rewind] shutdown requested");
            r.store(false, Ordering::SeqCst);
        })?;
    }

    // ------------------------------------------------------------
    // Recorder
    // ------------------------------------------------------------
    let recording = cfg.recording_config()?;
    std::fs::create_dir_all(recording.output_path())
        .with_context(|| format!("creating {:?}", recording.output_path()))?;

    let sink = FfmpegSink::new(cfg.sink.ffmpeg_bin.clone(), cfg.sink.codec.clone());
    let recorder = Arc::new(Recorder::new(recording.clone(), Box::new(sink)));

    let (trigger, requests) = flush_channel();

    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    workers.push(start_ingest(&cfg, recorder.clone(), running.clone()));

    {
        let recorder = recorder.clone();
        let running = running.clone();
        workers.push(thread::spawn(move || {
            let tally = recorder.serve_flushes(&requests, &running);
            info!(
                "[recorder] flush requests: {} ({} ok, {} failed)",
                tally.requested, tally.succeeded, tally.failed
            );
        }));
    }

    start_keyboard(trigger, running.clone());

    // ------------------------------------------------------------
    // Storage hygiene
    // ------------------------------------------------------------
    if cfg.storage.enabled {
        let manager = StorageManager::new(recording.output_path(), cfg.storage_policy()?)?;
        let interval = cfg.storage_interval();
        let running = running.clone();
        workers.push(thread::spawn(move || {
            manager.run_periodic(interval, &running);
        }));
    }

    // ------------------------------------------------------------
    // HTTP
    // ------------------------------------------------------------
    let server = if cfg.http.enabled {
        Some(start_file_server(
            &cfg.http.bind,
            recording.output_path().clone(),
        )?)
    } else {
        None
    };

    // ------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------
    info!("[rewind] running – 'r' + Enter saves the last {}s, 'q' quits", recording.window_seconds());

    let mut last_stats = Instant::now();

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));

        if last_stats.elapsed() >= Duration::from_secs(5) {
            let stats = recorder.stats();
            debug!(
                "[rewind] state={:?} ingested={} ring={}/{} flushes ok={} failed={}",
                stats.state,
                stats.frames_ingested,
                stats.ring.len,
                stats.ring.capacity,
                stats.flushes_ok,
                stats.flushes_failed
            );
            last_stats = Instant::now();
        }
    }

    // ------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------
    info!("[rewind] shutting down…");
    if let Some(server) = server {
        server.stop();
    }
    for worker in workers {
        if worker.join().is_err() {
            warn!("[rewind] worker thread panicked");
        }
    }
    info!("[rewind] bye");
    Ok(())
}

fn start_ingest(cfg: &Config, recorder: Arc<Recorder>, running: Arc<AtomicBool>) -> JoinHandle<()> {
    let r = cfg.recorder.clone();
    let kind = cfg.source.kind;
    let ffmpeg_bin = cfg.source.ffmpeg_bin.clone();

    thread::spawn(move || {
        let mut source: Box<dyn FrameSource> = match kind {
            SourceKind::Pattern => Box::new(PatternSource::paced(r.cam_width, r.cam_height, r.fps)),
            SourceKind::Ffmpeg => {
                match FfmpegSource::open(&ffmpeg_bin, &r.ip_address, r.cam_width, r.cam_height, r.fps) {
                    Ok(s) => Box::new(s),
                    Err(e) => {
                        // ohne Kamera läuft nur noch Storage/HTTP
                        error!("[recorder] {}", e);
                        return;
                    }
                }
            }
        };

        match recorder.run_ingest(source.as_mut(), &running) {
            Ok(frames) => info!("[recorder] ingestion finished after {} frames", frames),
            Err(e) => warn!("[recorder] ingestion ended: {}", e),
        }
    })
}

/// `r` + Enter fires a flush, `q` + Enter quits. The reader thread is never
/// joined since stdin blocks.
fn start_keyboard(trigger: FlushTrigger, running: Arc<AtomicBool>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "r" => {
                    if !trigger.fire() {
                        break;
                    }
                }
                "q" => {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                "" => {}
                other => debug!("[rewind] unknown command '{}'", other),
            }
        }
    });
}
