//! `framebox` — drive the media player against the simulated engine.
//!
//! Subcommands:
//! - `demo`: open a synthetic clip, play it at wall-clock pace, log state
//!   changes and frame flow, and print a final status snapshot.
//! - `probe`: ask the discoverer about a synthetic clip and print the answer.
//! - `stress`: flood the frame mailbox from a producer thread and report how
//!   the single-slot backpressure accounted for every frame.

mod cli;

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use framebox::adapter::VideoFormat;
use framebox::discover::MediaInfo;
use framebox::mailbox::VideoFrame;
use framebox::player::Player;
use framebox::sim::SimBackend;
use tracing_subscriber::EnvFilter;

const CLIP_URI: &str = "file:///demo/clip.mov";

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,framebox=info")),
        )
        .init();

    match &args.cmd {
        cli::Command::Demo(demo) => run_demo(args.tick_hz, demo),
        cli::Command::Probe(clip) => run_probe(clip),
        cli::Command::Stress(stress) => run_stress(args.tick_hz, stress),
    }
}

fn run_demo(tick_hz: f64, demo: &cli::DemoArgs) -> Result<()> {
    let backend = SimBackend::live();
    backend.register(clip_info(&demo.clip));

    let mut player = Player::new(Box::new(backend));
    let frames = Rc::new(RefCell::new(0u64));
    let ended = Rc::new(RefCell::new(false));

    {
        let frames = frames.clone();
        player.on_frame(move |f| {
            let mut n = frames.borrow_mut();
            *n += 1;
            if *n == 1 {
                tracing::info!(
                    width = f.width(),
                    height = f.height(),
                    bytes = f.len(),
                    "first frame"
                );
            }
        });
    }
    player.on_state_change(|old, new| tracing::info!(%old, %new, "state changed"));
    player.on_error(|e| tracing::error!("player error: {e}"));
    {
        let ended = ended.clone();
        player.on_stream_end(move || {
            tracing::info!("end of stream");
            *ended.borrow_mut() = true;
        });
    }

    if !player.open(CLIP_URI) {
        anyhow::bail!("open failed; see the log above");
    }
    player.set_looping(demo.looping);
    if demo.mute {
        player.set_mute(true);
    }
    player.play();
    if demo.rate != 1.0 {
        player.set_rate(demo.rate);
    }

    let quit = quit_channel();
    let interval = tick_interval(tick_hz);
    let started = Instant::now();
    let mut seek_pending = demo.seek_to;

    loop {
        match quit.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("interrupted");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        player.update();

        if let Some(seconds) = seek_pending {
            if started.elapsed().as_secs_f64() >= demo.seek_at {
                tracing::info!(seconds, "seeking");
                player.set_time(seconds);
                seek_pending = None;
            }
        }
        if *ended.borrow() && !demo.looping {
            break;
        }
        if demo.run_for > 0.0 && started.elapsed().as_secs_f64() >= demo.run_for {
            break;
        }
    }

    // One more poll so the end-of-stream pause settles into the snapshot.
    player.update();
    println!("{}", serde_json::to_string_pretty(&player.snapshot())?);
    tracing::info!(frames = *frames.borrow(), "done");
    Ok(())
}

fn run_probe(clip: &cli::ClipArgs) -> Result<()> {
    let backend = SimBackend::new();
    backend.register(clip_info(clip));

    let player = Player::new(Box::new(backend));
    let info = player.probe(CLIP_URI)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn run_stress(tick_hz: f64, stress: &cli::StressArgs) -> Result<()> {
    let backend = SimBackend::new();
    backend.register(MediaInfo::video(CLIP_URI, 64, 64, 30.0, 600.0));
    let rig = backend.handle();

    let mut player = Player::new(Box::new(backend));
    if !player.open(CLIP_URI) {
        anyhow::bail!("open failed; see the log above");
    }
    player.update();
    player.play();

    let (done_tx, done_rx) = bounded::<()>(1);
    let frames = stress.frames;
    let producer = {
        let rig = rig.clone();
        thread::spawn(move || {
            for _ in 0..frames {
                rig.produce_frame(VideoFrame::blank(64, 64, VideoFormat::Bgra));
                thread::sleep(Duration::from_micros(50));
            }
            let _ = done_tx.send(());
        })
    };

    let quit = quit_channel();
    let interval = tick_interval(tick_hz);
    loop {
        player.update();
        if done_rx.try_recv().is_ok() {
            break;
        }
        match quit.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    let _ = producer.join();
    // The slot can still hold one last frame.
    player.update();

    println!("{}", serde_json::to_string_pretty(&player.snapshot())?);
    Ok(())
}

fn clip_info(clip: &cli::ClipArgs) -> MediaInfo {
    MediaInfo::video(CLIP_URI, clip.width, clip.height, clip.fps, clip.seconds)
}

fn quit_channel() -> Receiver<()> {
    let (tx, rx) = bounded(1);
    let _ = ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    });
    rx
}

fn tick_interval(tick_hz: f64) -> Duration {
    let hz = if tick_hz.is_finite() && tick_hz > 0.0 {
        tick_hz
    } else {
        60.0
    };
    Duration::from_secs_f64(1.0 / hz)
}
