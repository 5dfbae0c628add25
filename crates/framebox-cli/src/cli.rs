use clap::{Parser, Subcommand};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "framebox", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Host tick rate in Hz (how often the player is polled)
    #[arg(long, default_value_t = 60.0)]
    pub tick_hz: f64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a synthetic clip at wall-clock pace and log what happens
    Demo(DemoArgs),

    /// Ask the discoverer about a synthetic clip and print the answer
    Probe(ClipArgs),

    /// Flood the frame mailbox from a producer thread and report the
    /// drop accounting
    Stress(StressArgs),
}

#[derive(clap::Args, Debug)]
pub struct ClipArgs {
    /// Clip length in seconds
    #[arg(long, default_value_t = 5.0)]
    pub seconds: f64,

    /// Clip frame rate
    #[arg(long, default_value_t = 30.0)]
    pub fps: f32,

    /// Frame width in pixels
    #[arg(long, default_value_t = 320)]
    pub width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 240)]
    pub height: u32,
}

#[derive(clap::Args, Debug)]
pub struct DemoArgs {
    #[command(flatten)]
    pub clip: ClipArgs,

    /// Restart from the beginning at end of stream
    #[arg(long)]
    pub looping: bool,

    /// Start muted
    #[arg(long)]
    pub mute: bool,

    /// Playback rate (negative plays backwards, 0 is ignored)
    #[arg(long, default_value_t = 1.0)]
    pub rate: f64,

    /// Seek to this position in seconds once --seek-at is reached
    #[arg(long)]
    pub seek_to: Option<f64>,

    /// Wall-clock second at which to issue the --seek-to seek
    #[arg(long, default_value_t = 1.0)]
    pub seek_at: f64,

    /// Stop after this many wall-clock seconds (0 = run until the clip ends)
    #[arg(long, default_value_t = 0.0)]
    pub run_for: f64,
}

#[derive(clap::Args, Debug)]
pub struct StressArgs {
    /// Frames to push as fast as the producer can
    #[arg(long, default_value_t = 500)]
    pub frames: u64,
}
