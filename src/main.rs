use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use frame_ring::config::DEFAULT_BITRATE;
use frame_ring::producer::{BufferFlags, EncodedBuffer, Recorder, SplitTarget, WriterSink};
use frame_ring::{
    CopiedRange, CopyOptions, FrameDescriptor, FrameType, RingConfig, SplitConfig,
    VideoRingBuffer,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Record a synthetic encoder into a circular buffer and extract the most
/// recent footage as a frame-aligned clip.
#[derive(Parser, Debug)]
#[command(name = "framering")]
#[command(about = "🎞️ Keep the last N seconds of video in memory and save a clip on demand")]
struct Args {
    /// Output file for the extracted clip
    #[arg(default_value = "clip.h264", help = "Where to write the extracted clip")]
    output: PathBuf,

    /// Buffer capacity in bytes
    #[arg(long, conflicts_with = "buffer_seconds")]
    size: Option<usize>,

    /// Buffer capacity in seconds of video at --bitrate (default 20)
    #[arg(long)]
    buffer_seconds: Option<u64>,

    /// Expected encoder bitrate in bits per second
    #[arg(long, default_value_t = DEFAULT_BITRATE)]
    bitrate: u64,

    /// How long to record: 30s, 2m, 1h
    #[arg(short, long, default_value = "10s")]
    duration: String,

    /// Frames per second
    #[arg(short = 'f', long, default_value_t = 30)]
    fps: u32,

    /// Frames between key frames
    #[arg(long, default_value_t = 30)]
    intra_period: u32,

    /// Average encoded size of an inter frame in bytes
    #[arg(long, default_value_t = 8192)]
    frame_bytes: usize,

    /// Extract only the last N seconds
    #[arg(long, conflicts_with_all = ["last_frames", "last_bytes"])]
    last_seconds: Option<f64>,

    /// Extract only the last N frames
    #[arg(long, conflicts_with = "last_bytes")]
    last_frames: Option<u64>,

    /// Extract only the last N bytes
    #[arg(long)]
    last_bytes: Option<usize>,

    /// Kind of frame the clip should start on
    #[arg(long, value_enum, default_value_t = StartOn::Header)]
    start_on: StartOn,

    /// Halfway through, switch the live stream to this file and extract the
    /// footage recorded before the switch
    #[arg(long)]
    split: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StartOn {
    Header,
    KeyFrame,
    Any,
}

impl StartOn {
    fn frame_type(self) -> Option<FrameType> {
        match self {
            Self::Header => Some(FrameType::Header),
            Self::KeyFrame => Some(FrameType::KeyFrame),
            Self::Any => None,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    output: &'a std::path::Path,
    #[serde(flatten)]
    copied: CopiedRange,
    split: Option<FrameDescriptor>,
    last_recorded: FrameDescriptor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let seconds = parse_duration(&args.duration)?;

    let buffer_seconds = match args.size {
        Some(_) => args.buffer_seconds,
        None => Some(args.buffer_seconds.unwrap_or(20)),
    };
    let ring_config = RingConfig::new(args.size, buffer_seconds, args.bitrate);
    let ring = Arc::new(VideoRingBuffer::from_config(&ring_config)?);

    let split_config = SplitConfig::new(args.intra_period, args.fps as f64);
    split_config.validate()?;
    let recorder = Recorder::new(Arc::clone(&ring), split_config);
    let splits = recorder.splits();

    info!(
        capacity = ring.size(),
        seconds,
        fps = args.fps,
        "recording synthetic stream"
    );
    let total_frames = seconds * args.fps as u64;
    let encoder = tokio::spawn(run_encoder(
        recorder,
        args.fps,
        args.intra_period,
        total_frames,
        args.frame_bytes,
    ));

    let split = match args.split.as_ref() {
        Some(path) => {
            tokio::time::sleep(Duration::from_secs_f64(seconds as f64 / 2.0)).await;
            let target = SplitTarget::video(WriterSink::new(File::create(path)?));
            let frame = tokio::task::spawn_blocking(move || splits.split(target)).await??;
            info!(index = frame.index, path = %path.display(), "live stream switched");
            Some(frame)
        }
        None => None,
    };

    let last_recorded = encoder.await??;

    let options = CopyOptions {
        size: args.last_bytes,
        seconds: args.last_seconds,
        frames: args.last_frames,
        first_frame_type: args.start_on.frame_type(),
    };
    let copied = ring.copy_to_path(&args.output, options)?;
    info!(written = copied.written, "clip saved");

    let report = Report {
        output: &args.output,
        copied,
        split,
        last_recorded,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Emits one header + key frame per intra period and fixed-size inter frames
/// in between, paced at `fps`. Key frames are delivered in two buffers.
async fn run_encoder(
    mut recorder: Recorder,
    fps: u32,
    intra_period: u32,
    total_frames: u64,
    frame_bytes: usize,
) -> Result<FrameDescriptor> {
    let frame_us = 1_000_000 / fps.max(1) as u64;
    let mut ticker = tokio::time::interval(Duration::from_micros(frame_us.max(1)));
    let mut since_key = intra_period;

    for n in 0..total_frames {
        ticker.tick().await;
        let pts = Some((n + 1) * frame_us);
        let fill = (n % 251) as u8;

        if since_key >= intra_period || recorder.take_key_frame_request() {
            since_key = 0;
            let header = BufferFlags {
                config: true,
                frame_end: true,
                ..Default::default()
            };
            recorder.on_buffer(EncodedBuffer::new(vec![0xffu8; 32], header, pts))?;

            let key = frame_bytes * 4;
            let head = BufferFlags {
                key_frame: true,
                ..Default::default()
            };
            recorder.on_buffer(EncodedBuffer::new(vec![fill; key / 2], head, pts))?;
            let tail = BufferFlags {
                frame_end: true,
                ..head
            };
            recorder.on_buffer(EncodedBuffer::new(vec![fill; key - key / 2], tail, pts))?;
        } else {
            let flags = BufferFlags {
                frame_end: true,
                ..Default::default()
            };
            recorder.on_buffer(EncodedBuffer::new(vec![fill; frame_bytes], flags, pts))?;
        }
        since_key += 1;
    }

    let eos = BufferFlags {
        end_of_stream: true,
        ..Default::default()
    };
    recorder.on_buffer(EncodedBuffer::new(Vec::new(), eos, None))?;
    recorder.finish()?;
    Ok(recorder.last_frame())
}

/// Parse duration string like "30s", "2m", "1h" into seconds
fn parse_duration(duration: &str) -> Result<u64> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(seconds);
    }

    let len = duration.len();
    if len < 2 {
        return Err(anyhow!("Invalid duration format: {}", duration));
    }

    let (num_str, unit) = duration.split_at(len - 1);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "s" => Ok(num),
        "m" => Ok(num * 60),
        "h" => Ok(num * 3600),
        _ => Err(anyhow!(
            "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
            unit
        )),
    }
}
