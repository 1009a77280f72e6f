//! lumberd - run one synthetic pipeline under the admin surface
//!
//! The daemon shell around the pipeline library: a fake input generates
//! records at a configured rate, events flow through the full plane into
//! the chosen sink, and the admin API serves status, metrics, and
//! samples. Doubles as the load and smoke harness; real deployments
//! embed the library crates with their own inputs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use lumber_api::PipelineRegistry;
use lumber_decoder::DecoderKind;
use lumber_pipeline::{
    InputPluginInfo, OutputPluginInfo, Pipeline, Settings, SourceId, DEFAULT_CAPACITY,
};
use lumber_plugins::input::FakeInput;
use lumber_plugins::output::{DevNullOutput, FileOutput, FileOutputConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sink {
    /// Commit everything immediately
    Devnull,
    /// Batched newline-delimited file writer with rotation
    File,
}

fn parse_decoder(s: &str) -> Result<DecoderKind, String> {
    s.parse().map_err(|e: lumber_decoder::DecodeError| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "lumberd", version, about)]
struct Args {
    /// Admin API listen address
    #[arg(long, default_value = "127.0.0.1:5000")]
    http: SocketAddr,

    /// Event pool capacity (back-pressure width)
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Intake decoder: auto, json, raw, cri, postgres
    #[arg(long, default_value = "auto", value_parser = parse_decoder)]
    decoder: DecoderKind,

    /// Intake bursts per maintenance tick before a source is banned;
    /// 0 disables the antispam filter
    #[arg(long, default_value_t = 0)]
    antispam: u64,

    /// Promote decode and runtime errors to fatal
    #[arg(long)]
    strict: bool,

    /// Synthetic records per second
    #[arg(long, default_value_t = 10_000)]
    rate: u64,

    /// Where events go
    #[arg(long, value_enum, default_value = "devnull")]
    sink: Sink,

    /// Target file for the file sink
    #[arg(long, default_value = "logs/lumber.log")]
    target_file: PathBuf,
}

fn spawn_generator(input: Arc<FakeInput>, rate: u64, stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        const TICK: Duration = Duration::from_millis(10);
        let per_tick = (rate / 100).max(1);
        let mut offset: i64 = 0;

        while !stop.load(Ordering::Relaxed) {
            for _ in 0..per_tick {
                let stream = if offset % 2 == 0 { "stdout" } else { "stderr" };
                let record = format!(
                    r#"{{"level":"info","message":"synthetic record {offset}","stream":"{stream}"}}"#
                );
                input.ingest(SourceId(1), "synthetic", offset, record.as_bytes());
                offset += 1;
            }
            thread::sleep(TICK);
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let settings = Settings {
        decoder: args.decoder,
        capacity: args.capacity,
        antispam_threshold: args.antispam,
        is_strict: args.strict,
        ..Default::default()
    };

    let pipeline = Pipeline::new("synthetic", settings);
    let input = Arc::new(FakeInput::new());
    pipeline.set_input(InputPluginInfo::new("fake", input.clone()));

    match args.sink {
        Sink::Devnull => {
            pipeline.set_output(OutputPluginInfo::new("devnull", Arc::new(DevNullOutput::new())));
        }
        Sink::File => {
            let output = FileOutput::new(FileOutputConfig {
                target_file: args.target_file.clone(),
                ..Default::default()
            });
            pipeline.set_output(OutputPluginInfo::new("file", Arc::new(output)));
        }
    }

    pipeline.start();

    let stop = Arc::new(AtomicBool::new(false));
    spawn_generator(input, args.rate, Arc::clone(&stop));

    let registry = PipelineRegistry::new();
    registry.register(Arc::clone(&pipeline));

    tokio::select! {
        result = lumber_api::serve(args.http, registry) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    stop.store(true, Ordering::Relaxed);
    pipeline.stop();
    Ok(())
}
