use std::process;

use clap::Parser;
use flv_push_engine::{PushReport, StreamPusher};
use rtmp::{RtmpConnection, RtmpUrl};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod error;

use cli::Args;
use error::AppError;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.quiet) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    match run(args).await {
        Ok(report) => {
            info!(
                packets = report.packets_sent,
                audio = report.audio_tags,
                video = report.video_tags,
                bytes = report.bytes_sent,
                last_timestamp_ms = report.last_timestamp,
                elapsed = ?report.elapsed,
                "Push finished"
            );
        }
        Err(e) => {
            let code = e.exit_code();
            if code == 130 {
                warn!("Push interrupted");
            } else {
                error!("Push failed: {}", e);
                eprintln!("Error: {e}");
            }
            process::exit(code);
        }
    }
}

async fn run(args: Args) -> Result<PushReport, AppError> {
    let destination = RtmpUrl::parse(&args.url)?;
    let rtmp_config = args.rtmp_config()?;
    let push_config = args.push_config();

    info!(
        destination = %destination,
        input = %args.input.display(),
        pacing = ?push_config.pacing,
        "Starting push"
    );

    let mut pusher = StreamPusher::new(RtmpConnection::new(rtmp_config), push_config);
    let token = pusher.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, stopping");
                token.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
        }
    });

    Ok(pusher.run(&args.url, &args.input).await?)
}

fn init_logging(verbose: bool, quiet: bool) -> Result<(), AppError> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .try_init()?;

    Ok(())
}
