use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use arbiter::{Arbiter, ArbiterConfig, ArbiterError, ArbitrationMode, FrameSource};
use messages::{
    read_message, send_message, ArbitrationErrorKind, ArbitrationRequest, ArbitrationResponse,
    PredictionMsg,
};
use nalgebra::Vector2;

use crate::feed::{FeedHandle, PredictionFeed};
use crate::vision_client::VisionClient;

mod feed;
mod vision_client;

struct Args {
    vision_addr: String,
    listen_addr: String,
    feed_addr: String,
    config: ArbiterConfig,
}

fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = parse_args()?;

    let arbiter = Arc::new(Arbiter::new(args.config)?);

    log::info!("Connecting to vision service at {}", args.vision_addr);
    let mut box_sensor = VisionClient::connect(&args.vision_addr)?;
    let mut coord_provider = VisionClient::connect(&args.vision_addr)?;
    let mut scorer = VisionClient::connect(&args.vision_addr)?;
    let mut frame_source = VisionClient::connect(&args.vision_addr)?;

    let feed = PredictionFeed::listen(&args.feed_addr)?;

    // Publish an initial frame so the visualizer has something to draw on.
    frame_source.refresh()?;

    {
        let arbiter = arbiter.clone();
        let mut sink = feed.handle();
        thread::spawn(move || {
            arbiter.run_sampling(&mut box_sensor, &mut coord_provider, &mut scorer, &mut sink);
            log::info!("Replenishment loop stopped");
        });
    }

    let listener = TcpListener::bind(&args.listen_addr)?;
    log::info!("Serving arbitration requests on {}", args.listen_addr);

    let mut sink = feed.handle();
    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("Failed to accept arbitration connection: {e}");
                continue;
            }
        };
        if let Err(e) = serve_connection(&arbiter, &mut stream, &mut frame_source, &mut sink) {
            log::debug!("Arbitration connection closed: {e}");
        }
    }

    Ok(())
}

fn serve_connection(
    arbiter: &Arbiter,
    stream: &mut TcpStream,
    frame_source: &mut impl FrameSource,
    sink: &mut FeedHandle,
) -> anyhow::Result<()> {
    loop {
        let request: ArbitrationRequest = read_message(stream)?;
        let mode = match request.mode {
            messages::ArbitrationMode::Classic => ArbitrationMode::Classic,
            messages::ArbitrationMode::WithoutInvalidation => ArbitrationMode::WithoutInvalidation,
            messages::ArbitrationMode::JustInvalidation => ArbitrationMode::JustInvalidation,
        };

        let response = match arbiter.handle_request(mode, frame_source, sink) {
            Ok(Some(candidate)) => ArbitrationResponse::Prediction(PredictionMsg {
                x: candidate.position.x,
                y: candidate.position.y,
                proba: candidate.probability,
            }),
            Ok(None) => ArbitrationResponse::NoSelection,
            Err(e) => {
                log::warn!("Arbitration request failed: {e}");
                ArbitrationResponse::Error {
                    kind: error_kind(&e),
                    message: e.to_string(),
                }
            }
        };
        send_message(stream, &response)?;
    }
}

fn error_kind(error: &ArbiterError) -> ArbitrationErrorKind {
    match error {
        ArbiterError::EmptyStore => ArbitrationErrorKind::EmptyStore,
        ArbiterError::SelectionTimeout { .. } => ArbitrationErrorKind::SelectionTimeout,
        _ => ArbitrationErrorKind::Other,
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut vision_addr = None;
    let mut listen_addr = "0.0.0.0:7300".to_string();
    let mut feed_addr = "0.0.0.0:7301".to_string();
    let mut config = ArbiterConfig::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listen" => listen_addr = next_value(&mut args, &arg)?,
            "--feed" => feed_addr = next_value(&mut args, &arg)?,
            "--invalidation-radius" => {
                config.invalidation_radius = next_value(&mut args, &arg)?.parse()?;
            }
            "--fixed-point" => {
                config.fixed_invalidation_point = parse_point(&next_value(&mut args, &arg)?)?;
            }
            "--confidence-threshold" => {
                config.confidence_threshold = next_value(&mut args, &arg)?.parse()?;
            }
            "--selection-timeout-secs" => {
                config.selection_timeout =
                    Duration::from_secs(next_value(&mut args, &arg)?.parse()?);
            }
            _ if vision_addr.is_none() => vision_addr = Some(arg),
            _ => anyhow::bail!("Unknown argument: {arg}"),
        }
    }

    Ok(Args {
        vision_addr: vision_addr.context("Usage: picknode VISION_ADDR [options]")?,
        listen_addr,
        feed_addr,
        config,
    })
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("Missing value for {flag}"))
}

fn parse_point(value: &str) -> anyhow::Result<Vector2<i64>> {
    let (x, y) = value
        .split_once(',')
        .context("Point must be given as X,Y")?;
    Ok(Vector2::new(x.trim().parse()?, y.trim().parse()?))
}

fn setup_logging() {
    simple_log::quick!();
}
