use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Context;
use messages::{
    read_message, send_message, CoordConstraint, CoordPurpose, VisionRequest, VisionResponse,
};
use nalgebra::Vector2;
use rand::{thread_rng, Rng};

// Picking box bounds in pixels.
const BOX_MIN: Vector2<i64> = Vector2::new(100, 100);
const BOX_MAX: Vector2<i64> = Vector2::new(540, 380);

// Pixel-to-robot scale used for the fake coordinates.
const PIXEL_TO_METER: f64 = 0.001;

/// Objects still lying in the simulated picking box.
struct SimState {
    objects: Vec<Vector2<i64>>,
}

impl SimState {
    fn with_random_objects(count: usize) -> SimState {
        let mut rng = thread_rng();
        let objects = (0..count)
            .map(|_| {
                Vector2::new(
                    rng.gen_range(BOX_MIN.x..BOX_MAX.x),
                    rng.gen_range(BOX_MIN.y..BOX_MAX.y),
                )
            })
            .collect();

        SimState { objects }
    }

    fn distance_to_nearest_object(&self, point: Vector2<i64>) -> Option<f64> {
        self.objects
            .iter()
            .map(|object| {
                let delta = object - point;
                ((delta.x * delta.x + delta.y * delta.y) as f64).sqrt()
            })
            .min_by(|a, b| a.partial_cmp(b).unwrap())
    }
}

fn main() -> anyhow::Result<()> {
    setup_logging();
    let (listen_addr, object_count) = parse_args()?;

    let state = Arc::new(Mutex::new(SimState::with_random_objects(object_count)));
    let listener = TcpListener::bind(&listen_addr)?;
    log::info!("Simulated vision service with {object_count} objects on {listen_addr}");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = state.clone();
                thread::spawn(move || {
                    if let Err(e) = serve(stream, state) {
                        log::debug!("Vision connection closed: {e}");
                    }
                });
            }
            Err(e) => log::error!("Failed to accept vision connection: {e}"),
        }
    }

    Ok(())
}

fn serve(mut stream: TcpStream, state: Arc<Mutex<SimState>>) -> anyhow::Result<()> {
    loop {
        let request: VisionRequest = read_message(&mut stream)?;
        let response = handle(request, &state);
        send_message(&mut stream, &response)?;
    }
}

fn handle(request: VisionRequest, state: &Mutex<SimState>) -> VisionResponse {
    let mut rng = thread_rng();
    let mut state = state.lock().unwrap();

    match request {
        VisionRequest::BoxEmpty => VisionResponse::BoxEmpty {
            empty: state.objects.is_empty(),
        },
        VisionRequest::RefreshFrame => VisionResponse::FrameRefreshed,
        VisionRequest::Score { x, y } => {
            // High success probability close to an object center, decaying
            // with distance, plus a little sensor noise.
            let proba = match state.distance_to_nearest_object(Vector2::new(x, y)) {
                Some(distance) => {
                    (0.95 - 0.004 * distance + rng.gen_range(-0.05..0.05)).clamp(0.01, 0.99)
                }
                None => 0.01,
            };
            VisionResponse::Score { proba }
        }
        VisionRequest::RandomCoord { purpose: CoordPurpose::Pick, constraint, .. } => {
            let point = match constraint {
                CoordConstraint::OnObject => match pick_on_object(&state, &mut rng) {
                    Some(point) => point,
                    None => {
                        return VisionResponse::Error {
                            message: "no object left in the picking box".to_string(),
                        }
                    }
                },
                CoordConstraint::InTheBox => random_in_box(&mut rng),
            };
            coord_response(point)
        }
        VisionRequest::RandomCoord { purpose: CoordPurpose::Place, refresh, .. } => {
            // A place reservation marks the start of a pick cycle; consume
            // one object so the box eventually empties.
            if refresh && !state.objects.is_empty() {
                let index = rng.gen_range(0..state.objects.len());
                let removed = state.objects.swap_remove(index);
                log::info!(
                    "Object at ({}, {}) picked, {} left",
                    removed.x,
                    removed.y,
                    state.objects.len()
                );
            }
            coord_response(random_in_box(&mut rng))
        }
    }
}

fn pick_on_object(state: &SimState, rng: &mut impl Rng) -> Option<Vector2<i64>> {
    if state.objects.is_empty() {
        return None;
    }
    let object = state.objects[rng.gen_range(0..state.objects.len())];
    // Somewhere on the object, not necessarily its center.
    Some(Vector2::new(
        object.x + rng.gen_range(-8..=8),
        object.y + rng.gen_range(-8..=8),
    ))
}

fn random_in_box(rng: &mut impl Rng) -> Vector2<i64> {
    Vector2::new(
        rng.gen_range(BOX_MIN.x..BOX_MAX.x),
        rng.gen_range(BOX_MIN.y..BOX_MAX.y),
    )
}

fn coord_response(point: Vector2<i64>) -> VisionResponse {
    VisionResponse::Coord {
        x_pixel: point.x,
        y_pixel: point.y,
        x_robot: point.x as f64 * PIXEL_TO_METER,
        y_robot: point.y as f64 * PIXEL_TO_METER,
    }
}

fn parse_args() -> anyhow::Result<(String, usize)> {
    let mut listen_addr = "0.0.0.0:7200".to_string();
    let mut object_count = 10;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listen" => {
                listen_addr = args.next().context("Missing value for --listen")?;
            }
            "--objects" => {
                object_count = args
                    .next()
                    .context("Missing value for --objects")?
                    .parse()?;
            }
            _ => anyhow::bail!("Unknown argument: {arg}"),
        }
    }

    Ok((listen_addr, object_count))
}

fn setup_logging() {
    simple_log::quick!();
}
