use std::net::TcpStream;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use anyhow::Context;
use messages::{
    read_message, send_message, ArbitrationMode, ArbitrationRequest, ArbitrationResponse,
    CoordConstraint, CoordPurpose, PredictionMsg, VisionRequest, VisionResponse,
};
use nalgebra::Vector2;
use robot::VacuumGripperRobot;

use crate::calibration::Calibration;

mod calibration;

// Heights in meters for the pick and place movements.
const Z_APPROACH: f64 = 0.12;
const Z_PICK: f64 = 0.02;
const Z_PLACE: f64 = 0.12;

// Parking position out of the camera scope.
const X_OUT: f64 = 0.21;
const Y_OUT: f64 = -0.27;
const Z_OUT: f64 = 0.12;

struct Args {
    robot_host: String,
    arbitration_addr: String,
    vision_addr: String,
    calibration_file: PathBuf,
    min_acceptable_probability: f64,
}

fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = parse_args()?;

    let calibration = Calibration::load(&args.calibration_file)?;

    log::info!("Connecting to robot at {}", args.robot_host);
    let mut robot = VacuumGripperRobot::connect(&args.robot_host)?;
    robot.enable()?;
    robot.go_to_xyz(X_OUT, Y_OUT, Z_OUT)?;

    log::info!("Connecting to vision service at {}", args.vision_addr);
    let mut vision = TcpStream::connect(&args.vision_addr)?;
    log::info!("Connecting to arbitration service at {}", args.arbitration_addr);
    let mut arbitration = TcpStream::connect(&args.arbitration_addr)?;

    loop {
        // Refresh the depth image and reserve a place location first, as the
        // pick target is only valid against the current frame.
        let place = match request_place_coord(&mut vision) {
            Ok(place) => place,
            Err(e) => {
                log::error!("Could not get a place coordinate: {e}");
                sleep(Duration::from_secs(1));
                continue;
            }
        };

        let prediction = match request_best_prediction(&mut arbitration) {
            Ok(prediction) => prediction,
            Err(e) => {
                // Any arbitration error means "no target this cycle".
                log::warn!("No pick target this cycle: {e}");
                sleep(Duration::from_secs(1));
                continue;
            }
        };
        if prediction.proba < args.min_acceptable_probability {
            log::info!(
                "Best prediction {:.2} is below the acceptable floor {:.2}, skipping cycle",
                prediction.proba,
                args.min_acceptable_probability
            );
            sleep(Duration::from_secs(1));
            continue;
        }

        let target = calibration.pixel_to_robot(Vector2::new(prediction.x, prediction.y));
        log::info!(
            "Picking at pixel ({}, {}) -> robot ({:.3}, {:.3}), p={:.2}",
            prediction.x,
            prediction.y,
            target.x,
            target.y,
            prediction.proba
        );

        robot.pick(target.x, target.y, Z_APPROACH, Z_PICK)?;
        if robot.object_gripped() {
            robot.place(place.x, place.y, Z_APPROACH, Z_PLACE)?;
        } else {
            log::info!("Nothing gripped at the predicted point");
        }
        robot.release_gripper()?;

        // The robot must leave the camera field before the next frame.
        robot.go_to_xyz(X_OUT, Y_OUT, Z_OUT)?;
    }
}

fn request_place_coord(vision: &mut TcpStream) -> anyhow::Result<Vector2<f64>> {
    let request = VisionRequest::RandomCoord {
        purpose: CoordPurpose::Place,
        constraint: CoordConstraint::InTheBox,
        refresh: true,
    };
    send_message(vision, &request)?;
    match read_message(vision)? {
        VisionResponse::Coord { x_robot, y_robot, .. } => Ok(Vector2::new(x_robot, y_robot)),
        VisionResponse::Error { message } => anyhow::bail!("vision service error: {message}"),
        other => anyhow::bail!("unexpected vision service response: {other:?}"),
    }
}

fn request_best_prediction(arbitration: &mut TcpStream) -> anyhow::Result<PredictionMsg> {
    let request = ArbitrationRequest { mode: ArbitrationMode::Classic };
    send_message(arbitration, &request)?;
    match read_message(arbitration)? {
        ArbitrationResponse::Prediction(prediction) => Ok(prediction),
        ArbitrationResponse::NoSelection => anyhow::bail!("service returned no selection"),
        ArbitrationResponse::Error { kind, message } => {
            anyhow::bail!("arbitration failed ({kind:?}): {message}")
        }
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut robot_host = None;
    let mut arbitration_addr = "127.0.0.1:7300".to_string();
    let mut vision_addr = "127.0.0.1:7200".to_string();
    let mut calibration_file = None;
    let mut min_acceptable_probability = 0.4;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--arbitration" => arbitration_addr = next_value(&mut args, &arg)?,
            "--vision" => vision_addr = next_value(&mut args, &arg)?,
            "--min-probability" => {
                min_acceptable_probability = next_value(&mut args, &arg)?.parse()?;
            }
            _ if robot_host.is_none() => robot_host = Some(arg),
            _ if calibration_file.is_none() => calibration_file = Some(PathBuf::from(arg)),
            _ => anyhow::bail!("Unknown argument: {arg}"),
        }
    }

    if !(0.0..=1.0).contains(&min_acceptable_probability) {
        anyhow::bail!("--min-probability must be in [0, 1], got {min_acceptable_probability}");
    }

    Ok(Args {
        robot_host: robot_host.context("Usage: mover ROBOT_HOST CALIBRATION_FILE [options]")?,
        arbitration_addr,
        vision_addr,
        calibration_file: calibration_file
            .context("Usage: mover ROBOT_HOST CALIBRATION_FILE [options]")?,
        min_acceptable_probability,
    })
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("Missing value for {flag}"))
}

fn setup_logging() {
    simple_log::quick!();
}
