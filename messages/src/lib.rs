//! Wire types shared by every node. All messages travel as a u64-LE length
//! prefix followed by a bincode payload.

use std::io::{Read, Write};
use std::net::TcpStream;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const MAX_MESSAGE_SIZE: u64 = 16 * 1024 * 1024;

pub fn send_message<T: Serialize>(stream: &mut TcpStream, message: &T) -> anyhow::Result<()> {
    let encoded = bincode::serialize(message)?;
    let size_bytes = (encoded.len() as u64).to_le_bytes();
    stream.write_all(&size_bytes)?;
    stream.write_all(&encoded)?;

    Ok(())
}

pub fn read_message<T: DeserializeOwned>(stream: &mut TcpStream) -> anyhow::Result<T> {
    let mut size_buf = [0u8; 8];
    stream.read_exact(&mut size_buf)?;
    let size = u64::from_le_bytes(size_buf);
    if size > MAX_MESSAGE_SIZE {
        anyhow::bail!("Message of {size} bytes exceeds the size limit");
    }

    let mut buf = vec![0u8; size as usize];
    stream.read_exact(&mut buf)?;
    let message = bincode::deserialize(&buf)?;

    Ok(message)
}

/// A scored pixel location, as carried on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictionMsg {
    pub x: i64,
    pub y: i64,
    pub proba: f64,
}

/// Full current candidate set, pushed to feed subscribers after every store
/// mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionList {
    pub predictions: Vec<PredictionMsg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitrationMode {
    Classic,
    WithoutInvalidation,
    JustInvalidation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArbitrationRequest {
    pub mode: ArbitrationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArbitrationResponse {
    /// A candidate was selected.
    Prediction(PredictionMsg),
    /// The request only cleared the fixed dead zone.
    NoSelection,
    Error { kind: ArbitrationErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitrationErrorKind {
    EmptyStore,
    SelectionTimeout,
    Other,
}

/// What the requested coordinate will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordPurpose {
    Pick,
    Place,
}

/// Where the coordinate must lie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordConstraint {
    OnObject,
    InTheBox,
}

/// Requests understood by the vision service. One connection carries all of
/// them; the service owns the camera and the scoring model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum VisionRequest {
    RandomCoord {
        purpose: CoordPurpose,
        constraint: CoordConstraint,
        /// Grab a fresh frame before sampling instead of reusing the last one.
        refresh: bool,
    },
    Score { x: i64, y: i64 },
    RefreshFrame,
    BoxEmpty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VisionResponse {
    Coord {
        x_pixel: i64,
        y_pixel: i64,
        x_robot: f64,
        y_robot: f64,
    },
    Score { proba: f64 },
    FrameRefreshed,
    BoxEmpty { empty: bool },
    Error { message: String },
}
