use std::net::TcpStream;

use arbiter::{ArbiterError, BoxSensor, CoordProvider, FrameSource, Scorer};
use messages::{
    read_message, send_message, CoordConstraint, CoordPurpose, VisionRequest, VisionResponse,
};
use nalgebra::Vector2;

/// One connection to the vision service. Implements every collaborator trait
/// the arbiter needs; the node opens a separate connection per role.
pub struct VisionClient {
    stream: TcpStream,
}

impl VisionClient {
    pub fn connect(addr: &str) -> anyhow::Result<VisionClient> {
        let stream = TcpStream::connect(addr)?;
        Ok(VisionClient { stream })
    }

    fn request(&mut self, request: VisionRequest) -> Result<VisionResponse, ArbiterError> {
        send_message(&mut self.stream, &request).map_err(to_arbiter_error)?;
        let response = read_message(&mut self.stream).map_err(to_arbiter_error)?;
        match response {
            VisionResponse::Error { message } => Err(ArbiterError::Scoring(message)),
            other => Ok(other),
        }
    }
}

fn to_arbiter_error(e: anyhow::Error) -> ArbiterError {
    ArbiterError::Scoring(e.to_string())
}

impl BoxSensor for VisionClient {
    fn box_is_empty(&mut self) -> Result<bool, ArbiterError> {
        match self.request(VisionRequest::BoxEmpty)? {
            VisionResponse::BoxEmpty { empty } => Ok(empty),
            other => Err(unexpected(&other)),
        }
    }
}

impl CoordProvider for VisionClient {
    fn random_on_object(&mut self) -> Result<Vector2<i64>, ArbiterError> {
        let request = VisionRequest::RandomCoord {
            purpose: CoordPurpose::Pick,
            constraint: CoordConstraint::OnObject,
            refresh: false,
        };
        match self.request(request)? {
            VisionResponse::Coord { x_pixel, y_pixel, .. } => Ok(Vector2::new(x_pixel, y_pixel)),
            other => Err(unexpected(&other)),
        }
    }
}

impl Scorer for VisionClient {
    fn score(&mut self, position: Vector2<i64>) -> Result<f64, ArbiterError> {
        let request = VisionRequest::Score { x: position.x, y: position.y };
        match self.request(request)? {
            VisionResponse::Score { proba } => Ok(proba),
            other => Err(unexpected(&other)),
        }
    }
}

impl FrameSource for VisionClient {
    fn refresh(&mut self) -> Result<(), ArbiterError> {
        match self.request(VisionRequest::RefreshFrame)? {
            VisionResponse::FrameRefreshed => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &VisionResponse) -> ArbiterError {
    ArbiterError::Scoring(format!("unexpected vision service response: {response:?}"))
}
