use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread::{self, sleep};
use std::time::Duration;

use feedback_data::{FeedbackData, FEEDBACK_PACKET_SIZE};

pub mod feedback_data;

const DASHBOARD_PORT: u16 = 29999;
const MOTION_PORT: u16 = 30003;
const FEEDBACK_PORT: u16 = 30004;

// Digital output driving the vacuum ejector and input bit reporting that a
// part is held against the suction cup.
const VACUUM_DO: i32 = 2;
const GRIPPED_DI_BIT: i32 = 4;

// Tool rotation keeping the suction cup pointing straight down.
const TOOL_DOWN_R: f64 = 0.0;

pub struct RobotConn {
    dashboard_cmd_stream: TcpStream,
    motion_cmd_stream: TcpStream,
}

impl RobotConn {
    pub fn connect(host: &str) -> anyhow::Result<RobotConn> {
        let dashboard_conn = TcpStream::connect((host, DASHBOARD_PORT))?;
        let motion_conn = TcpStream::connect((host, MOTION_PORT))?;

        Ok(RobotConn {
            dashboard_cmd_stream: dashboard_conn,
            motion_cmd_stream: motion_conn,
        })
    }

    pub fn enable_robot(&mut self) -> anyhow::Result<()> {
        write!(&mut self.dashboard_cmd_stream, "EnableRobot()\n")?;

        Ok(())
    }

    pub fn disable_robot(&mut self) -> anyhow::Result<()> {
        write!(&mut self.dashboard_cmd_stream, "DisableRobot()\n")?;

        Ok(())
    }

    pub fn set_do(&mut self, index: i32, status: bool) -> anyhow::Result<()> {
        let status = status as i32;
        write!(&mut self.dashboard_cmd_stream, "DO({index}, {status})\n")?;

        Ok(())
    }

    pub fn mov_l(&mut self, x: f64, y: f64, z: f64, r: f64) -> anyhow::Result<()> {
        write!(&mut self.motion_cmd_stream, "MovL({x}, {y}, {z}, {r})\n")?;

        Ok(())
    }
}

pub struct RobotFeedbackConn {
    feedback_conn: TcpStream,
}

impl RobotFeedbackConn {
    pub fn connect(host: &str) -> anyhow::Result<RobotFeedbackConn> {
        let feedback_conn = TcpStream::connect((host, FEEDBACK_PORT))?;
        Ok(RobotFeedbackConn { feedback_conn })
    }

    pub fn receive_feedback(&mut self) -> anyhow::Result<FeedbackData> {
        let mut buffer = [0u8; FEEDBACK_PACKET_SIZE];
        self.feedback_conn.read_exact(&mut buffer)?;
        let feedback_data = bincode::deserialize(&buffer)?;

        Ok(feedback_data)
    }
}

/// Command connection plus a background feedback reader, composed into the
/// pick / place / release sequences the picking nodes need.
pub struct VacuumGripperRobot {
    conn: RobotConn,
    feedback: Arc<Mutex<FeedbackData>>,
}

impl VacuumGripperRobot {
    pub fn connect(host: &str) -> anyhow::Result<VacuumGripperRobot> {
        let conn = RobotConn::connect(host)?;
        let mut feedback_conn = RobotFeedbackConn::connect(host)?;
        let feedback = Arc::new(Mutex::new(feedback_conn.receive_feedback()?));

        {
            let feedback = feedback.clone();
            thread::spawn(move || {
                run_feedback_loop(feedback_conn, feedback);
            });
        }

        Ok(VacuumGripperRobot { conn, feedback })
    }

    pub fn enable(&mut self) -> anyhow::Result<()> {
        self.conn.enable_robot()
    }

    pub fn go_to_xyz(&mut self, x: f64, y: f64, z: f64) -> anyhow::Result<()> {
        self.conn.mov_l(x, y, z, TOOL_DOWN_R)
    }

    /// Descend on the target, switch the vacuum on and come back up to the
    /// approach height.
    pub fn pick(&mut self, x: f64, y: f64, z_approach: f64, z_pick: f64) -> anyhow::Result<()> {
        self.go_to_xyz(x, y, z_approach)?;
        self.go_to_xyz(x, y, z_pick)?;
        self.conn.set_do(VACUUM_DO, true)?;
        sleep(Duration::from_millis(800));
        self.go_to_xyz(x, y, z_approach)?;

        Ok(())
    }

    /// Lower the held object to the place height and drop it there.
    pub fn place(&mut self, x: f64, y: f64, z_approach: f64, z_place: f64) -> anyhow::Result<()> {
        self.go_to_xyz(x, y, z_approach)?;
        self.go_to_xyz(x, y, z_place)?;
        self.conn.set_do(VACUUM_DO, false)?;
        sleep(Duration::from_millis(300));
        self.go_to_xyz(x, y, z_approach)?;

        Ok(())
    }

    /// Switch off the vacuum.
    pub fn release_gripper(&mut self) -> anyhow::Result<()> {
        self.conn.set_do(VACUUM_DO, false)
    }

    /// Whether the suction cup currently holds an object, according to the
    /// latest feedback packet.
    pub fn object_gripped(&self) -> bool {
        let feedback = self.feedback.lock().unwrap();
        (feedback.digital_inputs >> GRIPPED_DI_BIT) & 1 != 0
    }
}

fn run_feedback_loop(mut feedback_conn: RobotFeedbackConn, feedback: Arc<Mutex<FeedbackData>>) {
    loop {
        let res = match feedback_conn.receive_feedback() {
            Ok(feedback) => feedback,
            Err(e) => {
                log::error!("Error receiving robot feedback {e:?}");
                sleep(Duration::from_secs(1));
                continue;
            }
        };
        *feedback.lock().unwrap() = res;

        sleep(Duration::from_millis(10));
    }
}
