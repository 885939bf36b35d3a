use serde::Deserialize;

/// Size of one status packet streamed by the robot controller.
pub const FEEDBACK_PACKET_SIZE: usize = 1440;

/// Decoded prefix of a controller status packet. The reserved fields are
/// part of the packet layout and must stay in place so every field after
/// them lands on its real byte offset; everything past `i_robot` is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackData {
    pub message_size: u16, // Total message size in bytes
    pub reserved1: [i16; 3],

    pub digital_inputs: i32,
    pub digital_outputs: i32,
    pub robot_mode: i32, // 9 indicates an error
    pub time_stamp: i32, // Timestamp (in ms)

    pub reserved2: i32,
    pub test_value: i32, // Memory structure test standard value
    pub reserved3: f64,

    pub speed_scaling: f64,
    pub linear_momentum_norm: f64, // Current robot momentum
    pub v_main: f64,               // Control board voltage
    pub v_robot: f64,              // Robot voltage
    pub i_robot: f64,              // Robot current
}
