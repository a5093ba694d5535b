//! Binary wire protocol shared by the three TCP channels.

pub mod wire;

pub use wire::{
    decode_calibration_probe, decode_motion_frame, decode_playback_frame,
    encode_calibration_reply, encode_motion_frame, is_sentinel, CalibrationProbe,
    CalibrationReply, MotionFrame, PlaybackCommand, RawSample, CALIBRATION_PACKET_SIZE,
    MOTION_ELEMENT_SIZE, PLAYBACK_PACKET_SIZE,
};
