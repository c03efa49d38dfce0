// src/hardware/mod.rs

mod actuators;
mod sonar;

pub use actuators::{ActuatorSession, DriveCommand, DriveSetup, MotorDevice, ServoDevice};
pub use sonar::{DistanceSensor, SonarDevice};

use crate::detection::SteeringLimits;
use crate::types::Config;
use anyhow::Result;

/// Opens servo and motors and applies the drive setup. Any failure here is
/// fatal: the loop never starts without actuators.
pub fn open_session(config: &Config) -> Result<ActuatorSession> {
    let servo = ServoDevice::open(&config.drive.servo_path)?;
    let motors = MotorDevice::open(&config.drive.motors_path)?;
    let limits = SteeringLimits::from_config(&config.steering);
    ActuatorSession::new(
        Box::new(servo),
        Box::new(motors),
        DriveSetup::from_config(&config.drive),
        limits.center_angle(),
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use super::actuators::{DriveSink, SteeringSink};
    use super::*;
    use crate::detection::SteeringAngle;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ActuatorWrite {
        Configure(DriveSetup),
        Steering(i32),
        Speed(DriveCommand),
    }

    pub type WriteLog = Arc<Mutex<Vec<ActuatorWrite>>>;

    pub struct RecordingSteering(pub WriteLog);

    impl SteeringSink for RecordingSteering {
        fn write_angle(&mut self, angle: SteeringAngle) -> Result<()> {
            self.0.lock().push(ActuatorWrite::Steering(angle.get()));
            Ok(())
        }
    }

    pub struct RecordingDrive(pub WriteLog);

    impl DriveSink for RecordingDrive {
        fn configure(&mut self, setup: DriveSetup) -> Result<()> {
            self.0.lock().push(ActuatorWrite::Configure(setup));
            Ok(())
        }

        fn write_speed(&mut self, command: DriveCommand) -> Result<()> {
            self.0.lock().push(ActuatorWrite::Speed(command));
            Ok(())
        }
    }

    pub fn recording_session() -> (ActuatorSession, WriteLog) {
        let log: WriteLog = Arc::new(Mutex::new(Vec::new()));
        let limits = SteeringLimits {
            left: 220,
            right: 380,
        };
        let session = ActuatorSession::new(
            Box::new(RecordingSteering(Arc::clone(&log))),
            Box::new(RecordingDrive(Arc::clone(&log))),
            DriveSetup {
                left_direction: 0,
                right_direction: 0,
                enable: true,
            },
            limits.center_angle(),
        )
        .expect("recording sinks never fail");
        (session, log)
    }
}
