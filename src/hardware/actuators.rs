// src/hardware/actuators.rs

use crate::detection::SteeringAngle;
use crate::types::DriveConfig;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use nix::libc::c_int;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Per-wheel motor speed, sent to the drive as one 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriveCommand {
    pub left: u16,
    pub right: u16,
}

impl DriveCommand {
    pub const STOP: DriveCommand = DriveCommand { left: 0, right: 0 };

    pub fn uniform(speed: u16) -> Self {
        Self {
            left: speed,
            right: speed,
        }
    }

    /// Left speed in the high half-word, right in the low one.
    pub fn packed(self) -> u32 {
        ((self.left as u32) << 16) | self.right as u32
    }

    pub fn is_stopped(self) -> bool {
        self == Self::STOP
    }
}

/// One-time drive configuration written before the loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveSetup {
    pub left_direction: u8,
    pub right_direction: u8,
    pub enable: bool,
}

impl DriveSetup {
    pub fn from_config(config: &DriveConfig) -> Self {
        Self {
            left_direction: config.direction,
            right_direction: config.direction,
            enable: true,
        }
    }

    pub fn direction_bits(self) -> u32 {
        (((self.left_direction & 1) as u32) << 1) | (self.right_direction & 1) as u32
    }
}

pub trait SteeringSink {
    fn write_angle(&mut self, angle: SteeringAngle) -> Result<()>;
}

pub trait DriveSink {
    fn configure(&mut self, setup: DriveSetup) -> Result<()>;
    fn write_speed(&mut self, command: DriveCommand) -> Result<()>;
}

/// Servo character device: each write is the command as a 16-bit
/// little-endian word.
pub struct ServoDevice {
    file: File,
}

impl ServoDevice {
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open servo {}", path))?;
        Ok(Self { file })
    }
}

impl SteeringSink for ServoDevice {
    fn write_angle(&mut self, angle: SteeringAngle) -> Result<()> {
        let word = angle.get() as u16;
        self.file
            .write_all(&word.to_le_bytes())
            .context("servo write failed")
    }
}

const MOTION_IOC_MAGIC: u8 = b'9';

nix::ioctl_write_int_bad!(motion_set_enable, nix::request_code_none!(MOTION_IOC_MAGIC, 0));
nix::ioctl_write_int_bad!(motion_set_direction, nix::request_code_none!(MOTION_IOC_MAGIC, 1));

/// Motor character device taking packed 32-bit speed words. Direction and
/// enable are set through ioctls on the same descriptor.
pub struct MotorDevice {
    file: File,
}

impl MotorDevice {
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open motors {}", path))?;
        Ok(Self { file })
    }
}

impl DriveSink for MotorDevice {
    fn configure(&mut self, setup: DriveSetup) -> Result<()> {
        let fd = self.file.as_raw_fd();
        // SAFETY: `fd` stays open for as long as `self.file` lives.
        unsafe {
            motion_set_direction(fd, setup.direction_bits() as c_int)
                .context("setting drive direction")?;
            motion_set_enable(fd, setup.enable as c_int).context("enabling drive")?;
        }
        Ok(())
    }

    fn write_speed(&mut self, command: DriveCommand) -> Result<()> {
        self.file
            .write_all(&command.packed().to_le_bytes())
            .context("motor write failed")
    }
}

struct Sinks {
    steering: Box<dyn SteeringSink + Send>,
    drive: Box<dyn DriveSink + Send>,
}

/// The vehicle's actuators, opened and configured once. Shared between the
/// control loop and the interrupt path; all writes are serialized, and the
/// safe stop runs at most once.
pub struct ActuatorSession {
    sinks: Mutex<Sinks>,
    center: SteeringAngle,
    stopped: AtomicBool,
}

impl ActuatorSession {
    pub fn new(
        steering: Box<dyn SteeringSink + Send>,
        mut drive: Box<dyn DriveSink + Send>,
        setup: DriveSetup,
        center: SteeringAngle,
    ) -> Result<Self> {
        drive.configure(setup).context("configuring drive")?;
        info!(
            "✓ Drive configured (direction bits {:#04b}, enabled: {})",
            setup.direction_bits(),
            setup.enable
        );
        Ok(Self {
            sinks: Mutex::new(Sinks { steering, drive }),
            center,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn center(&self) -> SteeringAngle {
        self.center
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn write_steering(&self, angle: SteeringAngle) -> Result<()> {
        let mut sinks = self.sinks.lock();
        if self.is_stopped() {
            return Ok(());
        }
        sinks.steering.write_angle(angle)
    }

    /// Motors first, then the servo. Ignored once the session is stopped.
    pub fn emit(&self, angle: SteeringAngle, speed: DriveCommand) -> Result<()> {
        let mut sinks = self.sinks.lock();
        if self.is_stopped() {
            return Ok(());
        }
        let drive = sinks.drive.write_speed(speed);
        let steering = sinks.steering.write_angle(angle);
        drive.and(steering)
    }

    /// Centres the wheels and stops the motors. Both writes are attempted
    /// even if one fails. Returns false if a previous call already did it.
    pub fn shutdown(&self) -> bool {
        let mut sinks = self.sinks.lock();
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Err(e) = sinks.steering.write_angle(self.center) {
            error!("Safe stop: servo write failed: {:#}", e);
        }
        if let Err(e) = sinks.drive.write_speed(DriveCommand::STOP) {
            error!("Safe stop: motor write failed: {:#}", e);
        }
        info!("Actuators parked (servo {}, speed 0)", self.center.get());
        true
    }
}

impl Drop for ActuatorSession {
    fn drop(&mut self) {
        if self.shutdown() {
            warn!("Actuator session dropped without explicit shutdown; parked on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::SteeringLimits;
    use crate::hardware::testing::{recording_session, ActuatorWrite};

    #[test]
    fn packs_left_speed_in_high_half() {
        let cmd = DriveCommand { left: 0x0102, right: 0x0304 };
        assert_eq!(cmd.packed(), 0x0102_0304);
        assert_eq!(DriveCommand::uniform(40).packed(), (40 << 16) + 40);
    }

    #[test]
    fn direction_bits_follow_wheel_order() {
        let setup = DriveSetup {
            left_direction: 1,
            right_direction: 0,
            enable: true,
        };
        assert_eq!(setup.direction_bits(), 0b10);
        let both = DriveSetup {
            left_direction: 1,
            right_direction: 1,
            enable: true,
        };
        assert_eq!(both.direction_bits(), 0b11);
    }

    #[test]
    fn motion_requests_use_driver_magic() {
        assert_eq!(nix::request_code_none!(MOTION_IOC_MAGIC, 0) as u32, 0x3900);
        assert_eq!(nix::request_code_none!(MOTION_IOC_MAGIC, 1) as u32, 0x3901);
    }

    #[test]
    fn configure_fails_on_a_non_motor_file() {
        let path = std::env::temp_dir().join(format!("lane-pilot-motors-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();
        let mut motors = MotorDevice::open(path.to_str().unwrap()).unwrap();

        let setup = DriveSetup {
            left_direction: 1,
            right_direction: 1,
            enable: true,
        };
        let err = motors.configure(setup).unwrap_err();
        assert!(format!("{:#}", err).contains("drive direction"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn session_configures_drive_once() {
        let (_session, log) = recording_session();
        let writes = log.lock().clone();
        assert_eq!(writes.len(), 1);
        assert!(matches!(writes[0], ActuatorWrite::Configure(_)));
    }

    #[test]
    fn emit_writes_motors_then_servo() {
        let (session, log) = recording_session();
        let limits = SteeringLimits { left: 220, right: 380 };
        session
            .emit(limits.clamp(310), DriveCommand::uniform(50))
            .unwrap();

        let writes = log.lock().clone();
        assert_eq!(
            &writes[1..],
            &[
                ActuatorWrite::Speed(DriveCommand::uniform(50)),
                ActuatorWrite::Steering(310),
            ]
        );
    }

    #[test]
    fn shutdown_parks_exactly_once() {
        let (session, log) = recording_session();
        assert!(session.shutdown());
        assert!(!session.shutdown());
        drop(session);

        let writes = log.lock().clone();
        assert_eq!(
            &writes[1..],
            &[
                ActuatorWrite::Steering(300),
                ActuatorWrite::Speed(DriveCommand::STOP),
            ]
        );
    }

    #[test]
    fn writes_after_shutdown_are_dropped() {
        let (session, log) = recording_session();
        session.shutdown();
        let limits = SteeringLimits { left: 220, right: 380 };
        session
            .emit(limits.clamp(250), DriveCommand::uniform(10))
            .unwrap();
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn drop_parks_if_not_shut_down() {
        let (session, log) = recording_session();
        drop(session);
        let writes = log.lock().clone();
        assert_eq!(writes.last(), Some(&ActuatorWrite::Speed(DriveCommand::STOP)));
    }
}
