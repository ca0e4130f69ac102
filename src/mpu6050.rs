use core::f32::consts::PI;
use embedded_hal::i2c::I2c;
use libm::{atan2f, sqrtf};

/// The I2C address of the IMU with AD0 tied low.
pub const ADDRESS: u8 = 0x68;

const PWR_MGMT_1: u8 = 0x6B;
const ACCEL_XOUT_H: u8 = 0x3B;
const ACCEL_YOUT_H: u8 = 0x3D;
const ACCEL_ZOUT_H: u8 = 0x3F;
const TEMP_OUT_H: u8 = 0x41;
const GYRO_XOUT_H: u8 = 0x43;
const GYRO_YOUT_H: u8 = 0x45;
const GYRO_ZOUT_H: u8 = 0x47;

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<TIoError> {
    /// Wrapped error from the HAL.
    Wrapped(TIoError),
}

impl<TIoError> From<TIoError> for Error<TIoError> {
    fn from(error: TIoError) -> Error<TIoError> {
        Error::Wrapped(error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Accelerometer full-scale range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelRange {
    G2,
    G4,
    G8,
    G16,
}

impl AccelRange {
    /// Counts per g at this range, per the datasheet sensitivity table.
    fn lsb_per_g(self) -> f32 {
        match self {
            AccelRange::G2 => 16384.0,
            AccelRange::G4 => 8192.0,
            AccelRange::G8 => 4096.0,
            AccelRange::G16 => 2048.0,
        }
    }
}

/// Gyroscope full-scale range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyroRange {
    Dps250,
    Dps500,
    Dps1000,
    Dps2000,
}

impl GyroRange {
    /// Counts per degree-per-second at this range.
    fn lsb_per_dps(self) -> f32 {
        match self {
            GyroRange::Dps250 => 131.0,
            GyroRange::Dps500 => 65.5,
            GyroRange::Dps1000 => 32.8,
            GyroRange::Dps2000 => 16.4,
        }
    }
}

/// Driver for the MPU6050 6-axis accelerometer/gyroscope.
pub struct Mpu6050<TI2c> {
    i2c: TI2c,
    address: u8,
}

impl<TI2c, TIoError> Mpu6050<TI2c>
where
    TI2c: I2c<Error = TIoError>,
{
    pub fn new(i2c: TI2c) -> Mpu6050<TI2c> {
        Mpu6050 {
            i2c,
            address: ADDRESS,
        }
    }

    /// Wakes the device out of sleep. Must be called once before reading.
    pub fn init(&mut self) -> Result<(), Error<TIoError>> {
        self.i2c
            .write(self.address, &[PWR_MGMT_1, 0x00])
            .map_err(Error::Wrapped)
    }

    /// Reads the acceleration along one axis, in g.
    pub fn acceleration(&mut self, axis: Axis, range: AccelRange) -> Result<f32, Error<TIoError>> {
        let register = match axis {
            Axis::X => ACCEL_XOUT_H,
            Axis::Y => ACCEL_YOUT_H,
            Axis::Z => ACCEL_ZOUT_H,
        };
        Ok(self.read_i16(register)? as f32 / range.lsb_per_g())
    }

    /// Reads the angular rate around one axis, in degrees per second.
    pub fn gyroscope(&mut self, axis: Axis, range: GyroRange) -> Result<f32, Error<TIoError>> {
        let register = match axis {
            Axis::X => GYRO_XOUT_H,
            Axis::Y => GYRO_YOUT_H,
            Axis::Z => GYRO_ZOUT_H,
        };
        Ok(self.read_i16(register)? as f32 / range.lsb_per_dps())
    }

    /// Computes the tilt of one axis from the gravity vector, in degrees.
    ///
    /// Only meaningful while the device is close to stationary; any linear
    /// acceleration folds into the result.
    pub fn rotation(&mut self, axis: Axis, range: AccelRange) -> Result<f32, Error<TIoError>> {
        let x = self.acceleration(Axis::X, range)?;
        let y = self.acceleration(Axis::Y, range)?;
        let z = self.acceleration(Axis::Z, range)?;
        Ok(tilt_degrees(axis, x, y, z))
    }

    /// Reads the die temperature, in degrees Celsius.
    pub fn temperature(&mut self) -> Result<f32, Error<TIoError>> {
        Ok(36.53 + self.read_i16(TEMP_OUT_H)? as f32 / 340.0)
    }

    /// Releases the underlying bus.
    pub fn release(self) -> TI2c {
        self.i2c
    }

    /// Reads a big-endian two's-complement register pair.
    fn read_i16(&mut self, register: u8) -> Result<i16, Error<TIoError>> {
        let high = self.read_register(register)?;
        let low = self.read_register(register + 1)?;
        Ok(combine(high, low))
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error<TIoError>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(Error::Wrapped)?;
        Ok(buffer[0])
    }
}

fn combine(high: u8, low: u8) -> i16 {
    i16::from_be_bytes([high, low])
}

fn tilt_degrees(axis: Axis, x: f32, y: f32, z: f32) -> f32 {
    let radians = match axis {
        Axis::X => atan2f(y, dist(x, z)),
        Axis::Y => -atan2f(x, dist(y, z)),
        Axis::Z => atan2f(z, dist(x, y)),
    };
    radians * (180.0 / PI)
}

fn dist(a: f32, b: f32) -> f32 {
    sqrtf(a * a + b * b)
}
