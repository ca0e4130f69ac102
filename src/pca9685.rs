use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// The fixed I2C address of the controller on the kit board.
pub const ADDRESS: u8 = 0x40;

const MODE1: u8 = 0x00;
const PRESCALE: u8 = 0xFE;
const LED0_ON_L: u8 = 0x06;

const MODE1_SLEEP: u8 = 0x10;
// Restart, auto-increment and all-call, set after waking the oscillator.
const MODE1_RESTART_BITS: u8 = 0xA1;

const OSCILLATOR_HZ: u32 = 25_000_000;
const PWM_STEPS: u32 = 4096;
// All kit outputs run at the servo-friendly 50Hz frame (20ms).
const PWM_FREQUENCY_HZ: u32 = 50;
const FRAME_US: u32 = 20_000;

/// The number of addressable PWM channels.
pub const NUM_CHANNELS: u8 = 16;

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<TIoError> {
    /// Wrapped error from the HAL.
    Wrapped(TIoError),
    /// Invalid argument was provided.
    InvalidArgument,
}

impl<TIoError> From<TIoError> for Error<TIoError> {
    fn from(error: TIoError) -> Error<TIoError> {
        Error::Wrapped(error)
    }
}

/// The eight servo headers. The discriminants are the header codes silk-
/// screened onto the board, not raw PWM channels; see [`Pca9685::servo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Servo {
    S1 = 0x08,
    S2 = 0x07,
    S3 = 0x06,
    S4 = 0x05,
    S5 = 0x04,
    S6 = 0x03,
    S7 = 0x02,
    S8 = 0x01,
}

impl Servo {
    fn code(self) -> u8 {
        self as u8
    }
}

/// The four DC motor headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Motor {
    M1 = 1,
    M2 = 2,
    M3 = 3,
    M4 = 4,
}

impl Motor {
    /// The channel pair driving this header: (reverse, forward).
    fn channel_pair(self) -> (u8, u8) {
        let low = (4 - self as u8) * 2 + 8;
        (low, low + 1)
    }
}

/// The four light headers. They share the motor numbering but sit on the
/// lower channel bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Light {
    L1 = 1,
    L2 = 2,
    L3 = 3,
    L4 = 4,
}

impl Light {
    fn channel_pair(self) -> (u8, u8) {
        let low = (4 - self as u8) * 2;
        (low, low + 1)
    }
}

/// The rotation direction of a DC motor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    fn sign(self) -> i32 {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }
}

/// Driver for the PCA9685 16-channel PWM controller behind the kit's servo,
/// motor and light headers.
///
/// The controller is configured lazily: the first operation that drives an
/// output programs the 50Hz frame rate (with its 5ms oscillator settle) and
/// latches that state, matching how the headers behave from a cold start.
pub struct Pca9685<TI2c, TDelay> {
    i2c: TI2c,
    delay: TDelay,
    address: u8,
    initialized: bool,
}

impl<TI2c, TIoError, TDelay> Pca9685<TI2c, TDelay>
where
    TI2c: I2c<Error = TIoError>,
    TDelay: DelayNs,
{
    pub fn new(i2c: TI2c, delay: TDelay) -> Pca9685<TI2c, TDelay> {
        Pca9685 {
            i2c,
            delay,
            address: ADDRESS,
            initialized: false,
        }
    }

    /// Moves a servo to the given angle, 0-180 degrees.
    ///
    /// The angle maps linearly onto a 600-2400us pulse within the 20ms
    /// frame.
    pub fn servo(&mut self, servo: Servo, degrees: u8) -> Result<(), Error<TIoError>> {
        if degrees > 180 {
            return Err(Error::InvalidArgument);
        }
        self.ensure_initialized()?;
        self.set_pwm(servo.code() - 1, 0, servo_ticks(degrees))
    }

    /// Stops driving a servo, leaving the horn free to move.
    pub fn servo_off(&mut self, servo: Servo) -> Result<(), Error<TIoError>> {
        self.ensure_initialized()?;
        self.set_pwm(servo.code() + 7, 0, 0)
    }

    /// Re-enables a servo previously released with [`servo_off`](Self::servo_off).
    pub fn servo_on(&mut self, servo: Servo) -> Result<(), Error<TIoError>> {
        self.ensure_initialized()?;
        self.set_pwm(servo.code() + 7, 0, 150)
    }

    /// Runs a DC motor at the given speed, 0-255.
    pub fn motor(
        &mut self,
        motor: Motor,
        direction: Direction,
        speed: u8,
    ) -> Result<(), Error<TIoError>> {
        self.ensure_initialized()?;
        let value = (speed as i32 * 16 * direction.sign()).clamp(-4095, 4095);
        let (reverse, forward) = motor.channel_pair();
        if value >= 0 {
            self.set_pwm(forward, 0, value as u16)?;
            self.set_pwm(reverse, 0, 0)
        } else {
            self.set_pwm(forward, 0, 0)?;
            self.set_pwm(reverse, 0, (-value) as u16)
        }
    }

    /// Stops a DC motor by clearing both channels of its pair.
    pub fn motor_stop(&mut self, motor: Motor) -> Result<(), Error<TIoError>> {
        let (reverse, forward) = motor.channel_pair();
        self.set_pwm(reverse, 0, 0)?;
        self.set_pwm(forward, 0, 0)
    }

    /// Stops all four DC motors.
    pub fn motor_stop_all(&mut self) -> Result<(), Error<TIoError>> {
        self.motor_stop(Motor::M1)?;
        self.motor_stop(Motor::M2)?;
        self.motor_stop(Motor::M3)?;
        self.motor_stop(Motor::M4)
    }

    /// Turns a light header fully on.
    pub fn light_on(&mut self, light: Light) -> Result<(), Error<TIoError>> {
        self.ensure_initialized()?;
        let (low, high) = light.channel_pair();
        self.set_pwm(high, 0, 255 * 16)?;
        self.set_pwm(low, 0, 0)
    }

    /// Turns a light header off.
    pub fn light_off(&mut self, light: Light) -> Result<(), Error<TIoError>> {
        let (low, high) = light.channel_pair();
        self.set_pwm(low, 0, 0)?;
        self.set_pwm(high, 0, 0)
    }

    /// Programs one channel's on/off ticks (0-4095) directly.
    ///
    /// This does not configure the frame rate; the named operations above do
    /// that on first use.
    pub fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), Error<TIoError>> {
        if channel >= NUM_CHANNELS {
            return Err(Error::InvalidArgument);
        }
        let buffer = [
            LED0_ON_L + 4 * channel,
            on as u8,
            (on >> 8) as u8,
            off as u8,
            (off >> 8) as u8,
        ];
        self.i2c.write(self.address, &buffer).map_err(Error::Wrapped)
    }

    /// Releases the underlying peripherals.
    pub fn release(self) -> (TI2c, TDelay) {
        (self.i2c, self.delay)
    }

    fn ensure_initialized(&mut self) -> Result<(), Error<TIoError>> {
        if self.initialized {
            return Ok(());
        }
        self.write_register(MODE1, 0x00)?;
        self.set_frequency(PWM_FREQUENCY_HZ)?;
        self.initialized = true;
        Ok(())
    }

    /// Programs the prescaler. The oscillator must sleep while the prescale
    /// register is written, and needs 5ms before the restart bit is set.
    fn set_frequency(&mut self, frequency: u32) -> Result<(), Error<TIoError>> {
        let prescale = (OSCILLATOR_HZ / PWM_STEPS / frequency - 1) as u8;
        let old_mode = self.read_register(MODE1)?;
        self.write_register(MODE1, (old_mode & 0x7F) | MODE1_SLEEP)?;
        self.write_register(PRESCALE, prescale)?;
        self.write_register(MODE1, old_mode)?;
        self.delay.delay_us(5000);
        self.write_register(MODE1, old_mode | MODE1_RESTART_BITS)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<TIoError>> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Error::Wrapped)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error<TIoError>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(Error::Wrapped)?;
        Ok(buffer[0])
    }
}

/// Converts a servo angle into off-ticks for a 600-2400us pulse.
fn servo_ticks(degrees: u8) -> u16 {
    let pulse_us = degrees as u32 * 10 + 600;
    (pulse_us * PWM_STEPS / FRAME_US) as u16
}
