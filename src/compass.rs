use embedded_hal::i2c::I2c;

/// The I2C address of the compass board.
pub const ADDRESS: u8 = 0x08;

// Orientation registers. Each holds a little-endian angle in hundredths of
// a degree.
#[derive(Clone, Copy, Debug)]
enum Command {
    Roll = 0x54,
    Yaw = 0x56,
    Pitch = 0x58,
}

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

/// Driver for the soccer-robot compass board.
///
/// The board fuses its own IMU and magnetometer and serves the resulting
/// orientation angles over I2C.
pub struct Compass<TI2c> {
    i2c: TI2c,
    address: u8,
}

impl<TI2c, TIoError> Compass<TI2c>
where
    TI2c: I2c<Error = TIoError>,
{
    pub fn new(i2c: TI2c) -> Compass<TI2c> {
        Compass {
            i2c,
            address: ADDRESS,
        }
    }

    /// Reads the heading, in degrees.
    pub fn yaw(&mut self) -> Result<f32, Error<TIoError>> {
        self.angle(Command::Yaw)
    }

    /// Reads the roll angle, in degrees.
    pub fn roll(&mut self) -> Result<f32, Error<TIoError>> {
        self.angle(Command::Roll)
    }

    /// Reads the pitch angle, in degrees.
    pub fn pitch(&mut self) -> Result<f32, Error<TIoError>> {
        self.angle(Command::Pitch)
    }

    /// Releases the underlying bus.
    pub fn release(self) -> TI2c {
        self.i2c
    }

    fn angle(&mut self, command: Command) -> Result<f32, Error<TIoError>> {
        self.i2c
            .write(self.address, &[command as u8])
            .map_err(Error::Wrapped)?;
        let mut buffer = [0u8; 2];
        self.i2c
            .read(self.address, &mut buffer)
            .map_err(Error::Wrapped)?;
        Ok(u16::from_le_bytes(buffer) as f32 / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes() {
        assert_eq!(Command::Roll as u8, 0x54);
        assert_eq!(Command::Yaw as u8, 0x56);
        assert_eq!(Command::Pitch as u8, 0x58);
    }
}
