use embedded_hal::i2c::I2c;

/// The I2C address of the compound-eye board.
pub const ADDRESS: u8 = 0x13;

// The board answers any channel it has no fix for with 0xFF.
const NO_DATA: u8 = 0xFF;

/// The readable channels: the twelve IR photodiodes plus the board's own
/// summary of the strongest signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Ir1 = 0,
    Ir2 = 1,
    Ir3 = 2,
    Ir4 = 3,
    Ir5 = 4,
    Ir6 = 5,
    Ir7 = 6,
    Ir8 = 7,
    Ir9 = 8,
    Ir10 = 9,
    Ir11 = 10,
    Ir12 = 11,
    /// Signal strength of the strongest eye.
    MaxEyeValue = 12,
    /// 1-based index of the strongest eye.
    MaxEye = 13,
    /// Bearing towards the ball, 0-360 degrees.
    Angle = 14,
    /// The board's operating mode.
    Mode = 15,
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

/// Driver for the soccer-robot compound-eye IR array.
pub struct CompoundEye<TI2c> {
    i2c: TI2c,
    address: u8,
}

impl<TI2c, TIoError> CompoundEye<TI2c>
where
    TI2c: I2c<Error = TIoError>,
{
    pub fn new(i2c: TI2c) -> CompoundEye<TI2c> {
        CompoundEye {
            i2c,
            address: ADDRESS,
        }
    }

    /// Reads one channel. `None` means the board has no data for it (no
    /// ball in view).
    ///
    /// The raw byte is widened where the channel needs it: the angle channel
    /// is stored halved on the board, and the strongest-eye index is
    /// converted to 1-based.
    pub fn read(&mut self, channel: Channel) -> Result<Option<u16>, Error<TIoError>> {
        self.i2c
            .write(self.address, &[channel as u8])
            .map_err(Error::Wrapped)?;
        let mut buffer = [0u8; 1];
        self.i2c
            .read(self.address, &mut buffer)
            .map_err(Error::Wrapped)?;
        Ok(widen(channel, buffer[0]))
    }

    /// Releases the underlying bus.
    pub fn release(self) -> TI2c {
        self.i2c
    }
}

fn widen(channel: Channel, raw: u8) -> Option<u16> {
    if raw == NO_DATA {
        return None;
    }
    Some(match channel {
        Channel::Angle => raw as u16 * 2,
        Channel::MaxEye => raw as u16 + 1,
        _ => raw as u16,
    })
}
