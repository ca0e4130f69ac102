use embedded_hal::i2c::I2c;

/// The I2C address of the color sensor.
pub const ADDRESS: u8 = 0x11;

// Query commands; each selects the payload served by the following read.
#[derive(Clone, Copy, Debug)]
enum Command {
    Color = 0x01,
    Rgbc = 0x02,
    Hsl = 0x03,
    Rgb = 0x08,
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

/// An 8-bit-per-component color reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Raw photodiode counts: clear plus the three filtered channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgbc {
    pub c: u32,
    pub r: u32,
    pub g: u32,
    pub b: u32,
}

/// Hue (0-360), saturation (0-100) and lightness (0-100).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hsl {
    pub h: u16,
    pub s: u8,
    pub l: u8,
}

/// The color classes the sensor and [`classify`] can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NamedColor {
    Black = 0,
    White = 1,
    Gray = 2,
    Red = 3,
    Green = 4,
    Blue = 5,
    Yellow = 6,
    Cyan = 7,
    Purple = 8,
}

impl NamedColor {
    fn from_code(code: u8) -> Option<NamedColor> {
        match code {
            0 => Some(NamedColor::Black),
            1 => Some(NamedColor::White),
            2 => Some(NamedColor::Gray),
            3 => Some(NamedColor::Red),
            4 => Some(NamedColor::Green),
            5 => Some(NamedColor::Blue),
            6 => Some(NamedColor::Yellow),
            7 => Some(NamedColor::Cyan),
            8 => Some(NamedColor::Purple),
            _ => None,
        }
    }
}

/// Driver for the kit's I2C color sensor.
pub struct ColorSensor<TI2c> {
    i2c: TI2c,
    address: u8,
}

impl<TI2c, TIoError> ColorSensor<TI2c>
where
    TI2c: I2c<Error = TIoError>,
{
    pub fn new(i2c: TI2c) -> ColorSensor<TI2c> {
        ColorSensor {
            i2c,
            address: ADDRESS,
        }
    }

    /// Reads the gamma-corrected 8-bit color.
    pub fn read_rgb(&mut self) -> Result<Rgb, Error<TIoError>> {
        let mut buffer = [0u8; 3];
        self.query(Command::Rgb, &mut buffer)?;
        Ok(Rgb {
            r: buffer[0],
            g: buffer[1],
            b: buffer[2],
        })
    }

    /// Reads the raw clear/red/green/blue counts.
    pub fn read_rgbc(&mut self) -> Result<Rgbc, Error<TIoError>> {
        let mut buffer = [0u8; 16];
        self.query(Command::Rgbc, &mut buffer)?;
        Ok(Rgbc {
            c: u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]),
            r: u32::from_le_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]),
            g: u32::from_le_bytes([buffer[8], buffer[9], buffer[10], buffer[11]]),
            b: u32::from_le_bytes([buffer[12], buffer[13], buffer[14], buffer[15]]),
        })
    }

    /// Reads the hue/saturation/lightness conversion.
    pub fn read_hsl(&mut self) -> Result<Hsl, Error<TIoError>> {
        let mut buffer = [0u8; 4];
        self.query(Command::Hsl, &mut buffer)?;
        Ok(Hsl {
            h: u16::from_le_bytes([buffer[0], buffer[1]]),
            s: buffer[2],
            l: buffer[3],
        })
    }

    /// Reads the sensor's own color classification.
    pub fn read_color(&mut self) -> Result<Option<NamedColor>, Error<TIoError>> {
        let mut buffer = [0u8; 1];
        self.query(Command::Color, &mut buffer)?;
        Ok(NamedColor::from_code(buffer[0]))
    }

    /// Classifies the current reading host-side from its hue.
    pub fn classified_color(&mut self) -> Result<Option<NamedColor>, Error<TIoError>> {
        Ok(classify(&self.read_hsl()?))
    }

    /// True when the sensor's own classification matches `color`.
    pub fn read_color_is(&mut self, color: NamedColor) -> Result<bool, Error<TIoError>> {
        Ok(self.read_color()? == Some(color))
    }

    /// True when the host-side classification matches `color`.
    pub fn classified_color_is(&mut self, color: NamedColor) -> Result<bool, Error<TIoError>> {
        Ok(self.classified_color()? == Some(color))
    }

    /// Releases the underlying bus.
    pub fn release(self) -> TI2c {
        self.i2c
    }

    fn query(&mut self, command: Command, buffer: &mut [u8]) -> Result<(), Error<TIoError>> {
        self.i2c
            .write(self.address, &[command as u8])
            .map_err(Error::Wrapped)?;
        self.i2c.read(self.address, buffer).map_err(Error::Wrapped)
    }
}

/// Maps a hue onto the named color windows.
///
/// The 150-210 window is reported as blue rather than cyan; in practice
/// most blue surfaces land there. Hues outside every window (and the
/// degenerate 330 itself) classify as `None`.
pub fn classify(hsl: &Hsl) -> Option<NamedColor> {
    let h = hsl.h;
    if h > 330 || h < 30 {
        Some(NamedColor::Red)
    } else if (30..90).contains(&h) {
        Some(NamedColor::Yellow)
    } else if (90..150).contains(&h) {
        Some(NamedColor::Green)
    } else if (150..210).contains(&h) {
        Some(NamedColor::Blue)
    } else if (210..270).contains(&h) {
        Some(NamedColor::Blue)
    } else if (270..330).contains(&h) {
        Some(NamedColor::Purple)
    } else {
        None
    }
}
