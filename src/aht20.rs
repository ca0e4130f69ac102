use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// The default I2C address of the sensor.
pub const ADDRESS: u8 = 0x38;

const CMD_INITIALIZE: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER_MEASUREMENT: [u8; 3] = [0xAC, 0x33, 0x00];

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

const INITIALIZE_DELAY_MS: u32 = 10;
const MEASUREMENT_DELAY_MS: u32 = 80;
const BUSY_POLL_INTERVAL_MS: u32 = 10;
// The sensor normally finishes well inside the 80ms wait; a measurement
// still busy after this many polls is not coming.
const MAX_BUSY_POLLS: u32 = 500;

const CRC_POLYNOMIAL: u8 = 0x31;

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<TIoError> {
    /// Wrapped error from the HAL.
    Wrapped(TIoError),
    /// The sensor reports uncalibrated even after re-initialization.
    NotCalibrated,
    /// The payload CRC did not match.
    Checksum,
    /// The sensor stayed busy past the poll bound.
    Timeout,
}

impl<TIoError> From<TIoError> for Error<TIoError> {
    fn from(error: TIoError) -> Error<TIoError> {
        Error::Wrapped(error)
    }
}

/// One humidity/temperature measurement.
///
/// `humidity` is percent relative humidity; `temperature` is degrees
/// Celsius. Use [`TemperatureUnit::from_celsius`](crate::TemperatureUnit)
/// for Fahrenheit.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub humidity: f32,
    pub temperature: f32,
}

/// Driver for the AHT20 humidity and temperature sensor.
pub struct Aht20<TI2c, TDelay> {
    i2c: TI2c,
    delay: TDelay,
    address: u8,
}

impl<TI2c, TIoError, TDelay> Aht20<TI2c, TDelay>
where
    TI2c: I2c<Error = TIoError>,
    TDelay: DelayNs,
{
    /// Constructs a driver at the default address.
    pub fn new(i2c: TI2c, delay: TDelay) -> Aht20<TI2c, TDelay> {
        Aht20 {
            i2c,
            delay,
            address: ADDRESS,
        }
    }

    /// Constructs a driver at a non-default address.
    pub fn with_address(i2c: TI2c, delay: TDelay, address: u8) -> Aht20<TI2c, TDelay> {
        Aht20 {
            i2c,
            delay,
            address,
        }
    }

    /// Takes one measurement.
    ///
    /// Initializes the sensor first if it reports uncalibrated (e.g. after
    /// power-up). Blocks for the measurement time, around 80ms, polling the
    /// busy flag afterwards until the data is ready.
    pub fn read(&mut self) -> Result<Measurement, Error<TIoError>> {
        if self.status()? & STATUS_CALIBRATED == 0 {
            self.initialize()?;
            if self.status()? & STATUS_CALIBRATED == 0 {
                return Err(Error::NotCalibrated);
            }
        }

        self.trigger_measurement()?;
        let mut polls = 0u32;
        while self.status()? & STATUS_BUSY != 0 {
            polls += 1;
            if polls >= MAX_BUSY_POLLS {
                return Err(Error::Timeout);
            }
            self.delay.delay_ms(BUSY_POLL_INTERVAL_MS);
        }

        let mut buffer = [0u8; 7];
        self.i2c
            .read(self.address, &mut buffer)
            .map_err(Error::Wrapped)?;
        if crc8(&buffer[0..6]) != buffer[6] {
            return Err(Error::Checksum);
        }
        Ok(decode(&buffer))
    }

    /// Releases the underlying peripherals.
    pub fn release(self) -> (TI2c, TDelay) {
        (self.i2c, self.delay)
    }

    fn initialize(&mut self) -> Result<(), Error<TIoError>> {
        self.i2c
            .write(self.address, &CMD_INITIALIZE)
            .map_err(Error::Wrapped)?;
        self.delay.delay_ms(INITIALIZE_DELAY_MS);
        Ok(())
    }

    fn trigger_measurement(&mut self) -> Result<(), Error<TIoError>> {
        self.i2c
            .write(self.address, &CMD_TRIGGER_MEASUREMENT)
            .map_err(Error::Wrapped)?;
        self.delay.delay_ms(MEASUREMENT_DELAY_MS);
        Ok(())
    }

    fn status(&mut self) -> Result<u8, Error<TIoError>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .read(self.address, &mut buffer)
            .map_err(Error::Wrapped)?;
        Ok(buffer[0])
    }
}

/// Unpacks the two 20-bit readings that straddle byte 3 of the payload.
fn decode(buffer: &[u8; 7]) -> Measurement {
    let humidity_raw = ((buffer[1] as u32) << 12) | ((buffer[2] as u32) << 4) | (buffer[3] >> 4) as u32;
    let temperature_raw =
        (((buffer[3] & 0x0F) as u32) << 16) | ((buffer[4] as u32) << 8) | buffer[5] as u32;
    Measurement {
        humidity: humidity_raw as f32 * 100.0 / 1_048_576.0,
        temperature: temperature_raw as f32 * 200.0 / 1_048_576.0 - 50.0,
    }
}

/// CRC-8 with polynomial 0x31 and initial value 0xFF, as the sensor
/// appends to its payload.
fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0xFFu8;
    for byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
