use crate::TemperatureUnit;
use core::time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<TIoError> {
    /// Wrapped error from the HAL.
    Wrapped(TIoError),
    /// Invalid argument was provided.
    InvalidArgument,
    /// The sensor stopped driving the line mid-transaction.
    Timeout,
}

impl<TIoError> From<TIoError> for Error<TIoError> {
    fn from(error: TIoError) -> Error<TIoError> {
        Error::Wrapped(error)
    }
}

/// The result of the most recent query.
///
/// `humidity` is in percent relative humidity. `temperature` is in the unit
/// selected via [`Options::unit`] or [`set_unit`](Dht11::set_unit).
///
/// A query never discards data: when the sensor does not answer the start
/// condition, `responded` is false and the previous values are carried over
/// unchanged; when the payload checksum does not match, `checksum_ok` is
/// false but the freshly decoded values are still published.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    pub humidity: f32,
    pub temperature: f32,
    pub checksum_ok: bool,
    pub responded: bool,
}

/// The minimum read interval of a DHT11.
///
/// Note that this can vary a bit by device, so check your device's datasheet
/// to be sure. Try doubling this value if you are encountering problems.
pub const MIN_DHT11_READ_INTERVAL: Duration = Duration::from_millis(1000);

/// The minimum read interval of a DHT22.
///
/// Note that this can vary a bit by device, so check your device's datasheet
/// to be sure. Try doubling this value if you are encountering problems.
pub const MIN_DHT22_READ_INTERVAL: Duration = Duration::from_millis(2000);

/// Value reported for humidity and temperature before the first query that
/// reaches the decode stage.
pub const NO_READING: f32 = -999.0;

// Protocol timing. These are fixed by the sensor's wire protocol, not
// tunable configuration.
const START_PULSE_MS: u32 = 18;
const RESPONSE_SETTLE_US: u32 = 40;
const BIT_SAMPLE_DELAY_US: u32 = 28;

// Poll bound for a single level wait. Bits are at most ~120us on the wire,
// so on any realistic MCU this trips only when the sensor has stopped
// driving the line.
const EDGE_TIMEOUT_POLLS: u32 = 10_000;

/// Options to modify the behavior of the DHT driver.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// The minimum time interval that must pass between reads. Cannot be
    /// below this sensor's absolute minimum read interval (i.e.
    /// [`MIN_DHT11_READ_INTERVAL`] or [`MIN_DHT22_READ_INTERVAL`]).
    pub min_read_interval: Duration,
    /// The unit used for reported temperatures. Humidity is unaffected.
    pub unit: TemperatureUnit,
}

pub const DEFAULT_DHT11_OPTIONS: Options = Options {
    min_read_interval: MIN_DHT11_READ_INTERVAL,
    unit: TemperatureUnit::Celsius,
};

pub const DEFAULT_DHT22_OPTIONS: Options = Options {
    min_read_interval: MIN_DHT22_READ_INTERVAL,
    unit: TemperatureUnit::Celsius,
};

macro_rules! dhtxx_impl {
    ($name:ident,
     default_options: $default_options:expr,
     min_read_interval: $min_read_interval:expr,
     decode: $decode:expr
    ) => {
        #[derive(Debug)]
        pub struct $name<TPin, TDelay, TimeFn, ElapsedFn, TTime>
        where
            TimeFn: Fn() -> TTime,
            ElapsedFn: Fn(TTime) -> Duration,
            TTime: Copy,
        {
            base: DhtBase<TPin, TDelay, TimeFn, ElapsedFn, TTime>,
            options: Options,
        }

        impl<TPin, TDelay, TError, TimeFn, ElapsedFn, TTime>
            $name<TPin, TDelay, TimeFn, ElapsedFn, TTime>
        where
            TPin: InputPin + OutputPin + ErrorType<Error = TError>,
            TDelay: DelayNs,
            TimeFn: Fn() -> TTime,
            ElapsedFn: Fn(TTime) -> Duration,
            TTime: Copy,
        {
            /// Constructs a DHT sensor that reads from the given pin.
            ///
            /// The pin must be configured by the HAL as an open-drain output
            /// with the line pulled up (the kit board carries the pull-up
            /// resistor), so that `set_high` releases the line and reads see
            /// the level the sensor drives.
            ///
            /// Reads can sometimes be more reliable with a longer delay, eg.
            /// 2 seconds, so consider setting the `options` value with a
            /// longer minimum read interval if error rates are high. If
            /// options is `None`, then the default options is used (see
            /// [`DEFAULT_DHT11_OPTIONS`] or [`DEFAULT_DHT22_OPTIONS`]).
            ///
            /// The provided `time_fn` closure should provide some
            /// representation of a given instant that can be used with
            /// `elapsed_since_fn` to determine how much time has passed since
            /// then. It does not need to reflect real dates and times, but
            /// only needs to be capable of providing reasonably accurate
            /// durations (i.e. with millisecond precision or better).
            pub fn new(
                pin: TPin,
                delay: TDelay,
                time_fn: TimeFn,
                elapsed_since_fn: ElapsedFn,
                options: Option<Options>,
            ) -> Result<$name<TPin, TDelay, TimeFn, ElapsedFn, TTime>, Error<TError>> {
                Ok($name {
                    base: DhtBase::new(pin, delay, time_fn, elapsed_since_fn)?,
                    options: match options {
                        None => $default_options,
                        Some(options) => {
                            if options.min_read_interval < $min_read_interval {
                                return Err(Error::InvalidArgument);
                            }
                            options
                        }
                    },
                })
            }

            /// Queries the sensor and returns the resulting [`Reading`].
            ///
            /// This busy-waits if called within the minimum read interval of
            /// this DHT sensor, then occupies the calling thread for the full
            /// transaction (up to ~25ms).
            ///
            /// A sensor that does not answer the start condition or a payload
            /// that fails its checksum is *not* an error: both outcomes are
            /// reported through the [`Reading`] flags so that the best
            /// available values remain readable. `Err` is reserved for HAL
            /// failures and for a sensor that stops driving the line after it
            /// acknowledged the start condition ([`Error::Timeout`]).
            pub fn query(&mut self) -> Result<Reading, Error<TError>> {
                self.base.query(stringify!($name), $decode, &self.options)
            }

            /// Returns the values published by the most recent query without
            /// touching the sensor.
            pub fn last_reading(&self) -> Reading {
                self.base.reading()
            }

            /// Selects the temperature unit for subsequent queries.
            ///
            /// Values already published keep the unit they were decoded with.
            pub fn set_unit(&mut self, unit: TemperatureUnit) {
                self.options.unit = unit;
            }
        }
    };
}

dhtxx_impl!(
    Dht11,
    default_options: DEFAULT_DHT11_OPTIONS,
    min_read_interval: MIN_DHT11_READ_INTERVAL,
    decode: decode_dht11
);

dhtxx_impl!(
    Dht22,
    default_options: DEFAULT_DHT22_OPTIONS,
    min_read_interval: MIN_DHT22_READ_INTERVAL,
    decode: decode_dht22
);

#[derive(Debug)]
struct DhtBase<TPin, TDelay, TimeFn, ElapsedFn, TTime>
where
    TimeFn: Fn() -> TTime,
    ElapsedFn: Fn(TTime) -> Duration,
    TTime: Copy,
{
    pin: TPin,
    delay: TDelay,
    time_fn: TimeFn,
    elapsed_since_fn: ElapsedFn,
    last_query_time: TTime,
    humidity: f32,
    temperature: f32,
    checksum_ok: bool,
    responded: bool,
}

impl<TPin, TDelay, TError, TimeFn, ElapsedFn, TTime>
    DhtBase<TPin, TDelay, TimeFn, ElapsedFn, TTime>
where
    TPin: InputPin + OutputPin + ErrorType<Error = TError>,
    TDelay: DelayNs,
    TimeFn: Fn() -> TTime,
    ElapsedFn: Fn(TTime) -> Duration,
    TTime: Copy,
{
    fn new(
        mut pin: TPin,
        delay: TDelay,
        time_fn: TimeFn,
        elapsed_since_fn: ElapsedFn,
    ) -> Result<DhtBase<TPin, TDelay, TimeFn, ElapsedFn, TTime>, Error<TError>> {
        // Idle with the line released so the sensor is ready for a query.
        pin.set_high().map_err(Error::Wrapped)?;
        Ok(DhtBase {
            pin,
            delay,
            last_query_time: time_fn(),
            time_fn,
            elapsed_since_fn,
            humidity: NO_READING,
            temperature: NO_READING,
            checksum_ok: false,
            responded: false,
        })
    }

    fn reading(&self) -> Reading {
        Reading {
            humidity: self.humidity,
            temperature: self.temperature,
            checksum_ok: self.checksum_ok,
            responded: self.responded,
        }
    }

    fn query(
        &mut self,
        label: &'static str,
        decode: fn(&[u8; 5]) -> (f32, f32),
        options: &Options,
    ) -> Result<Reading, Error<TError>> {
        let since_last = (self.elapsed_since_fn)(self.last_query_time);
        if since_last < options.min_read_interval {
            let to_wait = options.min_read_interval - since_last;
            self.delay.delay_us(to_wait.as_micros() as u32);
        }
        let started = (self.time_fn)();

        self.responded = false;
        self.checksum_ok = false;

        // Start condition: hold the line low, then release it and give the
        // sensor a settle window before sampling its answer.
        self.pin.set_low().map_err(Error::Wrapped)?;
        self.delay.delay_ms(START_PULSE_MS);
        self.pin.set_high().map_err(Error::Wrapped)?;
        self.delay.delay_us(RESPONSE_SETTLE_US);

        if self.pin.is_high().map_err(Error::Wrapped)? {
            // Line still idle: nobody home. The previous values stay as the
            // reported state.
            self.last_query_time = (self.time_fn)();
            #[cfg(feature = "log")]
            log::warn!("{} not responding", label);
            #[cfg(feature = "defmt")]
            defmt::warn!("{} not responding", label);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = label;
            return Ok(self.reading());
        }
        self.responded = true;

        let bytes = match self.receive_payload() {
            Ok(bytes) => bytes,
            Err(err) => {
                self.last_query_time = (self.time_fn)();
                return Err(err);
            }
        };
        self.last_query_time = (self.time_fn)();

        let sum = bytes[0] as u16 + bytes[1] as u16 + bytes[2] as u16 + bytes[3] as u16;
        // The checksum byte must match the low 8 bits of the payload sum.
        self.checksum_ok = bytes[4] == sum.to_be_bytes()[1];

        // The payload is decoded and published whether or not the checksum
        // matched; `checksum_ok` carries the verdict.
        let (humidity, temperature) = decode(&bytes);
        self.humidity = humidity;
        self.temperature = options.unit.from_celsius(temperature);

        #[cfg(any(feature = "log", feature = "defmt"))]
        let elapsed_us = (self.elapsed_since_fn)(started).as_micros() as u32;
        #[cfg(feature = "log")]
        log::debug!(
            "{} query completed in {}us: checksum_ok={}, humidity={}, temperature={}",
            label,
            elapsed_us,
            self.checksum_ok,
            self.humidity,
            self.temperature
        );
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "{} query completed in {}us: checksum_ok={}, humidity={}, temperature={}",
            label,
            elapsed_us,
            self.checksum_ok,
            self.humidity,
            self.temperature
        );
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        let _ = started;

        Ok(self.reading())
    }

    /// Waits out the sensor's presence pulses, then samples the 40 payload
    /// bits into 5 bytes, MSB-first within each byte.
    fn receive_payload(&mut self) -> Result<[u8; 5], Error<TError>> {
        wait_while_low(&mut self.pin)?;
        wait_while_high(&mut self.pin)?;

        let mut bytes = [0u8; 5];
        for index in 0..40 {
            // Each bit cell starts with a fixed-length low preamble; the
            // length of the following high pulse encodes the bit. Sampling
            // 28us into the pulse discriminates the two widths.
            wait_while_high(&mut self.pin)?;
            wait_while_low(&mut self.pin)?;
            self.delay.delay_us(BIT_SAMPLE_DELAY_US);
            if self.pin.is_high().map_err(Error::Wrapped)? {
                bytes[index / 8] |= 1 << (7 - index % 8);
            }
        }
        Ok(bytes)
    }
}

#[inline]
fn wait_while_low<TPin, TError>(pin: &mut TPin) -> Result<(), Error<TError>>
where
    TPin: InputPin + ErrorType<Error = TError>,
{
    let mut counter = 0u32;
    while pin.is_low().map_err(Error::Wrapped)? {
        counter += 1;
        if counter > EDGE_TIMEOUT_POLLS {
            return Err(Error::Timeout);
        }
    }
    Ok(())
}

#[inline]
fn wait_while_high<TPin, TError>(pin: &mut TPin) -> Result<(), Error<TError>>
where
    TPin: InputPin + ErrorType<Error = TError>,
{
    let mut counter = 0u32;
    while pin.is_high().map_err(Error::Wrapped)? {
        counter += 1;
        if counter > EDGE_TIMEOUT_POLLS {
            return Err(Error::Timeout);
        }
    }
    Ok(())
}

/// DHT11 payload: integral humidity/temperature bytes plus 1/100ths
/// fraction bytes.
fn decode_dht11(bytes: &[u8; 5]) -> (f32, f32) {
    let humidity = bytes[0] as f32 + bytes[1] as f32 / 100.0;
    let temperature = bytes[2] as f32 + bytes[3] as f32 / 100.0;
    (humidity, temperature)
}

/// DHT22 payload: 16-bit tenths, with bit 7 of the temperature high byte
/// carrying the sign.
fn decode_dht22(bytes: &[u8; 5]) -> (f32, f32) {
    let humidity = (bytes[0] as u16 * 256 + bytes[1] as u16) as f32 / 10.0;
    let magnitude = ((bytes[2] & 0x7F) as u16 * 256 + bytes[3] as u16) as f32 / 10.0;
    let temperature = if bytes[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };
    (humidity, temperature)
}
