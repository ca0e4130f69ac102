use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// The number of general-purpose RAM slots on the device.
pub const RAM_SLOTS: u8 = 31;

// Command codes for the clock/calendar registers. Each code is the even
// write address; the device pairs it with the odd read address one above.
#[derive(Clone, Copy, Debug)]
enum Register {
    Second = 0x80,
    Minute = 0x82,
    Hour = 0x84,
    Day = 0x86,
    Month = 0x88,
    Weekday = 0x8A,
    Year = 0x8C,
    WriteProtect = 0x8E,
}

impl Register {
    fn write_address(self) -> u8 {
        self as u8
    }

    fn read_address(self) -> u8 {
        self as u8 + 1
    }
}

const RAM_BASE_ADDRESS: u8 = 0xC0;

// Bit 7 of the write-protect register; must be cleared before any other
// register will accept a write.
const WRITE_PROTECT_BIT: u8 = 0x80;
// Bit 7 of the seconds register; halts the oscillator while set.
const CLOCK_HALT_BIT: u8 = 0x80;

// The device wants >= 1us between clock edges at 2V. Generous for 3.3V
// parts, but the bus only moves a few bytes per transaction.
const CLOCK_HALF_PERIOD_US: u32 = 1;

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

/// A full calendar/time snapshot, as used by [`Ds1302::set_datetime`] and
/// [`Ds1302::datetime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    /// Full year, 2000-2099.
    pub year: u16,
    /// 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    /// Day of week, 1-7.
    pub weekday: u8,
    /// 0-23.
    pub hour: u8,
    /// 0-59.
    pub minute: u8,
    /// 0-59.
    pub second: u8,
}

/// Driver for a DS1302 real-time clock on a 3-wire (clock/data/chip-select)
/// serial bus.
///
/// Every accessor performs a live register transaction; nothing is cached.
/// The driver assumes exclusive ownership of its three pins.
///
/// The data pin must be configured by the HAL so that it can both drive the
/// line and read it back (an open-drain output, or a bidirectional pin with
/// the DS1302's weak drive). Getters defensively clamp whatever the device
/// returns into the field's legal domain, so a flaky bus reads as boundary
/// values rather than garbage.
pub struct Ds1302<TClk, TDio, TCs, TDelay> {
    clk: TClk,
    dio: TDio,
    cs: TCs,
    delay: TDelay,
}

impl<TClk, TDio, TCs, TDelay, TError> Ds1302<TClk, TDio, TCs, TDelay>
where
    TClk: OutputPin + ErrorType<Error = TError>,
    TDio: InputPin + OutputPin + ErrorType<Error = TError>,
    TCs: OutputPin + ErrorType<Error = TError>,
    TDelay: DelayNs,
{
    /// Constructs a driver from the three bus pins, leaving the bus idle
    /// (clock low, chip deselected).
    pub fn new(
        clk: TClk,
        dio: TDio,
        cs: TCs,
        delay: TDelay,
    ) -> Result<Ds1302<TClk, TDio, TCs, TDelay>, Error<TError>> {
        let mut rtc = Ds1302 {
            clk,
            dio,
            cs,
            delay,
        };
        rtc.clk.set_low().map_err(Error::Wrapped)?;
        rtc.cs.set_low().map_err(Error::Wrapped)?;
        Ok(rtc)
    }

    /// Reads the year (2000-2099).
    pub fn year(&mut self) -> Result<u16, Error<TError>> {
        let decoded = bcd_to_dec(self.bus_read(Register::Year.read_address())?);
        Ok(decoded.min(99) as u16 + 2000)
    }

    /// Sets the year. Accepts 2000-2099.
    pub fn set_year(&mut self, year: u16) -> Result<(), Error<TError>> {
        if !(2000..=2099).contains(&year) {
            return Err(Error::InvalidArgument);
        }
        self.guarded_write(
            Register::Year.write_address(),
            dec_to_bcd((year - 2000) as u8),
        )
    }

    /// Reads the month (1-12).
    pub fn month(&mut self) -> Result<u8, Error<TError>> {
        let decoded = bcd_to_dec(self.bus_read(Register::Month.read_address())?);
        Ok(decoded.clamp(1, 12))
    }

    /// Sets the month. Accepts 1-12.
    pub fn set_month(&mut self, month: u8) -> Result<(), Error<TError>> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidArgument);
        }
        self.guarded_write(Register::Month.write_address(), dec_to_bcd(month))
    }

    /// Reads the day of month (1-31).
    pub fn day(&mut self) -> Result<u8, Error<TError>> {
        let decoded = bcd_to_dec(self.bus_read(Register::Day.read_address())?);
        Ok(decoded.clamp(1, 31))
    }

    /// Sets the day of month. Accepts 1-31.
    pub fn set_day(&mut self, day: u8) -> Result<(), Error<TError>> {
        if !(1..=31).contains(&day) {
            return Err(Error::InvalidArgument);
        }
        self.guarded_write(Register::Day.write_address(), dec_to_bcd(day))
    }

    /// Reads the day of week (1-7).
    pub fn weekday(&mut self) -> Result<u8, Error<TError>> {
        let decoded = bcd_to_dec(self.bus_read(Register::Weekday.read_address())?);
        Ok(decoded.clamp(1, 7))
    }

    /// Sets the day of week. Accepts 1-7.
    pub fn set_weekday(&mut self, weekday: u8) -> Result<(), Error<TError>> {
        if !(1..=7).contains(&weekday) {
            return Err(Error::InvalidArgument);
        }
        self.guarded_write(Register::Weekday.write_address(), dec_to_bcd(weekday))
    }

    /// Reads the hour (0-23).
    pub fn hour(&mut self) -> Result<u8, Error<TError>> {
        let decoded = bcd_to_dec(self.bus_read(Register::Hour.read_address())?);
        Ok(decoded.min(23))
    }

    /// Sets the hour. Accepts 0-23 (the clock runs in 24-hour mode).
    pub fn set_hour(&mut self, hour: u8) -> Result<(), Error<TError>> {
        if hour > 23 {
            return Err(Error::InvalidArgument);
        }
        self.guarded_write(Register::Hour.write_address(), dec_to_bcd(hour))
    }

    /// Reads the minute (0-59).
    pub fn minute(&mut self) -> Result<u8, Error<TError>> {
        let decoded = bcd_to_dec(self.bus_read(Register::Minute.read_address())?);
        Ok(decoded.min(59))
    }

    /// Sets the minute. Accepts 0-59.
    pub fn set_minute(&mut self, minute: u8) -> Result<(), Error<TError>> {
        if minute > 59 {
            return Err(Error::InvalidArgument);
        }
        self.guarded_write(Register::Minute.write_address(), dec_to_bcd(minute))
    }

    /// Reads the second (0-59). The clock-halt flag is masked out of the
    /// value first so a paused clock still reads back its stored second.
    pub fn second(&mut self) -> Result<u8, Error<TError>> {
        let raw = self.bus_read(Register::Second.read_address())?;
        Ok(bcd_to_dec(raw & !CLOCK_HALT_BIT).min(59))
    }

    /// Sets the second. Accepts 0-59.
    ///
    /// Writing the seconds register clears the clock-halt flag, so this also
    /// resumes a paused clock.
    pub fn set_second(&mut self, second: u8) -> Result<(), Error<TError>> {
        if second > 59 {
            return Err(Error::InvalidArgument);
        }
        self.guarded_write(Register::Second.write_address(), dec_to_bcd(second))
    }

    /// Sets all calendar/time fields in one call.
    pub fn set_datetime(&mut self, datetime: &DateTime) -> Result<(), Error<TError>> {
        self.set_year(datetime.year)?;
        self.set_month(datetime.month)?;
        self.set_day(datetime.day)?;
        self.set_weekday(datetime.weekday)?;
        self.set_hour(datetime.hour)?;
        self.set_minute(datetime.minute)?;
        self.set_second(datetime.second)
    }

    /// Reads all calendar/time fields in one call.
    ///
    /// The fields are read in separate transactions, so a tick can land
    /// between them; re-read if `second` wrapped.
    pub fn datetime(&mut self) -> Result<DateTime, Error<TError>> {
        Ok(DateTime {
            year: self.year()?,
            month: self.month()?,
            day: self.day()?,
            weekday: self.weekday()?,
            hour: self.hour()?,
            minute: self.minute()?,
            second: self.second()?,
        })
    }

    /// Resumes the clock by clearing the halt flag in the seconds register.
    /// The stored second is preserved.
    pub fn start(&mut self) -> Result<(), Error<TError>> {
        let raw = self.bus_read(Register::Second.read_address())?;
        self.guarded_write(Register::Second.write_address(), raw & !CLOCK_HALT_BIT)
    }

    /// Pauses the clock by setting the halt flag in the seconds register.
    /// The stored second is preserved and timekeeping stops.
    pub fn pause(&mut self) -> Result<(), Error<TError>> {
        let raw = self.bus_read(Register::Second.read_address())?;
        self.guarded_write(Register::Second.write_address(), raw | CLOCK_HALT_BIT)
    }

    /// Reads one of the [`RAM_SLOTS`] general-purpose bytes.
    pub fn read_ram(&mut self, index: u8) -> Result<u8, Error<TError>> {
        if index >= RAM_SLOTS {
            return Err(Error::InvalidArgument);
        }
        self.bus_read(RAM_BASE_ADDRESS + index * 2 + 1)
    }

    /// Writes one of the [`RAM_SLOTS`] general-purpose bytes.
    pub fn write_ram(&mut self, index: u8, value: u8) -> Result<(), Error<TError>> {
        if index >= RAM_SLOTS {
            return Err(Error::InvalidArgument);
        }
        self.guarded_write(RAM_BASE_ADDRESS + index * 2, value)
    }

    /// Releases the underlying pins and delay.
    pub fn release(self) -> (TClk, TDio, TCs, TDelay) {
        (self.clk, self.dio, self.cs, self.delay)
    }

    /// Performs a write with the write-protect register cleared around it.
    ///
    /// The device powers up write-protected and is kept that way between
    /// operations: unlock, mutate, re-lock on every exit path.
    fn guarded_write(&mut self, address: u8, value: u8) -> Result<(), Error<TError>> {
        self.bus_write(Register::WriteProtect.write_address(), 0x00)?;
        let result = self.bus_write(address, value);
        let relock = self.bus_write(Register::WriteProtect.write_address(), WRITE_PROTECT_BIT);
        match (result, relock) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), _) => Err(err),
            (Ok(()), Err(err)) => Err(err),
        }
    }

    /// One read transaction: select, clock out the command, clock in the
    /// response, deselect.
    fn bus_read(&mut self, address: u8) -> Result<u8, Error<TError>> {
        self.cs.set_high().map_err(Error::Wrapped)?;
        let result = match self.write_byte(address) {
            Ok(()) => self.read_byte(),
            Err(err) => Err(err),
        };
        let deselect = self.cs.set_low().map_err(Error::Wrapped);
        match (result, deselect) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
        }
    }

    /// One write transaction: select, clock out the command byte then the
    /// payload byte, deselect.
    fn bus_write(&mut self, address: u8, value: u8) -> Result<(), Error<TError>> {
        self.cs.set_high().map_err(Error::Wrapped)?;
        let result = match self.write_byte(address) {
            Ok(()) => self.write_byte(value),
            Err(err) => Err(err),
        };
        let deselect = self.cs.set_low().map_err(Error::Wrapped);
        match (result, deselect) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), _) => Err(err),
            (Ok(()), Err(err)) => Err(err),
        }
    }

    /// Clocks one byte out on the data line, LSB first.
    fn write_byte(&mut self, byte: u8) -> Result<(), Error<TError>> {
        for bit in 0..8 {
            if (byte >> bit) & 1 == 1 {
                self.dio.set_high().map_err(Error::Wrapped)?;
            } else {
                self.dio.set_low().map_err(Error::Wrapped)?;
            }
            self.pulse_clock()?;
        }
        Ok(())
    }

    /// Clocks one byte in from the data line, LSB first. The device puts
    /// each bit on the line ahead of the clock pulse.
    fn read_byte(&mut self) -> Result<u8, Error<TError>> {
        let mut byte = 0u8;
        for bit in 0..8 {
            if self.dio.is_high().map_err(Error::Wrapped)? {
                byte |= 1 << bit;
            }
            self.pulse_clock()?;
        }
        Ok(byte)
    }

    fn pulse_clock(&mut self) -> Result<(), Error<TError>> {
        self.delay.delay_us(CLOCK_HALF_PERIOD_US);
        self.clk.set_high().map_err(Error::Wrapped)?;
        self.delay.delay_us(CLOCK_HALF_PERIOD_US);
        self.clk.set_low().map_err(Error::Wrapped)?;
        Ok(())
    }
}

/// Decodes a packed binary-coded-decimal byte.
fn bcd_to_dec(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

/// Encodes a decimal value (0-99) as packed binary-coded decimal.
fn dec_to_bcd(value: u8) -> u8 {
    (value / 10) * 16 + value % 10
}
