use embedded_hal::digital::{self, ErrorType, InputPin, OutputPin};

#[derive(Debug, PartialEq)]
pub enum Error {}

impl digital::Error for Error {
    fn kind(&self) -> digital::ErrorKind {
        match *self {}
    }
}

/// A scripted GPIO pin.
///
/// Every `is_high`/`is_low` call consumes the next sample from the data set
/// with `set_data` (panicking if the script runs dry), or returns the
/// default level when no data is set. Levels driven through `OutputPin` are
/// recorded for inspection after the driver releases the pin.
#[derive(Debug)]
pub struct Pin {
    data_to_read: Option<Vec<u8>>,
    data_index: usize,
    default_data: bool,
    writes: Vec<u8>,
}

impl Pin {
    pub fn new() -> Pin {
        Pin {
            data_to_read: None,
            data_index: 0,
            default_data: false,
            writes: Vec::new(),
        }
    }

    pub fn set_default_data(&mut self, default: bool) {
        self.default_data = default;
        self.data_to_read = None;
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data_to_read = Some(data);
        self.data_index = 0;
    }

    /// The levels driven onto the pin so far, 0 for low and 1 for high.
    pub fn written(&self) -> &[u8] {
        self.writes.as_slice()
    }
}

impl ErrorType for Pin {
    type Error = Error;
}

impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        match &self.data_to_read {
            None => Ok(self.default_data),
            Some(data) => {
                let sample = data[self.data_index];
                self.data_index += 1;
                Ok(sample > 0)
            }
        }
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_high()?)
    }
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.writes.push(0);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.writes.push(1);
        Ok(())
    }
}
