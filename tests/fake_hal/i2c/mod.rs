use embedded_hal::i2c::{self, ErrorType, I2c, Operation, SevenBitAddress};

#[derive(Debug, PartialEq)]
pub enum Error {}

impl i2c::Error for Error {
    fn kind(&self) -> i2c::ErrorKind {
        match *self {}
    }
}

/// One bus operation as seen by the fake.
#[derive(Debug, PartialEq)]
pub enum Transaction {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
}

/// A scripted I2C bus.
///
/// Writes are recorded verbatim. Each read serves the next response queued
/// with `queue_read`, falling back to the `set_default_read` response once
/// the queue is empty (a short response pads with zeros).
#[derive(Debug)]
pub struct Bus {
    transactions: Vec<Transaction>,
    reads: Vec<Vec<u8>>,
    read_index: usize,
    default_read: Option<Vec<u8>>,
}

impl Bus {
    pub fn new() -> Bus {
        Bus {
            transactions: Vec::new(),
            reads: Vec::new(),
            read_index: 0,
            default_read: None,
        }
    }

    pub fn queue_read(&mut self, data: Vec<u8>) {
        self.reads.push(data);
    }

    pub fn set_default_read(&mut self, data: Vec<u8>) {
        self.default_read = Some(data);
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    fn next_read(&mut self) -> Vec<u8> {
        if self.read_index < self.reads.len() {
            self.read_index += 1;
            return self.reads[self.read_index - 1].clone();
        }
        self.default_read
            .clone()
            .expect("fake bus has no response left to serve")
    }
}

impl ErrorType for Bus {
    type Error = Error;
}

impl I2c for Bus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    self.transactions.push(Transaction::Write {
                        address,
                        bytes: bytes.to_vec(),
                    });
                }
                Operation::Read(buffer) => {
                    let data = self.next_read();
                    for (index, byte) in buffer.iter_mut().enumerate() {
                        *byte = *data.get(index).unwrap_or(&0);
                    }
                    self.transactions.push(Transaction::Read {
                        address,
                        len: buffer.len(),
                    });
                }
            }
        }
        Ok(())
    }
}
