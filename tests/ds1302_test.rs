use edukit_drivers::ds1302::{self, DateTime};

mod fake_hal;
use fake_hal::delay as fake_delay;
use fake_hal::digital as fake_digital;

type Rtc =
    ds1302::Ds1302<fake_digital::Pin, fake_digital::Pin, fake_digital::Pin, fake_delay::Delay>;

fn new_rtc(dio_data: Vec<u8>) -> Result<Rtc, ds1302::Error<fake_digital::Error>> {
    let clk = fake_digital::Pin::new();
    let mut dio = fake_digital::Pin::new();
    if !dio_data.is_empty() {
        dio.set_data(dio_data);
    }
    let cs = fake_digital::Pin::new();
    ds1302::Ds1302::new(clk, dio, cs, fake_delay::Delay::new())
}

/// The eight levels a byte puts on the data line, LSB first.
fn bits_lsb(byte: u8) -> Vec<u8> {
    (0..8).map(|bit| (byte >> bit) & 1).collect()
}

fn bytes_lsb(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|byte| bits_lsb(*byte)).collect()
}

#[test]
fn second_reads_through_the_paired_read_address(
) -> Result<(), ds1302::Error<fake_digital::Error>> {
    // The device answers 0x25 (BCD 25), LSB first.
    let mut rtc = new_rtc(bits_lsb(0x25))?;

    assert_eq!(rtc.second()?, 25);

    let (clk, dio, cs, _) = rtc.release();
    // Command 0x81: seconds write address 0x80, read variant one above.
    assert_eq!(dio.written(), bytes_lsb(&[0x81]).as_slice());
    // One select/deselect bracket around the transaction.
    assert_eq!(cs.written(), &[0, 1, 0]);
    // Idle low, then 16 high/low pulses: 8 command bits + 8 response bits.
    let mut expected_clk = vec![0];
    for _ in 0..16 {
        expected_clk.extend_from_slice(&[1, 0]);
    }
    assert_eq!(clk.written(), expected_clk.as_slice());
    Ok(())
}

#[test]
fn set_second_brackets_the_write_with_the_write_protect_registers(
) -> Result<(), ds1302::Error<fake_digital::Error>> {
    let mut rtc = new_rtc(vec![])?;

    rtc.set_second(25)?;

    let (_, dio, cs, _) = rtc.release();
    // Unlock (0x8E <- 0x00), write seconds (0x80 <- BCD 25), relock
    // (0x8E <- 0x80).
    let expected = bytes_lsb(&[0x8E, 0x00, 0x80, 0x25, 0x8E, 0x80]);
    assert_eq!(dio.written(), expected.as_slice());
    assert_eq!(cs.written(), &[0, 1, 0, 1, 0, 1, 0]);
    Ok(())
}

#[test]
fn year_is_clamped_to_2099() -> Result<(), ds1302::Error<fake_digital::Error>> {
    // 0xA0 decodes as 100, past the two-digit range the field can hold.
    let mut rtc = new_rtc(bits_lsb(0xA0))?;
    assert_eq!(rtc.year()?, 2099);
    Ok(())
}

#[test]
fn year_decodes_normally_in_range() -> Result<(), ds1302::Error<fake_digital::Error>> {
    let mut rtc = new_rtc(bits_lsb(0x24))?;
    assert_eq!(rtc.year()?, 2024);
    Ok(())
}

#[test]
fn month_clamps_out_of_range_device_bytes() -> Result<(), ds1302::Error<fake_digital::Error>> {
    // 0x00 decodes as 0; months live in 1-12.
    let mut rtc = new_rtc(bits_lsb(0x00))?;
    assert_eq!(rtc.month()?, 1);

    // 0x1F has a non-decimal nibble and decodes as 25.
    let mut rtc = new_rtc(bits_lsb(0x1F))?;
    assert_eq!(rtc.month()?, 12);
    Ok(())
}

#[test]
fn hour_clamps_to_23() -> Result<(), ds1302::Error<fake_digital::Error>> {
    let mut rtc = new_rtc(bits_lsb(0x31))?;
    assert_eq!(rtc.hour()?, 23);
    Ok(())
}

#[test]
fn setters_reject_out_of_domain_values() -> Result<(), ds1302::Error<fake_digital::Error>> {
    let mut rtc = new_rtc(vec![])?;

    assert_eq!(rtc.set_month(0), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.set_month(13), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.set_day(32), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.set_weekday(8), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.set_hour(24), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.set_minute(60), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.set_second(60), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.set_year(1999), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.set_year(2100), Err(ds1302::Error::InvalidArgument));

    // A rejected setter never touches the bus.
    let (_, dio, cs, _) = rtc.release();
    assert!(dio.written().is_empty());
    assert_eq!(cs.written(), &[0]);
    Ok(())
}

#[test]
fn pause_sets_the_halt_flag_and_preserves_the_second(
) -> Result<(), ds1302::Error<fake_digital::Error>> {
    // pause() first reads the raw seconds register (0x25), then a later
    // second() sees the halted register (0xA5).
    let mut data = bits_lsb(0x25);
    data.extend_from_slice(&bits_lsb(0xA5));
    let mut rtc = new_rtc(data)?;

    rtc.pause()?;
    assert_eq!(rtc.second()?, 25);

    let (_, dio, _, _) = rtc.release();
    // Read command, then the guarded write of 0x25 | 0x80.
    let mut expected = bytes_lsb(&[0x81]);
    expected.extend_from_slice(&bytes_lsb(&[0x8E, 0x00, 0x80, 0xA5, 0x8E, 0x80]));
    expected.extend_from_slice(&bytes_lsb(&[0x81]));
    assert_eq!(dio.written(), expected.as_slice());
    Ok(())
}

#[test]
fn start_clears_the_halt_flag() -> Result<(), ds1302::Error<fake_digital::Error>> {
    let mut rtc = new_rtc(bits_lsb(0xA5))?;

    rtc.start()?;

    let (_, dio, _, _) = rtc.release();
    let mut expected = bytes_lsb(&[0x81]);
    expected.extend_from_slice(&bytes_lsb(&[0x8E, 0x00, 0x80, 0x25, 0x8E, 0x80]));
    assert_eq!(dio.written(), expected.as_slice());
    Ok(())
}

#[test]
fn ram_slots_map_to_interleaved_addresses() -> Result<(), ds1302::Error<fake_digital::Error>> {
    let mut rtc = new_rtc(bits_lsb(0xAB))?;

    assert_eq!(rtc.read_ram(2)?, 0xAB);
    rtc.write_ram(2, 0xCD)?;

    let (_, dio, _, _) = rtc.release();
    // Slot 2 reads at 0xC5 and writes at 0xC4, under the usual guard.
    let mut expected = bytes_lsb(&[0xC5]);
    expected.extend_from_slice(&bytes_lsb(&[0x8E, 0x00, 0xC4, 0xCD, 0x8E, 0x80]));
    assert_eq!(dio.written(), expected.as_slice());
    Ok(())
}

#[test]
fn ram_index_is_bounded() -> Result<(), ds1302::Error<fake_digital::Error>> {
    let mut rtc = new_rtc(vec![])?;
    assert_eq!(rtc.read_ram(31), Err(ds1302::Error::InvalidArgument));
    assert_eq!(rtc.write_ram(31, 0), Err(ds1302::Error::InvalidArgument));
    Ok(())
}

#[test]
fn datetime_reads_every_field() -> Result<(), ds1302::Error<fake_digital::Error>> {
    // year, month, day, weekday, hour, minute, second.
    let registers = [0x24u8, 0x08, 0x15, 0x04, 0x13, 0x37, 0x59];
    let mut rtc = new_rtc(bytes_lsb(&registers))?;

    assert_eq!(
        rtc.datetime()?,
        DateTime {
            year: 2024,
            month: 8,
            day: 15,
            weekday: 4,
            hour: 13,
            minute: 37,
            second: 59,
        }
    );
    Ok(())
}

#[test]
fn set_datetime_writes_every_field_under_guard() -> Result<(), ds1302::Error<fake_digital::Error>>
{
    let mut rtc = new_rtc(vec![])?;

    rtc.set_datetime(&DateTime {
        year: 2024,
        month: 8,
        day: 15,
        weekday: 4,
        hour: 13,
        minute: 37,
        second: 59,
    })?;

    let (_, dio, _, _) = rtc.release();
    let mut expected = Vec::new();
    for (register, value) in [
        (0x8Cu8, 0x24u8),
        (0x88, 0x08),
        (0x86, 0x15),
        (0x8A, 0x04),
        (0x84, 0x13),
        (0x82, 0x37),
        (0x80, 0x59),
    ] {
        expected.extend_from_slice(&bytes_lsb(&[0x8E, 0x00, register, value, 0x8E, 0x80]));
    }
    assert_eq!(dio.written(), expected.as_slice());
    Ok(())
}

#[test]
fn set_datetime_rejects_invalid_fields() -> Result<(), ds1302::Error<fake_digital::Error>> {
    let mut rtc = new_rtc(vec![])?;
    let result = rtc.set_datetime(&DateTime {
        year: 2024,
        month: 13,
        day: 1,
        weekday: 1,
        hour: 0,
        minute: 0,
        second: 0,
    });
    assert_eq!(result, Err(ds1302::Error::InvalidArgument));
    Ok(())
}
