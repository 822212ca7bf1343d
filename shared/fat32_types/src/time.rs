/// Packed FAT date and time pair as stored in a directory entry.
///
/// `date = (year - 1980) << 9 | month << 5 | day`
/// `time = hour << 11 | minute << 5 | second / 2`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FatDateTime {
    pub date: u16,
    pub time: u16,
}

impl FatDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    pub const EPOCH: Self = Self { date: (1 << 5) | 1, time: 0 };

    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let year = year.clamp(1980, 2107);
        let date = ((year - 1980) << 9) | ((month as u16) << 5) | day as u16;
        let time = ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 / 2);
        Self { date, time }
    }

    /// Seconds since 1970-01-01 UTC.
    pub fn from_unix_seconds(epoch: u64) -> Self {
        let (year, month, day, hour, minute, second) = epoch_to_ymdhms(epoch);
        Self::new(year, month, day, hour, minute, second)
    }

    pub fn year(self) -> u16 { 1980 + (self.date >> 9) }
    pub fn month(self) -> u8 { ((self.date >> 5) & 0x0F) as u8 }
    pub fn day(self) -> u8 { (self.date & 0x1F) as u8 }
    pub fn hour(self) -> u8 { (self.time >> 11) as u8 }
    pub fn minute(self) -> u8 { ((self.time >> 5) & 0x3F) as u8 }
    pub fn second(self) -> u8 { ((self.time & 0x1F) * 2) as u8 }
}

fn epoch_to_ymdhms(epoch: u64) -> (u16, u8, u8, u8, u8, u8) {
    const SECS_PER_DAY: u64 = 86_400;
    const SECS_PER_HOUR: u64 = 3_600;
    const SECS_PER_MIN: u64 = 60;
    let mut days = epoch / SECS_PER_DAY;
    let mut secs = epoch % SECS_PER_DAY;
    let hour = (secs / SECS_PER_HOUR) as u8;
    secs %= SECS_PER_HOUR;
    let minute = (secs / SECS_PER_MIN) as u8;
    let second = (secs % SECS_PER_MIN) as u8;

    let mut year: u16 = 1970;
    loop {
        let year_days = if is_leap(year) { 366 } else { 365 };
        if days >= year_days {
            days -= year_days;
            year += 1;
        } else {
            break;
        }
    }

    let mut month: u8 = 1;
    loop {
        let dim = days_in_month(year, month) as u64;
        if days >= dim {
            days -= dim;
            month += 1;
        } else {
            break;
        }
    }
    let day = (days + 1) as u8;
    (year, month, day, hour, minute, second)
}

fn is_leap(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
