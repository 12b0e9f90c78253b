//! The standard timestamp extension (type `-1`).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::DecodeError;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in time: seconds since the Unix epoch plus a sub-second
/// nanosecond component in `0..10⁹`.
///
/// Three wire widths exist; the narrowest lossless one is chosen on encode:
///
/// - 4 bytes: unsigned 32-bit seconds, zero nanoseconds;
/// - 8 bytes: 30-bit nanoseconds packed above 34-bit unsigned seconds;
/// - 12 bytes: 32-bit nanoseconds followed by 64-bit signed seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: u32,
}

impl Timestamp {
    /// Builds a timestamp, carrying nanosecond overflow into the seconds.
    pub fn new(sec: i64, nsec: u64) -> Self {
        let carry = (nsec / NANOS_PER_SEC) as i64;
        Self {
            sec: sec.wrapping_add(carry),
            nsec: (nsec % NANOS_PER_SEC) as u32,
        }
    }

    /// Renders the narrowest lossless wire payload.
    pub fn to_payload(self) -> Vec<u8> {
        if self.sec >= 0 && self.sec >> 34 == 0 {
            if self.nsec == 0 && self.sec >> 32 == 0 {
                return (self.sec as u32).to_be_bytes().to_vec();
            }
            let packed = ((self.nsec as u64) << 34) | self.sec as u64;
            return packed.to_be_bytes().to_vec();
        }
        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&self.nsec.to_be_bytes());
        out.extend_from_slice(&self.sec.to_be_bytes());
        out
    }

    /// Parses any of the three wire payload widths.
    pub fn from_payload(data: &[u8]) -> Result<Self, DecodeError> {
        match data.len() {
            4 => {
                let sec = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                Ok(Self {
                    sec: sec as i64,
                    nsec: 0,
                })
            }
            8 => {
                let packed = u64::from_be_bytes([
                    data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
                ]);
                Ok(Self {
                    sec: (packed & 0x3_ffff_ffff) as i64,
                    nsec: (packed >> 34) as u32,
                })
            }
            12 => {
                let nsec = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                let sec = i64::from_be_bytes([
                    data[4], data[5], data[6], data[7], data[8], data[9], data[10], data[11],
                ]);
                Ok(Self { sec, nsec })
            }
            other => Err(DecodeError::TimestampLength(other)),
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Self {
                sec: d.as_secs() as i64,
                nsec: d.subsec_nanos(),
            },
            Err(e) => {
                let d = e.duration();
                if d.subsec_nanos() == 0 {
                    Self {
                        sec: -(d.as_secs() as i64),
                        nsec: 0,
                    }
                } else {
                    Self {
                        sec: -(d.as_secs() as i64) - 1,
                        nsec: NANOS_PER_SEC as u32 - d.subsec_nanos(),
                    }
                }
            }
        }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        if ts.sec >= 0 {
            UNIX_EPOCH + Duration::new(ts.sec as u64, ts.nsec)
        } else {
            UNIX_EPOCH - Duration::new(ts.sec.unsigned_abs(), 0) + Duration::new(0, ts.nsec)
        }
    }
}
