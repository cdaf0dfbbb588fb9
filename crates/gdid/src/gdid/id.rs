use core::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// A global distributed ID.
///
/// A `Gdid` is unique across the whole system as long as every authority
/// only issues non-overlapping blocks within an era. Its identity is the
/// triple `(era, authority, counter)`; the counter alone is not unique.
///
/// ## Layout
///
/// ```text
///  era (u32)   id (u64)
/// +---------+ +------+------------------------------------------+
/// |   era   | | auth |                 counter                  |
/// +---------+ +------+------------------------------------------+
///              63..60                   59..0
/// ```
///
/// Ordering is by `era` first, then by `id`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gdid {
    era: u32,
    id: u64,
}

impl Gdid {
    /// Bits reserved for the counter.
    pub const COUNTER_BITS: u32 = 60;
    /// Largest counter value an authority can issue within an era.
    pub const MAX_COUNTER: u64 = (1 << Self::COUNTER_BITS) - 1;
    /// Largest authority id.
    pub const MAX_AUTHORITY: u8 = 0x0f;

    pub const ZERO: Self = Self { era: 0, id: 0 };

    /// Builds an id from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `authority` exceeds
    /// [`Self::MAX_AUTHORITY`] or `counter` exceeds [`Self::MAX_COUNTER`].
    pub fn try_new(era: u32, authority: u8, counter: u64) -> Result<Self> {
        if authority > Self::MAX_AUTHORITY {
            return Err(Error::invalid_request(format!(
                "authority {authority} exceeds {}",
                Self::MAX_AUTHORITY
            )));
        }
        if counter > Self::MAX_COUNTER {
            return Err(Error::invalid_request(format!(
                "counter {counter} exceeds {}",
                Self::MAX_COUNTER
            )));
        }
        Ok(Self::new_unchecked(era, authority, counter))
    }

    pub(crate) const fn new_unchecked(era: u32, authority: u8, counter: u64) -> Self {
        Self {
            era,
            id: ((authority as u64) << Self::COUNTER_BITS) | counter,
        }
    }

    /// Reconstructs an id from `era` and the packed authority/counter word.
    pub const fn from_parts(era: u32, id: u64) -> Self {
        Self { era, id }
    }

    pub const fn era(&self) -> u32 {
        self.era
    }

    /// The packed authority/counter word.
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub const fn authority(&self) -> u8 {
        (self.id >> Self::COUNTER_BITS) as u8
    }

    pub const fn counter(&self) -> u64 {
        self.id & Self::MAX_COUNTER
    }

    pub const fn is_zero(&self) -> bool {
        self.era == 0 && self.id == 0
    }
}

impl fmt::Display for Gdid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.era, self.authority(), self.counter())
    }
}

impl fmt::Debug for Gdid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gdid")
            .field("era", &self.era)
            .field("authority", &self.authority())
            .field("counter", &self.counter())
            .finish()
    }
}

impl FromStr for Gdid {
    type Err = Error;

    /// Parses the `era:authority:counter` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::invalid_request(format!("`{s}` is not an era:authority:counter GDID"));

        let mut parts = s.trim().split(':');
        let (Some(era), Some(authority), Some(counter), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Self::try_new(
            era.parse().map_err(|_| invalid())?,
            authority.parse().map_err(|_| invalid())?,
            counter.parse().map_err(|_| invalid())?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_authority_above_counter() {
        let id = Gdid::try_new(3, 0x0a, 12345).unwrap();
        assert_eq!(id.era(), 3);
        assert_eq!(id.authority(), 0x0a);
        assert_eq!(id.counter(), 12345);
        assert_eq!(id.id(), (0x0a_u64 << 60) | 12345);
        assert_eq!(Gdid::from_parts(3, id.id()), id);
    }

    #[test]
    fn bounds_are_enforced() {
        assert!(Gdid::try_new(0, 16, 0).is_err());
        assert!(Gdid::try_new(0, 0, Gdid::MAX_COUNTER + 1).is_err());
        let max = Gdid::try_new(u32::MAX, 15, Gdid::MAX_COUNTER).unwrap();
        assert_eq!(max.id(), u64::MAX);
    }

    #[test]
    fn orders_by_era_then_id() {
        let a = Gdid::try_new(1, 15, 100).unwrap();
        let b = Gdid::try_new(2, 0, 0).unwrap();
        let c = Gdid::try_new(2, 0, 1).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn same_counter_in_different_eras_is_distinct() {
        let a = Gdid::try_new(1, 2, 77).unwrap();
        let b = Gdid::try_new(2, 2, 77).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn display_and_parse() {
        let id = Gdid::try_new(7, 1, 5000).unwrap();
        assert_eq!(id.to_string(), "7:1:5000");
        assert_eq!("7:1:5000".parse::<Gdid>().unwrap(), id);
        assert!("7:1".parse::<Gdid>().is_err());
        assert!("7:1:2:3".parse::<Gdid>().is_err());
        assert!("7:99:2".parse::<Gdid>().is_err());
        assert!("x:1:2".parse::<Gdid>().is_err());
    }
}
