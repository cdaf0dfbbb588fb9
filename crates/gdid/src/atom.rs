use core::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// A compact, case-sensitive identifier of up to 8 ASCII characters packed
/// into a `u64`.
///
/// Atoms name networks and bindings. Comparing two atoms is a single integer
/// comparison, which keeps resolution cache keys cheap to hash.
///
/// Allowed characters are `[A-Za-z0-9_-]`. The all-zero value is
/// [`Atom::ZERO`] and renders as an empty string.
///
/// # Example
/// ```
/// use gdid::Atom;
///
/// let net: Atom = "internoc".parse().unwrap();
/// assert_eq!(net.to_string(), "internoc");
/// assert!("way-too-long".parse::<Atom>().is_err());
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u64);

impl Atom {
    /// The empty atom.
    pub const ZERO: Self = Self(0);

    /// Maximum number of characters an atom can hold.
    pub const MAX_LEN: usize = 8;

    /// Encodes `value` into an atom.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAtom`] if `value` is empty, longer than
    /// [`Self::MAX_LEN`] or contains a character outside `[A-Za-z0-9_-]`.
    pub fn encode(value: &str) -> Result<Self> {
        let bytes = value.as_bytes();
        if bytes.is_empty() {
            return Err(Self::invalid(value, "empty"));
        }
        if bytes.len() > Self::MAX_LEN {
            return Err(Self::invalid(value, "longer than 8 characters"));
        }

        let mut raw = 0_u64;
        for (i, &b) in bytes.iter().enumerate() {
            if !(b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
                return Err(Self::invalid(value, "only [A-Za-z0-9_-] allowed"));
            }
            raw |= u64::from(b) << (i * 8);
        }
        Ok(Self(raw))
    }

    /// Reconstructs an atom from its packed representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAtom`] if `raw` does not decode to a valid atom.
    pub fn from_raw(raw: u64) -> Result<Self> {
        if raw == 0 {
            return Ok(Self::ZERO);
        }
        let atom = Self(raw);
        let text = atom.to_string();
        // Re-encoding rejects interior zero bytes and illegal characters.
        match Self::encode(&text) {
            Ok(checked) if checked == atom => Ok(atom),
            _ => Err(Self::invalid(&format!("{raw:#018x}"), "not a packed atom")),
        }
    }

    /// Returns the packed representation.
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Returns `true` for [`Atom::ZERO`].
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    fn invalid(value: &str, reason: &'static str) -> Error {
        Error::InvalidAtom {
            value: value.to_owned(),
            reason,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.to_le_bytes() {
            if b == 0 {
                break;
            }
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({self})")
    }
}

impl FromStr for Atom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::encode(s)
    }
}

impl TryFrom<&str> for Atom {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::encode(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Atom {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Atom {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Self::encode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_displays() {
        let atom = Atom::encode("grpc").unwrap();
        assert_eq!(atom.to_string(), "grpc");
        assert_eq!(atom.to_raw(), u64::from_le_bytes(*b"grpc\0\0\0\0"));
        assert_eq!(Atom::from_raw(atom.to_raw()).unwrap(), atom);
    }

    #[test]
    fn full_width_atom() {
        let atom: Atom = "abcdEF-_".parse().unwrap();
        assert_eq!(atom.to_string(), "abcdEF-_");
    }

    #[test]
    fn is_case_sensitive() {
        assert_ne!(Atom::encode("Net").unwrap(), Atom::encode("net").unwrap());
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(Atom::encode("").is_err());
        assert!(Atom::encode("ninechars").is_err());
        assert!(Atom::encode("sp ace").is_err());
        assert!(Atom::encode("dot.ted").is_err());
    }

    #[test]
    fn rejects_corrupt_raw_values() {
        // interior zero byte
        assert!(Atom::from_raw(u64::from_le_bytes(*b"a\0b\0\0\0\0\0")).is_err());
        assert!(Atom::from_raw(u64::from_le_bytes(*b"a.b\0\0\0\0\0")).is_err());
        assert_eq!(Atom::from_raw(0).unwrap(), Atom::ZERO);
        assert!(Atom::ZERO.is_zero());
    }
}
