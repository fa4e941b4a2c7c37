use std::fmt;

use crate::error::Error;

/// Highest value a [`RequestId`] may hold. PE request ids ride in a 7-bit
/// field of the SysEx header, so the namespace is exactly 0..=127.
pub const MAX_REQUEST_ID: u8 = 127;

/// A 7-bit Property Exchange request identifier.
///
/// Carries no relation to MUID or device identity — it is scoped to one
/// `TransactionManager` and is recycled by [`crate::id_pool::IdPool`] as
/// transactions finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u8);

impl RequestId {
    /// Builds a `RequestId` without checking the 0..=127 range.
    ///
    /// Only [`crate::id_pool::IdPool`] should call this: it never hands out
    /// an out-of-range value, so callers constructing ids from pool output
    /// don't need to handle an error that cannot occur.
    pub(crate) fn new_unchecked(value: u8) -> Self {
        debug_assert!(value <= MAX_REQUEST_ID);
        RequestId(value)
    }

    /// Returns the underlying 7-bit value.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for RequestId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > MAX_REQUEST_ID {
            return Err(Error::RequestIdOutOfRange(value));
        }
        Ok(RequestId(value))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque 28-bit MIDI Unique Identifier.
///
/// The core never inspects a `DeviceId` beyond equality — it is an opaque
/// destination tag used only to group transactions for
/// [`crate::manager::TransactionManager::cancel_all_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u32);

const MUID_MASK: u32 = 0x0FFF_FFFF;

impl DeviceId {
    /// Builds a `DeviceId`, masking to the low 28 bits.
    ///
    /// Construction is infallible: an out-of-range MUID is a transport-layer
    /// bug, not something this core can usefully reject — masking keeps the
    /// type's invariant (28 bits) without introducing a `Result` that every
    /// caller would have to unwrap.
    pub fn new(raw: u32) -> Self {
        DeviceId(raw & MUID_MASK)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for DeviceId {
    fn from(raw: u32) -> Self {
        DeviceId::new(raw)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// An HTTP-style PE status code, as extracted by the caller from a response
/// header. The core never parses headers; this type exists only so
/// [`crate::transaction::TransactionOutcome::Error`] has somewhere to put
/// the status the caller already decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeStatus(pub u16);

impl PeStatus {
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for PeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_rejects_out_of_range() {
        assert!(RequestId::try_from(127).is_ok());
        assert_eq!(
            RequestId::try_from(128),
            Err(Error::RequestIdOutOfRange(128))
        );
    }

    #[test]
    fn device_id_masks_to_28_bits() {
        let id = DeviceId::new(0xFFFF_FFFF);
        assert_eq!(id.value(), MUID_MASK);
    }

    #[test]
    fn pe_status_success_range() {
        assert!(PeStatus(200).is_success());
        assert!(PeStatus(204).is_success());
        assert!(!PeStatus(404).is_success());
        assert!(!PeStatus(100).is_success());
    }
}
