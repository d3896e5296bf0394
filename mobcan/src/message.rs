//! Handling of messages/frames

use embedded_can::{ExtendedId, Id};

/// Largest data length code of a classic CAN frame
pub const MAX_DLC: u8 = 8;

/// Requested data length codes above [`MAX_DLC`] are treated as [`MAX_DLC`]
pub fn clamp_dlc(dlc: u8) -> u8 {
    dlc.min(MAX_DLC)
}

/// Classic CAN data frame with an extended (29-bit) identifier
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    id: ExtendedId,
    dlc: u8,
    data: [u8; MAX_DLC as usize],
}

impl Frame {
    /// Creates a data frame. Returns `None` if `data` does not fit.
    pub fn with_data(id: ExtendedId, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DLC as usize {
            return None;
        }
        let mut frame = Self {
            id,
            dlc: data.len() as u8,
            data: [0; MAX_DLC as usize],
        };
        frame.data[..data.len()].copy_from_slice(data);
        Some(frame)
    }

    /// Identifier of the frame
    pub fn extended_id(&self) -> ExtendedId {
        self.id
    }

    pub(crate) fn from_parts(id: ExtendedId, dlc: u8, data: [u8; MAX_DLC as usize]) -> Self {
        Self {
            id,
            dlc: clamp_dlc(dlc),
            data,
        }
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Extended(id) => Self::with_data(id, data),
            // Message objects are always configured for 29-bit identifiers
            Id::Standard(_) => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        true
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        Id::Extended(self.id)
    }

    fn dlc(&self) -> usize {
        self.dlc.into()
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}
