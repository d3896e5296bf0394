//! Message objects and their allocation

use crate::bus::OutOfBounds;
use embedded_can::ExtendedId;

/// Largest number of message objects a peripheral can have
pub const MAX_MOBS: u8 = 15;

/// Index of a message object
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mob(u8);

impl Mob {
    /// Validates `index` against the number of message objects `count`.
    /// No peripheral has more than [`MAX_MOBS`] message objects.
    pub fn new(index: u8, count: u8) -> Result<Self, OutOfBounds> {
        if index < count.min(MAX_MOBS) {
            Ok(Self(index))
        } else {
            Err(OutOfBounds)
        }
    }

    /// Position of the message object in the peripheral
    pub fn index(&self) -> u8 {
        self.0
    }
}

impl From<Mob> for u8 {
    fn from(mob: Mob) -> Self {
        mob.0
    }
}

/// What a message object is currently used for
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MobState {
    /// Free for allocation
    #[default]
    Idle,
    /// Listening for frames matching its identifier and mask
    RxArmed,
    /// Holding a frame waiting for transmission
    TxArmed,
}

/// Configuration of a message object as read back from its registers
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MobConfig {
    /// Current use
    pub state: MobState,
    /// Programmed identifier
    pub id: ExtendedId,
    /// Programmed mask, without the forced relaxation bits
    pub mask: ExtendedId,
    /// Programmed data length code
    pub dlc: u8,
}

/// A set of message objects, one bit per index
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MobSet(pub u16);

impl FromIterator<Mob> for MobSet {
    fn from_iter<T: IntoIterator<Item = Mob>>(iter: T) -> Self {
        let mut set = 0_u16;
        for mob in iter.into_iter() {
            set |= 1 << mob.0;
        }
        MobSet(set)
    }
}

impl MobSet {
    /// Set of the first `count` message objects
    pub fn all(count: u8) -> Self {
        Self(((1_u32 << count) - 1) as u16)
    }

    /// Combines a pair of 8-bit bitmap registers (`high` covers 8..=14)
    pub fn from_registers(high: u8, low: u8) -> Self {
        Self(u16::from_be_bytes([high, low]))
    }

    /// Splits into the pair of 8-bit bitmap registers, `(high, low)`
    pub fn to_registers(self) -> (u8, u8) {
        let [high, low] = self.0.to_be_bytes();
        (high, low)
    }

    /// Adds `mob` to the set
    pub fn insert(&mut self, mob: Mob) {
        self.0 |= 1 << mob.0;
    }

    /// Removes `mob` from the set
    pub fn remove(&mut self, mob: Mob) {
        self.0 &= !(1 << mob.0);
    }

    /// `true` if the set holds the message object at `index`
    pub fn contains(&self, index: u8) -> bool {
        index < 16 && self.0 & (1 << index) != 0
    }

    /// An iterator visiting all elements in ascending order.
    pub fn iter(&self) -> Iter {
        Iter {
            flags: *self,
            index: 0,
        }
    }
}

/// An iterator over the indices in a [`MobSet`].
///
/// This `struct` is created by [`MobSet::iter`].
pub struct Iter {
    flags: MobSet,
    index: u8,
}

impl Iterator for Iter {
    type Item = Mob;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < 16 {
            let i = self.index;
            self.index += 1;
            if self.flags.contains(i) {
                return Some(Mob(i));
            }
        }
        None
    }
}

/// Lowest indexed message object among the first `count` that is not in
/// `enabled`
///
/// A message object is owned from the moment its enabled bit is set until the
/// peripheral clears it, so this is the only place deciding ownership.
pub fn find_free_mob(enabled: MobSet, count: u8) -> Option<Mob> {
    (0..count).find(|&i| !enabled.contains(i)).map(Mob)
}
