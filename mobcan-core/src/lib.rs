#![no_std]
#![warn(missing_docs)]

//! `mobcan-core` provides the abstractions that serve as a thin integration
//! layer between the platform independent [`mobcan`] driver and platform
//! specific HAL crates (in documentation also referred to as _target HALs_).
//!
//! The CAN controllers targeted by [`mobcan`] expose their message buffers
//! ("Message Objects", MObs) through a *paged* register bank: writing the page
//! selector makes the control, status, identifier, mask and data registers of
//! one MOb addressable, while a handful of global registers stay visible at
//! all times. [`RegisterSurface`] models exactly that, which allows the driver
//! logic to run against real hardware through [`mmio::Mmio`] or against a
//! software register bank in host tests.
//!
//! Integrators of this crate into any given target HAL are responsible for
//! soundness of trait implementations and conforming to their respective safety
//! prerequisites.
//!
//! [`mobcan`]: <https://docs.rs/crate/mobcan/>

pub mod mmio;

pub use generic_array::typenum;

use typenum::{IsLessOrEqual, True, Unsigned, U15};

/// Registers that are visible regardless of the selected page
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GlobalRegister {
    /// CANGCON, general control
    Gcon,
    /// CANGSTA, general status
    Gsta,
    /// CANGIT, general interrupt flags (write 1 to clear)
    Git,
    /// CANGIE, general interrupt enable
    Gie,
    /// CANEN2, enabled MObs 0..=7
    En2,
    /// CANEN1, enabled MObs 8..=14
    En1,
    /// CANIE2, interrupt enable for MObs 0..=7
    Ie2,
    /// CANIE1, interrupt enable for MObs 8..=14
    Ie1,
    /// CANSIT2, pending interrupt for MObs 0..=7
    Sit2,
    /// CANSIT1, pending interrupt for MObs 8..=14
    Sit1,
    /// CANBT1, bit timing 1
    Bt1,
    /// CANBT2, bit timing 2
    Bt2,
    /// CANBT3, bit timing 3
    Bt3,
    /// CANTCON, timer prescaler
    Tcon,
    /// CANTEC, transmit error counter
    Tec,
    /// CANREC, receive error counter
    Rec,
    /// CANHPMOB, highest priority MOb
    Hpmob,
    /// CANPAGE, page selector
    Page,
}

/// Registers of the MOb currently selected through [`GlobalRegister::Page`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MobRegister {
    /// CANSTMOB, MOb status
    Status,
    /// CANCDMOB, MOb control and DLC
    Control,
    /// CANIDT4, identifier tag, least significant
    Idt4,
    /// CANIDT3
    Idt3,
    /// CANIDT2
    Idt2,
    /// CANIDT1, identifier tag, most significant
    Idt1,
    /// CANIDM4, identifier mask, least significant
    Idm4,
    /// CANIDM3
    Idm3,
    /// CANIDM2
    Idm2,
    /// CANIDM1, identifier mask, most significant
    Idm1,
    /// CANMSG, data port indexed by the page's data index
    Msg,
}

impl MobRegister {
    /// Identifier registers, most significant first
    pub const IDENTIFIER: [MobRegister; 4] = [Self::Idt1, Self::Idt2, Self::Idt3, Self::Idt4];
    /// Mask registers, most significant first
    pub const MASK: [MobRegister; 4] = [Self::Idm1, Self::Idm2, Self::Idm3, Self::Idm4];
}

/// Trait representing the paged register bank of a MOb based CAN peripheral
///
/// All accessors take `&self`: the registers are shared between the normal
/// execution context and the CAN interrupt handler, and implementations are
/// expected to use volatile accesses (or interior mutability, for simulated
/// banks). Keeping the *page selector* consistent across both contexts is the
/// responsibility of the driver, not of the implementation.
///
/// `MobCount` is the number of message objects of the hardware variant. The
/// MOb bitmaps are split over two 8-bit registers, so at most 15 are
/// supported.
///
/// # Safety
/// While an implementing value is in use by the driver
/// - every access must hit the register named by its argument
/// - [`MobRegister`] accesses must address the MOb selected by the last write
///   to [`GlobalRegister::Page`]
/// - the registers must not be accessed by other parts of the target HAL
///
/// # Examples
/// ```no_run
/// use core::cell::Cell;
/// use mobcan_core::typenum::U6;
/// use mobcan_core::{GlobalRegister, MobRegister, RegisterSurface};
///
/// // A stand-in bank that ignores paging. A real HAL would use volatile
/// // accesses, see `mobcan_core::mmio`.
/// struct Registers {
///     global: [Cell<u8>; 18],
///     mob: [Cell<u8>; 11],
/// }
///
/// unsafe impl RegisterSurface for Registers {
///     type MobCount = U6;
///
///     fn read(&self, reg: GlobalRegister) -> u8 {
///         self.global[reg as usize].get()
///     }
///
///     fn write(&self, reg: GlobalRegister, value: u8) {
///         self.global[reg as usize].set(value)
///     }
///
///     fn read_mob(&self, reg: MobRegister) -> u8 {
///         self.mob[reg as usize].get()
///     }
///
///     fn write_mob(&self, reg: MobRegister, value: u8) {
///         self.mob[reg as usize].set(value)
///     }
/// }
/// ```
pub unsafe trait RegisterSurface {
    /// Number of message objects provided by the peripheral
    type MobCount: Unsigned + IsLessOrEqual<U15, Output = True>;

    /// Reads a global register
    fn read(&self, reg: GlobalRegister) -> u8;
    /// Writes a global register
    fn write(&self, reg: GlobalRegister, value: u8);
    /// Reads a register of the selected MOb
    fn read_mob(&self, reg: MobRegister) -> u8;
    /// Writes a register of the selected MOb
    fn write_mob(&self, reg: MobRegister, value: u8);

    /// Read-modify-write of a global register
    fn modify(&self, reg: GlobalRegister, f: impl FnOnce(u8) -> u8) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    /// Read-modify-write of a register of the selected MOb
    fn modify_mob(&self, reg: MobRegister, f: impl FnOnce(u8) -> u8) {
        let value = self.read_mob(reg);
        self.write_mob(reg, f(value));
    }
}
