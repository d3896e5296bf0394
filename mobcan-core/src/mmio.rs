//! Memory-mapped register surface of the AT90CAN / ATmegaxxM1 family
//!
//! The CAN registers occupy the contiguous extended I/O range `0xD8..=0xFA` of
//! the AVR data space. [`RegisterBlock`] mirrors that range byte by byte and
//! [`Mmio`] implements [`RegisterSurface`] on top of it with volatile
//! accesses.

use crate::{GlobalRegister, MobRegister, RegisterSurface};
use core::marker::PhantomData;
use generic_array::typenum::{IsLessOrEqual, True, Unsigned, U15};
use vcell::VolatileCell;

/// Data space address of CANGCON, the first CAN register
pub const CAN_REGISTERS_ADDRESS: usize = 0xD8;

/// CAN register block in data space order
#[allow(missing_docs)]
#[repr(C)]
pub struct RegisterBlock {
    pub cangcon: VolatileCell<u8>,
    pub cangsta: VolatileCell<u8>,
    pub cangit: VolatileCell<u8>,
    pub cangie: VolatileCell<u8>,
    pub canen2: VolatileCell<u8>,
    pub canen1: VolatileCell<u8>,
    pub canie2: VolatileCell<u8>,
    pub canie1: VolatileCell<u8>,
    pub cansit2: VolatileCell<u8>,
    pub cansit1: VolatileCell<u8>,
    pub canbt1: VolatileCell<u8>,
    pub canbt2: VolatileCell<u8>,
    pub canbt3: VolatileCell<u8>,
    pub cantcon: VolatileCell<u8>,
    pub cantiml: VolatileCell<u8>,
    pub cantimh: VolatileCell<u8>,
    pub canttcl: VolatileCell<u8>,
    pub canttch: VolatileCell<u8>,
    pub cantec: VolatileCell<u8>,
    pub canrec: VolatileCell<u8>,
    pub canhpmob: VolatileCell<u8>,
    pub canpage: VolatileCell<u8>,
    pub canstmob: VolatileCell<u8>,
    pub cancdmob: VolatileCell<u8>,
    pub canidt4: VolatileCell<u8>,
    pub canidt3: VolatileCell<u8>,
    pub canidt2: VolatileCell<u8>,
    pub canidt1: VolatileCell<u8>,
    pub canidm4: VolatileCell<u8>,
    pub canidm3: VolatileCell<u8>,
    pub canidm2: VolatileCell<u8>,
    pub canidm1: VolatileCell<u8>,
    pub canstml: VolatileCell<u8>,
    pub canstmh: VolatileCell<u8>,
    pub canmsg: VolatileCell<u8>,
}

impl RegisterBlock {
    fn global(&self, reg: GlobalRegister) -> &VolatileCell<u8> {
        use GlobalRegister::*;
        match reg {
            Gcon => &self.cangcon,
            Gsta => &self.cangsta,
            Git => &self.cangit,
            Gie => &self.cangie,
            En2 => &self.canen2,
            En1 => &self.canen1,
            Ie2 => &self.canie2,
            Ie1 => &self.canie1,
            Sit2 => &self.cansit2,
            Sit1 => &self.cansit1,
            Bt1 => &self.canbt1,
            Bt2 => &self.canbt2,
            Bt3 => &self.canbt3,
            Tcon => &self.cantcon,
            Tec => &self.cantec,
            Rec => &self.canrec,
            Hpmob => &self.canhpmob,
            Page => &self.canpage,
        }
    }

    fn mob(&self, reg: MobRegister) -> &VolatileCell<u8> {
        use MobRegister::*;
        match reg {
            Status => &self.canstmob,
            Control => &self.cancdmob,
            Idt4 => &self.canidt4,
            Idt3 => &self.canidt3,
            Idt2 => &self.canidt2,
            Idt1 => &self.canidt1,
            Idm4 => &self.canidm4,
            Idm3 => &self.canidm3,
            Idm2 => &self.canidm2,
            Idm1 => &self.canidm1,
            Msg => &self.canmsg,
        }
    }
}

/// Volatile [`RegisterSurface`] over a [`RegisterBlock`] with `N` message
/// objects (6 on ATmega16M1/32M1/64M1, 15 on AT90CAN32/64/128)
pub struct Mmio<N> {
    block: *const RegisterBlock,
    _count: PhantomData<N>,
}

impl<N> Mmio<N> {
    /// Register surface of the CAN peripheral at its fixed data space address
    ///
    /// # Safety
    /// Only one `Mmio` may exist per peripheral and the registers must not be
    /// accessed through any other path while it is alive.
    pub const unsafe fn take() -> Self {
        Self::new(CAN_REGISTERS_ADDRESS as *const RegisterBlock)
    }

    /// Register surface over the block at `block`
    ///
    /// # Safety
    /// `block` must point to a valid [`RegisterBlock`] for the lifetime of the
    /// returned value. Same uniqueness requirements as [`Self::take`].
    pub const unsafe fn new(block: *const RegisterBlock) -> Self {
        Self {
            block,
            _count: PhantomData,
        }
    }

    fn block(&self) -> &RegisterBlock {
        // Safety: Validity of the pointer is a constructor requirement.
        unsafe { &*self.block }
    }
}

// Safety: `Mmio` is the unique owner of the registers (constructor
// requirement); moving it to another context does not introduce aliasing.
unsafe impl<N> Send for Mmio<N> {}

// Safety: Every access is a single byte-wide volatile read or write. Sharing
// between the normal context and the CAN interrupt is what the driver is
// built for; it keeps the page selector consistent with critical sections
// and by restoring CANPAGE in the interrupt handler.
unsafe impl<N> Sync for Mmio<N> {}

// Safety: Every access goes to the register named by the argument and the
// paged registers are banked by CANPAGE in hardware.
unsafe impl<N> RegisterSurface for Mmio<N>
where
    N: Unsigned + IsLessOrEqual<U15, Output = True>,
{
    type MobCount = N;

    fn read(&self, reg: GlobalRegister) -> u8 {
        self.block().global(reg).get()
    }

    fn write(&self, reg: GlobalRegister, value: u8) {
        self.block().global(reg).set(value)
    }

    fn read_mob(&self, reg: MobRegister) -> u8 {
        self.block().mob(reg).get()
    }

    fn write_mob(&self, reg: MobRegister, value: u8) {
        self.block().mob(reg).set(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use generic_array::typenum::U6;

    const fn zeroed_block() -> RegisterBlock {
        const Z: VolatileCell<u8> = VolatileCell::new(0);
        RegisterBlock {
            cangcon: Z,
            cangsta: Z,
            cangit: Z,
            cangie: Z,
            canen2: Z,
            canen1: Z,
            canie2: Z,
            canie1: Z,
            cansit2: Z,
            cansit1: Z,
            canbt1: Z,
            canbt2: Z,
            canbt3: Z,
            cantcon: Z,
            cantiml: Z,
            cantimh: Z,
            canttcl: Z,
            canttch: Z,
            cantec: Z,
            canrec: Z,
            canhpmob: Z,
            canpage: Z,
            canstmob: Z,
            cancdmob: Z,
            canidt4: Z,
            canidt3: Z,
            canidt2: Z,
            canidt1: Z,
            canidm4: Z,
            canidm3: Z,
            canidm2: Z,
            canidm1: Z,
            canstml: Z,
            canstmh: Z,
            canmsg: Z,
        }
    }

    #[test]
    fn block_spans_can_register_range() {
        // CANGCON at 0xD8 through CANMSG at 0xFA
        assert_eq!(core::mem::size_of::<RegisterBlock>(), 0xFA - 0xD8 + 1);
    }

    #[test]
    fn register_offsets_match_data_space() {
        let block = zeroed_block();
        let base = &block as *const _ as usize;
        let offset = |cell: &VolatileCell<u8>| cell as *const _ as usize - base;
        assert_eq!(offset(&block.canbt1), 0xE2 - 0xD8);
        assert_eq!(offset(&block.canhpmob), 0xEC - 0xD8);
        assert_eq!(offset(&block.canpage), 0xED - 0xD8);
        assert_eq!(offset(&block.canidt1), 0xF3 - 0xD8);
        assert_eq!(offset(&block.canidm4), 0xF4 - 0xD8);
    }

    #[test]
    fn surface_can_live_in_a_static() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Mmio<U6>>();
        static _REGISTERS: Mmio<U6> = unsafe { Mmio::take() };
    }

    #[test]
    fn accesses_reach_named_registers() {
        let block = zeroed_block();
        let regs = unsafe { Mmio::<U6>::new(&block) };
        regs.write(GlobalRegister::Page, 0x30);
        regs.write(GlobalRegister::Bt3, 0x13);
        regs.write_mob(MobRegister::Idm4, 0x05);
        regs.modify_mob(MobRegister::Control, |v| v | 0x80);
        assert_eq!(block.canpage.get(), 0x30);
        assert_eq!(block.canbt3.get(), 0x13);
        assert_eq!(block.canidm4.get(), 0x05);
        assert_eq!(regs.read_mob(MobRegister::Control), 0x80);
    }
}
