//! Software model of the CAN controller registers
//!
//! [`SimulatedRegisters`] implements [`RegisterSurface`] on the host. Derived
//! registers (enabled and pending bitmaps, highest priority MOb, the enable
//! flag) are computed from the MOb state the way the peripheral does it, and
//! bus activity is injected through the methods of the type.

use crate::codec::encode_id;
use crate::reg::{Conmob, GeneralControl, GeneralInterrupts, MobControl, MobStatus, Page};
use core::cell::Cell;
use core::marker::PhantomData;
use embedded_can::ExtendedId;
use mobcan_core::typenum::{IsLessOrEqual, True, Unsigned, U15, U6};
use mobcan_core::{GlobalRegister, MobRegister, RegisterSurface};

const GLOBAL_REGISTERS: usize = 18;
const MOB_SLOTS: usize = 16;
/// Content of MOb registers after power-on, which the datasheet leaves
/// undefined
const POWER_ON_GARBAGE: u8 = 0xA5;

/// Register state of one message object
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MobRegisters {
    /// CANSTMOB
    pub status: u8,
    /// CANCDMOB
    pub control: u8,
    /// CANIDT1..=CANIDT4
    pub identifier: [u8; 4],
    /// CANIDM1..=CANIDM4
    pub mask: [u8; 4],
    /// Data buffer in port order
    pub data: [u8; 8],
    /// Enabled bit in CANEN1/CANEN2
    pub enabled: bool,
}

impl MobRegisters {
    const POWER_ON: Self = Self {
        status: POWER_ON_GARBAGE,
        control: POWER_ON_GARBAGE,
        identifier: [POWER_ON_GARBAGE; 4],
        mask: [POWER_ON_GARBAGE; 4],
        data: [POWER_ON_GARBAGE; 8],
        enabled: false,
    };
}

/// Simulated register bank with `N` message objects
pub struct SimulatedRegisters<N = U6> {
    global: [Cell<u8>; GLOBAL_REGISTERS],
    mobs: [Cell<MobRegisters>; MOB_SLOTS],
    forced_hpmob: Cell<Option<u8>>,
    resets: Cell<u32>,
    _count: PhantomData<N>,
}

impl SimulatedRegisters {
    /// Register bank of the six MOb variant, in power-on state
    pub fn new() -> Self {
        Self::with_mob_count()
    }
}

impl Default for SimulatedRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Unsigned> SimulatedRegisters<N> {
    /// Register bank with `N` message objects, in power-on state
    pub fn with_mob_count() -> Self {
        Self {
            global: Default::default(),
            mobs: core::array::from_fn(|_| Cell::new(MobRegisters::POWER_ON)),
            forced_hpmob: Cell::new(None),
            resets: Cell::new(0),
            _count: PhantomData,
        }
    }

    /// Snapshot of the registers of `mob`, independent of the selected page
    pub fn mob_registers(&self, mob: u8) -> MobRegisters {
        self.mobs[mob as usize].get()
    }

    /// Number of software resets seen
    pub fn resets(&self) -> u32 {
        self.resets.get()
    }

    /// Completes the pending transmission of `mob`
    pub fn complete_transmission(&self, mob: u8) {
        self.update_mob(mob, |regs| {
            regs.status |= txok();
            regs.enabled = false;
        });
    }

    /// Stores a frame received from the bus in `mob`
    ///
    /// `data` is given in port order and its length becomes the received
    /// DLC, so passing more than eight bytes models a sender using a DLC
    /// above 8. Only the first eight bytes are stored.
    pub fn receive(&self, mob: u8, id: ExtendedId, data: &[u8]) {
        self.update_mob(mob, |regs| {
            regs.identifier = encode_id(id);
            let stored = data.len().min(regs.data.len());
            regs.data[..stored].copy_from_slice(&data[..stored]);
            let mut control = MobControl(regs.control);
            control.set_dlc(data.len().min(15) as u8);
            regs.control = control.0;
            let mut status = MobStatus(regs.status);
            status.set_rxok(true);
            regs.status = status.0;
            regs.enabled = false;
        });
    }

    /// Raises `flags` in the status register of `mob`
    pub fn raise_error(&self, mob: u8, flags: MobStatus) {
        self.update_mob(mob, |regs| regs.status |= flags.0);
    }

    /// Raises `flags` in CANGIT
    pub fn set_general_flags(&self, flags: GeneralInterrupts) {
        self.set(GlobalRegister::Git, self.get(GlobalRegister::Git) | flags.0);
    }

    /// Sets CANTEC and CANREC
    pub fn set_error_counters(&self, transmit: u8, receive: u8) {
        self.set(GlobalRegister::Tec, transmit);
        self.set(GlobalRegister::Rec, receive);
    }

    /// Overrides CANHPMOB with `mob`, regardless of the pending bitmap.
    /// `None` goes back to computing it.
    pub fn force_highest_priority(&self, mob: Option<u8>) {
        self.forced_hpmob.set(mob);
    }

    fn get(&self, reg: GlobalRegister) -> u8 {
        self.global[reg as usize].get()
    }

    fn set(&self, reg: GlobalRegister, value: u8) {
        self.global[reg as usize].set(value)
    }

    fn update_mob(&self, mob: u8, f: impl FnOnce(&mut MobRegisters)) {
        let cell = &self.mobs[mob as usize];
        let mut regs = cell.get();
        f(&mut regs);
        cell.set(regs);
    }

    fn collect(&self, f: impl Fn(&MobRegisters) -> bool) -> u16 {
        (0..N::USIZE.min(MOB_SLOTS))
            .filter(|&i| f(&self.mobs[i].get()))
            .fold(0, |set, i| set | 1 << i)
    }

    fn enabled(&self) -> u16 {
        self.collect(|regs| regs.enabled)
    }

    fn pending(&self) -> u16 {
        let interrupt_enable =
            u16::from_be_bytes([self.get(GlobalRegister::Ie1), self.get(GlobalRegister::Ie2)]);
        self.collect(|regs| regs.status & MobStatus::INTERRUPT_FLAGS != 0) & interrupt_enable
    }

    fn highest_priority(&self) -> u8 {
        let mob = match self.forced_hpmob.get() {
            Some(mob) => mob,
            None => match self.pending() {
                0 => 0xF,
                pending => pending.trailing_zeros() as u8,
            },
        };
        mob << 4
    }

    fn general_status(&self) -> u8 {
        let enabled = GeneralControl(self.get(GlobalRegister::Gcon)).enastb();
        (enabled as u8) << 2
    }

    fn page(&self) -> Page {
        Page(self.get(GlobalRegister::Page))
    }

    /// Index into the data buffer of the selected MOb, advancing the page's
    /// data index if auto increment is on
    fn data_index(&self) -> usize {
        let mut page = self.page();
        let index = page.indx();
        if !page.ainc() {
            page.set_indx((index + 1) & 0x7);
            self.set(GlobalRegister::Page, page.0);
        }
        index as usize
    }

    fn selected(&self) -> u8 {
        self.page().mobnb()
    }
}

fn txok() -> u8 {
    let mut status = MobStatus(0);
    status.set_txok(true);
    status.0
}

unsafe impl<N> RegisterSurface for SimulatedRegisters<N>
where
    N: Unsigned + IsLessOrEqual<U15, Output = True>,
{
    type MobCount = N;

    fn read(&self, reg: GlobalRegister) -> u8 {
        match reg {
            GlobalRegister::Gsta => self.general_status(),
            GlobalRegister::En1 => self.enabled().to_be_bytes()[0],
            GlobalRegister::En2 => self.enabled().to_be_bytes()[1],
            GlobalRegister::Sit1 => self.pending().to_be_bytes()[0],
            GlobalRegister::Sit2 => self.pending().to_be_bytes()[1],
            GlobalRegister::Hpmob => self.highest_priority(),
            reg => self.get(reg),
        }
    }

    fn write(&self, reg: GlobalRegister, value: u8) {
        match reg {
            GlobalRegister::Gcon if GeneralControl(value).swres() => {
                self.global.iter().for_each(|reg| reg.set(0));
                self.resets.set(self.resets.get() + 1);
            }
            // Write one to clear
            GlobalRegister::Git => self.set(reg, self.get(reg) & !value),
            GlobalRegister::Gsta
            | GlobalRegister::En1
            | GlobalRegister::En2
            | GlobalRegister::Sit1
            | GlobalRegister::Sit2
            | GlobalRegister::Hpmob
            | GlobalRegister::Tec
            | GlobalRegister::Rec => {}
            reg => self.set(reg, value),
        }
    }

    fn read_mob(&self, reg: MobRegister) -> u8 {
        let regs = self.mob_registers(self.selected());
        match reg {
            MobRegister::Status => regs.status,
            MobRegister::Control => regs.control,
            MobRegister::Idt1 => regs.identifier[0],
            MobRegister::Idt2 => regs.identifier[1],
            MobRegister::Idt3 => regs.identifier[2],
            MobRegister::Idt4 => regs.identifier[3],
            MobRegister::Idm1 => regs.mask[0],
            MobRegister::Idm2 => regs.mask[1],
            MobRegister::Idm3 => regs.mask[2],
            MobRegister::Idm4 => regs.mask[3],
            MobRegister::Msg => regs.data[self.data_index()],
        }
    }

    fn write_mob(&self, reg: MobRegister, value: u8) {
        let mob = self.selected();
        let index = match reg {
            MobRegister::Msg => self.data_index(),
            _ => 0,
        };
        self.update_mob(mob, |regs| match reg {
            MobRegister::Status => regs.status = value,
            MobRegister::Control => {
                regs.control = value;
                regs.enabled = MobControl(value).conmob() != Conmob::Disabled;
            }
            MobRegister::Idt1 => regs.identifier[0] = value,
            MobRegister::Idt2 => regs.identifier[1] = value,
            MobRegister::Idt3 => regs.identifier[2] = value,
            MobRegister::Idt4 => regs.identifier[3] = value,
            MobRegister::Idm1 => regs.mask[0] = value,
            MobRegister::Idm2 => regs.mask[1] = value,
            MobRegister::Idm3 => regs.mask[2] = value,
            MobRegister::Idm4 => regs.mask[3] = value,
            MobRegister::Msg => regs.data[index] = value,
        });
    }
}
