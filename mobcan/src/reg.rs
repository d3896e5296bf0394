//! Bit layouts of the CAN controller registers
//!
//! Field names follow the datasheet mnemonics.

use crate::mob::Mob;
use bitfield::bitfield;

/// CANIDM4 bit relaxing remote transmission request matching
pub const RTRMSK: u8 = 1 << 2;
/// CANIDM4 bit relaxing identifier extension matching
pub const IDEMSK: u8 = 1 << 0;

bitfield! {
    /// CANGCON, general control
    #[derive(Copy, Clone, Default)]
    pub struct GeneralControl(u8);
    impl Debug;
    /// Abort request
    pub abrq, set_abrq: 7;
    /// Overload frame request
    pub ovrq, set_ovrq: 6;
    /// Time trigger communication
    pub ttc, set_ttc: 5;
    /// Synchronization of TTC
    pub synttc, set_synttc: 4;
    /// Listening mode
    pub listen, set_listen: 3;
    /// Test mode
    pub test, set_test: 2;
    /// Enable / standby
    pub enastb, set_enastb: 1;
    /// Software reset request
    pub swres, set_swres: 0;
}

bitfield! {
    /// CANGSTA, general status
    #[derive(Copy, Clone, Default)]
    pub struct GeneralStatus(u8);
    impl Debug;
    /// Overload frame in progress
    pub ovrg, _: 6;
    /// Transmitter busy
    pub txbsy, _: 4;
    /// Receiver busy
    pub rxbsy, _: 3;
    /// Controller is enabled
    pub enfg, _: 2;
    /// Bus off mode
    pub boff, _: 1;
    /// Error passive mode
    pub errp, _: 0;
}

bitfield! {
    /// CANGIT, general interrupt flags
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct GeneralInterrupts(u8);
    impl Debug;
    /// General interrupt flag
    pub canit, _: 7;
    /// Bus off interrupt
    pub boffit, set_boffit: 6;
    /// Overrun CAN timer
    pub ovrtim, set_ovrtim: 5;
    /// Frame buffer receive interrupt
    pub bxok, set_bxok: 4;
    /// Stuff error general
    pub serg, set_serg: 3;
    /// CRC error general
    pub cerg, set_cerg: 2;
    /// Form error general
    pub ferg, set_ferg: 1;
    /// Acknowledgment error general
    pub aerg, set_aerg: 0;
}

impl GeneralInterrupts {
    /// Writing this value to CANGIT clears every flag
    pub const CLEAR_ALL: u8 = 0xFF;
}

bitfield! {
    /// CANGIE, general interrupt enable
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct GeneralInterruptEnable(u8);
    impl Debug;
    /// Enable all interrupts
    pub enit, set_enit: 7;
    /// Enable bus off interrupt
    pub enboff, set_enboff: 6;
    /// Enable receive interrupt
    pub enrx, set_enrx: 5;
    /// Enable transmit interrupt
    pub entx, set_entx: 4;
    /// Enable MOb errors interrupt
    pub enerr, set_enerr: 3;
    /// Enable frame buffer interrupt
    pub enbx, set_enbx: 2;
    /// Enable general errors interrupt
    pub energ, set_energ: 1;
    /// Enable CAN timer overrun interrupt
    pub enovrt, set_enovrt: 0;
}

bitfield! {
    /// CANSTMOB, MOb status
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct MobStatus(u8);
    impl Debug;
    /// DLC warning, received DLC differs from the configured one
    pub dlcw, set_dlcw: 7;
    /// Transmit OK
    pub txok, set_txok: 6;
    /// Receive OK
    pub rxok, set_rxok: 5;
    /// Bit error (transmission only)
    pub berr, set_berr: 4;
    /// Stuff error
    pub serr, set_serr: 3;
    /// CRC error
    pub cerr, set_cerr: 2;
    /// Form error
    pub ferr, set_ferr: 1;
    /// Acknowledgment error
    pub aerr, set_aerr: 0;
}

impl MobStatus {
    /// Flags that raise a MOb interrupt
    pub const INTERRUPT_FLAGS: u8 = 0x7F;

    /// `true` if any bus error flag is set
    pub fn has_errors(&self) -> bool {
        self.0 & 0x1F != 0
    }
}

/// MOb configuration, the CONMOB field of CANCDMOB
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Conmob {
    /// Disabled
    Disabled = 0,
    /// Enable transmission
    Transmit = 1,
    /// Enable reception
    Receive = 2,
    /// Enable frame buffer reception
    FrameBufferReceive = 3,
}

impl From<u8> for Conmob {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::Disabled,
            1 => Self::Transmit,
            2 => Self::Receive,
            _ => Self::FrameBufferReceive,
        }
    }
}

impl From<Conmob> for u8 {
    fn from(value: Conmob) -> Self {
        value as u8
    }
}

bitfield! {
    /// CANCDMOB, MOb control and DLC
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct MobControl(u8);
    impl Debug;
    /// Configuration of the message object
    pub u8, from into Conmob, conmob, set_conmob: 7, 6;
    /// Reply valid (automatic reply to remote frames)
    pub rplv, set_rplv: 5;
    /// Identifier extension, set for 29-bit identifiers
    pub ide, set_ide: 4;
    /// Data length code
    pub u8, dlc, set_dlc: 3, 0;
}

bitfield! {
    /// CANPAGE, page selector
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Page(u8);
    impl Debug;
    /// Selected MOb number
    pub u8, mobnb, set_mobnb: 7, 4;
    /// Auto increment of the data index, active low
    pub ainc, set_ainc: 3;
    /// Data buffer index
    pub u8, indx, set_indx: 2, 0;
}

impl Page {
    /// Selects `mob` with the data index at 0 and auto increment enabled
    pub fn select(mob: Mob) -> Self {
        let mut page = Self(0);
        page.set_mobnb(mob.index());
        page
    }
}

bitfield! {
    /// CANHPMOB, highest priority MOb
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct HighestPriority(u8);
    impl Debug;
    /// MOb with the highest priority pending interrupt, `0xF` if none
    pub u8, hpmob, _: 7, 4;
    /// CAN general purpose bits
    pub u8, cgp, _: 3, 0;
}
