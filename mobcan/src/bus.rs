//! Initialization, frame setup and lifecycle control of the CAN controller

use crate::codec::{decode_id, encode_id, encode_mask};
use crate::config::CanConfig;
use crate::interrupt::Dispatcher;
use crate::message::{clamp_dlc, Frame};
use crate::mob::{find_free_mob, Mob, MobConfig, MobSet, MobState};
use crate::reg::{Conmob, GeneralControl, GeneralStatus, MobControl, Page};
use core::convert::Infallible;
use embedded_can::Frame as _;
use generic_array::{sequence::GenericSequence, ArrayLength, GenericArray};
use mobcan_core::typenum::Unsigned;
use mobcan_core::{GlobalRegister, MobRegister, RegisterSurface};

/// Index is out of bounds
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutOfBounds;

/// A message object could not be allocated
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Every message object is in use. Retry once a transmission completed or
    /// a receiver was released.
    NoFreeMob,
}

/// Printable transmit and receive error counters
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ErrorCounters {
    /// CANTEC
    pub transmit: u8,
    /// CANREC
    pub receive: u8,
}

/// Initializes the CAN controller and returns its two handles
///
/// The controller is reset, `config` is applied, interrupts are enabled for
/// every message object and all message object registers are cleared. The
/// datasheet leaves them undefined after reset, so skipping this would make
/// acceptance filtering unpredictable.
///
/// The controller stays in standby until [`Can::enable`] is called. [`Can`]
/// is meant for the normal execution context, [`Dispatcher`] for the CAN
/// interrupt handler. Call it once; a second pair of handles would alias the
/// first.
pub fn init<'a, R: RegisterSurface>(
    registers: &'a R,
    config: &CanConfig,
) -> (Can<'a, R>, Dispatcher<'a, R>) {
    let can = Can {
        registers,
        receivers: MobSet::default(),
    };
    critical_section::with(|_| {
        let mut reset = GeneralControl(0);
        reset.set_swres(true);
        registers.write(GlobalRegister::Gcon, reset.0);
        registers.write(GlobalRegister::Tcon, config.timer_prescaler);

        registers.write(GlobalRegister::Bt1, config.bit_timing.bt1);
        registers.write(GlobalRegister::Bt2, config.bit_timing.bt2);
        registers.write(GlobalRegister::Bt3, config.bit_timing.bt3);

        registers.write(GlobalRegister::Gie, config.interrupts.0);
        let (high, low) = MobSet::all(can.count()).to_registers();
        registers.write(GlobalRegister::Ie1, high);
        registers.write(GlobalRegister::Ie2, low);

        for mob in MobSet::all(can.count()).iter() {
            can.select(mob);
            can.clear_mob();
        }
    });
    log::debug!("CAN initialized with {} message objects", can.count());
    (can, Dispatcher::new(registers))
}

/// Normal-context handle of the CAN controller
///
/// Every method that selects a register page does so inside a critical
/// section, so the CAN interrupt cannot observe or disturb a half-written
/// configuration.
///
/// Receivers are tracked in the handle in addition to the hardware enabled
/// bitmap. The peripheral clears the enabled bit of a receiving MOb as soon
/// as a frame is stored, and it stays clear until the [`Dispatcher`] re-arms
/// it.
pub struct Can<'a, R> {
    registers: &'a R,
    receivers: MobSet,
}

impl<'a, R: RegisterSurface> Can<'a, R> {
    /// Raw access to the registers.
    ///
    /// # Safety
    /// The abstraction assumes that it has exclusive ownership of the
    /// registers. Direct access can break such assumptions, in particular
    /// about the selected page.
    pub unsafe fn registers(&self) -> &'a R {
        self.registers
    }

    /// Number of message objects of the peripheral
    pub fn count(&self) -> u8 {
        R::MobCount::U8
    }

    /// Validated message object at `index`
    pub fn mob(&self, index: impl Into<u8>) -> Result<Mob, OutOfBounds> {
        Mob::new(index.into(), self.count())
    }

    /// Message objects enabled in hardware: pending transmissions and
    /// receivers waiting for a frame
    pub fn enabled_mobs(&self) -> MobSet {
        let high = self.registers.read(GlobalRegister::En1);
        let low = self.registers.read(GlobalRegister::En2);
        MobSet(MobSet::from_registers(high, low).0 & MobSet::all(self.count()).0)
    }

    /// Message objects owned by a receiver or a pending transmission
    pub fn owned_mobs(&self) -> MobSet {
        MobSet(self.enabled_mobs().0 | self.receivers.0)
    }

    fn allocate(&self) -> Result<Mob, AllocationError> {
        let mob = find_free_mob(self.owned_mobs(), self.count());
        match mob {
            Some(mob) => {
                log::debug!("allocated MOb {}", mob.index());
                Ok(mob)
            }
            None => {
                log::debug!("no free MOb");
                Err(AllocationError::NoFreeMob)
            }
        }
    }

    fn select(&self, mob: Mob) {
        self.registers.write(GlobalRegister::Page, Page::select(mob).0);
    }

    fn write_identifier(&self, regs: [u8; 4]) {
        for (reg, value) in MobRegister::IDENTIFIER.into_iter().zip(regs) {
            self.registers.write_mob(reg, value);
        }
    }

    fn write_mask(&self, regs: [u8; 4]) {
        for (reg, value) in MobRegister::MASK.into_iter().zip(regs) {
            self.registers.write_mob(reg, value);
        }
    }

    fn read_regs(&self, regs: [MobRegister; 4]) -> [u8; 4] {
        regs.map(|reg| self.registers.read_mob(reg))
    }

    /// Zeroes control, status, identifier and mask of the selected MOb
    fn clear_mob(&self) {
        self.registers.write_mob(MobRegister::Control, 0);
        self.registers.write_mob(MobRegister::Status, 0);
        self.write_identifier([0; 4]);
        self.write_mask([0; 4]);
    }

    /// Arms a free message object for reception of frames whose identifier
    /// matches `id` in every bit set in `mask`
    ///
    /// Remote and standard frames are not told apart from extended data
    /// frames by the filter. `dlc` is the expected data length; values above 8
    /// are treated as 8.
    ///
    /// The message object keeps listening after each reception until it is
    /// released with [`Self::free_rx`].
    pub fn setup_rx(
        &mut self,
        id: embedded_can::ExtendedId,
        mask: embedded_can::ExtendedId,
        dlc: u8,
    ) -> Result<Mob, AllocationError> {
        critical_section::with(|_| {
            let mob = self.allocate()?;
            self.select(mob);
            self.write_identifier(encode_id(id));
            self.write_mask(encode_mask(mask));

            let mut control = MobControl(0);
            control.set_conmob(Conmob::Receive);
            control.set_ide(true);
            control.set_dlc(clamp_dlc(dlc));
            self.registers.write_mob(MobRegister::Control, control.0);
            self.receivers.insert(mob);
            Ok(mob)
        })
    }

    /// Requests transmission of `dlc` bytes of `data` from a free message
    /// object
    ///
    /// `dlc` values above 8 are treated as 8; bytes past the end of `data`
    /// are sent as zero. The bytes go out in reverse order, `data[dlc - 1]`
    /// first, which is what the bus monitors on the other end expect.
    ///
    /// The message object is returned to the pool by the [`Dispatcher`] once
    /// the transmission completed.
    pub fn setup_tx(
        &mut self,
        id: embedded_can::ExtendedId,
        data: &[u8],
        dlc: u8,
    ) -> Result<Mob, AllocationError> {
        let dlc = clamp_dlc(dlc);
        critical_section::with(|_| {
            let mob = self.allocate()?;
            self.select(mob);
            // Stale flags must be gone before the identifier is written
            self.registers.write_mob(MobRegister::Status, 0);
            self.write_identifier(encode_id(id));

            for i in (0..dlc as usize).rev() {
                let byte = data.get(i).copied().unwrap_or(0);
                self.registers.write_mob(MobRegister::Msg, byte);
            }

            let mut control = MobControl(0);
            control.set_conmob(Conmob::Transmit);
            control.set_ide(true);
            control.set_dlc(dlc);
            self.registers.write_mob(MobRegister::Control, control.0);
            Ok(mob)
        })
    }

    /// Puts `frame` in a free message object to be sent on the bus.
    /// Fails with [`nb::Error::WouldBlock`] if every message object is in
    /// use.
    pub fn transmit(&mut self, frame: &Frame) -> nb::Result<Mob, Infallible> {
        match self.setup_tx(frame.extended_id(), frame.data(), frame.dlc() as u8) {
            Ok(mob) => Ok(mob),
            Err(AllocationError::NoFreeMob) => Err(nb::Error::WouldBlock),
        }
    }

    /// Releases a message object armed by [`Self::setup_rx`]
    ///
    /// Control, status, identifier and mask registers are cleared. Fails
    /// without touching any register if `index` does not name a message
    /// object of the peripheral.
    pub fn free_rx(&mut self, index: impl Into<u8>) -> Result<(), OutOfBounds> {
        let mob = self.mob(index)?;
        critical_section::with(|_| {
            self.select(mob);
            self.clear_mob();
            self.receivers.remove(mob);
        });
        log::debug!("released MOb {}", mob.index());
        Ok(())
    }

    /// Leaves standby and takes part in bus communication
    ///
    /// Has no observable effect before a message object has been set up.
    /// Global interrupts have to be unmasked first, otherwise received frames
    /// are dropped silently.
    pub fn enable(&mut self) {
        self.registers.modify(GlobalRegister::Gcon, |v| {
            let mut gcon = GeneralControl(v);
            gcon.set_enastb(true);
            gcon.0
        });
        log::debug!("CAN enabled");
    }

    /// Enters standby. Message object configuration is kept.
    pub fn disable(&mut self) {
        self.registers.modify(GlobalRegister::Gcon, |v| {
            let mut gcon = GeneralControl(v);
            gcon.set_enastb(false);
            gcon.0
        });
        log::debug!("CAN disabled");
    }

    /// `true` once the controller has left standby
    pub fn is_enabled(&self) -> bool {
        self.status().enfg()
    }

    /// Read general status
    pub fn status(&self) -> GeneralStatus {
        GeneralStatus(self.registers.read(GlobalRegister::Gsta))
    }

    /// Read error counters
    pub fn error_counters(&self) -> ErrorCounters {
        ErrorCounters {
            transmit: self.registers.read(GlobalRegister::Tec),
            receive: self.registers.read(GlobalRegister::Rec),
        }
    }

    fn state_of(&self, mob: Mob, control: MobControl) -> MobState {
        if self.receivers.contains(mob.index()) {
            return MobState::RxArmed;
        }
        if !self.enabled_mobs().contains(mob.index()) {
            return MobState::Idle;
        }
        match control.conmob() {
            Conmob::Transmit => MobState::TxArmed,
            Conmob::Receive | Conmob::FrameBufferReceive => MobState::RxArmed,
            Conmob::Disabled => MobState::Idle,
        }
    }

    /// Current use of the message object at `index`
    pub fn mob_state(&self, index: impl Into<u8>) -> Result<MobState, OutOfBounds> {
        Ok(self.mob_config(index)?.state)
    }

    /// Configuration of the message object at `index`
    pub fn mob_config(&self, index: impl Into<u8>) -> Result<MobConfig, OutOfBounds> {
        let mob = self.mob(index)?;
        let config = critical_section::with(|_| {
            self.select(mob);
            let control = MobControl(self.registers.read_mob(MobRegister::Control));
            MobConfig {
                state: self.state_of(mob, control),
                id: decode_id(self.read_regs(MobRegister::IDENTIFIER)),
                mask: decode_id(self.read_regs(MobRegister::MASK)),
                dlc: control.dlc(),
            }
        });
        Ok(config)
    }

    /// Current use of every message object
    pub fn mob_states(&self) -> GenericArray<MobState, R::MobCount>
    where
        R::MobCount: ArrayLength<MobState>,
    {
        GenericArray::generate(|i| self.mob_state(i as u8).unwrap_or(MobState::Idle))
    }
}
