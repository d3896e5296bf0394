//! Interrupt handling of the CAN controller
//!
//! The peripheral raises a single interrupt for every message object event
//! and for the general error conditions. [`Dispatcher::on_interrupt`] is to
//! be called from that interrupt handler; it serves the highest priority
//! message object and leaves the register page as it found it, so it may
//! preempt any code that does not hold a critical section.

use crate::codec::decode_id;
use crate::message::{clamp_dlc, Frame, MAX_DLC};
use crate::mob::{Mob, MobSet};
use crate::reg::{Conmob, GeneralInterrupts, HighestPriority, MobControl, MobStatus, Page};
use mobcan_core::typenum::Unsigned;
use mobcan_core::{GlobalRegister, MobRegister, RegisterSurface};

/// Outcome of one interrupt
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    /// `frame` was received by `mob`. The message object keeps listening.
    Received {
        /// Receiving message object
        mob: Mob,
        /// Received frame
        frame: Frame,
    },
    /// `mob` completed its transmission and is free again
    Transmitted {
        /// Transmitting message object
        mob: Mob,
    },
    /// Error flags of `mob` were acknowledged. Nothing is recovered: a
    /// transmission stays pending and a receiver stays armed.
    Error {
        /// Message object reporting the error
        mob: Mob,
        /// Acknowledged status
        errors: MobStatus,
    },
    /// No message object had a pending interrupt. The general interrupt
    /// flags, captured before they were cleared, are returned.
    General(GeneralInterrupts),
}

/// Interrupt-context handle of the CAN controller
///
/// Created together with [`Can`](crate::bus::Can) by
/// [`init`](crate::bus::init).
pub struct Dispatcher<'a, R> {
    registers: &'a R,
    errors: u32,
}

impl<'a, R: RegisterSurface> Dispatcher<'a, R> {
    pub(crate) fn new(registers: &'a R) -> Self {
        Self {
            registers,
            errors: 0,
        }
    }

    /// Raw access to the registers.
    ///
    /// # Safety
    /// The abstraction assumes that it has exclusive ownership of the
    /// registers. Direct access can break such assumptions.
    pub unsafe fn registers(&self) -> &'a R {
        self.registers
    }

    /// Number of acknowledged message object errors. Wraps around.
    pub fn error_count(&self) -> u32 {
        self.errors
    }

    /// Serves the pending interrupt of highest priority
    pub fn on_interrupt(&mut self) -> Event {
        let saved = self.registers.read(GlobalRegister::Page);
        let event = self.dispatch();
        self.registers.write(GlobalRegister::Page, saved);
        log::trace!("CAN interrupt: {:?}", event);
        event
    }

    fn dispatch(&mut self) -> Event {
        let hpmob = HighestPriority(self.registers.read(GlobalRegister::Hpmob)).hpmob();
        let pending = MobSet::from_registers(
            self.registers.read(GlobalRegister::Sit1),
            self.registers.read(GlobalRegister::Sit2),
        );
        let mob = match Mob::new(hpmob, R::MobCount::U8) {
            Ok(mob) if pending.contains(hpmob) => mob,
            _ => return self.acknowledge_general(),
        };

        self.registers.write(GlobalRegister::Page, Page::select(mob).0);
        let status = MobStatus(self.registers.read_mob(MobRegister::Status));
        if status.rxok() {
            self.receive(mob, status)
        } else if status.txok() {
            self.transmitted(mob, status)
        } else {
            self.acknowledge_error(mob, status)
        }
    }

    fn receive(&mut self, mob: Mob, mut status: MobStatus) -> Event {
        status.set_rxok(false);
        self.registers.write_mob(MobRegister::Status, status.0);

        let mut control = MobControl(self.registers.read_mob(MobRegister::Control));
        let id = decode_id(MobRegister::IDENTIFIER.map(|reg| self.registers.read_mob(reg)));
        let dlc = clamp_dlc(control.dlc());
        let mut data = [0; MAX_DLC as usize];
        for i in (0..dlc as usize).rev() {
            data[i] = self.registers.read_mob(MobRegister::Msg);
        }

        // Reception stops once a frame is stored, re-arm for the next one
        control.set_conmob(Conmob::Disabled);
        self.registers.write_mob(MobRegister::Control, control.0);
        control.set_conmob(Conmob::Receive);
        self.registers.write_mob(MobRegister::Control, control.0);

        Event::Received {
            mob,
            frame: Frame::from_parts(id, dlc, data),
        }
    }

    fn transmitted(&mut self, mob: Mob, mut status: MobStatus) -> Event {
        status.set_txok(false);
        self.registers.write_mob(MobRegister::Status, status.0);
        self.registers.write_mob(MobRegister::Control, 0);
        log::debug!("MOb {} transmitted and released", mob.index());
        Event::Transmitted { mob }
    }

    fn acknowledge_error(&mut self, mob: Mob, status: MobStatus) -> Event {
        self.registers.write_mob(MobRegister::Status, 0);
        self.errors = self.errors.wrapping_add(1);
        log::warn!("MOb {} error acknowledged: {:?}", mob.index(), status);
        Event::Error {
            mob,
            errors: status,
        }
    }

    fn acknowledge_general(&mut self) -> Event {
        let flags = GeneralInterrupts(self.registers.read(GlobalRegister::Git));
        self.registers.write(GlobalRegister::Git, GeneralInterrupts::CLEAR_ALL);
        log::warn!("general CAN interrupt cleared: {:?}", flags);
        Event::General(flags)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bus::{init, Can};
    use crate::config::CanConfig;
    use crate::mob::MobState;
    use crate::sim::SimulatedRegisters;
    use embedded_can::{ExtendedId, Frame as _};

    fn id(raw: u32) -> ExtendedId {
        ExtendedId::new(raw).unwrap()
    }

    /// Page selected by the interrupted code
    const INTERRUPTED_PAGE: u8 = 0x2B;

    fn interrupt(
        regs: &SimulatedRegisters,
        dispatcher: &mut Dispatcher<'_, SimulatedRegisters>,
    ) -> Event {
        regs.write(GlobalRegister::Page, INTERRUPTED_PAGE);
        let event = dispatcher.on_interrupt();
        assert_eq!(regs.read(GlobalRegister::Page), INTERRUPTED_PAGE);
        event
    }

    type Handles<'a> = (
        Can<'a, SimulatedRegisters>,
        Dispatcher<'a, SimulatedRegisters>,
    );

    fn setup(regs: &SimulatedRegisters) -> Handles<'_> {
        init(regs, &CanConfig::default())
    }

    #[test]
    fn reception_keeps_mob_armed() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        let mob = can.setup_rx(id(0x100), id(0x1FFF_FFFF), 4).unwrap();

        regs.receive(mob.index(), id(0x100), &[0x33, 0x22, 0x11]);
        assert_eq!(can.mob_state(mob), Ok(MobState::RxArmed));

        let event = interrupt(&regs, &mut dispatcher);
        let Event::Received { mob: received, frame } = event else {
            panic!("unexpected event {:?}", event);
        };
        assert_eq!(received, mob);
        assert_eq!(frame.extended_id(), id(0x100));
        assert_eq!(frame.data(), &[0x11, 0x22, 0x33]);

        let config = can.mob_config(mob).unwrap();
        assert_eq!(config.state, MobState::RxArmed);
        assert_eq!(config.id, id(0x100));
        assert_eq!(config.mask, id(0x1FFF_FFFF));
        assert!(!MobStatus(regs.mob_registers(mob.index()).status).rxok());
    }

    #[test]
    fn stored_frame_keeps_receiver_owned() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        let rx = can.setup_rx(id(0x100), id(0), 4).unwrap();
        regs.receive(rx.index(), id(0x100), &[1, 2, 3, 4]);
        assert!(!can.enabled_mobs().contains(rx.index()));
        assert!(can.owned_mobs().contains(rx.index()));

        let tx = can.setup_tx(id(0x200), &[9], 1).unwrap();
        assert_ne!(tx, rx);
        assert!(MobStatus(regs.mob_registers(rx.index()).status).rxok());

        let event = interrupt(&regs, &mut dispatcher);
        assert!(matches!(event, Event::Received { mob, .. } if mob == rx));
        assert_eq!(can.mob_state(rx), Ok(MobState::RxArmed));
        assert_eq!(can.mob_state(tx), Ok(MobState::TxArmed));
    }

    #[test]
    fn released_receiver_is_allocated_again() {
        let regs = SimulatedRegisters::new();
        let (mut can, _) = setup(&regs);
        let rx = can.setup_rx(id(0x100), id(0), 4).unwrap();
        regs.receive(rx.index(), id(0x100), &[1]);
        can.free_rx(rx).unwrap();
        assert_eq!(can.owned_mobs(), MobSet(0));
        assert_eq!(can.setup_tx(id(0x200), &[], 0), Ok(rx));
    }

    #[test]
    fn handles_can_move_to_interrupt_context() {
        use mobcan_core::mmio::Mmio;
        use mobcan_core::typenum::U6;

        fn assert_send<T: Send>() {}
        assert_send::<Dispatcher<'static, Mmio<U6>>>();
        assert_send::<Can<'static, Mmio<U6>>>();
    }

    #[test]
    fn received_dlc_above_eight_reads_eight_bytes() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        let mob = can.setup_rx(id(0x7), id(0), 8).unwrap();
        let wire = [12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1];
        regs.receive(mob.index(), id(0x7), &wire);

        match interrupt(&regs, &mut dispatcher) {
            Event::Received { frame, .. } => {
                assert_eq!(frame.dlc(), 8);
                assert_eq!(frame.data(), &[5, 6, 7, 8, 9, 10, 11, 12]);
            }
            event => panic!("unexpected event {:?}", event),
        }
    }

    #[test]
    fn transmission_returns_mob_to_pool() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        let mob = can.setup_tx(id(0x42), &[1], 1).unwrap();
        regs.complete_transmission(mob.index());

        assert_eq!(
            interrupt(&regs, &mut dispatcher),
            Event::Transmitted { mob }
        );
        let snapshot = regs.mob_registers(mob.index());
        assert_eq!(snapshot.control, 0);
        assert!(!MobStatus(snapshot.status).txok());
        assert_eq!(can.mob_state(mob), Ok(MobState::Idle));
    }

    #[test]
    fn lowest_index_is_served_first() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        for _ in 0..5 {
            can.setup_tx(id(0x42), &[], 0).unwrap();
        }
        regs.complete_transmission(4);
        regs.complete_transmission(1);

        let served = [interrupt(&regs, &mut dispatcher), interrupt(&regs, &mut dispatcher)];
        let expected = [1_u8, 4].map(|i| Event::Transmitted {
            mob: can.mob(i).unwrap(),
        });
        assert_eq!(served, expected);
    }

    #[test]
    fn errors_are_acknowledged_and_counted() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        let mob = can.setup_tx(id(0x42), &[1, 2], 2).unwrap();
        let mut errors = MobStatus(0);
        errors.set_aerr(true);
        errors.set_berr(true);
        regs.raise_error(mob.index(), errors);

        assert_eq!(
            interrupt(&regs, &mut dispatcher),
            Event::Error { mob, errors }
        );
        assert_eq!(regs.mob_registers(mob.index()).status, 0);
        assert_eq!(dispatcher.error_count(), 1);
        // Transmission is still pending
        assert_eq!(can.mob_state(mob), Ok(MobState::TxArmed));
    }

    #[test]
    fn dlc_warning_alone_takes_error_branch() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        let mob = can.setup_rx(id(0x42), id(0), 2).unwrap();
        regs.raise_error(mob.index(), MobStatus(0x80));
        // DLCW alone does not raise an interrupt
        assert!(matches!(
            interrupt(&regs, &mut dispatcher),
            Event::General(_)
        ));

        regs.raise_error(mob.index(), MobStatus(0x04));
        assert!(matches!(
            interrupt(&regs, &mut dispatcher),
            Event::Error { errors, .. } if errors == MobStatus(0x84)
        ));
    }

    #[test]
    fn spurious_interrupt_clears_general_flags() {
        let regs = SimulatedRegisters::new();
        let (_can, mut dispatcher) = setup(&regs);
        let flags = GeneralInterrupts(0x41);
        regs.set_general_flags(flags);

        assert_eq!(interrupt(&regs, &mut dispatcher), Event::General(flags));
        assert_eq!(regs.read(GlobalRegister::Git), 0);
        assert_eq!(dispatcher.error_count(), 0);
    }

    #[test]
    fn highest_priority_without_pending_bit_is_spurious() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        let mob = can.setup_tx(id(0x42), &[], 0).unwrap();
        regs.force_highest_priority(Some(mob.index()));
        regs.set_general_flags(GeneralInterrupts(0x08));

        assert_eq!(
            interrupt(&regs, &mut dispatcher),
            Event::General(GeneralInterrupts(0x08))
        );
        assert_eq!(can.mob_state(mob), Ok(MobState::TxArmed));
    }

    #[test]
    fn out_of_range_highest_priority_is_spurious() {
        let regs = SimulatedRegisters::new();
        let (_can, mut dispatcher) = setup(&regs);
        regs.force_highest_priority(Some(9));
        assert_eq!(
            interrupt(&regs, &mut dispatcher),
            Event::General(GeneralInterrupts(0))
        );
    }

    #[test]
    fn error_count_wraps() {
        let regs = SimulatedRegisters::new();
        let (mut can, mut dispatcher) = setup(&regs);
        let mob = can.setup_rx(id(1), id(0), 0).unwrap();
        dispatcher.errors = u32::MAX;
        regs.raise_error(mob.index(), MobStatus(0x08));
        interrupt(&regs, &mut dispatcher);
        assert_eq!(dispatcher.error_count(), 0);
    }
}
