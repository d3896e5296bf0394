#![no_std]
#![warn(missing_docs)]
//! # MOBCAN
//!
//! ## Overview
//! This crate provides a platform-agnostic driver core for CAN controllers
//! that organize their message buffers as "Message Objects" (MObs), like the
//! one found in the AT90CAN family.
//!
//! It provides the following features:
//!
//! - allocation of the lowest-indexed free MOb, with ownership read back from
//!   the hardware enabled bitmap
//! - reception of 29-bit identifier frames through per-MOb identifier/mask
//!   filters that stay armed across receptions
//! - one-shot transmission, with the MOb returned to the pool on completion
//! - an interrupt dispatcher that serves the highest priority MOb and
//!   restores the register page of the code it preempted
//!
//! The peripheral exposes one MOb at a time through a page selector. The
//! register bank is abstracted by [`mobcan_core::RegisterSurface`], which
//! platform-specific HALs are expected to implement, or which can be taken
//! directly from [`mobcan_core::mmio`] on AVR targets.
//!
//! In order to use the driver, one calls [`bus::init`] with a register surface
//! and a [`config::CanConfig`]. It returns two handles:
//! - [`bus::Can`] for the normal execution context, used to set up MObs and
//!   to control the controller's lifecycle
//! - [`interrupt::Dispatcher`] to be driven from the CAN interrupt handler
//!
//! Normal-context operations that select a register page run inside a
//! critical section provided by the [`critical-section`] crate, so the target
//! has to provide an implementation.
//!
//! ## Example
//! ```no_run
//! use mobcan::bus::{init, AllocationError};
//! use mobcan::config::CanConfig;
//! use mobcan::embedded_can::ExtendedId;
//! use mobcan::interrupt::Event;
//! use mobcan::core::{mmio::Mmio, typenum::U6};
//!
//! // Safety: the CAN registers are used by nothing else
//! static REGISTERS: Mmio<U6> = unsafe { Mmio::take() };
//! // Both handles borrow `REGISTERS` for `'static` and are `Send`, so the
//! // dispatcher can be moved to where the interrupt handler finds it.
//! let (mut can, mut dispatcher) = init(&REGISTERS, &CanConfig::default());
//!
//! let id = ExtendedId::new(0x100).unwrap();
//! let mask = ExtendedId::new(0x1FFF_FF00).unwrap();
//! let _rx = can.setup_rx(id, mask, 8)?;
//! can.enable();
//!
//! let reply = ExtendedId::new(0x200).unwrap();
//! let _tx = can.setup_tx(reply, &[0xCA, 0xFE], 2)?;
//!
//! // In the CAN interrupt handler
//! match dispatcher.on_interrupt() {
//!     Event::Received { mob, frame } => { /* process the frame */ }
//!     Event::Transmitted { mob } => { /* the MOb is free again */ }
//!     Event::Error { mob, errors } => { /* acknowledged, not recovered */ }
//!     Event::General(flags) => { /* bus-level flags, already cleared */ }
//! }
//! # Ok::<(), AllocationError>(())
//! ```
//!
//! ## Simulation
//! The `sim` feature exposes [`sim::SimulatedRegisters`], a software register
//! bank that models the derived registers of the peripheral and lets bus
//! traffic be injected. It allows the driver to be exercised on a host.
//!
//! [`critical-section`]: https://docs.rs/critical-section

pub mod bus;
pub mod codec;
pub mod config;
pub mod interrupt;
pub mod message;
pub mod mob;
pub mod reg;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use embedded_can;
pub use generic_array;
pub use mobcan_core as core;
