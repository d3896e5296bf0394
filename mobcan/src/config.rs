//! CAN bus configuration
//!
//! Everything here is static: the values are written once by
//! [`init`](crate::bus::init) and never recomputed.

pub use crate::reg::GeneralInterruptEnable;

/// Configuration for the CAN controller
#[derive(Copy, Clone, Debug)]
pub struct CanConfig {
    /// Bit timing register values
    pub bit_timing: BitTiming,
    /// CAN timer prescaler (CANTCON)
    pub timer_prescaler: u8,
    /// Peripheral-level interrupt sources (CANGIE)
    pub interrupts: GeneralInterruptEnable,
}

impl Default for CanConfig {
    /// The reference configuration: [`BitTiming::default`], timer prescaler
    /// at zero and every interrupt source enabled except the CAN timer
    /// overrun.
    fn default() -> Self {
        Self {
            bit_timing: Default::default(),
            timer_prescaler: 0,
            interrupts: GeneralInterruptEnable(0xFE),
        }
    }
}

/// Raw values of the three bit timing registers
///
/// The values depend on the CPU clock, the bitrate and the length of the bus
/// and have to be taken from the datasheet tables. A communication with a
/// mismatching setting does not work at all.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitTiming {
    /// CANBT1, baud rate prescaler
    pub bt1: u8,
    /// CANBT2, re-synchronization jump width and propagation segment
    pub bt2: u8,
    /// CANBT3, phase segments and sample point
    pub bt3: u8,
}

impl Default for BitTiming {
    /// 500 kbps from a 16 MHz clock
    fn default() -> Self {
        Self {
            bt1: 0x06,
            bt2: 0x04,
            bt3: 0x13,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reference_configuration() {
        let config = CanConfig::default();
        assert_eq!(
            config.bit_timing,
            BitTiming {
                bt1: 0x06,
                bt2: 0x04,
                bt3: 0x13
            }
        );
        assert_eq!(config.timer_prescaler, 0);
        assert!(config.interrupts.enit());
        assert!(config.interrupts.enrx());
        assert!(config.interrupts.entx());
        assert!(config.interrupts.enerr());
        assert!(!config.interrupts.enovrt());
    }
}
