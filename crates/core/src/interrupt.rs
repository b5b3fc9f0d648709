//! Timer interrupt delivery.
//!
//! The XVM-8 has one maskable interrupt source: bit 1 of the I/O byte at
//! [`IRQ_STATUS`]. The frame loop polls it every [`INTERRUPT_INTERVAL`](crate::INTERRUPT_INTERVAL)
//! cycles. Delivery pushes PC (16-bit) then F, clears the interrupt enable
//! flag and jumps to [`IRQ_VECTOR`]; RETI undoes it in reverse order.
//! There is no nesting: a handler that wants to be interrupted must EI.

use crate::{Machine, FLAG_I, IRQ_STATUS, IRQ_TIMER_BIT, IRQ_VECTOR};

impl Machine {
    /// Deliver the timer interrupt if it is enabled and pending.
    ///
    /// Returns true if control was redirected to the vector.
    pub fn check_interrupt(&mut self) -> bool {
        if !self.cpu.flag(FLAG_I) {
            return false;
        }
        let status = self.mem.read8(IRQ_STATUS);
        if status & IRQ_TIMER_BIT == 0 {
            return false;
        }
        self.mem.write8(IRQ_STATUS, status & !IRQ_TIMER_BIT);
        let pc = self.cpu.pc();
        self.push16(pc);
        self.push8(self.cpu.flags());
        self.cpu.set_flag(FLAG_I, false);
        self.cpu.set_pc(IRQ_VECTOR);
        if self.debug {
            log::debug!("IRQ taken at pc=0x{:04X}, cycles={}", pc, self.cycles);
        }
        true
    }

    /// Raise the timer-pending bit, as a host-side timer would.
    pub fn request_timer_interrupt(&mut self) {
        let status = self.mem.read8(IRQ_STATUS);
        self.mem.write8(IRQ_STATUS, status | IRQ_TIMER_BIT);
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::Reg;
    use crate::opcodes::decode;
    use crate::{Machine, FLAG_C, FLAG_I, IRQ_STATUS, IRQ_VECTOR};

    #[test]
    fn test_interrupt_ignored_when_disabled() {
        let mut m = Machine::new();
        m.cpu.set_pc(0xE123);
        m.request_timer_interrupt();
        assert!(!m.check_interrupt());
        assert_eq!(m.cpu.pc(), 0xE123);
        assert_eq!(m.mem.read8(IRQ_STATUS) & 0x02, 0x02);
    }

    #[test]
    fn test_interrupt_not_pending() {
        let mut m = Machine::new();
        m.cpu.set_flag(FLAG_I, true);
        m.mem.write8(IRQ_STATUS, 0xFD);
        assert!(!m.check_interrupt());
    }

    #[test]
    fn test_interrupt_delivery_and_reti() {
        let mut m = Machine::new();
        m.cpu.set_pc(0xE123);
        m.cpu.set_flag(FLAG_I, true);
        m.cpu.set_flag(FLAG_C, true);
        m.mem.write8(IRQ_STATUS, 0x03);
        let sp0 = m.cpu.sp();
        let f0 = m.cpu.flags();

        assert!(m.check_interrupt());
        assert_eq!(m.cpu.pc(), IRQ_VECTOR);
        assert_eq!(m.mem.read8(IRQ_STATUS), 0x01);
        assert!(!m.cpu.flag(FLAG_I));
        assert_eq!(m.cpu.sp(), sp0 - 3);

        // Handler clobbers flags, then returns
        m.cpu.set_reg(Reg::A, 0);
        m.cpu.set_flags(0x05);
        let (inst, size) = decode(0x52, 0, 0);
        m.execute_inst(inst, size);
        assert_eq!(m.cpu.pc(), 0xE123);
        assert_eq!(m.cpu.flags(), f0);
        assert!(m.cpu.flag(FLAG_I));
        assert_eq!(m.cpu.sp(), sp0);
    }
}
