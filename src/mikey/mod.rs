pub mod parallel_port;
pub mod registers;
pub mod timers;
pub mod uart;
pub mod video;

use log::{debug, info, trace, warn};
use parallel_port::{ParallelPort, PortInputs, IODAT_AUDIN, IODAT_CAD};
use registers::*;
use serde::{Deserialize, Serialize};
use timers::{Timers, AUDIO_CHANNEL_COUNT};
use uart::{comlynx_wire::ComLynxWire, Uart};
use video::{DisplayGenerator, VideoSink};

use crate::action::{ActionKind, ActionQueue};
use crate::cartridge::Cartridge;
use crate::consts::*;

/// Side effect of a Mikey register write the bus master has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MikeyWrite {
    None,
    /// CPUSLEEP written while sprites may run: the CPU sleeps until Suzy is done.
    StartSuzy,
    /// SYSCTL1 power bit cleared.
    EnterMonitor,
}

/// Timer slot a register belongs to, the accesses are aligned on its phase.
fn timer_slot(address: u16) -> Option<u64> {
    match address & 0xff {
        a @ 0x00..=0x1f => Some(u64::from(a >> 2)),
        a @ 0x20..=0x3f => Some(8 + u64::from((a - 0x20) >> 3)),
        _ => None,
    }
}

#[derive(Serialize, Deserialize)]
pub struct Mikey {
    access_tick: u64,
    timers: Timers,
    registers: MikeyRegisters,
    display: DisplayGenerator,
    parallel_port: ParallelPort,
    uart: Uart,
    irq: u8,
    suzy_done: bool,
}

impl Mikey {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_tick: 0,
            timers: Timers::new(),
            registers: MikeyRegisters::new(),
            display: DisplayGenerator::new(),
            parallel_port: ParallelPort::new(),
            uart: Uart::new(),
            irq: 0,
            suzy_done: false,
        }
    }

    /// Tick at which an access started at `tick` completes. Timer and audio
    /// registers wait for their slot in the 16 tick timer cycle.
    pub fn request_access(&mut self, tick: u64, address: u16) -> u64 {
        self.access_tick = tick + MIKEY_ACCESS_TICKS;
        if let Some(timer) = timer_slot(address) {
            let next = (self.access_tick & !0xf) + timer * 16 / 12;
            self.access_tick = if next < self.access_tick { next + 16 } else { next };
        }
        trace!("Mikey access 0x{address:04x} @ {tick} -> {}", self.access_tick);
        self.access_tick
    }

    /// Register value as the CPU would read it, without read side effects.
    #[must_use]
    pub fn peek(&self, addr: u16, cart: &Cartridge) -> u8 {
        match addr {
            TIM0BKUP..=AUD3MISC => self.timers.read(self.access_tick, addr),
            ATTEN_A..=ATTEN_D => self.registers.attenuation(usize::from(addr - ATTEN_A)),
            MPAN => self.registers.pan(),
            MSTEREO => self.registers.stereo(),
            INTRST | INTSET => self.irq,
            IODIR => self.parallel_port.direction(),
            IODAT => self.parallel_port.data(PortInputs {
                audin: cart.audin(self.access_tick),
                rest: self.display.rest(),
                comlynx_peer: self.uart.has_peer(),
            }),
            MIKEYHREV => 0x01,
            SERCTL => self.uart.serctl(),
            SERDAT => self.uart.rx_data(),
            GREEN0..=BLUEREDF => self.registers.palette(usize::from(addr - GREEN0)),
            _ => {
                trace!("Mikey read from write only/unmapped 0x{addr:04x}");
                0xff
            }
        }
    }

    pub fn read(&mut self, addr: u16, cart: &Cartridge) -> u8 {
        let v = self.peek(addr, cart);
        if addr == SERDAT {
            self.uart.serdat();
            self.update_uart_irq();
        }
        trace!("Mikey peek 0x{addr:04x} = 0x{v:02x}");
        v
    }

    /// Register write at the last requested access tick.
    pub fn write(
        &mut self,
        addr: u16,
        v: u8,
        queue: &mut ActionQueue,
        cart: &mut Cartridge,
    ) -> MikeyWrite {
        trace!("Mikey poke 0x{addr:04x} = 0x{v:02x}");
        match addr {
            TIM0BKUP..=AUD3MISC => self.timers.write(self.access_tick, addr, v, queue),
            ATTEN_A..=ATTEN_D => self.registers.set_attenuation(usize::from(addr - ATTEN_A), v),
            MPAN => self.registers.set_pan(v),
            MSTEREO => self.registers.set_stereo(v),
            INTRST => {
                self.reset_irq(v);
                // the UART interrupt is a level, it comes straight back
                self.update_uart_irq();
            }
            INTSET => self.set_irq(v),
            SYSCTL1 => {
                cart.set_address_strobe(v & SYSCTL1_CAS != 0);
                if v & SYSCTL1_POWER == 0 {
                    info!("Power off requested, entering monitor.");
                    return MikeyWrite::EnterMonitor;
                }
            }
            IODIR => {
                self.parallel_port.set_direction(v);
                self.update_cart_pins(cart);
            }
            IODAT => {
                self.parallel_port.set_data(v);
                self.update_cart_pins(cart);
            }
            SERCTL => {
                self.uart.set_serctl(v);
                self.update_uart_irq();
            }
            SERDAT => {
                self.uart.set_serdat(v);
                self.update_uart_irq();
            }
            SDONEACK => self.suzy_done = false,
            CPUSLEEP => {
                /* "
                The presence of an interrupt in Mikey, regardless of the state of the CPU enable interrupt bit,
                will prevent the CPU from going to sleep, and thus prevent Suzy from functioning.
                " */
                if !self.suzy_done && self.irq == 0 {
                    debug!("CPU sleep, starting Suzy.");
                    return MikeyWrite::StartSuzy;
                }
                debug!("CPU sleep ignored, irq:0x{:02x} suzy_done:{}", self.irq, self.suzy_done);
            }
            DISPCTL => {
                self.registers.set_dispctl(v);
                let ctl = self.registers.dispctl();
                self.display.dispctl(
                    ctl.contains(DispCtl::color),
                    ctl.contains(DispCtl::flip),
                    ctl.contains(DispCtl::dma_enable),
                );
            }
            PBKUP => {
                self.registers.set_pbkup(v);
                self.display.set_pbkup(v);
            }
            DISPADRL => self.registers.set_disp_adr_low(v),
            DISPADRH => self.registers.set_disp_adr_high(v),
            MTEST2 => {
                if v & 0x01 != 0 {
                    self.display.update_disp_addr(self.registers.disp_adr());
                }
            }
            GREEN0..=BLUEREDF => {
                let index = self.registers.set_palette(addr, v);
                self.display.update_palette(index, v);
            }
            MIKEYHREV => warn!("Write to read only MIKEYHREV ignored."),
            _ => trace!("Mikey write to 0x{addr:04x} ignored"),
        }
        MikeyWrite::None
    }

    fn update_cart_pins(&self, cart: &mut Cartridge) {
        cart.set_address_data(self.parallel_port.output(IODAT_CAD));
        cart.set_audin(self.parallel_port.output(IODAT_AUDIN));
    }

    fn update_uart_irq(&mut self) {
        if self.uart.irq_level() {
            self.set_irq(INT_TIMER4);
        }
    }

    /// Applies a queued timer expiry and its cascade.
    pub fn fire_timer(&mut self, tick: u64, timer: u8, queue: &mut ActionQueue) {
        let Self {
            timers,
            registers,
            display,
            uart,
            irq,
            ..
        } = self;

        timers.fire(tick, timer, queue, |timers, index, queue| {
            match index {
                0 => {
                    let count = timers.count(2, tick);
                    if count == 101 {
                        display.update_disp_addr(registers.disp_adr());
                    }
                    if let Some(dma) = display.hblank(tick, count) {
                        queue.push(ActionKind::DisplayDma(dma.address), dma.tick);
                    }
                }
                2 => display.vblank(tick),
                // "The interrupt bit for timer 4 (UART baud rate) is driven by receiver or transmitter ready bit of the UART."
                4 => {
                    uart.tick();
                    if uart.irq_level() {
                        *irq |= INT_TIMER4;
                    }
                }
                _ => (),
            }
            if index < 8 && index != 4 && timers.timer(index).interrupt_enabled() {
                trace!("Timer #{index} interrupt.");
                *irq |= 1 << index;
            }
        });
    }

    /// One display DMA chunk fetched from RAM.
    pub fn set_dma_data(&mut self, tick: u64, data: u64, queue: &mut ActionQueue) {
        if let Some(dma) = self.display.push_data(tick, data) {
            queue.push(ActionKind::DisplayDma(dma.address), dma.tick);
        }
    }

    /// Stereo mix of the four channels. MSTEREO bits disable a channel on
    /// one side, MPAN bits apply the attenuation nibble (low: left, high: right).
    #[must_use]
    pub fn sample_audio(&self) -> (i16, i16) {
        let stereo = self.registers.stereo();
        let pan = self.registers.pan();
        let mut left = 0i32;
        let mut right = 0i32;

        for i in 0..AUDIO_CHANNEL_COUNT {
            let out = i32::from(self.timers.audio_out(i));
            let atten = i32::from(self.registers.attenuation(i));

            if stereo & (0x01 << i) == 0 {
                left += if pan & (0x01 << i) != 0 { out * (atten & 0x0f) / 16 } else { out };
            }
            if stereo & (0x10 << i) == 0 {
                right += if pan & (0x10 << i) != 0 { out * (atten >> 4) / 16 } else { out };
            }
        }

        let scale = |v: i32| (v << 6).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        (scale(left), scale(right))
    }

    pub fn set_irq(&mut self, mask: u8) {
        self.irq |= mask;
        trace!("IRQ set 0x{mask:02x} -> 0x{:02x}", self.irq);
    }

    pub fn reset_irq(&mut self, mask: u8) {
        self.irq &= !mask;
        trace!("IRQ reset 0x{mask:02x} -> 0x{:02x}", self.irq);
    }

    /// Pending interrupt bits, the CPU IRQ line is asserted while not 0.
    #[must_use]
    pub fn irq(&self) -> u8 {
        self.irq
    }

    pub fn suzy_done(&mut self) {
        self.suzy_done = true;
    }

    #[must_use]
    pub fn is_suzy_done(&self) -> bool {
        self.suzy_done
    }

    #[must_use]
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    #[must_use]
    pub fn registers(&self) -> &MikeyRegisters {
        &self.registers
    }

    #[must_use]
    pub fn surface(&self) -> &[u8] {
        self.display.surface()
    }

    pub fn set_video_sink(&mut self, sink: Option<Box<dyn VideoSink>>) {
        self.display.set_sink(sink);
    }

    pub fn take_video_sink(&mut self) -> Option<Box<dyn VideoSink>> {
        self.display.take_sink()
    }

    pub fn set_comlynx_wire(&mut self, wire: ComLynxWire) {
        self.uart.set_wire(wire);
    }

    #[must_use]
    pub fn comlynx_wire(&self) -> &ComLynxWire {
        self.uart.wire()
    }
}

impl Default for Mikey {
    fn default() -> Self {
        Mikey::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mikey::timers::{CTRLA_ENABLE_COUNT_BIT, CTRLA_ENABLE_RELOAD_BIT, CTRLA_INTERRUPT_BIT, LINKED_PERIOD};

    fn write(mikey: &mut Mikey, queue: &mut ActionQueue, cart: &mut Cartridge, addr: u16, v: u8) -> MikeyWrite {
        mikey.request_access(0, addr);
        mikey.write(addr, v, queue, cart)
    }

    fn run(mikey: &mut Mikey, queue: &mut ActionQueue, until: u64) -> Vec<(u64, ActionKind)> {
        let mut seen = vec![];
        while queue.peek_tick().is_some_and(|t| t <= until) {
            let a = queue.pop().unwrap();
            seen.push((a.tick(), a.kind()));
            if let ActionKind::FireTimer(i) = a.kind() {
                mikey.fire_timer(a.tick(), i, queue);
            }
        }
        seen
    }

    #[test]
    fn access_aligns_on_timer_slot() {
        let mut mikey = Mikey::new();
        // not a timer register: plain 5 ticks
        assert_eq!(mikey.request_access(100, INTSET), 105);
        // timer 0 slot at the start of each 16 tick cycle
        assert_eq!(mikey.request_access(100, TIM0BKUP), 112);
        assert_eq!(mikey.request_access(91, TIM0BKUP), 96);
        // timer 6: slot 8
        assert_eq!(mikey.request_access(100, 0xfd18), 120);
        // audio 3: timer 11, slot 14
        assert_eq!(mikey.request_access(100, 0xfd38), 110);
    }

    #[test]
    fn timer0_interrupt_and_borrow() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut mikey = Mikey::new();
        let mut queue = ActionQueue::new();
        let mut cart = Cartridge::new();
        write(&mut mikey, &mut queue, &mut cart, 0xfd08, 0); // timer 2 backup
        write(&mut mikey, &mut queue, &mut cart, 0xfd09, CTRLA_ENABLE_RELOAD_BIT | CTRLA_ENABLE_COUNT_BIT | LINKED_PERIOD);
        write(&mut mikey, &mut queue, &mut cart, TIM0BKUP, 3);
        write(&mut mikey, &mut queue, &mut cart, 0xfd01, CTRLA_INTERRUPT_BIT | CTRLA_ENABLE_RELOAD_BIT | CTRLA_ENABLE_COUNT_BIT);
        assert_eq!(mikey.irq(), 0);

        // timer 0 programmed at its access tick 16, expires on the next edge
        run(&mut mikey, &mut queue, 32);
        assert_eq!(mikey.irq(), INT_TIMER0);
        assert!(mikey.timers().timer(2).is_done());
        assert_eq!(mikey.read(INTSET, &cart), INT_TIMER0);

        write(&mut mikey, &mut queue, &mut cart, INTRST, INT_TIMER0);
        assert_eq!(mikey.irq(), 0);
    }

    #[test]
    fn cpu_sleep_gate() {
        let mut mikey = Mikey::new();
        let mut queue = ActionQueue::new();
        let mut cart = Cartridge::new();
        assert_eq!(write(&mut mikey, &mut queue, &mut cart, CPUSLEEP, 0), MikeyWrite::StartSuzy);
        mikey.suzy_done();
        assert_eq!(write(&mut mikey, &mut queue, &mut cart, CPUSLEEP, 0), MikeyWrite::None);
        write(&mut mikey, &mut queue, &mut cart, SDONEACK, 0);
        write(&mut mikey, &mut queue, &mut cart, INTSET, 0x40);
        assert_eq!(write(&mut mikey, &mut queue, &mut cart, CPUSLEEP, 0), MikeyWrite::None);
        write(&mut mikey, &mut queue, &mut cart, INTRST, 0xff);
        assert_eq!(write(&mut mikey, &mut queue, &mut cart, CPUSLEEP, 0), MikeyWrite::StartSuzy);
    }

    #[test]
    fn sysctl1_power_and_strobe() {
        let mut mikey = Mikey::new();
        let mut queue = ActionQueue::new();
        let mut cart = Cartridge::new();
        write(&mut mikey, &mut queue, &mut cart, IODIR, IODAT_CAD);
        write(&mut mikey, &mut queue, &mut cart, IODAT, IODAT_CAD);
        assert_eq!(write(&mut mikey, &mut queue, &mut cart, SYSCTL1, SYSCTL1_POWER | SYSCTL1_CAS), MikeyWrite::None);
        assert_eq!(cart.shift_register(), 1);
        assert_eq!(write(&mut mikey, &mut queue, &mut cart, SYSCTL1, 0), MikeyWrite::EnterMonitor);
    }

    #[test]
    fn hblank_requests_display_dma() {
        let mut mikey = Mikey::new();
        let mut queue = ActionQueue::new();
        let mut cart = Cartridge::new();
        write(&mut mikey, &mut queue, &mut cart, DISPADRL, 0x00);
        write(&mut mikey, &mut queue, &mut cart, DISPADRH, 0xc0);
        write(&mut mikey, &mut queue, &mut cart, DISPCTL, 0x0d);
        // timer 2 linked, count 101: first row
        write(&mut mikey, &mut queue, &mut cart, 0xfd08, 104);
        write(&mut mikey, &mut queue, &mut cart, 0xfd0a, 101);
        write(&mut mikey, &mut queue, &mut cart, 0xfd09, CTRLA_ENABLE_RELOAD_BIT | CTRLA_ENABLE_COUNT_BIT | LINKED_PERIOD);
        write(&mut mikey, &mut queue, &mut cart, TIM0BKUP, 158);
        write(&mut mikey, &mut queue, &mut cart, 0xfd01, CTRLA_ENABLE_RELOAD_BIT | CTRLA_ENABLE_COUNT_BIT);

        let seen = run(&mut mikey, &mut queue, 32);
        assert!(seen.contains(&(32, ActionKind::DisplayDma(0xc000))));
        assert_eq!(mikey.timers().count(2, 32), 100);

        mikey.set_dma_data(32, 0, &mut queue);
        assert_eq!(
            queue.pop().map(|a| (a.tick(), a.kind())),
            Some((32 + video::DMA_CHUNK_INTERVAL, ActionKind::DisplayDma(0xc008)))
        );
    }

    #[test]
    fn audio_mix() {
        let mut mikey = Mikey::new();
        let mut queue = ActionQueue::new();
        let mut cart = Cartridge::new();
        write(&mut mikey, &mut queue, &mut cart, AUD0VOL, 64);
        write(&mut mikey, &mut queue, &mut cart, 0xfd25, CTRLA_ENABLE_COUNT_BIT);
        run(&mut mikey, &mut queue, 16);
        assert_eq!(mikey.timers().audio_out(0), 64);

        // attenuation 0xff with pan set: 15/16 on both sides
        assert_eq!(mikey.sample_audio(), (60 << 6, 60 << 6));

        write(&mut mikey, &mut queue, &mut cart, MPAN, 0);
        assert_eq!(mikey.sample_audio(), (64 << 6, 64 << 6));

        write(&mut mikey, &mut queue, &mut cart, MSTEREO, 0x01);
        assert_eq!(mikey.sample_audio(), (0, 64 << 6));
    }

    #[test]
    fn palette_reads_back() {
        let mut mikey = Mikey::new();
        let mut queue = ActionQueue::new();
        let mut cart = Cartridge::new();
        write(&mut mikey, &mut queue, &mut cart, GREEN0 + 1, 0xf7);
        write(&mut mikey, &mut queue, &mut cart, BLUERED0 + 1, 0xa5);
        assert_eq!(mikey.read(GREEN0 + 1, &cart), 0x07);
        assert_eq!(mikey.read(BLUERED0 + 1, &cart), 0xa5);
        assert_eq!(mikey.read(MIKEYHREV, &cart), 0x01);
        assert_eq!(mikey.read(DISPCTL, &cart), 0xff);
    }
}
