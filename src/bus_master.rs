use std::io::Error;
use std::sync::Arc;

use log::{info, trace};
use serde::{Deserialize, Serialize};

use crate::action::{ActionKind, ActionQueue};
use crate::bus::{CpuInterrupt, CpuRequest, CpuRequestType, MapCtl, PageTable, PageType};
use crate::cartridge::{Cartridge, CartridgeImage};
use crate::consts::{
    CRYSTAL_FREQ, DISPLAY_DMA_FAST_CYCLES, DISPLAY_DMA_SLOW_CYCLES, RAM_CYCLE_TICKS,
    SLOW_CYCLE_TICKS,
};
use crate::cpu::{Cpu, InstructionTrace};
use crate::mikey::{uart::comlynx_wire::ComLynxWire, video::VideoSink, Mikey, MikeyWrite};
use crate::ram::Ram;
use crate::rom::{BootRom, RawImage};
use crate::suzy::{request::SuzyRequest, KeyInput, Suzy};

/// Owner of the machine: memory, chips and the CPU, driven by one tick
/// ordered action queue.
#[derive(Serialize, Deserialize)]
pub struct BusMaster<C> {
    cpu: C,
    cpu_request: CpuRequest,
    ram: Ram,
    rom: BootRom,
    pages: PageTable,
    map_ctl: MapCtl,
    mikey: Mikey,
    suzy: Suzy,
    cart: Cartridge,
    queue: ActionQueue,
    current_tick: u64,
    bus_reservation_tick: u64,
    sequenced_access_address: Option<u16>,
    sprite_pass: bool,
    halted: bool,
    trace: InstructionTrace,
    samples_per_second: u32,
    audio_remainder: u64,
    audio_scheduled: bool,
    #[serde(skip)]
    samples: Vec<(i16, i16)>,
}

impl<C: Cpu> BusMaster<C> {
    /// # Errors
    ///
    /// Fails when `boot_rom` is not a 512 bytes image.
    pub fn new(cpu: C, boot_rom: &[u8]) -> Result<Self, Error> {
        let mut bus = Self {
            cpu,
            cpu_request: CpuRequest::default(),
            ram: Ram::new(),
            rom: BootRom::from_slice(boot_rom)?,
            pages: PageTable::new(),
            map_ctl: MapCtl::empty(),
            mikey: Mikey::new(),
            suzy: Suzy::new(),
            cart: Cartridge::new(),
            queue: ActionQueue::new(),
            current_tick: 0,
            bus_reservation_tick: 0,
            sequenced_access_address: None,
            sprite_pass: false,
            halted: false,
            trace: InstructionTrace::default(),
            samples_per_second: 0,
            audio_remainder: 0,
            audio_scheduled: false,
            samples: vec![],
        };
        bus.reset();
        Ok(bus)
    }

    /// Power cycle. The boot ROM, the cartridge image and the attached
    /// sink and wire survive.
    pub fn reset(&mut self) {
        info!("Reset.");
        let sink = self.mikey.take_video_sink();
        let wire = self.mikey.comlynx_wire().clone();
        self.mikey = Mikey::new();
        self.mikey.set_video_sink(sink);
        self.mikey.set_comlynx_wire(wire);
        self.suzy = Suzy::new();
        self.ram = Ram::new();
        self.cart.reset();
        self.map_ctl = MapCtl::empty();
        self.pages = PageTable::new();
        self.queue.clear();
        self.current_tick = 0;
        self.bus_reservation_tick = 0;
        self.sequenced_access_address = None;
        self.sprite_pass = false;
        self.halted = false;
        self.trace.clear();
        self.samples.clear();
        self.audio_remainder = 0;
        self.audio_scheduled = false;
        if self.samples_per_second > 0 {
            self.schedule_audio();
        }

        self.cpu.reset();
        self.cpu_request = CpuRequest::default();
        self.resolve_cpu();
    }

    /// Resets, then loads a BS93 executable and points the reset vector at it.
    ///
    /// # Errors
    ///
    /// Fails on a malformed image, the machine is left untouched.
    pub fn load_raw_image(&mut self, data: &[u8]) -> Result<(), Error> {
        let image = RawImage::from_slice(data)?;
        self.reset();
        self.ram.copy(image.load_address(), image.payload());
        self.rom.set_reset_vector(image.load_address());
        info!("Raw image of {} bytes loaded at 0x{:04x}.", image.payload().len(), image.load_address());
        Ok(())
    }

    pub fn insert_cartridge(&mut self, image: Arc<dyn CartridgeImage>) {
        info!("Cartridge inserted.");
        self.cart.insert(image);
    }

    pub fn set_video_sink(&mut self, sink: Box<dyn VideoSink>) {
        self.mikey.set_video_sink(Some(sink));
    }

    pub fn set_comlynx_wire(&mut self, wire: ComLynxWire) {
        self.mikey.set_comlynx_wire(wire);
    }

    /// Samples the audio mix `samples_per_second` times per emulated second, 0 stops.
    pub fn set_audio_out(&mut self, samples_per_second: u32) {
        self.samples_per_second = samples_per_second;
        self.audio_remainder = 0;
        if samples_per_second > 0 && !self.audio_scheduled {
            self.schedule_audio();
        }
    }

    pub fn take_audio_samples(&mut self) -> Vec<(i16, i16)> {
        std::mem::take(&mut self.samples)
    }

    /// Runs `ticks` ticks with `keys` held, returns the last completed frame as RGBA.
    pub fn process(&mut self, ticks: u64, keys: &KeyInput) -> &[u8] {
        self.suzy.set_keys(keys);
        self.queue.push(ActionKind::EndFrame, self.current_tick + ticks);

        while let Some(action) = self.queue.pop() {
            debug_assert!(action.tick() >= self.current_tick);
            self.current_tick = action.tick();
            trace!("[{}] {:?}", self.current_tick, action.kind());

            match action.kind() {
                ActionKind::Cpu(kind, page) => self.execute_cpu(kind, page),
                ActionKind::Suzy(request) => self.execute_suzy(request),
                ActionKind::FireTimer(timer) => {
                    self.mikey.fire_timer(self.current_tick, timer, &mut self.queue);
                }
                ActionKind::DisplayDma(address) => {
                    let data = self.ram.u64(address);
                    self.mikey.set_dma_data(self.current_tick, data, &mut self.queue);
                    self.bus_reservation_tick = self.bus_reservation_tick.max(self.current_tick)
                        + DISPLAY_DMA_FAST_CYCLES * self.map_ctl.fast_cycle_ticks()
                        + DISPLAY_DMA_SLOW_CYCLES * SLOW_CYCLE_TICKS;
                }
                ActionKind::SampleAudio => {
                    if self.samples_per_second == 0 {
                        self.audio_scheduled = false;
                    } else {
                        self.samples.push(self.mikey.sample_audio());
                        self.schedule_audio();
                    }
                }
                ActionKind::EndFrame => break,
            }
        }

        self.mikey.surface()
    }

    fn schedule_audio(&mut self) {
        let sps = u64::from(self.samples_per_second);
        let freq = u64::from(CRYSTAL_FREQ);
        let mut period = freq / sps;
        self.audio_remainder += freq % sps;
        if self.audio_remainder >= sps {
            self.audio_remainder -= sps;
            period += 1;
        }
        self.queue.push(ActionKind::SampleAudio, self.current_tick + period);
        self.audio_scheduled = true;
    }

    /// Hands the resolved request back to the CPU and queues its next one.
    fn resolve_cpu(&mut self) {
        self.cpu_request = self.cpu.resume(&self.cpu_request);
        self.process_cpu();
    }

    fn process_cpu(&mut self) {
        let address = self.cpu_request.address;
        let page = self.pages.page(address);
        let Some(kind) = ActionKind::cpu(self.cpu_request.kind, page) else {
            trace!("CPU stopped.");
            return;
        };

        self.bus_reservation_tick = self.bus_reservation_tick.max(self.current_tick);
        self.queue.push(kind, self.bus_reservation_tick);

        self.bus_reservation_tick = match page {
            PageType::Ram | PageType::BootRomLow | PageType::BootRomHigh => {
                if self.sequenced_access_address == Some(address) {
                    self.bus_reservation_tick + self.map_ctl.fast_cycle_ticks()
                } else {
                    self.bus_reservation_tick + RAM_CYCLE_TICKS
                }
            }
            PageType::Mikey => self.mikey.request_access(self.bus_reservation_tick, address),
            PageType::Suzy => self.suzy.request_access(
                self.bus_reservation_tick,
                address,
                self.cpu_request.kind == CpuRequestType::Write,
            ),
        };
        trace!("CPU {:?} bus reserved until {}", self.cpu_request, self.bus_reservation_tick);
    }

    fn execute_cpu(&mut self, kind: CpuRequestType, page: PageType) {
        let address = self.cpu_request.address;
        let value = self.cpu_request.value;

        match (kind, page) {
            (CpuRequestType::Write, PageType::Ram) => self.ram.set(address, value),
            (CpuRequestType::Write, PageType::BootRomLow) => trace!("Write to ROM 0x{address:04x} ignored."),
            (CpuRequestType::Write, PageType::BootRomHigh) => self.write_ff(address, value),
            (CpuRequestType::Write, PageType::Mikey) => {
                match self.mikey.write(address, value, &mut self.queue, &mut self.cart) {
                    MikeyWrite::None => (),
                    MikeyWrite::StartSuzy => {
                        // the write resolves when the sprite pass is over
                        self.sequenced_access_address = None;
                        self.start_suzy();
                        return;
                    }
                    MikeyWrite::EnterMonitor => {
                        info!("[{}] Entering monitor, CPU halted.", self.current_tick);
                        self.sequenced_access_address = None;
                        self.halted = true;
                        return;
                    }
                }
            }
            (CpuRequestType::Write, PageType::Suzy) => {
                self.suzy.write(self.current_tick, address, value, &mut self.cart);
            }
            (CpuRequestType::Read, PageType::Mikey) => {
                self.cpu_request.value = self.mikey.read(address, &self.cart);
            }
            (CpuRequestType::Read, PageType::Suzy) => {
                self.cpu_request.value = self.suzy.read(address, &mut self.cart);
            }
            (_, PageType::Ram) => self.cpu_request.value = self.ram.get(address),
            (_, PageType::BootRomLow) => self.cpu_request.value = self.rom.get(address),
            (_, PageType::BootRomHigh) => self.cpu_request.value = self.read_ff(address),
            (CpuRequestType::FetchOpcode | CpuRequestType::FetchOperand, PageType::Mikey | PageType::Suzy)
            | (CpuRequestType::None, _) => {
                panic!("Unexpected CPU request {:?} on {page:?} page", self.cpu_request)
            }
        }

        self.sequenced_access_address = match (kind, page) {
            (CpuRequestType::Write, _) | (_, PageType::Mikey | PageType::Suzy) => None,
            _ => Some(address.wrapping_add(1)),
        };

        self.cpu_request.tick = self.current_tick;
        if kind == CpuRequestType::FetchOpcode {
            self.cpu_request.interrupt.set(CpuInterrupt::irq, self.mikey.irq() != 0);
            self.trace.record(&self.cpu_request);
        }
        self.resolve_cpu();
    }

    fn read_ff(&self, address: u16) -> u8 {
        let offset = address & 0xff;
        match offset {
            0xfa..=0xff if self.map_ctl.contains(MapCtl::vector_disable) => self.ram.get(address),
            0x00..=0xf7 if self.map_ctl.contains(MapCtl::kernel_disable) => self.ram.get(address),
            0xfa..=0xff | 0x00..=0xf7 => self.rom.get(0x100 + offset),
            0xf9 => self.map_ctl.read(),
            // 0xFFF8 is always RAM
            _ => self.ram.get(address),
        }
    }

    fn write_ff(&mut self, address: u16, value: u8) {
        let offset = address & 0xff;
        match offset {
            0xf9 => {
                self.map_ctl = MapCtl::from_bits_truncate(value);
                self.pages.remap(self.map_ctl);
                info!("[{}] MAPCTL = {:?}", self.current_tick, self.map_ctl);
            }
            0xf8 => self.ram.set(address, value),
            0xfa..=0xff if self.map_ctl.contains(MapCtl::vector_disable) => self.ram.set(address, value),
            0x00..=0xf7 if self.map_ctl.contains(MapCtl::kernel_disable) => self.ram.set(address, value),
            _ => trace!("Write to ROM 0x{address:04x} ignored."),
        }
    }

    fn start_suzy(&mut self) {
        self.sprite_pass = true;
        self.bus_reservation_tick = self.bus_reservation_tick.max(self.current_tick);
        let request = self.suzy.start_sprites();
        self.push_suzy(request);
    }

    fn push_suzy(&mut self, request: SuzyRequest) {
        self.queue.push(ActionKind::Suzy(request), self.bus_reservation_tick);
        if !request.is_none() {
            self.bus_reservation_tick += RAM_CYCLE_TICKS + request.cost() * self.map_ctl.fast_cycle_ticks();
        }
    }

    fn execute_suzy(&mut self, request: SuzyRequest) {
        let response = match request {
            SuzyRequest::None => {
                trace!("[{}] Sprite pass done.", self.current_tick);
                self.sprite_pass = false;
                self.mikey.suzy_done();
                self.cpu_request.tick = self.current_tick;
                self.resolve_cpu();
                return;
            }
            SuzyRequest::Read { address } => u32::from(self.ram.get(address)),
            SuzyRequest::Read4 { address } => self.ram.u32(address),
            SuzyRequest::Write { address, value } => {
                self.ram.set(address, value);
                0
            }
            SuzyRequest::ColRmw { address, value, mask } => u32::from(self.ram.col_rmw(address, value, mask)),
            SuzyRequest::VidRmw { address, value, mask } => {
                self.ram.vid_rmw(address, value, mask);
                0
            }
            SuzyRequest::Xor { address, value } => {
                self.ram.xor(address, value);
                0
            }
        };
        let next = self.suzy.resume(response);
        self.push_suzy(next);
    }

    /// What the CPU would read at `address`, without side effects.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        match self.pages.page(address) {
            PageType::Ram => self.ram.get(address),
            PageType::BootRomLow => self.rom.get(address),
            PageType::BootRomHigh => self.read_ff(address),
            PageType::Mikey => self.mikey.peek(address, &self.cart),
            PageType::Suzy => self.suzy.peek(address, &self.cart),
        }
    }

    /// Re-attaches what a save state cannot carry.
    pub(crate) fn restore_collaborators(&mut self, source: &Self) {
        self.cart.reattach(source.cart.image().cloned());
        self.mikey.set_comlynx_wire(source.mikey.comlynx_wire().clone());
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    #[must_use]
    pub fn bus_reservation_tick(&self) -> u64 {
        self.bus_reservation_tick
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[must_use]
    pub fn is_sprite_pass(&self) -> bool {
        self.sprite_pass
    }

    #[must_use]
    pub fn map_ctl(&self) -> MapCtl {
        self.map_ctl
    }

    #[must_use]
    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    #[must_use]
    pub fn mikey(&self) -> &Mikey {
        &self.mikey
    }

    #[must_use]
    pub fn suzy(&self) -> &Suzy {
        &self.suzy
    }

    #[must_use]
    pub fn cartridge(&self) -> &Cartridge {
        &self.cart
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[must_use]
    pub fn instruction_trace(&self) -> &InstructionTrace {
        &self.trace
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::consts::*;

    /// Replays a fixed list of requests, keeps what the bus answered.
    #[derive(Default, Serialize, Deserialize)]
    struct ScriptedCpu {
        script: VecDeque<CpuRequest>,
        resolved: Vec<CpuRequest>,
        #[serde(skip)]
        initial: Vec<CpuRequest>,
    }

    impl ScriptedCpu {
        fn new(script: Vec<CpuRequest>) -> Self {
            Self { script: VecDeque::new(), resolved: vec![], initial: script }
        }
    }

    impl Cpu for ScriptedCpu {
        fn resume(&mut self, resolved: &CpuRequest) -> CpuRequest {
            if resolved.kind != CpuRequestType::None {
                self.resolved.push(*resolved);
            }
            self.script.pop_front().unwrap_or_default()
        }

        fn reset(&mut self) {
            self.script = self.initial.iter().copied().collect();
            self.resolved.clear();
        }
    }

    fn rom() -> Vec<u8> {
        let mut rom = vec![0u8; ROM_SIZE];
        rom[0] = 0xa5;
        rom[0x1fa] = 0x11;
        rom[0x1fc] = 0x00;
        rom[0x1fd] = 0xff;
        rom
    }

    fn bus(script: Vec<CpuRequest>) -> BusMaster<ScriptedCpu> {
        let _ = env_logger::builder().is_test(true).try_init();
        BusMaster::new(ScriptedCpu::new(script), &rom()).unwrap()
    }

    fn run(bus: &mut BusMaster<ScriptedCpu>, ticks: u64) {
        bus.process(ticks, &KeyInput::default());
    }

    fn values(bus: &BusMaster<ScriptedCpu>) -> Vec<u8> {
        bus.cpu()
            .resolved
            .iter()
            .filter(|r| r.kind != CpuRequestType::Write)
            .map(|r| r.value)
            .collect()
    }

    #[test]
    fn bad_boot_rom_is_refused() {
        assert!(BusMaster::new(ScriptedCpu::default(), &[0u8; 100]).is_err());
    }

    #[test]
    fn ram_access_and_sequential_timing() {
        let mut bus = bus(vec![
            CpuRequest::write(0x1000, 0x42),
            CpuRequest::read(0x1000),
            CpuRequest::read(0x1001),
        ]);
        bus.ram.set(0x1001, 0x17);
        run(&mut bus, 100);

        let resolved = &bus.cpu().resolved;
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved.iter().map(|r| r.tick).collect::<Vec<_>>(), vec![0, 5, 10]);
        assert_eq!(values(&bus), vec![0x42, 0x17]);
        // the read following 0x1000 takes the fast path
        assert_eq!(bus.bus_reservation_tick(), 10 + FAST_CYCLE_TICKS);
        assert_eq!(bus.current_tick(), 100);
    }

    #[test]
    fn sequential_disable_slows_the_fast_path() {
        let mut bus = bus(vec![
            CpuRequest::write(MMC_ADDR, MAPCTL_SEQ_BIT),
            CpuRequest::read(0x1000),
            CpuRequest::read(0x1001),
        ]);
        run(&mut bus, 100);
        assert_eq!(bus.bus_reservation_tick(), 10 + SLOW_CYCLE_TICKS);
    }

    #[test]
    fn mapctl_kernel_disable() {
        let mut bus = bus(vec![
            CpuRequest::write(0xfe00, 0x99),
            CpuRequest::read(0xfe00),
            CpuRequest::write(MMC_ADDR, MAPCTL_ROM_BIT),
            CpuRequest::write(0xfe00, 0x99),
            CpuRequest::read(0xfe00),
            CpuRequest::read(MMC_ADDR),
            CpuRequest::write(MMC_ADDR, 0),
            CpuRequest::read(0xfe00),
        ]);
        run(&mut bus, 1000);
        // ROM first, then the RAM below it, then ROM again
        assert_eq!(values(&bus), vec![0xa5, 0x99, 0xf4, 0xa5]);
        assert_eq!(bus.map_ctl(), MapCtl::empty());
    }

    #[test]
    fn vector_space_and_fff8() {
        let mut bus = bus(vec![
            CpuRequest::read(0xfffa),
            CpuRequest::write(0xfff8, 0x33),
            CpuRequest::read(0xfff8),
            CpuRequest::write(MMC_ADDR, MAPCTL_VEC_BIT),
            CpuRequest::write(0xfffa, 0x44),
            CpuRequest::read(0xfffa),
        ]);
        run(&mut bus, 1000);
        assert_eq!(values(&bus), vec![0x11, 0x33, 0x44]);
        assert_eq!(bus.peek(0xfffd), 0xff);
        assert_eq!(bus.peek(0xfe00), 0xa5);
    }

    #[test]
    fn opcode_fetch_reports_irq() {
        let mut bus = bus(vec![
            CpuRequest::fetch_opcode(0x0200),
            CpuRequest::write(INTSET, INT_TIMER2),
            CpuRequest::fetch_opcode(0x0201),
        ]);
        run(&mut bus, 1000);
        let resolved = &bus.cpu().resolved;
        assert_eq!(resolved[0].interrupt, CpuInterrupt::empty());
        assert_eq!(resolved[2].interrupt, CpuInterrupt::irq);
        assert_eq!(bus.instruction_trace().last_pc(), Some(0x0201));
    }

    #[test]
    fn mikey_access_waits_for_timer_slot() {
        let mut bus = bus(vec![CpuRequest::write(TIM0BKUP, 10), CpuRequest::read(0x0000)]);
        run(&mut bus, 100);
        let resolved = &bus.cpu().resolved;
        assert_eq!(resolved[0].tick, 0);
        assert_eq!(resolved[1].tick, 16);
    }

    #[test]
    #[should_panic]
    fn fetch_from_chip_page_panics() {
        let _ = bus(vec![CpuRequest::fetch_opcode(SUZ_ADDR)]);
    }

    #[test]
    fn cpusleep_without_sprites_resumes_at_once() {
        let mut bus = bus(vec![CpuRequest::write(CPUSLEEP, 0), CpuRequest::read(0x0000)]);
        run(&mut bus, 100);
        let resolved = &bus.cpu().resolved;
        assert_eq!(resolved.len(), 2);
        // Mikey write access, then the empty sprite pass
        assert_eq!(resolved[0].tick, MIKEY_ACCESS_TICKS);
        assert!(bus.mikey().is_suzy_done());
        assert!(!bus.is_sprite_pass());
    }

    #[test]
    fn pending_irq_blocks_sprites() {
        let mut bus = bus(vec![
            CpuRequest::write(INTSET, INT_TIMER0),
            CpuRequest::write(CPUSLEEP, 0),
            CpuRequest::read(0x0000),
        ]);
        run(&mut bus, 100);
        assert_eq!(bus.cpu().resolved.len(), 3);
        assert!(!bus.mikey().is_suzy_done());
    }

    fn write16(script: &mut Vec<CpuRequest>, addr: u16, v: u16) {
        script.push(CpuRequest::write(addr, (v & 0xff) as u8));
        script.push(CpuRequest::write(addr + 1, (v >> 8) as u8));
    }

    const SCB: u16 = 0x1000;
    const DATA: u16 = 0x1100;
    const VIDBAS: u16 = 0x2000;

    /// CPU script that sets up Suzy and sleeps, with a one line sprite in RAM.
    fn sprite_bus() -> BusMaster<ScriptedCpu> {
        let mut script = vec![];
        write16(&mut script, SCBNEXTL, SCB);
        write16(&mut script, VIDBASL, VIDBAS);
        write16(&mut script, HOFFL, 0);
        write16(&mut script, VOFFL, 0);
        script.push(CpuRequest::write(SPRGO, SPRGO_GO));
        script.push(CpuRequest::write(CPUSLEEP, 0));
        script.push(CpuRequest::read(0x0000));
        let mut bus = bus(script);

        // 4 bpp normal sprite at (2, 1), no collision, one line: literal run of pens 1 and 2
        bus.ram.fill(0);
        bus.ram.copy(
            SCB,
            &[0xc4, 0x10, 0x20, 0x00, 0x00, 0x00, 0x11, 0x02, 0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01],
        );
        bus.ram.copy(SCB + 15, &[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        // 1 0001 0001 0010 00000 -> 1000 1000 1001 0000 00
        bus.ram.copy(DATA, &[0x04, 0x88, 0x90, 0x00, 0x01, 0x01, 0x01, 0x00]);
        bus
    }

    #[test]
    fn sprite_pass_parks_the_cpu() {
        let mut bus = sprite_bus();
        run(&mut bus, 20_000);

        assert_eq!(bus.ram().get(VIDBAS + 80 + 1), 0x12);
        assert!(bus.mikey().is_suzy_done());
        assert!(!bus.is_sprite_pass());
        assert!(!bus.suzy().is_busy());
        assert_eq!(bus.suzy().registers().data(SPRGO) & SPRGO_GO, 0);

        let resolved = &bus.cpu().resolved;
        let sleep = resolved[resolved.len() - 2];
        assert_eq!(sleep.address, CPUSLEEP);
        // the sleeping write resolved only after all the sprite bus traffic
        assert!(sleep.tick > resolved[resolved.len() - 3].tick + 100);
    }

    #[test]
    fn monitor_halts_the_cpu() {
        let mut bus = bus(vec![CpuRequest::write(SYSCTL1, 0), CpuRequest::read(0x0000)]);
        run(&mut bus, 100);
        assert!(bus.is_halted());
        assert!(bus.cpu().resolved.is_empty());
        bus.reset();
        assert!(!bus.is_halted());
    }

    #[test]
    fn audio_rate_is_exact() {
        let mut bus = bus(vec![]);
        bus.set_audio_out(48_000);
        run(&mut bus, 160_000);
        // 480 periods, the one ending on the frame boundary comes after it
        assert_eq!(bus.take_audio_samples().len(), 479);
        run(&mut bus, 1_000);
        assert_eq!(bus.take_audio_samples().len(), 3);
        bus.set_audio_out(0);
        run(&mut bus, 10_000);
        assert!(bus.take_audio_samples().is_empty());
    }

    #[test]
    fn raw_image_sets_reset_vector() {
        let mut bus = bus(vec![CpuRequest::read(0xfffc), CpuRequest::read(0xfffd)]);
        let image = [0x80, 0x08, 0x02, 0x00, 0x00, 0x02, b'B', b'S', b'9', b'3', 0xea, 0x4c];
        bus.load_raw_image(&image).unwrap();
        assert_eq!(bus.peek(0x0200), 0xea);
        assert_eq!(bus.peek(0x0201), 0x4c);
        run(&mut bus, 100);
        assert_eq!(values(&bus), vec![0x00, 0x02]);

        assert!(bus.load_raw_image(&[0; 4]).is_err());
    }

    #[test]
    fn save_state_round_trip() {
        let mut bus = bus(vec![CpuRequest::write(0x1234, 0x56), CpuRequest::read(0x1234)]);
        run(&mut bus, 50);
        let size = crate::serialized_size(&bus).unwrap();
        let mut data = vec![0u8; size];
        crate::serialize(&bus, &mut data).unwrap();
        let restored = crate::deserialize(&data, &bus).unwrap();
        assert_eq!(restored.current_tick(), 50);
        assert_eq!(restored.ram().get(0x1234), 0x56);
        assert_eq!(restored.bus_reservation_tick(), bus.bus_reservation_tick());
        assert_eq!(restored.cpu().resolved.len(), 2);
    }

    #[test]
    fn save_state_refused_during_sprite_pass() {
        let mut bus = sprite_bus();
        run(&mut bus, 120);
        assert!(bus.is_sprite_pass());
        let mut data = vec![0u8; 1 << 20];
        assert!(crate::serialize(&bus, &mut data).is_err());
        assert!(crate::serialized_size(&bus).is_err());

        run(&mut bus, 20_000);
        assert!(crate::serialize(&bus, &mut data).is_ok());
    }

    #[test]
    fn cartridge_reads_and_save_state_keep_the_image() {
        let mut bus = bus(vec![CpuRequest::read(RCART0), CpuRequest::read(RCART0)]);
        let bank0: Vec<u8> = (0..1024u32).map(|i| i as u8).collect();
        bus.insert_cartridge(Arc::new(crate::cartridge::FlatCartridgeImage::new(bank0, vec![], 512)));
        run(&mut bus, 100);
        assert_eq!(values(&bus), vec![0, 1]);
        assert_eq!(bus.cpu().resolved[1].tick, CART_READ_TICKS);
        assert_eq!(bus.peek(RCART0), 2);
        assert_eq!(bus.cartridge().counter(), 2);

        let mut data = vec![0u8; crate::serialized_size(&bus).unwrap()];
        crate::serialize(&bus, &mut data).unwrap();
        let restored = crate::deserialize(&data, &bus).unwrap();
        assert_eq!(restored.peek(RCART0), 2);
    }
}
