pub mod audio_channel;
pub mod timer;

use audio_channel::AudioChannel;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use timer::TimerCore;

use crate::action::{ActionKind, ActionQueue};
use crate::consts::{AUD0VOL, MIK_ADDR};

pub const TIMER_TICKS_COUNT: u64 = 16; // 1us/62.5ns
pub const LINKED_PERIOD: u8 = 7;

pub const TIMER_COUNT: usize = 12;
pub const AUDIO_CHANNEL_COUNT: usize = 4;
const FIRST_AUDIO_TIMER: usize = 8;

/// Timer receiving the borrow out of each timer.
pub const TIMER_LINKS: [Option<usize>; TIMER_COUNT] = [
    Some(2),
    Some(3),
    Some(4),
    Some(5),
    None,
    Some(7),
    None,
    Some(8),
    Some(9),
    Some(10),
    Some(11),
    Some(0),
];

pub const CTRLA_INTERRUPT_BIT: u8 = 0b10000000;
pub const CTRLA_RESET_DONE_BIT: u8 = 0b01000000;
pub const CTRLA_MAGMODE_BIT: u8 = 0b00100000;
pub const CTRLA_ENABLE_RELOAD_BIT: u8 = 0b00010000;
pub const CTRLA_ENABLE_COUNT_BIT: u8 = 0b00001000;
pub const CTRLA_PERIOD_BIT: u8 = 0b00000111;
pub const CTRLB_TIMER_DONE_BIT: u8 = 0b00001000;
pub const CTRLB_LAST_CLOCK_BIT: u8 = 0b00000100;
pub const CTRLB_BORROW_IN_BIT: u8 = 0b00000010;
pub const CTRLB_BORROW_OUT_BIT: u8 = 0b00000001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerReg {
    Backup,
    ControlA,
    Count,
    ControlB,
    Volume,
    Feedback,
    Output,
    ShiftRegister,
}

/// The 12 timers and the 4 audio channels clocked by timers 8 to 11.
#[derive(Clone, Serialize, Deserialize)]
pub struct Timers {
    timers: [TimerCore; TIMER_COUNT],
    audio: [AudioChannel; AUDIO_CHANNEL_COUNT],
}

impl Timers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: core::array::from_fn(|i| TimerCore::new(i as u8)),
            audio: [AudioChannel::new(); AUDIO_CHANNEL_COUNT],
        }
    }

    /// Timer index and register for an address in 0xFD00-0xFD3F.
    fn decode(addr: u16) -> (usize, TimerReg) {
        if addr < AUD0VOL {
            let offset = addr.wrapping_sub(MIK_ADDR);
            (
                usize::from(offset / 4) & 7,
                match offset % 4 {
                    0 => TimerReg::Backup,
                    1 => TimerReg::ControlA,
                    2 => TimerReg::Count,
                    _ => TimerReg::ControlB,
                },
            )
        } else {
            let offset = addr.wrapping_sub(AUD0VOL);
            (
                FIRST_AUDIO_TIMER + (usize::from(offset / 8) & 3),
                match offset % 8 {
                    0 => TimerReg::Volume,
                    1 => TimerReg::Feedback,
                    2 => TimerReg::Output,
                    3 => TimerReg::ShiftRegister,
                    4 => TimerReg::Backup,
                    5 => TimerReg::ControlA,
                    6 => TimerReg::Count,
                    _ => TimerReg::ControlB,
                },
            )
        }
    }

    #[inline]
    #[must_use]
    pub fn timer(&self, index: usize) -> &TimerCore {
        &self.timers[index]
    }

    #[inline]
    #[must_use]
    pub fn count(&self, index: usize, tick: u64) -> u8 {
        self.timers[index].count(tick)
    }

    #[must_use]
    pub fn audio_out(&self, channel: usize) -> i8 {
        self.audio[channel].output()
    }

    pub fn read(&self, tick: u64, addr: u16) -> u8 {
        let (index, reg) = Self::decode(addr);
        let t = &self.timers[index];
        let ch = index.wrapping_sub(FIRST_AUDIO_TIMER);
        match reg {
            TimerReg::Backup => t.backup(),
            TimerReg::ControlA => t.control_a(),
            TimerReg::Count => t.count(tick),
            TimerReg::ControlB => t.control_b(),
            TimerReg::Volume => self.audio[ch].volume(),
            TimerReg::Feedback => self.audio[ch].feedback(),
            TimerReg::Output => self.audio[ch].output() as u8,
            TimerReg::ShiftRegister => self.audio[ch].shift_register(),
        }
    }

    /// Register write. A reprogrammed timer gets a new fire action.
    pub fn write(&mut self, tick: u64, addr: u16, v: u8, queue: &mut ActionQueue) {
        let (index, reg) = Self::decode(addr);
        trace!("Timer #{index} {reg:?} <- 0x{v:02x}");
        let ch = index.wrapping_sub(FIRST_AUDIO_TIMER);
        let t = &mut self.timers[index];
        let scheduled = match reg {
            TimerReg::Backup => {
                t.set_backup(v);
                None
            }
            TimerReg::ControlA => t.set_control_a(tick, v),
            TimerReg::Count => t.set_count(tick, v),
            TimerReg::ControlB => t.set_control_b(tick, v),
            TimerReg::Volume => {
                self.audio[ch].set_volume(v);
                None
            }
            TimerReg::Feedback => {
                self.audio[ch].set_feedback(v);
                None
            }
            TimerReg::Output => {
                self.audio[ch].set_output(v);
                None
            }
            TimerReg::ShiftRegister => {
                self.audio[ch].set_shift_register(v);
                None
            }
        };
        if let Some(at) = scheduled {
            debug!("[{tick}] Timer #{index} reprogrammed, fires at {at}");
            queue.push(ActionKind::FireTimer(index as u8), at);
        }
    }

    /// Handles a queued fire of timer `index` and the borrow cascade it starts.
    /// `on_expire` sees every expired timer in cascade order, before the borrow
    /// reaches the next one, and may queue follow-up actions. Stale actions do nothing.
    ///
    /// # Panics
    ///
    /// On a timer index out of range.
    pub fn fire<F>(&mut self, tick: u64, index: u8, queue: &mut ActionQueue, mut on_expire: F)
    where
        F: FnMut(&Timers, usize, &mut ActionQueue),
    {
        let mut current = usize::from(index);
        assert!(current < TIMER_COUNT, "No timer #{current}");

        let Some(next) = self.timers[current].fire(tick) else {
            return;
        };
        if let Some(at) = next {
            queue.push(ActionKind::FireTimer(current as u8), at);
        }

        loop {
            if current >= FIRST_AUDIO_TIMER {
                let (timer, channel) = (&mut self.timers[current], &mut self.audio[current - FIRST_AUDIO_TIMER]);
                channel.trigger(timer);
            }
            on_expire(self, current, queue);

            let Some(linked) = TIMER_LINKS[current] else {
                break;
            };
            match self.timers[linked].borrow_in(tick) {
                Some(next) => {
                    if let Some(at) = next {
                        queue.push(ActionKind::FireTimer(linked as u8), at);
                    }
                    current = linked;
                }
                None => break,
            }
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Timers::new()
    }
}
