use core::fmt;

use log::trace;
use serde::{Deserialize, Serialize};

use super::{
    CTRLA_ENABLE_COUNT_BIT, CTRLA_ENABLE_RELOAD_BIT, CTRLA_INTERRUPT_BIT, CTRLA_PERIOD_BIT,
    CTRLA_RESET_DONE_BIT, CTRLB_BORROW_IN_BIT, CTRLB_BORROW_OUT_BIT, CTRLB_LAST_CLOCK_BIT,
    CTRLB_TIMER_DONE_BIT, LINKED_PERIOD, TIMER_TICKS_COUNT,
};

/// One Mikey countdown timer, evaluated lazily.
///
/// A clocked timer only stores the count it had at `base_tick`: clock edges
/// fall on multiples of its period, so the live count and the expiry tick are
/// both derived from it. The bus master is asked to fire the timer at
/// `scheduled`; any other queued fire for this timer is stale.
#[derive(Clone, Serialize, Deserialize)]
pub struct TimerCore {
    id: u8,
    backup: u8,
    control_a: u8,
    control_b: u8,
    count: u8,
    base_tick: u64,
    scheduled: Option<u64>,
}

impl TimerCore {
    #[must_use]
    pub fn new(id: u8) -> Self {
        Self {
            id,
            backup: 0,
            control_a: 0,
            control_b: 0,
            count: 0,
            base_tick: 0,
            scheduled: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    #[inline]
    fn period(&self) -> u8 {
        self.control_a & CTRLA_PERIOD_BIT
    }

    /// Ticks between two clock edges, `None` when clocked by the upstream timer's borrow.
    #[inline]
    #[must_use]
    pub fn clock_ticks(&self) -> Option<u64> {
        match self.period() {
            LINKED_PERIOD => None,
            p => Some(TIMER_TICKS_COUNT << p),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.period() == LINKED_PERIOD
    }

    #[inline]
    #[must_use]
    pub fn interrupt_enabled(&self) -> bool {
        self.control_a & CTRLA_INTERRUPT_BIT != 0
    }

    #[inline]
    #[must_use]
    pub fn reload_enabled(&self) -> bool {
        self.control_a & CTRLA_ENABLE_RELOAD_BIT != 0
    }

    #[inline]
    #[must_use]
    pub fn count_enabled(&self) -> bool {
        self.control_a & CTRLA_ENABLE_COUNT_BIT != 0
    }

    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.control_b & CTRLB_TIMER_DONE_BIT != 0
    }

    // "If the reload is disabled, the timer will stop when it is done."
    fn running(&self) -> bool {
        self.count_enabled() && !(self.is_done() && !self.reload_enabled())
    }

    #[must_use]
    pub fn scheduled(&self) -> Option<u64> {
        self.scheduled
    }

    fn elapsed_clocks(&self, tick: u64) -> u64 {
        match self.clock_ticks() {
            Some(p) if self.running() && tick > self.base_tick => tick / p - self.base_tick / p,
            _ => 0,
        }
    }

    /// Count as the CPU sees it at `tick`.
    #[must_use]
    pub fn count(&self, tick: u64) -> u8 {
        let elapsed = self.elapsed_clocks(tick);
        u64::from(self.count).saturating_sub(elapsed) as u8
    }

    fn sync(&mut self, tick: u64) {
        self.count = self.count(tick);
        self.base_tick = tick;
    }

    /// Recomputes the expiry tick. Returns it when a new fire action has to be queued.
    fn reschedule(&mut self) -> Option<u64> {
        let next = match self.clock_ticks() {
            Some(p) if self.running() => {
                let first_edge = (self.base_tick / p + 1) * p;
                Some(first_edge + u64::from(self.count) * p)
            }
            _ => None,
        };
        let changed = next != self.scheduled;
        self.scheduled = next;
        if changed {
            trace!("Timer #{} next fire @ {:?}", self.id, next);
            next
        } else {
            None
        }
    }

    #[must_use]
    pub fn backup(&self) -> u8 {
        self.backup
    }

    #[must_use]
    pub fn control_a(&self) -> u8 {
        self.control_a
    }

    #[must_use]
    pub fn control_b(&self) -> u8 {
        self.control_b
    }

    pub fn set_backup(&mut self, value: u8) {
        trace!("Timer #{} backup = {}.", self.id, value);
        self.backup = value;
    }

    pub fn set_control_a(&mut self, tick: u64, value: u8) -> Option<u64> {
        self.sync(tick);
        self.control_a = value & !CTRLA_RESET_DONE_BIT;
        if value & CTRLA_RESET_DONE_BIT != 0 {
            self.control_b &= !CTRLB_TIMER_DONE_BIT;
        }
        trace!("Timer {self:?}");
        self.reschedule()
    }

    pub fn set_count(&mut self, tick: u64, value: u8) -> Option<u64> {
        trace!("Timer #{} count = {}.", self.id, value);
        self.sync(tick);
        self.count = value;
        self.reschedule()
    }

    /// Status bits only clear on write, the high nibble is plain storage.
    pub fn set_control_b(&mut self, tick: u64, value: u8) -> Option<u64> {
        self.sync(tick);
        self.control_b = (value & 0xf0) | (self.control_b & value & 0x0f);
        self.reschedule()
    }

    /// Overwrites the storage nibble of control B, used by the audio shift register.
    pub fn set_control_b_high(&mut self, nibble: u8) {
        self.control_b = (self.control_b & 0x0f) | (nibble << 4);
    }

    fn expire(&mut self, tick: u64) -> Option<u64> {
        self.control_b |= CTRLB_TIMER_DONE_BIT | CTRLB_BORROW_OUT_BIT | CTRLB_LAST_CLOCK_BIT;
        self.base_tick = tick;
        if self.reload_enabled() {
            trace!("Timer #{} reload 0x{:02x}.", self.id, self.backup);
            self.count = self.backup;
        } else {
            trace!("Timer #{} done.", self.id);
            self.count = 0;
        }
        self.scheduled = None;
        self.reschedule()
    }

    /// Handles a queued fire at `tick`. `None` if the action is stale, otherwise
    /// the follow-up fire tick, if any.
    pub fn fire(&mut self, tick: u64) -> Option<Option<u64>> {
        if self.scheduled != Some(tick) {
            trace!("Timer #{} stale fire @ {}.", self.id, tick);
            return None;
        }
        Some(self.expire(tick))
    }

    /// Borrow pulse from the upstream timer. `None` if the timer did not expire.
    pub fn borrow_in(&mut self, tick: u64) -> Option<Option<u64>> {
        if !self.is_linked() || !self.running() {
            return None;
        }
        self.control_b |= CTRLB_BORROW_IN_BIT;
        self.control_b &= !CTRLB_BORROW_OUT_BIT;
        if self.count > 0 {
            self.count -= 1;
            return None;
        }
        Some(self.expire(tick))
    }
}

impl fmt::Debug for TimerCore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Timer #:{}, backup:{}, period:{}, int:{} reload:{}, count:{}, enabled:{}, scheduled:{:?}",
            self.id,
            self.backup,
            self.period(),
            self.interrupt_enabled(),
            self.reload_enabled(),
            self.count,
            self.count_enabled(),
            self.scheduled
        )
    }
}
