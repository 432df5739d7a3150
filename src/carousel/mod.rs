//! Carousel / infinite-scroll engine
//!
//! One parameterized state machine for every auto-advancing product strip.
//! The visible list is the logical product list tripled; whenever the scroll
//! position leaves the middle copy it is silently reset into the equivalent
//! offset of the middle copy, which reads as endless looping. Only one smooth
//! scroll may be in flight at a time; extra requests are dropped, not queued.
//!
//! The engine owns no timers. The host drives it with `tick(now)` from its
//! event loop and applies the returned [`ScrollCommand`]s to the real scroll
//! container; dropping the engine tears everything down with it.

use crate::platform::ViewportProbe;

/// Breakpoint thresholds for card-count derivation, in CSS pixels.
#[derive(Clone, Copy, Debug)]
pub struct Breakpoints {
    pub mobile_max: f64,
    pub tablet_max: f64,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self { mobile_max: 640.0, tablet_max: 1024.0 }
    }
}

/// The one shared card-count rule: mobile 2, tablet 3, desktop 4.
pub fn visible_cards(breakpoints: Breakpoints, viewport_width: f64) -> u32 {
    if viewport_width <= breakpoints.mobile_max {
        2
    } else if viewport_width <= breakpoints.tablet_max {
        3
    } else {
        4
    }
}

/// Card width for a container, accounting for inter-card gaps.
pub fn card_width(container_width: f64, visible: u32, gap: f64) -> f64 {
    let visible = visible.max(1) as f64;
    ((container_width - gap * (visible - 1.0)) / visible).max(0.0)
}

#[derive(Clone, Copy, Debug)]
pub struct CarouselConfig {
    pub item_count: usize,
    pub autoplay_interval_ms: i64,
    pub scroll_duration_ms: i64,
    pub manual_cooldown_ms: i64,
    pub card_gap: f64,
    pub breakpoints: Breakpoints,
}

impl CarouselConfig {
    pub fn new(item_count: usize) -> Self {
        Self {
            item_count,
            autoplay_interval_ms: 4_000,
            scroll_duration_ms: 500,
            manual_cooldown_ms: 5_000,
            card_gap: 16.0,
            breakpoints: Breakpoints::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A smooth scroll is in flight until the embedded deadline.
    Scrolling,
    /// A loop-boundary jump was emitted and not yet acknowledged.
    Resetting,
}

/// Instruction for the host scroll container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollCommand {
    /// Animate to the offset over the configured duration.
    Smooth { to: f64, duration_ms: i64 },
    /// Reposition instantly, no animation. Must not be visible to the user.
    Jump { to: f64 },
}

pub struct CarouselEngine {
    config: CarouselConfig,
    phase: Phase,
    scroll_position: f64,
    scroll_target: f64,
    scroll_until_ms: i64,
    card_width: f64,
    visible: u32,
    hovered: bool,
    last_manual_ms: Option<i64>,
    last_autoplay_ms: i64,
}

impl CarouselEngine {
    pub fn new(config: CarouselConfig, viewport_width: f64, now_ms: i64) -> Self {
        let mut engine = Self {
            config,
            phase: Phase::Idle,
            scroll_position: 0.0,
            scroll_target: 0.0,
            scroll_until_ms: 0,
            card_width: 0.0,
            visible: 1,
            hovered: false,
            last_manual_ms: None,
            last_autoplay_ms: now_ms,
        };
        engine.resize(viewport_width);
        engine.scroll_position = engine.set_width();
        engine
    }

    pub fn from_probe(config: CarouselConfig, probe: &dyn ViewportProbe, now_ms: i64) -> Self {
        Self::new(config, probe.viewport_width(), now_ms)
    }

    pub fn phase(&self) -> Phase { self.phase }
    pub fn scroll_position(&self) -> f64 { self.scroll_position }
    pub fn card_width(&self) -> f64 { self.card_width }
    pub fn visible_count(&self) -> u32 { self.visible }

    pub fn is_transitioning(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// One logical copy's width in pixels.
    pub fn set_width(&self) -> f64 {
        self.config.item_count as f64 * self.stride()
    }

    fn stride(&self) -> f64 {
        self.card_width + self.config.card_gap
    }

    /// Re-reads the viewport on a resize event.
    pub fn resize_from(&mut self, probe: &dyn ViewportProbe) {
        self.resize(probe.viewport_width());
    }

    /// Recomputes card sizing from the viewport, keeping the current logical
    /// card index so a resize does not visually jump the strip.
    pub fn resize(&mut self, viewport_width: f64) {
        let index = if self.stride() > 0.0 { self.scroll_position / self.stride() } else { 0.0 };
        self.visible = visible_cards(self.config.breakpoints, viewport_width);
        self.card_width = card_width(viewport_width, self.visible, self.config.card_gap);
        self.scroll_position = index * self.stride();
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    /// Manual forward navigation. Dropped while a scroll or reset is in
    /// flight.
    pub fn next(&mut self, now_ms: i64) -> Option<ScrollCommand> {
        self.manual_scroll(now_ms, 1.0)
    }

    /// Manual backward navigation.
    pub fn prev(&mut self, now_ms: i64) -> Option<ScrollCommand> {
        self.manual_scroll(now_ms, -1.0)
    }

    fn manual_scroll(&mut self, now_ms: i64, direction: f64) -> Option<ScrollCommand> {
        if self.is_transitioning() || self.config.item_count == 0 {
            return None;
        }
        self.last_manual_ms = Some(now_ms);
        Some(self.begin_scroll(now_ms, direction))
    }

    fn begin_scroll(&mut self, now_ms: i64, direction: f64) -> ScrollCommand {
        self.scroll_target = self.scroll_position + direction * self.stride();
        self.scroll_until_ms = now_ms + self.config.scroll_duration_ms;
        self.phase = Phase::Scrolling;
        ScrollCommand::Smooth { to: self.scroll_target, duration_ms: self.config.scroll_duration_ms }
    }

    /// Event-loop heartbeat: completes an elapsed scroll, emits the silent
    /// wraparound jump when the position left the middle copy, acknowledges a
    /// pending reset, and fires autoplay when due.
    pub fn tick(&mut self, now_ms: i64) -> Option<ScrollCommand> {
        match self.phase {
            Phase::Scrolling => {
                if now_ms >= self.scroll_until_ms {
                    self.scroll_position = self.scroll_target;
                    self.phase = Phase::Idle;
                    if let Some(jump) = self.normalize() {
                        return Some(jump);
                    }
                }
                None
            }
            Phase::Resetting => {
                // Host applied the jump; the correction is done.
                self.phase = Phase::Idle;
                None
            }
            Phase::Idle => {
                if self.autoplay_due(now_ms) {
                    self.last_autoplay_ms = now_ms;
                    return Some(self.begin_scroll(now_ms, 1.0));
                }
                None
            }
        }
    }

    /// Reports an externally observed scroll offset (drag, trackpad). Counts
    /// as manual interaction for the autoplay cooldown.
    pub fn observe_scroll(&mut self, position: f64, now_ms: i64) -> Option<ScrollCommand> {
        if self.phase == Phase::Scrolling {
            return None;
        }
        self.scroll_position = position;
        self.last_manual_ms = Some(now_ms);
        self.normalize()
    }

    /// Folds the position back into the middle logical copy. The emitted jump
    /// delta is always an exact multiple of one set width, so the same cards
    /// stay on screen.
    fn normalize(&mut self) -> Option<ScrollCommand> {
        let set = self.set_width();
        if set <= 0.0 {
            return None;
        }
        let lower = set;
        let upper = 2.0 * set;
        if self.scroll_position >= lower && self.scroll_position < upper {
            return None;
        }
        let mut corrected = self.scroll_position;
        while corrected >= upper {
            corrected -= set;
        }
        while corrected < lower {
            corrected += set;
        }
        self.scroll_position = corrected;
        self.scroll_target = corrected;
        self.phase = Phase::Resetting;
        Some(ScrollCommand::Jump { to: corrected })
    }

    fn autoplay_due(&self, now_ms: i64) -> bool {
        if self.hovered || self.config.item_count == 0 {
            return false;
        }
        if now_ms - self.last_autoplay_ms < self.config.autoplay_interval_ms {
            return false;
        }
        self.last_manual_ms
            .map_or(true, |m| now_ms - m >= self.config.manual_cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(items: usize) -> CarouselEngine {
        // Desktop viewport: 4 visible cards of (1024 - 48) / 4 = 244 px.
        CarouselEngine::new(CarouselConfig::new(items), 1040.0, 0)
    }

    fn finish_scroll(e: &mut CarouselEngine, cmd: ScrollCommand, now_ms: i64) -> Option<ScrollCommand> {
        match cmd {
            ScrollCommand::Smooth { duration_ms, .. } => e.tick(now_ms + duration_ms),
            ScrollCommand::Jump { .. } => None,
        }
    }

    #[test]
    fn test_breakpoint_card_counts() {
        let bp = Breakpoints::default();
        assert_eq!(visible_cards(bp, 375.0), 2);
        assert_eq!(visible_cards(bp, 800.0), 3);
        assert_eq!(visible_cards(bp, 1440.0), 4);
    }

    #[test]
    fn test_starts_in_middle_copy() {
        let e = engine(5);
        assert_eq!(e.scroll_position(), e.set_width());
        assert_eq!(e.phase(), Phase::Idle);
    }

    #[test]
    fn test_second_request_dropped_while_scrolling() {
        let mut e = engine(5);
        assert!(e.next(0).is_some());
        assert_eq!(e.phase(), Phase::Scrolling);
        assert!(e.next(10).is_none());
        assert!(e.prev(10).is_none());
        // Autoplay is also held off while in flight.
        assert!(e.tick(10).is_none());
    }

    #[test]
    fn test_scroll_completes_to_idle() {
        let mut e = engine(5);
        let cmd = e.next(0).unwrap();
        finish_scroll(&mut e, cmd, 0);
        assert_eq!(e.phase(), Phase::Idle);
        assert_eq!(e.scroll_position(), e.set_width() + e.stride());
    }

    #[test]
    fn test_wraparound_delta_is_whole_set_width() {
        let mut e = engine(3);
        let set = e.set_width();
        let mut now = 0;
        // Scroll forward across the upper bound of the middle copy.
        for _ in 0..4 {
            let cmd = e.next(now).unwrap();
            let jump = finish_scroll(&mut e, cmd, now);
            now += 10_000; // clear the cooldown between steps
            if let Some(ScrollCommand::Jump { to }) = jump {
                let before = match cmd {
                    ScrollCommand::Smooth { to, .. } => to,
                    ScrollCommand::Jump { to } => to,
                };
                let delta = before - to;
                assert!((delta - set).abs() < 1e-9, "jump delta {delta} is not one set width {set}");
                assert!(to >= set && to < 2.0 * set);
                e.tick(now); // acknowledge the reset
            }
        }
        assert_eq!(e.phase(), Phase::Idle);
    }

    #[test]
    fn test_backward_wraparound() {
        let mut e = engine(3);
        let set = e.set_width();
        // Drag below the middle copy's lower bound.
        let jump = e.observe_scroll(set - 1.0, 0);
        match jump {
            Some(ScrollCommand::Jump { to }) => {
                assert!((to - (2.0 * set - 1.0)).abs() < 1e-9);
                assert_eq!(e.phase(), Phase::Resetting);
            }
            other => panic!("expected jump, got {other:?}"),
        }
        e.tick(1);
        assert_eq!(e.phase(), Phase::Idle);
    }

    #[test]
    fn test_autoplay_fires_on_interval() {
        let mut e = engine(5);
        assert!(e.tick(1_000).is_none());
        let cmd = e.tick(4_000);
        assert!(matches!(cmd, Some(ScrollCommand::Smooth { .. })));
    }

    #[test]
    fn test_autoplay_suppressed_while_hovered() {
        let mut e = engine(5);
        e.set_hovered(true);
        assert!(e.tick(10_000).is_none());
        e.set_hovered(false);
        assert!(e.tick(10_001).is_some());
    }

    #[test]
    fn test_manual_interaction_cooldown() {
        let mut e = engine(5);
        let cmd = e.next(0).unwrap();
        finish_scroll(&mut e, cmd, 0);
        // Interval has elapsed but the 5s cooldown has not.
        assert!(e.tick(4_500).is_none());
        assert!(e.tick(5_000).is_some());
    }

    #[test]
    fn test_resize_keeps_logical_index() {
        let mut e = engine(5);
        let index_before = e.scroll_position() / e.stride();
        e.resize(800.0);
        assert_eq!(e.visible_count(), 3);
        let index_after = e.scroll_position() / e.stride();
        assert!((index_before - index_after).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_probe_sizing() {
        use crate::platform::FixedViewport;
        let mut e = CarouselEngine::from_probe(CarouselConfig::new(4), &FixedViewport(375.0), 0);
        assert_eq!(e.visible_count(), 2);
        e.resize_from(&FixedViewport(1280.0));
        assert_eq!(e.visible_count(), 4);
    }

    #[test]
    fn test_empty_carousel_is_inert() {
        let mut e = engine(0);
        assert!(e.next(0).is_none());
        assert!(e.tick(60_000).is_none());
    }
}
