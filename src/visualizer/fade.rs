pub const OPAQUE: u8 = 255;

/// Staggered per-band fade-out played while playback is paused.
///
/// Band `i` starts fading `i * stagger` ticks after `start` and reaches zero
/// alpha `duration` ticks later.
#[derive(Clone, Debug)]
pub struct FadeAnimation {
    alpha: Vec<u8>,
    duration: u32,
    stagger: u32,
    tick: u32,
    active: bool,
    faded: bool,
}

impl FadeAnimation {
    pub fn new(bands: usize, duration: u32, stagger: u32) -> Self {
        Self {
            alpha: vec![OPAQUE; bands],
            duration: duration.max(1),
            stagger,
            tick: 0,
            active: false,
            faded: false,
        }
    }

    pub fn start(&mut self) {
        self.alpha.fill(OPAQUE);
        self.tick = 0;
        self.active = true;
        self.faded = false;
    }

    /// Back to fully visible.
    pub fn cancel(&mut self) {
        self.alpha.fill(OPAQUE);
        self.tick = 0;
        self.active = false;
        self.faded = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once every band has reached zero and the fade has stopped.
    pub fn is_faded(&self) -> bool {
        self.faded
    }

    pub fn alphas(&self) -> &[u8] {
        &self.alpha
    }

    /// Advances one tick. Returns true on the tick the last band goes dark.
    pub fn step(&mut self) -> bool {
        if !self.active {
            return false;
        }

        let mut visible = false;
        for (i, alpha) in self.alpha.iter_mut().enumerate() {
            let begin = i as u32 * self.stagger;
            if self.tick >= begin && *alpha > 0 {
                let progress = (self.tick - begin) as f32 / self.duration as f32;
                *alpha = (OPAQUE as f32 * (1.0 - progress.clamp(0.0, 1.0))) as u8;
            }
            if *alpha > 0 {
                visible = true;
            }
        }
        self.tick += 1;

        if !visible {
            self.active = false;
            self.faded = true;
        }
        !visible
    }
}
