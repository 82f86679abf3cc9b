//! Output gain with logarithmic volume scaling
//!
//! The user-facing level (0-100%) maps to -60 dB .. 0 dB. Two further
//! multipliers sit on top of it: the focus duck factor and the sleep timer
//! fade factor. The engine only ever sees the product.

/// Effective output gain
#[derive(Debug, Clone)]
pub struct OutputGain {
    /// Volume level (0-100)
    level: u8,

    /// Cached linear gain for `level`
    linear_gain: f32,

    /// Multiplier applied while another source ducks us
    duck_level: f32,

    /// Whether ducking is active
    ducked: bool,

    /// Sleep timer fade progress in [0, 1]
    fade: f32,
}

impl OutputGain {
    /// Create a gain stage at `level` with the given duck multiplier
    pub fn new(level: u8, duck_level: f32) -> Self {
        let level = level.min(100);
        Self {
            level,
            linear_gain: Self::calculate_linear_gain(level),
            duck_level: duck_level.clamp(0.0, 1.0),
            ducked: false,
            fade: 0.0,
        }
    }

    /// Set volume level (0-100)
    pub fn set_level(&mut self, level: u8) {
        self.level = level.min(100);
        self.linear_gain = Self::calculate_linear_gain(self.level);
    }

    /// Current volume level (0-100)
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Enable or disable ducking
    pub fn set_ducked(&mut self, ducked: bool) {
        self.ducked = ducked;
    }

    /// Whether ducking is active
    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    /// Set the fade-out progress; 1.0 is silence
    pub fn set_fade(&mut self, progress: f32) {
        self.fade = progress.clamp(0.0, 1.0);
    }

    /// Drop any fade-out
    pub fn reset_fade(&mut self) {
        self.fade = 0.0;
    }

    /// Current fade-out progress
    pub fn fade(&self) -> f32 {
        self.fade
    }

    /// Linear gain for the engine: volume x duck x (1 - fade)
    pub fn gain(&self) -> f32 {
        let duck = if self.ducked { self.duck_level } else { 1.0 };
        self.linear_gain * duck * (1.0 - self.fade)
    }

    /// Convert volume percentage to linear gain
    ///
    /// Formula: gain = 10^((level% - 100) * 0.6 / 20)
    /// - 0%   → silence
    /// - 50%  → -30 dB → 0.0316 gain
    /// - 80%  → -12 dB → 0.251 gain (default)
    /// - 100% →   0 dB → 1.0 gain
    fn calculate_linear_gain(level: u8) -> f32 {
        if level == 0 {
            return 0.0;
        }

        let db = (f32::from(level) - 100.0) * 0.6;
        10.0_f32.powf(db / 20.0)
    }
}

impl Default for OutputGain {
    fn default() -> Self {
        Self::new(80, 0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_clamped() {
        let mut gain = OutputGain::new(150, 0.2);
        assert_eq!(gain.level(), 100);
        gain.set_level(75);
        assert_eq!(gain.level(), 75);
    }

    #[test]
    fn gain_calculation() {
        assert_eq!(OutputGain::new(0, 0.2).gain(), 0.0);
        assert!((OutputGain::new(100, 0.2).gain() - 1.0).abs() < 0.001);
        assert!((OutputGain::new(50, 0.2).gain() - 0.0316).abs() < 0.001);
        assert!((OutputGain::new(80, 0.2).gain() - 0.251).abs() < 0.01);
    }

    #[test]
    fn ducking_scales_without_touching_level() {
        let mut gain = OutputGain::new(100, 0.25);
        gain.set_ducked(true);
        assert!((gain.gain() - 0.25).abs() < 0.001);
        assert_eq!(gain.level(), 100);

        gain.set_ducked(false);
        assert!((gain.gain() - 1.0).abs() < 0.001);
    }

    #[test]
    fn fade_ramps_to_silence() {
        let mut gain = OutputGain::new(100, 0.2);
        gain.set_fade(0.5);
        assert!((gain.gain() - 0.5).abs() < 0.001);

        gain.set_fade(1.0);
        assert_eq!(gain.gain(), 0.0);

        gain.reset_fade();
        assert!((gain.gain() - 1.0).abs() < 0.001);
    }

    #[test]
    fn duck_and_fade_combine() {
        let mut gain = OutputGain::new(100, 0.5);
        gain.set_ducked(true);
        gain.set_fade(0.5);
        assert!((gain.gain() - 0.25).abs() < 0.001);
    }
}
