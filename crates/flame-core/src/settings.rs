//! Immutable-after-validation per-render configuration.

use thiserror::Error;

/// A single out-of-range setting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("width must be >= 1 (got {0})")]
    Width(u32),
    #[error("height must be >= 1 (got {0})")]
    Height(u32),
    #[error("maxTime must be > 0 (got {0:?})")]
    MaxTime(OrderedF64),
    #[error("maxQuality must be > 0 (got {0:?})")]
    MaxQuality(OrderedF64),
    #[error("blurAlpha must be >= 0 (got {0:?})")]
    BlurAlpha(OrderedF64),
    #[error("blurMinRadius must be >= 0 (got {0:?})")]
    BlurMinRadius(OrderedF64),
    #[error("blurMaxRadius must be >= blurMinRadius ({max:?} < {min:?})")]
    BlurMaxRadius { min: OrderedF64, max: OrderedF64 },
}

/// Wrapper so `f64` (no `Eq`) can still appear in a `PartialEq`/`Eq` error enum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedF64(pub f64);

impl Eq for OrderedF64 {}

/// Recognized settings, defaults and validated ranges per the engine's
/// external settings surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    width: u32,
    height: u32,
    max_time: f64,
    max_quality: f64,
    use_variations: bool,
    use_post_affines: bool,
    use_final_transform: bool,
    use_jitter: bool,
    use_blur: bool,
    blur_alpha: f64,
    blur_min_radius: f64,
    blur_max_radius: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            width: 1280,
            height: 720,
            max_time: 60.0,
            max_quality: 256.0,
            use_variations: true,
            use_post_affines: true,
            use_final_transform: true,
            use_jitter: true,
            use_blur: false,
            blur_alpha: 0.4,
            blur_min_radius: 0.0,
            blur_max_radius: 9.0,
        }
    }
}

impl Settings {
    /// Start building a `Settings` value from the documented defaults.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder(Settings::default())
    }

    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn max_time(&self) -> f64 {
        self.max_time
    }
    pub fn max_quality(&self) -> f64 {
        self.max_quality
    }
    pub fn use_variations(&self) -> bool {
        self.use_variations
    }
    pub fn use_post_affines(&self) -> bool {
        self.use_post_affines
    }
    pub fn use_final_transform(&self) -> bool {
        self.use_final_transform
    }
    pub fn use_jitter(&self) -> bool {
        self.use_jitter
    }
    pub fn use_blur(&self) -> bool {
        self.use_blur
    }
    pub fn blur_alpha(&self) -> f64 {
        self.blur_alpha
    }
    pub fn blur_min_radius(&self) -> f64 {
        self.blur_min_radius
    }
    pub fn blur_max_radius(&self) -> f64 {
        self.blur_max_radius
    }

    /// Number of scalar elements in one raster (width * height).
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Start a builder seeded with this settings' current values, so
    /// mutating the returned builder never aliases the snapshot it was
    /// built from.
    pub fn to_builder(&self) -> SettingsBuilder {
        SettingsBuilder(self.clone())
    }
}

/// Builder that validates every field on [`SettingsBuilder::build`].
#[derive(Debug, Clone)]
pub struct SettingsBuilder(Settings);

impl Default for SettingsBuilder {
    fn default() -> Self {
        Settings::builder()
    }
}

impl SettingsBuilder {
    pub fn width(mut self, width: u32) -> Self {
        self.0.width = width;
        self
    }
    pub fn height(mut self, height: u32) -> Self {
        self.0.height = height;
        self
    }
    pub fn max_time(mut self, max_time: f64) -> Self {
        self.0.max_time = max_time;
        self
    }
    pub fn max_quality(mut self, max_quality: f64) -> Self {
        self.0.max_quality = max_quality;
        self
    }
    pub fn use_variations(mut self, v: bool) -> Self {
        self.0.use_variations = v;
        self
    }
    pub fn use_post_affines(mut self, v: bool) -> Self {
        self.0.use_post_affines = v;
        self
    }
    pub fn use_final_transform(mut self, v: bool) -> Self {
        self.0.use_final_transform = v;
        self
    }
    pub fn use_jitter(mut self, v: bool) -> Self {
        self.0.use_jitter = v;
        self
    }
    pub fn use_blur(mut self, v: bool) -> Self {
        self.0.use_blur = v;
        self
    }
    pub fn blur_alpha(mut self, v: f64) -> Self {
        self.0.blur_alpha = v;
        self
    }
    pub fn blur_min_radius(mut self, v: f64) -> Self {
        self.0.blur_min_radius = v;
        self
    }
    pub fn blur_max_radius(mut self, v: f64) -> Self {
        self.0.blur_max_radius = v;
        self
    }

    /// Validate every field and produce an immutable [`Settings`].
    pub fn build(self) -> Result<Settings, SettingsError> {
        let s = self.0;

        if s.width < 1 {
            return Err(SettingsError::Width(s.width));
        }
        if s.height < 1 {
            return Err(SettingsError::Height(s.height));
        }
        if !(s.max_time > 0.0) {
            return Err(SettingsError::MaxTime(OrderedF64(s.max_time)));
        }
        if !(s.max_quality > 0.0) {
            return Err(SettingsError::MaxQuality(OrderedF64(s.max_quality)));
        }
        if !(s.blur_alpha >= 0.0) {
            return Err(SettingsError::BlurAlpha(OrderedF64(s.blur_alpha)));
        }
        if !(s.blur_min_radius >= 0.0) {
            return Err(SettingsError::BlurMinRadius(OrderedF64(s.blur_min_radius)));
        }
        if !(s.blur_max_radius >= s.blur_min_radius) {
            return Err(SettingsError::BlurMaxRadius {
                min: OrderedF64(s.blur_min_radius),
                max: OrderedF64(s.blur_max_radius),
            });
        }

        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let s = Settings::builder().build().unwrap();
        assert_eq!(s.width(), 1280);
        assert_eq!(s.height(), 720);
        assert_eq!(s.max_time(), 60.0);
        assert_eq!(s.max_quality(), 256.0);
        assert!(!s.use_blur());
    }

    #[test]
    fn rejects_zero_width() {
        let err = Settings::builder().width(0).build().unwrap_err();
        assert_eq!(err, SettingsError::Width(0));
    }

    #[test]
    fn rejects_inverted_blur_radii() {
        let err = Settings::builder()
            .blur_min_radius(5.0)
            .blur_max_radius(1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, SettingsError::BlurMaxRadius { .. }));
    }

    #[test]
    fn copy_is_detached() {
        let s = Settings::builder().width(200).build().unwrap();
        let s2 = s.to_builder().width(400).build().unwrap();
        assert_eq!(s.width(), 200);
        assert_eq!(s2.width(), 400);
    }

    #[test]
    fn one_by_one_is_valid() {
        let s = Settings::builder().width(1).height(1).build().unwrap();
        assert_eq!(s.pixel_count(), 1);
    }
}
