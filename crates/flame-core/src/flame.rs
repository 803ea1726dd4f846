//! Opaque flame descriptor data model.
//!
//! The actual nonlinear variation mathematics is an external collaborator;
//! these types only carry enough shape for the engine to (a) hand per-flame
//! data to a device backend and (b) detect the `{Linear}`-only optimization
//! the driver needs for its first step.

/// A named nonlinear variation. The real variation catalog is part of the
/// GPU kernel source, out of scope here; this enum carries just enough
/// identity for program-cache keying and the linear-only fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariationKind {
    Linear,
    Sinusoidal,
    Spherical,
    Swirl,
    Horseshoe,
    Polar,
    Handkerchief,
    Heart,
    Disc,
    Spiral,
    Named(u32),
}

/// One variation applied inside an [`XForm`], with its scalar weight.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variation {
    pub kind: VariationKind,
    pub weight: f64,
}

/// A 2D affine transform: `[a b c; d e f]` applied as `x' = a*x + b*y + c`,
/// `y' = d*x + e*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine { a: 1.0, b: 0.0, c: 0.0, d: 0.0, e: 1.0, f: 0.0 };
}

impl Default for Affine {
    fn default() -> Self {
        Affine::IDENTITY
    }
}

/// One branch of the chaos game: weight, affine, color index, variations,
/// optional post-affine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XForm {
    pub weight: f64,
    pub affine: Affine,
    pub color_index: f64,
    pub variations: Vec<Variation>,
    pub post_affine: Option<Affine>,
}

/// A weighted set of xforms plus the camera/palette context the device
/// needs to render one frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Flame {
    pub xforms: Vec<XForm>,
    pub final_xform: Option<XForm>,
    pub view: Affine,
    pub background: [f64; 3],
}

impl Flame {
    /// The canonically-ordered set of distinct variation kinds this flame
    /// uses across all of its xforms, for program-cache keying.
    pub fn variation_set(&self) -> std::collections::BTreeSet<VariationKind> {
        let mut set = std::collections::BTreeSet::new();
        for xform in self.xforms.iter().chain(self.final_xform.iter()) {
            for v in &xform.variations {
                set.insert(v.kind);
            }
        }
        if set.is_empty() {
            set.insert(VariationKind::Linear);
        }
        set
    }

    /// True when this flame's variation set is exactly `{Linear}` — the
    /// driver forces `useVariations` off in that case.
    pub fn is_linear_only(&self) -> bool {
        let set = self.variation_set();
        set.len() == 1 && set.contains(&VariationKind::Linear)
    }
}

/// An opaque, client-supplied sequence of flames for one task, mirroring
/// `hasNext`/`next` rather than a Rust iterator so a task can hold it as a
/// trait object behind `dyn FlameSource`.
pub trait FlameSource: Send {
    fn has_next(&self) -> bool;
    /// Must only be called when [`FlameSource::has_next`] is true.
    fn next(&mut self) -> Flame;
}

/// The provided in-memory [`FlameSource`], used by tests and the demo CLI.
pub struct VecFlameSource {
    flames: std::collections::VecDeque<Flame>,
}

impl VecFlameSource {
    pub fn new(flames: impl IntoIterator<Item = Flame>) -> Self {
        VecFlameSource { flames: flames.into_iter().collect() }
    }
}

impl FlameSource for VecFlameSource {
    fn has_next(&self) -> bool {
        !self.flames.is_empty()
    }

    fn next(&mut self) -> Flame {
        self.flames.pop_front().expect("next() called with has_next() false")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_xform() -> XForm {
        XForm {
            weight: 1.0,
            affine: Affine::IDENTITY,
            color_index: 0.0,
            variations: vec![Variation { kind: VariationKind::Linear, weight: 1.0 }],
            post_affine: None,
        }
    }

    #[test]
    fn empty_variation_set_defaults_to_linear() {
        let flame = Flame {
            xforms: vec![XForm {
                weight: 1.0,
                affine: Affine::IDENTITY,
                color_index: 0.0,
                variations: vec![],
                post_affine: None,
            }],
            final_xform: None,
            view: Affine::IDENTITY,
            background: [0.0; 3],
        };
        assert!(flame.is_linear_only());
    }

    #[test]
    fn mixed_variations_are_not_linear_only() {
        let mut xform = linear_xform();
        xform.variations.push(Variation { kind: VariationKind::Swirl, weight: 0.5 });
        let flame = Flame {
            xforms: vec![xform],
            final_xform: None,
            view: Affine::IDENTITY,
            background: [0.0; 3],
        };
        assert!(!flame.is_linear_only());
    }

    #[test]
    fn vec_flame_source_drains_in_order() {
        let a = Flame { xforms: vec![linear_xform()], final_xform: None, view: Affine::IDENTITY, background: [0.0; 3] };
        let b = a.clone();
        let mut src = VecFlameSource::new(vec![a, b]);
        assert!(src.has_next());
        let _ = src.next();
        assert!(src.has_next());
        let _ = src.next();
        assert!(!src.has_next());
    }
}
