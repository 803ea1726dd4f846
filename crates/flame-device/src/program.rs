//! Program/kernel cache keyed by the canonically-ordered set of variation
//! definitions a flame uses.

use std::collections::BTreeSet;

use flame_core::{Flame, Settings, VariationKind};

use crate::error::DeviceError;
use crate::templates::{assemble_source, numbered_dump};

/// The assembled textual source for one compiled program, kept around so a
/// later compile failure (after a cache release) can still be dumped.
#[derive(Debug, Clone)]
pub struct Program {
    pub source: String,
    pub variation_set: BTreeSet<VariationKind>,
}

fn variation_branch(kind: VariationKind, slot: usize) -> String {
    format!("  if idx == {slot}u {{ return apply_{kind:?}(x, y); }}")
}

fn flags_for(settings: &Settings, use_variations: bool) -> Vec<(&'static str, bool)> {
    vec![
        ("use_variations", use_variations),
        ("use_post_affines", settings.use_post_affines()),
        ("use_final_transform", settings.use_final_transform()),
        ("use_jitter", settings.use_jitter()),
        ("use_blur", settings.use_blur()),
    ]
}

fn assemble(settings: &Settings, variation_set: &BTreeSet<VariationKind>, use_variations: bool) -> Program {
    let branches: Vec<String> = variation_set
        .iter()
        .enumerate()
        .map(|(i, kind)| variation_branch(*kind, i))
        .collect();
    let source = assemble_source(&flags_for(settings, use_variations), &branches);
    Program { source, variation_set: variation_set.clone() }
}

/// A one-slot cache: at most one compiled program (and its backend-specific
/// handle type `H`) is live at a time. A cache miss releases the previous
/// entry before compiling the replacement, per the device resource
/// manager's program-cache policy.
pub struct ProgramCache<H> {
    current: Option<(BTreeSet<VariationKind>, Program, H)>,
}

impl<H> Default for ProgramCache<H> {
    fn default() -> Self {
        ProgramCache { current: None }
    }
}

impl<H> ProgramCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// The variation set of the currently-compiled program, if any.
    pub fn current_set(&self) -> Option<&BTreeSet<VariationKind>> {
        self.current.as_ref().map(|(set, _, _)| set)
    }

    /// The currently-compiled program's source, if any.
    pub fn current_program(&self) -> Option<&Program> {
        self.current.as_ref().map(|(_, program, _)| program)
    }

    /// Mutable access to the currently-compiled backend handle, if any.
    pub fn current_handle_mut(&mut self) -> Option<&mut H> {
        self.current.as_mut().map(|(_, _, handle)| handle)
    }

    /// Release the current program and its handle, calling `release` on
    /// the handle first (the backend's own teardown, e.g. freeing GPU
    /// kernel objects).
    pub fn release(&mut self, release: impl FnOnce(H)) {
        if let Some((_, _, handle)) = self.current.take() {
            release(handle);
        }
    }

    /// Ensure a program compiled for `flame`'s variation set is current,
    /// compiling via `compile` on a cache miss. Returns the compiled
    /// program's source (for diagnostics) and a mutable reference to the
    /// backend handle.
    ///
    /// `compile` failures are surfaced with the numbered source dump
    /// attached, per the print-fallback error policy.
    pub fn get_or_compile(
        &mut self,
        settings: &Settings,
        flame: &Flame,
        compile: impl FnOnce(&Program) -> Result<H, String>,
        release: impl FnOnce(H),
    ) -> Result<(&Program, &mut H), DeviceError> {
        let variation_set = flame.variation_set();
        let use_variations = settings.use_variations() && !flame.is_linear_only();

        let needs_rebuild = match &self.current {
            Some((current_set, _, _)) => current_set != &variation_set,
            None => true,
        };

        if needs_rebuild {
            tracing::debug!(?variation_set, "recompiling program for new variation set");
            self.release(release);
            let program = assemble(settings, &variation_set, use_variations);
            let handle = compile(&program).map_err(|cause| {
                tracing::error!(%cause, "program build failed");
                DeviceError::ProgramBuild { source_dump: numbered_dump(&program.source), cause }
            })?;
            self.current = Some((variation_set, program, handle));
        }

        let (_, program, handle) = self.current.as_mut().expect("just inserted");
        Ok((program, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_core::{Affine, XForm, Variation};

    fn flame_with(kinds: &[VariationKind]) -> Flame {
        Flame {
            xforms: vec![XForm {
                weight: 1.0,
                affine: Affine::IDENTITY,
                color_index: 0.0,
                variations: kinds.iter().map(|k| Variation { kind: *k, weight: 1.0 }).collect(),
                post_affine: None,
            }],
            final_xform: None,
            view: Affine::IDENTITY,
            background: [0.0; 3],
        }
    }

    #[test]
    fn cache_hit_does_not_recompile() {
        let settings = Settings::builder().build().unwrap();
        let flame = flame_with(&[VariationKind::Linear]);
        let mut cache: ProgramCache<u32> = ProgramCache::new();
        let mut compiles = 0;

        cache.get_or_compile(&settings, &flame, |_p| { compiles += 1; Ok(1u32) }, |_| {}).unwrap();
        cache.get_or_compile(&settings, &flame, |_p| { compiles += 1; Ok(2u32) }, |_| {}).unwrap();

        assert_eq!(compiles, 1);
    }

    #[test]
    fn different_variation_set_triggers_rebuild() {
        let settings = Settings::builder().build().unwrap();
        let linear = flame_with(&[VariationKind::Linear]);
        let swirl = flame_with(&[VariationKind::Swirl]);
        let mut cache: ProgramCache<u32> = ProgramCache::new();
        let mut compiles = 0;
        let mut released = 0;

        cache.get_or_compile(&settings, &linear, |_p| { compiles += 1; Ok(1u32) }, |_| { released += 1; }).unwrap();
        cache.get_or_compile(&settings, &swirl, |_p| { compiles += 1; Ok(2u32) }, |_| { released += 1; }).unwrap();

        assert_eq!(compiles, 2);
        assert_eq!(released, 1);
    }

    #[test]
    fn compile_failure_carries_numbered_source_dump() {
        let settings = Settings::builder().build().unwrap();
        let flame = flame_with(&[VariationKind::Linear]);
        let mut cache: ProgramCache<u32> = ProgramCache::new();

        let err = cache
            .get_or_compile(&settings, &flame, |_p| Err("boom".to_string()), |_| {})
            .unwrap_err();
        match err {
            DeviceError::ProgramBuild { source_dump, cause } => {
                assert_eq!(cause, "boom");
                assert!(source_dump.starts_with("    1 |"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
