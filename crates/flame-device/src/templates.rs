//! Process-wide, lazily initialized, read-only cache of the kernel source
//! templates, loaded once behind a `std::sync::OnceLock` instead of as
//! global mutable strings.

use std::sync::OnceLock;

struct Templates {
    flags_block: &'static str,
    fixed_kernels: &'static str,
}

static TEMPLATES: OnceLock<Templates> = OnceLock::new();

fn templates() -> &'static Templates {
    TEMPLATES.get_or_init(|| Templates {
        flags_block: include_str!("templates/flags.tmpl"),
        fixed_kernels: include_str!("templates/kernels.tmpl"),
    })
}

/// Assemble the textual program source for a flame's variation set: a
/// flags block derived from the active feature flags, a generated
/// variations function (one branch per distinct variation), and the fixed
/// kernels. This is the text dumped, numbered, to the diagnostic log on a
/// compile failure.
pub fn assemble_source(
    flags: &[(&str, bool)],
    variation_branches: &[String],
) -> String {
    let t = templates();

    let mut out = String::new();
    out.push_str("// -- flags --\n");
    for (name, value) in flags {
        out.push_str(&format!("#define FLAME_{} {}\n", name.to_uppercase(), *value as u32));
    }
    out.push_str(t.flags_block);
    out.push('\n');

    out.push_str("// -- variations --\n");
    out.push_str("fn apply_variations(idx: u32, x: f32, y: f32) -> vec2<f32> {\n");
    for branch in variation_branches {
        out.push_str(branch);
        out.push('\n');
    }
    out.push_str("}\n\n");

    out.push_str(t.fixed_kernels);
    out
}

/// Render `source` as numbered lines, for the print-fallback diagnostic
/// dump emitted on a program-build failure.
pub fn numbered_dump(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>5} | {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembly_includes_flags_and_branches() {
        let src = assemble_source(
            &[("use_variations", true), ("use_blur", false)],
            &["  if idx == 0u { return vec2(x, y); }".to_string()],
        );
        assert!(src.contains("FLAME_USE_VARIATIONS 1"));
        assert!(src.contains("FLAME_USE_BLUR 0"));
        assert!(src.contains("apply_variations"));
    }

    #[test]
    fn numbered_dump_prefixes_line_numbers() {
        let dump = numbered_dump("a\nb\nc");
        assert!(dump.starts_with("    1 | a"));
        assert!(dump.contains("    2 | b"));
    }
}
