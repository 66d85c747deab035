//! Emits the compiled angular-momentum ceilings and the kernel table that
//! covers them.
//!
//! `GINT_MAX_L` bounds the angular momentum of one primary shell (so AB runs
//! over `0..=2 * GINT_MAX_L`); `GINT_MAX_X` bounds the auxiliary shell.

use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_MAX_L: usize = 3;
const DEFAULT_MAX_X: usize = 4;
/// Every table cell is a separate monomorphization; keep the grid sane.
const HARD_LIMIT: usize = 8;

fn ceiling(name: &str, default: usize) -> usize {
    println!("cargo:rerun-if-env-changed={name}");
    let value = match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .unwrap_or_else(|_| panic!("{name}={raw:?} is not a non-negative integer")),
        Err(_) => default,
    };
    assert!(value <= HARD_LIMIT, "{name}={value} exceeds the supported limit of {HARD_LIMIT}");
    value
}

fn list(upper: usize) -> String {
    (0..=upper).map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let max_l = ceiling("GINT_MAX_L", DEFAULT_MAX_L);
    let max_x = ceiling("GINT_MAX_X", DEFAULT_MAX_X);

    let code = format!(
        "// @generated by build.rs from GINT_MAX_L={max_l}, GINT_MAX_X={max_x}\n\
         \n\
         /// Highest angular momentum of a primary shell.\n\
         pub const L_MAX: usize = {max_l};\n\
         /// Highest angular momentum of an auxiliary shell.\n\
         pub const X_MAX: usize = {max_x};\n\
         \n\
         crate::kernel_table! {{\n    \
             /// Kernel table over every (AB, X) with AB <= 2 * L_MAX and X <= X_MAX.\n    \
             pub CompiledTable {{\n        \
                 l_max: {max_l},\n        \
                 x_max: {max_x},\n        \
                 ab: [{ab}],\n        \
                 x: [{x}],\n    \
             }}\n\
         }}\n",
        ab = list(2 * max_l),
        x = list(max_x),
    );

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let path = out_dir.join("ceilings.rs");
    if let Err(e) = fs::write(&path, code) {
        panic!("failed to write {}: {e}", path.display());
    }
}
