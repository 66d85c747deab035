//! Angular-momentum ceilings and the kernel table generated for them by
//! `build.rs`.

include!(concat!(env!("OUT_DIR"), "/ceilings.rs"));
