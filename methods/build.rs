//! Build script for the sigslice Risc0 methods.
//!
//! Compiles the guest program to RISC-V ELF and generates the image ID.

fn main() {
    risc0_build::embed_methods();
}
