//! Build script for devsol-core
//!
//! Checks the toolchain before compilation.
//!
//! ## Requirements
//!
//! - **Rust**: 1.70.0 or newer

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    let Ok(found) = rustc_version::version() else {
        // Some build environments hide the compiler version; don't fail them.
        println!("cargo:warning=could not verify Rust version");
        return;
    };

    let minimum = rustc_version::Version::new(1, 70, 0);
    assert!(
        found >= minimum,
        "devsol-core requires Rust {minimum} or newer, found {found}"
    );
}
