//! Build script for the storefront crate.
//!
//! Fingerprints the static assets referenced from `base.html` so they can be
//! served with a cache-busting `?v=` query.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Assets whose contents feed `ASSET_VERSION`, relative to the crate root.
const FINGERPRINTED: [&str; 2] = ["static/css/main.css", "static/js/app.js"];

fn main() {
    let root = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let mut hasher = Sha256::new();

    for asset in FINGERPRINTED {
        let path = Path::new(&root).join(asset);
        println!("cargo:rerun-if-changed={}", path.display());
        match fs::read(&path) {
            Ok(bytes) => hasher.update(&bytes),
            Err(e) => println!("cargo:warning=Could not read {asset}: {e}"),
        }
    }

    let digest = format!("{:x}", hasher.finalize());
    let version = digest.get(..10).unwrap_or(&digest);
    println!("cargo:rustc-env=ASSET_VERSION={version}");
}
