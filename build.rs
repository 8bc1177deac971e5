//! Stamps the build date and time into the crate so the software clock has a
//! sane starting point on first boot.
//!
//! The strings use the classic compiler layout: `"Mmm DD YYYY"` and
//! `"HH:MM:SS"`. `SOURCE_DATE_EPOCH` overrides the wall clock for
//! reproducible builds.

use chrono::{DateTime, Utc};

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let now = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    println!(
        "cargo:rustc-env=TIMESOURCE_BUILD_DATE={}",
        now.format("%b %e %Y")
    );
    println!(
        "cargo:rustc-env=TIMESOURCE_BUILD_TIME={}",
        now.format("%H:%M:%S")
    );
}
