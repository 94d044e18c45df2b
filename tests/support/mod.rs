#![allow(dead_code)]

pub mod config;

use std::time::Duration;

use berth::domain::UnitName;

pub const SELF: &str = "machine-0";
pub const OTHER: &str = "machine-1";

pub fn unit(name: &str) -> UnitName {
    UnitName::parse(name).expect("valid unit name")
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
