//! Shared vocabulary for the turntable showcase: node ids, asset handles,
//! and the spatial transform every scene node carries.

pub mod types;

pub use types::{AssetId, NodeId, Transform};

pub fn crate_info() -> &'static str {
    "turntable-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
