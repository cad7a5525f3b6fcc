//! Developer tooling: read-only viewer inspection and frame timing.
//!
//! # Invariants
//! - Tools never mutate the viewer they inspect.

mod inspector;
mod timer;

pub use inspector::{NodeInfo, ViewerInspector, ViewerSummary};
pub use timer::FrameTimer;

pub fn crate_info() -> &'static str {
    "prism-tools v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("tools"));
    }
}
