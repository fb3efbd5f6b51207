use super::{Downstream, Middleware, Upstream};

/// Passes every envelope through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Null;

impl Middleware for Null {
    fn name(&self) -> &'static str {
        "null"
    }

    fn process_upstream(&self, envelope: Upstream) -> Vec<Upstream> {
        vec![envelope]
    }

    fn process_downstream(&self, envelope: Downstream) -> Vec<Downstream> {
        vec![envelope]
    }
}
