//! Icons used across the terminal UI.

pub const CHECK: &str = "✅";
pub const CROSS: &str = "❌";
pub const HOURGLASS: &str = "⏳";
pub const GATE: &str = "🚧";
pub const SPARKLE: &str = "✨";
