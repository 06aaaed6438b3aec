//! Stable per-peer colors for the dashboard.

const PALETTE: [&str; 10] = [
    "#2e86de", "#e84118", "#44bd32", "#8c7ae6", "#e1b12c", "#00a8ff", "#c23616", "#273c75",
    "#009432", "#833471",
];

/// Color for a peer id. The same id always maps to the same color.
pub fn color_for_id(id: &str) -> &'static str {
    // FNV-1a
    let hash = id
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| (acc ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
    PALETTE[(hash % PALETTE.len() as u64) as usize]
}
