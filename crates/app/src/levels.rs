/// Map an RMS level in dB to lit bar segments. The useful range is
/// -40..0 dB mapped across ten segments; anything quieter darkens the
/// bar entirely (None).
pub fn db_to_led_level(db: f64, segments: usize) -> Option<usize> {
    let clamped = db.max(-40.0);
    let projected = (80.0 - (2.0 * clamped).abs()) / 8.0;
    let n = (projected - 0.5).round();
    if n < 0.0 {
        None
    } else {
        Some((n as usize).min(segments.saturating_sub(1)))
    }
}

/// Map an RMS level in dB to the 0..1 fraction the status screen takes.
pub fn db_to_fraction(db: f64) -> f32 {
    (((80.0 + db) / 100.0) as f32).clamp(0.0, 1.0)
}
