use crate::frame::FrameKind;

/// Standard master filename:
/// `master_{kind}_{exposure}s_gain{gain}[_{filter}].fits`.
///
/// Kind is lowercase and the filter segment only appears on flats. Bias
/// masters always carry `0s`. A segment whose value is unknown is left out.
pub fn master_filename(
    kind: FrameKind,
    exposure_time: Option<f64>,
    gain: Option<i32>,
    filter: Option<&str>,
) -> String {
    let mut parts = vec!["master".to_string(), kind.slug().to_string()];

    let exposure = match kind {
        FrameKind::Bias => Some(0.0),
        _ => exposure_time,
    };
    if let Some(secs) = exposure {
        parts.push(format!("{}s", format_exposure(secs)));
    }
    if let Some(g) = gain {
        parts.push(format!("gain{g}"));
    }
    if kind == FrameKind::Flat {
        if let Some(f) = filter.map(sanitize_segment).filter(|f| !f.is_empty()) {
            parts.push(f);
        }
    }

    parts.join("_") + ".fits"
}

/// Render seconds without a decimal point when whole (`300`), otherwise with
/// trailing zeros trimmed (`0.5`, `2.25`).
pub fn format_exposure(secs: f64) -> String {
    if secs.fract() == 0.0 && secs.abs() < 1e15 {
        format!("{}", secs as i64)
    } else {
        let s = format!("{secs:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Replace every character outside `[A-Za-z0-9-]` with `-`.
pub fn sanitize_segment(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}
