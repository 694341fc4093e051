use std::path::Path;

use caldera_core::characterize::SensorProfile;
use caldera_core::master::MasterRecord;
use console::Style;

use crate::commands::{format_exposure, format_gain};

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    method: Style,
    warning: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            warning: Style::new().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_master_summary(record: &MasterRecord, path: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to(format!("Master {}", record.kind)));
    println!();
    row(&s, "File", s.path.apply_to(path.display()));
    row(&s, "Id", s.value.apply_to(record.id));
    row(
        &s,
        "Size",
        s.value.apply_to(format!("{}x{}", record.width, record.height)),
    );
    row(&s, "Frames", s.value.apply_to(record.frame_count));
    row(
        &s,
        "Method",
        s.method
            .apply_to(format!("{}, rejection {}", record.method, record.rejection)),
    );
    row(&s, "Exposure", s.value.apply_to(format_exposure(record.exposure_time)));
    row(&s, "Gain", s.value.apply_to(format_gain(record.gain)));
    if let Some(ref filter) = record.filter {
        row(&s, "Filter", s.value.apply_to(filter));
    }
    let px = &record.stats.pixels;
    row(
        &s,
        "Level",
        s.value.apply_to(format!(
            "mean {:.2}  median {:.2}  std {:.2}",
            px.mean, px.median, px.std_dev
        )),
    );
    row(&s, "Rejected", s.value.apply_to(record.stats.rejected_samples));
    for note in &record.notes {
        println!("  {}", s.warning.apply_to(format!("! {note}")));
    }
    println!();
}

pub fn print_profile_summary(profile: &SensorProfile, path: &Path) {
    let s = Styles::new();

    println!();
    println!(
        "  {}",
        s.title.apply_to(format!("Sensor profile: {}", profile.camera_model))
    );
    println!();
    row(&s, "File", s.path.apply_to(path.display()));
    row(&s, "Gain setting", s.value.apply_to(format_gain(profile.gain_setting)));
    if let Some(offset) = profile.offset {
        row(&s, "Offset", s.value.apply_to(offset));
    }
    if let Some(ref binning) = profile.binning {
        row(&s, "Binning", s.value.apply_to(binning));
    }
    row(
        &s,
        "Read noise",
        s.value.apply_to(format!("{:.2} e-", profile.read_noise)),
    );
    row(&s, "Gain", s.value.apply_to(format!("{:.3} e-/ADU", profile.gain)));
    row(
        &s,
        "Full well",
        s.value.apply_to(format!("~{} e-", profile.full_well_capacity)),
    );
    if let Some(t) = profile.temperature {
        row(&s, "Temperature", s.value.apply_to(format!("{t:.1} C")));
    }
    row(
        &s,
        "Confidence",
        s.method.apply_to(format!("{:.0}%", profile.confidence * 100.0)),
    );
    for note in &profile.notes {
        println!("  {}", s.warning.apply_to(format!("! {note}")));
    }
    println!();
}

pub fn print_master_table(records: &[MasterRecord]) {
    let s = Styles::new();
    if records.is_empty() {
        println!("{}", s.label.apply_to("No masters recorded"));
        return;
    }
    for r in records {
        println!(
            "{}  {:<12} {:<40} {}",
            s.label.apply_to(r.id),
            r.session,
            s.value.apply_to(&r.filename),
            r.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

pub fn print_profile_table(profiles: &[SensorProfile]) {
    let s = Styles::new();
    if profiles.is_empty() {
        println!("{}", s.label.apply_to("No profiles recorded"));
        return;
    }
    for p in profiles {
        println!(
            "{:<20} gain {:<5} {} RN {:.2} e-  {:.3} e-/ADU  FWC ~{} e-  ({:.0}%)",
            s.value.apply_to(&p.camera_model),
            format_gain(p.gain_setting),
            s.label.apply_to(p.measured_at.format("%Y-%m-%d %H:%M")),
            p.read_noise,
            p.gain,
            p.full_well_capacity,
            p.confidence * 100.0
        );
    }
}

fn row(s: &Styles, label: &str, value: impl std::fmt::Display) {
    println!("  {:<14}{}", s.label.apply_to(label), value);
}
