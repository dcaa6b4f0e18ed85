use crate::report::interface::{ImageSlot, Report, ReportRenderer};
use std::fmt::Write;

/// Plain-text rendering of the report page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRendererText;

impl ReportRendererText {
    pub fn new() -> Self {
        Self
    }
}

fn slot_line(heading: &str, slot: &ImageSlot) -> String {
    match slot {
        ImageSlot::Image(image) => format!("{heading} [{}x{} image]", image.width(), image.height()),
        ImageSlot::Unavailable(placeholder) => format!("{heading} {placeholder}"),
    }
}

impl ReportRenderer for ReportRendererText {
    fn render(&self, report: &Report) -> Vec<u8> {
        let mut page = String::new();
        // writing into a String cannot fail
        let _ = writeln!(page, "{}", report.title());
        let _ = writeln!(page, "{}", report.timestamp_line());
        let _ = writeln!(page);
        let _ = writeln!(page, "Prediction Result:");
        let _ = writeln!(page, "  {}", report.diagnosis_line());
        let _ = writeln!(page, "  {}", report.confidence_line());
        let _ = writeln!(page);
        let _ = writeln!(page, "{}", slot_line("Input Chest X-Ray:", &report.original));
        let _ = writeln!(page, "{}", slot_line("AI Heatmap Visualization:", &report.heatmap));
        let _ = writeln!(page);
        let _ = writeln!(page, "AI Notes:");
        for note in report.recommendations() {
            let _ = writeln!(page, "  - {note}");
        }
        page.into_bytes()
    }
}
