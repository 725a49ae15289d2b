use crate::annotation::{Annotation, FaultKind};

/// One row of the annotation legend shown next to the viewer.
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub index: usize,
    pub label: String,
    pub fault: FaultKind,
    pub annotator: String,
    pub severity: Option<String>,
}

/// `Severity 42%`. Values above 1 are already percentages.
pub fn format_severity_label(value: Option<f32>) -> Option<String> {
    let value = value.filter(|v| v.is_finite())?;
    let pct = if value > 1.0 { value.round() } else { (value * 100.0).round() };
    Some(format!("Severity {pct}%"))
}

pub fn build_legend(annotations: &[Annotation]) -> Vec<LegendEntry> {
    annotations
        .iter()
        .enumerate()
        .map(|(index, ann)| LegendEntry {
            index,
            label: ann.fault.display_label(),
            fault: ann.fault.clone(),
            annotator: ann
                .annotated_by
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or("user")
                .to_owned(),
            severity: format_severity_label(ann.severity),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ImageRect;

    #[test]
    fn severity_labels() {
        assert_eq!(format_severity_label(Some(0.423)).as_deref(), Some("Severity 42%"));
        assert_eq!(format_severity_label(Some(87.6)).as_deref(), Some("Severity 88%"));
        assert_eq!(format_severity_label(Some(f32::NAN)), None);
        assert_eq!(format_severity_label(None), None);
    }

    #[test]
    fn legend_defaults_annotator_to_user() {
        let mut ai = Annotation::new(ImageRect::new(0.0, 0.0, 5.0, 5.0)).with_fault(FaultKind::WireOverload);
        ai.annotated_by = Some(" AI ".into());
        ai.severity = Some(0.5);
        let manual = Annotation::new(ImageRect::new(9.0, 9.0, 5.0, 5.0));

        let legend = build_legend(&[ai, manual]);
        assert_eq!(legend[0].annotator, "AI");
        assert_eq!(legend[0].label, "Wire Overload");
        assert_eq!(legend[0].severity.as_deref(), Some("Severity 50%"));
        assert_eq!(legend[1].annotator, "user");
        assert_eq!(legend[1].label, "No classification");
        assert_eq!(legend[1].index, 1);
    }
}
