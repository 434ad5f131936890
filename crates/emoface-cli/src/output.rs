use std::fmt::Write;

use emoface_classifiers::pipeline::Recognition;

/// Probability matrix (one row per face) followed by the recognised labels.
pub fn format_recognition(recognition: &Recognition) -> String {
    let mut out = String::new();
    if recognition.faces.is_empty() {
        out.push_str("No faces found.\n");
        return out;
    }

    let _ = write!(out, "{:<18}", "face");
    for class in &recognition.classes {
        let _ = write!(out, " {:>9}", class);
    }
    out.push('\n');

    for (i, (face, row)) in recognition
        .faces
        .iter()
        .zip(recognition.predictions.rows())
        .enumerate()
    {
        let _ = write!(out, "{:<18}", format!("#{} ({})", i, face));
        for p in row.iter() {
            let _ = write!(out, " {:>9.4}", p);
        }
        out.push('\n');
    }

    out.push('\n');
    let _ = writeln!(out, "Recognized: {}", recognition.labels.join(", "));
    out
}
