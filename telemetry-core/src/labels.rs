//! Batch-wide label cleanup for frames shown together.

use std::collections::HashMap;

use crate::frame::Frame;

/// Tag whose value names a frame when its columns end up without labels.
pub const DEFAULT_NAME_TAG: &str = "telemetry";

/// Removes every label pair carried by all value columns of the batch, then
/// names the columns left without labels after their frame's
/// [`DEFAULT_NAME_TAG`] value.
///
/// Must be called once with every successfully assembled frame of a request.
/// A pair shared by all columns is dropped even if it is the only thing that
/// tells two columns apart.
pub fn make_labels_unique<'a, I>(frames: I)
where
    I: IntoIterator<Item = &'a mut Frame>,
{
    let mut frames: Vec<&mut Frame> = frames
        .into_iter()
        .filter(|frame| !frame.fields().is_empty())
        .collect();

    let mut counter: HashMap<(String, String), usize> = HashMap::new();
    let mut default_names: Vec<Option<String>> = Vec::with_capacity(frames.len());
    let mut total = 0;

    for frame in &frames {
        let mut default_name = None;
        for field in frame.fields() {
            for (key, value) in &field.labels {
                if key == DEFAULT_NAME_TAG {
                    default_name = Some(value.clone());
                }
                *counter.entry((key.clone(), value.clone())).or_default() += 1;
            }
            total += 1;
        }
        default_names.push(default_name);
    }

    let constant: Vec<(String, String)> = counter
        .into_iter()
        .filter(|(_, n)| *n == total)
        .map(|(pair, _)| pair)
        .collect();

    for (frame, default_name) in frames.iter_mut().zip(default_names) {
        for field in frame.fields_mut() {
            for (key, value) in &constant {
                if field.labels.get(key) == Some(value) {
                    field.labels.remove(key);
                }
            }
            if field.labels.is_empty() {
                field.name = default_name.clone();
            }
        }
    }
}
