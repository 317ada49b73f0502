//! # Frame Builder
//!
//! Drives one processor per column and concatenates their output, in
//! column order, into a single frame. Multi-field processors contribute
//! their fields contiguously at their source column's position.

use crate::diagnostics::Diagnostics;
use crate::frame::Frame;
use crate::model::Table;
use crate::processors::processor_for;

/// Name used when a table carries no name of its own.
pub const DEFAULT_FRAME_NAME: &str = "response";

/// Convert one table into a frame.
///
/// A column whose processor errors is skipped (and recorded); its siblings
/// are unaffected. Histogram and top-k columns may diverge in length from
/// the rest, so every field is null-padded to the longest one at the end.
pub fn build_frame(table: &Table, diagnostics: &mut Diagnostics) -> Frame {
    table.validate(diagnostics);

    let mut fields = Vec::new();
    for (index, descriptor) in table.fields.iter().enumerate() {
        let column = table.columns.get(index).map_or(&[][..], Vec::as_slice);

        match processor_for(descriptor).process_column(column, diagnostics) {
            Ok(output) => fields.extend(output),
            Err(err) => {
                diagnostics.record(&descriptor.name, None, format!("column skipped: {}", err));
            }
        }
    }

    let name = if table.name.is_empty() {
        DEFAULT_FRAME_NAME
    } else {
        table.name.as_str()
    };
    let mut frame = Frame::new(name).with_fields(fields);
    frame.pad_to_uniform();
    frame
}
