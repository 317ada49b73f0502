//! # prism-core: The "Lens" of PRISM
//!
//! Turns the analytics engine's column-oriented, dynamically-typed result
//! sets into statically-typed visualization frames.
//!
//! ```text
//! QueryResult ─► Table ─► FieldProcessor (per column) ─► Frame ─► long→wide
//!                          ├─ RegularProcessor
//!                          ├─ HistogramProcessor
//!                          └─ TopkProcessor
//! ```
//!
//! Everything here is synchronous and free of I/O. Recoverable problems are
//! collected in a caller-supplied [`Diagnostics`] instead of failing the
//! request.

pub mod builder;
pub mod diagnostics;
pub mod frame;
pub mod model;
pub mod processors;
pub mod protocol;
pub mod render;
pub mod reshape;

pub use builder::build_frame;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use frame::{FieldKind, FieldValues, Frame, FrameMeta, Notice, OutputField, Severity};
pub use model::{
    AggregationOp, Cell, DatasetField, DatasetFields, FieldDescriptor, FieldType, QueryResult,
    Table,
};
pub use processors::{processor_for, FieldError, FieldProcessor, ProcessorKind};
pub use protocol::{
    CheckHealthResult, DataQuery, DataResponse, ErrorStatus, HealthStatus, QueryDataRequest,
    QueryDataResponse, QueryModel, TimeRange,
};
pub use render::{render, RenderOptions};
pub use reshape::{long_to_wide, ReshapeError};
