//! Data model for pdfblocks.
//!
//! Two layers: page primitives produced by extraction, and the persisted
//! block schema produced by the pipeline. Geometry is shared by both.

mod block;
mod geometry;
mod primitive;

pub use block::{
    Block, EntityType, GridCell, ImagePayload, KeyValue, PageBox, Payload, StructuredDocument,
    TableGrid, TextPayload,
};
pub use geometry::{BBox, PageSize};
pub use primitive::{
    FontWeight, ImageRegion, Primitive, RawDocument, RawPage, SourceMetadata, TableCell, TextRun,
};
