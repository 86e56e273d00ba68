mod document;
mod render;
mod text;
pub mod reconstruct;

pub use document::{DocumentMetadata, PageSize, PdfDocument, page_index};
pub use reconstruct::{ReconstructOptions, TextColor, overlay_pdf};
pub use render::{PageRenderer, data_url};
pub use text::{BoundingBox, TextExtractor, TextLine, format_line_hints};
