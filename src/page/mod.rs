//! Page analysis: structural signatures, interactive elements, records.

mod elements;
mod record;
mod signature;

pub(crate) use elements::css_path;
pub use elements::{enumerate_interactive, ElementKind, InteractiveElement};
pub use record::PageRecord;
pub(crate) use signature::count_rows;
pub use signature::{analyze_signature, PageSignature};
