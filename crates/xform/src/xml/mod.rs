//! Submission XML encoding and decoding.
//!
//! Submissions follow the OpenRosa instance layout used by KoBoCAT:
//!
//! - the root element is named after the form identifier and carries an `id`
//!   attribute with the same value;
//! - each slash-separated schema path becomes nested elements, with shared
//!   prefixes sharing one parent element;
//! - `meta/instanceID` is always present and freshly generated;
//! - `meta/deprecatedID` is present only when the document replaces an existing
//!   submission.

pub mod decode;
pub mod encode;
pub mod tree;
mod utils;

pub use decode::{DecodedSubmission, decode_submission};
pub use encode::{EncodedSubmission, build_submission, encode_submission, row_to_xml};
pub use tree::Element;
pub use utils::is_valid_element_name;
