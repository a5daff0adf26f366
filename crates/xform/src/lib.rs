//! # kobo-xform
//!
//! The mapping engine behind the KoboToolbox spreadsheet uploader. It has no I/O of
//! its own: callers hand it a parsed survey definition and rows of strings, and get
//! back template columns and submission XML.
//!
//! ## Components
//!
//! - [`schema`] - flattens the nested survey sheet into ordered column paths
//!   ([`SchemaMap`]), expanding geopoints into four columns.
//! - [`template`] - template headers: schema paths plus the `meta/instanceID`,
//!   `_uuid` and `_id` control columns.
//! - [`xml`] - encodes one [`Row`] as a submission document, and decodes documents
//!   back into flat fields.
//! - [`ids`] - instance ID normalization, bulk normalization of uploaded edit
//!   tables, and resolution of the submission an edit row replaces.
//!
//! ## Example
//!
//! ```
//! use kobo_xform::{QuestionNode, Row, SurveyDefinition, Template, row_to_xml};
//!
//! let survey = SurveyDefinition {
//!     questions: vec![
//!         QuestionNode::new("begin_group", "hh"),
//!         QuestionNode::new("integer", "members"),
//!         QuestionNode::marker("end_group"),
//!     ],
//!     choice_lists: Vec::new(),
//! };
//! let template = Template::from_survey(&survey);
//! assert_eq!(template.columns(), &["hh/members", "meta/instanceID", "_uuid", "_id"]);
//!
//! let row = Row::new().with("hh/members", "4");
//! let xml = row_to_xml(&row, "household_v1", template.schema(), None).unwrap();
//! let xml = String::from_utf8(xml).unwrap();
//! assert!(xml.contains("<hh><members>4</members></hh>"));
//! ```

pub mod error;
pub mod ids;
pub mod row;
pub mod schema;
pub mod survey;
pub mod template;
pub mod xml;

pub use error::{Result, XformError};
pub use ids::{
    ExistingIdSet, IdNormalization, InstanceId, KnownRecord, KnownRecords, TargetResolution,
    ensure_uuid_prefix, normalize_update_ids, resolve_target,
};
pub use row::{Row, Table};
pub use schema::{GeoComponent, SchemaEntry, SchemaMap, UnknownChoice, flatten};
pub use survey::{Asset, AssetContent, ChoiceList, ChoiceOption, QuestionNode, QuestionType, SurveyDefinition};
pub use template::{INSTANCE_ID_COLUMN, NUMERIC_ID_COLUMN, SYSTEM_COLUMNS, Template, UUID_COLUMN};
pub use xml::{DecodedSubmission, EncodedSubmission, decode_submission, encode_submission, row_to_xml};
