//! Constants used throughout nxs-config.

/// Number of columns exposed by the tree model.
pub const COLUMN_COUNT: usize = 3;

/// Column showing the tag and `name` attribute.
pub const NAME_COLUMN: usize = 0;

/// Column showing the `type` attribute, or all attributes in attribute view.
pub const ATTRIBUTE_COLUMN: usize = 1;

/// Column showing text content.
pub const VALUE_COLUMN: usize = 2;

/// Attribute used to identify siblings of the same tag.
pub const NAME_ATTRIBUTE: &str = "name";

/// Attribute rendered in column 1 when attribute view is off.
pub const TYPE_ATTRIBUTE: &str = "type";

/// Tag whose text content must agree before two siblings merge.
pub const FIELD_TAG: &str = "field";

/// Display name of text nodes.
pub const TEXT_NODE_NAME: &str = "#text";

/// Display name of the synthetic document node.
pub const DOCUMENT_NODE_NAME: &str = "#document";
