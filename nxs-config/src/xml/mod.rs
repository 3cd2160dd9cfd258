//! XML parsing and output for [`Document`](crate::node::Document)s.

mod parser;
mod printer;

pub use parser::{parse_file, parse_str, XmlParser};
pub use printer::{print_to_string, print_to_string_pretty, XmlPrinter, XmlPrinterOptions};
