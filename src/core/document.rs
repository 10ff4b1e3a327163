//! Structured-document edit: remove the single element a path query selects.

use std::path::Path;

use sxd_document::{parser, writer};
use sxd_xpath::nodeset::Node;
use sxd_xpath::Value;

use crate::error::{Error, Result};
use crate::utils::io;

/// Parses `source`, detaches the one element `query` selects and writes the
/// document to `save_path`.
///
/// Zero or several matches is `AmbiguousTarget` and nothing is written.
/// Parse and query failures are `DocumentInvalid`.
pub fn remove_node(source: &Path, save_path: &Path, query: &str) -> Result<()> {
    let file = source.display().to_string();
    let content = io::read_file(source, "read document")?;

    let package = parser::parse(&content)
        .map_err(|e| Error::document_invalid(file.clone(), format!("{:?}", e)))?;
    let document = package.as_document();

    let value = sxd_xpath::evaluate_xpath(&document, query)
        .map_err(|e| Error::document_invalid(file.clone(), format!("{:?}", e)))?;

    let nodes = match value {
        Value::Nodeset(nodes) => nodes.document_order(),
        other => {
            return Err(Error::document_invalid(
                file,
                format!("query '{}' yields {:?}, not a node set", query, other),
            ))
        }
    };

    let element = match nodes.as_slice() {
        [Node::Element(element)] => *element,
        [_] => {
            return Err(Error::document_invalid(
                file,
                format!("query '{}' selects a non-element node", query),
            ))
        }
        _ => return Err(Error::ambiguous_target(file, query, nodes.len())),
    };

    element.remove_from_parent();

    let mut output = Vec::new();
    writer::format_document(&document, &mut output)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("serialize {}", file))))?;

    log_status!("document", "Removed match for {} from {}", query, file);
    io::write_bytes_atomic(save_path, &output, "write document")
}
