//! Delete primitive.

use restage_core::Node;

use crate::error::OpError;
use crate::fs::FileSystem;
use crate::operation::record_status;

/// Remove the single file at `node.path`.
///
/// Deletion cannot be reversed; the journal records it only so that undo
/// can report the gap.
pub fn delete_node<F: FileSystem + ?Sized>(fs: &F, node: &mut Node) -> Result<(), OpError> {
    let result = if node.metadata.is_none() {
        Err(OpError::MissingMetadata { id: node.id })
    } else {
        fs.remove_file(&node.path)
            .map_err(|e| OpError::io(&node.path, e))
    };
    record_status(node, &result);
    if result.is_ok() {
        tracing::debug!(path = %node.path.display(), "deleted");
    }
    result
}
