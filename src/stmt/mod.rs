//! Statement analyzers (§4.4): one per statement kind, each built on the AST matcher (§4.1).

pub mod fetch;
pub mod input;
pub mod load;
pub mod set;
pub mod viz;

pub use fetch::FetchStatement;
pub use input::InputStatement;
pub use load::LoadStatement;
pub use set::SetStatement;
pub use viz::VizStatement;

use crate::board::CardPositionRequest;
use crate::matcher::{select_alt, ASTIndex};
use crate::syntax::{Node, NodeType, Program};

/// Reads `{row, column, width, height}` giving precedence to a nested match over a flat one,
/// per coordinate independently (§4.4 INPUT, §9 "Supplemented Detail" VIZ precedence rule).
pub(crate) fn read_card_position_request(
    index: &ASTIndex,
    nested_ids: [u32; 4],
    flat_ids: [u32; 4],
) -> CardPositionRequest {
    let coord = |nested: u32, flat: u32| -> u32 {
        select_alt(index, nested, flat)
            .and_then(|m| m.data.as_uint())
            .unwrap_or(0)
    };
    CardPositionRequest {
        row: coord(nested_ids[0], flat_ids[0]),
        column: coord(nested_ids[1], flat_ids[1]),
        width: coord(nested_ids[2], flat_ids[2]),
        height: coord(nested_ids[3], flat_ids[3]),
    }
}

/// Best-effort SQL type name: the attribute is documented only as "object -> SQL type"; this
/// core reads either a bare string leaf or the first string leaf of an object wrapper.
pub(crate) fn read_type_name(program: &Program, source: &str, node: &Node) -> Option<String> {
    match node.node_type {
        NodeType::StringRef => Some(program.source_text(source, node.location).to_string()),
        _ if node.node_type.is_object() => program
            .children(node)
            .iter()
            .find(|c| c.node_type == NodeType::StringRef)
            .map(|c| program.source_text(source, c.location).to_string()),
        _ => None,
    }
}
