//! The flat, pre-order AST produced by the (external) parser (§3.1).
//!
//! Every [`Node`] in a [`crate::syntax::Program`] lives in one contiguous `Vec<Node>`, laid out
//! in pre-order with contiguous children: a node's children occupy a single `[begin, begin +
//! count)` range of that same vector. This is read-only input to the analyzer — nothing here
//! ever mutates a `Node` after the parser hands it over.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Index into a [`Program`](crate::syntax::Program)'s node array.
pub type NodeId = u32;

/// Sentinel meaning "no parent" (the root node, or a node not yet attached).
pub const NO_PARENT: NodeId = NodeId::MAX;

/// The reserved boundary between statically enumerated [`AttributeKey`] values and attribute
/// keys discovered dynamically in source text (§6.4, §9 "Dynamic DSON keys").
pub const DSON_DYNAMIC_KEYS_: u16 = 4096;

/// The boundary below which an attribute key belongs to the generic DSON option grammar rather
/// than a statement's own fixed schema. Used by the "only DSON" JSON writer mode (§6.4).
pub const DSON_KEYS_: u16 = 256;

/// Tag discriminating what a [`Node`] represents and how to read its scalar payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    None,
    Bool,
    Ui32,
    Ui32Bitmap,
    StringRef,
    Array,

    // Enum node types (ENUM_KEYS_ < t < OBJECT_KEYS_ per §3.1).
    EnumInputComponentType,
    EnumFetchMethod,
    EnumLoadMethod,
    EnumVizComponentType,
    EnumSqlStatementType,

    // Object node types.
    ObjectDashqlInput,
    ObjectDashqlFetch,
    ObjectDashqlLoad,
    ObjectDashqlSet,
    ObjectDashqlViz,
    ObjectDashqlVizComponent,
    ObjectDashqlFunctionCall,
    ObjectSqlTableRef,
    ObjectSqlIndirectionIndex,
    ObjectDsonPosition,
}

impl NodeType {
    /// Object node types are those ordinally at or above this variant.
    pub fn is_object(self) -> bool {
        matches!(self, NodeType::ObjectDashqlInput)
            || (self as u32) >= (NodeType::ObjectDashqlInput as u32)
    }

    pub fn is_enum(self) -> bool {
        matches!(
            self,
            NodeType::EnumInputComponentType
                | NodeType::EnumFetchMethod
                | NodeType::EnumLoadMethod
                | NodeType::EnumVizComponentType
                | NodeType::EnumSqlStatementType
        )
    }
}

/// u16 tag identifying a child's semantic role under an object parent. Zero for array elements.
///
/// Static keys are compile-time enumerated here; keys `>= DSON_DYNAMIC_KEYS_` are looked up in a
/// program's [`crate::dson::DsonDictionary`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[repr(transparent)]
pub struct AttributeKey(pub u16);

impl AttributeKey {
    pub const NONE: AttributeKey = AttributeKey(0);

    pub const SQL_FUNCTION_NAME: AttributeKey = AttributeKey(1);
    pub const SQL_FUNCTION_ARGUMENTS: AttributeKey = AttributeKey(2);
    pub const SQL_TABLE_NAME: AttributeKey = AttributeKey(3);
    pub const SQL_INDIRECTION_INDEX_VALUE: AttributeKey = AttributeKey(4);

    pub const DASHQL_INPUT_COMPONENT_TYPE: AttributeKey = AttributeKey(10);
    pub const DASHQL_INPUT_VALUE_TYPE: AttributeKey = AttributeKey(11);
    pub const DASHQL_STATEMENT_NAME: AttributeKey = AttributeKey(12);

    pub const DASHQL_FETCH_FROM_URI: AttributeKey = AttributeKey(20);
    pub const DASHQL_FETCH_METHOD: AttributeKey = AttributeKey(21);

    pub const DASHQL_LOAD_METHOD: AttributeKey = AttributeKey(30);
    pub const DASHQL_DATA_SOURCE: AttributeKey = AttributeKey(31);

    pub const DASHQL_VIZ_TARGET: AttributeKey = AttributeKey(40);
    pub const DASHQL_VIZ_COMPONENTS: AttributeKey = AttributeKey(41);
    pub const DASHQL_VIZ_COMPONENT_TYPE: AttributeKey = AttributeKey(42);
    pub const DASHQL_VIZ_COMPONENT_MODIFIERS: AttributeKey = AttributeKey(43);

    pub const DSON_POSITION: AttributeKey = AttributeKey(50);
    pub const DSON_POSITION_ROW: AttributeKey = AttributeKey(51);
    pub const DSON_POSITION_COLUMN: AttributeKey = AttributeKey(52);
    pub const DSON_POSITION_WIDTH: AttributeKey = AttributeKey(53);
    pub const DSON_POSITION_HEIGHT: AttributeKey = AttributeKey(54);
    pub const DSON_ROW: AttributeKey = AttributeKey(55);
    pub const DSON_COLUMN: AttributeKey = AttributeKey(56);
    pub const DSON_WIDTH: AttributeKey = AttributeKey(57);
    pub const DSON_HEIGHT: AttributeKey = AttributeKey(58);
    pub const DSON_TITLE: AttributeKey = AttributeKey(59);
    pub const DSON_URL: AttributeKey = AttributeKey(60);

    pub fn is_dynamic(self) -> bool {
        self.0 >= DSON_DYNAMIC_KEYS_
    }
}

/// Byte offset + length into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub offset: u32,
    pub length: u32,
}

impl Location {
    pub const fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> u32 {
        self.offset + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Clips `self` to fit within `bounds`; returns a zero-length location if disjoint.
    pub fn clip(&self, bounds: Location) -> Location {
        let begin = self.offset.max(bounds.offset);
        let end = self.end().min(bounds.end());
        if end <= begin {
            Location::new(begin, 0)
        } else {
            Location::new(begin, end - begin)
        }
    }
}

/// One node of the flat pre-order AST (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    pub node_type: NodeType,
    pub attribute_key: AttributeKey,
    pub parent: NodeId,
    /// For containers: index of the first child. For scalar leaves: the literal value (bool as
    /// 0/1, unsigned integer, or enum ordinal) or a byte offset into the source string.
    pub children_begin_or_value: u32,
    pub children_count: u32,
    pub location: Location,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children_count == 0
    }

    pub fn children_end(&self) -> u32 {
        self.children_begin_or_value + self.children_count
    }

    pub fn value_bool(&self) -> bool {
        self.children_begin_or_value != 0
    }

    pub fn value_ui32(&self) -> u32 {
        self.children_begin_or_value
    }
}
