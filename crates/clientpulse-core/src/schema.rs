//! Schema types and canonical type system

use serde::{Deserialize, Serialize};

/// Portable logical type system
///
/// Maps warehouse-specific types to a common representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogicalType {
    /// Boolean type
    Bool,

    /// Integer type (any precision)
    Int,

    /// Floating point (any precision)
    Float,

    /// Decimal with precision and scale
    Decimal {
        precision: Option<u16>,
        scale: Option<u16>,
    },

    /// String/text type
    String,

    /// Date (no time component)
    Date,

    /// Timestamp (with time component)
    Timestamp,

    /// JSON/Variant type
    Json,

    /// Unknown type (cannot map)
    Unknown,
}

impl LogicalType {
    /// Map a warehouse-declared type name to a logical type
    ///
    /// Covers the common INFORMATION_SCHEMA spellings across warehouses.
    /// Anything unrecognized maps to `Unknown` rather than failing the scan.
    pub fn from_warehouse_type(declared: &str) -> Self {
        let normalized = declared.trim().to_lowercase();
        let base = normalized
            .split(|c| c == '(' || c == '<')
            .next()
            .unwrap_or(&normalized)
            .trim();

        match base {
            "bool" | "boolean" => Self::Bool,
            "int" | "integer" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "tinyint"
            | "serial" | "bigserial" => Self::Int,
            "float" | "float4" | "float8" | "real" | "double" | "double precision" => Self::Float,
            "decimal" | "numeric" | "number" => Self::Decimal {
                precision: None,
                scale: None,
            },
            "varchar" | "char" | "character" | "character varying" | "text" | "string" => {
                Self::String
            }
            "date" => Self::Date,
            "timestamp" | "timestamptz" | "timestamp with time zone"
            | "timestamp without time zone" | "datetime" => Self::Timestamp,
            "json" | "jsonb" | "variant" => Self::Json,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "BOOL"),
            Self::Int => write!(f, "INT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                (Some(p), None) => write!(f, "DECIMAL({})", p),
                _ => write!(f, "DECIMAL"),
            },
            Self::String => write!(f, "STRING"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Json => write!(f, "JSON"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Nullability state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nullability {
    /// Definitely nullable
    Yes,

    /// Definitely not nullable
    No,

    /// Cannot determine nullability
    Unknown,
}

/// A column in a table schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,

    /// Logical type
    pub logical_type: LogicalType,

    /// Nullability
    pub nullable: Nullability,

    /// Ordinal position within the table (1-indexed)
    pub ordinal: u32,
}

impl ColumnMeta {
    /// Create a new column at the given ordinal position
    pub fn new(name: impl Into<String>, logical_type: LogicalType, ordinal: u32) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: Nullability::Unknown,
            ordinal,
        }
    }

    /// Set nullability
    pub fn with_nullability(mut self, nullable: Nullability) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Technical metadata for a table, as reported by the warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Table name (unqualified)
    pub name: String,

    /// Row count, when the warehouse reports one
    pub row_count: Option<u64>,

    /// On-disk size in bytes, when reported
    pub byte_size: Option<u64>,

    /// Creation timestamp, when reported
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Last-modified timestamp, when reported
    pub modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TableMeta {
    /// Create table metadata with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            row_count: None,
            byte_size: None,
            created_at: None,
            modified_at: None,
        }
    }

    /// Set row count
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Set byte size
    pub fn with_byte_size(mut self, byte_size: u64) -> Self {
        self.byte_size = Some(byte_size);
        self
    }
}

/// An ordered collection of columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of columns
    pub columns: Vec<ColumnMeta>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Create a schema from columns
    pub fn from_columns(columns: Vec<ColumnMeta>) -> Self {
        Self { columns }
    }

    /// Find a column by name (case-insensitive)
    pub fn find_column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Get column names in ordinal order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn logical_type_display() {
        assert_eq!(LogicalType::Bool.to_string(), "BOOL");
        assert_eq!(
            LogicalType::Decimal {
                precision: Some(10),
                scale: Some(2)
            }
            .to_string(),
            "DECIMAL(10, 2)"
        );
    }

    #[test]
    fn warehouse_type_mapping() {
        assert_eq!(LogicalType::from_warehouse_type("BIGINT"), LogicalType::Int);
        assert_eq!(
            LogicalType::from_warehouse_type("character varying"),
            LogicalType::String
        );
        assert_eq!(
            LogicalType::from_warehouse_type("varchar(255)"),
            LogicalType::String
        );
        assert_eq!(
            LogicalType::from_warehouse_type("timestamp with time zone"),
            LogicalType::Timestamp
        );
        assert_eq!(
            LogicalType::from_warehouse_type("NUMERIC(10,2)"),
            LogicalType::Decimal {
                precision: None,
                scale: None
            }
        );
        assert_eq!(
            LogicalType::from_warehouse_type("geography"),
            LogicalType::Unknown
        );
    }

    #[test]
    fn schema_operations() {
        let schema = Schema::from_columns(vec![
            ColumnMeta::new("id", LogicalType::Int, 1),
            ColumnMeta::new("name", LogicalType::String, 2),
        ]);

        assert_eq!(schema.column_names(), vec!["id", "name"]);
        assert!(schema.find_column("id").is_some());
        assert!(schema.find_column("NAME").is_some());
        assert!(schema.find_column("nonexistent").is_none());
    }
}
