//! Column types, default values and the fluent column handle.

use std::fmt;
use std::str::FromStr;

use super::index::{IndexDefinition, IndexKind};
use super::{Blueprint, Operation};
use crate::error::SchemaError;

/// Dialect-neutral column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// 8-bit integer.
    TinyInteger,
    /// 16-bit integer.
    SmallInteger,
    /// 24-bit integer (MySQL), widened elsewhere.
    MediumInteger,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Fixed-point number.
    Decimal {
        /// Total number of digits.
        total: u8,
        /// Digits after the decimal point.
        places: u8,
    },
    /// Fixed-length string.
    Char(u32),
    /// Variable-length string.
    String(u32),
    /// Unbounded text.
    Text,
    /// Medium text (MySQL), plain text elsewhere.
    MediumText,
    /// Long text (MySQL), plain text elsewhere.
    LongText,
    /// Boolean.
    Boolean,
    /// String restricted to a set of values.
    Enum(Vec<String>),
    /// JSON document.
    Json,
    /// Calendar date.
    Date,
    /// Date and time.
    DateTime,
    /// Time of day.
    Time,
    /// Timestamp.
    Timestamp,
    /// Binary blob.
    Binary,
    /// UUID.
    Uuid,
}

impl ColumnType {
    /// Returns true for the integer family.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::TinyInteger
                | Self::SmallInteger
                | Self::MediumInteger
                | Self::Integer
                | Self::BigInteger
        )
    }

    /// Returns true for types whose zero value is the number `0`.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                Self::Float | Self::Double | Self::Decimal { .. } | Self::Boolean
            )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TinyInteger => write!(f, "tiny_integer"),
            Self::SmallInteger => write!(f, "small_integer"),
            Self::MediumInteger => write!(f, "medium_integer"),
            Self::Integer => write!(f, "integer"),
            Self::BigInteger => write!(f, "big_integer"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Decimal { total, places } => write!(f, "decimal({total},{places})"),
            Self::Char(len) => write!(f, "char({len})"),
            Self::String(len) => write!(f, "string({len})"),
            Self::Text => write!(f, "text"),
            Self::MediumText => write!(f, "medium_text"),
            Self::LongText => write!(f, "long_text"),
            Self::Boolean => write!(f, "boolean"),
            Self::Enum(values) => write!(f, "enum({})", values.join(",")),
            Self::Json => write!(f, "json"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "datetime"),
            Self::Time => write!(f, "time"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Binary => write!(f, "binary"),
            Self::Uuid => write!(f, "uuid"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = SchemaError;

    /// Parses names such as `integer`, `big-integer`, `string(100)` or
    /// `decimal(8,2)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let invalid = || SchemaError::InvalidDefinition(format!("unknown column type '{s}'"));

        if let Some((base, args)) = normalized.split_once('(') {
            let args = args.strip_suffix(')').ok_or_else(invalid)?;
            let numbers: Vec<u32> = args
                .split(',')
                .map(|part| part.trim().parse::<u32>())
                .collect::<Result<_, _>>()
                .map_err(|_| invalid())?;
            return match (base, numbers.as_slice()) {
                ("string" | "varchar", [len]) => Ok(Self::String(*len)),
                ("char", [len]) => Ok(Self::Char(*len)),
                ("decimal", [total, places]) => Ok(Self::Decimal {
                    total: u8::try_from(*total).map_err(|_| invalid())?,
                    places: u8::try_from(*places).map_err(|_| invalid())?,
                }),
                _ => Err(invalid()),
            };
        }

        match normalized.as_str() {
            "tiny_integer" | "tinyint" => Ok(Self::TinyInteger),
            "small_integer" | "smallint" => Ok(Self::SmallInteger),
            "medium_integer" | "mediumint" => Ok(Self::MediumInteger),
            "integer" | "int" => Ok(Self::Integer),
            "big_integer" | "bigint" => Ok(Self::BigInteger),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "decimal" => Ok(Self::Decimal {
                total: 8,
                places: 2,
            }),
            "char" => Ok(Self::Char(255)),
            "string" | "varchar" => Ok(Self::String(255)),
            "text" => Ok(Self::Text),
            "medium_text" => Ok(Self::MediumText),
            "long_text" => Ok(Self::LongText),
            "boolean" | "bool" => Ok(Self::Boolean),
            "json" => Ok(Self::Json),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::DateTime),
            "time" => Ok(Self::Time),
            "timestamp" => Ok(Self::Timestamp),
            "binary" | "blob" => Ok(Self::Binary),
            "uuid" => Ok(Self::Uuid),
            _ => Err(invalid()),
        }
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default, quoted on output.
    String(String),
    /// Raw SQL expression, emitted verbatim.
    Expression(String),
    /// The current date and time.
    CurrentTimestamp,
}

impl DefaultValue {
    /// Returns the portable SQL representation of the default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(true) => String::from("TRUE"),
            Self::Bool(false) => String::from("FALSE"),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => quote_literal(s),
            Self::Expression(expr) => expr.clone(),
            Self::CurrentTimestamp => String::from("CURRENT_TIMESTAMP"),
        }
    }

    /// Returns true when the value does not depend on evaluation time.
    ///
    /// Raw expressions count as constant only when they are a number, a
    /// quoted string, `NULL`, `TRUE` or `FALSE`.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        match self {
            Self::CurrentTimestamp => false,
            Self::Expression(expr) => {
                let expr = expr.trim();
                expr.parse::<f64>().is_ok()
                    || (expr.len() >= 2 && expr.starts_with('\'') && expr.ends_with('\''))
                    || ["NULL", "TRUE", "FALSE"]
                        .iter()
                        .any(|keyword| expr.eq_ignore_ascii_case(keyword))
            }
            _ => true,
        }
    }
}

/// Quotes a string literal, doubling embedded single quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A column as declared on a blueprint.
///
/// Attributes left as `None` mean "not stated". New columns resolve an
/// unstated nullability to NOT NULL; changed columns inherit it from the
/// live column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
    /// Stated nullability.
    pub nullable: Option<bool>,
    /// Stated default value.
    pub default: Option<DefaultValue>,
    /// Removes an existing default when changing a column.
    pub drop_default: bool,
    /// Unsigned integer (MySQL only).
    pub unsigned: bool,
    /// Auto-incrementing integer.
    pub autoincrement: bool,
    /// Declares the primary key inline with the column.
    pub primary: bool,
    /// Previous name of a changed column.
    pub renamed_from: Option<String>,
    /// Place the new column after this one (MySQL only).
    pub after: Option<String>,
}

impl ColumnDefinition {
    /// Creates a column with no modifiers.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: None,
            default: None,
            drop_default: false,
            unsigned: false,
            autoincrement: false,
            primary: false,
            renamed_from: None,
            after: None,
        }
    }

    /// Resolved nullability of the column.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(false)
    }
}

/// Handle to a column operation on a [`Blueprint`].
///
/// Each modifier updates the pending operation in place and hands the
/// handle back for further chaining.
#[derive(Debug)]
pub struct ColumnHandle<'a> {
    blueprint: &'a mut Blueprint,
    position: usize,
}

impl<'a> ColumnHandle<'a> {
    pub(crate) fn new(blueprint: &'a mut Blueprint, position: usize) -> Self {
        Self {
            blueprint,
            position,
        }
    }

    fn update(self, apply: impl FnOnce(&mut ColumnDefinition)) -> Self {
        if let Some(Operation::AddColumn(column) | Operation::ChangeColumn(column)) =
            self.blueprint.operations.get_mut(self.position)
        {
            apply(column);
        }
        self
    }

    fn column_name(&self) -> Option<String> {
        match self.blueprint.operations.get(self.position) {
            Some(Operation::AddColumn(column) | Operation::ChangeColumn(column)) => {
                Some(column.name.clone())
            }
            _ => None,
        }
    }

    /// Allows NULL values.
    pub fn nullable(self) -> Self {
        self.update(|c| c.nullable = Some(true))
    }

    /// Rejects NULL values.
    pub fn not_null(self) -> Self {
        self.update(|c| c.nullable = Some(false))
    }

    /// Sets a literal default value.
    pub fn default(self, value: impl Into<DefaultValue>) -> Self {
        let value = value.into();
        self.update(|c| {
            c.default = Some(value);
            c.drop_default = false;
        })
    }

    /// Sets a raw SQL expression as the default value.
    pub fn default_raw(self, expression: impl Into<String>) -> Self {
        self.default(DefaultValue::Expression(expression.into()))
    }

    /// Defaults the column to the current timestamp.
    pub fn use_current(self) -> Self {
        self.default(DefaultValue::CurrentTimestamp)
    }

    /// Removes the default of a changed column.
    pub fn drop_default(self) -> Self {
        self.update(|c| {
            c.default = None;
            c.drop_default = true;
        })
    }

    /// Marks an integer column as unsigned.
    pub fn unsigned(self) -> Self {
        self.update(|c| c.unsigned = true)
    }

    /// Marks the column as auto-incrementing.
    pub fn auto_increment(self) -> Self {
        self.update(|c| c.autoincrement = true)
    }

    /// Sets the length of a string or char column.
    pub fn length(self, length: u32) -> Self {
        self.update(|c| match &mut c.column_type {
            ColumnType::String(len) | ColumnType::Char(len) => *len = length,
            _ => {}
        })
    }

    /// Places the new column after another one.
    pub fn after(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.update(|c| c.after = Some(column))
    }

    /// Records the previous name of a changed column.
    pub fn renamed_from(self, previous: impl Into<String>) -> Self {
        let previous = previous.into();
        self.update(|c| c.renamed_from = Some(previous))
    }

    /// Turns the declaration into a change of an existing column.
    pub fn change(self) -> Self {
        if let Some(op) = self.blueprint.operations.get_mut(self.position) {
            if let Operation::AddColumn(column) = op {
                *op = Operation::ChangeColumn(column.clone());
            }
        }
        self
    }

    /// Makes this column the primary key.
    pub fn primary(self) -> Self {
        if let Some(name) = self.column_name() {
            self.blueprint.primary(&[name.as_str()]);
        }
        self
    }

    /// Adds a unique index on this column.
    pub fn unique(self) -> Self {
        self.add_index(IndexKind::Unique)
    }

    /// Adds a plain index on this column.
    pub fn index(self) -> Self {
        self.add_index(IndexKind::Index)
    }

    fn add_index(self, kind: IndexKind) -> Self {
        if let Some(name) = self.column_name() {
            self.blueprint
                .push(Operation::AddIndex(IndexDefinition::new(kind, vec![name])));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_types() {
        assert_eq!("integer".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!(
            "big-integer".parse::<ColumnType>().unwrap(),
            ColumnType::BigInteger
        );
        assert_eq!(
            "string".parse::<ColumnType>().unwrap(),
            ColumnType::String(255)
        );
        assert_eq!(
            "String(100)".parse::<ColumnType>().unwrap(),
            ColumnType::String(100)
        );
        assert_eq!(
            "decimal(10, 3)".parse::<ColumnType>().unwrap(),
            ColumnType::Decimal {
                total: 10,
                places: 3
            }
        );
        assert!(matches!(
            "geometry".parse::<ColumnType>(),
            Err(SchemaError::InvalidDefinition(_))
        ));
        assert!("string(abc)".parse::<ColumnType>().is_err());
    }

    #[test]
    fn test_default_value_sql() {
        assert_eq!(DefaultValue::from(0).to_sql(), "0");
        assert_eq!(DefaultValue::from("it's").to_sql(), "'it''s'");
        assert_eq!(DefaultValue::from(true).to_sql(), "TRUE");
        assert_eq!(DefaultValue::Null.to_sql(), "NULL");
        assert_eq!(DefaultValue::CurrentTimestamp.to_sql(), "CURRENT_TIMESTAMP");
        assert_eq!(
            DefaultValue::Expression("now()".into()).to_sql(),
            "now()"
        );
    }

    #[test]
    fn test_constant_defaults() {
        assert!(DefaultValue::from(0).is_constant());
        assert!(DefaultValue::Expression("0".into()).is_constant());
        assert!(DefaultValue::Expression("'draft'".into()).is_constant());
        assert!(DefaultValue::Expression("null".into()).is_constant());
        assert!(!DefaultValue::Expression("random()".into()).is_constant());
        assert!(!DefaultValue::CurrentTimestamp.is_constant());
    }

    #[test]
    fn test_modifiers_chain_on_the_same_operation() {
        let mut table = Blueprint::new("posts");
        table.integer("votes").nullable().default(0).unsigned();
        table.string("title").length(100).not_null();

        let Operation::AddColumn(votes) = &table.operations()[0] else {
            panic!("expected an added column");
        };
        assert_eq!(votes.nullable, Some(true));
        assert_eq!(votes.default, Some(DefaultValue::Integer(0)));
        assert!(votes.unsigned);

        let Operation::AddColumn(title) = &table.operations()[1] else {
            panic!("expected an added column");
        };
        assert_eq!(title.column_type, ColumnType::String(100));
        assert!(!title.is_nullable());
    }

    #[test]
    fn test_change_turns_add_into_change() {
        let mut table = Blueprint::new("posts");
        table.string("name").nullable().change();

        assert_eq!(table.operations().len(), 1);
        let Operation::ChangeColumn(name) = &table.operations()[0] else {
            panic!("expected a changed column");
        };
        assert_eq!(name.nullable, Some(true));
        assert_eq!(name.default, None);
    }

    #[test]
    fn test_unique_modifier_appends_index() {
        let mut table = Blueprint::new("users");
        table.string("email").unique().nullable();

        assert_eq!(table.operations().len(), 2);
        let Operation::AddIndex(index) = &table.operations()[1] else {
            panic!("expected an index");
        };
        assert_eq!(index.kind, IndexKind::Unique);
        assert_eq!(index.columns, vec!["email".to_string()]);
        // The handle keeps pointing at the column after the index was appended.
        let Operation::AddColumn(email) = &table.operations()[0] else {
            panic!("expected an added column");
        };
        assert_eq!(email.nullable, Some(true));
    }

    #[test]
    fn test_drop_default_clears_value() {
        let mut table = Blueprint::new("users");
        table.integer("votes").default(1).drop_default().change();

        let Operation::ChangeColumn(votes) = &table.operations()[0] else {
            panic!("expected a changed column");
        };
        assert!(votes.drop_default);
        assert_eq!(votes.default, None);
    }
}
