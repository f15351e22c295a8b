use crate::error::RustyRecordError;
use crate::record::value::FieldType;
use crate::record::Record;

/// How a field finds its cell in a row, fixed when the descriptor is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Position among the row's present cells
    FixedIndex(usize),
    /// Declared header text
    HeaderName(String),
    /// The field's own name used as header text
    ImplicitFieldName(String),
}

/// A record field that carries a column mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    index: Option<usize>,
    header: Option<String>,
    field_type: FieldType,
    resolution: Resolution,
}

impl FieldDescriptor {
    /// Name of the record field this descriptor populates.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }
}

/// Builder for a [`FieldDescriptor`], as written by `#[column(...)]`.
///
/// ```
/// use rusty_record::{ColumnDeclaration, FieldType, Resolution, ValueType};
///
/// let field = ColumnDeclaration::new("id", FieldType::Required(ValueType::Integer))
///     .name("ID")
///     .index(0)
///     .build();
/// assert_eq!(field.resolution(), &Resolution::FixedIndex(0));
/// ```
#[derive(Clone, Debug)]
pub struct ColumnDeclaration {
    field: String,
    field_type: FieldType,
    index: Option<usize>,
    header: Option<String>,
}

impl ColumnDeclaration {
    pub fn new(field: &str, field_type: FieldType) -> Self {
        Self {
            field: field.to_owned(),
            field_type,
            index: None,
            header: None,
        }
    }

    /// Fixed position of the cell; takes precedence over any header name.
    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Header text to match, ignoring case.
    pub fn name(mut self, header: &str) -> Self {
        self.header = Some(header.to_owned());
        self
    }

    pub fn build(self) -> FieldDescriptor {
        let resolution = match (self.index, &self.header) {
            (Some(index), _) => Resolution::FixedIndex(index),
            (None, Some(header)) => Resolution::HeaderName(header.to_owned()),
            (None, None) => Resolution::ImplicitFieldName(self.field.to_owned()),
        };
        FieldDescriptor {
            name: self.field,
            index: self.index,
            header: self.header,
            field_type: self.field_type,
            resolution,
        }
    }
}

/// The mapped fields of one record type, in declaration order.
/// Built per read; never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaDescriptor {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    pub fn resolve<T: Record>() -> Result<Self, RustyRecordError> {
        let type_name = std::any::type_name::<T>();
        let fields = T::fields();
        if fields.is_empty() {
            Err(RustyRecordError::ConfigurationError(format!("no field of '{type_name}' carries a column mapping")))?
        }
        Ok(Self { type_name, fields })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}
