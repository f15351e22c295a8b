//! Record types and the row mapping engine.
pub(crate) mod mapper;
pub(crate) mod schema;
pub(crate) mod value;

use crate::record::schema::FieldDescriptor;
use crate::record::value::ConversionError;
use crate::spreadsheet::cell::Cell;

/// A type whose fields are filled from spreadsheet cells.
///
/// Usually implemented with [`sheet_record!`](crate::sheet_record); a manual
/// implementation lists its mapped fields in `fields` and converts cells in
/// `assign`, typically with [`coerce`](crate::coerce).
pub trait Record: Default {
    /// Mapped fields in declaration order.
    fn fields() -> Vec<FieldDescriptor>;

    /// Converts `cell` and stores it into the named field.
    fn assign(&mut self, field: &str, cell: &Cell) -> Result<(), ConversionError>;
}

/// Declares a struct and implements [`Record`] for it.
///
/// Fields marked `#[column]` are mapped: `#[column(index = N)]` reads the N-th
/// present cell of the row, `#[column(name = "Header")]` the cell under a header
/// (case-insensitive), and a bare `#[column]` uses the field name as header.
/// When both keys are given the index wins. Unmarked fields are left alone.
/// Other field attributes, doc comments included, are kept on the struct.
/// The struct must implement `Default`.
///
/// ```
/// use rusty_record::sheet_record;
///
/// sheet_record! {
///     #[derive(Debug, Default)]
///     pub struct Person {
///         /// Employee number
///         #[column(index = 0)]
///         pub id: i64,
///         #[column(name = "Name")]
///         pub name: String,
///         #[column]
///         pub email: Option<String>,
///         pub note: String,
///     }
/// }
///
/// use rusty_record::Record;
/// assert_eq!(Person::fields().len(), 3);
/// ```
#[macro_export]
macro_rules! sheet_record {
    // Struct definition: fields are rebuilt one by one without their `column` attribute.
    (@struct [$($head:tt)*] [$($done:tt)*]) => {
        $($head)* { $($done)* }
    };
    (@struct $head:tt $done:tt [[$($attrs:tt)*] $decl:tt] $($rest:tt)*) => {
        $crate::sheet_record!(@field $head $done [] [$($attrs)*] $decl $($rest)*);
    };
    (@field $head:tt [$($done:tt)*] [$($kept:tt)*] [] ($($decl:tt)*) $($rest:tt)*) => {
        $crate::sheet_record!(@struct $head [$($done)* $($kept)* $($decl)*,] $($rest)*);
    };
    (@field $head:tt $done:tt $kept:tt [[column $($args:tt)*] $($attrs:tt)*] $decl:tt $($rest:tt)*) => {
        $crate::sheet_record!(@field $head $done $kept [$($attrs)*] $decl $($rest)*);
    };
    (@field $head:tt $done:tt [$($kept:tt)*] [[$($attr:tt)*] $($attrs:tt)*] $decl:tt $($rest:tt)*) => {
        $crate::sheet_record!(@field $head $done [$($kept)* #[$($attr)*]] [$($attrs)*] $decl $($rest)*);
    };

    // Descriptor of the first `column` attribute, if any.
    (@descriptor $fields:ident, $field:ident, $ty:ty;) => {};
    (@descriptor $fields:ident, $field:ident, $ty:ty; [column $( ( $($key:ident = $value:expr),* $(,)? ) )?] $($rest:tt)*) => {
        $fields.push(
            $crate::ColumnDeclaration::new(stringify!($field), <$ty as $crate::FromCell>::FIELD_TYPE)
                $( $( .$key($value) )* )?
                .build()
        );
    };
    (@descriptor $fields:ident, $field:ident, $ty:ty; [$($other:tt)*] $($rest:tt)*) => {
        $crate::sheet_record!(@descriptor $fields, $field, $ty; $($rest)*);
    };

    (@assign $self:ident, $name:ident, $cell:ident, $field:ident, $ty:ty;) => {};
    (@assign $self:ident, $name:ident, $cell:ident, $field:ident, $ty:ty; [column $($args:tt)*] $($rest:tt)*) => {
        if $name == stringify!($field) {
            $self.$field = $crate::coerce::<$ty>($cell)?;
            return ::std::result::Result::Ok(());
        }
    };
    (@assign $self:ident, $name:ident, $cell:ident, $field:ident, $ty:ty; [$($other:tt)*] $($rest:tt)*) => {
        $crate::sheet_record!(@assign $self, $name, $cell, $field, $ty; $($rest)*);
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$($attr:tt)*])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $crate::sheet_record!(
            @struct [$(#[$meta])* $vis struct $name] []
            $( [[$([$($attr)*])*] ($field_vis $field : $ty)] )*
        );

        impl $crate::Record for $name {
            #[allow(unused_mut)]
            fn fields() -> ::std::vec::Vec<$crate::FieldDescriptor> {
                let mut fields = ::std::vec::Vec::new();
                $( $crate::sheet_record!(@descriptor fields, $field, $ty; $([$($attr)*])*); )*
                fields
            }

            #[allow(unused_variables)]
            fn assign(&mut self, field: &str, cell: &$crate::Cell) -> ::std::result::Result<(), $crate::ConversionError> {
                $( $crate::sheet_record!(@assign self, field, cell, $field, $ty; $([$($attr)*])*); )*
                ::std::result::Result::Err($crate::ConversionError::UnknownField(field.to_owned()))
            }
        }
    };
}
