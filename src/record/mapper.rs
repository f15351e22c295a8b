use crate::error::RustyRecordError;
use crate::record::schema::FieldDescriptor;
use crate::record::schema::Resolution;
use crate::record::schema::SchemaDescriptor;
use crate::record::value::ConversionError;
use crate::record::Record;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::sheet::Row;
use crate::spreadsheet::Workbook;
use tracing::debug;
use tracing::trace;

/// Finds the cell a field reads from, if any.
fn resolve_cell<'a>(row: &'a Row, header_row: Option<&Row>, field: &FieldDescriptor) -> Option<&'a Cell> {
    match field.resolution() {
        Resolution::FixedIndex(index) => row.cells().get(*index),
        Resolution::HeaderName(name) | Resolution::ImplicitFieldName(name) => {
            let header_row = header_row?;
            let name = name.to_lowercase();
            row.cells().iter().find(|cell| {
                header_row.cell_at_column(cell.col())
                    .and_then(|header| header.as_str().or_else(|| header.as_formula()))
                    .is_some_and(|header| header.to_lowercase() == name)
            })
        }
    }
}

/// Builds one record from a row. Unresolved fields keep their default.
pub(crate) fn map_row<T: Record>(row: &Row, header_row: Option<&Row>, schema: &SchemaDescriptor) -> Result<T, RustyRecordError> {
    let mut record = T::default();
    for field in schema.fields() {
        let Some(cell) = resolve_cell(row, header_row, field) else {
            trace!(row = row.index(), field = field.name(), "field not resolved");
            continue;
        };
        record.assign(field.name(), cell).map_err(|cause| match cause {
            ConversionError::UnknownField(name) => RustyRecordError::ConfigurationError(format!(
                "'{}' has no assignable field named '{name}'",
                schema.type_name()
            )),
            cause => RustyRecordError::CellConversionError {
                row: cell.row(),
                col: cell.col(),
                reference: cell.reference(),
                field: field.name().to_owned(),
                target: field.field_type(),
                cause,
            },
        })?;
    }
    Ok(record)
}

/// Maps every row of every sheet, in workbook then row order.
/// Row 0 is treated as the header and skipped unless `include_header_row` is set.
pub(crate) fn map_workbook<T: Record>(
    workbook: &Workbook,
    schema: &SchemaDescriptor,
    include_header_row: bool,
) -> Result<Vec<T>, RustyRecordError> {
    let mut records = Vec::new();
    for sheet in workbook.sheets() {
        let header_row = sheet.header_row();
        let before = records.len();
        for row in sheet.rows() {
            if row.index() == 0 && !include_header_row {
                continue;
            }
            records.push(map_row(row, header_row, schema)?);
        }
        debug!(
            sheet = sheet.name(),
            rows = sheet.rows().len(),
            records = records.len() - before,
            "mapped sheet"
        );
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::schema::ColumnDeclaration;
    use crate::record::value::coerce;
    use crate::record::value::FieldType;
    use crate::record::value::ValueType;
    use crate::sheet_record;
    use crate::spreadsheet::cell::CellValue;
    use crate::spreadsheet::sheet::Sheet;

    sheet_record! {
        #[derive(Debug, Default, PartialEq)]
        struct Employee {
            #[column(name = "ID")]
            id: i64,
            #[column]
            name: String,
            #[column(index = 2)]
            salary: Option<f64>,
        }
    }

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_owned())
    }

    fn row(index: usize, values: Vec<(usize, CellValue)>) -> Row {
        Row::new(index, values.into_iter().map(|(col, value)| Cell::new(index, col, value)).collect())
    }

    fn header() -> Row {
        row(0, vec![(0, text("id")), (1, text("Name")), (2, text("Salary"))])
    }

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::resolve::<Employee>().unwrap()
    }

    #[test]
    fn resolve_headers_ignoring_case() -> Result<(), RustyRecordError> {
        let data = row(1, vec![(0, CellValue::Number(7.0)), (1, text(" Ada ")), (2, CellValue::Number(1.5))]);
        let employee: Employee = map_row(&data, Some(&header()), &schema())?;
        assert_eq!(employee, Employee { id: 7, name: "Ada".to_owned(), salary: Some(1.5) });
        Ok(())
    }

    #[test]
    fn fixed_index_counts_present_cells() -> Result<(), RustyRecordError> {
        // Column 1 is absent, so the third present cell does not exist.
        let data = row(1, vec![(0, CellValue::Number(1.0)), (2, CellValue::Number(9.0))]);
        let employee: Employee = map_row(&data, Some(&header()), &schema())?;
        assert_eq!(employee, Employee { id: 1, name: String::new(), salary: None });

        // Ragged row: the second present cell sits in column 3.
        let data = row(1, vec![(0, CellValue::Number(1.0)), (3, CellValue::Number(9.0)), (5, CellValue::Number(4.0))]);
        let employee: Employee = map_row(&data, Some(&header()), &schema())?;
        assert_eq!(employee.salary, Some(4.0));
        Ok(())
    }

    #[test]
    fn header_lookup_uses_the_same_column() -> Result<(), RustyRecordError> {
        let header = row(0, vec![(0, text("Name")), (3, CellValue::Number(2.0)), (4, text("ID"))]);
        let data = row(2, vec![(3, CellValue::Number(5.0)), (4, CellValue::Number(6.0))]);
        let employee: Employee = map_row(&data, Some(&header), &schema())?;
        assert_eq!(employee.id, 6);
        // The "Name" header has no cell below it.
        assert_eq!(employee.name, "");

        let employee: Employee = map_row(&data, None, &schema())?;
        assert_eq!(employee.id, 0);
        Ok(())
    }

    #[test]
    fn match_formula_headers_by_their_result() -> Result<(), RustyRecordError> {
        let header = row(0, vec![(0, CellValue::Formula("ID".to_owned())), (1, CellValue::Formula("name".to_owned()))]);
        let data = row(1, vec![(0, CellValue::Number(3.0)), (1, text("x"))]);
        let employee: Employee = map_row(&data, Some(&header), &schema())?;
        assert_eq!(employee, Employee { id: 3, name: "x".to_owned(), salary: None });
        Ok(())
    }

    #[test]
    fn blank_cells_reset_fields() -> Result<(), RustyRecordError> {
        let data = row(1, vec![(0, CellValue::Blank), (1, CellValue::Error("#N/A".to_owned())), (2, CellValue::Blank)]);
        let employee: Employee = map_row(&data, Some(&header()), &schema())?;
        assert_eq!(employee, Employee::default());
        Ok(())
    }

    #[test]
    fn report_the_failing_cell() {
        let data = row(4, vec![(0, text("seven")), (1, text("Bob"))]);
        let error = map_row::<Employee>(&data, Some(&header()), &schema()).unwrap_err();
        match error {
            RustyRecordError::CellConversionError { row, col, reference, field, target, cause } => {
                assert_eq!((row, col), (4, 0));
                assert_eq!(reference, "A5");
                assert_eq!(field, "id");
                assert_eq!(target, FieldType::Required(ValueType::Integer));
                assert_eq!(cause, ConversionError::Incompatible { found: "string", target: ValueType::Integer });
            }
            error => panic!("unexpected error: {error}"),
        }
    }

    /// Declares a field it cannot assign.
    #[derive(Debug, Default)]
    struct Broken {
        value: i64,
    }

    impl Record for Broken {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                ColumnDeclaration::new("value", FieldType::Required(ValueType::Integer)).index(0).build(),
                ColumnDeclaration::new("missing", FieldType::Required(ValueType::Integer)).index(0).build(),
            ]
        }

        fn assign(&mut self, field: &str, cell: &Cell) -> Result<(), ConversionError> {
            match field {
                "value" => self.value = coerce(cell)?,
                _ => Err(ConversionError::UnknownField(field.to_owned()))?,
            }
            Ok(())
        }
    }

    #[test]
    fn unknown_fields_are_configuration_errors() {
        let schema = SchemaDescriptor::resolve::<Broken>().unwrap();
        let data = row(1, vec![(0, CellValue::Number(3.0))]);
        let error = map_row::<Broken>(&data, None, &schema).unwrap_err();
        assert!(matches!(&error, RustyRecordError::ConfigurationError(message) if message.contains("missing")));
    }

    #[test]
    fn map_sheets_in_order() -> Result<(), RustyRecordError> {
        let first = Sheet::with_rows("First", vec![header(), row(1, vec![(0, CellValue::Number(1.0))])]);
        // No row 0 here: the first row is mapped and also serves as this sheet's header.
        let second = Sheet::with_rows("Second", vec![
            row(2, vec![(0, CellValue::Number(2.0)), (1, text("Eve")), (2, CellValue::Number(3.0))]),
        ]);
        let workbook = Workbook::new(vec![first, second]);

        let employees: Vec<Employee> = map_workbook(&workbook, &schema(), false)?;
        assert_eq!(employees, vec![
            Employee { id: 1, name: String::new(), salary: None },
            Employee { id: 0, name: String::new(), salary: Some(3.0) },
        ]);

        let error = map_workbook::<Employee>(&workbook, &schema(), true).unwrap_err();
        assert!(matches!(error, RustyRecordError::CellConversionError { row: 0, col: 0, .. }));
        Ok(())
    }
}
