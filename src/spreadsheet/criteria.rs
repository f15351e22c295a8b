use crate::error::RustyRecordError;
use glob::Pattern;

/// Criteria for selecting which sheets of a workbook are parsed.
#[derive(Clone, Debug, Default)]
pub struct Criteria {
    /// Sheet name patterns; a sheet is read when any pattern matches.
    pub sheet_name_patterns: Option<Vec<Pattern>>,

    /// Maximum number of sheets to read.
    pub sheet_limit: Option<usize>,
}

impl Criteria {
    /// Adds a glob pattern (e.g. `Data*`) to the accepted sheet names.
    pub fn with_sheet_pattern(mut self, pattern: &str) -> Result<Self, RustyRecordError> {
        let pattern = Pattern::new(pattern)?;
        self.sheet_name_patterns.get_or_insert_with(Vec::new).push(pattern);
        Ok(self)
    }

    pub fn with_sheet_limit(mut self, limit: usize) -> Self {
        self.sheet_limit = Some(limit);
        self
    }

    /// Checks if a sheet name matches the criteria patterns.
    /// Returns true if no patterns are specified or if name matches any pattern.
    pub fn accept(&self, sheet_name: &str) -> bool {
        match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }

    /// Positions of the sheets to read, in workbook order.
    pub(crate) fn select<'a, I>(&self, names: I) -> Vec<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .enumerate()
            .filter(|(_, name)| self.accept(name))
            .map(|(position, _)| position)
            .take(self.sheet_limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_everything_by_default() {
        let criteria = Criteria::default();
        assert!(criteria.accept("Sheet1"));
        assert_eq!(criteria.select(["a", "b", "c"]), vec![0, 1, 2]);
    }

    #[test]
    fn filter_by_patterns() -> Result<(), RustyRecordError> {
        let criteria = Criteria::default().with_sheet_pattern("Data*")?.with_sheet_pattern("Summary")?;
        assert!(criteria.accept("Data 2024"));
        assert!(criteria.accept("Summary"));
        assert!(!criteria.accept("Notes"));
        assert_eq!(criteria.select(["Notes", "Data1", "Summary", "Data2"]), vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn limit_selected_sheets() -> Result<(), RustyRecordError> {
        let criteria = Criteria::default().with_sheet_pattern("S*")?.with_sheet_limit(1);
        assert_eq!(criteria.select(["A", "S1", "S2"]), vec![1]);
        Ok(())
    }

    #[test]
    fn reject_invalid_pattern() {
        assert!(Criteria::default().with_sheet_pattern("[").is_err());
    }
}
