//! Sheet layouts: where a sheet family keeps its header, labels and week groups
//!
//! All row and column positions are zero-based (column A = 0, row 1 = 0).

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::ingest::locate::{KeywordLocator, RegexLocator, RowLocator};
use crate::ingest::types::DAYS_PER_WEEK;

/// One sheet family's geometry, as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub name: String,
    /// Sheets whose name matches (case-insensitive) use this layout
    #[serde(default = "default_sheet_pattern")]
    pub sheet_pattern: String,
    /// Header row contains any of these (case-insensitive substring)
    #[serde(default)]
    pub header_keywords: Vec<String>,
    /// Header row has a cell matching this regex; takes precedence over keywords
    #[serde(default)]
    pub header_regex: Option<String>,
    /// Row used as header when the scan finds nothing
    #[serde(default)]
    pub fallback_header_row: Option<usize>,
    /// Column holding machine labels
    #[serde(default)]
    pub label_column: usize,
    /// First column of the first week group
    #[serde(default = "default_first_group_column")]
    pub first_group_column: usize,
    /// Columns per week group
    #[serde(default = "default_column_stride")]
    pub column_stride: usize,
    /// Offset of Monday inside a group
    #[serde(default)]
    pub day_offset: usize,
    /// Offset of the sheet's weekly total inside a group, if it has one
    #[serde(default)]
    pub total_offset: Option<usize>,
    /// Week of the first group when the header row carries no dates
    #[serde(default)]
    pub first_week_start: Option<NaiveDate>,
}

fn default_sheet_pattern() -> String {
    ".*".to_string()
}

fn default_first_group_column() -> usize {
    1
}

fn default_column_stride() -> usize {
    8
}

impl Default for SheetLayout {
    /// Machine label in column A, then 8-column weeks: Mon..Sun and a total
    fn default() -> Self {
        SheetLayout {
            name: "default".to_string(),
            sheet_pattern: default_sheet_pattern(),
            header_keywords: vec!["machine".to_string(), "press".to_string()],
            header_regex: None,
            fallback_header_row: None,
            label_column: 0,
            first_group_column: default_first_group_column(),
            column_stride: default_column_stride(),
            day_offset: 0,
            total_offset: Some(DAYS_PER_WEEK),
            first_week_start: None,
        }
    }
}

impl SheetLayout {
    /// Check the geometry is self-consistent
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Layout name cannot be empty");
        }
        if self.column_stride < self.day_offset + DAYS_PER_WEEK {
            bail!(
                "Layout '{}': column_stride {} cannot hold 7 days starting at offset {}",
                self.name,
                self.column_stride,
                self.day_offset
            );
        }
        if let Some(total) = self.total_offset {
            if total >= self.column_stride {
                bail!(
                    "Layout '{}': total_offset {} is outside the {}-column group",
                    self.name,
                    total,
                    self.column_stride
                );
            }
            if (self.day_offset..self.day_offset + DAYS_PER_WEEK).contains(&total) {
                bail!(
                    "Layout '{}': total_offset {} overlaps the day columns",
                    self.name,
                    total
                );
            }
        }
        if self.header_keywords.iter().all(|k| k.trim().is_empty()) && self.header_regex.is_none() {
            bail!(
                "Layout '{}' needs header_keywords or header_regex",
                self.name
            );
        }
        Ok(())
    }

    /// Validate and build the matchers for this layout
    pub fn compile(&self) -> Result<CompiledLayout> {
        self.validate()?;

        let sheet_pattern = RegexBuilder::new(&self.sheet_pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Layout '{}': invalid sheet_pattern", self.name))?;

        let locator: Box<dyn RowLocator> = match &self.header_regex {
            Some(pattern) => {
                let regex = Regex::new(pattern)
                    .with_context(|| format!("Layout '{}': invalid header_regex", self.name))?;
                Box::new(RegexLocator::new(regex))
            }
            None => Box::new(KeywordLocator::new(&self.header_keywords)),
        };

        Ok(CompiledLayout {
            layout: self.clone(),
            sheet_pattern,
            locator,
        })
    }
}

/// A validated layout with its matchers built
pub struct CompiledLayout {
    pub layout: SheetLayout,
    sheet_pattern: Regex,
    locator: Box<dyn RowLocator>,
}

impl CompiledLayout {
    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn applies_to(&self, sheet_name: &str) -> bool {
        self.sheet_pattern.is_match(sheet_name)
    }

    pub fn locator(&self) -> &dyn RowLocator {
        self.locator.as_ref()
    }
}

impl std::fmt::Debug for CompiledLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledLayout")
            .field("name", &self.layout.name)
            .field("sheet_pattern", &self.sheet_pattern.as_str())
            .field("locator", &self.locator.describe())
            .finish()
    }
}
