//! Question records and the table selection they are drawn from

use crate::error::QuizError;
use serde::Serialize;

/// Smallest selectable table
pub const MIN_TABLE: u32 = 1;
/// Largest selectable table
pub const MAX_TABLE: u32 = 10;
/// Multipliers are drawn from 1..=MAX_MULTIPLIER
pub const MAX_MULTIPLIER: u32 = 10;

/// One multiplication question, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Question {
    text: String,
    answer: u32,
    table: u32,
    multiplier: u32,
}

impl Question {
    /// Build the question "table x multiplier"
    pub fn new(table: u32, multiplier: u32) -> Self {
        Self {
            text: format!("{} x {}", table, multiplier),
            answer: table * multiplier,
            table,
            multiplier,
        }
    }

    /// Display text, e.g. "3 x 7"
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Expected product
    pub fn answer(&self) -> u32 {
        self.answer
    }

    /// Table value (multiplicand)
    pub fn table(&self) -> u32 {
        self.table
    }

    /// Multiplier
    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Worked solution, e.g. "3 x 5 = 15"
    pub fn solution(&self) -> String {
        format!("{} = {}", self.text, self.answer)
    }
}

/// Non-empty set of selected tables, each within 1..=10
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSet {
    /// Sorted, deduplicated
    tables: Vec<u32>,
}

impl TableSet {
    /// Validate a table selection
    pub fn new(tables: impl IntoIterator<Item = u32>) -> Result<Self, QuizError> {
        let mut tables: Vec<u32> = tables.into_iter().collect();
        if tables.is_empty() {
            return Err(QuizError::EmptySelection);
        }
        if let Some(&bad) = tables
            .iter()
            .find(|&&t| !(MIN_TABLE..=MAX_TABLE).contains(&t))
        {
            return Err(QuizError::TableOutOfRange(bad));
        }
        tables.sort_unstable();
        tables.dedup();
        Ok(Self { tables })
    }

    /// Selected table values in ascending order
    pub fn as_slice(&self) -> &[u32] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, table: u32) -> bool {
        self.tables.binary_search(&table).is_ok()
    }

    /// Number of distinct questions this selection can produce
    pub fn question_space(&self) -> usize {
        self.tables.len() * MAX_MULTIPLIER as usize
    }
}

impl std::fmt::Display for TableSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let list: Vec<String> = self.tables.iter().map(u32::to_string).collect();
        write!(f, "{}", list.join(", "))
    }
}
