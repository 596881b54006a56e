//! Relation schema: ordered list of named, typed columns

use nb_core::Type;

/// A named, typed output column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column type
    pub ty: Type,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Schema of a query's output. Equality is structural and order-sensitive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    /// Ordered list of output columns
    pub columns: Vec<Column>,
}

impl Schema {
    /// Create an empty schema
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a schema from a list of columns
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Create a single-column schema
    pub fn single(name: impl Into<String>, ty: Type) -> Self {
        Self::new(vec![Column::new(name, ty)])
    }

    /// Create a schema from `(name, type)` pairs
    pub fn from_pairs<N: Into<String>>(pairs: impl IntoIterator<Item = (N, Type)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, ty)| Column::new(name, ty))
                .collect(),
        )
    }

    /// Type of the named column
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.ty)
    }

    /// Whether a column with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a column
    pub fn push(&mut self, name: impl Into<String>, ty: Type) {
        self.columns.push(Column::new(name, ty));
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column names as a vec
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", c.name, c.ty)?;
        }
        write!(f, "}}")
    }
}
