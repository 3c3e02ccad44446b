//! Case-insensitive column name lookup.

use std::collections::HashMap;

use crate::error::QueryError;

/// Maps column names to positions, ignoring case.
///
/// When a name appears twice the first position wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnMap {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnMap {
    pub fn new<I, S>(names: I) -> ColumnMap
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(names.len());
        for (pos, name) in names.iter().enumerate() {
            index.entry(name.to_lowercase()).or_insert(pos);
        }
        ColumnMap { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_lowercase()).copied()
    }

    pub fn lookup(&self, name: &str) -> Result<usize, QueryError> {
        self.get(name).ok_or_else(|| QueryError::UnknownColumn {
            key: name.to_string(),
            available: self.names.clone(),
        })
    }
}

/// Resolve a possibly negative index against `len`.
pub fn wrap_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        (len as i64).checked_add(index)?
    } else {
        index
    };
    if resolved >= 0 && (resolved as usize) < len {
        Some(resolved as usize)
    } else {
        None
    }
}
