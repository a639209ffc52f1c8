//! Sort model reported by the grid

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(format!("Unknown sort direction '{}'", other)),
        }
    }
}

/// One sort key; `col_id` is the column title
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortModelItem {
    #[serde(rename = "colId")]
    pub col_id: String,
    pub sort: SortDirection,
}

impl SortModelItem {
    pub fn new(col_id: impl Into<String>, sort: SortDirection) -> Self {
        Self {
            col_id: col_id.into(),
            sort,
        }
    }
}

/// Ordered sort keys, primary first
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortModel(pub Vec<SortModelItem>);

impl SortModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, col_id: impl Into<String>, sort: SortDirection) -> Self {
        self.0.push(SortModelItem::new(col_id, sort));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SortModelItem> {
        self.0.iter()
    }
}

impl FromStr for SortModel {
    type Err = String;

    /// Parse `Name:asc,Age:desc`; a bare title sorts ascending
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut model = SortModel::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (title, direction) = match part.rsplit_once(':') {
                Some((title, dir)) => (title.trim(), dir.parse()?),
                None => (part, SortDirection::Asc),
            };
            model = model.then(title, direction);
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort_string() {
        let model: SortModel = "Name:desc, Age".parse().unwrap();
        assert_eq!(
            model,
            SortModel::new()
                .then("Name", SortDirection::Desc)
                .then("Age", SortDirection::Asc)
        );
        assert!("Name:sideways".parse::<SortModel>().is_err());
    }

    #[test]
    fn test_sort_model_wire_shape() {
        let model = SortModel::new().then("Age", SortDirection::Desc);
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, r#"[{"colId":"Age","sort":"desc"}]"#);
    }
}
