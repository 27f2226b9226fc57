//! Columnar dataset adapter. Rows are instances, columns are typed
//! attributes; the numeric block (numeric + ordered columns) is what the
//! projection machinery actually sees, everything else rides along for
//! labelling, colouring and classification.

use std::fmt;

use ndarray::Array2;

use crate::error::{PursuitError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Continuous values.
    Numeric,
    /// Categorical values stored as codes into a category list.
    Nominal,
    /// Numeric values with rank semantics (dates, sequence positions).
    /// Participates in numeric extraction and series indexing.
    Ordered,
    /// Free text; never projected.
    String,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeKind::Numeric => "numeric",
            AttributeKind::Nominal => "nominal",
            AttributeKind::Ordered => "ordered",
            AttributeKind::String => "string",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
enum AttributeValues {
    Numeric(Vec<f64>),
    Nominal { codes: Vec<u32>, categories: Vec<String> },
    Text(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
    values: AttributeValues,
}

impl Attribute {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Attribute {
            name: name.into(),
            kind: AttributeKind::Numeric,
            values: AttributeValues::Numeric(values),
        }
    }

    pub fn ordered(name: impl Into<String>, values: Vec<f64>) -> Self {
        Attribute {
            name: name.into(),
            kind: AttributeKind::Ordered,
            values: AttributeValues::Numeric(values),
        }
    }

    /// Categorical column. Every code must index into `categories`.
    pub fn nominal(
        name: impl Into<String>,
        categories: Vec<String>,
        codes: Vec<u32>,
    ) -> Result<Self> {
        let name = name.into();
        if let Some(&bad) = codes.iter().find(|&&c| c as usize >= categories.len()) {
            return Err(PursuitError::DegenerateInput(format!(
                "nominal code {bad} out of range for {} categories in '{name}'",
                categories.len()
            )));
        }
        Ok(Attribute {
            name,
            kind: AttributeKind::Nominal,
            values: AttributeValues::Nominal { codes, categories },
        })
    }

    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Attribute {
            name: name.into(),
            kind: AttributeKind::String,
            values: AttributeValues::Text(values),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        match &self.values {
            AttributeValues::Numeric(v) => v.len(),
            AttributeValues::Nominal { codes, .. } => codes.len(),
            AttributeValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for the kinds that enter the numeric matrix.
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, AttributeKind::Numeric | AttributeKind::Ordered)
    }

    fn value_description(&self, row: usize) -> String {
        match &self.values {
            AttributeValues::Numeric(v) => format!("{}", v[row]),
            AttributeValues::Nominal { codes, categories } => {
                categories[codes[row] as usize].clone()
            }
            AttributeValues::Text(v) => v[row].clone(),
        }
    }
}

/// An in-memory table of typed attributes with a uniform row count.
/// Attribute names are unique; the public API addresses columns by name.
#[derive(Debug, Clone)]
pub struct Dataset {
    attributes: Vec<Attribute>,
    rows: usize,
}

impl Dataset {
    /// Builds a dataset, validating uniform row counts and unique names.
    pub fn new(attributes: Vec<Attribute>) -> Result<Self> {
        let rows = attributes.first().map_or(0, Attribute::len);
        for attr in &attributes {
            if attr.len() != rows {
                return Err(PursuitError::shape((rows, 1), (attr.len(), 1)));
            }
        }
        for (i, attr) in attributes.iter().enumerate() {
            if attributes[..i].iter().any(|a| a.name == attr.name) {
                return Err(PursuitError::DegenerateInput(format!(
                    "duplicate attribute name '{}'",
                    attr.name
                )));
            }
        }
        Ok(Dataset { attributes, rows })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn attribute(&self, name: &str) -> Result<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| PursuitError::UnknownAttribute(name.to_string()))
    }

    pub fn attribute_index(&self, name: &str) -> Result<usize> {
        self.attributes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| PursuitError::UnknownAttribute(name.to_string()))
    }

    pub fn kind(&self, name: &str) -> Result<AttributeKind> {
        Ok(self.attribute(name)?.kind)
    }

    /// Names of the columns that enter the numeric matrix, in column order.
    pub fn numeric_attribute_names(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.is_numeric())
            .map(|a| a.name.as_str())
            .collect()
    }

    /// The rows x numeric-attrs working matrix over numeric and ordered
    /// columns. A dataset without numeric columns yields a rows x 0 matrix;
    /// rejecting that is the model layer's job.
    pub fn numeric_matrix(&self) -> Array2<f64> {
        let cols: Vec<&Vec<f64>> = self
            .attributes
            .iter()
            .filter_map(|a| match (&a.values, a.is_numeric()) {
                (AttributeValues::Numeric(v), true) => Some(v),
                _ => None,
            })
            .collect();
        let mut m = Array2::zeros((self.rows, cols.len()));
        for (j, col) in cols.iter().enumerate() {
            for (i, &v) in col.iter().enumerate() {
                m[[i, j]] = v;
            }
        }
        m
    }

    pub fn numeric_values(&self, name: &str) -> Result<&[f64]> {
        let attr = self.attribute(name)?;
        match &attr.values {
            AttributeValues::Numeric(v) if attr.is_numeric() => Ok(v),
            _ => Err(PursuitError::InvalidAttribute {
                name: name.to_string(),
                expected: "numeric or ordered".to_string(),
            }),
        }
    }

    pub fn nominal_values(&self, name: &str) -> Result<&[u32]> {
        match &self.attribute(name)?.values {
            AttributeValues::Nominal { codes, .. } => Ok(codes),
            _ => Err(PursuitError::InvalidAttribute {
                name: name.to_string(),
                expected: "nominal".to_string(),
            }),
        }
    }

    pub fn categories(&self, name: &str) -> Result<&[String]> {
        match &self.attribute(name)?.values {
            AttributeValues::Nominal { categories, .. } => Ok(categories),
            _ => Err(PursuitError::InvalidAttribute {
                name: name.to_string(),
                expected: "nominal".to_string(),
            }),
        }
    }

    pub fn string_values(&self, name: &str) -> Result<&[String]> {
        match &self.attribute(name)?.values {
            AttributeValues::Text(v) => Ok(v),
            _ => Err(PursuitError::InvalidAttribute {
                name: name.to_string(),
                expected: "string".to_string(),
            }),
        }
    }

    /// Inserts a synthetic nominal column (cluster labels, classifier
    /// output). A taken name is de-duplicated by suffixing; the name
    /// actually used is returned.
    pub fn add_nominal_attribute(
        &mut self,
        name: &str,
        categories: Vec<String>,
        codes: Vec<u32>,
    ) -> Result<String> {
        if codes.len() != self.rows {
            return Err(PursuitError::shape((self.rows, 1), (codes.len(), 1)));
        }
        let unique = self.dedup_name(name);
        let attr = Attribute::nominal(unique.clone(), categories, codes)?;
        self.attributes.push(attr);
        Ok(unique)
    }

    fn dedup_name(&self, name: &str) -> String {
        if self.attribute_index(name).is_err() {
            return name.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{name}_{n}");
            if self.attribute_index(&candidate).is_err() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Removes the named columns. Any unknown name fails the whole call
    /// before anything is dropped.
    pub fn remove_attributes(&mut self, names: &[&str]) -> Result<()> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            indices.push(self.attribute_index(name)?);
        }
        indices.sort_unstable();
        indices.dedup();
        for &i in indices.iter().rev() {
            self.attributes.remove(i);
        }
        Ok(())
    }

    /// Affine rescale of every numeric/ordered column to [0, 1]. Constant
    /// columns map to 0.5.
    pub fn normalize_unit(&mut self) {
        for attr in &mut self.attributes {
            if !attr.is_numeric() {
                continue;
            }
            if let AttributeValues::Numeric(v) = &mut attr.values {
                let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
                for &x in v.iter() {
                    min = min.min(x);
                    max = max.max(x);
                }
                if v.is_empty() {
                    continue;
                }
                let range = max - min;
                if range > 0.0 {
                    for x in v.iter_mut() {
                        *x = (*x - min) / range;
                    }
                } else {
                    for x in v.iter_mut() {
                        *x = 0.5;
                    }
                }
            }
        }
    }

    /// "name=value" summary of one row across all attributes, the text a
    /// viewer shows when the pointer rests on a point.
    pub fn row_description(&self, row: usize) -> String {
        self.attributes
            .iter()
            .map(|a| format!("{}={}", a.name, a.value_description(row)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
