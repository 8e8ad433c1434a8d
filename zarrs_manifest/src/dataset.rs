//! Virtual datasets.
//!
//! A [`VirtualDataset`] maps unique variable names to [`Variable`]s.
//! Each axis of a variable is bound to a named dimension, and every variable sharing a dimension name agrees on its size.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use derive_more::Display;
use zarrs_manifest_metadata::Attributes;

use crate::{
    DimensionSizeMismatchError, InvalidVariableNameError, ManifestError, VariableConflictError,
    VirtualArray,
};

/// How a variable defined differently by datasets being combined is handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Display)]
pub enum ConflictPolicy {
    /// Fail with a [`VariableConflictError`].
    #[default]
    #[display("fail")]
    Fail,
    /// The variable of the later dataset wins.
    #[display("override")]
    Override,
}

/// A named array of a dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    array: VirtualArray,
    dimensions: Vec<String>,
    attributes: Attributes,
}

impl Variable {
    /// Create a new variable with one dimension name per axis of `array`.
    ///
    /// # Errors
    /// Returns [`DimensionSizeMismatchError::DimensionNames`] if the number of dimension names does not match the dimensionality of `array`.
    pub fn new(
        array: impl Into<VirtualArray>,
        dimensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, DimensionSizeMismatchError> {
        let array = array.into();
        let dimensions: Vec<String> = dimensions.into_iter().map(Into::into).collect();
        if dimensions.len() != array.dimensionality() {
            return Err(DimensionSizeMismatchError::DimensionNames {
                expected: array.dimensionality(),
                got: dimensions.len(),
            });
        }
        Ok(Self {
            array,
            dimensions,
            attributes: Attributes::new(),
        })
    }

    /// Set the attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Return the array.
    #[must_use]
    pub fn array(&self) -> &VirtualArray {
        &self.array
    }

    /// Return the dimension names.
    #[must_use]
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// Return the attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Return the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.array.shape()
    }

    /// Return the axis bound to the dimension `dimension`.
    #[must_use]
    pub fn axis_of(&self, dimension: &str) -> Option<usize> {
        self.dimensions.iter().position(|name| name == dimension)
    }

    fn conflict_reason(&self, other: &Self) -> &'static str {
        if self.dimensions != other.dimensions {
            "dimension names differ"
        } else if self.array != other.array {
            "arrays differ"
        } else {
            "attributes differ"
        }
    }
}

/// A virtual dataset.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct VirtualDataset {
    variables: BTreeMap<String, Variable>,
    dimensions: BTreeMap<String, u64>,
    attributes: Attributes,
}

impl VirtualDataset {
    /// Create an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    ///
    /// # Errors
    /// See [`add_variable`](Self::add_variable).
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        variable: Variable,
    ) -> Result<Self, ManifestError> {
        self.add_variable(name, variable)?;
        Ok(self)
    }

    /// Add a variable.
    ///
    /// Variable names must be non-empty and must not contain `/`, which separates variables from chunk keys in references.
    ///
    /// # Errors
    /// Returns a [`ManifestError`] if `name` is invalid, a variable named `name` already exists, or the variable disagrees with the dataset on a dimension size.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        variable: Variable,
    ) -> Result<(), ManifestError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(InvalidVariableNameError::new(name).into());
        }
        if self.variables.contains_key(&name) {
            return Err(VariableConflictError::new(name, "the variable already exists").into());
        }
        let dimensions = bind_dimensions(self.dimensions.clone(), &variable)?;
        self.dimensions = dimensions;
        self.variables.insert(name, variable);
        Ok(())
    }

    /// Set the dataset attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Return the variables, sorted by name.
    #[must_use]
    pub fn variables(&self) -> &BTreeMap<String, Variable> {
        &self.variables
    }

    /// Return the variable named `name`.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Return the dimension sizes, sorted by dimension name.
    #[must_use]
    pub fn dimensions(&self) -> &BTreeMap<String, u64> {
        &self.dimensions
    }

    /// Return the size of the dimension `name`.
    #[must_use]
    pub fn dimension_size(&self, name: &str) -> Option<u64> {
        self.dimensions.get(name).copied()
    }

    /// Return the dataset attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Return the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns true if the dataset has no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Return a copy of the dataset with every source path replaced by `rename(path)`.
    #[must_use]
    pub fn rename_paths(&self, rename: impl Fn(&str) -> String) -> Self {
        let variables = self
            .variables
            .iter()
            .map(|(name, variable)| {
                let array = match &variable.array {
                    VirtualArray::Manifest(array) => {
                        VirtualArray::Manifest(array.rename_paths(&rename))
                    }
                    VirtualArray::Loaded(_) => variable.array.clone(),
                };
                (
                    name.clone(),
                    Variable {
                        array,
                        ..variable.clone()
                    },
                )
            })
            .collect();
        Self {
            variables,
            dimensions: self.dimensions.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Merge datasets into the union of their variables.
    ///
    /// A variable that appears in more than one dataset must be identical in each, unless `policy` is [`ConflictPolicy::Override`] in which case the later dataset wins.
    /// Dataset attributes are combined in the same way, except that the first value is kept under [`ConflictPolicy::Fail`].
    ///
    /// # Errors
    /// Returns a [`DimensionSizeMismatchError`] if any two input variables disagree on a dimension size, under either policy.
    /// Otherwise returns a [`VariableConflictError`] for a conflicting variable under [`ConflictPolicy::Fail`].
    pub fn merge(datasets: &[Self], policy: ConflictPolicy) -> Result<Self, ManifestError> {
        let mut variables: BTreeMap<String, Variable> = BTreeMap::new();
        let mut dimensions = BTreeMap::new();
        let mut attributes = Attributes::new();
        for (input, dataset) in datasets.iter().enumerate() {
            for (name, variable) in &dataset.variables {
                // every input binds its dimensions, including overridden variables
                dimensions = bind_dimensions(dimensions, variable)?;
                match variables.entry(name.clone()) {
                    Entry::Vacant(entry) => {
                        entry.insert(variable.clone());
                    }
                    Entry::Occupied(mut entry) => {
                        if entry.get() == variable {
                            continue;
                        }
                        match policy {
                            ConflictPolicy::Fail => {
                                return Err(VariableConflictError::new(
                                    name.clone(),
                                    format!(
                                        "{} in input {input}",
                                        entry.get().conflict_reason(variable)
                                    ),
                                )
                                .into());
                            }
                            ConflictPolicy::Override => {
                                log::debug!("variable {name:?} overridden by input {input}");
                                entry.insert(variable.clone());
                            }
                        }
                    }
                }
            }
            merge_attributes(&mut attributes, &dataset.attributes, policy);
        }
        Ok(Self::from_parts(variables, attributes)?)
    }

    /// Concatenate datasets along the dimension `dimension`.
    ///
    /// Variables with the dimension `dimension` are concatenated along it in the order of `datasets`, and must be present in every dataset.
    /// Other variables must be identical in every dataset they appear in, unless `policy` is [`ConflictPolicy::Override`] in which case the last one wins.
    /// Dataset attributes are taken from the first dataset.
    ///
    /// # Errors
    /// Returns a [`ManifestError`] if `datasets` is empty, a variable conflicts, or the arrays of a variable cannot be concatenated.
    pub fn concat(
        datasets: &[Self],
        dimension: &str,
        policy: ConflictPolicy,
    ) -> Result<Self, ManifestError> {
        let Some(first) = datasets.first() else {
            return Err(ManifestError::EmptyInput);
        };
        let names: BTreeSet<&String> = datasets
            .iter()
            .flat_map(|dataset| dataset.variables.keys())
            .collect();

        let mut variables = BTreeMap::new();
        for name in names {
            let occurrences: Vec<Option<&Variable>> = datasets
                .iter()
                .map(|dataset| dataset.variables.get(name.as_str()))
                .collect();
            let Some(template) = occurrences.iter().flatten().next().copied() else {
                continue;
            };
            let variable = if let Some(axis) = template.axis_of(dimension) {
                concat_variable(name, template, &occurrences, axis)?
            } else {
                constant_variable(name, template, &occurrences, policy)?
            };
            variables.insert(name.clone(), variable);
        }
        log::debug!(
            "concatenated {} datasets along dimension {dimension:?}",
            datasets.len()
        );
        Ok(Self::from_parts(variables, first.attributes.clone())?)
    }

    /// Create a dataset from variables with valid names.
    pub(crate) fn from_parts(
        variables: BTreeMap<String, Variable>,
        attributes: Attributes,
    ) -> Result<Self, DimensionSizeMismatchError> {
        debug_assert!(variables.keys().all(|name| is_valid_name(name)));
        let mut dimensions = BTreeMap::new();
        for variable in variables.values() {
            dimensions = bind_dimensions(dimensions, variable)?;
        }
        Ok(Self {
            variables,
            dimensions,
            attributes,
        })
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

fn bind_dimensions(
    mut dimensions: BTreeMap<String, u64>,
    variable: &Variable,
) -> Result<BTreeMap<String, u64>, DimensionSizeMismatchError> {
    for (dimension, &size) in std::iter::zip(&variable.dimensions, variable.shape()) {
        match dimensions.entry(dimension.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(size);
            }
            Entry::Occupied(entry) => {
                if *entry.get() != size {
                    return Err(DimensionSizeMismatchError::Dimension {
                        dimension: dimension.clone(),
                        expected: *entry.get(),
                        got: size,
                    });
                }
            }
        }
    }
    Ok(dimensions)
}

fn merge_attributes(attributes: &mut Attributes, other: &Attributes, policy: ConflictPolicy) {
    for (key, value) in other {
        match attributes.get(key) {
            None => {
                attributes.insert(key.clone(), value.clone());
            }
            Some(existing) if existing != value && policy == ConflictPolicy::Override => {
                attributes.insert(key.clone(), value.clone());
            }
            Some(_) => {}
        }
    }
}

fn concat_variable(
    name: &str,
    template: &Variable,
    occurrences: &[Option<&Variable>],
    axis: usize,
) -> Result<Variable, ManifestError> {
    let mut arrays = Vec::with_capacity(occurrences.len());
    for (input, occurrence) in occurrences.iter().enumerate() {
        let Some(variable) = occurrence else {
            return Err(VariableConflictError::new(
                name,
                format!("missing from input {input} of the concatenation"),
            )
            .into());
        };
        if variable.dimensions != template.dimensions {
            return Err(VariableConflictError::new(
                name,
                format!("dimension names differ in input {input}"),
            )
            .into());
        }
        arrays.push(variable.array.clone());
    }
    Ok(Variable {
        array: VirtualArray::concatenate(&arrays, axis)?,
        dimensions: template.dimensions.clone(),
        attributes: template.attributes.clone(),
    })
}

fn constant_variable(
    name: &str,
    template: &Variable,
    occurrences: &[Option<&Variable>],
    policy: ConflictPolicy,
) -> Result<Variable, ManifestError> {
    let mut result = template;
    for (input, &variable) in occurrences.iter().enumerate() {
        let Some(variable) = variable else {
            continue;
        };
        if variable == result {
            continue;
        }
        match policy {
            ConflictPolicy::Fail => {
                return Err(VariableConflictError::new(
                    name,
                    format!("{} in input {input}", result.conflict_reason(variable)),
                )
                .into());
            }
            ConflictPolicy::Override => result = variable,
        }
    }
    Ok(result.clone())
}
