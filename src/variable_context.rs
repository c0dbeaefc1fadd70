//! Declared measurement names and their resolution against source columns.
use std::collections::HashMap;

use ahash::RandomState;

use crate::{
    binning_errors::BinningError,
    observations::{Observation, ObservationValues, PassDescriptor},
};

/// Ordered set of the measurement variables a run works with.
///
/// Aggregators address variables by their position in this context; the position is resolved
/// once from the variable name when the run is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableContext {
    names: Vec<String>,
    index: HashMap<String, usize, RandomState>,
}

impl VariableContext {
    pub fn new(names: &[String]) -> Result<Self, BinningError> {
        let mut index: HashMap<String, usize, RandomState> = HashMap::default();
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(BinningError::InvalidAggregatorConfig(
                    "variable names must not be empty".into(),
                ));
            }
            if index.insert(name.clone(), i).is_some() {
                return Err(BinningError::InvalidAggregatorConfig(format!(
                    "variable '{name}' is declared twice"
                )));
            }
        }
        Ok(VariableContext {
            names: names.to_vec(),
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Resolve a variable referenced by the configuration.
    pub fn require(&self, name: &str) -> Result<usize, BinningError> {
        self.index_of(name)
            .ok_or_else(|| BinningError::UndeclaredVariable {
                variable: name.to_string(),
                pass: "the binning configuration".to_string(),
            })
    }

    /// Map the columns of a pass onto this context.
    ///
    /// Return
    /// ----------
    /// * A [`SourceMapping`] usable for every observation of the pass, or
    ///   [`BinningError::UndeclaredVariable`] naming the first variable the pass does not provide.
    pub fn source_mapping(&self, pass: &PassDescriptor) -> Result<SourceMapping, BinningError> {
        let columns = self
            .names
            .iter()
            .map(|name| {
                pass.variables
                    .iter()
                    .position(|v| v == name)
                    .ok_or_else(|| BinningError::UndeclaredVariable {
                        variable: name.clone(),
                        pass: format!("pass '{}'", pass.id),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SourceMapping {
            columns,
            source_width: pass.variables.len(),
        })
    }
}

/// Column positions of the context variables inside one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapping {
    columns: Vec<usize>,
    source_width: usize,
}

impl SourceMapping {
    /// Reorder the values of `obs` into context order.
    ///
    /// Return
    /// ----------
    /// * `None` if the observation carries fewer values than its pass declares.
    pub fn gather(&self, obs: &Observation, out: &mut ObservationValues) -> Option<()> {
        if obs.values.len() < self.source_width {
            return None;
        }
        out.clear();
        out.extend(self.columns.iter().map(|&c| obs.values[c]));
        Some(())
    }
}
