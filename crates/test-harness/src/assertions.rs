//! Assertion helpers with diagnostic output.
//!
//! Every failure carries expected vs actual and the feature tree summary.

use shape_types::Selection;

use crate::helpers::HarnessError;
use crate::workflow::ModelBuilder;

fn fail(m: &ModelBuilder, detail: String) -> HarnessError {
    HarnessError::AssertionFailed {
        detail: format!("{detail}\n{}", m.summary()),
    }
}

impl ModelBuilder {
    /// The feature computed without error.
    pub fn assert_valid(&self, feature: &str) -> Result<(), HarnessError> {
        let id = self.id(feature)?;
        if self.session().validate(id) {
            Ok(())
        } else {
            Err(fail(
                self,
                format!("{feature} is not valid: {:?}", self.session().status(id)),
            ))
        }
    }

    /// The feature is in error state and its message mentions `text`.
    pub fn assert_error_contains(&self, feature: &str, text: &str) -> Result<(), HarnessError> {
        let error = self.error(feature)?;
        if !error.is_empty() && error.contains(text) {
            Ok(())
        } else {
            Err(fail(
                self,
                format!("{feature}: expected an error mentioning {text:?}, got {error:?}"),
            ))
        }
    }

    pub fn assert_group_size(&self, group: &str, expected: usize) -> Result<(), HarnessError> {
        let actual = self.group_size(group)?;
        if actual == expected {
            Ok(())
        } else {
            Err(fail(
                self,
                format!("{group}: expected {expected} members, got {actual}"),
            ))
        }
    }

    pub fn assert_volume(&self, result: &str, expected: f64, tol: f64) -> Result<(), HarnessError> {
        let actual = self.volume(result)?;
        if (actual - expected).abs() <= tol {
            Ok(())
        } else {
            Err(fail(
                self,
                format!("{result}: expected volume {expected:.4}, got {actual:.4} (tol={tol})"),
            ))
        }
    }

    /// The selection resolves in the current part to a shape of its declared type.
    pub fn assert_resolves(&self, selection: &Selection) -> Result<(), HarnessError> {
        let part = self.current_part()?;
        match self.session().resolve(part, selection) {
            Ok(shape) if Some(shape.shape_type) == selection.shape_type => Ok(()),
            Ok(shape) => Err(fail(
                self,
                format!("{} resolved to a {:?}", selection.name, shape.shape_type),
            )),
            Err(err) => Err(fail(self, format!("{} does not resolve: {err}", selection.name))),
        }
    }

    pub fn assert_unresolved(&self, selection: &Selection) -> Result<(), HarnessError> {
        let part = self.current_part()?;
        match self.session().resolve(part, selection) {
            Err(_) => Ok(()),
            Ok(shape) => Err(fail(
                self,
                format!("{} unexpectedly resolves to {}", selection.name, shape.name),
            )),
        }
    }
}
