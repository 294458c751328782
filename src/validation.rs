use std::fmt;

use itertools::Itertools;

/// A problem with one field of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every problem found in a request.
///
/// A request with any field error is rejected
/// before anything is changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, thiserror::Error)]
#[error("Invalid request: {}", .errors.iter().format("; "))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S>(&mut self, field: &'static str, message: S)
    where
        S: Into<String>,
    {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        })
    }

    /// Record the error of `result`, if any,
    /// and return its value otherwise.
    pub(crate) fn check<T, E>(&mut self, field: &'static str, result: Result<T, E>) -> Option<T>
    where
        E: fmt::Display,
    {
        match result {
            Ok(x) => Some(x),
            Err(e) => {
                self.push(field, e.to_string());
                None
            }
        }
    }

    pub fn field(&self, field: &str) -> impl Iterator<Item = &FieldError> + '_ {
        let field = field.to_owned();
        self.errors.iter().filter(move |e| e.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}
