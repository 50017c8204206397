//! Type-erased values flowing between binding steps and handlers.

use std::any::{Any, type_name};
use std::collections::VecDeque;

use crate::error::BindError;

/// A bound parameter value whose concrete type is known only to the handler.
pub type BoundValue = Box<dyn Any + Send>;

/// Erases a value.
pub fn bound<T: Send + 'static>(value: T) -> BoundValue {
    Box::new(value)
}

/// Recovers the concrete value, failing if the erased type differs.
pub fn downcast<T: 'static>(value: BoundValue) -> Result<T, BindError> {
    value
        .downcast::<T>()
        .map(|v| *v)
        .map_err(|_| BindError::TypeMismatch {
            expected: type_name::<T>(),
        })
}

/// Positional handler arguments, consumed front to back.
///
/// The compiled pipeline fills one slot per declared parameter, in
/// declaration order; the handler adapter takes them out with
/// [`Arguments::next`].
#[derive(Default)]
pub struct Arguments {
    values: VecDeque<BoundValue>,
    taken: usize,
}

impl Arguments {
    /// Creates arguments from values in declaration order.
    pub fn new(values: Vec<BoundValue>) -> Self {
        Self {
            values: values.into(),
            taken: 0,
        }
    }

    /// Creates an empty argument list.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of arguments still available.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if every argument has been taken.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the next argument as `T`.
    pub fn next<T: 'static>(&mut self) -> Result<T, BindError> {
        let position = self.taken;
        let value = self
            .values
            .pop_front()
            .ok_or(BindError::MissingArgument { position })?;
        self.taken += 1;
        downcast(value)
    }
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("remaining", &self.values.len())
            .field("taken", &self.taken)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_in_order() {
        let mut args = Arguments::new(vec![bound(42_i32), bound(String::from("x"))]);
        assert_eq!(args.next::<i32>().unwrap(), 42);
        assert_eq!(args.next::<String>().unwrap(), "x");
        assert!(args.is_empty());
    }

    #[test]
    fn test_arguments_mismatch_and_exhaustion() {
        let mut args = Arguments::new(vec![bound(1_u8)]);
        assert!(matches!(
            args.next::<i64>(),
            Err(BindError::TypeMismatch { .. })
        ));
        assert_eq!(
            args.next::<u8>(),
            Err(BindError::MissingArgument { position: 1 })
        );
    }
}
