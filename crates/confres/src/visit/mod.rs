//! visitor pattern helpers
mod visit_strings;
pub use visit_strings::{VisitStrings, VisitStringsMut};

use crate::path::TreePath;

/// Visitor that visits its subjects mutably, together with their location
pub trait VisitMut<T: ?Sized> {
    fn visit_mut(&mut self, path: &TreePath, value: &mut T);
}

// blanket impl for FnMut
impl<T: ?Sized, F> VisitMut<T> for F
where
    F: FnMut(&TreePath, &mut T),
{
    fn visit_mut(&mut self, path: &TreePath, value: &mut T) {
        self(path, value)
    }
}

/// Visitor that visits its subjects immutably, together with their location
pub trait Visit<T: ?Sized> {
    fn visit(&mut self, path: &TreePath, value: &T);
}

impl<T: ?Sized, F> Visit<T> for F
where
    F: FnMut(&TreePath, &T),
{
    fn visit(&mut self, path: &TreePath, value: &T) {
        self(path, value)
    }
}
