//! Thread-local routing for writes that do not name a layer

use std::cell::Cell;

/// Where edits without an explicit layer land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditTarget {
    /// Edits made by the user: saved to the user or project config
    User,
    /// Edits computed by the application itself
    #[default]
    Derived,
}

thread_local! {
    static EDIT_TARGET: Cell<EditTarget> = const { Cell::new(EditTarget::Derived) };
}

/// Edit target of the calling thread.
pub fn current() -> EditTarget {
    EDIT_TARGET.with(Cell::get)
}

/// Sets the calling thread's edit target until dropped.
///
/// ```
/// use optlayer_core::{EditTarget, EditTargetGuard, edit_target};
///
/// {
///     let _guard = EditTargetGuard::new(EditTarget::User);
///     assert_eq!(edit_target::current(), EditTarget::User);
/// }
/// assert_eq!(edit_target::current(), EditTarget::Derived);
/// ```
#[must_use = "the edit target is restored when the guard is dropped"]
#[derive(Debug)]
pub struct EditTargetGuard {
    previous: EditTarget,
}

impl EditTargetGuard {
    pub fn new(target: EditTarget) -> Self {
        let previous = EDIT_TARGET.with(|cell| cell.replace(target));
        Self { previous }
    }
}

impl Drop for EditTargetGuard {
    fn drop(&mut self) {
        EDIT_TARGET.with(|cell| cell.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_nest_and_restore() {
        assert_eq!(current(), EditTarget::Derived);
        {
            let _user = EditTargetGuard::new(EditTarget::User);
            {
                let _derived = EditTargetGuard::new(EditTarget::Derived);
                assert_eq!(current(), EditTarget::Derived);
            }
            assert_eq!(current(), EditTarget::User);
        }
        assert_eq!(current(), EditTarget::Derived);
    }

    #[test]
    fn target_is_per_thread() {
        let _user = EditTargetGuard::new(EditTarget::User);
        let other = std::thread::spawn(current).join().unwrap();
        assert_eq!(other, EditTarget::Derived);
        assert_eq!(current(), EditTarget::User);
    }
}
