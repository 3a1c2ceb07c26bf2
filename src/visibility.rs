// Show/hide state for a single element

use crate::observable::{Observable, Subscription};

/// Observable visibility flag
///
/// Two states, visible (`hidden == false`) and hidden. Subscribers only hear
/// about actual transitions.
#[derive(Debug, Clone)]
pub struct VisibilityState {
    hidden: Observable<bool>,
}

impl Default for VisibilityState {
    fn default() -> Self {
        Self::new(false)
    }
}

impl VisibilityState {
    pub fn new(hidden: bool) -> Self {
        Self {
            hidden: Observable::new(hidden),
        }
    }

    pub fn hidden(&self) -> bool {
        self.hidden.get()
    }

    pub fn show(&self) {
        self.hidden.set(false);
    }

    pub fn hide(&self) {
        self.hidden.set(true);
    }

    pub fn toggle(&self) {
        self.hidden.set(!self.hidden.get());
    }

    pub fn subscribe(&self, callback: impl Fn(bool) + 'static) -> Subscription {
        self.hidden.subscribe(move |hidden| callback(*hidden))
    }
}
