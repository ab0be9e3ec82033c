//! Bundled applications, registered by name.
//!
//! | Name        | Routes |
//! |-------------|--------|
//! | `demo`      | `/hello/:name`, `/fibonacci/:n`, `/search`, `/filter`, `/user/:id`, `/users`, `/users/:id`, `/api/calculate`, `/protected` |
//! | `alternate` | `/greet/:name`, `/square/:n` |

pub mod alternate;
pub mod demo;

use crate::registry::AppRegistry;

pub const DEMO: &str = "demo";
pub const ALTERNATE: &str = "alternate";

/// Add every bundled application to `registry`.
pub fn register_all(registry: &mut AppRegistry) {
    registry
        .register(DEMO, demo::build)
        .register(ALTERNATE, alternate::build);
}

/// A registry holding only the bundled applications.
#[must_use]
pub fn registry() -> AppRegistry {
    let mut registry = AppRegistry::new();
    register_all(&mut registry);
    registry
}
