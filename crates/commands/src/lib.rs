//! Built-in command set for the textline engine.
//!
//! Each module builds one [`CommandSpec`]; [`register_all`] wires the
//! full set into a registry in the order the rules depend on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cdata;
pub mod echo;
pub mod email;
pub mod fika;
pub mod help;
pub mod login;
pub mod sleep;
pub mod terminal;

use textline_engine::{CommandRegistry, RegistryError};

pub use login::LoginUtils;

/// Register every built-in command.
pub fn register_all(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(login::spec()?)?;
    registry.register(cdata::spec()?)?;
    registry.register(fika::spec()?)?;
    registry.register(sleep::spec()?)?;
    registry.register(terminal::spec()?)?;
    registry.register(email::spec()?)?;
    registry.register(echo::spec()?)?;
    registry.register(help::spec()?)?;
    Ok(())
}
