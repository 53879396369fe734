mod builder;
mod container;
mod injectable;
mod lazy;
mod module_ref;
mod token;

pub use builder::ContainerBuilder;
pub use container::{Container, Instance, ResolveOptions};
pub use injectable::Injectable;
pub use lazy::Lazy;
pub use module_ref::ModuleRef;
pub use token::Token;

pub(crate) use token::{base_type_name, first_type_argument};
