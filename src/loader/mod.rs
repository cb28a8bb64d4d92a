pub mod module;
pub mod registry;

pub use module::{load_config, load_steps, StepAlias};
pub use registry::{register_loaders, LoaderRegistry, ModuleLoader};
