pub mod registrar;

pub use registrar::StepRegistrar;
