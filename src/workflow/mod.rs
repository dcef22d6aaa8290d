pub mod driver;
pub mod import_ctx;
pub mod medium;
pub mod substack;

pub use driver::{build_driver, DriverServices, FlowTimeouts, ImportDriver};
pub use import_ctx::ImportCtx;
pub use medium::MediumDriver;
pub use substack::SubstackDriver;
