pub mod js_executor;
pub mod page_ops;
pub mod selector;

#[cfg(test)]
pub(crate) mod testing;

pub use js_executor::JsExecutor;
pub use page_ops::{PageOps, Probe};
pub use selector::{resolve, Locator, SelectorChain, Unresolved};
