pub mod backend;
pub mod capacity;
pub mod commons;
#[cfg(feature = "wmf-export")]
pub mod export;
pub mod i18n;
pub mod oauth;
pub mod retry;
pub mod wikimedia;
