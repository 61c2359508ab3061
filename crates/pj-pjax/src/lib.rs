//! Client-side page navigation over fetched HTML.
//!
//! A navigation fetches the destination document, swaps the configured
//! areas of the live document with their counterparts, synchronises the
//! head and stylesheets, updates history and scroll position, and runs the
//! newly arrived scripts. At most one navigation runs at a time; starting a
//! new one cancels the previous one.
//!
//! [`Pjax`] is the entry point. The environment is supplied as a [`Host`].

pub mod api;
pub mod config;
pub mod entity;
pub mod event;
pub mod events;
pub mod fetch;
pub mod host;
pub mod http;
pub mod interface;
pub mod memory;
pub mod pattern;
pub mod progress;
pub mod route;
pub mod scope;
pub mod store;
pub mod supervisor;
pub mod update;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::Pjax;
pub use api::assign;
pub use api::replace;
pub use config::Config;
pub use config::FallbackContext;
pub use config::FetchOptions;
pub use config::Options;
pub use config::Sequence;
pub use config::UpdateOptions;
pub use events::DomEvent;
pub use events::EventBus;
pub use host::Fetcher;
pub use host::History;
pub use host::Host;
pub use host::Window;
pub use http::HttpFetcher;
pub use interface::Navigation;
pub use interface::NavigationOutcome;
pub use interface::Session;
pub use memory::MemoryFetcher;
pub use memory::MemoryHistory;
pub use memory::MemoryWindow;
pub use pattern::router;
pub use view::Modifiers;
