//! Declarative configuration of DOM nodes: descriptor-driven element set-up,
//! tracked event listeners, delegation, transitions and a small fetch helper.

pub mod config;
pub mod deferred;
pub mod dom;
pub mod element;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod set;
pub mod shadow;
pub mod transition;
pub mod value;

pub use config::{BlissConfig, ConfigError};
pub use deferred::{Deferred, Resolver};
pub use dom::events::{DispatchOutcome, Event, EventPhase};
pub use dom::{Document, ReadyState};
pub use element::{Each, Element, Elements, Subject, View};
pub use error::{BlissError, FetchError, Result};
pub use fetch::{FetchOptions, FetchResponse};
pub use handlers::Special;
pub use set::configure;
pub use shadow::ListenerRecord;
pub use value::{Accessor, Callback, Descriptor, Value};
