//! Typed - 型付き Handler API
//!
//! メッセージ型と Handler の対応付けを静的に保証し、
//! 実行時には object-safe な `DynHandler` として扱います。

pub mod handler;
pub mod registry;

pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::registry::HandlerRegistry;
