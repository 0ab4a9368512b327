//! Errors - ハンドラ実行エラーと分類
//!
//! `HandlerError` はハンドラが返す（またはディスパッチャが組み立てる）エラー値です。
//! `ErrorKind::Invocation` は「間接呼び出しの途中で発生したエラーを包むだけ」の
//! ラッパーで、単独では診断上の意味を持ちません。

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// ErrorKind は実行エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Raised by handler code.
    Handler,
    /// The message body could not be decoded.
    Deserialization,
    /// The handler could not be built for this attempt.
    Construction,
    /// Wraps an error raised behind an indirect call path.
    Invocation,
}

type Source = Arc<dyn StdError + Send + Sync>;

#[derive(Debug, Clone)]
pub struct HandlerError {
    kind: ErrorKind,
    message: String,
    inner: Option<Box<HandlerError>>,
    source: Option<Source>,
}

impl HandlerError {
    /// A plain handler failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Handler, message)
    }

    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            inner: None,
            source: None,
        }
    }

    /// Capture a foreign error, keeping it reachable through `source()`.
    pub fn from_error<E>(kind: ErrorKind, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind,
            message: error.to_string(),
            inner: None,
            source: Some(Arc::new(error)),
        }
    }

    /// Wrap `inner` in an invocation wrapper.
    pub fn invocation(context: impl Into<String>, inner: HandlerError) -> Self {
        Self {
            kind: ErrorKind::Invocation,
            message: context.into(),
            inner: Some(Box::new(inner)),
            source: None,
        }
    }

    /// An invocation wrapper that lost its inner error.
    pub fn empty_invocation(context: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Invocation, context)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn inner(&self) -> Option<&HandlerError> {
        self.inner.as_deref()
    }

    pub fn is_invocation_wrapper(&self) -> bool {
        self.kind == ErrorKind::Invocation
    }

    /// Strip every invocation wrapper that carries an inner error.
    ///
    /// Stops at the first error that is not a wrapper, or at a wrapper with
    /// no inner error (which is then returned as-is).
    pub fn into_root_cause(self) -> HandlerError {
        let mut error = self;
        loop {
            error = match error {
                HandlerError {
                    kind: ErrorKind::Invocation,
                    inner: Some(inner),
                    ..
                } => *inner,
                other => return other,
            };
        }
    }
}

impl PartialEq for HandlerError {
    fn eq(&self, other: &Self) -> bool {
        let same_source = match (&self.source, &other.source) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.kind == other.kind
            && self.message == other.message
            && self.inner == other.inner
            && same_source
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Invocation => write!(f, "invocation failed: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        if let Some(inner) = &self.inner {
            return Some(inner.as_ref() as &(dyn StdError + 'static));
        }
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_error_is_its_own_root_cause() {
        let err = HandlerError::new("boom");
        assert_eq!(err.clone().into_root_cause(), err);
    }

    #[test]
    fn wrapper_without_inner_is_kept() {
        let err = HandlerError::empty_invocation("handler");
        let root = err.clone().into_root_cause();

        assert!(root.is_invocation_wrapper());
        assert_eq!(root, err);
    }

    #[test]
    fn source_walks_inner_then_foreign_error() {
        let io = std::io::Error::other("disk gone");
        let leaf = HandlerError::from_error(ErrorKind::Handler, io);
        let wrapped = HandlerError::invocation("handler", leaf.clone());

        let source = wrapped.source().unwrap();
        assert_eq!(source.to_string(), "disk gone");

        let foreign = leaf.source().unwrap();
        assert!(foreign.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn display_marks_wrappers() {
        let err = HandlerError::invocation("OrdersHandler", HandlerError::new("boom"));
        assert_eq!(err.to_string(), "invocation failed: OrdersHandler");
        assert_eq!(HandlerError::new("boom").to_string(), "boom");
    }

    #[test]
    fn error_kind_serializes_as_screaming_snake_case() {
        let s = serde_json::to_string(&ErrorKind::Deserialization).unwrap();
        assert_eq!(s, "\"DESERIALIZATION\"");
    }
}
