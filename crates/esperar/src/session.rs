//! Browser session lifecycle.
//!
//! A [`Session`] owns one driver for one test run. Release is explicit
//! ([`Session::close`]); [`Session::scoped`] guarantees it on every exit
//! path, panics included.

use crate::driver::DocumentDriver;
use crate::result::EsperarResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// An acquired browser session
#[derive(Debug)]
pub struct Session<D: DocumentDriver> {
    id: Uuid,
    driver: D,
    closed: bool,
}

impl<D: DocumentDriver> Session<D> {
    /// Take ownership of a started driver
    pub fn new(driver: D) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, "session acquired");
        Self {
            id,
            driver,
            closed: false,
        }
    }

    /// Session id, also recorded on the tracing span
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Borrow the driver
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Whether `close` has run
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the driver. The session counts as released even if closing
    /// reports an error.
    pub async fn close(mut self) -> EsperarResult<()> {
        self.closed = true;
        let result = self.driver.close().await;
        match &result {
            Ok(()) => info!(session = %self.id, "session released"),
            Err(e) => warn!(session = %self.id, error = %e, "session close failed"),
        }
        result
    }

    /// Run `body` against a fresh session and always close it afterwards.
    ///
    /// The body's error wins over a close error. A panic in the body is
    /// caught, the session closed, then the panic resumed.
    pub async fn scoped<T, F>(driver: D, body: F) -> EsperarResult<T>
    where
        F: for<'a> FnOnce(&'a D) -> BoxFuture<'a, EsperarResult<T>>,
    {
        let session = Self::new(driver);
        let span = info_span!("session", id = %session.id);
        let outcome = AssertUnwindSafe(body(session.driver()))
            .catch_unwind()
            .instrument(span.clone())
            .await;
        let closed = session.close().instrument(span).await;

        match outcome {
            Ok(Ok(value)) => closed.map(|()| value),
            Ok(Err(e)) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "close failed after body error");
                }
                Err(e)
            }
            Err(panic) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "close failed after panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

impl<D: DocumentDriver> Drop for Session<D> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(session = %self.id, "session dropped without close");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockDocument;
    use crate::result::EsperarError;
    use crate::DocumentDriver;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_scoped_closes_on_success() {
        let doc = Arc::new(MockDocument::new());
        let title = Session::scoped(Arc::clone(&doc), |d| {
            Box::pin(async move { d.title().await })
        })
        .await
        .unwrap();
        assert_eq!(title, "DevOps Assignment 2");
        assert!(doc.is_closed());
    }

    #[tokio::test]
    async fn test_scoped_closes_on_error() {
        let doc = Arc::new(MockDocument::new());
        let result: EsperarResult<()> = Session::scoped(Arc::clone(&doc), |_| {
            Box::pin(async move { Err(EsperarError::session_unavailable("crashed")) })
        })
        .await;
        assert!(matches!(result, Err(EsperarError::SessionUnavailable { .. })));
        assert!(doc.is_closed());
    }

    #[tokio::test]
    async fn test_scoped_closes_on_panic() {
        let doc = Arc::new(MockDocument::new());
        let run = Session::scoped(Arc::clone(&doc), |_| {
            Box::pin(async move {
                let rows = 0;
                assert_eq!(rows, 1, "assertion blew up");
                Ok(())
            })
        });
        let caught = AssertUnwindSafe(run).catch_unwind().await;
        assert!(caught.is_err());
        assert!(doc.is_closed());
    }

    #[tokio::test]
    async fn test_explicit_close() {
        let doc = Arc::new(MockDocument::new());
        let session = Session::new(Arc::clone(&doc));
        assert!(!session.is_closed());
        assert!(!session.id().is_nil());
        session.close().await.unwrap();
        assert!(doc.was_called("close"));
    }
}
