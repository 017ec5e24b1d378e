use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Something a response body can be decoded into.
pub trait BindTarget: Send + Sync {
    fn decode(&self, body: &[u8]) -> Result<()>;
}

/// A typed slot that a [`Request`](crate::Request) fills with the decoded response body.
///
/// Clones share the slot.
///
/// # Examples
///
/// ```no_run
/// use courier_http::{Binding, Factory, FactoryConfig};
///
/// #[derive(serde::Deserialize)]
/// struct Repo {
///     full_name: String,
/// }
///
/// # async fn run(factory: Factory) -> courier_http::Result<()> {
/// let repo = Binding::<Repo>::new();
/// factory.client("github").bind(&repo).get("/repos/rust-lang/rust").await?;
/// println!("{}", repo.take().unwrap().full_name);
/// # Ok(())
/// # }
/// ```
pub struct Binding<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Binding<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Move the decoded value out, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_bound(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Binding<T> {
    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Default for Binding<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl<T: DeserializeOwned + Send> BindTarget for Binding<T> {
    fn decode(&self, body: &[u8]) -> Result<()> {
        let value: T = serde_json::from_slice(body)?;
        *self.lock() = Some(value);
        Ok(())
    }
}
