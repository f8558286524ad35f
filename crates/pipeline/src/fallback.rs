//! Ordered provider lists tried until one succeeds.

use std::future::Future;
use std::sync::Arc;

use crate::error::StageError;

/// A named, interchangeable implementation of some capability.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
}

/// Output of a successful chain run, tagged with who produced it.
#[derive(Debug)]
pub struct Produced<T> {
    pub value: T,
    pub provider: String,
    /// Position of the provider in the chain; 0 means the primary.
    pub position: usize,
}

/// Providers in priority order.
///
/// [`run`](Self::run) calls them one by one. Providers answering
/// [`StageError::Unsupported`] are skipped silently; any other failure is
/// reported through the `on_failure` callback before the next provider is
/// tried. The chain is finite: when every provider failed the run fails.
pub struct ProviderChain<P: ?Sized> {
    providers: Vec<Arc<P>>,
}

impl<P: ?Sized> Clone for ProviderChain<P> {
    fn clone(&self) -> Self {
        Self {
            providers: self.providers.clone(),
        }
    }
}

impl<P: ?Sized> std::fmt::Debug for ProviderChain<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl<P: ?Sized + Provider> ProviderChain<P> {
    pub fn new(providers: Vec<Arc<P>>) -> Self {
        Self { providers }
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// A chain with only the named providers, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, StageError> {
        let mut picked = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            let provider = self
                .providers
                .iter()
                .find(|p| p.name() == name)
                .ok_or_else(|| StageError::UnknownProvider(name.to_string()))?;
            if !picked.iter().any(|p: &Arc<P>| p.name() == name) {
                picked.push(Arc::clone(provider));
            }
        }
        Ok(Self { providers: picked })
    }

    /// Try each provider until one succeeds.
    ///
    /// [`StageError::Cancelled`] stops the chain immediately.
    pub async fn run<'a, T, F, Fut>(
        &'a self,
        mut call: F,
        mut on_failure: impl FnMut(&str, &StageError),
    ) -> Result<Produced<T>, StageError>
    where
        F: FnMut(&'a P) -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let mut failures = Vec::new();
        for (position, provider) in self.providers.iter().enumerate() {
            match call(provider.as_ref()).await {
                Ok(value) => {
                    return Ok(Produced {
                        value,
                        provider: provider.name().to_string(),
                        position,
                    })
                }
                Err(StageError::Cancelled) => return Err(StageError::Cancelled),
                Err(StageError::Unsupported(reason)) => {
                    tracing::trace!(provider = provider.name(), %reason, "Provider skipped");
                }
                Err(e) => {
                    on_failure(provider.name(), &e);
                    failures.push(format!("{}: {e}", provider.name()));
                }
            }
        }

        if failures.is_empty() {
            Err(StageError::NotAvailable(
                "no provider handles this request".to_string(),
            ))
        } else {
            Err(StageError::Exhausted(failures.join("; ")))
        }
    }
}
