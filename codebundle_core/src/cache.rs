use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;

use crate::SharedError;
use crate::SourceLoad;
use crate::SourceLoader;

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<SourceLoad>, SharedError>>>;

/// Loads issued during one top-level resolution, keyed by url.
///
/// Every caller asking for a url that is already loading awaits the same
/// in-flight future, so each url reaches the [`SourceLoader`] at most once
/// per resolution. A cache is created per call and never shared between
/// calls.
#[derive(Default)]
pub struct LoadSourceCache {
	loads: Mutex<HashMap<String, SharedLoad>>,
}

impl LoadSourceCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Load `url`, joining an in-flight or completed load of the same url
	/// when there is one.
	pub async fn load(
		&self,
		url: &str,
		loader: &Arc<dyn SourceLoader>,
	) -> Result<Arc<SourceLoad>, SharedError> {
		let load = {
			let mut loads = self.loads.lock().unwrap_or_else(PoisonError::into_inner);
			if let Some(load) = loads.get(url) {
				tracing::debug!(url, "joining cached load");
				load.clone()
			} else {
				tracing::debug!(url, "loading source");
				let loader = Arc::clone(loader);
				let owned_url = url.to_string();
				let load = async move {
					loader
						.load_source(&owned_url)
						.await
						.map(Arc::new)
						.map_err(SharedError::from)
				}
				.boxed()
				.shared();
				loads.insert(url.to_string(), load.clone());
				load
			}
		};

		load.await
	}

	pub fn len(&self) -> usize {
		self.loads
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl std::fmt::Debug for LoadSourceCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LoadSourceCache")
			.field("len", &self.len())
			.finish()
	}
}
