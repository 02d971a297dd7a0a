use std::sync::Arc;

use noteq_service::Dependencies;

#[derive(Clone)]
pub struct AppState {
	pub deps: Arc<Dependencies>,
}

impl AppState {
	pub async fn new(settings: noteq_config::Settings) -> color_eyre::Result<Self> {
		let deps = Dependencies::build(settings).await?;
		Ok(Self { deps: Arc::new(deps) })
	}
}
