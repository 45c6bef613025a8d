use std::sync::{Arc, OnceLock};

use super::agent::ClientAgent;

static DEFAULT: OnceLock<Arc<ClientAgent>> = OnceLock::new();

/// The process-wide default [`ClientAgent`], built lazily on first use and
/// shared by every caller that doesn't construct their own.
pub fn default_agent() -> Arc<ClientAgent> {
    DEFAULT.get_or_init(|| Arc::new(ClientAgent::new())).clone()
}
