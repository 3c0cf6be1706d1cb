use std::sync::Arc;

use crate::config::Config;
use crate::payments::PaymentGateway;
use crate::storage::ArchiveStorage;
use crate::store::Store;

/// Shared handler state: the external collaborators behind their seams.
/// There is no in-process mutable state between requests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub archives: Arc<dyn ArchiveStorage>,
    pub config: Arc<Config>,
}
