use inference::ModelContext;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ModelContext>,
    /// Request body limit for `/detect`
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(context: ModelContext, max_upload_bytes: usize) -> Self {
        Self {
            context: Arc::new(context),
            max_upload_bytes,
        }
    }
}
