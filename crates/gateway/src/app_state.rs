use std::path::PathBuf;

use gateway_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) cookie_name: String,
    pub(crate) static_dir: Option<PathBuf>,
    pub(crate) max_body_bytes: usize,
}
