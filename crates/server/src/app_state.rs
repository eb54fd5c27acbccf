use std::sync::Arc;

use controller::ReactiveController;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) controller: Arc<ReactiveController>,
}
